//! Wire types for the `/handle` endpoint.
//!
//! Field names follow the JSON envelope accepted by existing callers (`timeout`, `proxy`,
//! `ja3`, `disableRedirect`); the more descriptive names are accepted as aliases. A JSON
//! `null` anywhere in the envelope decodes to the field's zero value.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Treat an explicit JSON `null` the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Description of a single outbound HTTP request, as posted by a caller.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct OutboundRequestSpec {
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub method: String,
    #[serde(deserialize_with = "null_as_default")]
    pub headers: BTreeMap<String, String>,
    #[serde(deserialize_with = "null_as_default")]
    pub cookies: Vec<CookieSpec>,
    #[serde(deserialize_with = "null_as_default")]
    pub body: String,
    #[serde(alias = "proxyAddress", deserialize_with = "null_as_default")]
    pub proxy: String,
    /// Milliseconds; zero (or negative) selects the configured default.
    #[serde(alias = "timeoutMillis", deserialize_with = "null_as_default")]
    pub timeout: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub user_agent: String,
    #[serde(alias = "fingerprintToken", deserialize_with = "null_as_default")]
    pub ja3: String,
    #[serde(deserialize_with = "null_as_default")]
    pub disable_redirect: bool,
    /// Takes precedence over `disableRedirect` when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_redirects: Option<bool>,
}

impl OutboundRequestSpec {
    /// Whether redirects should be followed; defaults to `true`.
    pub fn follows_redirects(&self) -> bool {
        self.follow_redirects.unwrap_or(!self.disable_redirect)
    }
}

/// A cookie record supplied by the caller. Duplicates are allowed and order is kept.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct CookieSpec {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub value: String,
    #[serde(deserialize_with = "null_as_default")]
    pub path: String,
    #[serde(deserialize_with = "null_as_default")]
    pub domain: String,
    pub expires: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_as_default")]
    pub max_age: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub secure: bool,
}

/// JSON body returned by `/handle`.
///
/// Three shapes are produced:
/// * success: `body` and the real `status`, no `error`
/// * backend failure (outer HTTP 200): `status` is `0` and `error` carries the message
/// * gateway rejection (outer HTTP 400/429): `status` mirrors the outer status, `error` is set
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct GatewayResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GatewayResponse {
    /// Sentinel status meaning no real HTTP status was obtained.
    pub const NO_STATUS: u16 = 0;

    pub fn success(status: u16, body: String) -> Self {
        Self {
            body: Some(body),
            status,
            error: None,
        }
    }

    pub fn backend_failure(message: impl Into<String>) -> Self {
        Self {
            body: None,
            status: Self::NO_STATUS,
            error: Some(message.into()),
        }
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self {
            body: None,
            status,
            error: Some(message.into()),
        }
    }
}
