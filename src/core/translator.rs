//! Translation of the inbound JSON envelope into a backend call.
//!
//! Pure data transformation: no I/O, no admission interaction. Defaults (method, timeout,
//! user agent, header table) come from an immutable [`RequestDefaults`] shared by every
//! request; each call builds its own merged header list from a clone of the table.
use std::{sync::Arc, time::Duration};

use thiserror::Error;

use crate::{
    config::models::RequestDefaults,
    core::models::{CookieSpec, OutboundRequestSpec},
    ports::backend_client::{BackendCookie, RequestOptions},
};

/// Rejections produced while reading the envelope. Both map to HTTP 400.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error("invalid request: {0}")]
    Malformed(String),
    #[error("url is required")]
    MissingUrl,
}

/// Fully-defaulted request ready to hand to the backend client.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: String,
    pub url: String,
    pub options: RequestOptions,
}

#[derive(Debug, Clone)]
pub struct RequestTranslator {
    defaults: Arc<RequestDefaults>,
}

impl RequestTranslator {
    pub fn new(defaults: Arc<RequestDefaults>) -> Self {
        Self { defaults }
    }

    /// Decode and translate a raw request body.
    pub fn parse(&self, raw: &[u8]) -> Result<OutboundRequest, TranslateError> {
        let spec = Self::decode(raw)?;
        self.translate(spec)
    }

    /// Decode the JSON envelope without applying any defaults.
    pub fn decode(raw: &[u8]) -> Result<OutboundRequestSpec, TranslateError> {
        serde_json::from_slice(raw).map_err(|e| TranslateError::Malformed(e.to_string()))
    }

    /// Validate a decoded envelope and apply defaults.
    pub fn translate(&self, spec: OutboundRequestSpec) -> Result<OutboundRequest, TranslateError> {
        if spec.url.is_empty() {
            return Err(TranslateError::MissingUrl);
        }

        let follow_redirects = spec.follows_redirects();

        let method = if spec.method.is_empty() {
            self.defaults.method.clone()
        } else {
            spec.method
        };

        let timeout_ms = if spec.timeout <= 0 {
            self.defaults.timeout_ms
        } else {
            spec.timeout as u64
        };

        let user_agent = if spec.user_agent.is_empty() {
            self.defaults.user_agent.clone()
        } else {
            spec.user_agent
        };

        let options = RequestOptions {
            cookies: spec.cookies.into_iter().map(convert_cookie).collect(),
            body: spec.body,
            proxy: non_empty(spec.proxy),
            timeout: Duration::from_millis(timeout_ms),
            headers: self.merge_headers(spec.headers),
            fingerprint: non_empty(spec.ja3),
            user_agent,
            disable_redirect: !follow_redirects,
        };

        Ok(OutboundRequest {
            method,
            url: spec.url,
            options,
        })
    }

    /// Default table first, then caller headers. An exact-name match replaces the default
    /// in place; names are kept exactly as given.
    fn merge_headers(
        &self,
        caller: impl IntoIterator<Item = (String, String)>,
    ) -> Vec<(String, String)> {
        let mut merged: Vec<(String, String)> = self
            .defaults
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        for (name, value) in caller {
            match merged.iter_mut().find(|(existing, _)| *existing == name) {
                Some(slot) => slot.1 = value,
                None => merged.push((name, value)),
            }
        }
        merged
    }
}

fn convert_cookie(cookie: CookieSpec) -> BackendCookie {
    BackendCookie {
        name: cookie.name,
        value: cookie.value,
        path: cookie.path,
        domain: cookie.domain,
        expires: cookie.expires,
        max_age: cookie.max_age,
        secure: cookie.secure,
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn translator() -> RequestTranslator {
        RequestTranslator::new(Arc::new(RequestDefaults::default()))
    }

    /// Value of the effective header with exactly this name.
    fn header<'a>(request: &'a OutboundRequest, name: &str) -> Option<&'a str> {
        request
            .options
            .headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn test_minimal_request_gets_defaults() {
        let request = translator()
            .parse(br#"{"url":"https://example.com"}"#)
            .unwrap();

        assert_eq!(request.method, "GET");
        assert_eq!(request.url, "https://example.com");
        assert_eq!(request.options.timeout, Duration::from_millis(30_000));
        assert_eq!(
            request.options.user_agent,
            RequestDefaults::default().user_agent
        );
        assert!(request.options.cookies.is_empty());
        assert!(request.options.proxy.is_none());
        assert!(request.options.fingerprint.is_none());
        assert!(!request.options.disable_redirect);
        assert_eq!(
            request.options.headers.len(),
            RequestDefaults::default().headers.len()
        );
    }

    #[test]
    fn test_empty_url_rejected() {
        let err = translator().parse(br#"{"url":""}"#).unwrap_err();
        assert_eq!(err, TranslateError::MissingUrl);
        assert_eq!(err.to_string(), "url is required");

        let err = translator().parse(br#"{"method":"POST"}"#).unwrap_err();
        assert_eq!(err, TranslateError::MissingUrl);
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = translator().parse(b"{not json").unwrap_err();
        assert!(matches!(err, TranslateError::Malformed(_)));
        assert!(err.to_string().starts_with("invalid request: "));
    }

    #[test]
    fn test_caller_values_kept() {
        let request = translator()
            .parse(
                br#"{"url":"https://example.com/api","method":"POST","timeout":1500,
                     "userAgent":"custom/1.0","proxy":"http://10.0.0.2:3128","ja3":"771,4865",
                     "body":"{\"a\":1}","disableRedirect":true}"#,
            )
            .unwrap();

        assert_eq!(request.method, "POST");
        assert_eq!(request.options.timeout, Duration::from_millis(1500));
        assert_eq!(request.options.user_agent, "custom/1.0");
        assert_eq!(request.options.proxy.as_deref(), Some("http://10.0.0.2:3128"));
        assert_eq!(request.options.fingerprint.as_deref(), Some("771,4865"));
        assert_eq!(request.options.body, "{\"a\":1}");
        assert!(request.options.disable_redirect);
    }

    #[test]
    fn test_negative_timeout_uses_default() {
        let request = translator()
            .parse(br#"{"url":"https://example.com","timeout":-5}"#)
            .unwrap();
        assert_eq!(request.options.timeout, Duration::from_millis(30_000));
    }

    #[test]
    fn test_header_merge_caller_wins() {
        let mut defaults = RequestDefaults::default();
        defaults.headers = BTreeMap::from([
            ("accept".to_string(), "*/*".to_string()),
            ("pragma".to_string(), "no-cache".to_string()),
        ]);
        let translator = RequestTranslator::new(Arc::new(defaults));

        let request = translator
            .parse(
                br#"{"url":"https://example.com",
                     "headers":{"accept":"application/json","X-Custom":"1"}}"#,
            )
            .unwrap();

        assert_eq!(header(&request, "accept"), Some("application/json"));
        assert_eq!(header(&request, "pragma"), Some("no-cache"));
        assert_eq!(header(&request, "X-Custom"), Some("1"));
        assert_eq!(request.options.headers.len(), 3);

        // The shared table itself is untouched.
        assert_eq!(translator.defaults.headers.get("accept").unwrap(), "*/*");
    }

    #[test]
    fn test_header_names_not_normalized() {
        let request = translator()
            .parse(br#"{"url":"https://example.com","headers":{"Accept":"text/html"}}"#)
            .unwrap();

        assert_eq!(header(&request, "Accept"), Some("text/html"));
        assert_eq!(header(&request, "accept"), Some("*/*"));
        // Caller entry is applied after the default one.
        let accept_positions: Vec<usize> = request
            .options
            .headers
            .iter()
            .enumerate()
            .filter(|(_, (k, _))| k.eq_ignore_ascii_case("accept"))
            .map(|(i, _)| i)
            .collect();
        let caller_position = request
            .options
            .headers
            .iter()
            .position(|(k, _)| k == "Accept")
            .unwrap();
        assert_eq!(accept_positions.last(), Some(&caller_position));
    }

    #[test]
    fn test_cookies_converted_in_order_with_duplicates() {
        let request = translator()
            .parse(
                br#"{"url":"https://example.com","cookies":[
                    {"name":"a","value":"1","path":"/","domain":".example.com","maxAge":10,"secure":true},
                    {"name":"a","value":"2"},
                    {"name":"b","value":"3","expires":"2031-05-01T12:00:00Z"}
                ]}"#,
            )
            .unwrap();

        let cookies = &request.options.cookies;
        assert_eq!(cookies.len(), 3);
        assert_eq!(cookies[0].name, "a");
        assert_eq!(cookies[0].value, "1");
        assert_eq!(cookies[0].path, "/");
        assert_eq!(cookies[0].domain, ".example.com");
        assert_eq!(cookies[0].max_age, 10);
        assert!(cookies[0].secure);
        assert_eq!(cookies[1].value, "2");
        assert_eq!(cookies[2].name, "b");
        assert!(cookies[2].expires.is_some());
    }
}
