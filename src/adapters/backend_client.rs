use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use reqwest::{
    Client, Method, Proxy,
    header::{COOKIE, HeaderMap, HeaderName, HeaderValue, USER_AGENT},
    redirect::Policy,
};
use scc::HashMap;
use tracing::Instrument;

use crate::{
    ports::backend_client::{
        BackendClient, BackendCookie, BackendError, BackendResponse, BackendResult,
        RequestOptions,
    },
    tracing_setup,
};

const MAX_REDIRECTS: usize = 10;

/// Upper bound on cached clients. Proxy-less clients (at most one per redirect policy)
/// are never evicted; proxied ones are flushed together once the bound is reached.
pub const MAX_CACHED_CLIENTS: usize = 16;

/// Proxy and redirect policy are fixed per `reqwest::Client`, so one client is kept
/// for every combination seen.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    proxy: Option<String>,
    follow_redirects: bool,
}

/// Backend client adapter using reqwest with rustls.
///
/// Responsibilities:
/// * Keeps a bounded pool of long-lived clients keyed by proxy / redirect policy
/// * Applies the per-call timeout, headers, user agent and cookies
/// * Decompresses bodies (gzip, brotli, deflate, zstd) so advertised encodings work
/// * Optionally refuses anything below TLS 1.3
///
/// TLS fingerprint emulation is not available with this stack; the fingerprint token is
/// recorded on the request span and otherwise ignored.
pub struct ReqwestBackendClient {
    clients: HashMap<ClientKey, Client>,
    tls13_only: bool,
    closed: AtomicBool,
}

impl ReqwestBackendClient {
    pub fn new(tls13_only: bool) -> Self {
        tracing::info!(
            "Created backend client (TLS 1.3 only: {}, max redirects: {})",
            tls13_only,
            MAX_REDIRECTS
        );
        Self {
            clients: HashMap::new(),
            tls13_only,
            closed: AtomicBool::new(false),
        }
    }

    /// Number of distinct underlying clients currently cached.
    pub fn cached_clients(&self) -> usize {
        self.clients.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn build_client(&self, key: &ClientKey) -> BackendResult<Client> {
        let policy = if key.follow_redirects {
            Policy::limited(MAX_REDIRECTS)
        } else {
            Policy::none()
        };

        let mut builder = Client::builder().redirect(policy);

        builder = match &key.proxy {
            Some(proxy) => builder.proxy(
                Proxy::all(proxy.as_str())
                    .map_err(|e| BackendError::InvalidRequest(format!("proxy {proxy}: {e}")))?,
            ),
            None => builder.no_proxy(),
        };

        if self.tls13_only {
            builder = builder.min_tls_version(reqwest::tls::Version::TLS_1_3);
        }

        builder
            .build()
            .map_err(|e| BackendError::Connection(error_chain(&e)))
    }

    async fn client_for(&self, key: ClientKey) -> BackendResult<Client> {
        if let Some(entry) = self.clients.get_async(&key).await {
            return Ok(entry.get().clone());
        }

        let client = self.build_client(&key)?;
        tracing::debug!(
            "Caching backend client (proxy: {:?}, follow redirects: {})",
            key.proxy,
            key.follow_redirects
        );
        if key.proxy.is_some() && self.clients.len() >= MAX_CACHED_CLIENTS {
            self.evict_proxied_clients().await;
        }
        // A concurrent insert for the same key is harmless; either client works.
        let _ = self.clients.insert_async(key, client.clone()).await;
        Ok(client)
    }

    /// Drop every cached proxied client. Requests already holding one keep it until they
    /// finish; its connection pool goes away with the last clone.
    async fn evict_proxied_clients(&self) {
        let mut evicted = 0;
        let evicted_ref = &mut evicted;
        self.clients
            .retain_async(|key, _| {
                if key.proxy.is_some() {
                    *evicted_ref += 1;
                    false
                } else {
                    true
                }
            })
            .await;
        tracing::debug!("Evicted {} proxied backend clients", evicted);
    }
}

impl Default for ReqwestBackendClient {
    fn default() -> Self {
        Self::new(false)
    }
}

#[async_trait]
impl BackendClient for ReqwestBackendClient {
    async fn execute(
        &self,
        url: &str,
        options: RequestOptions,
        method: &str,
    ) -> BackendResult<BackendResponse> {
        if self.is_closed() {
            return Err(BackendError::Closed);
        }

        let method = Method::from_bytes(method.as_bytes())
            .map_err(|e| BackendError::InvalidRequest(format!("method {method:?}: {e}")))?;
        let headers = build_headers(&options)?;
        let timeout_ms = options.timeout.as_millis() as u64;

        let client = self
            .client_for(ClientKey {
                proxy: options.proxy.clone(),
                follow_redirects: !options.disable_redirect,
            })
            .await?;

        let span =
            tracing_setup::create_backend_span(method.as_str(), url, options.fingerprint.as_deref());

        async move {
            let mut request = client
                .request(method, url)
                .headers(headers)
                .timeout(options.timeout);
            if !options.body.is_empty() {
                request = request.body(options.body);
            }

            let response = request
                .send()
                .await
                .map_err(|e| classify(e, timeout_ms))?;
            let status = response.status().as_u16();
            tracing::Span::current().record("http.status_code", status);

            let body = response.text().await.map_err(|e| classify(e, timeout_ms))?;
            Ok(BackendResponse { status, body })
        }
        .instrument(span)
        .await
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.clients.retain_async(|_, _| false).await;
        tracing::info!("Backend client closed");
    }
}

/// Effective header map: entries in order (later wins), then the user agent, then cookies
/// appended to any caller-supplied `Cookie` header.
fn build_headers(options: &RequestOptions) -> BackendResult<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(options.headers.len() + 2);

    for (name, value) in &options.headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| BackendError::InvalidRequest(format!("header name {name:?}: {e}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| BackendError::InvalidRequest(format!("header {name:?}: {e}")))?;
        headers.insert(header_name, header_value);
    }

    let user_agent = HeaderValue::from_str(&options.user_agent)
        .map_err(|e| BackendError::InvalidRequest(format!("user agent: {e}")))?;
    headers.insert(USER_AGENT, user_agent);

    if let Some(jar) = cookie_header(&options.cookies) {
        let combined = match headers.get(COOKIE).and_then(|v| v.to_str().ok()) {
            Some(existing) if !existing.is_empty() => format!("{existing}; {jar}"),
            _ => jar,
        };
        let value = HeaderValue::from_str(&combined)
            .map_err(|e| BackendError::InvalidRequest(format!("cookie: {e}")))?;
        headers.insert(COOKIE, value);
    }

    Ok(headers)
}

fn cookie_header(cookies: &[BackendCookie]) -> Option<String> {
    if cookies.is_empty() {
        return None;
    }
    Some(
        cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; "),
    )
}

fn classify(error: reqwest::Error, timeout_ms: u64) -> BackendError {
    if error.is_timeout() {
        BackendError::Timeout(timeout_ms)
    } else if error.is_builder() {
        BackendError::InvalidRequest(error_chain(&error))
    } else {
        BackendError::Connection(error_chain(&error))
    }
}

/// `Display` of the error followed by each source, `: `-separated.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
