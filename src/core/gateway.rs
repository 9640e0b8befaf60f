//! Core gateway orchestration service.
//!
//! `GatewayService::handle` runs one `/handle` call end to end:
//! admission → translation → backend invocation → response shaping.
//!
//! Error reporting is two-tier. Rejections by the gateway itself (no free admission slot,
//! malformed envelope) use a non-200 outer status. Once the backend has been invoked the
//! outer status is always 200 and a backend failure is reported in the payload as
//! `status: 0` plus `error`. Integrators must check the payload, not only the HTTP status.
use std::{sync::Arc, time::Duration};

use http::StatusCode;
use tokio::time::Instant;
use tracing::Instrument;

use crate::{
    config::models::GatewayConfig,
    core::{
        admission::AdmissionController,
        models::GatewayResponse,
        translator::{OutboundRequest, RequestTranslator},
    },
    metrics,
    ports::backend_client::{BackendClient, BackendError},
    tracing_setup,
};

/// Extra time granted to the backend client beyond the request timeout before the
/// gateway gives up on it, so the client's own timeout error is the one reported.
const BACKEND_TIMEOUT_SLACK: Duration = Duration::from_secs(1);

/// Stand-in deadline when the configured admission wait does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// How a `/handle` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    BackendFailure,
    Overloaded,
    BadRequest,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::BackendFailure => "backend_error",
            Outcome::Overloaded => "overloaded",
            Outcome::BadRequest => "bad_request",
        }
    }
}

/// Outer HTTP status plus JSON payload for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReply {
    pub status: StatusCode,
    pub outcome: Outcome,
    pub body: GatewayResponse,
}

impl GatewayReply {
    fn rejected(outcome: Outcome, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            outcome,
            body: GatewayResponse::rejected(status.as_u16(), message),
        }
    }

    fn backend_failure(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            outcome: Outcome::BackendFailure,
            body: GatewayResponse::backend_failure(message),
        }
    }

    fn success(status: u16, body: String) -> Self {
        Self {
            status: StatusCode::OK,
            outcome: Outcome::Success,
            body: GatewayResponse::success(status, body),
        }
    }
}

/// Multiplexes inbound calls onto one shared backend client under a concurrency ceiling.
///
/// All collaborators are injected, so tests can substitute the backend client and
/// defaults freely.
pub struct GatewayService {
    admission: AdmissionController,
    translator: RequestTranslator,
    backend: Arc<dyn BackendClient>,
    admission_timeout: Duration,
}

impl GatewayService {
    pub fn new(
        backend: Arc<dyn BackendClient>,
        translator: RequestTranslator,
        admission: AdmissionController,
        admission_timeout: Duration,
    ) -> Self {
        Self {
            admission,
            translator,
            backend,
            admission_timeout,
        }
    }

    /// Build the service from configuration.
    pub fn from_config(config: &GatewayConfig, backend: Arc<dyn BackendClient>) -> Self {
        Self::new(
            backend,
            RequestTranslator::new(Arc::new(config.defaults.clone())),
            AdmissionController::new(config.admission.max_concurrent),
            config.admission.timeout(),
        )
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    /// Handle one raw `/handle` request body.
    ///
    /// The admission deadline is fixed at arrival and bounds only the wait for a slot;
    /// the backend call itself is bounded by the request's own timeout.
    pub async fn handle(&self, raw: &[u8]) -> GatewayReply {
        let deadline = self.admission_deadline();
        let span = tracing_setup::create_request_span();

        let reply = self.process(raw, deadline).instrument(span.clone()).await;

        span.record("http.status_code", reply.body.status);
        span.record("outcome", reply.outcome.as_str());
        metrics::increment_request_total(reply.outcome.as_str());
        reply
    }

    fn admission_deadline(&self) -> Instant {
        let now = Instant::now();
        now.checked_add(self.admission_timeout)
            .unwrap_or_else(|| now + FAR_FUTURE)
    }

    async fn process(&self, raw: &[u8], deadline: Instant) -> GatewayReply {
        let permit = match self.admission.acquire(deadline).await {
            Ok(permit) => permit,
            Err(e) => {
                tracing::warn!(
                    "Admission denied after {:?}: {}",
                    self.admission_timeout,
                    e
                );
                return GatewayReply::rejected(
                    Outcome::Overloaded,
                    StatusCode::TOO_MANY_REQUESTS,
                    e.to_string(),
                );
            }
        };
        metrics::set_inflight_requests(self.admission.in_flight());

        let reply = self.forward(raw).await;

        drop(permit);
        metrics::set_inflight_requests(self.admission.in_flight());
        reply
    }

    async fn forward(&self, raw: &[u8]) -> GatewayReply {
        let request = match self.translator.parse(raw) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Invalid request: {}", e);
                return GatewayReply::rejected(
                    Outcome::BadRequest,
                    StatusCode::BAD_REQUEST,
                    e.to_string(),
                );
            }
        };

        let span = tracing::Span::current();
        span.record("http.method", request.method.as_str());
        span.record("url", request.url.as_str());
        tracing::info!("➡️  {} {}", request.method, request.url);

        let OutboundRequest {
            method,
            url,
            options,
        } = request;
        let timeout = options.timeout;

        let started = Instant::now();
        let result = match tokio::time::timeout(
            timeout + BACKEND_TIMEOUT_SLACK,
            self.backend.execute(&url, options, &method),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(timeout.as_millis() as u64)),
        };
        let elapsed = started.elapsed();

        match result {
            Ok(response) => {
                tracing::info!("⬅️  {} → {} in {:?}", url, response.status, elapsed);
                metrics::record_backend_duration(Outcome::Success.as_str(), elapsed);
                GatewayReply::success(response.status, response.body)
            }
            Err(e) => {
                tracing::error!("❌ {} → {}", url, e);
                metrics::record_backend_duration(Outcome::BackendFailure.as_str(), elapsed);
                GatewayReply::backend_failure(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use tokio::sync::watch;

    use super::*;
    use crate::{
        config::models::RequestDefaults,
        ports::backend_client::{BackendResponse, BackendResult, RequestOptions},
    };

    /// Records every call and answers with a fixed result.
    struct RecordingBackend {
        calls: AtomicUsize,
        last: Mutex<Option<(String, RequestOptions, String)>>,
        reply: Result<(u16, String), String>,
    }

    impl RecordingBackend {
        fn ok(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
                reply: Ok((status, body.to_string())),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
                reply: Err(message.to_string()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BackendClient for RecordingBackend {
        async fn execute(
            &self,
            url: &str,
            options: RequestOptions,
            method: &str,
        ) -> BackendResult<BackendResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some((url.to_string(), options, method.to_string()));
            match &self.reply {
                Ok((status, body)) => Ok(BackendResponse {
                    status: *status,
                    body: body.clone(),
                }),
                Err(message) => Err(BackendError::Connection(message.clone())),
            }
        }

        async fn close(&self) {}
    }

    /// Blocks every call until the gate opens, tracking peak concurrency.
    struct BlockingBackend {
        gate: watch::Receiver<bool>,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl BackendClient for BlockingBackend {
        async fn execute(
            &self,
            _url: &str,
            _options: RequestOptions,
            _method: &str,
        ) -> BackendResult<BackendResponse> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let mut gate = self.gate.clone();
            let _ = gate.wait_for(|open| *open).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(BackendResponse {
                status: 204,
                body: String::new(),
            })
        }

        async fn close(&self) {}
    }

    /// Never answers; only the gateway's own guard ends the call.
    struct HangingBackend;

    #[async_trait]
    impl BackendClient for HangingBackend {
        async fn execute(
            &self,
            _url: &str,
            _options: RequestOptions,
            _method: &str,
        ) -> BackendResult<BackendResponse> {
            std::future::pending().await
        }

        async fn close(&self) {}
    }

    fn service(backend: Arc<dyn BackendClient>, capacity: usize, wait: Duration) -> GatewayService {
        GatewayService::new(
            backend,
            RequestTranslator::new(Arc::new(RequestDefaults::default())),
            AdmissionController::new(capacity),
            wait,
        )
    }

    #[tokio::test]
    async fn test_success_passthrough() {
        let backend = RecordingBackend::ok(200, "ok");
        let gateway = service(backend.clone(), 50, Duration::from_secs(60));

        let reply = gateway.handle(br#"{"url":"https://example.com"}"#).await;

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.outcome, Outcome::Success);
        assert_eq!(reply.body, GatewayResponse::success(200, "ok".to_string()));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_backend_receives_defaults() {
        let backend = RecordingBackend::ok(200, "ok");
        let gateway = service(backend.clone(), 50, Duration::from_secs(60));

        gateway
            .handle(br#"{"url":"https://example.com","headers":{"accept":"text/plain"}}"#)
            .await;

        let (url, options, method) = backend.last.lock().unwrap().take().unwrap();
        assert_eq!(url, "https://example.com");
        assert_eq!(method, "GET");
        assert_eq!(options.timeout, Duration::from_millis(30_000));
        assert!(
            options
                .headers
                .iter()
                .any(|(k, v)| k == "accept" && v == "text/plain")
        );
        assert!(
            options
                .headers
                .iter()
                .any(|(k, v)| k == "pragma" && v == "no-cache")
        );
    }

    #[tokio::test]
    async fn test_empty_url_never_reaches_backend() {
        let backend = RecordingBackend::ok(200, "ok");
        let gateway = service(backend.clone(), 50, Duration::from_secs(60));

        let reply = gateway.handle(br#"{"url":""}"#).await;

        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(reply.outcome, Outcome::BadRequest);
        assert_eq!(
            reply.body,
            GatewayResponse::rejected(400, "url is required")
        );
        assert_eq!(backend.calls(), 0);
        assert_eq!(gateway.admission().available(), 50);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let backend = RecordingBackend::ok(200, "ok");
        let gateway = service(backend.clone(), 50, Duration::from_secs(60));

        let reply = gateway.handle(b"not json").await;

        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        let error = reply.body.error.unwrap();
        assert!(error.starts_with("invalid request: "));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_reported_with_200() {
        let backend = RecordingBackend::failing("timeout");
        let gateway = service(backend.clone(), 50, Duration::from_secs(60));

        let reply = gateway.handle(br#"{"url":"https://example.com"}"#).await;

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.outcome, Outcome::BackendFailure);
        assert_eq!(reply.body, GatewayResponse::backend_failure("timeout"));
        assert_eq!(gateway.admission().available(), 50);
    }

    #[tokio::test]
    async fn test_hanging_backend_cut_off_by_request_timeout() {
        let gateway = service(Arc::new(HangingBackend), 50, Duration::from_secs(60));

        let reply = gateway
            .handle(br#"{"url":"https://example.com","timeout":50}"#)
            .await;

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body.status, 0);
        assert_eq!(
            reply.body.error.as_deref(),
            Some("request timed out after 50 ms")
        );
        assert_eq!(gateway.admission().available(), 50);
    }

    #[tokio::test]
    async fn test_saturated_gateway_returns_overloaded() {
        let (open, gate) = watch::channel(false);
        let backend = Arc::new(BlockingBackend {
            gate,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let gateway = Arc::new(service(backend.clone(), 50, Duration::from_millis(200)));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let gateway = gateway.clone();
            handles.push(tokio::spawn(async move {
                gateway.handle(br#"{"url":"https://example.com"}"#).await
            }));
        }

        // Wait until every admitted call is parked inside the backend.
        while backend.active.load(Ordering::SeqCst) < 50 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(gateway.admission().available(), 0);

        let rejected = gateway.handle(br#"{"url":"https://example.com"}"#).await;
        assert_eq!(rejected.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(rejected.outcome, Outcome::Overloaded);
        assert_eq!(
            rejected.body,
            GatewayResponse::rejected(429, "server overloaded")
        );

        open.send(true).unwrap();
        for handle in handles {
            let reply = handle.await.unwrap();
            assert_eq!(reply.outcome, Outcome::Success);
            assert_eq!(reply.body.status, 204);
        }

        assert_eq!(backend.peak.load(Ordering::SeqCst), 50);
        assert_eq!(gateway.admission().available(), 50);
    }

    #[tokio::test]
    async fn test_permits_return_after_mixed_outcomes() {
        let ok = service(RecordingBackend::ok(200, "ok"), 50, Duration::from_secs(1));
        let failing = service(RecordingBackend::failing("boom"), 50, Duration::from_secs(1));

        for _ in 0..20 {
            ok.handle(br#"{"url":"https://example.com"}"#).await;
            ok.handle(br#"{"url":""}"#).await;
            failing.handle(br#"{"url":"https://example.com"}"#).await;
        }

        assert_eq!(ok.admission().available(), 50);
        assert_eq!(failing.admission().available(), 50);
    }

    #[tokio::test]
    async fn test_caller_timeout_not_capped_by_admission_wait() {
        let (open, gate) = watch::channel(false);
        let backend = Arc::new(BlockingBackend {
            gate,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let gateway = Arc::new(service(backend.clone(), 50, Duration::from_millis(100)));

        let call = {
            let gateway = gateway.clone();
            tokio::spawn(async move {
                gateway
                    .handle(br#"{"url":"https://example.com","timeout":2000}"#)
                    .await
            })
        };

        // Let the backend run well past the admission wait before answering.
        tokio::time::sleep(Duration::from_millis(400)).await;
        open.send(true).unwrap();

        let reply = call.await.unwrap();
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.outcome, Outcome::Success);
        assert_eq!(reply.body, GatewayResponse::success(204, String::new()));
        assert_eq!(gateway.admission().available(), 50);
    }

    #[tokio::test]
    async fn test_unbounded_admission_wait_does_not_overflow() {
        let backend = RecordingBackend::ok(200, "ok");
        let gateway = service(backend.clone(), 50, Duration::MAX);

        let reply = gateway.handle(br#"{"url":"https://example.com"}"#).await;

        assert_eq!(reply.outcome, Outcome::Success);
        assert_eq!(backend.calls(), 1);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::Success.as_str(), "success");
        assert_eq!(Outcome::BackendFailure.as_str(), "backend_error");
        assert_eq!(Outcome::Overloaded.as_str(), "overloaded");
        assert_eq!(Outcome::BadRequest.as_str(), "bad_request");
    }
}
