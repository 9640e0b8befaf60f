//! fetchgate - a single-endpoint HTTP gateway for described outbound requests.
//!
//! Callers `POST /handle` a JSON description of an HTTP request (URL, method, headers,
//! cookies, body, proxy, timeout, user agent, fingerprint token, redirect policy). The
//! gateway applies defaults, executes it through one shared backend client and returns the
//! remote status and body as JSON.
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters** (implementations) while keeping
//! the admission, translation and orchestration logic inside `core`:
//! - [`core::AdmissionController`] bounds concurrent backend invocations (50 by default)
//! - [`core::RequestTranslator`] validates the envelope and applies defaults, with no I/O
//! - [`core::GatewayService`] ties admission, translation and the backend together
//! - [`adapters::ReqwestBackendClient`] is the production [`ports::backend_client::BackendClient`]
//! - [`adapters::GatewayServer`] owns the listener and the shutdown sequence
//!
//! # Error Reporting
//! The outer HTTP status distinguishes "the gateway rejected the call" (400 malformed,
//! 429 overloaded) from "the gateway tried": once the backend has been invoked the outer
//! status is always 200 and a failure shows up as `{"status":0,"error":"..."}`. Client
//! integrators must inspect the payload.
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use fetchgate::{
//!     GatewayService, HttpHandler, ReqwestBackendClient, config::GatewayConfig,
//!     ports::backend_client::BackendClient,
//! };
//!
//! let config = GatewayConfig::default();
//! let backend: Arc<dyn BackendClient> = Arc::new(ReqwestBackendClient::new(config.tls13));
//! let gateway = Arc::new(GatewayService::from_config(&config, backend));
//! let router = HttpHandler::new(gateway, config.server.max_body_bytes).router();
//! # let _ = router;
//! ```
pub mod config;
pub mod metrics;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

// Re-export the specific types needed by the binary crate
pub use crate::{
    adapters::{GatewayServer, HttpHandler, LifecycleState, ReqwestBackendClient},
    core::GatewayService,
    ports::backend_client::BackendClient,
    utils::GracefulShutdown,
};
