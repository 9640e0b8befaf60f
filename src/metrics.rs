//! Lightweight metrics helpers for fetchgate.
//!
//! Thin wrappers over the `metrics` crate macros. No exporter is embedded; the
//! application can install any compatible recorder, and without one every call is a
//! no-op.
//!
//! Provided metrics:
//! * `fetchgate_requests_total` (counter, label `outcome`)
//! * `fetchgate_backend_duration_seconds` (histogram, label `outcome`)
//! * `fetchgate_inflight_requests` (gauge)
use std::time::Duration;

use metrics::{Unit, counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::Lazy;

pub const FETCHGATE_REQUESTS_TOTAL: &str = "fetchgate_requests_total";
pub const FETCHGATE_BACKEND_DURATION_SECONDS: &str = "fetchgate_backend_duration_seconds";
pub const FETCHGATE_INFLIGHT_REQUESTS: &str = "fetchgate_inflight_requests";

static DESCRIPTIONS: Lazy<()> = Lazy::new(|| {
    describe_counter!(
        FETCHGATE_REQUESTS_TOTAL,
        Unit::Count,
        "Total number of /handle calls by outcome."
    );
    describe_histogram!(
        FETCHGATE_BACKEND_DURATION_SECONDS,
        Unit::Seconds,
        "Latency of backend client invocations."
    );
    describe_gauge!(
        FETCHGATE_INFLIGHT_REQUESTS,
        "Number of admission permits currently held."
    );
});

/// Register metric descriptions with the installed recorder.
pub fn init_metrics() -> eyre::Result<()> {
    tracing::info!("Initializing fetchgate metrics");
    Lazy::force(&DESCRIPTIONS);
    Ok(())
}

/// Count one finished `/handle` call.
pub fn increment_request_total(outcome: &'static str) {
    counter!(FETCHGATE_REQUESTS_TOTAL, "outcome" => outcome).increment(1);
}

/// Record how long a backend invocation took.
pub fn record_backend_duration(outcome: &'static str, duration: Duration) {
    histogram!(FETCHGATE_BACKEND_DURATION_SECONDS, "outcome" => outcome)
        .record(duration.as_secs_f64());
}

pub fn set_inflight_requests(count: usize) {
    gauge!(FETCHGATE_INFLIGHT_REQUESTS).set(count as f64);
}
