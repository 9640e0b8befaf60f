use eyre::{Result, WrapErr};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::models::LoggingConfig;

/// Initialize logging from configuration. `RUST_LOG` takes precedence over `level`.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .wrap_err_with(|| format!("Invalid log level: {}", config.level))?,
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    if config.json {
        Registry::default()
            .with(env_filter)
            .with(
                fmt_layer
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init()
            .wrap_err("Failed to install tracing subscriber")?;
    } else {
        Registry::default()
            .with(env_filter)
            .with(fmt_layer.pretty().with_ansi(true))
            .try_init()
            .wrap_err("Failed to install tracing subscriber")?;
    }

    tracing::info!(
        "fetchgate logging initialized (level: {}, json: {})",
        config.level,
        config.json
    );
    Ok(())
}

/// Span wrapping one `/handle` call. Fields are filled in as they become known.
pub fn create_request_span() -> tracing::Span {
    tracing::info_span!(
        "gateway_request",
        http.method = tracing::field::Empty,
        url = tracing::field::Empty,
        http.status_code = tracing::field::Empty,
        outcome = tracing::field::Empty,
    )
}

/// Span wrapping one backend client invocation.
pub fn create_backend_span(method: &str, url: &str, fingerprint: Option<&str>) -> tracing::Span {
    tracing::info_span!(
        "backend_request",
        http.method = method,
        url = url,
        fingerprint = fingerprint.unwrap_or(""),
        http.status_code = tracing::field::Empty,
    )
}
