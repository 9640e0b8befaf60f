use http::{HeaderName, HeaderValue, Method};

use crate::config::models::GatewayConfig;

/// Longest admission wait accepted from configuration (one day).
pub const MAX_ADMISSION_TIMEOUT_SECS: u64 = 86_400;

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Invalid default header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("Validation failed:\n{}", format_errors(.errors))]
    Multiple { errors: Vec<ValidationError> },
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Gateway configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the entire configuration, collecting every problem found
    pub fn validate(config: &GatewayConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = config.listen_addr() {
            errors.push(ValidationError::InvalidListenAddress {
                address: format!("{}:{}", config.host, config.port),
                reason: e.to_string(),
            });
        }
        if config.port == 0 {
            errors.push(invalid("port", "must be greater than 0"));
        }
        if config.admission.max_concurrent == 0 {
            errors.push(invalid("admission.max_concurrent", "must be greater than 0"));
        }
        if config.admission.timeout_secs == 0 {
            errors.push(invalid("admission.timeout_secs", "must be greater than 0"));
        } else if config.admission.timeout_secs > MAX_ADMISSION_TIMEOUT_SECS {
            errors.push(invalid(
                "admission.timeout_secs",
                &format!("must not exceed {MAX_ADMISSION_TIMEOUT_SECS}"),
            ));
        }
        if config.server.max_body_bytes == 0 {
            errors.push(invalid("server.max_body_bytes", "must be greater than 0"));
        }
        if config.defaults.timeout_ms == 0 {
            errors.push(invalid("defaults.timeout_ms", "must be greater than 0"));
        }
        if config.defaults.user_agent.is_empty() {
            errors.push(invalid("defaults.user_agent", "must not be empty"));
        }
        if let Err(e) = Method::from_bytes(config.defaults.method.as_bytes()) {
            errors.push(invalid("defaults.method", &e.to_string()));
        }

        for (name, value) in &config.defaults.headers {
            if let Err(e) = HeaderName::from_bytes(name.as_bytes()) {
                errors.push(ValidationError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                });
            }
            if let Err(e) = HeaderValue::from_str(value) {
                errors.push(ValidationError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                });
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple { errors }),
        }
    }
}

fn invalid(field: &str, message: &str) -> ValidationError {
    ValidationError::InvalidField {
        field: field.to_string(),
        message: message.to_string(),
    }
}
