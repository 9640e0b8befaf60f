use std::{env, path::Path};

use config::{Config, Environment, File, FileFormat};
use eyre::{Context, Result};

use crate::config::models::GatewayConfig;

/// Environment variable selecting the listening port.
pub const PORT_ENV: &str = "PORT";
/// Environment variable enabling the TLS 1.3 floor for outbound connections.
pub const TLS13_ENV: &str = "TLS13";
/// Prefix for structured overrides, e.g. `FETCHGATE__ADMISSION__MAX_CONCURRENT=100`.
pub const ENV_PREFIX: &str = "FETCHGATE";

/// Load configuration from an optional file, `FETCHGATE__*` variables, then `PORT` / `TLS13`.
pub fn load_config(config_path: Option<&str>) -> Result<GatewayConfig> {
    load_config_with_overrides(
        config_path,
        non_empty_var(PORT_ENV),
        non_empty_var(TLS13_ENV),
    )
}

/// Same as [`load_config`] with the process-level variables supplied explicitly.
pub fn load_config_with_overrides(
    config_path: Option<&str>,
    port: Option<String>,
    tls13: Option<String>,
) -> Result<GatewayConfig> {
    let mut builder = Config::builder();

    if let Some(config_path) = config_path {
        let path = Path::new(config_path);
        // Determine file format based on extension
        let format = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => FileFormat::Toml,
        };
        builder = builder.add_source(File::new(config_path, format));
    }

    let settings = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .set_override_option("port", port)
        .and_then(|b| b.set_override_option("tls13", tls13))
        .context("Failed to apply environment overrides")?
        .build()
        .with_context(|| match config_path {
            Some(path) => format!("Failed to build config from {path}"),
            None => "Failed to build config from environment".to_string(),
        })?;

    let config: GatewayConfig = settings
        .try_deserialize()
        .context("Failed to deserialize gateway config")?;

    Ok(config)
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}
