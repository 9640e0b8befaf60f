use std::{path::Path, sync::Arc};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use fetchgate::{
    BackendClient, GatewayServer, GatewayService, GracefulShutdown, HttpHandler,
    ReqwestBackendClient,
    config::{ConfigValidator, loader::load_config},
    metrics, tracing_setup,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    /// Optional configuration file (TOML, YAML or JSON)
    #[clap(short, long)]
    config: Option<String>,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration and exit
    Validate {
        /// Configuration file to validate
        #[clap(short, long)]
        config: Option<String>,
    },
    /// Write a default configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "fetchgate.toml")]
        config: String,
    },
    /// Start the gateway (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    let config_path = match args.command {
        Some(Commands::Validate { config }) => {
            return validate_config_command(config.or(args.config).as_deref());
        }
        Some(Commands::Init { config }) => return init_config_command(&config).await,
        Some(Commands::Serve { config }) => config.or(args.config),
        None => args.config,
    };

    let config = load_config(config_path.as_deref()).context("Failed to load configuration")?;
    ConfigValidator::validate(&config).map_err(|e| eyre!("Invalid configuration: {e}"))?;

    tracing_setup::init_tracing(&config.logging)
        .map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;
    metrics::init_metrics().map_err(|e| eyre!("Failed to initialize metrics: {}", e))?;

    // Starting: one backend client for the whole process
    let backend: Arc<dyn BackendClient> = Arc::new(ReqwestBackendClient::new(config.tls13));
    let gateway = Arc::new(GatewayService::from_config(&config, backend.clone()));
    let handler = HttpHandler::new(gateway, config.server.max_body_bytes);

    let shutdown = Arc::new(GracefulShutdown::new());
    let signal_handler_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = signal_handler_shutdown.run_signal_handler().await {
            tracing::error!("Signal handler error: {}", e);
        }
    });

    let addr = config
        .listen_addr()
        .context("Failed to parse listen address")?;
    let server = GatewayServer::bind(
        addr,
        &handler,
        backend,
        shutdown,
        config.server.shutdown_grace(),
    )
    .await?;

    tracing::info!(
        "Starting fetchgate on {} (max concurrent: {}, admission timeout: {}s, TLS 1.3 only: {})",
        server.local_addr()?,
        config.admission.max_concurrent,
        config.admission.timeout_secs,
        config.tls13
    );

    server.run().await
}

/// Validate configuration and exit
fn validate_config_command(config_path: Option<&str>) -> Result<()> {
    match config_path {
        Some(path) => println!("🔍 Validating configuration file: {path}"),
        None => println!("🔍 Validating configuration from environment and defaults"),
    }

    let config = match load_config(config_path) {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e:#}");
            std::process::exit(1);
        }
    };

    match ConfigValidator::validate(&config) {
        Ok(()) => {
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Listen Address: {}:{}", config.host, config.port);
            println!("   • Max Concurrent: {}", config.admission.max_concurrent);
            println!("   • Admission Timeout: {}s", config.admission.timeout_secs);
            println!("   • Default Timeout: {}ms", config.defaults.timeout_ms);
            println!("   • Default Headers: {}", config.defaults.headers.len());
            println!("   • TLS 1.3 Only: {}", config.tls13);
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

/// Write a default configuration file
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    let default_config = r#"# fetchgate configuration
# PORT and TLS13 environment variables override `port` and `tls13`.

host = "0.0.0.0"
port = 4829
tls13 = false

[admission]
# Requests executing against the backend at once
max_concurrent = 50
# Longest wait for a free slot, counted from arrival
timeout_secs = 60

[server]
shutdown_grace_secs = 30
max_body_bytes = 2097152

[defaults]
method = "GET"
timeout_ms = 30000
# user_agent = "Mozilla/5.0 ..."

# Replaces the built-in browser-like header table when present
# [defaults.headers]
# accept = "*/*"

[logging]
level = "info"
json = true
"#;

    tokio::fs::write(path, default_config)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'fetchgate serve --config {config_path}' to start the gateway");
    Ok(())
}
