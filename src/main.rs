use anyhow::{bail, Context};
use clap::Parser;
use std::sync::Arc;
use telemetry_correlator::{
    api::{build_router, AppState},
    config::Config,
    correlation::CorrelationEngine,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "telemetry-correlator", version, about = "Alert correlation server")]
struct Args {
    /// The address to listen on for HTTP requests, overrides the configured host and port
    #[arg(long, env = "CORRELATOR_LISTEN_ADDRESS")]
    listen_address: Option<String>,

    /// Configuration file (YAML or TOML)
    #[arg(long)]
    config_file: Option<String>,

    /// YAML content for the configuration file
    #[arg(long)]
    config: Option<String>,
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let config = match (&args.config, &args.config_file) {
        (Some(_), Some(_)) => bail!("can't set both --config and --config-file"),
        (Some(content), None) => Config::from_yaml_str(content).context("parse config")?,
        (None, Some(path)) => Config::from_file(path)
            .with_context(|| format!("parse config from file {}", path))?,
        (None, None) => Config::load().context("load config from CONFIG_PATH and environment")?,
    };
    Ok(config)
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "telemetry_correlator={},tower_http=info",
            config.observability.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// `:8080` listens on every interface
fn listen_address(args: &Args, config: &Config) -> String {
    match &args.listen_address {
        Some(addr) if addr.starts_with(':') => format!("0.0.0.0{}", addr),
        Some(addr) => addr.clone(),
        None => format!("{}:{}", config.server.host, config.server.http_port),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    init_tracing(&config);
    tracing::info!("Starting telemetry correlator v{}", env!("CARGO_PKG_VERSION"));

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = telemetry_correlator::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        } else {
            tracing::info!("✅ Prometheus metrics initialized");
        }
    } else {
        tracing::info!("⚠️  Prometheus metrics disabled in configuration");
    }

    let engine = CorrelationEngine::from_config(&config).context("create correlator")?;
    for source in engine.sources().iter() {
        tracing::info!(
            backend = %source.kind,
            internal = %source.internal_endpoint,
            external = %source.external_endpoint,
            "Source configured"
        );
    }

    let app = build_router(AppState::new(Arc::new(engine)));

    let addr = listen_address(&args, &config);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {}", addr))?;

    tracing::info!("🚀 HTTP server listening on http://{}", addr);
    tracing::info!("   Correlate: http://{}/v1/correlate?alertname=<name>", addr);
    tracing::info!("   Metrics: http://{}/metrics", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("HTTP server error")?;

    tracing::info!("Shutting down gracefully...");
    Ok(())
}
