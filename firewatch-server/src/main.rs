// Firewatch - fire and smoke detection over HTTP

use clap::Parser;
use firewatch_server::config::{HttpConfig, ServerConfig};
use firewatch_server::http::create_router;
use firewatch_server::startup::{build_state, load_models};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "firewatch-server")]
#[command(about = "Fire and smoke detection HTTP service", version)]
struct Args {
    /// Configuration file (JSON, TOML or YAML)
    #[arg(short, long, env = "FIREWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address
    #[arg(long)]
    host: Option<String>,

    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Detector model (ONNX)
    #[arg(long)]
    model: Option<PathBuf>,

    /// Confidence threshold in [0, 1]
    #[arg(long)]
    threshold: Option<f32>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(host) = &self.host {
            config.server.bind_address = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(model) = &self.model {
            config.vision.model_path = model.clone();
        }
        if let Some(threshold) = self.threshold {
            config.vision.confidence_threshold = threshold;
        }
    }
}

fn init_tracing(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false);
    if args.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(args: &Args) -> anyhow::Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    config.apply_env()?;
    args.apply(&mut config);
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    info!("Starting Firewatch {}", env!("CARGO_PKG_VERSION"));
    let config = load_config(&args)?;

    info!("Loading models...");
    let models = match load_models(&config) {
        Ok(models) => models,
        Err(e) => {
            error!("Refusing to start: {}", e);
            return Err(e.into());
        }
    };

    let state = build_state(&config, models)?;
    let app = create_router(state);

    let listener = bind_listener(&config.server).await?;
    info!("HTTP server listening on http://{}", listener.local_addr()?);
    info!(
        "Confidence threshold {}, uploads in {:?}",
        config.vision.confidence_threshold, config.server.upload_dir
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    info!("Firewatch stopped");
    Ok(())
}

/// Bind the configured address; hostnames and bare IPv6 addresses both work
async fn bind_listener(config: &HttpConfig) -> std::io::Result<TcpListener> {
    TcpListener::bind((config.bind_address.as_str(), config.port)).await
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
