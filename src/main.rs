use anyhow::{Context as _, Result, bail};
use arc_swap::ArcSwap;
use clap::{Parser, Subcommand};
use promptrelay_config::{Config, ConfigWatcher, LogConfig, LogFormat};
use promptrelay_proxy::AppState;
use std::{path::PathBuf, sync::Arc};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "promptrelay", about = "promptrelay: prompt conversion gateway for LLM providers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the relay server.
    Serve {
        /// Path to the YAML configuration file.
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Override the listening port (default: 8018).
        #[arg(short, long)]
        port: Option<u16>,
        /// Override the listening address (default: 127.0.0.1).
        #[arg(long)]
        host: Option<String>,
        /// Reload the configuration file when it changes.
        #[arg(long, requires = "config")]
        watch: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            port,
            host,
            watch,
        } => cmd_serve(config, port, host, watch).await,
    }
}

async fn cmd_serve(
    config_path: Option<PathBuf>,
    port: Option<u16>,
    host: Option<String>,
    watch: bool,
) -> Result<()> {
    if let Some(path) = &config_path
        && !path.exists()
    {
        bail!("config file not found: {}", path.display());
    }

    let (shared, watcher) = match (&config_path, watch) {
        (Some(path), true) => {
            let watcher = Arc::new(
                ConfigWatcher::new(path.clone()).map_err(|e| anyhow::anyhow!("config error: {e}"))?,
            );
            (watcher.arc(), Some(watcher))
        }
        _ => {
            let config = Config::load(config_path.as_deref())
                .map_err(|e| anyhow::anyhow!("config error: {e}"))?;
            (Arc::new(ArcSwap::from_pointee(config)), None)
        }
    };

    let snapshot = shared.load_full();
    init_tracing(&snapshot.log)?;

    if let Some(watcher) = watcher {
        watcher.watch().context("failed to watch config file")?;
    }

    let addr = format!(
        "{}:{}",
        host.as_deref().unwrap_or(&snapshot.host),
        port.unwrap_or(snapshot.port)
    );
    let app = promptrelay_proxy::make_router(AppState::new(shared));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(addr = %addr, "promptrelay listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// `RUST_LOG` wins over the configured level when set.
fn init_tracing(log: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log.level))
        .context("invalid log level")?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
