use std::sync::Arc;

use clap::Parser;
use tokio::io::BufReader;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bouncer::cli::{self, Cli, Command, LogFormat};
use bouncer::config::BouncerConfig;
use bouncer::ratelimit::{FailSafe, RateLimiter};
use bouncer::retention;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = BouncerConfig::load(cli.config.as_deref())?;
    info!(
        config_path = ?cli.config,
        failure_mode = ?config.failure_mode,
        "Configuration loaded"
    );

    match cli.command {
        Command::CheckConfig => {
            print!("{}", serde_yaml::to_string(&config)?);
        }
        Command::Simulate {
            identifier,
            limit_type,
            requests,
        } => {
            let limiter = RateLimiter::from_config(&config)?;
            let report = cli::simulate(&limiter, &identifier, limit_type, requests)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Run => run(config).await?,
    }

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    // Logs go to stderr so stdout carries only decisions.
    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(true)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .init(),
    }
}

async fn run(config: BouncerConfig) -> anyhow::Result<()> {
    info!("Starting Bouncer admission control");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let limiter = Arc::new(RateLimiter::from_config(&config)?);
    info!(
        overrides = config.limits.overrides.len(),
        "Rate limiter initialized"
    );

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let sweeper = retention::spawn_sweeper(limiter.clone(), &config.retention, async move {
        let _ = stop_rx.wait_for(|stopped| *stopped).await;
    });

    let guard = FailSafe::new(limiter, config.failure_mode);
    let decided = cli::serve_lines(
        &guard,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        shutdown_signal(),
    )
    .await?;

    let _ = stop_tx.send(true);
    sweeper.await?;

    info!(decided = decided, "Bouncer stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
