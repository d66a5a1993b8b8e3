//! tweetcast-serve - HTTP endpoint that uploads media and publishes it as a post

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use libtweetcast::logging::LoggingConfig;
use libtweetcast::{Config, Credentials, Uploader};
use tracing::info;

mod routes;

use routes::AppState;

#[derive(Parser, Debug)]
#[command(name = "tweetcast-serve")]
#[command(version)]
#[command(about = "Serve the media upload endpoint", long_about = None)]
struct Cli {
    /// Address to listen on (overrides server.bind)
    #[arg(short, long, value_name = "ADDR")]
    bind: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    LoggingConfig::from_env().with_verbose(cli.verbose).init();

    let config = Config::load().context("Failed to load configuration")?;
    // Fail at startup, not on the first request
    let credentials = Credentials::from_env().context("Failed to read API credentials")?;

    let bind = cli.bind.unwrap_or_else(|| config.server.bind.clone());
    let body_limit = config.server.body_limit_bytes;

    let uploader = Uploader::new(config, credentials)?;
    info!("Staging media in {}", uploader.staging_dir().display());

    let app = routes::router(
        AppState {
            uploader: Arc::new(uploader),
        },
        body_limit,
    );

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Listening on {}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal()?)
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolves once SIGINT or SIGTERM arrives
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Signal setup failed")?;
    let (tx, rx) = tokio::sync::oneshot::channel();

    std::thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            info!(signal, "Received shutdown signal, finishing in-flight uploads...");
            let _ = tx.send(());
        }
    });

    Ok(async move {
        let _ = rx.await;
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    Ok(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, finishing in-flight uploads...");
        }
    })
}
