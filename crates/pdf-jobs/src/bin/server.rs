//! Job intake server binary
//!
//! Run with: cargo run -p pdf-jobs --bin pdf-jobs-server -- --config pdf-jobs.toml

use clap::Parser;
use pdf_jobs::{config::ServiceConfig, server::JobServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Override the listen host
    #[arg(long)]
    host: Option<String>,
    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_jobs=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = ServiceConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - Staging dir: {}", config.staging.dir.display());
    tracing::info!("  - Record store: {}", config.store.path.display());
    tracing::info!(
        "  - Queue: {:?} '{}' ({:?})",
        config.queue.backend,
        config.queue.key,
        config.queue.discipline
    );
    if config.worker.embedded {
        tracing::info!("  - Embedded worker using {}", config.worker.summarizer.model);
    }

    let server = JobServer::new(config).await?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("\nEndpoints:");
    println!("  POST /upload-pdf       - Upload a PDF (multipart field 'file')");
    println!("  POST /upload-url       - Queue a PDF by URL");
    println!("  GET  /status/:job_id   - Job status");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
