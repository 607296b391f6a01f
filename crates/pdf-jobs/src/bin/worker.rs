//! Standalone queue consumer
//!
//! Run with: cargo run -p pdf-jobs --bin pdf-jobs-worker -- --config pdf-jobs.toml

use clap::Parser;
use pdf_jobs::{
    config::ServiceConfig,
    processing::{JobConsumer, OllamaSummarizer},
    queue::open_queue,
    storage::SqliteRecordStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Process at most one queued job, then exit
    #[arg(long, default_value = "false")]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_jobs=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = ServiceConfig::load(args.config.as_deref())?;
    config.validate_standalone_worker()?;

    let store = Arc::new(SqliteRecordStore::new(&config.store.path)?);
    let queue = open_queue(&config.queue)?;
    queue.ping()?;
    tracing::info!("Queue '{}' connected ({} waiting)", queue.key(), queue.len()?);

    let summarizer = Arc::new(OllamaSummarizer::new(&config.worker.summarizer)?);
    tracing::info!(
        "Summarizer: {} at {}",
        config.worker.summarizer.model,
        config.worker.summarizer.base_url
    );

    let consumer = JobConsumer::new(queue, store, summarizer, config.worker.clone());

    if args.once {
        match consumer.process_next().await? {
            Some(outcome) => tracing::info!("Processed one entry: {:?}", outcome),
            None => tracing::info!("Queue is empty"),
        }
        return Ok(());
    }

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Worker stopping after current job...");
            let _ = tx.send(true);
        }
    });

    consumer.run(rx).await;
    Ok(())
}
