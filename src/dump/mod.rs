pub mod fetcher;

pub use fetcher::{DumpFetcher, DumpSummary};

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{info, warn};
use crate::{
    config::Config,
    error::Result,
    storage::Database,
    xrpl::{HttpConnection, LedgerConnection, ReliableConnection},
};

fn spinner() -> ProgressBar {
    let progress = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        progress.set_style(style);
    }
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}

/// Connect to `node` and dump ledger `ledger_index` into `db`
pub async fn run(db: &Database, config: &Config, node: &str, ledger_index: u32) -> Result<DumpSummary> {
    let session = HttpConnection::new(node, config.request_timeout())?;
    info!("Connecting to {}...", session.url());

    let connection = ReliableConnection::with_backoff(session, config.retry_backoff());
    connection.connect().await?;

    info!("Fetching ledger {}...", ledger_index);
    let progress = spinner();
    let result = DumpFetcher::new(&connection, db)
        .with_timeout(config.request_timeout())
        .with_page_limit(config.dump.page_limit)
        .with_progress(progress.clone())
        .fetch(ledger_index)
        .await;
    progress.finish_and_clear();

    if let Err(e) = connection.disconnect().await {
        warn!("Failed to disconnect cleanly: {}", e);
    }

    let summary = result?;
    info!(
        "Dumped {} records from {} objects in {} pages",
        summary.kept_records, summary.total_objects, summary.pages
    );
    Ok(summary)
}
