//! `bioid identify` - search a template file with an in-process worker pool

use anyhow::{Context, Result};
use bioid::{
  ExactMatchEngine, WorkerPool,
  config::Config,
  ipc::{Template, WorkItem},
};
use std::{path::Path, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Parse a database file: one hex template per line, `#` comments and blank lines skipped
fn parse_database(content: &str) -> Result<Vec<Template>> {
  content
    .lines()
    .enumerate()
    .filter(|(_, line)| {
      let line = line.trim();
      !line.is_empty() && !line.starts_with('#')
    })
    .map(|(n, line)| Template::from_hex(line).with_context(|| format!("Invalid template on line {}", n + 1)))
    .collect()
}

pub async fn cmd_identify(
  config: Config,
  db: &Path,
  feature: &str,
  workers: Option<usize>,
  batch_size: Option<usize>,
) -> Result<()> {
  let content = tokio::fs::read_to_string(db)
    .await
    .with_context(|| format!("Failed to read database {:?}", db))?;
  let items = parse_database(&content)?;
  let feature = Template::from_hex(feature).context("Invalid feature")?;

  let workers = workers.unwrap_or_else(|| config.pool.resolved_workers());
  let engine = Arc::new(ExactMatchEngine::new(
    batch_size.unwrap_or(ExactMatchEngine::DEFAULT_BATCH_SIZE),
  ));

  info!(templates = items.len(), workers, "Identifying");

  let mut pool = WorkerPool::spawn(workers, engine, &config.worker, CancellationToken::new()).await?;
  let work = Arc::new(WorkItem::new(db.display().to_string(), items, feature));
  let result = pool.identify(work).await;
  pool.shutdown().await;
  let result = result?;

  let output = serde_json::json!({
    "matched": result.matched,
    "worker": result.matched_by.map(|w| w.to_string()),
    "processed": result.processed,
    "workers": result.workers,
    "failed_workers": result.failed_workers,
  });
  println!("{}", serde_json::to_string_pretty(&output)?);

  Ok(())
}
