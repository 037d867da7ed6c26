//! `bioid worker` - one worker on stdin/stdout

use anyhow::{Context, Result};
use bioid::{
  ExactMatchEngine, WorkerActor, WorkerActorConfig, config::Config, ipc::WorkerId, server,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub async fn cmd_worker(config: Config, id: Option<String>, batch_size: Option<usize>) -> Result<()> {
  let id = id.map(WorkerId::new).unwrap_or_else(WorkerId::generate);
  let engine = Arc::new(ExactMatchEngine::new(
    batch_size.unwrap_or(ExactMatchEngine::DEFAULT_BATCH_SIZE),
  ));

  let cancel = CancellationToken::new();
  let (report_tx, reports) = mpsc::channel(config.worker.report_buffer.max(1));
  let handle = WorkerActor::spawn(
    WorkerActorConfig {
      id,
      worker: config.worker,
    },
    engine,
    report_tx,
    cancel.clone(),
  )
  .await
  .context("Failed to start worker")?;

  tokio::spawn({
    let cancel = cancel.clone();
    async move {
      match tokio::signal::ctrl_c().await {
        Ok(()) => {
          info!("Interrupted, shutting worker down");
          cancel.cancel();
        }
        Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
      }
    }
  });

  let stats = server::serve(tokio::io::stdin(), tokio::io::stdout(), handle, reports).await?;
  if stats.malformed > 0 {
    warn!(malformed = stats.malformed, "Some input lines were not valid commands");
  }
  Ok(())
}
