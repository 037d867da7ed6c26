//! WorkerPool - fans one identification out over several in-process workers
//!
//! The candidate database is split into disjoint, contiguous ranges, one per
//! worker. The first `done` report carrying a match wins; every other worker
//! is sent `stop`, and the pool keeps draining until each worker has reported
//! exactly once so no stale report leaks into the next identification.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
  handle::{SendError, WorkerHandle},
  worker::{WorkerActor, WorkerActorConfig, WorkerError},
};
use crate::{
  domain::config::WorkerConfig,
  engine::MatchEngine,
  ipc::{Report, WorkItem, WorkerId},
};

/// Split `0..len` into at most `workers` inclusive ranges of near-equal size.
///
/// Earlier ranges take the remainder. Returns no ranges for an empty database.
pub fn split_range(len: usize, workers: usize) -> Vec<(i64, i64)> {
  if len == 0 {
    return Vec::new();
  }

  let workers = workers.clamp(1, len);
  let base = len / workers;
  let extra = len % workers;

  let mut ranges = Vec::with_capacity(workers);
  let mut start = 0;
  for i in 0..workers {
    let size = base + usize::from(i < extra);
    ranges.push((start as i64, (start + size - 1) as i64));
    start += size;
  }
  ranges
}

/// Aggregated result of one pooled identification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolResult {
  /// Index into `WorkItem::items` of the first reported match
  pub matched: Option<usize>,
  /// Worker that reported the match
  pub matched_by: Option<WorkerId>,
  /// Templates compared across all workers
  pub processed: usize,
  /// Workers that took part
  pub workers: usize,
  /// Workers that rejected or aborted their share
  pub failed_workers: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
  #[error("Failed to start worker: {0}")]
  Spawn(#[from] WorkerError),
  #[error("Failed to reach worker: {0}")]
  Send(#[from] SendError),
  #[error("Report channel closed with {0} workers outstanding")]
  ReportsClosed(usize),
}

pub struct WorkerPool {
  workers: Vec<WorkerHandle>,
  reports: mpsc::Receiver<Report>,
}

impl WorkerPool {
  /// Spawn `count` workers over a shared engine
  pub async fn spawn(
    count: usize,
    engine: Arc<dyn MatchEngine>,
    config: &WorkerConfig,
    cancel: CancellationToken,
  ) -> Result<Self, PoolError> {
    let count = count.max(1);
    let (report_tx, reports) = mpsc::channel(config.report_buffer.max(count));

    let mut workers = Vec::with_capacity(count);
    for i in 0..count {
      let worker_config = WorkerActorConfig {
        id: WorkerId::new(format!("worker-{}", i)),
        worker: config.clone(),
      };
      let handle = WorkerActor::spawn(worker_config, engine.clone(), report_tx.clone(), cancel.clone()).await?;
      workers.push(handle);
    }

    info!(workers = count, engine = engine.name(), "Worker pool started");
    Ok(Self { workers, reports })
  }

  pub fn len(&self) -> usize {
    self.workers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.workers.is_empty()
  }

  /// Search `work.items` for `work.feature` across all workers
  pub async fn identify(&mut self, work: Arc<WorkItem>) -> Result<PoolResult, PoolError> {
    let ranges = split_range(work.items.len(), self.workers.len());
    let mut result = PoolResult {
      matched: None,
      matched_by: None,
      processed: 0,
      workers: ranges.len(),
      failed_workers: 0,
    };

    if ranges.is_empty() {
      debug!(work = %work.id, "Empty database, nothing to identify");
      return Ok(result);
    }

    for (worker, &(start, end)) in self.workers.iter().zip(&ranges) {
      debug!(worker = %worker.id(), start, end, "Assigning range");
      worker.start(work.clone(), start, end).await?;
    }

    let mut outstanding = ranges.len();
    while outstanding > 0 {
      let Some(report) = self.reports.recv().await else {
        return Err(PoolError::ReportsClosed(outstanding));
      };

      if report.work().id != work.id {
        debug!(worker = %report.worker(), work = %report.work().id, "Ignoring report for another work item");
        continue;
      }
      outstanding -= 1;

      match report {
        Report::Done {
          matched: Some(index),
          worker,
          processed,
          ..
        } if result.matched.is_none() => {
          info!(work = %work.id, worker = %worker, index, "Match found, stopping remaining workers");
          result.matched = Some(index);
          result.matched_by = Some(worker);
          result.processed += processed;
          self.stop_all().await;
        }
        Report::Done {
          processed, error, worker, ..
        } => {
          result.processed += processed;
          if let Some(error) = error {
            warn!(worker = %worker, error = %error, "Worker aborted its range");
            result.failed_workers += 1;
          }
        }
        Report::Rejected { worker, reason, .. } => {
          warn!(worker = %worker, reason = %reason, "Worker rejected its range");
          result.failed_workers += 1;
        }
      }
    }

    Ok(result)
  }

  async fn stop_all(&self) {
    for worker in &self.workers {
      if let Err(e) = worker.stop().await {
        debug!(worker = %worker.id(), error = %e, "Failed to stop worker");
      }
    }
  }

  /// Ask every worker to exit
  pub async fn shutdown(self) {
    for worker in &self.workers {
      let _ = worker.shutdown().await;
    }
    info!(workers = self.workers.len(), "Worker pool stopped");
  }
}
