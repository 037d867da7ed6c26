//! Result reporter - turns search outcomes into outbound reports.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use super::search::{Outcome, Termination};
use crate::ipc::{Report, WorkItem, WorkerId};

/// Emits the single outbound report of each `do` a worker receives.
#[derive(Debug, Clone)]
pub struct ResultReporter {
  worker: WorkerId,
  tx: mpsc::Sender<Report>,
}

impl ResultReporter {
  pub fn new(worker: WorkerId, tx: mpsc::Sender<Report>) -> Self {
    Self { worker, tx }
  }

  /// Report the terminal outcome of an accepted search
  pub async fn done(&self, work: Arc<WorkItem>, outcome: Outcome) {
    info!(
      worker = %self.worker,
      work = %work.id,
      matched = ?outcome.matched,
      processed = outcome.processed,
      masked_failures = outcome.masked_failures,
      status = ?outcome.termination.status(),
      "Search finished"
    );

    let status = outcome.termination.status();
    let error = match outcome.termination {
      Termination::Aborted { error } => Some(error),
      _ => None,
    };

    self
      .send(Report::Done {
        work,
        matched: outcome.matched,
        worker: self.worker.clone(),
        processed: outcome.processed,
        status,
        error,
      })
      .await;
  }

  /// Report a `do` that never started
  pub async fn rejected(&self, work: Arc<WorkItem>, reason: impl Into<String>) {
    let reason = reason.into();
    warn!(worker = %self.worker, work = %work.id, reason = %reason, "Rejected search");

    self
      .send(Report::Rejected {
        work,
        worker: self.worker.clone(),
        reason,
      })
      .await;
  }

  async fn send(&self, report: Report) {
    if self.tx.send(report).await.is_err() {
      warn!(worker = %self.worker, "Report channel closed, dropping report");
    }
  }
}
