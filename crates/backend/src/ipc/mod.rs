//! IPC module - messages exchanged between a coordinator and a worker
//!
//! Both directions are JSON objects tagged by `cmd`:
//!
//! ```text
//! coordinator → worker   {"cmd":"do","work":{..},"start":0,"end":9}
//!                        {"cmd":"stop"}
//!                        {"cmd":"shutdown"}
//! worker → coordinator   {"cmd":"done","work":{..},"matched":5,"worker":"w-1",..}
//!                        {"cmd":"rejected","work":{..},"worker":"w-1","reason":".."}
//! ```
use std::sync::Arc;

use serde::{Deserialize, Serialize};

mod work;

pub use work::{Template, WorkItem, WorkerId};

// ============================================================================
// Inbound commands
// ============================================================================

/// Command sent to a worker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
  /// Search `work.items[start..=end]` for `work.feature`
  Do { work: Arc<WorkItem>, start: i64, end: i64 },
  /// Cancel the running search, if any
  Stop,
  /// Cancel the running search (reporting it) and exit the worker
  Shutdown,
}

impl Command {
  pub fn start(work: Arc<WorkItem>, start: i64, end: i64) -> Self {
    Self::Do { work, start, end }
  }
}

// ============================================================================
// Outbound reports
// ============================================================================

/// How a search terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
  Matched,
  Exhausted,
  Cancelled,
  Aborted,
}

/// Report emitted by a worker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Report {
  /// Terminal result of an accepted `do`. Exactly one per search.
  Done {
    work: Arc<WorkItem>,
    /// Index into `work.items` of the matching template, or null
    matched: Option<usize>,
    worker: WorkerId,
    /// Number of templates compared before the search terminated
    processed: usize,
    status: SearchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
  },
  /// A `do` that was not accepted (busy worker or invalid range)
  Rejected {
    work: Arc<WorkItem>,
    worker: WorkerId,
    reason: String,
  },
}

impl Report {
  pub fn work(&self) -> &Arc<WorkItem> {
    match self {
      Self::Done { work, .. } | Self::Rejected { work, .. } => work,
    }
  }

  pub fn worker(&self) -> &WorkerId {
    match self {
      Self::Done { worker, .. } | Self::Rejected { worker, .. } => worker,
    }
  }

  /// Matched index for `done` reports; `None` otherwise
  pub fn matched(&self) -> Option<usize> {
    match self {
      Self::Done { matched, .. } => *matched,
      Self::Rejected { .. } => None,
    }
  }

  pub fn is_done(&self) -> bool {
    matches!(self, Self::Done { .. })
  }
}
