//! Sequential identification search
//!
//! One search walks its assigned range chunk by chunk:
//!
//! ```text
//! Partitioner → identify_chunk → Verdict ─┬─ Match     → MatchFound
//!      ↑                                  ├─ NoMatch   → next chunk / Exhausted
//!      └──────────────────────────────────┴─ Failed    → policy: mask | propagate
//! ```
//!
//! Exactly one engine call is in flight at a time and chunks are submitted in
//! ascending order. Cancellation is checked before each chunk is produced and
//! raced against the in-flight call; the call itself is never interrupted.
//!
//! Every call holds a permit of the worker's engine slot until the engine
//! returns. A call detached by cancellation keeps its permit, so the next
//! search on the same worker waits for it before submitting its first chunk.

mod partition;
mod range;

use std::{num::NonZeroUsize, sync::Arc};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub use self::{
  partition::{Chunk, Partitioner},
  range::{RangeError, SearchRange},
};
use crate::{
  domain::config::FailurePolicy,
  engine::{EngineError, MatchEngine, Verdict, identify_chunk},
  ipc::{SearchStatus, WorkItem},
};

/// How a search ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
  MatchFound,
  Exhausted,
  Cancelled,
  /// Engine failure under [`FailurePolicy::Propagate`]
  Aborted { error: String },
}

impl Termination {
  pub fn status(&self) -> SearchStatus {
    match self {
      Self::MatchFound => SearchStatus::Matched,
      Self::Exhausted => SearchStatus::Exhausted,
      Self::Cancelled => SearchStatus::Cancelled,
      Self::Aborted { .. } => SearchStatus::Aborted,
    }
  }
}

/// Terminal result of one search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
  /// Index into `WorkItem::items`; always inside the searched range
  pub matched: Option<usize>,
  /// Templates in chunks that resolved without a match
  pub processed: usize,
  /// Chunks whose engine failure was masked as "no match"
  pub masked_failures: usize,
  pub termination: Termination,
}

#[derive(Debug, Default)]
struct SearchState {
  processed: usize,
  masked_failures: usize,
}

impl SearchState {
  fn finish(self, matched: Option<usize>, termination: Termination) -> Outcome {
    Outcome {
      matched,
      processed: self.processed,
      masked_failures: self.masked_failures,
      termination,
    }
  }
}

/// Drives one search from start to its single terminal [`Outcome`].
///
/// A controller is built fresh for every accepted `do` and consumed by
/// [`SearchController::run`].
pub struct SearchController {
  engine: Arc<dyn MatchEngine>,
  work: Arc<WorkItem>,
  range: SearchRange,
  batch_size: NonZeroUsize,
  policy: FailurePolicy,
  engine_slot: Arc<Semaphore>,
  cancel: CancellationToken,
}

/// One permit per worker: the right to have an engine call in flight.
pub fn engine_slot() -> Arc<Semaphore> {
  Arc::new(Semaphore::new(1))
}

impl SearchController {
  /// `engine_slot` must be shared by every search of one worker (see [`engine_slot`]).
  pub fn new(
    engine: Arc<dyn MatchEngine>,
    work: Arc<WorkItem>,
    range: SearchRange,
    batch_size: NonZeroUsize,
    policy: FailurePolicy,
    engine_slot: Arc<Semaphore>,
    cancel: CancellationToken,
  ) -> Self {
    Self {
      engine,
      work,
      range,
      batch_size,
      policy,
      engine_slot,
      cancel,
    }
  }

  pub fn range(&self) -> SearchRange {
    self.range
  }

  /// Run the search to completion or cancellation.
  pub async fn run(self) -> Outcome {
    let mut chunks = Partitioner::new(self.range, self.batch_size, self.cancel.clone());
    let mut state = SearchState::default();
    let mut interrupted = false;

    debug!(
      work = %self.work.id,
      start = self.range.start(),
      end = self.range.end(),
      chunks = chunks.chunk_count(),
      "Search running"
    );

    for chunk in chunks.by_ref() {
      let Some(permit) = self.acquire_engine_slot().await else {
        debug!(work = %self.work.id, chunk_start = chunk.start, "Search cancelled while waiting for the engine");
        interrupted = true;
        break;
      };

      // The call runs on its own task so that a cancelled search can return
      // without waiting while the engine finishes the chunk.
      let call = tokio::spawn({
        let engine = self.engine.clone();
        let work = self.work.clone();
        async move {
          let verdict = identify_chunk(engine.as_ref(), &work, chunk).await;
          drop(permit);
          verdict
        }
      });

      let verdict = tokio::select! {
        biased;

        _ = self.cancel.cancelled() => {
          debug!(work = %self.work.id, chunk_start = chunk.start, "Search cancelled, discarding in-flight chunk");
          interrupted = true;
          break;
        }

        joined = call => match joined {
          Ok(verdict) => verdict,
          Err(e) => Verdict::Failed(EngineError::Interrupted(e.to_string())),
        },
      };

      match verdict {
        Verdict::Match(offset) => {
          let index = chunk.start + offset;
          debug!(work = %self.work.id, index, "Chunk matched");
          return state.finish(Some(index), Termination::MatchFound);
        }
        Verdict::NoMatch => {
          state.processed += chunk.len;
        }
        Verdict::Failed(e) => match self.policy {
          FailurePolicy::Mask => {
            warn!(
              work = %self.work.id,
              chunk_start = chunk.start,
              chunk_len = chunk.len,
              error = %e,
              "Engine failed on chunk, treating as no match"
            );
            state.processed += chunk.len;
            state.masked_failures += 1;
          }
          FailurePolicy::Propagate => {
            warn!(
              work = %self.work.id,
              chunk_start = chunk.start,
              error = %e,
              "Engine failed on chunk, aborting search"
            );
            return state.finish(None, Termination::Aborted { error: e.to_string() });
          }
        },
      }
    }

    if interrupted || chunks.remaining() > 0 {
      state.finish(None, Termination::Cancelled)
    } else {
      state.finish(None, Termination::Exhausted)
    }
  }

  /// Wait for the previous engine call of this worker to return.
  ///
  /// `None` once the search is cancelled. The slot is never closed.
  async fn acquire_engine_slot(&self) -> Option<OwnedSemaphorePermit> {
    tokio::select! {
      biased;

      _ = self.cancel.cancelled() => None,
      permit = self.engine_slot.clone().acquire_owned() => permit.ok(),
    }
  }
}
