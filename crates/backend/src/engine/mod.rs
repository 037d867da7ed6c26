mod exact;

use std::num::NonZeroUsize;

pub use exact::ExactMatchEngine;
use tracing::{debug, trace};

use crate::{
  actor::search::Chunk,
  ipc::{Template, WorkItem},
};

/// Offset returned by `MatchEngine::identify` when no template matched.
pub const NO_MATCH: i64 = -1;

/// Call contract of the native matching engine.
///
/// The engine is opaque: the worker only knows how many templates it likes
/// per call and whether a call found the feature among them.
#[async_trait::async_trait]
pub trait MatchEngine: Send + Sync {
  fn name(&self) -> &str;

  /// Preferred number of templates per `identify` call. Queried once per worker.
  async fn batch_size(&self) -> Result<usize, EngineError>;

  /// Compare `feature` against `templates`.
  ///
  /// Returns the offset of the matching template within `templates`, or
  /// [`NO_MATCH`].
  async fn identify(&self, feature: &Template, templates: &[Template]) -> Result<i64, EngineError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
  #[error("Engine call failed: {0}")]
  Call(String),
  #[error("Engine returned offset {offset} for a chunk of {len} templates")]
  OffsetOutOfRange { offset: i64, len: usize },
  #[error("Engine reported an invalid batch size: {0}")]
  InvalidBatchSize(usize),
  #[error("Engine call did not complete: {0}")]
  Interrupted(String),
}

/// Normalized result of one engine call over one chunk
#[derive(Debug)]
pub enum Verdict {
  /// Offset of the matching template within the chunk
  Match(usize),
  NoMatch,
  Failed(EngineError),
}

/// Query the engine's preferred batch size, capped by `max`.
pub async fn preferred_batch_size(engine: &dyn MatchEngine, max: Option<usize>) -> Result<NonZeroUsize, EngineError> {
  let reported = engine.batch_size().await?;
  let preferred = NonZeroUsize::new(reported).ok_or(EngineError::InvalidBatchSize(reported))?;

  let effective = match max.and_then(NonZeroUsize::new) {
    Some(cap) if cap < preferred => cap,
    _ => preferred,
  };

  debug!(
    engine = engine.name(),
    reported,
    effective = effective.get(),
    "Resolved engine batch size"
  );
  Ok(effective)
}

/// Run one chunk through the engine and translate the raw sentinel contract
/// into a [`Verdict`]. Offsets that do not address a template of the chunk
/// are engine failures.
pub async fn identify_chunk(engine: &dyn MatchEngine, work: &WorkItem, chunk: Chunk) -> Verdict {
  let templates = chunk.templates(work);
  trace!(start = chunk.start, len = templates.len(), "Submitting chunk to engine");

  match engine.identify(&work.feature, templates).await {
    Ok(NO_MATCH) => Verdict::NoMatch,
    Ok(offset) => match usize::try_from(offset) {
      Ok(index) if index < templates.len() => Verdict::Match(index),
      _ => Verdict::Failed(EngineError::OffsetOutOfRange {
        offset,
        len: templates.len(),
      }),
    },
    Err(e) => Verdict::Failed(e),
  }
}
