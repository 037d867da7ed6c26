//! Reference engine that identifies by byte equality.
//!
//! Stands in for the native matcher in the CLI and in tests; it honours the
//! same call contract, including the `-1` sentinel.

use async_trait::async_trait;

use super::{EngineError, MatchEngine, NO_MATCH};
use crate::ipc::Template;

#[derive(Debug, Clone)]
pub struct ExactMatchEngine {
  batch_size: usize,
}

impl ExactMatchEngine {
  pub const DEFAULT_BATCH_SIZE: usize = 64;

  pub fn new(batch_size: usize) -> Self {
    Self { batch_size }
  }
}

impl Default for ExactMatchEngine {
  fn default() -> Self {
    Self::new(Self::DEFAULT_BATCH_SIZE)
  }
}

#[async_trait]
impl MatchEngine for ExactMatchEngine {
  fn name(&self) -> &str {
    "exact"
  }

  async fn batch_size(&self) -> Result<usize, EngineError> {
    Ok(self.batch_size)
  }

  async fn identify(&self, feature: &Template, templates: &[Template]) -> Result<i64, EngineError> {
    let offset = templates
      .iter()
      .position(|candidate| candidate == feature)
      .map_or(NO_MATCH, |index| index as i64);
    Ok(offset)
  }
}
