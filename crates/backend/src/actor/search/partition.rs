//! Work partitioner - splits a search range into engine-sized chunks.

use std::num::NonZeroUsize;

use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::range::SearchRange;
use crate::ipc::{Template, WorkItem};

/// A contiguous slice of the search range submitted to the engine in one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
  /// Index of the first template in `WorkItem::items`
  pub start: usize,
  pub len: usize,
}

impl Chunk {
  /// Exclusive end index
  pub fn end(&self) -> usize {
    self.start + self.len
  }

  pub fn templates<'a>(&self, work: &'a WorkItem) -> &'a [Template] {
    work.items.get(self.start..self.end()).unwrap_or(&[])
  }
}

/// Lazy, restartable producer of [`Chunk`]s over a [`SearchRange`].
///
/// Chunks are ascending, contiguous and non-overlapping; all but the last
/// hold exactly `batch_size` templates. Once `cancel` fires, no further
/// chunk is produced.
#[derive(Debug)]
pub struct Partitioner {
  range: SearchRange,
  batch_size: NonZeroUsize,
  cursor: usize,
  cancel: CancellationToken,
}

impl Partitioner {
  pub fn new(range: SearchRange, batch_size: NonZeroUsize, cancel: CancellationToken) -> Self {
    Self {
      range,
      batch_size,
      cursor: range.start(),
      cancel,
    }
  }

  /// Rewind to the first chunk.
  pub fn restart(&mut self) {
    self.cursor = self.range.start();
  }

  /// Templates not yet handed out
  pub fn remaining(&self) -> usize {
    self.range.end() - self.cursor
  }

  /// Total number of chunks covering the range
  pub fn chunk_count(&self) -> usize {
    self.range.len().div_ceil(self.batch_size.get())
  }
}

impl Iterator for Partitioner {
  type Item = Chunk;

  fn next(&mut self) -> Option<Chunk> {
    if self.cancel.is_cancelled() {
      trace!(cursor = self.cursor, "Partitioner cancelled");
      return None;
    }
    if self.cursor >= self.range.end() {
      return None;
    }

    let len = self.batch_size.get().min(self.remaining());
    let chunk = Chunk {
      start: self.cursor,
      len,
    };
    self.cursor += len;
    Some(chunk)
  }
}
