//! Search range - validates the inclusive start/end pair of a `do` command.

/// Validated half-open index range `[start, end)` into `WorkItem::items`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchRange {
  start: usize,
  end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
  #[error("Range start {0} is negative")]
  NegativeStart(i64),
  #[error("Range end {end} is past the last template (have {len})")]
  OutOfBounds { end: i64, len: usize },
}

impl SearchRange {
  /// Build from the inclusive `start`/`end` pair of a `do` command.
  ///
  /// `start > end` is the empty range and is never out of bounds.
  pub fn from_inclusive(start: i64, end: i64, len: usize) -> Result<Self, RangeError> {
    if start > end {
      let at = usize::try_from(start).unwrap_or(0);
      return Ok(Self { start: at, end: at });
    }

    let first = usize::try_from(start).map_err(|_| RangeError::NegativeStart(start))?;
    let last = usize::try_from(end).map_err(|_| RangeError::NegativeStart(start))?;
    if last >= len {
      return Err(RangeError::OutOfBounds { end, len });
    }

    Ok(Self {
      start: first,
      end: last + 1,
    })
  }

  /// Half-open constructor; `end < start` collapses to empty.
  pub fn new(start: usize, end: usize) -> Self {
    Self {
      start,
      end: end.max(start),
    }
  }

  pub fn start(&self) -> usize {
    self.start
  }

  /// Exclusive end
  pub fn end(&self) -> usize {
    self.end
  }

  pub fn len(&self) -> usize {
    self.end - self.start
  }

  pub fn is_empty(&self) -> bool {
    self.start == self.end
  }

  pub fn contains(&self, index: usize) -> bool {
    (self.start..self.end).contains(&index)
  }
}
