//! Test helpers for worker actor tests.
//!
//! Provides `ScriptedEngine`, a matching engine whose answers are decided per
//! template index, and `WorkerTestContext` which spawns a `WorkerActor` and
//! collects its reports.

use std::{
  collections::HashSet,
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use async_trait::async_trait;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

use crate::{
  actor::{WorkerActor, WorkerActorConfig, WorkerError, handle::WorkerHandle},
  domain::config::WorkerConfig,
  engine::{EngineError, MatchEngine, NO_MATCH},
  ipc::{Report, Template, WorkItem, WorkerId},
};

// ============================================================================
// Templates
// ============================================================================

/// Template whose bytes encode its own database index.
pub fn template(index: usize) -> Template {
  Template::new((index as u32).to_le_bytes().to_vec())
}

pub fn index_of(template: &Template) -> usize {
  let bytes: [u8; 4] = template.as_bytes().try_into().expect("scripted template");
  u32::from_le_bytes(bytes) as usize
}

/// Work item with `len` scripted templates.
pub fn work(id: &str, len: usize) -> Arc<WorkItem> {
  Arc::new(WorkItem::new(
    id,
    (0..len).map(template).collect(),
    Template::new(b"query".to_vec()),
  ))
}

// ============================================================================
// ScriptedEngine
// ============================================================================

/// One recorded `identify` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Call {
  /// Database index of the first template submitted
  pub start: usize,
  pub len: usize,
}

/// Engine that matches a fixed database index and fails on chosen chunks.
///
/// Every call is recorded before it answers. With a gate installed, each call
/// waits for one permit, which lets tests hold a chunk in flight.
pub struct ScriptedEngine {
  batch_size: usize,
  matching: Option<usize>,
  failing: HashSet<usize>,
  gate: Option<Arc<Semaphore>>,
  calls: Mutex<Vec<Call>>,
  in_flight: AtomicUsize,
  max_in_flight: AtomicUsize,
}

impl ScriptedEngine {
  pub fn new(batch_size: usize) -> Self {
    Self {
      batch_size,
      matching: None,
      failing: HashSet::new(),
      gate: None,
      calls: Mutex::new(Vec::new()),
      in_flight: AtomicUsize::new(0),
      max_in_flight: AtomicUsize::new(0),
    }
  }

  /// Report a match for the template at database index `index`
  pub fn matching(mut self, index: usize) -> Self {
    self.matching = Some(index);
    self
  }

  /// Fail the call whose first template is at database index `start`
  pub fn failing_at(mut self, start: usize) -> Self {
    self.failing.insert(start);
    self
  }

  /// Hold every call until a permit is added to `gate`
  pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
    self.gate = Some(gate);
    self
  }

  pub fn calls(&self) -> Vec<Call> {
    self.calls.lock().expect("calls lock").clone()
  }

  pub fn call_count(&self) -> usize {
    self.calls.lock().expect("calls lock").len()
  }

  pub fn max_in_flight(&self) -> usize {
    self.max_in_flight.load(Ordering::SeqCst)
  }

  /// Wait until at least `count` calls have been made
  pub async fn wait_for_calls(&self, count: usize, timeout: Duration) -> bool {
    wait_for(timeout, || async { self.call_count() >= count }).await
  }
}

#[async_trait]
impl MatchEngine for ScriptedEngine {
  fn name(&self) -> &str {
    "scripted"
  }

  async fn batch_size(&self) -> Result<usize, EngineError> {
    Ok(self.batch_size)
  }

  async fn identify(&self, _feature: &Template, templates: &[Template]) -> Result<i64, EngineError> {
    let start = templates.first().map(index_of).unwrap_or(usize::MAX);
    self.calls.lock().expect("calls lock").push(Call {
      start,
      len: templates.len(),
    });

    let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_in_flight.fetch_max(now, Ordering::SeqCst);

    if let Some(gate) = &self.gate {
      gate.acquire().await.expect("gate open").forget();
    }
    tokio::task::yield_now().await;
    self.in_flight.fetch_sub(1, Ordering::SeqCst);

    if self.failing.contains(&start) {
      return Err(EngineError::Call(format!("scripted failure at {}", start)));
    }

    let offset = self
      .matching
      .and_then(|index| templates.iter().position(|t| index_of(t) == index))
      .map_or(NO_MATCH, |offset| offset as i64);
    Ok(offset)
  }
}

// ============================================================================
// WorkerTestContext
// ============================================================================

/// A spawned worker plus the receiving end of its report channel.
pub struct WorkerTestContext {
  pub handle: WorkerHandle,
  pub reports: mpsc::Receiver<Report>,
  pub cancel: CancellationToken,
}

impl WorkerTestContext {
  pub async fn spawn(engine: Arc<dyn MatchEngine>, config: WorkerConfig) -> Result<Self, WorkerError> {
    let (report_tx, reports) = mpsc::channel(16);
    let cancel = CancellationToken::new();
    let handle = WorkerActor::spawn(
      WorkerActorConfig {
        id: WorkerId::new("test-worker"),
        worker: config,
      },
      engine,
      report_tx,
      cancel.clone(),
    )
    .await?;

    Ok(Self {
      handle,
      reports,
      cancel,
    })
  }

  /// Next report, or `None` if nothing arrives within `timeout`
  pub async fn next_report(&mut self, timeout: Duration) -> Option<Report> {
    tokio::time::timeout(timeout, self.reports.recv()).await.ok().flatten()
  }

  /// Next report, panicking if none arrives in time
  pub async fn expect_report(&mut self) -> Report {
    self
      .next_report(Duration::from_secs(5))
      .await
      .expect("worker should report within 5s")
  }
}

/// Poll `check` until it returns true or `timeout` elapses.
pub async fn wait_for<F, Fut>(timeout: Duration, mut check: F) -> bool
where
  F: FnMut() -> Fut,
  Fut: std::future::Future<Output = bool>,
{
  let start = std::time::Instant::now();
  let poll_interval = Duration::from_millis(10);

  while start.elapsed() < timeout {
    if check().await {
      return true;
    }
    tokio::time::sleep(poll_interval).await;
  }

  false
}
