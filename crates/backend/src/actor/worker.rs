//! WorkerActor - receives search commands and runs one search at a time
//!
//! The actor is the command receiver of a worker:
//! - `do` starts a fresh [`SearchController`] over the requested range
//! - `stop` cancels the running search (no-op when idle)
//! - `shutdown` cancels and reports the running search, then exits
//!
//! A `do` that arrives while a search is running is rejected; the running
//! search is left untouched. Every accepted `do` produces exactly one `done`
//! report, every rejected one exactly one `rejected` report.

use std::{num::NonZeroUsize, sync::Arc};

use tokio::{
  sync::{Semaphore, mpsc},
  task::{JoinError, JoinHandle},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{
  handle::WorkerHandle,
  reporter::ResultReporter,
  search::{self, Outcome, SearchController, SearchRange, Termination},
};
use crate::{
  domain::config::WorkerConfig,
  engine::{self, EngineError, MatchEngine},
  ipc::{Command, Report, WorkItem, WorkerId},
};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the WorkerActor
#[derive(Debug, Clone)]
pub struct WorkerActorConfig {
  /// Identity echoed in every report
  pub id: WorkerId,
  /// Search settings from domain::config
  pub worker: WorkerConfig,
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors that prevent a worker from starting
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
  #[error("Engine capability query failed: {0}")]
  Engine(#[from] EngineError),
}

// ============================================================================
// WorkerActor
// ============================================================================

struct ActiveSearch {
  work: Arc<WorkItem>,
  cancel: CancellationToken,
  task: JoinHandle<Outcome>,
}

/// The worker actor - owns at most one running search
///
/// # Lifecycle
///
/// The actor runs in a loop until one of:
/// - The CancellationToken is triggered
/// - A `Command::Shutdown` message is received
/// - The command channel is closed
///
/// In every case a running search is cancelled and reported before exit.
pub struct WorkerActor {
  config: WorkerActorConfig,
  engine: Arc<dyn MatchEngine>,
  batch_size: NonZeroUsize,
  /// Shared by every search so a detached call from a stopped search
  /// finishes before the next search submits anything
  engine_slot: Arc<Semaphore>,
  commands: mpsc::Receiver<Command>,
  reporter: ResultReporter,
  cancel: CancellationToken,
  active: Option<ActiveSearch>,
}

impl WorkerActor {
  /// Create a new WorkerActor
  ///
  /// Queries the engine's batch size once; the actor is not started until
  /// `run()` is called.
  pub async fn new(
    config: WorkerActorConfig,
    engine: Arc<dyn MatchEngine>,
    commands: mpsc::Receiver<Command>,
    reports: mpsc::Sender<Report>,
    cancel: CancellationToken,
  ) -> Result<Self, WorkerError> {
    let batch_size = engine::preferred_batch_size(engine.as_ref(), config.worker.max_batch_size).await?;
    let reporter = ResultReporter::new(config.id.clone(), reports);

    Ok(Self {
      config,
      engine,
      batch_size,
      engine_slot: search::engine_slot(),
      commands,
      reporter,
      cancel,
      active: None,
    })
  }

  /// Spawn the actor and return a handle for sending commands
  ///
  /// Reports are delivered on `reports`; the channel closes once the actor
  /// (and every other holder of the sender) has exited.
  pub async fn spawn(
    config: WorkerActorConfig,
    engine: Arc<dyn MatchEngine>,
    reports: mpsc::Sender<Report>,
    cancel: CancellationToken,
  ) -> Result<WorkerHandle, WorkerError> {
    let (tx, rx) = mpsc::channel(config.worker.command_buffer.max(1));
    let id = config.id.clone();
    let actor = Self::new(config, engine, rx, reports, cancel).await?;
    tokio::spawn(actor.run());
    Ok(WorkerHandle::new(id, tx))
  }

  pub fn batch_size(&self) -> NonZeroUsize {
    self.batch_size
  }

  /// Main actor loop
  pub async fn run(mut self) {
    info!(
      worker = %self.config.id,
      engine = self.engine.name(),
      batch_size = self.batch_size.get(),
      policy = ?self.config.worker.failure_policy,
      "Worker started"
    );

    loop {
      tokio::select! {
          biased;

          _ = self.cancel.cancelled() => {
              info!(worker = %self.config.id, "Worker shutting down (cancelled)");
              break;
          }

          finished = wait_for_search(&mut self.active) => {
              if let Some(search) = self.active.take() {
                  let outcome = outcome_of(&self.config.id, &search.work, finished);
                  self.reporter.done(search.work, outcome).await;
              }
          }

          command = self.commands.recv() => {
              match command {
                  Some(Command::Shutdown) => {
                      info!(worker = %self.config.id, "Worker shutting down (requested)");
                      break;
                  }
                  Some(command) => self.handle_command(command).await,
                  None => {
                      info!(worker = %self.config.id, "Worker shutting down (channel closed)");
                      break;
                  }
              }
          }
      }
    }

    if let Some(search) = self.active.take() {
      search.cancel.cancel();
      let finished = search.task.await;
      let outcome = outcome_of(&self.config.id, &search.work, finished);
      self.reporter.done(search.work, outcome).await;
    }

    info!(worker = %self.config.id, "Worker stopped");
  }

  /// Dispatch a command to the appropriate handler
  async fn handle_command(&mut self, command: Command) {
    match command {
      Command::Do { work, start, end } => self.start_search(work, start, end).await,
      Command::Stop => self.stop_search(),
      Command::Shutdown => {} // Handled in main loop
    }
  }

  // ========================================================================
  // Command Handlers
  // ========================================================================

  async fn start_search(&mut self, work: Arc<WorkItem>, start: i64, end: i64) {
    if let Some(active) = &self.active {
      let reason = format!("worker busy with {}", active.work.id);
      self.reporter.rejected(work, reason).await;
      return;
    }

    let range = match SearchRange::from_inclusive(start, end, work.items.len()) {
      Ok(range) => range,
      Err(e) => {
        self.reporter.rejected(work, e.to_string()).await;
        return;
      }
    };

    // Fresh token per search: a previous stop never leaks into this one
    let cancel = self.cancel.child_token();
    let controller = SearchController::new(
      self.engine.clone(),
      work.clone(),
      range,
      self.batch_size,
      self.config.worker.failure_policy,
      self.engine_slot.clone(),
      cancel.clone(),
    );

    info!(
      worker = %self.config.id,
      work = %work.id,
      start,
      end,
      templates = range.len(),
      "Search started"
    );

    self.active = Some(ActiveSearch {
      work,
      cancel,
      task: tokio::spawn(controller.run()),
    });
  }

  fn stop_search(&mut self) {
    match &self.active {
      Some(active) => {
        debug!(worker = %self.config.id, work = %active.work.id, "Stop requested");
        active.cancel.cancel();
      }
      None => debug!(worker = %self.config.id, "Stop with no active search, ignoring"),
    }
  }
}

/// Resolve when the active search finishes; pending forever when idle
async fn wait_for_search(active: &mut Option<ActiveSearch>) -> Result<Outcome, JoinError> {
  match active {
    Some(search) => (&mut search.task).await,
    None => std::future::pending().await,
  }
}

fn outcome_of(worker: &WorkerId, work: &WorkItem, finished: Result<Outcome, JoinError>) -> Outcome {
  finished.unwrap_or_else(|e| {
    // Progress made before the failure is not recoverable
    error!(worker = %worker, work = %work.id, error = %e, "Search task failed");
    Outcome {
      matched: None,
      processed: 0,
      masked_failures: 0,
      termination: Termination::Aborted {
        error: format!("search task failed: {}", e),
      },
    }
  })
}
