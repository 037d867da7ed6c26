//! Actor handles for communicating with workers
//!
//! Handles are cheap to clone and wrap the command channel of one
//! [`WorkerActor`](super::worker::WorkerActor). Replies never travel back
//! through the handle: every result arrives as a [`Report`](crate::ipc::Report)
//! on the report channel given to the worker at spawn time.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::ipc::{Command, WorkItem, WorkerId};

/// Handle to communicate with a WorkerActor
#[derive(Clone, Debug)]
pub struct WorkerHandle {
  id: WorkerId,
  tx: mpsc::Sender<Command>,
}

impl WorkerHandle {
  pub fn new(id: WorkerId, tx: mpsc::Sender<Command>) -> Self {
    Self { id, tx }
  }

  pub fn id(&self) -> &WorkerId {
    &self.id
  }

  /// Send a raw command to the worker
  pub async fn send(&self, command: Command) -> Result<(), SendError> {
    self.tx.send(command).await.map_err(|_| SendError::ActorGone)
  }

  /// Wait for room in the command channel without committing a command
  ///
  /// Lets a caller keep servicing other work (such as draining reports)
  /// while the worker's inbox is full.
  pub async fn reserve(&self) -> Result<mpsc::Permit<'_, Command>, SendError> {
    self.tx.reserve().await.map_err(|_| SendError::ActorGone)
  }

  /// Ask the worker to search `work.items[start..=end]`
  pub async fn start(&self, work: Arc<WorkItem>, start: i64, end: i64) -> Result<(), SendError> {
    self.send(Command::start(work, start, end)).await
  }

  /// Cancel the worker's running search, if any
  pub async fn stop(&self) -> Result<(), SendError> {
    self.send(Command::Stop).await
  }

  /// Request the worker to shutdown
  pub async fn shutdown(&self) -> Result<(), SendError> {
    self.send(Command::Shutdown).await
  }

  /// True once the worker has exited and dropped its command receiver
  pub fn is_closed(&self) -> bool {
    self.tx.is_closed()
  }
}

/// Error when sending to an actor
#[derive(Debug, Clone, thiserror::Error)]
pub enum SendError {
  #[error("Actor has shut down")]
  ActorGone,
}
