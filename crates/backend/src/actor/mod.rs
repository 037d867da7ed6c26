//! Actor-based worker primitives
//!
//! A worker is a long-lived task that owns its search state and talks to
//! its coordinator only through messages: [`Command`](crate::ipc::Command)s
//! in, [`Report`](crate::ipc::Report)s out.
//!
//! # Actors
//!
//! - [`WorkerActor`]: Receives `do`/`stop`/`shutdown`, runs at most one search at a time
//! - [`WorkerPool`]: Splits a database over several workers and collects the first match
//!
//! # Search
//!
//! ```text
//! Command → WorkerActor → SearchController → Partitioner → MatchEngine (per chunk)
//!                              ↓
//!                         ResultReporter → Report
//! ```
//!
//! See [`search`] for the sequential, cancellable search itself.

pub mod handle;
pub mod pool;
pub mod reporter;
pub mod search;
pub mod worker;

#[cfg(test)]
mod __tests__;

pub use handle::{SendError, WorkerHandle};
pub use pool::{PoolError, PoolResult, WorkerPool, split_range};
pub use reporter::ResultReporter;
pub use worker::{WorkerActor, WorkerActorConfig, WorkerError};
