pub mod actor;
pub mod engine;
pub mod server;

mod domain;
pub use domain::config;

pub mod dirs;
pub mod ipc;

pub use actor::{WorkerActor, WorkerActorConfig, WorkerHandle, WorkerPool};
pub use engine::{ExactMatchEngine, MatchEngine};
