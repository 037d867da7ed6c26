//! Domain types - configuration shared by the worker, the pool and the CLI

pub mod config;
