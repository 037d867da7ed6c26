//! CLI command implementations

mod config;
mod identify;
mod worker;

use anyhow::{Context, Result};
use bioid::config::Config;
use std::path::Path;

pub use config::{cmd_config_init, cmd_config_show};
pub use identify::cmd_identify;
pub use worker::cmd_worker;

/// Resolve the effective config: explicit file, else project, user, defaults
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
  match explicit {
    Some(path) => Config::load(path).with_context(|| format!("Failed to load config {:?}", path)),
    None => {
      let cwd = std::env::current_dir()?;
      Ok(Config::load_for_project(&cwd))
    }
  }
}
