//! Configuration for bioid workers with per-project overrides.
//!
//! Config priority: explicit path > project-relative (.bioid/bioid.toml) >
//! user (~/.config/bioid/config.toml) > defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dirs;

// ============================================================================
// Worker Configuration
// ============================================================================

/// What a search does when the engine fails on a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
  /// Log the failure and treat the chunk as "no match"
  #[default]
  Mask,
  /// Abort the search and report the engine error
  Propagate,
}

/// Per-worker search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
  /// Engine failure handling: "mask" or "propagate"
  pub failure_policy: FailurePolicy,

  /// Upper bound on the engine's preferred batch size (unset = engine decides)
  pub max_batch_size: Option<usize>,

  /// Inbound command channel capacity
  pub command_buffer: usize,

  /// Outbound report channel capacity
  pub report_buffer: usize,
}

impl Default for WorkerConfig {
  fn default() -> Self {
    Self {
      failure_policy: FailurePolicy::Mask,
      max_batch_size: None,
      command_buffer: 32,
      report_buffer: 32,
    }
  }
}

// ============================================================================
// Pool Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PoolConfig {
  /// Number of in-process workers (0 = one per CPU)
  pub workers: usize,
}

impl PoolConfig {
  pub fn resolved_workers(&self) -> usize {
    if self.workers == 0 { num_cpus::get() } else { self.workers }
  }
}

// ============================================================================
// Logging Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// Log level: "off", "error", "warn", "info", "debug", "trace"
  pub log_level: String,

  /// Log file rotation: "daily", "hourly", "never"
  pub log_rotation: String,

  /// Write logs to the data directory instead of stderr
  pub log_to_file: bool,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      log_level: "info".to_string(),
      log_rotation: "daily".to_string(),
      log_to_file: false,
    }
  }
}

// ============================================================================
// Root Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
  pub worker: WorkerConfig,
  pub pool: PoolConfig,
  pub logging: LoggingConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Invalid config: {0}")]
  Parse(#[from] toml::de::Error),
  #[error("Failed to render config: {0}")]
  Render(#[from] toml::ser::Error),
}

impl Config {
  /// Load an explicit config file. Unlike `load_for_project`, errors are returned.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
  }

  /// Load config for a project directory, falling back to user config, then defaults
  pub fn load_for_project(project_path: &Path) -> Self {
    let project_config = Self::project_config_path(project_path);
    if project_config.exists()
      && let Ok(content) = std::fs::read_to_string(&project_config)
      && let Ok(config) = toml::from_str(&content)
    {
      return config;
    }

    if let Some(user_config_path) = Self::user_config_path()
      && user_config_path.exists()
      && let Ok(content) = std::fs::read_to_string(&user_config_path)
      && let Ok(config) = toml::from_str(&content)
    {
      return config;
    }

    Self::default()
  }

  /// Get the user-level config path
  pub fn user_config_path() -> Option<PathBuf> {
    Some(dirs::default_config_dir().join("config.toml"))
  }

  /// Get the project-relative config path
  pub fn project_config_path(project_path: &Path) -> PathBuf {
    project_path.join(".bioid").join("bioid.toml")
  }

  pub fn to_toml(&self) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(self)?)
  }

  /// Generate a default config file as a string
  pub fn generate_template() -> String {
    r#"# bioid configuration
# Place in .bioid/bioid.toml (project) or ~/.config/bioid/config.toml (user)

[worker]
# Engine failure handling:
#   mask      = log the failure, treat the chunk as "no match", keep searching
#   propagate = stop the search and report status "aborted" with the error
failure_policy = "mask"

# Cap on the engine's preferred batch size (uncomment to use)
# max_batch_size = 256

# Channel capacities
command_buffer = 32
report_buffer = 32

[pool]
# In-process workers for `bioid identify` (0 = one per CPU)
workers = 0

[logging]
# off, error, warn, info, debug, trace (RUST_LOG overrides)
log_level = "info"

# daily, hourly, never
log_rotation = "daily"

# Log to the data directory instead of stderr
log_to_file = false
"#
    .to_string()
  }
}
