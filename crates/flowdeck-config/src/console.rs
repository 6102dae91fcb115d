use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Environment variable overriding [`EngineConfig::base_url`].
pub const ENV_ENGINE_URL: &str = "FLOWDECK_ENGINE_URL";
/// Environment variable providing the basic-auth username.
pub const ENV_ENGINE_USERNAME: &str = "FLOWDECK_ENGINE_USERNAME";
/// Environment variable providing the basic-auth password.
pub const ENV_ENGINE_PASSWORD: &str = "FLOWDECK_ENGINE_PASSWORD";
/// Environment variable providing a bearer token.
pub const ENV_ENGINE_TOKEN: &str = "FLOWDECK_ENGINE_TOKEN";

/// Top-level console configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
  pub engine: EngineConfig,
  pub polling: PollingConfig,
  pub logs: LogsConfig,
  pub store: StoreConfig,
  pub layout: LayoutConfig,
  pub bundle: BundleConfig,
}

impl ConsoleConfig {
  /// Load a config file, falling back to defaults when the file does not exist.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    if !path.exists() {
      debug!(path = %path.display(), "config file not found, using defaults");
      return Ok(Self::default());
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;

    let config: ConsoleConfig =
      serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
      })?;

    config.validate()?;
    Ok(config)
  }

  /// Apply `FLOWDECK_ENGINE_*` overrides using the given lookup.
  ///
  /// The lookup is injected so tests do not have to touch the process environment.
  pub fn apply_env<F>(&mut self, lookup: F)
  where
    F: Fn(&str) -> Option<String>,
  {
    if let Some(url) = lookup(ENV_ENGINE_URL) {
      self.engine.base_url = url;
    }

    if let Some(token) = lookup(ENV_ENGINE_TOKEN) {
      self.engine.auth = Some(EngineAuth::Bearer { token });
    } else if let (Some(username), Some(password)) =
      (lookup(ENV_ENGINE_USERNAME), lookup(ENV_ENGINE_PASSWORD))
    {
      self.engine.auth = Some(EngineAuth::Basic { username, password });
    }
  }

  /// Check values that serde cannot constrain on its own.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.engine.base_url.trim().is_empty() {
      return Err(ConfigError::Invalid {
        field: "engine.base_url".to_string(),
        message: "must not be empty".to_string(),
      });
    }
    if self.polling.interval_ms == 0 {
      return Err(ConfigError::Invalid {
        field: "polling.interval_ms".to_string(),
        message: "must be greater than zero".to_string(),
      });
    }
    if self.polling.max_consecutive_failures == 0 {
      return Err(ConfigError::Invalid {
        field: "polling.max_consecutive_failures".to_string(),
        message: "must be at least 1".to_string(),
      });
    }
    if self.layout.columns == 0 {
      return Err(ConfigError::Invalid {
        field: "layout.columns".to_string(),
        message: "must be at least 1".to_string(),
      });
    }
    Ok(())
  }
}

/// How to reach the orchestration engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Base URL of the engine API, e.g. `http://localhost:4200/api`.
  pub base_url: String,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub auth: Option<EngineAuth>,

  /// Per-request timeout.
  pub request_timeout_ms: u64,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:4200/api".to_string(),
      auth: None,
      request_timeout_ms: 30_000,
    }
  }
}

impl EngineConfig {
  pub fn request_timeout(&self) -> Duration {
    Duration::from_millis(self.request_timeout_ms)
  }
}

/// Credentials attached to every engine request.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineAuth {
  Basic { username: String, password: String },
  Bearer { token: String },
}

impl std::fmt::Debug for EngineAuth {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      EngineAuth::Basic { username, .. } => f
        .debug_struct("Basic")
        .field("username", username)
        .field("password", &"***")
        .finish(),
      EngineAuth::Bearer { .. } => f.debug_struct("Bearer").field("token", &"***").finish(),
    }
  }
}

/// Cadence and limits for observing a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
  pub interval_ms: u64,

  /// Stop observing after this long; `None` watches until a terminal state.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,

  /// Consecutive failed status fetches tolerated before giving up.
  pub max_consecutive_failures: u32,
}

impl Default for PollingConfig {
  fn default() -> Self {
    Self {
      interval_ms: 2_000,
      timeout_ms: Some(30 * 60 * 1_000),
      max_consecutive_failures: 3,
    }
  }
}

impl PollingConfig {
  pub fn interval(&self) -> Duration {
    Duration::from_millis(self.interval_ms)
  }

  pub fn timeout(&self) -> Option<Duration> {
    self.timeout_ms.map(Duration::from_millis)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
  pub page_size: u32,
}

impl Default for LogsConfig {
  fn default() -> Self {
    Self { page_size: 50 }
  }
}

/// Object store holding flow code bundles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  /// Root directory for the filesystem store. Relative paths resolve against
  /// the data directory.
  pub root: PathBuf,

  /// Key prefix under which each flow's bundle lives (`<prefix>/<flow_id>/`).
  pub flows_prefix: String,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      root: PathBuf::from("store"),
      flows_prefix: "flows".to_string(),
    }
  }
}

/// Geometry used by the hierarchy layout, in abstract canvas units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
  pub node_width: u32,
  pub node_height: u32,
  pub gap: u32,
  pub padding: u32,
  pub header_height: u32,
  /// Maximum children per row inside a container.
  pub columns: u32,
  pub min_container_width: u32,
  pub min_container_height: u32,
}

impl Default for LayoutConfig {
  fn default() -> Self {
    Self {
      node_width: 200,
      node_height: 60,
      gap: 20,
      padding: 24,
      header_height: 40,
      columns: 3,
      min_container_width: 240,
      min_container_height: 120,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
  /// File extension of entry modules, without the dot.
  pub module_extension: String,
}

impl Default for BundleConfig {
  fn default() -> Self {
    Self {
      module_extension: "py".to_string(),
    }
  }
}
