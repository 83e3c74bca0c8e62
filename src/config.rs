use chrono::Duration as ChronoDuration;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const RENDER_URL: &str = "https://server-qx03.onrender.com";
const LOCAL_URL: &str = "http://localhost:5000";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub server: ServerConfig,
  pub cache: CacheConfig,
  pub proxies: ProxiesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  /// Production server
  pub render_url: String,
  /// Development server
  pub local_url: String,
  /// Use `local_url` instead of `render_url`
  pub use_local: bool,
  /// Per-request timeout; the HTTP client default applies when unset
  pub timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      render_url: RENDER_URL.to_string(),
      local_url: LOCAL_URL.to_string(),
      use_local: false,
      timeout_secs: None,
    }
  }
}

impl ServerConfig {
  /// The base URL selected by `use_local`.
  pub fn base_url(&self) -> Result<Url> {
    let raw = if self.use_local {
      &self.local_url
    } else {
      &self.render_url
    };
    Url::parse(raw).map_err(|e| eyre!("Invalid server URL {}: {}", raw, e))
  }

  pub fn timeout(&self) -> Option<Duration> {
    self.timeout_secs.map(Duration::from_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Keep the durable tier on disk; otherwise it lives in memory
  pub persist: bool,
  /// Database location (default: $XDG_DATA_HOME/churchdir/cache.db)
  pub path: Option<PathBuf>,
  /// Age after which cached data is reported as stale. Never enforced.
  pub expiration_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      persist: true,
      path: None,
      expiration_secs: 60 * 60,
    }
  }
}

impl CacheConfig {
  pub fn expiration(&self) -> ChronoDuration {
    let secs = i64::try_from(self.expiration_secs)
      .unwrap_or(i64::MAX)
      .min(i64::MAX / 1000);
    ChronoDuration::seconds(secs)
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProxiesConfig {
  /// Append CORS Anywhere to the bulk fallback chain
  pub include_cors_anywhere: bool,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./churchdir.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/churchdir/config.yaml
  ///
  /// Built-in defaults apply when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => {
        tracing::debug!("no config file found, using defaults");
        Ok(Self::default())
      }
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("churchdir.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("churchdir").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
  }
}
