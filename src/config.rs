use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::DEFAULT_BASE_URL;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub api: ApiConfig,
  pub cache: CacheConfig,
  pub companies: CompaniesConfig,
  /// Tracing filter used when PIVOTWATCH_LOG is unset
  pub log_level: Option<String>,
  /// Custom title for header (defaults to the API host if not set)
  pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  pub url: String,
  /// Prefills the login form
  pub email: Option<String>,
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: DEFAULT_BASE_URL.to_string(),
      email: None,
      timeout_secs: 30,
    }
  }
}

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs.max(1))
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub enabled: bool,
  pub stale_minutes: i64,
  pub retry_delay_ms: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      stale_minutes: 5,
      retry_delay_ms: 1000,
    }
  }
}

impl CacheConfig {
  pub fn stale_time(&self) -> chrono::Duration {
    chrono::Duration::minutes(self.stale_minutes.max(0))
  }

  pub fn retry_delay(&self) -> Duration {
    Duration::from_millis(self.retry_delay_ms)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompaniesConfig {
  pub page_size: u32,
}

impl Default for CompaniesConfig {
  fn default() -> Self {
    Self { page_size: 50 }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./pivotwatch.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/pivotwatch/config.yaml
  ///
  /// Without a file every setting takes its default.
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
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("pivotwatch.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("pivotwatch").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty file deserializes to unit, not a mapping
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Password used to prefill the login form.
  ///
  /// Checks PIVOTWATCH_PASSWORD.
  pub fn get_password() -> Option<String> {
    std::env::var("PIVOTWATCH_PASSWORD")
      .ok()
      .filter(|p| !p.is_empty())
  }

  /// Host shown in the header
  pub fn display_title(&self) -> String {
    if let Some(title) = &self.title {
      return title.clone();
    }
    url::Url::parse(&self.api.url)
      .ok()
      .and_then(|u| {
        u.host_str().map(|host| match u.port() {
          Some(port) => format!("{}:{}", host, port),
          None => host.to_string(),
        })
      })
      .unwrap_or_else(|| self.api.url.clone())
  }
}
