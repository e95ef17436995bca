use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub backend: BackendConfig,
  /// Custom title for the header (defaults to the backend host if not set)
  pub title: Option<String>,
  #[serde(default)]
  pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
  /// Base URL of the analysis backend, e.g. "https://api.example.com/"
  pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
  /// Day range for the trend charts
  #[serde(default = "default_trend_days")]
  pub trend_days: u32,
}

impl Default for DashboardConfig {
  fn default() -> Self {
    Self {
      trend_days: default_trend_days(),
    }
  }
}

fn default_trend_days() -> u32 {
  30
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./seodash.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/seodash/config.yaml
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
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/seodash/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("seodash.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("seodash").join("config.yaml");
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

    Ok(config)
  }

  /// Get the backend API token from environment variables.
  ///
  /// Checks SEODASH_API_TOKEN first, then SEO_API_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("SEODASH_API_TOKEN")
      .or_else(|_| std::env::var("SEO_API_TOKEN"))
      .map_err(|_| {
        eyre!("API token not found. Set SEODASH_API_TOKEN or SEO_API_TOKEN environment variable.")
      })
  }

  /// Title shown in the dashboard header.
  pub fn display_title(&self) -> String {
    if let Some(title) = &self.title {
      return title.clone();
    }
    url::Url::parse(&self.backend.url)
      .ok()
      .and_then(|u| u.host_str().map(String::from))
      .unwrap_or_else(|| "seodash".to_string())
  }
}
