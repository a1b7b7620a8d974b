use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, Result};

const APP_DIR: &str = "release-tracker";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    pub github_token: Option<String>,

    /// Serve canned data instead of calling GitHub.
    #[serde(default)]
    pub use_fixture_data: bool,

    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_minutes: u32,
}

fn default_db_path() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("releases.db")
        .to_string_lossy()
        .to_string()
}

fn default_refresh_interval() -> u32 {
    24 * 60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            github_token: None,
            use_fixture_data: false,
            refresh_interval_minutes: default_refresh_interval(),
        }
    }
}

impl Config {
    /// Load the config file (writing defaults on first run), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(config_path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// `GITHUB_TOKEN`, `RELEASE_TRACKER_DB`, `USE_MOCK_DATA` and
    /// `RELEASE_TRACKER_REFRESH_MINUTES` win over the file.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("GITHUB_TOKEN").filter(|t| !t.trim().is_empty()) {
            self.github_token = Some(token);
        }
        if let Some(path) = lookup("RELEASE_TRACKER_DB").filter(|p| !p.trim().is_empty()) {
            self.db_path = path;
        }
        if let Some(flag) = lookup("USE_MOCK_DATA") {
            self.use_fixture_data = flag.trim().eq_ignore_ascii_case("true");
        }
        if let Some(minutes) = lookup("RELEASE_TRACKER_REFRESH_MINUTES") {
            self.refresh_interval_minutes = minutes.trim().parse().map_err(|_| {
                AppError::Config(format!(
                    "RELEASE_TRACKER_REFRESH_MINUTES must be a whole number of minutes, got {minutes:?}"
                ))
            })?;
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Result<Duration> {
        if self.refresh_interval_minutes == 0 {
            return Err(AppError::Config(
                "refresh_interval_minutes must be greater than zero".to_string(),
            ));
        }
        Ok(Duration::from_secs(u64::from(self.refresh_interval_minutes) * 60))
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }
}
