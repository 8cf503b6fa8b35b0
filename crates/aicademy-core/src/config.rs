use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result, anyhow};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub max_file_size_mb: usize,
    pub max_files: usize,
    pub request_timeout_secs: u64,
    /// Drop responses that arrive after a newer request or edit on the same artifact
    pub discard_stale_responses: bool,
    pub sidebar_collapsed: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            max_file_size_mb: 5,
            max_files: 5,
            request_timeout_secs: 300,
            discard_stale_responses: true,
            sidebar_collapsed: false,
        }
    }
}

impl Config {
    /// Load from the user config file, then apply env var overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::get_config_path()?)?;
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Persist the sidebar preference without touching other settings
    pub fn save_sidebar_collapsed(collapsed: bool) -> Result<()> {
        let path = Self::get_config_path()?;
        let mut config = Self::load_from(&path).unwrap_or_default();
        config.sidebar_collapsed = collapsed;
        config.save_to(&path)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("AICADEMY_API_BASE_URL") {
            if !url.trim().is_empty() {
                self.api_base_url = url;
            }
        }
        if let Some(mb) = std::env::var("AICADEMY_MAX_FILE_SIZE_MB")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.max_file_size_mb = mb;
        }
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("aicademy").join("config.json"))
    }
}
