use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::app_dirs::AppDirs;
use crate::language::Difficulty;
use crate::session::{SessionConfig, TimeLimit};

/// Settings remembered between runs. Results are never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub difficulty: Difficulty,
    pub time_limit: TimeLimit,
    pub include_numbers: bool,
    pub include_symbols: bool,
}

impl From<&SessionConfig> for Config {
    fn from(sc: &SessionConfig) -> Self {
        Self {
            difficulty: sc.difficulty,
            time_limit: sc.time_limit,
            include_numbers: sc.include_numbers,
            include_symbols: sc.include_symbols,
        }
    }
}

impl From<&Config> for SessionConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            difficulty: cfg.difficulty,
            include_numbers: cfg.include_numbers,
            include_symbols: cfg.include_symbols,
            time_limit: cfg.time_limit,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path().unwrap_or_else(|| PathBuf::from("keysprint_config.json")),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "no stored config, using defaults");
                return Config::default();
            }
        };

        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable config");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}
