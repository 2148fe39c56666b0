//! Configuration loading and store factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use learnscreen_core::engine::EngineConfig;
use learnscreen_core::traits::GameStore;

use crate::json_file::JsonFileStore;
use crate::memory::MemoryStore;

/// Which game store to use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Nothing is kept after the process exits.
    Memory,
    /// One JSON document per game under `path`.
    Json {
        #[serde(default = "default_data_dir")]
        path: String,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Json {
            path: default_data_dir(),
        }
    }
}

fn default_data_dir() -> String {
    "./learnscreen-data".to_string()
}

/// Where custom question sets come from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionsConfig {
    /// A question-set file or a directory of them. The built-in bank is used
    /// for every domain they do not cover.
    #[serde(default)]
    pub path: Option<String>,
}

/// Top-level learnscreen configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreeningConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub questions: QuestionsConfig,
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
/// Substituted values are not scanned again.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let var_name = &rest[start + 2..start + end];
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `learnscreen.toml` in the current directory
/// 2. `~/.config/learnscreen/config.toml`
///
/// `LEARNSCREEN_DATA_DIR` switches the store to JSON files under that
/// directory.
pub fn load_config() -> Result<ScreeningConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ScreeningConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("learnscreen.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<ScreeningConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ScreeningConfig::default(),
    };

    if let Ok(dir) = std::env::var("LEARNSCREEN_DATA_DIR") {
        config.store = StoreConfig::Json { path: dir };
    }

    if let StoreConfig::Json { path } = &mut config.store {
        *path = resolve_env_vars(path);
    }
    if let Some(path) = &mut config.questions.path {
        *path = resolve_env_vars(path);
    }

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("learnscreen"))
}

/// Create a store instance from its configuration.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn GameStore>> {
    match config {
        StoreConfig::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreConfig::Json { path } => {
            anyhow::ensure!(!path.trim().is_empty(), "json store path is empty");
            Ok(Arc::new(JsonFileStore::new(path)))
        }
    }
}
