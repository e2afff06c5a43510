//! Game configuration.
//!
//! Configuration file: `gamemaster.toml` in the working directory, or any
//! path passed explicitly. Environment variables override the file:
//! `GM_SAVE_DIR`, `GM_TEMPLATES_DIR`, `GM_MODEL`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "gamemaster.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config from {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config from {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GameConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub narrator: NarratorConfig,
}

/// Where saves and content templates live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_save_dir")]
    pub save_dir: PathBuf,

    /// Optional `character_classes.json`, `npc_templates.json`,
    /// `quest_templates.json`.
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,
}

/// Settings for the hosted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarratorConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Conversation messages sent with each request.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

fn default_save_dir() -> PathBuf {
    PathBuf::from("data/saves")
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("data/templates")
}

fn default_model() -> String {
    claude::DEFAULT_MODEL.to_string()
}

fn default_max_tokens() -> usize {
    2048
}

fn default_temperature() -> f32 {
    0.8
}

fn default_top_p() -> f32 {
    0.95
}

fn default_history_window() -> usize {
    10
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            save_dir: default_save_dir(),
            templates_dir: default_templates_dir(),
        }
    }
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            history_window: default_history_window(),
        }
    }
}

impl GameConfig {
    /// Load from `path`, or from `gamemaster.toml` if it exists, then apply
    /// environment overrides. An explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply `GM_*` overrides from `lookup`. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = get("GM_SAVE_DIR") {
            self.storage.save_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("GM_TEMPLATES_DIR") {
            self.storage.templates_dir = PathBuf::from(dir);
        }
        if let Some(model) = get("GM_MODEL") {
            self.narrator.model = model;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let n = &self.narrator;
        if n.max_tokens == 0 {
            return Err(ConfigError::Invalid {
                key: "narrator.max_tokens",
                message: "must be positive".into(),
            });
        }
        if !(0.0..=1.0).contains(&n.temperature) {
            return Err(ConfigError::Invalid {
                key: "narrator.temperature",
                message: format!("{} is outside 0.0..=1.0", n.temperature),
            });
        }
        if !(0.0..=1.0).contains(&n.top_p) {
            return Err(ConfigError::Invalid {
                key: "narrator.top_p",
                message: format!("{} is outside 0.0..=1.0", n.top_p),
            });
        }
        if n.history_window == 0 {
            return Err(ConfigError::Invalid {
                key: "narrator.history_window",
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = GameConfig::default();
        assert_eq!(config.storage.save_dir, PathBuf::from("data/saves"));
        assert_eq!(config.narrator.max_tokens, 2048);
        assert_eq!(config.narrator.history_window, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = GameConfig::from_toml(
            r#"
            [narrator]
            temperature = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.narrator.temperature, 0.5);
        assert_eq!(config.narrator.top_p, 0.95);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let env = HashMap::from([
            ("GM_SAVE_DIR", "/tmp/gm-saves".to_string()),
            ("GM_MODEL", "  ".to_string()),
        ]);
        let mut config = GameConfig::default();
        config.apply_overrides(|k| env.get(k).cloned());
        assert_eq!(config.storage.save_dir, PathBuf::from("/tmp/gm-saves"));
        assert_eq!(config.narrator.model, claude::DEFAULT_MODEL);
    }

    #[test]
    fn test_from_file_and_validation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gamemaster.toml");
        fs::write(&path, "[narrator]\nhistory_window = 0\n").unwrap();
        let config = GameConfig::from_file(&path).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                key: "narrator.history_window",
                ..
            })
        ));

        let missing = GameConfig::from_file(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));

        fs::write(&path, "narrator = 3").unwrap();
        assert!(matches!(
            GameConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
