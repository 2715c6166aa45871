use crate::errors::EditorError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_NAME: &str = "scribe.config.json";

/// Editor behaviour switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// Maximum undo steps kept (0 = unlimited)
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,

    /// Check the structural invariants after every transaction
    #[serde(default = "default_validate_on_commit")]
    pub validate_on_commit: bool,

    /// Merge adjacent text runs with equal formats after every transaction
    #[serde(default)]
    pub normalize_text_runs: bool,
}

fn default_history_depth() -> usize {
    100
}

fn default_validate_on_commit() -> bool {
    cfg!(debug_assertions)
}

impl EditorConfig {
    /// Load config from a directory, falling back to defaults
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, EditorError> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_json(&content)
        } else {
            Ok(EditorConfig::default())
        }
    }

    pub fn from_json(json: &str) -> Result<Self, EditorError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_depth: default_history_depth(),
            validate_on_commit: default_validate_on_commit(),
            normalize_text_runs: false,
        }
    }
}
