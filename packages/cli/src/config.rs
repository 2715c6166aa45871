use anyhow::Context;
use scribe_editor::{EditorConfig, DEFAULT_CONFIG_NAME};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Scribe configuration file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Engine settings used for `apply`
    #[serde(default)]
    pub editor: EditorConfig,

    /// Pretty-print JSON and HTML output
    #[serde(default)]
    pub pretty: bool,
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &str) -> anyhow::Result<Self> {
        let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Invalid config {}", config_path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }
}
