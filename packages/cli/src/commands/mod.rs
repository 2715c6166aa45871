pub mod apply;
pub mod diff;
pub mod render;
pub mod validate;

pub use apply::{apply, ApplyArgs};
pub use diff::{diff, DiffArgs};
pub use render::{render, RenderArgs};
pub use validate::{validate, ValidateArgs};

use anyhow::{Context, Result};
use scribe_editor::{from_json, State};
use std::fs;
use std::path::Path;

/// Read and import a serialized document
pub fn load_document(path: &Path) -> Result<State> {
    let source =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    from_json(&source).with_context(|| format!("Failed to import {}", path.display()))
}

/// Serialize a value as JSON, pretty or compact
pub fn to_json_string<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}
