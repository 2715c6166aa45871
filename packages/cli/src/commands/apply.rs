use super::{load_document, to_json_string};
use crate::config::Config;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use scribe_editor::{
    to_json, CommandBatch, Editor, EditorConfig, EditorUpdate, SelectionInfo, State,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Serialized document (.json)
    pub document: PathBuf,

    /// Command batch (.json): `{ "selection": ..., "commands": [...] }`
    pub batch: PathBuf,

    /// Write the resulting document here
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

pub fn apply(args: ApplyArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let state = load_document(&args.document)?;
    let batch = load_batch(&args.batch)?;

    let (update, editor) = apply_batch(state, &batch, config.editor)?;
    info!(
        commands = batch.commands.len(),
        patches = update.patches().len(),
        "Batch applied"
    );
    let report = ApplyReport::new(&update, &editor)?;
    println!("{}", to_json_string(&report, config.pretty)?);

    if let Some(out) = args.out {
        let json = to_json(editor.state().as_ref(), config.pretty)?;
        fs::write(&out, json).with_context(|| format!("Failed to write {}", out.display()))?;
        eprintln!("{} {}", "Wrote".green().bold(), out.display());
    }

    Ok(())
}

/// What `apply` prints: the update plus the resolved selection
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReport<'a> {
    #[serde(flatten)]
    pub update: &'a EditorUpdate,
    pub selection_info: Option<SelectionInfo>,
}

impl<'a> ApplyReport<'a> {
    pub fn new(update: &'a EditorUpdate, editor: &Editor) -> Result<Self> {
        Ok(Self {
            update,
            selection_info: editor.selection_info()?,
        })
    }
}

fn load_batch(path: &Path) -> Result<CommandBatch> {
    let source =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&source).with_context(|| format!("Invalid command batch {}", path.display()))
}

/// Run one batch against a document, returning the update and the editor
/// holding the new state
pub fn apply_batch(
    state: State,
    batch: &CommandBatch,
    config: EditorConfig,
) -> Result<(EditorUpdate, Editor)> {
    let mut editor = Editor::from_state(state, config)?;
    let update = editor.dispatch(&batch.commands, batch.selection)?;
    Ok((update, editor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_editor::{from_json, NodeStore, Patch};

    fn document() -> State {
        from_json(
            r#"{ "key": 1, "type": "root", "children": [
                { "key": 2, "type": "element", "tag": "paragraph", "children": [
                    { "key": 3, "type": "text", "text": "Hello World" }
                ] }
            ] }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_apply_batch_from_json() {
        let batch: CommandBatch = serde_json::from_str(
            r#"{ "commands": [
                { "type": "insertText",
                  "selection": { "anchor": { "key": 3, "offset": 5 }, "focus": { "key": 3, "offset": 11 } },
                  "text": "!" }
            ] }"#,
        )
        .unwrap();

        let (update, editor) = apply_batch(document(), &batch, EditorConfig::default()).unwrap();
        assert_eq!(editor.state().text_content(), "Hello!");
        assert!(matches!(
            update.patches(),
            [Patch::SetText { text, .. }] if text == "Hello!"
        ));

        let report = ApplyReport::new(&update, &editor).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["render"]["kind"], "patches");
        assert_eq!(json["selection"]["anchor"]["offset"], 6);
        assert_eq!(json["selectionInfo"]["type"], "caret");
        assert_eq!(json["selectionInfo"]["isBackwards"], false);
    }

    #[test]
    fn test_rejected_batch_is_an_error() {
        let batch: CommandBatch =
            serde_json::from_str(r#"{ "commands": [ { "type": "removeNode", "key": 99 } ] }"#)
                .unwrap();

        let err = apply_batch(document(), &batch, EditorConfig::default()).unwrap_err();
        assert!(err.to_string().contains("#99"));
    }
}
