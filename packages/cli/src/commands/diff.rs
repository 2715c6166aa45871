use super::{load_document, to_json_string};
use crate::config::Config;
use anyhow::Result;
use clap::Args;
use scribe_editor::Patch;
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Document before the change
    pub old: PathBuf,

    /// Document after the change
    pub new: PathBuf,
}

pub fn diff(args: DiffArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let old = load_document(&args.old)?;
    let new = load_document(&args.new)?;

    let patches: Vec<Patch> = scribe_editor::diff(&old, &new);
    info!(patches = patches.len(), "Computed diff");
    println!("{}", to_json_string(&patches, config.pretty)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use scribe_editor::{diff, from_json, Format, Patch};

    #[test]
    fn test_diff_between_loaded_documents() {
        let old = from_json(
            r#"{ "key": 1, "type": "root", "children": [
                { "key": 2, "type": "element", "tag": "paragraph", "children": [
                    { "key": 3, "type": "text", "text": "Hello" }
                ] }
            ] }"#,
        )
        .unwrap();
        let new = from_json(
            r#"{ "key": 1, "type": "root", "children": [
                { "key": 2, "type": "element", "tag": "paragraph", "children": [
                    { "key": 3, "type": "text", "text": "Hello", "format": ["italic"] }
                ] }
            ] }"#,
        )
        .unwrap();

        let patches = diff(&old, &new);
        assert_eq!(patches.len(), 1);
        assert!(matches!(
            &patches[0],
            Patch::SetFormat { format, .. } if format.contains(Format::Italic)
        ));
    }
}
