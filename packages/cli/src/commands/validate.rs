use super::load_document;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use scribe_editor::{Node, NodeStore, State};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Serialized document (.json)
    pub input: PathBuf,
}

/// Node counts of a valid document
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub elements: usize,
    pub texts: usize,
    pub chars: usize,
}

pub fn validate(args: ValidateArgs, _cwd: &str) -> Result<()> {
    println!("🔍 {} {}", "Validating".green().bold(), args.input.display());

    // Import runs the structural checks; any violation surfaces as the error
    let state = load_document(&args.input)?;
    let summary = summarize(&state);

    println!("   {} Document is valid", "✓".green());
    println!("   Elements: {}", summary.elements);
    println!("   Text runs: {}", summary.texts);
    println!("   Characters: {}", summary.chars);
    Ok(())
}

pub fn summarize(state: &State) -> Summary {
    let mut summary = Summary::default();
    for node in state.entries().values() {
        match node {
            Node::Element(_) => summary.elements += 1,
            Node::Text(text) => {
                summary.texts += 1;
                summary.chars += text.len();
            }
            Node::Root(_) => {}
        }
    }
    summary
}
