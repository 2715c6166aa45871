//! # Scribe Editor
//!
//! Document model and reconciliation engine for structured rich text.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ input: keystrokes, toolbar, scripts         │
//! └─────────────────────────────────────────────┘
//!                     ↓ Command batch + selection
//! ┌─────────────────────────────────────────────┐
//! │ editor: transaction engine                  │
//! │  - Validate and apply commands              │
//! │  - Copy-on-write pending state              │
//! │  - Carry the selection across mutations     │
//! │  - Snapshot undo/redo                       │
//! └─────────────────────────────────────────────┘
//!                     ↓ diff(current, pending)
//! ┌─────────────────────────────────────────────┐
//! │ rendering surface: applies ordered patches  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **State is immutable once published**: edits go into a pending copy
//! 2. **Keys are identity**: nodes link to each other by key, never by pointer
//! 3. **Patches are derived**: the external tree is a projection of the state
//! 4. **Batches are atomic**: a rejected batch leaves no trace
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scribe_editor::{Command, Editor, EditorConfig, Format, Point, Selection};
//!
//! let mut editor = Editor::new(EditorConfig::default());
//! let caret = *editor.selection().unwrap();
//!
//! let update = editor.dispatch(
//!     &[Command::InsertText { selection: caret, text: "Hello".into() }],
//!     None,
//! )?;
//! for patch in update.patches() {
//!     surface.apply(patch);
//! }
//!
//! let text = caret.anchor.key;
//! editor.dispatch(
//!     &[Command::ToggleFormat {
//!         selection: Selection::range(Point::new(text, 0), Point::new(text, 5)),
//!         format: Format::Bold,
//!     }],
//!     None,
//! )?;
//!
//! editor.undo();
//! ```

mod command;
mod config;
mod editor;
mod errors;
mod history;
mod html;
mod key;
mod node;
mod normalize;
mod reconciler;
mod selection;
mod serialize;
mod shared;
mod state;
mod transaction;

pub use command::{Command, CommandBatch, NodeTemplate};
pub use config::{EditorConfig, DEFAULT_CONFIG_NAME};
pub use editor::{Editor, EditorUpdate, Render};
pub use errors::{EditorError, Invariant, InvariantViolation, TransactionError};
pub use history::{History, Snapshot};
pub use html::{html_tag, render_html, render_html_with, HtmlOptions};
pub use key::NodeKey;
pub use node::{
    ChildLinks, ElementNode, Format, FormatSet, Node, ParseFormatError, RootNode, SiblingLinks,
    TextNode,
};
pub use normalize::merge_text_runs;
pub use reconciler::{diff, Patch, PatchNode};
pub use selection::{normalize, remap, Point, Selection, SelectionInfo, SelectionType};
pub use serialize::{export, from_json, import, to_json, NodeType, SerializedNode};
pub use shared::SharedEditor;
pub use state::{Children, NodeStore, PendingState, State, MAX_LAYERS};
pub use transaction::{apply_commands, Transaction, TransactionOutcome};
