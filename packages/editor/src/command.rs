//! # Commands
//!
//! Typed editing intents produced by the input collaborator. Commands are
//! pure data: the transaction engine gives them meaning.
//!
//! ## Semantics
//!
//! ### InsertText
//! - A range selection is deleted first, then the text goes in at the caret
//! - At a container boundary the text extends the neighbouring text child,
//!   or becomes a new unformatted text child
//!
//! ### DeleteRange
//! - Removes covered text and every fully covered subtree
//! - Containers on either side are not merged
//!
//! ### ToggleFormat
//! - Partially covered text runs are split at the selection boundary
//! - The flag is set on every covered run, or cleared if all runs have it
//!
//! ### InsertNode / RemoveNode / MoveNode
//! - Structural edits addressed by key and child index
//! - Moving a node under itself or a descendant is rejected

use crate::errors::TransactionError;
use crate::node::{Format, FormatSet};
use crate::selection::Selection;
use crate::state::NodeStore;
use crate::NodeKey;
use serde::{Deserialize, Serialize};

/// Shape of a node (and its subtree) to create
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeTemplate {
    Element {
        tag: String,
        #[serde(default)]
        children: Vec<NodeTemplate>,
    },
    Text {
        text: String,
        #[serde(default)]
        format: FormatSet,
    },
}

impl NodeTemplate {
    pub fn paragraph(children: Vec<NodeTemplate>) -> Self {
        NodeTemplate::Element {
            tag: "paragraph".to_string(),
            children,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        NodeTemplate::Text {
            text: text.into(),
            format: FormatSet::new(),
        }
    }

    pub fn formatted(text: impl Into<String>, format: FormatSet) -> Self {
        NodeTemplate::Text {
            text: text.into(),
            format,
        }
    }

    /// Number of nodes the template creates
    pub fn node_count(&self) -> usize {
        match self {
            NodeTemplate::Element { children, .. } => {
                1 + children.iter().map(NodeTemplate::node_count).sum::<usize>()
            }
            NodeTemplate::Text { .. } => 1,
        }
    }
}

/// One editing intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    InsertText {
        selection: Selection,
        text: String,
    },

    DeleteRange {
        selection: Selection,
    },

    ToggleFormat {
        selection: Selection,
        format: Format,
    },

    #[serde(rename_all = "camelCase")]
    InsertNode {
        parent_key: NodeKey,
        index: usize,
        node: NodeTemplate,
    },

    RemoveNode {
        key: NodeKey,
    },

    #[serde(rename_all = "camelCase")]
    MoveNode {
        key: NodeKey,
        new_parent_key: NodeKey,
        new_index: usize,
    },
}

/// A command batch plus the selection it applies against
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandBatch {
    #[serde(default)]
    pub selection: Option<Selection>,
    pub commands: Vec<Command>,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::InsertText { .. } => "insert_text",
            Command::DeleteRange { .. } => "delete_range",
            Command::ToggleFormat { .. } => "toggle_format",
            Command::InsertNode { .. } => "insert_node",
            Command::RemoveNode { .. } => "remove_node",
            Command::MoveNode { .. } => "move_node",
        }
    }

    /// Validate without applying
    pub fn validate<S: NodeStore>(&self, store: &S) -> Result<(), TransactionError> {
        match self {
            Command::InsertText { selection, .. }
            | Command::DeleteRange { selection }
            | Command::ToggleFormat { selection, .. } => selection.check(store),

            Command::InsertNode {
                parent_key, index, ..
            } => {
                let parent = store.get(*parent_key)?;
                if !parent.is_container() {
                    return Err(TransactionError::InvalidTreeOperation(format!(
                        "{parent_key} is a {} and cannot hold children",
                        parent.kind_name()
                    )));
                }
                let count = store.child_count(*parent_key);
                if *index > count {
                    return Err(TransactionError::OffsetOutOfRange {
                        key: *parent_key,
                        offset: *index,
                        len: count,
                    });
                }
                Ok(())
            }

            Command::RemoveNode { key } => {
                store.get(*key)?;
                if *key == store.root() {
                    return Err(TransactionError::InvalidTreeOperation(
                        "the root cannot be removed".to_string(),
                    ));
                }
                Ok(())
            }

            Command::MoveNode {
                key,
                new_parent_key,
                new_index,
            } => {
                let node = store.get(*key)?;
                let parent = store.get(*new_parent_key)?;
                if *key == store.root() {
                    return Err(TransactionError::InvalidTreeOperation(
                        "the root cannot be moved".to_string(),
                    ));
                }
                if !parent.is_container() {
                    return Err(TransactionError::InvalidTreeOperation(format!(
                        "{new_parent_key} is a {} and cannot hold children",
                        parent.kind_name()
                    )));
                }
                if key == new_parent_key || store.is_ancestor(*key, *new_parent_key) {
                    return Err(TransactionError::InvalidTreeOperation(format!(
                        "moving {key} under {new_parent_key} would create a cycle"
                    )));
                }

                // Index counts the destination children with the node already detached
                let mut count = store.child_count(*new_parent_key);
                if node.parent() == Some(*new_parent_key) {
                    count -= 1;
                }
                if *new_index > count {
                    return Err(TransactionError::OffsetOutOfRange {
                        key: *new_parent_key,
                        offset: *new_index,
                        len: count,
                    });
                }
                Ok(())
            }
        }
    }
}
