//! # Serialization
//!
//! A state exports to a plain tree document and imports back from one:
//!
//! ```json
//! { "key": 1, "type": "root", "children": [
//!     { "key": 2, "type": "element", "tag": "paragraph", "children": [
//!         { "key": 3, "type": "text", "text": "Hello", "format": ["bold"] }
//!     ] }
//! ] }
//! ```
//!
//! Import validates the document in full before producing a state. A
//! malformed document yields [`EditorError::MalformedImport`] and nothing
//! else: no partial state is ever returned.

use crate::errors::EditorError;
use crate::node::{FormatSet, Node};
use crate::state::{NodeStore, PendingState, State};
use crate::NodeKey;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Root,
    Element,
    Text,
}

/// One node of an exported document, with its subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedNode {
    pub key: NodeKey,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<FormatSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<SerializedNode>>,
}

impl SerializedNode {
    /// Children of a container (empty for text)
    pub fn child_nodes(&self) -> &[SerializedNode] {
        self.children.as_deref().unwrap_or(&[])
    }
}

/// Export the whole tree under the root
pub fn export<S: NodeStore>(state: &S) -> SerializedNode {
    let root = state.root();
    match state.node(root) {
        Some(node) => export_node(state, root, node),
        None => SerializedNode {
            key: root,
            node_type: NodeType::Root,
            tag: None,
            text: None,
            format: None,
            children: Some(Vec::new()),
        },
    }
}

fn export_node<S: NodeStore>(state: &S, key: NodeKey, node: &Node) -> SerializedNode {
    let children = || {
        Some(
            state
                .children(key)
                .filter_map(|child| state.node(child).map(|node| export_node(state, child, node)))
                .collect(),
        )
    };

    match node {
        Node::Root(_) => SerializedNode {
            key,
            node_type: NodeType::Root,
            tag: None,
            text: None,
            format: None,
            children: children(),
        },
        Node::Element(element) => SerializedNode {
            key,
            node_type: NodeType::Element,
            tag: Some(element.tag.clone()),
            text: None,
            format: None,
            children: children(),
        },
        Node::Text(text) => SerializedNode {
            key,
            node_type: NodeType::Text,
            tag: None,
            text: Some(text.text.clone()),
            format: Some(text.format.clone()),
            children: None,
        },
    }
}

/// Build a state from an exported document
pub fn import(document: &SerializedNode) -> Result<State, EditorError> {
    if document.node_type != NodeType::Root {
        return Err(malformed(format!(
            "top-level node {} must be the root",
            document.key
        )));
    }
    if document.text.is_some() {
        return Err(malformed(format!("root {} cannot carry text", document.key)));
    }

    let mut pending = State::with_root(document.key).clone_for_edit();
    let mut seen = HashSet::from([document.key]);
    for child in document.child_nodes() {
        import_node(&mut pending, child, document.key, &mut seen)?;
    }

    let state = pending.commit();
    state
        .validate()
        .map_err(|violation| malformed(violation.to_string()))?;

    for key in &seen {
        NodeKey::reserve(*key);
    }
    debug!(nodes = state.len(), "Imported document");
    Ok(state)
}

fn import_node(
    pending: &mut PendingState,
    node: &SerializedNode,
    parent: NodeKey,
    seen: &mut HashSet<NodeKey>,
) -> Result<(), EditorError> {
    if !seen.insert(node.key) {
        return Err(malformed(format!("duplicate key {}", node.key)));
    }

    let stored = match node.node_type {
        NodeType::Root => {
            return Err(malformed(format!("nested root {} under {parent}", node.key)));
        }
        NodeType::Element => {
            if node.text.is_some() {
                return Err(malformed(format!("element {} cannot carry text", node.key)));
            }
            let tag = node
                .tag
                .clone()
                .ok_or_else(|| malformed(format!("element {} has no tag", node.key)))?;
            Node::element(tag, parent)
        }
        NodeType::Text => {
            if !node.child_nodes().is_empty() {
                return Err(malformed(format!("text {} cannot have children", node.key)));
            }
            let text = node
                .text
                .clone()
                .ok_or_else(|| malformed(format!("text {} has no text", node.key)))?;
            Node::text(text, node.format.clone().unwrap_or_default(), parent)
        }
    };

    pending.put(node.key, stored);
    pending
        .link_before(node.key, parent, None)
        .map_err(|err| malformed(err.to_string()))?;

    for child in node.child_nodes() {
        import_node(pending, child, node.key, seen)?;
    }
    Ok(())
}

fn malformed(detail: impl Into<String>) -> EditorError {
    EditorError::MalformedImport(detail.into())
}

pub fn to_json<S: NodeStore>(state: &S, pretty: bool) -> Result<String, EditorError> {
    let document = export(state);
    let json = if pretty {
        serde_json::to_string_pretty(&document)?
    } else {
        serde_json::to_string(&document)?
    };
    Ok(json)
}

pub fn from_json(json: &str) -> Result<State, EditorError> {
    let document: SerializedNode =
        serde_json::from_str(json).map_err(|err| malformed(err.to_string()))?;
    import(&document)
}
