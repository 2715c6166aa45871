//! # Reconciler
//!
//! Diffs two states into an ordered patch list for an external mutable tree
//! (a DOM, a native view hierarchy, a terminal buffer).
//!
//! ## Ordering
//!
//! 1. Nodes present in the new state, in document order. Per key, content
//!    patches (`SetText`, `SetFormat`) come before `Relink`; new keys get
//!    `CreateNode` followed by `Relink`.
//! 2. `RemoveNode` for keys gone from the new state, in reverse document
//!    order so children go before their parents.
//!
//! Appliers position a relinked node by `parent` and `prev`; `next` is
//! informational. Because step 1 runs top-to-bottom, a node's parent and
//! previous sibling are always in place when its `Relink` arrives.
//!
//! ## Cost
//!
//! When both states share a storage layer (the normal case: one was
//! committed on top of the other) only keys written since that layer are
//! visited. Otherwise every key of both states is compared.

use crate::node::{FormatSet, Node};
use crate::state::{NodeStore, State};
use crate::NodeKey;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Payload of a newly created node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PatchNode {
    Root,
    Element { tag: String },
    Text { text: String, format: FormatSet },
}

impl From<&Node> for PatchNode {
    fn from(node: &Node) -> Self {
        match node {
            Node::Root(_) => PatchNode::Root,
            Node::Element(element) => PatchNode::Element {
                tag: element.tag.clone(),
            },
            Node::Text(text) => PatchNode::Text {
                text: text.text.clone(),
                format: text.format.clone(),
            },
        }
    }
}

/// One change to apply to the external tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Patch {
    CreateNode {
        key: NodeKey,
        node: PatchNode,
    },
    RemoveNode {
        key: NodeKey,
    },
    SetText {
        key: NodeKey,
        text: String,
    },
    SetFormat {
        key: NodeKey,
        format: FormatSet,
    },
    Relink {
        key: NodeKey,
        parent: NodeKey,
        prev: Option<NodeKey>,
        next: Option<NodeKey>,
    },
}

impl Patch {
    pub fn key(&self) -> NodeKey {
        match self {
            Patch::CreateNode { key, .. }
            | Patch::RemoveNode { key }
            | Patch::SetText { key, .. }
            | Patch::SetFormat { key, .. }
            | Patch::Relink { key, .. } => *key,
        }
    }

    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Patch::CreateNode { .. } | Patch::RemoveNode { .. } | Patch::Relink { .. }
        )
    }
}

/// Patches turning a tree that mirrors `old` into one that mirrors `new`
#[instrument(skip_all, fields(old_len = old.len(), new_len = new.len()))]
pub fn diff(old: &State, new: &State) -> Vec<Patch> {
    let (present, removed) = match new.changed_keys(old) {
        Some(changed) => {
            let present = in_document_order(new, changed.iter().copied().filter(|key| new.contains(*key)));
            let removed = in_document_order(
                old,
                changed
                    .iter()
                    .copied()
                    .filter(|key| !new.contains(*key) && old.contains(*key)),
            );
            (present, removed)
        }
        None => {
            debug!("States share no layer, comparing every key");
            let removed = old
                .document_order()
                .into_iter()
                .filter(|key| !new.contains(*key))
                .collect();
            (new.document_order(), removed)
        }
    };

    let mut patches = Vec::new();
    for key in present {
        if let (Some(old_arc), Some(new_arc)) = (old.node_arc(key), new.node_arc(key)) {
            if Arc::ptr_eq(old_arc, new_arc) {
                continue;
            }
        }
        if let Some(node) = new.node(key) {
            diff_node(key, old.node(key), node, &mut patches);
        }
    }
    patches.extend(removed.into_iter().rev().map(|key| Patch::RemoveNode { key }));

    debug!(patches = patches.len(), "Diff complete");
    patches
}

fn diff_node(key: NodeKey, old: Option<&Node>, new: &Node, patches: &mut Vec<Patch>) {
    let old = match old {
        Some(old) if same_shape(old, new) => old,
        // New key, or a key reused for a different kind of node
        _ => {
            patches.push(Patch::CreateNode {
                key,
                node: PatchNode::from(new),
            });
            push_relink(key, new, patches);
            return;
        }
    };

    if let (Node::Text(before), Node::Text(after)) = (old, new) {
        if before.text != after.text {
            patches.push(Patch::SetText {
                key,
                text: after.text.clone(),
            });
        }
        if before.format != after.format {
            patches.push(Patch::SetFormat {
                key,
                format: after.format.clone(),
            });
        }
    }

    if old.links() != new.links() {
        push_relink(key, new, patches);
    }
}

fn push_relink(key: NodeKey, node: &Node, patches: &mut Vec<Patch>) {
    if let Some(links) = node.links() {
        patches.push(Patch::Relink {
            key,
            parent: links.parent,
            prev: links.prev,
            next: links.next,
        });
    }
}

fn same_shape(old: &Node, new: &Node) -> bool {
    match (old, new) {
        (Node::Root(_), Node::Root(_)) | (Node::Text(_), Node::Text(_)) => true,
        (Node::Element(a), Node::Element(b)) => a.tag == b.tag,
        _ => false,
    }
}

/// Sort keys by their position in `store`
fn in_document_order<S: NodeStore>(store: &S, keys: impl Iterator<Item = NodeKey>) -> Vec<NodeKey> {
    let mut positioned: Vec<(Vec<usize>, NodeKey)> = keys
        .map(|key| (document_path(store, key), key))
        .collect();
    positioned.sort();
    positioned.into_iter().map(|(_, key)| key).collect()
}

/// Child indices from the root down to `key`
fn document_path<S: NodeStore>(store: &S, key: NodeKey) -> Vec<usize> {
    let mut path = Vec::new();
    let mut current = key;
    while let Some(parent) = store.parent(current) {
        path.push(store.index_of(current).unwrap_or(0));
        current = parent;
    }
    path.reverse();
    path
}
