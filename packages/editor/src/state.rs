//! # Document State
//!
//! Immutable snapshots of the node graph, plus the pending state a
//! transaction writes into.
//!
//! ## Storage
//!
//! ```text
//! State ──► Layer(edits of txn 3) ──► Layer(edits of txn 2) ──► Layer(base)
//!              ▲
//! PendingState │ base + private edit map
//! ```
//!
//! A published [`State`] is a stack of frozen, `Arc`-shared layers. Each
//! layer maps keys to node values (or a tombstone for removed keys); a lookup
//! walks the stack top-down. Node values are `Arc<Node>` and are never
//! mutated once stored, so snapshots share every unchanged node.
//!
//! - `clone_for_edit` is O(1): the pending state points at the same stack
//!   and starts with an empty edit map.
//! - `put`/`remove` write into the pending edit map only.
//! - `commit` freezes the edit map as a new top layer. Once the stack grows
//!   past [`MAX_LAYERS`] it is flattened into one layer. Lookups stay
//!   bounded by the layer count; the flattening commit copies every live
//!   entry, so a commit costs O(edits) plus O(n / MAX_LAYERS) amortized.
//!   Snapshots on either side of a flatten share no layer, so diffing
//!   them compares every key.

use crate::errors::{Invariant, InvariantViolation, TransactionError};
use crate::node::{Node, RootNode, SiblingLinks};
use crate::NodeKey;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Layer count at which a committed stack is flattened
pub const MAX_LAYERS: usize = 16;

type Entries = HashMap<NodeKey, Option<Arc<Node>>>;

#[derive(Debug)]
struct Layer {
    entries: Entries,
    below: Option<Arc<Layer>>,
    depth: usize,
}

impl Layer {
    fn lookup(&self, key: NodeKey) -> Option<&Arc<Node>> {
        let mut layer = Some(self);
        while let Some(current) = layer {
            if let Some(entry) = current.entries.get(&key) {
                return entry.as_ref();
            }
            layer = current.below.as_deref();
        }
        None
    }

    /// This layer and every layer below it, top first
    fn chain(&self) -> Vec<&Layer> {
        let mut stack = Vec::with_capacity(self.depth);
        let mut layer = Some(self);
        while let Some(current) = layer {
            stack.push(current);
            layer = current.below.as_deref();
        }
        stack
    }

    /// Live entries of the whole stack, bottom layer first
    fn live_entries(&self) -> HashMap<NodeKey, &Arc<Node>> {
        let mut live = HashMap::new();
        for layer in self.chain().into_iter().rev() {
            for (key, entry) in &layer.entries {
                match entry {
                    Some(node) => {
                        live.insert(*key, node);
                    }
                    None => {
                        live.remove(key);
                    }
                }
            }
        }
        live
    }

    fn flatten(&self) -> Layer {
        let entries = self
            .live_entries()
            .into_iter()
            .map(|(key, node)| (key, Some(Arc::clone(node))))
            .collect();
        Layer {
            entries,
            below: None,
            depth: 1,
        }
    }
}

/// Read access shared by published and pending states
pub trait NodeStore {
    fn root(&self) -> NodeKey;

    fn node(&self, key: NodeKey) -> Option<&Node>;

    /// Number of live nodes, root included
    fn len(&self) -> usize;

    /// Every live entry (unordered)
    fn entries(&self) -> HashMap<NodeKey, &Node>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, key: NodeKey) -> bool {
        self.node(key).is_some()
    }

    fn get(&self, key: NodeKey) -> Result<&Node, TransactionError> {
        self.node(key).ok_or(TransactionError::UnknownKey(key))
    }

    fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.node(key).and_then(Node::parent)
    }

    /// Children of a container in sibling order (empty for text and unknown keys)
    fn children(&self, key: NodeKey) -> Children<'_, Self>
    where
        Self: Sized,
    {
        Children {
            store: self,
            next: self.node(key).and_then(Node::first_child),
        }
    }

    fn child_count(&self, key: NodeKey) -> usize
    where
        Self: Sized,
    {
        self.children(key).count()
    }

    fn child_at(&self, key: NodeKey, index: usize) -> Option<NodeKey>
    where
        Self: Sized,
    {
        self.children(key).nth(index)
    }

    /// Position among siblings, found by walking `prev` links
    fn index_of(&self, key: NodeKey) -> Option<usize> {
        let mut index = 0;
        let mut current = self.node(key)?.prev();
        while let Some(prev) = current {
            index += 1;
            current = self.node(prev)?.prev();
        }
        Some(index)
    }

    /// Ancestors of `key`, nearest first
    fn ancestors(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut chain = Vec::new();
        let mut current = self.parent(key);
        while let Some(parent) = current {
            if chain.contains(&parent) {
                break;
            }
            chain.push(parent);
            current = self.parent(parent);
        }
        chain
    }

    fn is_ancestor(&self, ancestor: NodeKey, key: NodeKey) -> bool {
        self.ancestors(key).contains(&ancestor)
    }

    /// Length of the offset space of a node: chars for text, children for containers
    fn offset_len(&self, key: NodeKey) -> Result<usize, TransactionError>
    where
        Self: Sized,
    {
        Ok(match self.get(key)? {
            Node::Text(text) => text.len(),
            _ => self.child_count(key),
        })
    }

    /// Pre-order successor
    fn next_in_order(&self, key: NodeKey) -> Option<NodeKey> {
        match self.node(key)?.first_child() {
            Some(child) => Some(child),
            None => self.next_after_subtree(key),
        }
    }

    /// Pre-order successor skipping the subtree of `key`
    fn next_after_subtree(&self, key: NodeKey) -> Option<NodeKey> {
        let mut current = key;
        loop {
            let node = self.node(current)?;
            if let Some(next) = node.next() {
                return Some(next);
            }
            current = node.parent()?;
        }
    }

    /// Every reachable key in pre-order (document order)
    fn document_order(&self) -> Vec<NodeKey> {
        let mut order = Vec::with_capacity(self.len());
        let mut current = Some(self.root());
        while let Some(key) = current {
            order.push(key);
            current = self.next_in_order(key);
        }
        order
    }

    /// Document order of two nodes; an ancestor precedes its descendants
    fn compare_order(&self, a: NodeKey, b: NodeKey) -> Result<Ordering, TransactionError> {
        self.get(a)?;
        self.get(b)?;
        if a == b {
            return Ok(Ordering::Equal);
        }

        let mut a_chain = vec![a];
        a_chain.extend(self.ancestors(a));
        let mut b_chain = vec![b];
        b_chain.extend(self.ancestors(b));

        if a_chain.contains(&b) {
            return Ok(Ordering::Greater);
        }
        if b_chain.contains(&a) {
            return Ok(Ordering::Less);
        }

        let a_set: HashSet<NodeKey> = a_chain.iter().copied().collect();
        let lca_pos = b_chain
            .iter()
            .position(|key| a_set.contains(key))
            .ok_or_else(|| {
                InvariantViolation::new(
                    Invariant::Reachability,
                    Some(a),
                    format!("{a} and {b} share no ancestor"),
                )
            })?;
        let lca = b_chain[lca_pos];
        let b_child = b_chain[lca_pos - 1];
        let a_pos = a_chain.iter().position(|key| *key == lca).unwrap_or(0);
        let a_child = a_chain[a_pos.saturating_sub(1)];

        let mut current = self.node(a_child).and_then(Node::next);
        while let Some(key) = current {
            if key == b_child {
                return Ok(Ordering::Less);
            }
            current = self.node(key).and_then(Node::next);
        }
        Ok(Ordering::Greater)
    }

    /// Plain text of the document, one line per top-level block
    fn text_content(&self) -> String
    where
        Self: Sized,
    {
        let mut blocks = Vec::new();
        for block in self.children(self.root()) {
            let mut text = String::new();
            let stop = self.next_after_subtree(block);
            let mut current = Some(block);
            while let Some(key) = current {
                if Some(key) == stop {
                    break;
                }
                if let Some(Node::Text(node)) = self.node(key) {
                    text.push_str(&node.text);
                }
                current = self.next_in_order(key);
            }
            blocks.push(text);
        }
        blocks.join("\n")
    }

    /// Check the five structural invariants
    fn validate(&self) -> Result<(), InvariantViolation> {
        let entries = self.entries();
        let root = self.root();

        match entries.get(&root) {
            Some(Node::Root(_)) => {}
            _ => {
                return Err(InvariantViolation::new(
                    Invariant::SingleRoot,
                    Some(root),
                    format!("{root} is not a root node"),
                ))
            }
        }

        for (key, node) in &entries {
            if *key != root && node.parent().is_none() {
                return Err(InvariantViolation::new(
                    Invariant::SingleRoot,
                    Some(*key),
                    format!("{key} has no parent"),
                ));
            }

            let references = [
                node.parent(),
                node.prev(),
                node.next(),
                node.first_child(),
                node.last_child(),
            ];
            if let Some(missing) = references
                .into_iter()
                .flatten()
                .find(|reference| !entries.contains_key(reference))
            {
                return Err(InvariantViolation::new(
                    Invariant::DanglingReference,
                    Some(*key),
                    format!("{key} references missing {missing}"),
                ));
            }

            if let Some(next) = node.next() {
                if linked(&entries, next, *key)?.prev() != Some(*key) {
                    return Err(InvariantViolation::new(
                        Invariant::SiblingSymmetry,
                        Some(*key),
                        format!("{key}.next is {next} but {next}.prev disagrees"),
                    ));
                }
            }
            if let Some(prev) = node.prev() {
                if linked(&entries, prev, *key)?.next() != Some(*key) {
                    return Err(InvariantViolation::new(
                        Invariant::SiblingSymmetry,
                        Some(*key),
                        format!("{key}.prev is {prev} but {prev}.next disagrees"),
                    ));
                }
            }

            if let Some(children) = node.children() {
                let mut last = None;
                let mut current = children.first;
                let mut steps = 0;
                if let Some(first) = current {
                    if linked(&entries, first, *key)?.prev().is_some() {
                        return Err(InvariantViolation::new(
                            Invariant::ChildEnds,
                            Some(*key),
                            format!("first child {first} of {key} has a prev sibling"),
                        ));
                    }
                }
                while let Some(child) = current {
                    steps += 1;
                    if steps > entries.len() {
                        return Err(InvariantViolation::new(
                            Invariant::Reachability,
                            Some(*key),
                            format!("sibling chain under {key} loops"),
                        ));
                    }
                    let child_node = linked(&entries, child, *key)?;
                    if child_node.parent() != Some(*key) {
                        return Err(InvariantViolation::new(
                            Invariant::ChildEnds,
                            Some(child),
                            format!("{child} is chained under {key} but names another parent"),
                        ));
                    }
                    last = Some(child);
                    current = child_node.next();
                }
                if last != children.last {
                    return Err(InvariantViolation::new(
                        Invariant::ChildEnds,
                        Some(*key),
                        format!("last child of {key} does not end its sibling chain"),
                    ));
                }
            }
        }

        let mut visited = HashSet::with_capacity(entries.len());
        let mut stack = vec![root];
        while let Some(key) = stack.pop() {
            if !visited.insert(key) {
                return Err(InvariantViolation::new(
                    Invariant::Reachability,
                    Some(key),
                    format!("{key} is reachable more than once"),
                ));
            }
            let mut child = linked(&entries, key, key)?.first_child();
            while let Some(current) = child {
                stack.push(current);
                child = linked(&entries, current, key)?.next();
            }
        }
        if visited.len() != entries.len() {
            let orphan = entries.keys().find(|key| !visited.contains(key)).copied();
            return Err(InvariantViolation::new(
                Invariant::Reachability,
                orphan,
                format!(
                    "{} of {} nodes are unreachable from the root",
                    entries.len() - visited.len(),
                    entries.len()
                ),
            ));
        }

        Ok(())
    }
}

/// Look up a key reached through `from`'s links
fn linked<'a>(
    entries: &HashMap<NodeKey, &'a Node>,
    key: NodeKey,
    from: NodeKey,
) -> Result<&'a Node, InvariantViolation> {
    entries.get(&key).copied().ok_or_else(|| {
        InvariantViolation::new(
            Invariant::DanglingReference,
            Some(from),
            format!("{from} reaches missing {key}"),
        )
    })
}

/// Iterator over a container's children
pub struct Children<'a, S: NodeStore> {
    store: &'a S,
    next: Option<NodeKey>,
}

impl<S: NodeStore> Iterator for Children<'_, S> {
    type Item = NodeKey;

    fn next(&mut self) -> Option<NodeKey> {
        let key = self.next?;
        self.next = self.store.node(key).and_then(Node::next);
        Some(key)
    }
}

/// Published, immutable document snapshot
#[derive(Debug, Clone)]
pub struct State {
    root: NodeKey,
    top: Arc<Layer>,
    len: usize,
}

impl State {
    /// A state holding only a root node
    pub fn new() -> Self {
        Self::with_root(NodeKey::fresh())
    }

    /// A state holding only a root node under the given key
    pub fn with_root(root: NodeKey) -> Self {
        let mut entries = Entries::new();
        entries.insert(root, Some(Arc::new(Node::Root(RootNode::default()))));
        Self {
            root,
            top: Arc::new(Layer {
                entries,
                below: None,
                depth: 1,
            }),
            len: 1,
        }
    }

    /// Start a pending state that shares every node with this one
    pub fn clone_for_edit(&self) -> PendingState {
        PendingState {
            root: self.root,
            base: Arc::clone(&self.top),
            edits: Entries::new(),
            len: self.len,
        }
    }

    /// Shared node value, for identity checks between snapshots
    pub fn node_arc(&self, key: NodeKey) -> Option<&Arc<Node>> {
        self.top.lookup(key)
    }

    /// Number of frozen layers behind this snapshot
    pub fn layer_depth(&self) -> usize {
        self.top.depth
    }

    /// Keys that may differ between two snapshots sharing a common layer.
    ///
    /// `None` when the snapshots share no layer (unrelated, or separated by
    /// a flatten); callers then have to compare every key.
    pub fn changed_keys(&self, other: &State) -> Option<HashSet<NodeKey>> {
        if Arc::ptr_eq(&self.top, &other.top) {
            return Some(HashSet::new());
        }

        let mine = self.top.chain();
        let theirs = other.top.chain();
        for (j, layer) in theirs.iter().enumerate() {
            if let Some(i) = mine.iter().position(|own| std::ptr::eq(*own, *layer)) {
                let keys = mine[..i]
                    .iter()
                    .chain(theirs[..j].iter())
                    .flat_map(|layer| layer.entries.keys().copied())
                    .collect();
                return Some(keys);
            }
        }
        None
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStore for State {
    fn root(&self) -> NodeKey {
        self.root
    }

    fn node(&self, key: NodeKey) -> Option<&Node> {
        self.top.lookup(key).map(|node| node.as_ref())
    }

    fn len(&self) -> usize {
        self.len
    }

    fn entries(&self) -> HashMap<NodeKey, &Node> {
        self.top
            .live_entries()
            .into_iter()
            .map(|(key, node)| (key, node.as_ref()))
            .collect()
    }
}

/// Structural equality: same root and the same value under every key
impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        if self.root != other.root || self.len != other.len {
            return false;
        }
        if Arc::ptr_eq(&self.top, &other.top) {
            return true;
        }
        self.entries()
            .into_iter()
            .all(|(key, node)| other.node(key) == Some(node))
    }
}

/// State under construction, exclusively owned by one transaction
#[derive(Debug, Clone)]
pub struct PendingState {
    root: NodeKey,
    base: Arc<Layer>,
    edits: Entries,
    len: usize,
}

impl PendingState {
    /// Insert or replace one entry
    pub fn put(&mut self, key: NodeKey, node: Node) {
        if !self.contains(key) {
            self.len += 1;
        }
        self.edits.insert(key, Some(Arc::new(node)));
    }

    /// Drop one entry (links are not touched)
    pub fn remove(&mut self, key: NodeKey) -> Option<Arc<Node>> {
        let existing = match self.edits.get(&key) {
            Some(entry) => entry.clone(),
            None => self.base.lookup(key).cloned(),
        };
        if existing.is_some() {
            self.len -= 1;
            if self.base.lookup(key).is_some() {
                self.edits.insert(key, None);
            } else {
                self.edits.remove(&key);
            }
        }
        existing
    }

    /// Replace a node with an edited copy
    pub fn update(
        &mut self,
        key: NodeKey,
        edit: impl FnOnce(&mut Node),
    ) -> Result<(), TransactionError> {
        let mut node = self.get(key)?.clone();
        edit(&mut node);
        self.put(key, node);
        Ok(())
    }

    /// Keys written (or removed) since `clone_for_edit`
    pub fn edited_keys(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.edits.keys().copied()
    }

    pub fn edit_count(&self) -> usize {
        self.edits.len()
    }

    /// Freeze the edits into a new immutable snapshot
    pub fn commit(self) -> State {
        if self.edits.is_empty() {
            return State {
                root: self.root,
                top: self.base,
                len: self.len,
            };
        }

        let depth = self.base.depth + 1;
        let layer = Layer {
            entries: self.edits,
            below: Some(self.base),
            depth,
        };
        let top = if depth > MAX_LAYERS {
            Arc::new(layer.flatten())
        } else {
            Arc::new(layer)
        };

        State {
            root: self.root,
            top,
            len: self.len,
        }
    }

    /// Link a detached node into `parent`'s chain before `before` (or at the end).
    ///
    /// Rewrites the node, its new neighbours, and the parent only when the
    /// node becomes an end of the chain.
    pub fn link_before(
        &mut self,
        key: NodeKey,
        parent: NodeKey,
        before: Option<NodeKey>,
    ) -> Result<(), TransactionError> {
        let parent_node = self.get(parent)?;
        let parent_last = parent_node
            .children()
            .ok_or_else(|| {
                TransactionError::InvalidTreeOperation(format!(
                    "{parent} is a {} and cannot hold children",
                    parent_node.kind_name()
                ))
            })?
            .last;

        let prev = match before {
            Some(before) => {
                let before_node = self.get(before)?;
                if before_node.parent() != Some(parent) {
                    return Err(TransactionError::InvalidTreeOperation(format!(
                        "{before} is not a child of {parent}"
                    )));
                }
                before_node.prev()
            }
            None => parent_last,
        };

        self.update(key, |node| {
            if let Some(links) = node.links_mut() {
                *links = SiblingLinks {
                    parent,
                    prev,
                    next: before,
                };
            }
        })?;

        match prev {
            Some(prev) => self.update(prev, |node| {
                if let Some(links) = node.links_mut() {
                    links.next = Some(key);
                }
            })?,
            None => self.update(parent, |node| {
                if let Some(children) = node.children_mut() {
                    children.first = Some(key);
                }
            })?,
        }

        match before {
            Some(next) => self.update(next, |node| {
                if let Some(links) = node.links_mut() {
                    links.prev = Some(key);
                }
            })?,
            None => self.update(parent, |node| {
                if let Some(children) = node.children_mut() {
                    children.last = Some(key);
                }
            })?,
        }

        Ok(())
    }

    /// Link a detached node directly after `anchor`
    pub fn link_after(&mut self, key: NodeKey, anchor: NodeKey) -> Result<(), TransactionError> {
        let anchor_node = self.get(anchor)?;
        let parent = anchor_node.parent().ok_or_else(|| {
            TransactionError::InvalidTreeOperation("the root has no siblings".to_string())
        })?;
        let next = anchor_node.next();
        self.link_before(key, parent, next)
    }

    /// Link a detached node at a child index of `parent`
    pub fn link_at(
        &mut self,
        key: NodeKey,
        parent: NodeKey,
        index: usize,
    ) -> Result<(), TransactionError> {
        let count = self.child_count(parent);
        if index > count {
            return Err(TransactionError::OffsetOutOfRange {
                key: parent,
                offset: index,
                len: count,
            });
        }
        let before = self.child_at(parent, index);
        self.link_before(key, parent, before)
    }

    /// Detach a node from its sibling chain, keeping it (and its subtree) stored
    pub fn unlink(&mut self, key: NodeKey) -> Result<(), TransactionError> {
        let links = *self.get(key)?.links().ok_or_else(|| {
            TransactionError::InvalidTreeOperation("the root cannot be detached".to_string())
        })?;

        match links.prev {
            Some(prev) => self.update(prev, |node| {
                if let Some(prev_links) = node.links_mut() {
                    prev_links.next = links.next;
                }
            })?,
            None => self.update(links.parent, |node| {
                if let Some(children) = node.children_mut() {
                    children.first = links.next;
                }
            })?,
        }

        match links.next {
            Some(next) => self.update(next, |node| {
                if let Some(next_links) = node.links_mut() {
                    next_links.prev = links.prev;
                }
            })?,
            None => self.update(links.parent, |node| {
                if let Some(children) = node.children_mut() {
                    children.last = links.prev;
                }
            })?,
        }

        self.update(key, |node| {
            if let Some(own) = node.links_mut() {
                own.prev = None;
                own.next = None;
            }
        })
    }

    /// Unlink a node and drop it together with all descendants
    pub fn remove_subtree(&mut self, key: NodeKey) -> Result<Vec<NodeKey>, TransactionError> {
        self.unlink(key)?;

        let mut removed = Vec::new();
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            stack.extend(self.children(current));
            self.remove(current);
            removed.push(current);
        }
        Ok(removed)
    }
}

impl NodeStore for PendingState {
    fn root(&self) -> NodeKey {
        self.root
    }

    fn node(&self, key: NodeKey) -> Option<&Node> {
        match self.edits.get(&key) {
            Some(entry) => entry.as_deref(),
            None => self.base.lookup(key).map(|node| node.as_ref()),
        }
    }

    fn len(&self) -> usize {
        self.len
    }

    fn entries(&self) -> HashMap<NodeKey, &Node> {
        let mut live: HashMap<NodeKey, &Node> = self
            .base
            .live_entries()
            .into_iter()
            .map(|(key, node)| (key, node.as_ref()))
            .collect();
        for (key, entry) in &self.edits {
            match entry {
                Some(node) => {
                    live.insert(*key, node.as_ref());
                }
                None => {
                    live.remove(key);
                }
            }
        }
        live
    }
}
