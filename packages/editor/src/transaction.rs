//! # Transactions
//!
//! Applies a command batch to a pending copy of the current state.
//!
//! ```text
//! current ──clone_for_edit──► pending ──cmd 1──► … ──cmd n──► TransactionOutcome
//!    │                                                              │
//!    └──── untouched on any error (the pending state is dropped) ◄──┘
//! ```
//!
//! Every command is validated against the pending state before it mutates
//! anything, and the first failure aborts the whole batch. Because published
//! states are immutable, aborting needs no rollback.
//!
//! The transaction also carries the selection: text commands replace it with
//! their resulting caret or range, structural commands collapse it when they
//! remove the node it points into.

use crate::command::{Command, NodeTemplate};
use crate::errors::TransactionError;
use crate::node::{byte_offset, Format, FormatSet, Node, SiblingLinks, TextNode};
use crate::normalize::merge_text_runs;
use crate::selection::{remap, Point, Selection};
use crate::state::{NodeStore, PendingState, State};
use crate::NodeKey;
use std::collections::HashSet;
use tracing::debug;

/// Result of a successful batch
#[derive(Debug)]
pub struct TransactionOutcome {
    pub pending: PendingState,
    pub selection: Option<Selection>,
    /// Keys of nodes inserted by `InsertNode`, in command order
    pub created: Vec<NodeKey>,
}

/// Apply `commands` in order against `current`.
///
/// Returns the pending state and updated selection, or the first error. On
/// error nothing is published and `current` remains the valid state.
pub fn apply_commands(
    current: &State,
    commands: &[Command],
    selection: Option<Selection>,
) -> Result<TransactionOutcome, TransactionError> {
    let mut txn = Transaction::begin(current, selection);
    for command in commands {
        txn.apply(command)?;
    }
    Ok(txn.finish())
}

/// One in-flight batch
#[derive(Debug)]
pub struct Transaction {
    base: State,
    pending: PendingState,
    selection: Option<Selection>,
    created: Vec<NodeKey>,
}

impl Transaction {
    pub fn begin(current: &State, selection: Option<Selection>) -> Self {
        Self {
            base: current.clone(),
            pending: current.clone_for_edit(),
            selection,
            created: Vec::new(),
        }
    }

    pub fn pending(&self) -> &PendingState {
        &self.pending
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Validate and apply one command
    pub fn apply(&mut self, command: &Command) -> Result<(), TransactionError> {
        command.validate(&self.pending)?;
        debug!(command = command.name(), "Applying command");

        match command {
            Command::InsertText { selection, text } => self.insert_text(selection, text),
            Command::DeleteRange { selection } => {
                let caret = self.delete_range(selection)?;
                self.selection = Some(Selection::caret(caret));
                Ok(())
            }
            Command::ToggleFormat { selection, format } => self.toggle_format(selection, *format),
            Command::InsertNode {
                parent_key,
                index,
                node,
            } => self.insert_node(*parent_key, *index, node),
            Command::RemoveNode { key } => self.remove_node(*key),
            Command::MoveNode {
                key,
                new_parent_key,
                new_index,
            } => {
                self.pending.unlink(*key)?;
                self.pending.link_at(*key, *new_parent_key, *new_index)
            }
        }
    }

    /// Merge adjacent text siblings with identical formats under every
    /// container this transaction touched
    pub fn normalize_text_runs(&mut self) -> Result<(), TransactionError> {
        let mut scope = HashSet::new();
        for key in self.pending.edited_keys() {
            match self.pending.node(key) {
                Some(node) if node.is_container() => {
                    scope.insert(key);
                }
                Some(node) => {
                    if let Some(parent) = node.parent() {
                        scope.insert(parent);
                    }
                }
                None => {}
            }
        }
        let mut scope: Vec<NodeKey> = scope.into_iter().collect();
        scope.sort();

        self.selection = merge_text_runs(&mut self.pending, &scope, self.selection)?;
        Ok(())
    }

    /// Close the batch, making sure the selection names only live keys
    pub fn finish(self) -> TransactionOutcome {
        let selection = self
            .selection
            .map(|selection| remap(&selection, &self.base, &self.pending));
        TransactionOutcome {
            pending: self.pending,
            selection,
            created: self.created,
        }
    }

    fn insert_text(&mut self, selection: &Selection, text: &str) -> Result<(), TransactionError> {
        let caret = if selection.is_collapsed() {
            selection.anchor
        } else {
            self.delete_range(selection)?
        };
        let caret = self.insert_at(caret, text)?;
        self.selection = Some(Selection::caret(caret));
        Ok(())
    }

    /// Insert text at a point, returning the caret after it
    fn insert_at(&mut self, point: Point, text: &str) -> Result<Point, TransactionError> {
        if text.is_empty() {
            return Ok(point);
        }
        let inserted = text.chars().count();

        if matches!(self.pending.get(point.key)?, Node::Text(_)) {
            self.splice_text(point.key, point.offset, point.offset, text)?;
            return Ok(Point::new(point.key, point.offset + inserted));
        }

        // Container boundary: extend a neighbouring text child if there is one
        let before = match point.offset {
            0 => None,
            index => self.pending.child_at(point.key, index - 1),
        };
        if let Some(prev) = before {
            if let Some(prev_text) = self.pending.get(prev)?.as_text() {
                let end = prev_text.len();
                self.splice_text(prev, end, end, text)?;
                return Ok(Point::new(prev, end + inserted));
            }
        }

        let after = self.pending.child_at(point.key, point.offset);
        if let Some(next) = after {
            if self.pending.get(next)?.as_text().is_some() {
                self.splice_text(next, 0, 0, text)?;
                return Ok(Point::new(next, inserted));
            }
        }

        let key = NodeKey::fresh();
        self.pending
            .put(key, Node::text(text, FormatSet::new(), point.key));
        self.pending.link_before(key, point.key, after)?;
        Ok(Point::new(key, inserted))
    }

    /// Replace chars `from..to` of a text node with `insert`
    fn splice_text(
        &mut self,
        key: NodeKey,
        from: usize,
        to: usize,
        insert: &str,
    ) -> Result<(), TransactionError> {
        let current = &self.pending.get(key)?.as_text().ok_or_else(|| {
            TransactionError::InvalidTreeOperation(format!("{key} is not a text node"))
        })?.text;
        let start = byte_offset(current, from);
        let end = byte_offset(current, to);
        let mut text = String::with_capacity(current.len() + insert.len());
        text.push_str(&current[..start]);
        text.push_str(insert);
        text.push_str(&current[end..]);

        self.pending.update(key, |node| {
            if let Some(node) = node.as_text_mut() {
                node.text = text;
            }
        })
    }

    /// Delete the selected range, returning the caret at its start
    fn delete_range(&mut self, selection: &Selection) -> Result<Point, TransactionError> {
        let (start, end) = selection.ordered(&self.pending)?;
        if start == end {
            return Ok(start);
        }

        let start_is_text = self.pending.get(start.key)?.as_text().is_some();
        let end_is_text = self.pending.get(end.key)?.as_text().is_some();

        if start.key == end.key {
            if start_is_text {
                self.splice_text(start.key, start.offset, end.offset, "")?;
            } else {
                let doomed: Vec<NodeKey> = self
                    .pending
                    .children(start.key)
                    .skip(start.offset)
                    .take(end.offset - start.offset)
                    .collect();
                for key in doomed {
                    self.pending.remove_subtree(key)?;
                }
            }
            return Ok(start);
        }

        // Walk from just after the start boundary to the end boundary,
        // collecting fully covered subtrees and descending into any node
        // that contains the end point.
        let (mut cursor, mut container) = if start_is_text {
            let node = self.pending.get(start.key)?;
            (node.next(), node.parent().unwrap_or(self.pending.root()))
        } else {
            (self.pending.child_at(start.key, start.offset), start.key)
        };
        let stop = if end_is_text {
            Some(end.key)
        } else {
            self.pending.child_at(end.key, end.offset)
        };

        let mut doomed = Vec::new();
        loop {
            match cursor {
                Some(key) if Some(key) == stop => break,
                Some(key) => {
                    if key == end.key || self.pending.is_ancestor(key, end.key) {
                        container = key;
                        cursor = self.pending.get(key)?.first_child();
                    } else {
                        doomed.push(key);
                        cursor = self.pending.get(key)?.next();
                    }
                }
                None => {
                    if stop.is_none() && container == end.key {
                        break;
                    }
                    let node = self.pending.get(container)?;
                    match node.parent() {
                        Some(parent) => {
                            cursor = node.next();
                            container = parent;
                        }
                        None => break,
                    }
                }
            }
        }

        debug!(removed = doomed.len(), "Deleting covered subtrees");
        for key in doomed {
            self.pending.remove_subtree(key)?;
        }

        if start_is_text {
            let len = self.pending.offset_len(start.key)?;
            self.splice_text(start.key, start.offset, len, "")?;
        }
        if end_is_text {
            self.splice_text(end.key, 0, end.offset, "")?;
            if self.pending.offset_len(end.key)? == 0 {
                self.pending.remove_subtree(end.key)?;
            }
        }

        Ok(start)
    }

    fn toggle_format(&mut self, selection: &Selection, format: Format) -> Result<(), TransactionError> {
        let (start, end) = selection.ordered(&self.pending)?;
        if start == end {
            return Ok(());
        }
        let backwards = selection.is_backwards(&self.pending)?;
        let runs = self.covered_runs(start, end)?;
        if runs.is_empty() {
            return Ok(());
        }

        let all_have = runs.iter().all(|(key, _, _)| {
            self.pending
                .node(*key)
                .and_then(Node::as_text)
                .is_some_and(|text| text.format.contains(format))
        });

        let mut targets = Vec::with_capacity(runs.len());
        for (key, from, to) in runs {
            let target = self.isolate(key, from, to)?;
            self.pending.update(target, |node| {
                if let Some(text) = node.as_text_mut() {
                    let current = std::mem::take(&mut text.format);
                    text.format = if all_have {
                        current.without(format)
                    } else {
                        current.with(format)
                    };
                }
            })?;
            targets.push(target);
        }

        debug!(runs = targets.len(), format = %format, remove = all_have, "Toggled format");

        let first = targets[0];
        let last = targets[targets.len() - 1];
        let last_len = self.pending.offset_len(last)?;
        self.selection = Some(Selection::with_direction_of(
            Point::new(first, 0),
            Point::new(last, last_len),
            backwards,
        ));
        Ok(())
    }

    /// Text runs `(key, from, to)` covered by `start..end`, in document order
    fn covered_runs(
        &self,
        start: Point,
        end: Point,
    ) -> Result<Vec<(NodeKey, usize, usize)>, TransactionError> {
        let start_is_text = self.pending.get(start.key)?.as_text().is_some();
        let end_is_text = self.pending.get(end.key)?.as_text().is_some();

        let mut cursor = if start_is_text {
            Some(start.key)
        } else {
            self.pending
                .child_at(start.key, start.offset)
                .or_else(|| self.pending.next_after_subtree(start.key))
        };
        let stop = if end_is_text {
            None
        } else {
            self.pending
                .child_at(end.key, end.offset)
                .or_else(|| self.pending.next_after_subtree(end.key))
        };

        let mut runs = Vec::new();
        while let Some(key) = cursor {
            if !end_is_text && Some(key) == stop {
                break;
            }
            if let Node::Text(text) = self.pending.get(key)? {
                let from = if key == start.key { start.offset } else { 0 };
                let to = if key == end.key { end.offset } else { text.len() };
                if from < to {
                    runs.push((key, from, to));
                }
            }
            if end_is_text && key == end.key {
                break;
            }
            cursor = self.pending.next_in_order(key);
        }
        Ok(runs)
    }

    /// Split a text node so that chars `from..to` form a node of their own.
    /// The leftmost part keeps the original key.
    fn isolate(&mut self, key: NodeKey, from: usize, to: usize) -> Result<NodeKey, TransactionError> {
        let len = self.pending.offset_len(key)?;
        if to < len {
            self.split_text(key, to)?;
        }
        if from > 0 {
            return self.split_text(key, from);
        }
        Ok(key)
    }

    /// Split a text node at a char offset; the right part gets a new key
    fn split_text(&mut self, key: NodeKey, offset: usize) -> Result<NodeKey, TransactionError> {
        let node = self.pending.get(key)?.as_text().ok_or_else(|| {
            TransactionError::InvalidTreeOperation(format!("{key} is not a text node"))
        })?;
        let (left, right) = node.split_text(offset);
        let right_node = Node::Text(TextNode {
            links: SiblingLinks::detached(node.links.parent),
            text: right,
            format: node.format.clone(),
        });

        self.pending.update(key, |node| {
            if let Some(text) = node.as_text_mut() {
                text.text = left;
            }
        })?;
        let right_key = NodeKey::fresh();
        self.pending.put(right_key, right_node);
        self.pending.link_after(right_key, key)?;
        Ok(right_key)
    }

    fn insert_node(
        &mut self,
        parent: NodeKey,
        index: usize,
        template: &NodeTemplate,
    ) -> Result<(), TransactionError> {
        let key = self.build(template, parent)?;
        self.pending.link_at(key, parent, index)?;
        self.created.push(key);
        Ok(())
    }

    /// Store a template's nodes, returning the (still detached) top key
    fn build(&mut self, template: &NodeTemplate, parent: NodeKey) -> Result<NodeKey, TransactionError> {
        let key = NodeKey::fresh();
        match template {
            NodeTemplate::Element { tag, children } => {
                self.pending.put(key, Node::element(tag.clone(), parent));
                for child in children {
                    let child_key = self.build(child, key)?;
                    self.pending.link_before(child_key, key, None)?;
                }
            }
            NodeTemplate::Text { text, format } => {
                self.pending
                    .put(key, Node::text(text.clone(), format.clone(), parent));
            }
        }
        Ok(key)
    }

    fn remove_node(&mut self, key: NodeKey) -> Result<(), TransactionError> {
        if let Some(selection) = self.selection {
            let inside = |point: &Point| point.key == key || self.pending.is_ancestor(key, point.key);
            if inside(&selection.anchor) || inside(&selection.focus) {
                let parent = self.pending.parent(key).unwrap_or(self.pending.root());
                let index = self.pending.index_of(key).unwrap_or(0);
                self.selection = Some(Selection::caret(Point::new(parent, index)));
            }
        }
        self.pending.remove_subtree(key)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// root → paragraph → texts
    fn paragraph_with(texts: &[&str]) -> (State, NodeKey, Vec<NodeKey>) {
        let state = State::new();
        let root = state.root();
        let template = NodeTemplate::paragraph(texts.iter().map(|t| NodeTemplate::text(*t)).collect());
        let outcome = apply_commands(
            &state,
            &[Command::InsertNode {
                parent_key: root,
                index: 0,
                node: template,
            }],
            None,
        )
        .unwrap();
        let state = outcome.pending.commit();
        let paragraph = outcome.created[0];
        let keys = state.children(paragraph).collect();
        (state, paragraph, keys)
    }

    fn texts(state: &State, parent: NodeKey) -> Vec<(String, Vec<Format>)> {
        state
            .children(parent)
            .filter_map(|key| state.node(key).and_then(Node::as_text).cloned())
            .map(|text| (text.text, text.format.iter().collect()))
            .collect()
    }

    fn caret(key: NodeKey, offset: usize) -> Selection {
        Selection::caret(Point::new(key, offset))
    }

    fn range(a: NodeKey, a_off: usize, b: NodeKey, b_off: usize) -> Selection {
        Selection::range(Point::new(a, a_off), Point::new(b, b_off))
    }

    #[test]
    fn test_insert_text_into_text_node() {
        let (state, paragraph, keys) = paragraph_with(&["Hello"]);
        let outcome = apply_commands(
            &state,
            &[Command::InsertText {
                selection: caret(keys[0], 5),
                text: "a".to_string(),
            }],
            None,
        )
        .unwrap();

        let next = outcome.pending.commit();
        assert_eq!(texts(&next, paragraph)[0].0, "Helloa");
        assert_eq!(outcome.selection, Some(caret(keys[0], 6)));
        assert!(next.validate().is_ok());
    }

    #[test]
    fn test_insert_text_replaces_range() {
        let (state, paragraph, keys) = paragraph_with(&["Hello World"]);
        let outcome = apply_commands(
            &state,
            &[Command::InsertText {
                selection: range(keys[0], 11, keys[0], 6),
                text: "there".to_string(),
            }],
            None,
        )
        .unwrap();

        let next = outcome.pending.commit();
        assert_eq!(texts(&next, paragraph)[0].0, "Hello there");
        assert_eq!(outcome.selection, Some(caret(keys[0], 11)));
    }

    #[test]
    fn test_insert_text_into_empty_paragraph_creates_text() {
        let (state, paragraph, _) = paragraph_with(&[]);
        let outcome = apply_commands(
            &state,
            &[Command::InsertText {
                selection: caret(paragraph, 0),
                text: "Hi".to_string(),
            }],
            None,
        )
        .unwrap();

        let next = outcome.pending.commit();
        assert_eq!(texts(&next, paragraph), vec![("Hi".to_string(), vec![])]);
        let selection = outcome.selection.unwrap();
        assert_eq!(selection.anchor.offset, 2);
        assert!(next.validate().is_ok());
    }

    #[test]
    fn test_insert_text_at_element_boundary_extends_previous_text() {
        let (state, paragraph, keys) = paragraph_with(&["Hello"]);
        let outcome = apply_commands(
            &state,
            &[Command::InsertText {
                selection: caret(paragraph, 1),
                text: "!".to_string(),
            }],
            None,
        )
        .unwrap();

        let next = outcome.pending.commit();
        assert_eq!(texts(&next, paragraph)[0].0, "Hello!");
        assert_eq!(outcome.selection, Some(caret(keys[0], 6)));
    }

    #[test]
    fn test_delete_within_one_text() {
        let (state, paragraph, keys) = paragraph_with(&["Hello World"]);
        let outcome = apply_commands(
            &state,
            &[Command::DeleteRange {
                selection: range(keys[0], 5, keys[0], 11),
            }],
            None,
        )
        .unwrap();

        let next = outcome.pending.commit();
        assert_eq!(texts(&next, paragraph)[0].0, "Hello");
        assert_eq!(outcome.selection, Some(caret(keys[0], 5)));
    }

    #[test]
    fn test_delete_across_text_nodes() {
        let (state, paragraph, keys) = paragraph_with(&["Hello ", "big ", "World"]);
        let outcome = apply_commands(
            &state,
            &[Command::DeleteRange {
                selection: range(keys[0], 2, keys[2], 3),
            }],
            None,
        )
        .unwrap();

        let next = outcome.pending.commit();
        assert_eq!(
            texts(&next, paragraph),
            vec![("He".to_string(), vec![]), ("ld".to_string(), vec![])]
        );
        assert!(!next.contains(keys[1]));
        assert!(next.validate().is_ok());
    }

    #[test]
    fn test_delete_across_paragraphs() {
        let state = State::new();
        let root = state.root();
        let outcome = apply_commands(
            &state,
            &[
                Command::InsertNode {
                    parent_key: root,
                    index: 0,
                    node: NodeTemplate::paragraph(vec![NodeTemplate::text("First")]),
                },
                Command::InsertNode {
                    parent_key: root,
                    index: 1,
                    node: NodeTemplate::paragraph(vec![NodeTemplate::text("Middle")]),
                },
                Command::InsertNode {
                    parent_key: root,
                    index: 2,
                    node: NodeTemplate::paragraph(vec![NodeTemplate::text("Last")]),
                },
            ],
            None,
        )
        .unwrap();
        let (p1, p2, p3) = (outcome.created[0], outcome.created[1], outcome.created[2]);
        let state = outcome.pending.commit();
        let first = state.child_at(p1, 0).unwrap();
        let last = state.child_at(p3, 0).unwrap();

        let outcome = apply_commands(
            &state,
            &[Command::DeleteRange {
                selection: range(first, 3, last, 2),
            }],
            None,
        )
        .unwrap();
        let next = outcome.pending.commit();

        assert!(!next.contains(p2));
        assert_eq!(next.text_content(), "Fir\nst");
        assert!(next.validate().is_ok());
    }

    #[test]
    fn test_delete_to_end_of_text_removes_emptied_end_node() {
        let (state, paragraph, keys) = paragraph_with(&["ab", "cd"]);
        let outcome = apply_commands(
            &state,
            &[Command::DeleteRange {
                selection: range(keys[0], 1, keys[1], 2),
            }],
            None,
        )
        .unwrap();
        let next = outcome.pending.commit();

        assert_eq!(texts(&next, paragraph), vec![("a".to_string(), vec![])]);
        assert!(!next.contains(keys[1]));
    }

    #[test]
    fn test_toggle_whole_node_sets_format_in_place() {
        let (state, paragraph, keys) = paragraph_with(&["Hello ", "World"]);
        let outcome = apply_commands(
            &state,
            &[Command::ToggleFormat {
                selection: range(keys[1], 0, keys[1], 5),
                format: Format::Bold,
            }],
            None,
        )
        .unwrap();

        let mut edited: Vec<NodeKey> = outcome.pending.edited_keys().collect();
        edited.sort();
        assert_eq!(edited, vec![keys[1]]);

        let next = outcome.pending.commit();
        assert_eq!(
            texts(&next, paragraph),
            vec![
                ("Hello ".to_string(), vec![]),
                ("World".to_string(), vec![Format::Bold])
            ]
        );
    }

    #[test]
    fn test_toggle_partial_node_splits_runs() {
        let (state, paragraph, keys) = paragraph_with(&["Hello World"]);
        let outcome = apply_commands(
            &state,
            &[Command::ToggleFormat {
                selection: range(keys[0], 8, keys[0], 2),
                format: Format::Italic,
            }],
            None,
        )
        .unwrap();

        let selection = outcome.selection.unwrap();
        let next = outcome.pending.commit();
        assert_eq!(
            texts(&next, paragraph),
            vec![
                ("He".to_string(), vec![]),
                ("llo Wo".to_string(), vec![Format::Italic]),
                ("rld".to_string(), vec![]),
            ]
        );
        // Left part keeps the original key; direction is preserved
        assert_eq!(next.child_at(paragraph, 0), Some(keys[0]));
        let middle = next.child_at(paragraph, 1).unwrap();
        assert_eq!(selection, range(middle, 6, middle, 0));
        assert!(next.validate().is_ok());
    }

    #[test]
    fn test_toggle_mixed_runs_sets_then_clears() {
        let (state, paragraph, keys) = paragraph_with(&["ab", "cd"]);
        let bold_first = apply_commands(
            &state,
            &[Command::ToggleFormat {
                selection: range(keys[0], 0, keys[0], 2),
                format: Format::Bold,
            }],
            None,
        )
        .unwrap()
        .pending
        .commit();

        let whole = range(keys[0], 0, keys[1], 2);
        let all_bold = apply_commands(
            &bold_first,
            &[Command::ToggleFormat {
                selection: whole,
                format: Format::Bold,
            }],
            None,
        )
        .unwrap()
        .pending
        .commit();
        assert!(texts(&all_bold, paragraph)
            .iter()
            .all(|(_, format)| format == &vec![Format::Bold]));

        let none_bold = apply_commands(
            &all_bold,
            &[Command::ToggleFormat {
                selection: whole,
                format: Format::Bold,
            }],
            None,
        )
        .unwrap()
        .pending
        .commit();
        assert!(texts(&none_bold, paragraph)
            .iter()
            .all(|(_, format)| format.is_empty()));
    }

    #[test]
    fn test_move_node_rejects_cycle() {
        let (state, paragraph, keys) = paragraph_with(&["a"]);
        let err = apply_commands(
            &state,
            &[Command::MoveNode {
                key: paragraph,
                new_parent_key: paragraph,
                new_index: 0,
            }],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, TransactionError::InvalidTreeOperation(_)));

        let err = apply_commands(
            &state,
            &[Command::MoveNode {
                key: paragraph,
                new_parent_key: keys[0],
                new_index: 0,
            }],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, TransactionError::InvalidTreeOperation(_)));
    }

    #[test]
    fn test_move_node_reorders_siblings() {
        let (state, paragraph, keys) = paragraph_with(&["a", "b", "c"]);
        let next = apply_commands(
            &state,
            &[Command::MoveNode {
                key: keys[0],
                new_parent_key: paragraph,
                new_index: 2,
            }],
            None,
        )
        .unwrap()
        .pending
        .commit();

        let order: Vec<NodeKey> = next.children(paragraph).collect();
        assert_eq!(order, vec![keys[1], keys[2], keys[0]]);
        assert!(next.validate().is_ok());
    }

    #[test]
    fn test_batch_is_atomic() {
        let (state, paragraph, keys) = paragraph_with(&["a"]);
        let result = apply_commands(
            &state,
            &[
                Command::InsertText {
                    selection: caret(keys[0], 1),
                    text: "b".to_string(),
                },
                Command::RemoveNode {
                    key: NodeKey::from(u64::MAX),
                },
            ],
            None,
        );

        assert_eq!(
            result.unwrap_err(),
            TransactionError::UnknownKey(NodeKey::from(u64::MAX))
        );
        assert_eq!(texts(&state, paragraph)[0].0, "a");
    }

    #[test]
    fn test_out_of_range_offset_rejected() {
        let (state, _, keys) = paragraph_with(&["abc"]);
        let err = apply_commands(
            &state,
            &[Command::InsertText {
                selection: caret(keys[0], 10),
                text: "x".to_string(),
            }],
            None,
        )
        .unwrap_err();
        assert_eq!(
            err,
            TransactionError::OffsetOutOfRange {
                key: keys[0],
                offset: 10,
                len: 3
            }
        );
    }

    #[test]
    fn test_remove_node_collapses_selection() {
        let (state, paragraph, keys) = paragraph_with(&["a", "b", "c"]);
        let outcome = apply_commands(
            &state,
            &[Command::RemoveNode { key: keys[1] }],
            Some(range(keys[1], 0, keys[2], 1)),
        )
        .unwrap();
        assert_eq!(outcome.selection, Some(caret(paragraph, 1)));
    }

    #[test]
    fn test_selection_into_node_created_then_removed_in_same_batch() {
        let (state, paragraph, _) = paragraph_with(&["a"]);
        let mut txn = Transaction::begin(&state, None);
        txn.apply(&Command::InsertNode {
            parent_key: paragraph,
            index: 1,
            node: NodeTemplate::text("tmp"),
        })
        .unwrap();
        let created = txn.pending().child_at(paragraph, 1).unwrap();
        txn.apply(&Command::InsertText {
            selection: caret(created, 3),
            text: "!".to_string(),
        })
        .unwrap();
        txn.apply(&Command::RemoveNode { key: created }).unwrap();

        let outcome = txn.finish();
        assert_eq!(outcome.selection, Some(caret(paragraph, 1)));
    }
}
