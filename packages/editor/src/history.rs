//! # Undo/Redo History
//!
//! Snapshot history over published states.
//!
//! ## Design
//!
//! - Each published transaction records the snapshot it replaced
//! - Undo swaps the current snapshot for the recorded one and keeps the
//!   current one for redo
//! - New transactions clear the redo stack
//! - Groups coalesce several transactions into one undo step
//!
//! Snapshots are cheap: states share every unchanged node, so a history
//! entry costs one `Arc` plus the layers its successors added.
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut history = History::with_depth(100);
//! history.record(Snapshot::new(before_state, selection));
//!
//! if let Some(previous) = history.undo(Snapshot::new(current_state, selection)) {
//!     // publish previous.state
//! }
//! ```

use crate::selection::Selection;
use crate::state::State;
use std::sync::Arc;

/// A published state and the selection that went with it
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub state: Arc<State>,
    pub selection: Option<Selection>,
}

impl Snapshot {
    pub fn new(state: Arc<State>, selection: Option<Selection>) -> Self {
        Self { state, selection }
    }
}

#[derive(Debug, Clone)]
struct HistoryEntry {
    snapshot: Snapshot,
    description: Option<String>,
}

/// Group being collected between `begin_group` and `end_group`
#[derive(Debug, Default)]
struct OpenGroup {
    before: Option<Snapshot>,
    description: Option<String>,
}

#[derive(Debug)]
pub struct History {
    /// Snapshots to return to on undo (most recent last)
    undo_stack: Vec<HistoryEntry>,

    /// Snapshots to return to on redo (most recent last)
    redo_stack: Vec<HistoryEntry>,

    /// Maximum number of undo levels (0 = unlimited)
    max_levels: usize,

    group: Option<OpenGroup>,
}

impl History {
    pub fn new() -> Self {
        Self::with_depth(100)
    }

    pub fn with_depth(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
            group: None,
        }
    }

    /// Record the snapshot a transaction is about to replace
    pub fn record(&mut self, before: Snapshot) {
        self.redo_stack.clear();

        if let Some(group) = &mut self.group {
            if group.before.is_none() {
                group.before = Some(before);
            }
            return;
        }

        self.push_entry(HistoryEntry {
            snapshot: before,
            description: None,
        });
    }

    /// Start coalescing transactions into one undo step
    pub fn begin_group(&mut self) {
        self.end_group();
        self.group = Some(OpenGroup::default());
    }

    pub fn set_group_description(&mut self, description: impl Into<String>) {
        if let Some(group) = &mut self.group {
            group.description = Some(description.into());
        }
    }

    /// Close the open group; an empty group leaves no entry
    pub fn end_group(&mut self) {
        if let Some(group) = self.group.take() {
            if let Some(before) = group.before {
                self.push_entry(HistoryEntry {
                    snapshot: before,
                    description: group.description,
                });
            }
        }
    }

    fn push_entry(&mut self, entry: HistoryEntry) {
        self.undo_stack.push(entry);

        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
        }
    }

    /// Step back, returning the snapshot to publish
    pub fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        self.end_group();
        let entry = self.undo_stack.pop()?;
        self.redo_stack.push(HistoryEntry {
            snapshot: current,
            description: entry.description.clone(),
        });
        Some(entry.snapshot)
    }

    /// Step forward again after an undo
    pub fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let entry = self.redo_stack.pop()?;
        self.undo_stack.push(HistoryEntry {
            snapshot: current,
            description: entry.description.clone(),
        });
        Some(entry.snapshot)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty() || self.group_has_changes()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack
            .last()
            .and_then(|entry| entry.description.as_deref())
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.group = None;
    }

    fn group_has_changes(&self) -> bool {
        self.group
            .as_ref()
            .is_some_and(|group| group.before.is_some())
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}
