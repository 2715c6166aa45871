//! # Editor
//!
//! One editable document: the current state, the selection, the history and
//! the config, passed around as an explicit value.
//!
//! ## Lifecycle
//!
//! ```text
//! Commands ─► Transaction ─► (normalize) ─► commit ─► (validate) ─► diff ─► publish
//!                 │                                       │
//!                 └─ rejected: current state untouched    └─ violation: discard,
//!                                                            next update rebuilds
//! ```
//!
//! Every successful dispatch, undo or redo returns an [`EditorUpdate`]
//! holding the patches for the external tree and the selection, so both are
//! delivered together.

use crate::command::{Command, NodeTemplate};
use crate::config::EditorConfig;
use crate::errors::{EditorError, TransactionError};
use crate::history::{History, Snapshot};
use crate::html::render_html;
use crate::reconciler::{diff, Patch};
use crate::selection::{normalize, Point, Selection, SelectionInfo};
use crate::serialize::{export, SerializedNode};
use crate::state::{NodeStore, State};
use crate::transaction::Transaction;
use crate::NodeKey;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// What the external tree has to do to catch up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Render {
    /// Apply these patches in order
    Patches(Vec<Patch>),
    /// Throw the tree away and rebuild it from this document
    Rebuild(SerializedNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorUpdate {
    pub version: u64,
    pub render: Render,
    pub selection: Option<Selection>,
    /// Keys of nodes inserted by `InsertNode`, in command order
    pub created: Vec<NodeKey>,
}

impl EditorUpdate {
    /// Patches of an incremental update (empty for a rebuild)
    pub fn patches(&self) -> &[Patch] {
        match &self.render {
            Render::Patches(patches) => patches,
            Render::Rebuild(_) => &[],
        }
    }
}

#[derive(Debug)]
pub struct Editor {
    state: Arc<State>,
    selection: Option<Selection>,
    history: History,
    config: EditorConfig,

    /// Incremented on every published update
    version: u64,

    /// Set after an invariant violation: the external tree may be stale
    needs_rebuild: bool,
}

impl Editor {
    /// A document holding one empty paragraph, caret inside it
    pub fn new(config: EditorConfig) -> Self {
        let state = State::new();
        let root = state.root();
        let mut txn = Transaction::begin(&state, None);
        let seeded = txn.apply(&Command::InsertNode {
            parent_key: root,
            index: 0,
            node: NodeTemplate::paragraph(vec![NodeTemplate::text("")]),
        });

        let state = match seeded {
            Ok(()) => txn.finish().pending.commit(),
            // Unreachable for a fresh root; fall back to an empty document
            Err(_) => state,
        };
        let selection = state
            .child_at(root, 0)
            .and_then(|paragraph| state.child_at(paragraph, 0))
            .map(|text| Selection::caret(Point::new(text, 0)));

        let mut editor = Self::from_valid_state(state, config);
        editor.selection = selection;
        editor
    }

    /// A document holding only the root
    pub fn empty(config: EditorConfig) -> Self {
        Self::from_valid_state(State::new(), config)
    }

    /// Edit an existing state, after checking its invariants
    pub fn from_state(state: State, config: EditorConfig) -> Result<Self, EditorError> {
        state.validate()?;
        Ok(Self::from_valid_state(state, config))
    }

    fn from_valid_state(state: State, config: EditorConfig) -> Self {
        Self {
            state: Arc::new(state),
            selection: None,
            history: History::with_depth(config.history_depth),
            config,
            version: 0,
            needs_rebuild: false,
        }
    }

    pub fn state(&self) -> &Arc<State> {
        &self.state
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// The selection with clamped offsets and its derived direction
    pub fn selection_info(&self) -> Result<Option<SelectionInfo>, TransactionError> {
        self.selection
            .map(|selection| normalize(&selection, self.state.as_ref()))
            .transpose()
    }

    /// Replace the selection without editing the document
    pub fn set_selection(&mut self, selection: Option<Selection>) -> Result<(), TransactionError> {
        if let Some(selection) = &selection {
            selection.check(self.state.as_ref())?;
        }
        self.selection = selection;
        Ok(())
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Coalesce the following dispatches into one undo step
    pub fn begin_group(&mut self) {
        self.history.begin_group();
    }

    pub fn end_group(&mut self) {
        self.history.end_group();
    }

    /// Force the next update to rebuild the external tree
    pub fn request_rebuild(&mut self) {
        self.needs_rebuild = true;
    }

    /// Apply a command batch against `selection` (or the current selection).
    ///
    /// On error the current state, selection and history are unchanged.
    #[instrument(skip_all, fields(commands = commands.len(), version = self.version))]
    pub fn dispatch(
        &mut self,
        commands: &[Command],
        selection: Option<Selection>,
    ) -> Result<EditorUpdate, EditorError> {
        let selection = selection.or(self.selection);
        let mut txn = Transaction::begin(&self.state, selection);

        for command in commands {
            if let Err(err) = txn.apply(command) {
                warn!(command = command.name(), error = %err, "Rejected command batch");
                return Err(err.into());
            }
        }
        if self.config.normalize_text_runs {
            txn.normalize_text_runs()?;
        }

        let outcome = txn.finish();
        let changed = outcome.pending.edit_count() > 0;
        let next = outcome.pending.commit();

        if self.config.validate_on_commit {
            if let Err(violation) = next.validate() {
                error!(%violation, "Transaction broke a structural invariant, discarding it");
                self.needs_rebuild = true;
                return Err(violation.into());
            }
        }

        if changed {
            self.history
                .record(Snapshot::new(Arc::clone(&self.state), self.selection));
        }
        let update = self.publish(Arc::new(next), outcome.selection, outcome.created);
        info!(
            version = update.version,
            patches = update.patches().len(),
            structural = update.patches().iter().filter(|patch| patch.is_structural()).count(),
            "Published transaction"
        );
        Ok(update)
    }

    /// Step back one history entry
    pub fn undo(&mut self) -> Option<EditorUpdate> {
        let current = Snapshot::new(Arc::clone(&self.state), self.selection);
        let previous = self.history.undo(current)?;
        Some(self.publish(previous.state, previous.selection, Vec::new()))
    }

    /// Step forward one history entry
    pub fn redo(&mut self) -> Option<EditorUpdate> {
        let current = Snapshot::new(Arc::clone(&self.state), self.selection);
        let next = self.history.redo(current)?;
        Some(self.publish(next.state, next.selection, Vec::new()))
    }

    fn publish(
        &mut self,
        next: Arc<State>,
        selection: Option<Selection>,
        created: Vec<NodeKey>,
    ) -> EditorUpdate {
        let render = if self.needs_rebuild {
            self.needs_rebuild = false;
            warn!("Rebuilding external tree from a full export");
            Render::Rebuild(export(next.as_ref()))
        } else {
            Render::Patches(diff(&self.state, &next))
        };

        self.state = next;
        self.selection = selection;
        self.version += 1;

        EditorUpdate {
            version: self.version,
            render,
            selection,
            created,
        }
    }

    /// Full export of the current state
    pub fn export(&self) -> SerializedNode {
        export(self.state.as_ref())
    }

    pub fn to_html(&self) -> String {
        render_html(self.state.as_ref())
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}
