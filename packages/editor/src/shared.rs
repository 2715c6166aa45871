//! # Shared Editor
//!
//! Single-writer access for hosts that edit from several threads.
//!
//! ```text
//! writer threads ──► Mutex<Editor> ──publish──► RwLock<Arc<State>> ◄── readers
//! ```
//!
//! Writers queue on the mutex, so transactions never interleave. Readers
//! clone the published `Arc<State>` and keep reading it for as long as they
//! like; publishing only swaps the pointer.

use crate::command::Command;
use crate::editor::{Editor, EditorUpdate};
use crate::errors::EditorError;
use crate::selection::Selection;
use crate::state::State;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

#[derive(Debug)]
pub struct SharedEditor {
    writer: Mutex<Editor>,
    published: RwLock<Arc<State>>,
}

impl SharedEditor {
    pub fn new(editor: Editor) -> Self {
        let published = RwLock::new(Arc::clone(editor.state()));
        Self {
            writer: Mutex::new(editor),
            published,
        }
    }

    /// The most recently published state
    pub fn snapshot(&self) -> Arc<State> {
        let published = self.published.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*published)
    }

    pub fn dispatch(
        &self,
        commands: &[Command],
        selection: Option<Selection>,
    ) -> Result<EditorUpdate, EditorError> {
        self.with_editor(|editor| editor.dispatch(commands, selection))
    }

    pub fn undo(&self) -> Option<EditorUpdate> {
        self.with_editor(Editor::undo)
    }

    pub fn redo(&self) -> Option<EditorUpdate> {
        self.with_editor(Editor::redo)
    }

    /// Run `edit` as the only writer, then publish whatever state it left
    pub fn with_editor<R>(&self, edit: impl FnOnce(&mut Editor) -> R) -> R {
        let mut editor = self.lock_writer();
        let result = edit(&mut *editor);

        let mut published = self.published.write().unwrap_or_else(PoisonError::into_inner);
        if !Arc::ptr_eq(&*published, editor.state()) {
            *published = Arc::clone(editor.state());
        }
        result
    }

    fn lock_writer(&self) -> MutexGuard<'_, Editor> {
        // A panicked writer never published a half-applied state
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
