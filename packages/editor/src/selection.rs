//! # Selection Model
//!
//! A selection is an `anchor`/`focus` pair of [`Point`]s. A point is a node
//! key plus an offset: a char index into a `Text` payload, or a child index
//! into a container.
//!
//! Direction is derived, never stored: a selection is *backwards* when its
//! anchor comes after its focus in document order (or sits on the same node
//! with a greater offset).
//!
//! Selections survive transactions through [`remap`]: points on surviving
//! nodes keep their key with a clamped offset, points on removed nodes fall
//! back to the boundary the removed subtree occupied in its nearest
//! surviving ancestor.

use crate::errors::TransactionError;
use crate::state::NodeStore;
use crate::NodeKey;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One selection endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub key: NodeKey,
    pub offset: usize,
}

impl Point {
    pub fn new(key: NodeKey, offset: usize) -> Self {
        Self { key, offset }
    }

    /// Document order of two points
    pub fn compare<S: NodeStore>(&self, other: &Point, store: &S) -> Result<Ordering, TransactionError> {
        if self.key == other.key {
            store.get(self.key)?;
            return Ok(self.offset.cmp(&other.offset));
        }
        Ok(self.position(store)?.cmp(&other.position(store)?))
    }

    /// Child indices from the root down to the point, then the offset.
    ///
    /// A container point `(E, i)` sits between children `i - 1` and `i`,
    /// so it sorts before everything inside child `i`.
    fn position<S: NodeStore>(&self, store: &S) -> Result<Vec<usize>, TransactionError> {
        store.get(self.key)?;
        let mut path = vec![self.offset];
        let mut current = self.key;
        while let Some(parent) = store.parent(current) {
            path.push(
                store
                    .index_of(current)
                    .ok_or(TransactionError::UnknownKey(current))?,
            );
            current = parent;
        }
        path.reverse();
        Ok(path)
    }

    /// Offset clamped into the node's valid range
    pub fn clamped<S: NodeStore>(&self, store: &S) -> Result<Point, TransactionError> {
        let len = store.offset_len(self.key)?;
        Ok(Point::new(self.key, self.offset.min(len)))
    }

    /// Reject offsets past the end of the node
    pub fn check<S: NodeStore>(&self, store: &S) -> Result<(), TransactionError> {
        let len = store.offset_len(self.key)?;
        if self.offset > len {
            return Err(TransactionError::OffsetOutOfRange {
                key: self.key,
                offset: self.offset,
                len,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionType {
    Caret,
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn range(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn caret(point: Point) -> Self {
        Self {
            anchor: point,
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn selection_type(&self) -> SelectionType {
        if self.is_collapsed() {
            SelectionType::Caret
        } else {
            SelectionType::Range
        }
    }

    pub fn is_backwards<S: NodeStore>(&self, store: &S) -> Result<bool, TransactionError> {
        Ok(self.anchor.compare(&self.focus, store)? == Ordering::Greater)
    }

    /// Endpoints as (start, end) in document order
    pub fn ordered<S: NodeStore>(&self, store: &S) -> Result<(Point, Point), TransactionError> {
        if self.is_backwards(store)? {
            Ok((self.focus, self.anchor))
        } else {
            Ok((self.anchor, self.focus))
        }
    }

    /// Rebuild a selection over `start..end` with this selection's direction
    pub fn with_direction_of(start: Point, end: Point, backwards: bool) -> Self {
        if backwards {
            Selection::range(end, start)
        } else {
            Selection::range(start, end)
        }
    }

    /// Reject selections naming unknown keys or out-of-range offsets
    pub fn check<S: NodeStore>(&self, store: &S) -> Result<(), TransactionError> {
        self.anchor.check(store)?;
        self.focus.check(store)
    }
}

/// Normalized view of a selection, as reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionInfo {
    pub selection: Selection,
    #[serde(rename = "type")]
    pub selection_type: SelectionType,
    pub is_backwards: bool,
}

/// Clamp both offsets into range and derive the direction
pub fn normalize<S: NodeStore>(selection: &Selection, store: &S) -> Result<SelectionInfo, TransactionError> {
    let selection = Selection::range(selection.anchor.clamped(store)?, selection.focus.clamped(store)?);
    Ok(SelectionInfo {
        selection_type: selection.selection_type(),
        is_backwards: selection.is_backwards(store)?,
        selection,
    })
}

/// Carry a selection from `old` to `new`.
///
/// If either endpoint's node was removed, the whole selection collapses to
/// a caret at the removed subtree's former boundary in its nearest surviving
/// ancestor. The result never names a key missing from `new`.
pub fn remap<O: NodeStore, N: NodeStore>(selection: &Selection, old: &O, new: &N) -> Selection {
    let anchor = remap_point(&selection.anchor, old, new);
    let focus = remap_point(&selection.focus, old, new);

    match (anchor, focus) {
        (Remapped::Kept(anchor), Remapped::Kept(focus)) => Selection::range(anchor, focus),
        (Remapped::Fallback(point), _) | (_, Remapped::Fallback(point)) => Selection::caret(point),
    }
}

enum Remapped {
    Kept(Point),
    Fallback(Point),
}

fn remap_point<O: NodeStore, N: NodeStore>(point: &Point, old: &O, new: &N) -> Remapped {
    if let Ok(clamped) = point.clamped(new) {
        return Remapped::Kept(clamped);
    }
    Remapped::Fallback(surviving_boundary(point.key, old, new))
}

/// Boundary in the nearest surviving ancestor where `removed` used to sit
pub fn surviving_boundary<O: NodeStore, N: NodeStore>(removed: NodeKey, old: &O, new: &N) -> Point {
    let mut below = removed;
    for ancestor in old.ancestors(removed) {
        if new.contains(ancestor) {
            return Point::new(ancestor, boundary_index(below, ancestor, old, new));
        }
        below = ancestor;
    }
    Point::new(new.root(), 0)
}

/// Index in `parent` (under `new`) just after the last surviving older sibling of `child`
fn boundary_index<O: NodeStore, N: NodeStore>(child: NodeKey, parent: NodeKey, old: &O, new: &N) -> usize {
    let mut sibling = old.node(child).and_then(|node| node.prev());
    while let Some(key) = sibling {
        if new.parent(key) == Some(parent) {
            if let Some(index) = new.index_of(key) {
                return index + 1;
            }
        }
        sibling = old.node(key).and_then(|node| node.prev());
    }
    0
}
