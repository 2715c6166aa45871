//! # Text Run Normalization
//!
//! Edits can leave adjacent text siblings carrying the same format, for
//! example after a format is toggled on and off again. Normalization merges
//! such runs into the left-most one.
//!
//! Merging is:
//! - **Scoped**: only children of containers the transaction touched
//! - **Selection-preserving**: points on a merged run move onto the survivor

use crate::errors::TransactionError;
use crate::node::Node;
use crate::selection::{Point, Selection};
use crate::state::{NodeStore, PendingState};
use crate::NodeKey;
use tracing::debug;

/// Merge equal-format text siblings under each container in `scope`.
///
/// Returns the selection carried onto the surviving runs.
pub fn merge_text_runs(
    pending: &mut PendingState,
    scope: &[NodeKey],
    selection: Option<Selection>,
) -> Result<Option<Selection>, TransactionError> {
    let mut selection = selection;
    let mut merged = 0;

    for &parent in scope {
        if !pending.contains(parent) {
            continue;
        }

        let mut cursor = pending.get(parent)?.first_child();
        while let Some(key) = cursor {
            let Some(next) = pending.get(key)?.next() else {
                break;
            };
            if !mergeable(pending, key, next) {
                cursor = Some(next);
                continue;
            }

            let left_len = pending.offset_len(key)?;
            let index = pending.index_of(next).unwrap_or(0);
            let right = pending
                .get(next)?
                .as_text()
                .map(|text| text.text.clone())
                .unwrap_or_default();
            pending.update(key, |node| {
                if let Some(text) = node.as_text_mut() {
                    text.text.push_str(&right);
                }
            })?;
            pending.remove_subtree(next)?;

            let absorbed = Absorbed {
                parent,
                removed: next,
                index,
                survivor: key,
                shift: left_len,
            };
            selection = selection.map(|selection| Selection {
                anchor: absorbed.carry(selection.anchor),
                focus: absorbed.carry(selection.focus),
            });
            merged += 1;
        }
    }

    if merged > 0 {
        debug!(merged, "Merged adjacent text runs");
    }
    Ok(selection)
}

fn mergeable(pending: &PendingState, left: NodeKey, right: NodeKey) -> bool {
    match (pending.node(left), pending.node(right)) {
        (Some(Node::Text(left)), Some(Node::Text(right))) => left.format == right.format,
        _ => false,
    }
}

/// One text sibling folded into its left neighbour
struct Absorbed {
    parent: NodeKey,
    removed: NodeKey,
    index: usize,
    survivor: NodeKey,
    shift: usize,
}

impl Absorbed {
    fn carry(&self, point: Point) -> Point {
        if point.key == self.removed {
            Point::new(self.survivor, self.shift + point.offset)
        } else if point.key == self.parent && point.offset > self.index {
            Point::new(self.parent, point.offset - 1)
        } else {
            point
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Format, FormatSet};
    use crate::state::State;

    fn runs(formats: &[(&str, FormatSet)]) -> (PendingState, NodeKey, Vec<NodeKey>) {
        let state = State::new();
        let root = state.root();
        let mut pending = state.clone_for_edit();
        let paragraph = NodeKey::fresh();
        pending.put(paragraph, Node::element("paragraph", root));
        pending.link_before(paragraph, root, None).unwrap();

        let mut keys = Vec::new();
        for (text, format) in formats {
            let key = NodeKey::fresh();
            pending.put(key, Node::text(*text, format.clone(), paragraph));
            pending.link_before(key, paragraph, None).unwrap();
            keys.push(key);
        }
        (pending, paragraph, keys)
    }

    #[test]
    fn test_merges_equal_format_runs() {
        let bold = FormatSet::new().with(Format::Bold);
        let (mut pending, paragraph, keys) = runs(&[
            ("Hello ", FormatSet::new()),
            ("big ", FormatSet::new()),
            ("World", bold),
        ]);

        let selection = Selection::range(Point::new(keys[1], 2), Point::new(paragraph, 3));
        let selection = merge_text_runs(&mut pending, &[paragraph], Some(selection)).unwrap();

        assert_eq!(pending.child_count(paragraph), 2);
        assert!(!pending.contains(keys[1]));
        assert_eq!(pending.get(keys[0]).unwrap().as_text().unwrap().text, "Hello big ");
        assert_eq!(
            selection,
            Some(Selection::range(Point::new(keys[0], 8), Point::new(paragraph, 2)))
        );
        assert!(pending.clone().commit().validate().is_ok());
    }

    #[test]
    fn test_leaves_distinct_formats_alone() {
        let (mut pending, paragraph, _) = runs(&[
            ("a", FormatSet::new().with(Format::Italic)),
            ("b", FormatSet::new()),
        ]);
        merge_text_runs(&mut pending, &[paragraph], None).unwrap();
        assert_eq!(pending.child_count(paragraph), 2);
    }
}
