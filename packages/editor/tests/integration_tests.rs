//! Integration tests for the editor crate
//!
//! End-to-end: command batch in, patches + selection out.

use scribe_editor::{
    diff, export, from_json, import, Command, Editor, EditorConfig, EditorError, Format, Node,
    NodeKey, NodeStore, NodeTemplate, Patch, PatchNode, Point, Render, Selection, TransactionError,
};

/// Editor over `root → paragraph → texts`
fn editor_with(texts: &[&str]) -> (Editor, NodeKey, Vec<NodeKey>) {
    let mut editor = Editor::empty(EditorConfig::default());
    let root = editor.state().root();
    let update = editor
        .dispatch(
            &[Command::InsertNode {
                parent_key: root,
                index: 0,
                node: NodeTemplate::paragraph(texts.iter().map(|t| NodeTemplate::text(*t)).collect()),
            }],
            None,
        )
        .unwrap();
    let paragraph = update.created[0];
    let keys = editor.state().children(paragraph).collect();
    (editor, paragraph, keys)
}

#[test]
fn test_toggle_bold_on_world() {
    let (mut editor, paragraph, keys) = editor_with(&["Hello ", "World"]);

    let update = editor
        .dispatch(
            &[Command::ToggleFormat {
                selection: Selection::range(Point::new(keys[1], 0), Point::new(keys[1], 5)),
                format: Format::Bold,
            }],
            None,
        )
        .unwrap();

    let patches = update.patches();
    assert_eq!(patches.len(), 1);
    assert!(matches!(
        &patches[0],
        Patch::SetFormat { key, format } if *key == keys[1] && format.contains(Format::Bold)
    ));
    assert!(!patches
        .iter()
        .any(|p| matches!(p, Patch::CreateNode { .. } | Patch::RemoveNode { .. })));

    let document = serde_json::to_value(export(editor.state().as_ref())).unwrap();
    let runs = &document["children"][0]["children"];
    assert_eq!(
        runs,
        &serde_json::json!([
            { "key": keys[0], "type": "text", "text": "Hello ", "format": [] },
            { "key": keys[1], "type": "text", "text": "World", "format": ["bold"] }
        ])
    );
    assert_eq!(editor.state().child_count(paragraph), 2);
}

#[test]
fn test_insert_between_siblings_touches_only_neighbours() {
    let (mut editor, paragraph, keys) = editor_with(&["a", "b", "c", "d", "e"]);

    let update = editor
        .dispatch(
            &[Command::InsertNode {
                parent_key: paragraph,
                index: 2,
                node: NodeTemplate::text("new"),
            }],
            None,
        )
        .unwrap();
    let created = update.created[0];

    assert_eq!(
        update.patches(),
        &[
            Patch::Relink {
                key: keys[1],
                parent: paragraph,
                prev: Some(keys[0]),
                next: Some(created),
            },
            Patch::CreateNode {
                key: created,
                node: PatchNode::Text {
                    text: "new".to_string(),
                    format: Default::default(),
                },
            },
            Patch::Relink {
                key: created,
                parent: paragraph,
                prev: Some(keys[1]),
                next: Some(keys[2]),
            },
            Patch::Relink {
                key: keys[2],
                parent: paragraph,
                prev: Some(created),
                next: Some(keys[3]),
            },
        ]
    );
}

#[test]
fn test_backwards_selection_same_result_as_forward() {
    let (mut forward, _, fkeys) = editor_with(&["Hello World"]);
    let (mut backward, _, bkeys) = editor_with(&["Hello World"]);

    forward
        .dispatch(
            &[Command::DeleteRange {
                selection: Selection::range(Point::new(fkeys[0], 2), Point::new(fkeys[0], 7)),
            }],
            None,
        )
        .unwrap();
    backward
        .dispatch(
            &[Command::DeleteRange {
                selection: Selection::range(Point::new(bkeys[0], 7), Point::new(bkeys[0], 2)),
            }],
            None,
        )
        .unwrap();

    assert_eq!(forward.state().text_content(), "Heorld");
    assert_eq!(backward.state().text_content(), "Heorld");
    assert_eq!(
        backward.selection(),
        Some(&Selection::caret(Point::new(bkeys[0], 2)))
    );
}

#[test]
fn test_typing_session_with_undo_redo() {
    let mut editor = Editor::new(EditorConfig::default());
    let text = editor.selection().unwrap().anchor.key;

    editor.begin_group();
    for ch in ["H", "i", "!"] {
        let caret = *editor.selection().unwrap();
        editor
            .dispatch(
                &[Command::InsertText {
                    selection: caret,
                    text: ch.to_string(),
                }],
                None,
            )
            .unwrap();
    }
    editor.end_group();
    assert_eq!(editor.state().text_content(), "Hi!");
    assert_eq!(editor.selection(), Some(&Selection::caret(Point::new(text, 3))));

    let undone = editor.undo().unwrap();
    assert_eq!(editor.state().text_content(), "");
    assert_eq!(undone.selection, Some(Selection::caret(Point::new(text, 0))));
    assert!(editor.undo().is_none());

    let redone = editor.redo().unwrap();
    assert_eq!(editor.state().text_content(), "Hi!");
    assert_eq!(redone.patches().len(), 1);
}

#[test]
fn test_remove_paragraph_emits_children_first() {
    let (mut editor, paragraph, keys) = editor_with(&["a", "b"]);
    let update = editor
        .dispatch(&[Command::RemoveNode { key: paragraph }], None)
        .unwrap();

    let removed: Vec<NodeKey> = update
        .patches()
        .iter()
        .filter_map(|patch| match patch {
            Patch::RemoveNode { key } => Some(*key),
            _ => None,
        })
        .collect();
    assert_eq!(removed, vec![keys[1], keys[0], paragraph]);
}

#[test]
fn test_move_node_between_paragraphs() {
    let mut editor = Editor::empty(EditorConfig::default());
    let root = editor.state().root();
    let update = editor
        .dispatch(
            &[
                Command::InsertNode {
                    parent_key: root,
                    index: 0,
                    node: NodeTemplate::paragraph(vec![NodeTemplate::text("one")]),
                },
                Command::InsertNode {
                    parent_key: root,
                    index: 1,
                    node: NodeTemplate::paragraph(vec![]),
                },
            ],
            None,
        )
        .unwrap();
    let (first, second) = (update.created[0], update.created[1]);
    let text = editor.state().child_at(first, 0).unwrap();

    let update = editor
        .dispatch(
            &[Command::MoveNode {
                key: text,
                new_parent_key: second,
                new_index: 0,
            }],
            None,
        )
        .unwrap();

    assert_eq!(
        update.patches(),
        &[Patch::Relink {
            key: text,
            parent: second,
            prev: None,
            next: None,
        }]
    );
    assert_eq!(editor.state().child_count(first), 0);
    assert_eq!(editor.state().text_content(), "\none");
}

#[test]
fn test_rejected_batch_reports_error_kind() {
    let (mut editor, paragraph, keys) = editor_with(&["abc"]);

    let err = editor
        .dispatch(
            &[Command::MoveNode {
                key: paragraph,
                new_parent_key: keys[0],
                new_index: 0,
            }],
            None,
        )
        .unwrap_err();
    match err {
        EditorError::Transaction(err) => {
            assert!(err.is_recoverable());
            assert!(matches!(err, TransactionError::InvalidTreeOperation(_)));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(editor.state().text_content(), "abc");
}

#[test]
fn test_import_export_round_trip_and_editing() {
    let state = from_json(
        r#"{ "key": 10, "type": "root", "children": [
            { "key": 11, "type": "element", "tag": "heading", "children": [
                { "key": 12, "type": "text", "text": "Title", "format": ["bold"] }
            ] },
            { "key": 13, "type": "element", "tag": "paragraph", "children": [
                { "key": 14, "type": "text", "text": "Body" }
            ] }
        ] }"#,
    )
    .unwrap();
    assert_eq!(import(&export(&state)).unwrap(), state);

    let mut editor = Editor::from_state(state, EditorConfig::default()).unwrap();
    let update = editor
        .dispatch(
            &[Command::InsertNode {
                parent_key: NodeKey::from(13),
                index: 1,
                node: NodeTemplate::text(" text"),
            }],
            None,
        )
        .unwrap();

    // Fresh keys never collide with imported ones
    assert!(update.created[0].get() > 14);
    assert_eq!(
        editor.to_html(),
        "<h1><strong>Title</strong></h1><p>Body text</p>"
    );
}

#[test]
fn test_normalization_merges_runs_after_toggle_off() {
    let config = EditorConfig {
        normalize_text_runs: true,
        ..EditorConfig::default()
    };
    let mut editor = Editor::from_state(
        from_json(
            r#"{ "key": 20, "type": "root", "children": [
                { "key": 21, "type": "element", "tag": "paragraph", "children": [
                    { "key": 22, "type": "text", "text": "Hello World" }
                ] }
            ] }"#,
        )
        .unwrap(),
        config,
    )
    .unwrap();
    let text = NodeKey::from(22);
    let paragraph = NodeKey::from(21);
    let word = Selection::range(Point::new(text, 6), Point::new(text, 11));

    let update = editor
        .dispatch(&[Command::ToggleFormat { selection: word, format: Format::Italic }], None)
        .unwrap();
    assert_eq!(editor.state().child_count(paragraph), 2);
    let selection = update.selection.unwrap();

    editor
        .dispatch(
            &[Command::ToggleFormat {
                selection,
                format: Format::Italic,
            }],
            None,
        )
        .unwrap();
    assert_eq!(editor.state().child_count(paragraph), 1);
    assert_eq!(
        editor.selection(),
        Some(&Selection::range(Point::new(text, 6), Point::new(text, 11)))
    );
}

#[test]
fn test_rebuild_render_carries_full_document() {
    let (mut editor, _, keys) = editor_with(&["a"]);
    editor.request_rebuild();
    let update = editor
        .dispatch(
            &[Command::InsertText {
                selection: Selection::caret(Point::new(keys[0], 1)),
                text: "b".to_string(),
            }],
            None,
        )
        .unwrap();

    match update.render {
        Render::Rebuild(document) => {
            assert_eq!(import(&document).unwrap(), **editor.state());
        }
        Render::Patches(_) => panic!("expected a rebuild"),
    }
}

#[test]
fn test_diff_of_undo_matches_inverse_edit() {
    let (mut editor, _, keys) = editor_with(&["x"]);
    let before = editor.state().clone();
    editor
        .dispatch(&[Command::RemoveNode { key: keys[0] }], None)
        .unwrap();
    let after = editor.state().clone();

    let undone = editor.undo().unwrap();
    assert_eq!(undone.patches(), diff(&after, &before).as_slice());
    assert!(matches!(
        editor.state().node(keys[0]),
        Some(Node::Text(text)) if text.text == "x"
    ));
}
