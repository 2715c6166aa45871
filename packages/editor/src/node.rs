//! # Document Nodes
//!
//! A node is a closed tagged variant over `Root`, `Element` and `Text`.
//!
//! Child order is represented only by the sibling chain: every non-root node
//! knows its `parent`, `prev` and `next`, and every container knows its
//! `first_child` and `last_child`. There is no positional child array, so
//! splicing a node into a list of any length rewrites a constant number of
//! entries.
//!
//! Formatting is data on `Text` nodes (a [`FormatSet`]), not nested wrapper
//! elements.

use crate::NodeKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Inline text format flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Code,
    Subscript,
    Superscript,
}

impl Format {
    pub const ALL: [Format; 7] = [
        Format::Bold,
        Format::Italic,
        Format::Underline,
        Format::Strikethrough,
        Format::Code,
        Format::Subscript,
        Format::Superscript,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Format::Bold => "bold",
            Format::Italic => "italic",
            Format::Underline => "underline",
            Format::Strikethrough => "strikethrough",
            Format::Code => "code",
            Format::Subscript => "subscript",
            Format::Superscript => "superscript",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Unknown format flag: {0}")]
pub struct ParseFormatError(pub String);

impl FromStr for Format {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::ALL
            .into_iter()
            .find(|format| format.as_str() == s)
            .ok_or_else(|| ParseFormatError(s.to_string()))
    }
}

/// Ordered set of format flags applied to one text run
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormatSet(BTreeSet<Format>);

impl FormatSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, format: Format) -> bool {
        self.0.contains(&format)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Formats in canonical order
    pub fn iter(&self) -> impl Iterator<Item = Format> + '_ {
        self.0.iter().copied()
    }

    pub fn with(mut self, format: Format) -> Self {
        self.0.insert(format);
        self
    }

    pub fn without(mut self, format: Format) -> Self {
        self.0.remove(&format);
        self
    }

    pub fn toggled(self, format: Format) -> Self {
        if self.contains(format) {
            self.without(format)
        } else {
            self.with(format)
        }
    }
}

impl FromIterator<Format> for FormatSet {
    fn from_iter<I: IntoIterator<Item = Format>>(iter: I) -> Self {
        FormatSet(iter.into_iter().collect())
    }
}

/// Position of a non-root node among its siblings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiblingLinks {
    pub parent: NodeKey,
    pub prev: Option<NodeKey>,
    pub next: Option<NodeKey>,
}

impl SiblingLinks {
    pub fn detached(parent: NodeKey) -> Self {
        Self {
            parent,
            prev: None,
            next: None,
        }
    }
}

/// Ends of a container's sibling chain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChildLinks {
    pub first: Option<NodeKey>,
    pub last: Option<NodeKey>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootNode {
    pub children: ChildLinks,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementNode {
    /// Block type, e.g. "paragraph"
    pub tag: String,
    pub links: SiblingLinks,
    pub children: ChildLinks,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextNode {
    pub links: SiblingLinks,
    pub text: String,
    pub format: FormatSet,
}

impl TextNode {
    /// Length in chars (the unit of text offsets)
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Split the payload at a char offset
    pub fn split_text(&self, offset: usize) -> (String, String) {
        let at = byte_offset(&self.text, offset);
        (self.text[..at].to_string(), self.text[at..].to_string())
    }
}

/// Byte index of the char at `offset`, clamped to the end of `text`
pub fn byte_offset(text: &str, offset: usize) -> usize {
    text.char_indices()
        .nth(offset)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}

/// One document node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Root(RootNode),
    Element(ElementNode),
    Text(TextNode),
}

impl Node {
    pub fn element(tag: impl Into<String>, parent: NodeKey) -> Self {
        Node::Element(ElementNode {
            tag: tag.into(),
            links: SiblingLinks::detached(parent),
            children: ChildLinks::default(),
        })
    }

    pub fn text(text: impl Into<String>, format: FormatSet, parent: NodeKey) -> Self {
        Node::Text(TextNode {
            links: SiblingLinks::detached(parent),
            text: text.into(),
            format,
        })
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Root(_) => "root",
            Node::Element(_) => "element",
            Node::Text(_) => "text",
        }
    }

    pub fn links(&self) -> Option<&SiblingLinks> {
        match self {
            Node::Root(_) => None,
            Node::Element(el) => Some(&el.links),
            Node::Text(text) => Some(&text.links),
        }
    }

    pub fn links_mut(&mut self) -> Option<&mut SiblingLinks> {
        match self {
            Node::Root(_) => None,
            Node::Element(el) => Some(&mut el.links),
            Node::Text(text) => Some(&mut text.links),
        }
    }

    pub fn children(&self) -> Option<&ChildLinks> {
        match self {
            Node::Root(root) => Some(&root.children),
            Node::Element(el) => Some(&el.children),
            Node::Text(_) => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut ChildLinks> {
        match self {
            Node::Root(root) => Some(&mut root.children),
            Node::Element(el) => Some(&mut el.children),
            Node::Text(_) => None,
        }
    }

    pub fn parent(&self) -> Option<NodeKey> {
        self.links().map(|links| links.parent)
    }

    pub fn prev(&self) -> Option<NodeKey> {
        self.links().and_then(|links| links.prev)
    }

    pub fn next(&self) -> Option<NodeKey> {
        self.links().and_then(|links| links.next)
    }

    pub fn first_child(&self) -> Option<NodeKey> {
        self.children().and_then(|children| children.first)
    }

    pub fn last_child(&self) -> Option<NodeKey> {
        self.children().and_then(|children| children.last)
    }

    pub fn is_container(&self) -> bool {
        self.children().is_some()
    }

    pub fn as_text(&self) -> Option<&TextNode> {
        match self {
            Node::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut TextNode> {
        match self {
            Node::Text(text) => Some(text),
            _ => None,
        }
    }

    /// True when both nodes carry the same payload (ignoring links)
    pub fn same_content(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Root(_), Node::Root(_)) => true,
            (Node::Element(a), Node::Element(b)) => a.tag == b.tag,
            (Node::Text(a), Node::Text(b)) => a.text == b.text && a.format == b.format,
            _ => false,
        }
    }
}
