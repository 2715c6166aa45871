//! Error types for the editor

use crate::NodeKey;
use std::fmt;
use thiserror::Error;

/// The structural invariants every published state satisfies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invariant {
    /// Every referenced key exists
    DanglingReference,
    /// `a.next == b` implies `b.prev == a`
    SiblingSymmetry,
    /// `first_child`/`last_child` match the ends of the sibling chain
    ChildEnds,
    /// Acyclic, every node reachable from the root exactly once
    Reachability,
    /// Only the root has no parent
    SingleRoot,
}

impl fmt::Display for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Invariant::DanglingReference => "dangling reference",
            Invariant::SiblingSymmetry => "sibling symmetry",
            Invariant::ChildEnds => "child ends",
            Invariant::Reachability => "reachability",
            Invariant::SingleRoot => "single root",
        };
        f.write_str(name)
    }
}

/// A state failed structural validation.
///
/// Never caused by user input; indicates an engine bug or a corrupt import.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invariant '{invariant}' violated: {detail}")]
pub struct InvariantViolation {
    pub invariant: Invariant,
    pub key: Option<NodeKey>,
    pub detail: String,
}

impl InvariantViolation {
    pub fn new(invariant: Invariant, key: Option<NodeKey>, detail: impl Into<String>) -> Self {
        Self {
            invariant,
            key,
            detail: detail.into(),
        }
    }
}

/// Reasons a command batch is rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransactionError {
    #[error("Unknown node key: {0}")]
    UnknownKey(NodeKey),

    #[error("Offset {offset} out of range for {key} (length {len})")]
    OffsetOutOfRange {
        key: NodeKey,
        offset: usize,
        len: usize,
    },

    #[error("Invalid tree operation: {0}")]
    InvalidTreeOperation(String),

    #[error(transparent)]
    InvariantViolation(#[from] InvariantViolation),
}

impl TransactionError {
    /// Recoverable errors only reject the batch; anything else is an engine fault
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, TransactionError::InvariantViolation(_))
    }
}

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("Malformed import: {0}")]
    MalformedImport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<InvariantViolation> for EditorError {
    fn from(violation: InvariantViolation) -> Self {
        EditorError::Transaction(TransactionError::InvariantViolation(violation))
    }
}
