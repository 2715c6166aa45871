//! # Node Keys
//!
//! Opaque handles that identify one logical node across every `State`
//! snapshot. Nodes reference each other (and the selection references nodes)
//! only through keys, never through structural pointers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Next key handed out by [`NodeKey::fresh`]. Zero is never allocated.
static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Stable, process-unique node identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(u64);

impl NodeKey {
    /// Allocate a key that no other node in this process has used
    pub fn fresh() -> Self {
        NodeKey(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }

    /// Make sure keys allocated from now on never collide with `key`.
    ///
    /// Called for every key read from a serialized document.
    pub fn reserve(key: NodeKey) {
        NEXT_KEY.fetch_max(key.0.saturating_add(1), Ordering::Relaxed);
    }

    /// Raw integer value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for NodeKey {
    fn from(value: u64) -> Self {
        NodeKey(value)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
