//! Shared, lock-guarded access to a [`ConversationTree`].
//!
//! One `RwLock` guards the whole forest. Readers (threads, layout, export)
//! share it; every edit holds the write guard for the entire fork, so no
//! reader ever sees a fork without its history entry.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::EngineConfig;
use crate::tree::ConversationTree;

/// Thread-safe handle to a conversation tree.
pub type SharedTree = Arc<RwLock<ConversationTree>>;

/// Create a shared, empty conversation tree.
pub fn shared_tree(config: EngineConfig) -> SharedTree {
    Arc::new(RwLock::new(ConversationTree::new(config)))
}
