//! Conversation-tree engine for Loom.
//!
//! A conversation is a forest of nodes, each holding an ordered list of
//! prompt, response, and annotation blocks. Editing a block that already
//! shaped the conversation forks its node instead of rewriting history.
//!
//! # Design Philosophy
//!
//! - **One owner.** [`GraphStore`] owns every node; everything else holds ids.
//! - **Forks are siblings.** A fork shares its origin's parent and depth but
//!   is not one of the parent's `children`; it is reached through the
//!   origin's `branches`.
//! - **Reads are pure.** Threads and layouts are recomputed from the store
//!   after every mutation and never write back on their own.
//!
//! # Components
//!
//! - [`GraphStore`]: node arena and structural invariants
//! - [`BranchingEngine`]: copy-on-write fork policy
//! - [`build_thread`]: root-to-target message sequence with fork exclusion
//! - [`TreeLayoutEngine`]: non-overlapping 2-D positions
//! - [`VersionHistory`]: capacity-bounded log of forks
//! - [`ConversationTree`]: all of the above behind one facade
//! - [`SharedTree`]: the facade behind a single `RwLock`

mod branching;
mod config;
mod error;
mod history;
mod layout;
mod node;
mod shared;
mod snapshot;
mod store;
mod thread;
mod tree;

pub use branching::{should_branch, BranchingEngine, EditOutcome, EditSource, ForkResult};
pub use config::{EngineConfig, HistoryConfig, LayoutConfig};
pub use error::{
    BranchError, ConfigError, SnapshotError, StructureViolation, ThreadError, TreeError,
};
pub use history::{BranchMetadata, BranchReason, HistorySummary, VersionHistory};
pub use layout::{layout, layout_with, EstimatedFootprint, Footprints, TreeLayoutEngine};
pub use node::Node;
pub use shared::{shared_tree, SharedTree};
pub use snapshot::{ForestSnapshot, NodeRecord, SNAPSHOT_VERSION};
pub use store::GraphStore;
pub use thread::{build_thread, ChatMessage, ChatRole, Message, Thread, ThreadReconstructor};
pub use tree::ConversationTree;

pub use loom_types::{Block, BlockId, BlockKind, Footprint, NodeId, Position};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, TreeError>;
