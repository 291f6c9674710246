//! Shared identity, block, and geometry types for Loom.
//!
//! This crate is the leaf of the workspace: typed IDs, the block model, and
//! the 2-D primitives the layout engine speaks. It has **no internal loom
//! dependencies**.
//!
//! # Entity-Relationship Overview
//!
//! ```text
//! Forest
//!     └── Node (NodeId) ← one turn of a conversation
//!         └── parent_id forms the conversation tree
//!         └── branched_from / branches form fork lineage (siblings)
//!         └── owns Blocks (BlockId), ordered by `order`
//!
//! Block (BlockId)
//!     └── kind: Prompt | Response | Markdown
//! ```
//!
//! # Key Types
//!
//! |---------------|---------------------------------------------|
//! | Type          | Purpose                                     |
//! |---------------|---------------------------------------------|
//! | [`NodeId`]    | Which node in the forest                    |
//! | [`BlockId`]   | Which block (unique across the forest)      |
//! | [`BlockKind`] | Prompt, Response, or Markdown annotation    |
//! | [`Block`]     | Content unit inside a node                  |
//! | [`Position`]  | Node anchor (top-centre)                    |
//! | [`Footprint`] | Rendered extent used by layout              |
//! |---------------|---------------------------------------------|

pub mod block;
pub mod geometry;
pub mod ids;

pub use block::{Block, BlockKind};
pub use geometry::{Footprint, Position};
pub use ids::{BlockId, NodeId};

/// Current time as Unix milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
