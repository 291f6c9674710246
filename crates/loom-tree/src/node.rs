//! Node — one vertex of the conversation forest.

use serde::{Deserialize, Serialize};

use loom_types::{Block, BlockId, BlockKind, NodeId, Position};

/// A vertex in the conversation forest.
///
/// Owned by [`GraphStore`](crate::GraphStore); everything else refers to
/// nodes by [`NodeId`]. Fields are readable through `&Node`, but only the
/// store mutates them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Tree edge. `None` for roots.
    pub parent: Option<NodeId>,
    /// Insertion order is display order.
    pub children: Vec<NodeId>,
    /// Nodes forked *from* this one, oldest first.
    pub branches: Vec<NodeId>,
    /// Origin this node was forked from.
    pub branched_from: Option<NodeId>,
    /// Ordered by `Block::order`.
    pub blocks: Vec<Block>,
    /// Cached tree depth (0 for roots).
    pub depth: usize,
    pub position: Position,
}

impl Node {
    pub(crate) fn new(parent: Option<NodeId>, depth: usize) -> Self {
        Self {
            id: NodeId::new(),
            parent,
            children: Vec::new(),
            branches: Vec::new(),
            branched_from: None,
            blocks: Vec::new(),
            depth,
            position: Position::ORIGIN,
        }
    }

    /// Deep copy for a copy-on-write fork.
    ///
    /// The copy gets a fresh id and fresh block ids, keeps kind/order/content,
    /// parent, depth, and position, and starts with no children or branches.
    /// `branched_from` points back at `self`.
    pub fn fork_copy(&self) -> Node {
        Node {
            id: NodeId::new(),
            parent: self.parent,
            children: Vec::new(),
            branches: Vec::new(),
            branched_from: Some(self.id),
            blocks: self.blocks.iter().map(Block::deep_clone).collect(),
            depth: self.depth,
            position: self.position,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_fork(&self) -> bool {
        self.branched_from.is_some()
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.blocks.iter_mut().find(|b| b.id == id)
    }

    pub fn block_at_order(&self, order: u32) -> Option<&Block> {
        self.blocks.iter().find(|b| b.order == order)
    }

    /// First block of the given kind, if any.
    pub fn first_of(&self, kind: BlockKind) -> Option<&Block> {
        self.blocks.iter().find(|b| b.kind == kind)
    }

    /// True if any Response block carries content.
    pub fn has_response(&self) -> bool {
        self.blocks
            .iter()
            .any(|b| b.kind == BlockKind::Response && !b.is_empty())
    }

    /// Order for the next appended block.
    pub(crate) fn next_order(&self) -> u32 {
        self.blocks
            .iter()
            .map(|b| b.order + 1)
            .max()
            .unwrap_or(0)
    }

    /// One-line label for logs and CLI listings.
    pub fn label(&self) -> String {
        let text = self
            .first_of(BlockKind::Prompt)
            .or_else(|| self.blocks.first())
            .map(|b| b.content.as_str())
            .unwrap_or("");
        let line = text.lines().next().unwrap_or("");
        if line.chars().count() > 40 {
            let head: String = line.chars().take(39).collect();
            format!("{head}…")
        } else {
            line.to_string()
        }
    }
}
