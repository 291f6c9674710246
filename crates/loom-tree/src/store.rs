//! GraphStore — the canonical node arena.
//!
//! Nodes live in an insertion-ordered map keyed by [`NodeId`]. Other
//! components hold ids only; every mutation happens inside a single
//! `&mut self` call, so no half-applied state is ever observable.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use loom_types::{Block, BlockId, NodeId, Position};

use crate::error::{StructureViolation, TreeError};
use crate::node::Node;
use crate::Result;

/// Owner of every [`Node`] and [`Block`] in a conversation forest.
#[derive(Clone, Debug, Default)]
pub struct GraphStore {
    nodes: IndexMap<NodeId, Node>,

    /// Every block id held by any node. Block ids are unique forest-wide.
    block_ids: HashSet<BlockId>,

    /// Bumped on every successful mutation.
    version: u64,
}

impl PartialEq for GraphStore {
    /// Structural equality: same nodes, same fields, same order.
    fn eq(&self, other: &Self) -> bool {
        self.nodes.len() == other.nodes.len() && self.nodes.iter().eq(other.nodes.iter())
    }
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Mutation counter. Thread and layout results are stale once it moves.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Nodes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Look up a block inside a node.
    pub fn block(&self, node: NodeId, block: BlockId) -> Result<&Block> {
        self.node(node)?
            .block(block)
            .ok_or(TreeError::BlockNotFound { node, block })
    }

    /// Like [`get`](Self::get), but a missing node is an error.
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or(TreeError::NodeNotFound(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(&id).ok_or(TreeError::NodeNotFound(id))
    }

    // =========================================================================
    // Tree queries
    // =========================================================================

    /// Nodes without a parent, in insertion order.
    pub fn roots(&self) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| n.parent.is_none())
            .map(|n| n.id)
            .collect()
    }

    /// Ancestors from immediate parent up to the root.
    ///
    /// Stops at a missing parent, or before revisiting a node on a corrupt chain.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut ancestors = Vec::new();
        let mut visited = HashSet::from([id]);
        let mut current = self.nodes.get(&id).and_then(|n| n.parent);

        while let Some(pid) = current {
            if !visited.insert(pid) {
                tracing::warn!(node = %id, at = %pid, "ancestors() found a cycle, truncating");
                break;
            }
            let Some(parent) = self.nodes.get(&pid) else {
                break;
            };
            ancestors.push(pid);
            current = parent.parent;
        }

        ancestors
    }

    /// Pre-order walk over `children` starting at `root` (inclusive).
    ///
    /// Forks are not children and are not included.
    pub fn subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![root];
        let mut visited = HashSet::new();

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue; // cycle detected — skip
            }
            if let Some(node) = self.nodes.get(&id) {
                result.push(id);
                // Push children in reverse to maintain order
                for child in node.children.iter().rev() {
                    stack.push(*child);
                }
            }
        }

        result
    }

    /// Number of nodes naming `id` as their parent (children and forks of children).
    fn dependents(&self, id: NodeId) -> usize {
        self.nodes.values().filter(|n| n.parent == Some(id)).count()
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Create a node under `parent` (or a new root) holding `blocks`.
    ///
    /// Blocks are numbered `0..n` in the order given. The new id is appended
    /// to the parent's `children`.
    pub fn create_node(&mut self, parent: Option<NodeId>, blocks: Vec<Block>) -> Result<NodeId> {
        let depth = match parent {
            Some(pid) => self.node(pid)?.depth + 1,
            None => 0,
        };

        let mut seen = HashSet::new();
        for block in &blocks {
            if self.block_ids.contains(&block.id) || !seen.insert(block.id) {
                return Err(TreeError::DuplicateBlock(block.id));
            }
        }

        let mut node = Node::new(parent, depth);
        node.blocks = blocks
            .into_iter()
            .enumerate()
            .map(|(i, mut b)| {
                b.order = i as u32;
                b
            })
            .collect();
        let id = node.id;

        if let Some(pid) = parent {
            self.node_mut(pid)?.children.push(id);
        }
        self.block_ids.extend(seen);
        self.nodes.insert(id, node);
        self.version += 1;

        tracing::debug!(node = %id, parent = ?parent, depth, "created node");
        Ok(id)
    }

    /// Append a block to a node. The block's `order` is assigned here.
    pub fn append_block(&mut self, node: NodeId, mut block: Block) -> Result<BlockId> {
        if self.block_ids.contains(&block.id) {
            return Err(TreeError::DuplicateBlock(block.id));
        }
        let target = self.node_mut(node)?;
        block.order = target.next_order();
        let id = block.id;
        target.blocks.push(block);
        self.block_ids.insert(id);
        self.version += 1;
        Ok(id)
    }

    /// Replace a block's content in place. Never forks.
    pub fn set_block_content(
        &mut self,
        node: NodeId,
        block: BlockId,
        content: impl Into<String>,
    ) -> Result<()> {
        let target = self
            .node_mut(node)?
            .block_mut(block)
            .ok_or(TreeError::BlockNotFound { node, block })?;
        target.content = content.into();
        self.version += 1;
        Ok(())
    }

    /// Delete a leaf node.
    ///
    /// Refused while the node has children, or while any fork of a former
    /// child still names it as parent. On success:
    ///
    /// - the node leaves its parent's `children`;
    /// - if it was a fork, it leaves its origin's `branches`;
    /// - its own forks take over its slot: re-linked to its origin if it was
    ///   a fork, promoted into the parent's `children` if it was a child,
    ///   or left as plain roots otherwise.
    pub fn delete_node(&mut self, id: NodeId) -> Result<()> {
        let node = self.node(id)?;
        if !node.children.is_empty() {
            return Err(StructureViolation::HasChildren {
                node: id,
                children: node.children.len(),
            }
            .into());
        }
        let dependents = self.dependents(id);
        if dependents > 0 {
            return Err(StructureViolation::HasChildren {
                node: id,
                children: dependents,
            }
            .into());
        }

        // All checks passed; nothing below can fail.
        let Some(node) = self.nodes.shift_remove(&id) else {
            return Err(TreeError::NodeNotFound(id));
        };
        for block in &node.blocks {
            self.block_ids.remove(&block.id);
        }

        let child_slot = node.parent.and_then(|pid| {
            let parent = self.nodes.get_mut(&pid)?;
            let idx = parent.children.iter().position(|c| *c == id)?;
            parent.children.remove(idx);
            Some((pid, idx))
        });

        let branch_slot = node.branched_from.and_then(|oid| {
            let origin = self.nodes.get_mut(&oid)?;
            let idx = origin.branches.iter().position(|b| *b == id)?;
            origin.branches.remove(idx);
            Some((oid, idx))
        });

        for (offset, fork_id) in node.branches.iter().enumerate() {
            let new_origin = branch_slot.map(|(oid, _)| oid);
            if let Some(fork) = self.nodes.get_mut(fork_id) {
                fork.branched_from = new_origin;
            }
            if let Some((oid, idx)) = branch_slot {
                if let Some(origin) = self.nodes.get_mut(&oid) {
                    origin.branches.insert(idx + offset, *fork_id);
                }
            } else if let Some((pid, idx)) = child_slot {
                if let Some(parent) = self.nodes.get_mut(&pid) {
                    parent.children.insert(idx + offset, *fork_id);
                }
            }
        }

        self.version += 1;
        tracing::debug!(node = %id, forks = node.branches.len(), "deleted node");
        Ok(())
    }

    /// Insert a fork produced by [`Node::fork_copy`] and link it to its origin.
    ///
    /// The fork is a sibling: it is *not* added to the parent's `children`.
    pub(crate) fn insert_fork(&mut self, fork: Node) -> Result<NodeId> {
        let origin_id = fork
            .branched_from
            .ok_or(StructureViolation::Unreachable {
                node: fork.id,
                parent: fork.parent.unwrap_or(fork.id),
            })?;
        if self.nodes.contains_key(&fork.id) {
            return Err(TreeError::DuplicateNode(fork.id));
        }
        if let Some(block) = fork.blocks.iter().find(|b| self.block_ids.contains(&b.id)) {
            return Err(TreeError::DuplicateBlock(block.id));
        }
        if let Some(pid) = fork.parent {
            if !self.nodes.contains_key(&pid) {
                return Err(StructureViolation::BrokenParentReference {
                    at: fork.id,
                    parent: pid,
                }
                .into());
            }
        }

        let id = fork.id;
        self.node_mut(origin_id)?.branches.push(id);
        self.block_ids.extend(fork.blocks.iter().map(|b| b.id));
        self.nodes.insert(id, fork);
        self.version += 1;
        Ok(id)
    }

    /// Move a node. Layout results are applied through here or
    /// [`apply_positions`](Self::apply_positions); nothing else touches positions.
    pub fn set_position(&mut self, id: NodeId, position: Position) -> Result<()> {
        self.node_mut(id)?.position = position;
        self.version += 1;
        Ok(())
    }

    /// Apply a layout result. Ids no longer in the store are ignored.
    pub fn apply_positions(&mut self, positions: &HashMap<NodeId, Position>) -> usize {
        let mut applied = 0;
        for (id, pos) in positions {
            if let Some(node) = self.nodes.get_mut(id) {
                node.position = *pos;
                applied += 1;
            }
        }
        if applied > 0 {
            self.version += 1;
        }
        applied
    }

    /// Build a store from already-linked nodes, without validation.
    pub(crate) fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Result<Self> {
        let mut map = IndexMap::new();
        let mut block_ids = HashSet::new();
        for node in nodes {
            let id = node.id;
            block_ids.extend(node.blocks.iter().map(|b| b.id));
            if map.insert(id, node).is_some() {
                return Err(TreeError::DuplicateNode(id));
            }
        }
        Ok(Self {
            nodes: map,
            block_ids,
            version: 0,
        })
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Check every structural invariant. Reports the first violation found.
    pub fn validate(&self) -> std::result::Result<(), StructureViolation> {
        let mut block_ids = HashSet::new();

        for node in self.nodes.values() {
            match node.parent {
                Some(pid) => {
                    let parent = self.nodes.get(&pid).ok_or(
                        StructureViolation::BrokenParentReference { at: node.id, parent: pid },
                    )?;
                    if node.depth != parent.depth + 1 {
                        return Err(StructureViolation::DepthMismatch {
                            node: node.id,
                            expected: parent.depth + 1,
                            actual: node.depth,
                        });
                    }
                    if node.branched_from.is_none() && !parent.children.contains(&node.id) {
                        return Err(StructureViolation::Unreachable { node: node.id, parent: pid });
                    }
                }
                None if node.depth != 0 => {
                    return Err(StructureViolation::DepthMismatch {
                        node: node.id,
                        expected: 0,
                        actual: node.depth,
                    });
                }
                None => {}
            }

            let mut seen_children = HashSet::new();
            for child_id in &node.children {
                let actual = self.nodes.get(child_id).and_then(|c| c.parent);
                if actual != Some(node.id) || !seen_children.insert(*child_id) {
                    return Err(StructureViolation::ChildParentMismatch {
                        parent: node.id,
                        child: *child_id,
                        actual,
                    });
                }
            }

            if let Some(oid) = node.branched_from {
                let origin = self.nodes.get(&oid).ok_or(StructureViolation::BranchLinkMismatch {
                    origin: oid,
                    fork: node.id,
                })?;
                if !origin.branches.contains(&node.id) {
                    return Err(StructureViolation::BranchLinkMismatch { origin: oid, fork: node.id });
                }
                if origin.parent != node.parent || origin.depth != node.depth {
                    return Err(StructureViolation::ForkNotSibling { origin: oid, fork: node.id });
                }
            }

            for fork_id in &node.branches {
                let linked = self
                    .nodes
                    .get(fork_id)
                    .is_some_and(|f| f.branched_from == Some(node.id));
                if !linked {
                    return Err(StructureViolation::BranchLinkMismatch {
                        origin: node.id,
                        fork: *fork_id,
                    });
                }
            }

            let mut orders = HashSet::new();
            for block in &node.blocks {
                if !orders.insert(block.order) {
                    return Err(StructureViolation::DuplicateBlockOrder {
                        node: node.id,
                        order: block.order,
                    });
                }
                if !block_ids.insert(block.id) {
                    return Err(StructureViolation::DuplicateBlockId { block: block.id });
                }
            }
        }

        self.check_acyclic()
    }

    /// Every parent chain reaches a root without revisiting a node.
    fn check_acyclic(&self) -> std::result::Result<(), StructureViolation> {
        // Nodes already proven to reach a root.
        let mut grounded: HashSet<NodeId> = HashSet::new();

        for start in self.nodes.keys() {
            let mut chain = Vec::new();
            let mut on_chain = HashSet::new();
            let mut current = Some(*start);

            while let Some(id) = current {
                if grounded.contains(&id) {
                    break;
                }
                if !on_chain.insert(id) {
                    return Err(StructureViolation::Cycle { at: *start });
                }
                chain.push(id);
                current = self.nodes.get(&id).and_then(|n| n.parent);
            }
            grounded.extend(chain);
        }

        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================
