//! Error types for tree operations.
//!
//! Three families, matching how callers react:
//!
//! - **Not found** — a referenced node or block does not exist.
//! - **Structure violations** — the forest would break (or already broke)
//!   one of its invariants. Data-integrity failures, never transient.
//! - **Branch refusals** — the branching policy declined; callers fall back
//!   to an in-place update.

use loom_types::{BlockId, BlockKind, NodeId};
use thiserror::Error;

/// A forest invariant that an operation would violate, or that a traversal
/// found already violated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructureViolation {
    /// Delete refused: other nodes still hang off this one.
    #[error("node {node:?} still has {children} dependent node(s)")]
    HasChildren { node: NodeId, children: usize },

    /// A `parent` id that does not resolve to a node.
    #[error("node {at:?} references missing parent {parent:?}")]
    BrokenParentReference { at: NodeId, parent: NodeId },

    /// Following `parent` links from `at` revisits a node.
    #[error("parent chain from node {at:?} forms a cycle")]
    Cycle { at: NodeId },

    /// `parent.children` lists a node that does not name `parent` as its parent
    /// (or lists it twice).
    #[error("node {parent:?} lists child {child:?}, whose parent is {actual:?}")]
    ChildParentMismatch {
        parent: NodeId,
        child: NodeId,
        actual: Option<NodeId>,
    },

    /// A non-fork node whose parent does not list it as a child.
    #[error("node {node:?} is not reachable from its parent {parent:?}")]
    Unreachable { node: NodeId, parent: NodeId },

    /// `branched_from` and `branches` disagree.
    #[error("fork link between origin {origin:?} and fork {fork:?} is not mutual")]
    BranchLinkMismatch { origin: NodeId, fork: NodeId },

    /// A fork that is not a sibling of its origin.
    #[error("fork {fork:?} does not share parent and depth with origin {origin:?}")]
    ForkNotSibling { origin: NodeId, fork: NodeId },

    /// Cached depth disagrees with the parent chain.
    #[error("node {node:?} has depth {actual}, expected {expected}")]
    DepthMismatch {
        node: NodeId,
        expected: usize,
        actual: usize,
    },

    /// Two blocks in one node share an `order`.
    #[error("node {node:?} has more than one block at order {order}")]
    DuplicateBlockOrder { node: NodeId, order: u32 },

    /// A block id appears more than once in the forest.
    #[error("block {block:?} appears more than once")]
    DuplicateBlockId { block: BlockId },
}

/// Errors from [`GraphStore`](crate::GraphStore) operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Node not found in the store.
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Block not found in the given node.
    #[error("block {block:?} not found in node {node:?}")]
    BlockNotFound { node: NodeId, block: BlockId },

    /// A node with this id already exists.
    #[error("node already exists: {0:?}")]
    DuplicateNode(NodeId),

    /// Some node in the forest already holds a block with this id.
    #[error("block already exists: {0:?}")]
    DuplicateBlock(BlockId),

    /// The forest's structure would be (or is) broken.
    #[error("tree structure violation: {0}")]
    Structure(#[from] StructureViolation),
}

impl TreeError {
    /// Node or block lookup failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TreeError::NodeNotFound(_) | TreeError::BlockNotFound { .. })
    }

    pub fn is_structure_violation(&self) -> bool {
        matches!(self, TreeError::Structure(_))
    }
}

/// Errors from [`BranchingEngine::fork_from_edit`](crate::BranchingEngine::fork_from_edit).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BranchError {
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),

    #[error("block {block:?} not found in node {node:?}")]
    BlockNotFound { node: NodeId, block: BlockId },

    /// Policy says this edit happens in place. Not a user-facing error.
    #[error("{kind} block {block:?} is edited in place")]
    NotBranchable { block: BlockId, kind: BlockKind },

    /// The fork could not be inserted; the store may be in use without the
    /// exclusive lock.
    #[error("fork of node {node:?} could not complete: {source}")]
    SourceVanished {
        node: NodeId,
        #[source]
        source: TreeError,
    },
}

impl BranchError {
    /// Whether the caller should retry the edit as an in-place update.
    pub fn is_not_branchable(&self) -> bool {
        matches!(self, BranchError::NotBranchable { .. })
    }
}

impl BranchError {
    /// Map a store error raised while forking `node`.
    ///
    /// Lookup failures keep their identity; anything else means the store
    /// changed underneath the fork.
    pub(crate) fn from_store(node: NodeId, err: TreeError) -> Self {
        match err {
            TreeError::NodeNotFound(id) => BranchError::NodeNotFound(id),
            TreeError::BlockNotFound { node, block } => BranchError::BlockNotFound { node, block },
            source => BranchError::SourceVanished { node, source },
        }
    }
}

/// Errors from [`build_thread`](crate::build_thread).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThreadError {
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// A `parent` id on the path does not resolve.
    #[error("broken parent reference at {at:?}: missing {parent:?}")]
    BrokenParentReference { at: NodeId, parent: NodeId },

    /// The parent chain loops back on itself.
    #[error("parent chain from node {at:?} forms a cycle")]
    Cycle { at: NodeId },
}

impl From<ThreadError> for TreeError {
    fn from(err: ThreadError) -> Self {
        match err {
            ThreadError::NodeNotFound(id) => TreeError::NodeNotFound(id),
            ThreadError::BrokenParentReference { at, parent } => {
                StructureViolation::BrokenParentReference { at, parent }.into()
            }
            ThreadError::Cycle { at } => StructureViolation::Cycle { at }.into(),
        }
    }
}

/// Errors from encoding or decoding a [`ForestSnapshot`](crate::ForestSnapshot).
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("postcard error: {0}")]
    Postcard(#[from] postcard::Error),

    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// The decoded forest breaks an invariant.
    #[error("invalid snapshot: {0}")]
    Invalid(#[from] TreeError),
}

/// Errors from parsing engine configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
