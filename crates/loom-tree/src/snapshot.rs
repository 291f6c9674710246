//! Forest snapshots for persistence.
//!
//! A snapshot is the ordered list of node records, in store insertion order.
//! Two encodings: JSON for inspection, postcard for compact storage. Import
//! re-validates every structural invariant before handing back a store.

use serde::{Deserialize, Serialize};

use loom_types::{Block, NodeId, Position};

use crate::error::SnapshotError;
use crate::node::Node;
use crate::store::GraphStore;

/// Bumped on any change to the record layout.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One persisted node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub branches: Vec<NodeId>,
    pub branched_from: Option<NodeId>,
    pub depth: u32,
    pub position: Position,
    pub blocks: Vec<Block>,
}

impl From<&Node> for NodeRecord {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id,
            parent: node.parent,
            children: node.children.clone(),
            branches: node.branches.clone(),
            branched_from: node.branched_from,
            depth: node.depth as u32,
            position: node.position,
            blocks: node.blocks.clone(),
        }
    }
}

impl From<NodeRecord> for Node {
    fn from(record: NodeRecord) -> Self {
        let mut blocks = record.blocks;
        blocks.sort_by_key(|b| b.order);
        Node {
            id: record.id,
            parent: record.parent,
            children: record.children,
            branches: record.branches,
            branched_from: record.branched_from,
            blocks,
            depth: record.depth as usize,
            position: record.position,
        }
    }
}

/// Whole-forest snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForestSnapshot {
    pub version: u32,
    pub nodes: Vec<NodeRecord>,
}

impl ForestSnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Compact binary encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(postcard::to_allocvec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        Ok(postcard::from_bytes(bytes)?)
    }
}

impl GraphStore {
    /// Snapshot every node in insertion order.
    pub fn export(&self) -> ForestSnapshot {
        ForestSnapshot {
            version: SNAPSHOT_VERSION,
            nodes: self.iter().map(NodeRecord::from).collect(),
        }
    }

    /// Rebuild a store from a snapshot, rejecting any broken invariant.
    pub fn import(snapshot: ForestSnapshot) -> Result<Self, SnapshotError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        let store = GraphStore::from_nodes(snapshot.nodes.into_iter().map(Node::from))?;
        store.validate().map_err(crate::error::TreeError::from)?;
        tracing::debug!(nodes = store.len(), "imported forest snapshot");
        Ok(store)
    }
}
