//! ConversationTree: one forest plus its branch history.
//!
//! This is the surface a UI talks to. It owns the [`GraphStore`] and the
//! [`VersionHistory`] together so every edit can consult the branching
//! policy and record its fork in one step.

use std::collections::HashMap;

use loom_types::{Block, BlockId, NodeId, Position};

use crate::branching::{BranchingEngine, EditOutcome, EditSource, ForkResult};
use crate::config::EngineConfig;
use crate::error::{BranchError, SnapshotError, ThreadError};
use crate::history::{BranchMetadata, HistorySummary, VersionHistory};
use crate::layout::{Footprints, TreeLayoutEngine};
use crate::node::Node;
use crate::snapshot::ForestSnapshot;
use crate::store::GraphStore;
use crate::thread::{build_thread, Thread};
use crate::Result;

/// A conversation forest with copy-on-write editing.
#[derive(Clone, Debug, Default)]
pub struct ConversationTree {
    store: GraphStore,
    history: VersionHistory,
    config: EngineConfig,
}

impl ConversationTree {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            store: GraphStore::new(),
            history: VersionHistory::new(config.history),
            config,
        }
    }

    /// Wrap an existing store (e.g. one just imported). History starts empty.
    pub fn from_store(store: GraphStore, config: EngineConfig) -> Self {
        Self {
            store,
            history: VersionHistory::new(config.history),
            config,
        }
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn history(&self) -> &VersionHistory {
        &self.history
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.store.get(id)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    // =========================================================================
    // Structure
    // =========================================================================

    pub fn create_node(&mut self, parent: Option<NodeId>, blocks: Vec<Block>) -> Result<NodeId> {
        self.store.create_node(parent, blocks)
    }

    pub fn append_block(&mut self, node: NodeId, block: Block) -> Result<BlockId> {
        self.store.append_block(node, block)
    }

    pub fn delete_node(&mut self, id: NodeId) -> Result<()> {
        self.store.delete_node(id)
    }

    /// In-place content update. Bypasses the branching policy.
    pub fn set_block_content(
        &mut self,
        node: NodeId,
        block: BlockId,
        content: impl Into<String>,
    ) -> Result<()> {
        self.store.set_block_content(node, block, content)
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Edit a block the way a user would: fork if the policy says so,
    /// otherwise update in place.
    pub fn edit_block(
        &mut self,
        node: NodeId,
        block: BlockId,
        content: impl Into<String>,
    ) -> std::result::Result<EditOutcome, BranchError> {
        BranchingEngine::new(&mut self.store, &mut self.history).apply_edit(node, block, content)
    }

    /// Force the fork path. Fails with `NotBranchable` when the policy declines.
    pub fn fork_from_edit(
        &mut self,
        node: NodeId,
        block: BlockId,
        content: impl Into<String>,
    ) -> std::result::Result<ForkResult, BranchError> {
        let source = EditSource::observe(&self.store, node, block)?;
        BranchingEngine::new(&mut self.store, &mut self.history)
            .fork_from_edit(node, block, content, source)
    }

    // =========================================================================
    // Read side
    // =========================================================================

    pub fn thread(&self, target: NodeId) -> std::result::Result<Thread, ThreadError> {
        build_thread(&self.store, target)
    }

    /// Branch events touching `node`, oldest first.
    pub fn branch_history(&self, node: NodeId) -> Vec<BranchMetadata> {
        self.history.chain_for(node)
    }

    pub fn history_summary(&self) -> HistorySummary {
        self.history.summary()
    }

    pub fn layout(&self) -> HashMap<NodeId, Position> {
        TreeLayoutEngine::new(self.config.layout).layout(&self.store)
    }

    pub fn layout_with<F>(&self, footprints: &F) -> HashMap<NodeId, Position>
    where
        F: Footprints + ?Sized,
    {
        TreeLayoutEngine::new(self.config.layout).layout_with(&self.store, footprints)
    }

    /// Compute a layout and store it on the nodes. Returns nodes moved.
    pub fn auto_layout(&mut self) -> usize {
        let positions = self.layout();
        self.store.apply_positions(&positions)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    pub fn export(&self) -> ForestSnapshot {
        self.store.export()
    }

    pub fn import(
        snapshot: ForestSnapshot,
        config: EngineConfig,
    ) -> std::result::Result<Self, SnapshotError> {
        Ok(Self::from_store(GraphStore::import(snapshot)?, config))
    }
}
