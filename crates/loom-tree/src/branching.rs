//! Copy-on-write branching.
//!
//! Editing a Prompt or Response that already shaped the conversation must not
//! destroy what came after it. Instead the owning node is deep-copied into a
//! *fork*: a sibling with the same parent and depth, carrying the new
//! content, linked back through `branched_from`. The original and everything
//! beneath it stay untouched.
//!
//! ```text
//!        P                       P
//!        │                       │
//!        A   ── edit Q in A ──►  A ┄┄ A'   (A.branches = [A'])
//!        │                       │
//!        C                       C
//! ```

use loom_types::{now_millis, BlockId, BlockKind, NodeId};

use crate::error::BranchError;
use crate::history::{BranchMetadata, BranchReason, VersionHistory};
use crate::store::GraphStore;

/// What the policy needs to know about the block being edited.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EditSource {
    /// The block held non-empty content before this edit.
    pub had_content: bool,
    /// The owning node holds a non-empty Response block.
    pub node_has_response: bool,
}

impl EditSource {
    /// Observe the current state of `block` in `node`.
    pub fn observe(store: &GraphStore, node: NodeId, block: BlockId) -> Result<Self, BranchError> {
        let owner = store.node(node).map_err(|e| BranchError::from_store(node, e))?;
        let target = owner
            .block(block)
            .ok_or(BranchError::BlockNotFound { node, block })?;
        Ok(Self {
            had_content: !target.is_empty(),
            node_has_response: owner.has_response(),
        })
    }
}

/// Whether an edit to a block of `kind` should fork rather than update in place.
///
/// - Markdown annotations never branch.
/// - A first content assignment (empty → non-empty) never branches.
/// - A Prompt branches only once its node holds a non-empty Response.
/// - A non-empty Response always branches.
pub fn should_branch(kind: BlockKind, source: EditSource) -> bool {
    if !kind.is_conversational() || !source.had_content {
        return false;
    }
    kind != BlockKind::Prompt || source.node_has_response
}

/// Result of a successful fork.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForkResult {
    pub new_node_id: NodeId,
    pub metadata: BranchMetadata,
}

/// How an edit was applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditOutcome {
    /// New content equals the old; nothing changed.
    Unchanged,
    /// Content replaced inside the existing block.
    InPlace,
    /// A fork now carries the new content.
    Forked(ForkResult),
}

impl EditOutcome {
    /// The node now holding the edited content.
    pub fn node(&self, edited: NodeId) -> NodeId {
        match self {
            EditOutcome::Forked(fork) => fork.new_node_id,
            EditOutcome::Unchanged | EditOutcome::InPlace => edited,
        }
    }

    pub fn is_fork(&self) -> bool {
        matches!(self, EditOutcome::Forked(_))
    }
}

/// Applies edits to a store, forking when the policy demands it.
///
/// Borrows the store and history mutably for the duration of one edit, so a
/// fork is never observable half-applied.
pub struct BranchingEngine<'a> {
    store: &'a mut GraphStore,
    history: &'a mut VersionHistory,
}

impl<'a> BranchingEngine<'a> {
    pub fn new(store: &'a mut GraphStore, history: &'a mut VersionHistory) -> Self {
        Self { store, history }
    }

    /// Fork `node` with `block` replaced by `new_content`.
    ///
    /// Fails with [`BranchError::NotBranchable`] when the policy declines;
    /// the store is untouched in that case.
    pub fn fork_from_edit(
        &mut self,
        node: NodeId,
        block: BlockId,
        new_content: impl Into<String>,
        source: EditSource,
    ) -> Result<ForkResult, BranchError> {
        let original = self
            .store
            .node(node)
            .map_err(|e| BranchError::from_store(node, e))?;
        let edited = original
            .block(block)
            .ok_or(BranchError::BlockNotFound { node, block })?;

        if !should_branch(edited.kind, source) {
            return Err(BranchError::NotBranchable {
                block,
                kind: edited.kind,
            });
        }
        let reason = match edited.kind {
            BlockKind::Response => BranchReason::ResponseRevised,
            _ => BranchReason::PromptRevised,
        };
        let order = edited.order;
        let previous_content = edited.content.clone();
        let new_content = new_content.into();

        let mut fork = original.fork_copy();
        let fork_id = fork.id;
        let fork_block = match fork.blocks.iter_mut().find(|b| b.order == order) {
            Some(copy) => {
                copy.content = new_content.clone();
                copy.id
            }
            None => return Err(BranchError::BlockNotFound { node, block }),
        };

        self.store
            .insert_fork(fork)
            .map_err(|e| BranchError::from_store(node, e))?;

        let metadata = self.history.record(BranchMetadata {
            seq: 0,
            original_id: node,
            fork_id,
            timestamp: now_millis(),
            changed_block: block,
            fork_block,
            previous_content,
            new_content,
            reason,
        });

        tracing::info!(
            node = %node,
            fork = %fork_id,
            reason = %reason,
            "forked node on edit"
        );

        Ok(ForkResult {
            new_node_id: fork_id,
            metadata,
        })
    }

    /// Observe, consult the policy, and fork or update in place.
    pub fn apply_edit(
        &mut self,
        node: NodeId,
        block: BlockId,
        new_content: impl Into<String>,
    ) -> Result<EditOutcome, BranchError> {
        let new_content = new_content.into();
        let current = self
            .store
            .block(node, block)
            .map_err(|e| BranchError::from_store(node, e))?;
        if current.content == new_content {
            return Ok(EditOutcome::Unchanged);
        }

        let source = EditSource::observe(&*self.store, node, block)?;
        match self.fork_from_edit(node, block, new_content.clone(), source) {
            Ok(fork) => Ok(EditOutcome::Forked(fork)),
            Err(err) if err.is_not_branchable() => {
                self.store
                    .set_block_content(node, block, new_content)
                    .map_err(|e| BranchError::from_store(node, e))?;
                tracing::debug!(node = %node, block = %block, "edited block in place");
                Ok(EditOutcome::InPlace)
            }
            Err(err) => Err(err),
        }
    }
}
