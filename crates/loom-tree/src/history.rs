//! Version history — append-only, capacity-bounded log of branch events.
//!
//! Every fork records a [`BranchMetadata`]. When the log reaches its
//! high-water mark, the oldest fraction of entries across all nodes is
//! evicted in one batch. The newest entry for each origin node is never
//! evicted, so callers always see at least the latest fork of every node
//! that has one, but must tolerate gaps further back.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use loom_types::{BlockId, NodeId};

use crate::config::HistoryConfig;

/// Why a fork happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum BranchReason {
    /// A prompt was revised after its response arrived.
    #[strum(serialize = "prompt_revised", serialize = "prompt")]
    PromptRevised,
    /// A non-empty response was rewritten.
    #[strum(serialize = "response_revised", serialize = "response")]
    ResponseRevised,
}

impl BranchReason {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BranchReason::PromptRevised => "prompt_revised",
            BranchReason::ResponseRevised => "response_revised",
        }
    }
}

impl std::fmt::Display for BranchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One recorded fork.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchMetadata {
    /// Record sequence, assigned by [`VersionHistory::record`]. Breaks
    /// timestamp ties.
    pub seq: u64,
    /// Node the edit was made against.
    pub original_id: NodeId,
    /// Node created by the fork.
    pub fork_id: NodeId,
    /// Unix millis.
    pub timestamp: u64,
    /// Edited block in the original node.
    pub changed_block: BlockId,
    /// Copy of that block in the fork, holding `new_content`.
    pub fork_block: BlockId,
    pub previous_content: String,
    pub new_content: String,
    pub reason: BranchReason,
}

/// Aggregate view of the log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySummary {
    /// Distinct origin nodes with at least one entry.
    pub node_count: usize,
    /// Total entries currently held.
    pub branch_count: usize,
    /// Oldest held timestamp (Unix millis).
    pub oldest: Option<u64>,
    /// Newest held timestamp (Unix millis).
    pub newest: Option<u64>,
}

/// Append-only log of [`BranchMetadata`], bounded by [`HistoryConfig`].
#[derive(Clone, Debug, Default)]
pub struct VersionHistory {
    /// Entries in record order (ascending `seq`).
    entries: Vec<BranchMetadata>,
    config: HistoryConfig,
    next_seq: u64,
    evicted: u64,
}

impl VersionHistory {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            entries: Vec::new(),
            config,
            next_seq: 0,
            evicted: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries evicted over the log's lifetime.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// All held entries in record order.
    pub fn entries(&self) -> &[BranchMetadata] {
        &self.entries
    }

    /// Append an entry, assigning its `seq`. Returns the stored entry.
    ///
    /// May trigger a batch eviction; the returned entry itself is always
    /// kept, being the newest for its origin.
    pub fn record(&mut self, mut metadata: BranchMetadata) -> BranchMetadata {
        metadata.seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(metadata.clone());

        if self.config.capacity > 0 && self.entries.len() >= self.config.capacity {
            self.evict();
        }
        metadata
    }

    /// Entries in which `node` is the origin or the fork, oldest first.
    pub fn chain_for(&self, node: NodeId) -> Vec<BranchMetadata> {
        let mut chain: Vec<BranchMetadata> = self
            .entries
            .iter()
            .filter(|m| m.original_id == node || m.fork_id == node)
            .cloned()
            .collect();
        chain.sort_by_key(|m| (m.timestamp, m.seq));
        chain
    }

    pub fn summary(&self) -> HistorySummary {
        let origins: HashSet<NodeId> = self.entries.iter().map(|m| m.original_id).collect();
        HistorySummary {
            node_count: origins.len(),
            branch_count: self.entries.len(),
            oldest: self.entries.iter().map(|m| m.timestamp).min(),
            newest: self.entries.iter().map(|m| m.timestamp).max(),
        }
    }

    /// Drop the oldest `evict_fraction` of entries in one batch, sparing the
    /// newest entry of every origin.
    fn evict(&mut self) {
        let target = ((self.entries.len() as f64) * self.config.evict_fraction).ceil() as usize;
        let target = target.max(1);

        // Newest entry per origin, by (timestamp, seq).
        let mut newest: HashMap<NodeId, (u64, u64)> = HashMap::new();
        for m in &self.entries {
            let key = (m.timestamp, m.seq);
            newest
                .entry(m.original_id)
                .and_modify(|k| *k = (*k).max(key))
                .or_insert(key);
        }

        let mut candidates: Vec<(u64, u64)> = self
            .entries
            .iter()
            .filter(|m| newest.get(&m.original_id) != Some(&(m.timestamp, m.seq)))
            .map(|m| (m.timestamp, m.seq))
            .collect();
        candidates.sort_unstable();
        let doomed: HashSet<u64> = candidates.into_iter().take(target).map(|(_, seq)| seq).collect();

        if doomed.is_empty() {
            tracing::warn!(
                entries = self.entries.len(),
                capacity = self.config.capacity,
                "history at capacity but every entry is the newest for its node"
            );
            return;
        }

        self.entries.retain(|m| !doomed.contains(&m.seq));
        self.evicted += doomed.len() as u64;
        tracing::debug!(
            evicted = doomed.len(),
            remaining = self.entries.len(),
            "evicted oldest branch history"
        );
    }
}
