//! Thread reconstruction: the linear conversation that leads to a node.
//!
//! Walks `parent` links from the target up to a root while accumulating an
//! exclusion set. Forks are alternate versions of a turn, never ancestors of
//! one another, so whichever version the walk passes through wins and its
//! rivals are excluded:
//!
//! - a fork excludes its origin and the origin's other forks;
//! - a node with forks excludes all of them;
//! - an excluded candidate parent is skipped in favour of its own parent.
//!
//! The walk is a pure read. Results go stale as soon as the store mutates.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use loom_types::{BlockId, BlockKind, NodeId};

use crate::error::ThreadError;
use crate::node::Node;
use crate::store::GraphStore;

/// One block on the thread, tagged with where it came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub node: NodeId,
    pub block: BlockId,
    pub kind: BlockKind,
    pub content: String,
}

/// Role of a message sent to a completion backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// `{role, content}` pair in the shape completion APIs expect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Root-to-target conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub root: NodeId,
    pub target: NodeId,
    /// Node ids, root first, target last.
    pub path: Vec<NodeId>,
    /// Blocks of every node on `path`, in path order then block order.
    pub messages: Vec<Message>,
    /// Ids ruled out during the walk, sorted.
    pub excluded: Vec<NodeId>,
}

impl Thread {
    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.path.contains(&node)
    }

    /// Plain-text rendering, one `[kind] content` paragraph per message.
    pub fn transcript(&self) -> String {
        let mut out = String::new();
        for message in &self.messages {
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push('[');
            out.push_str(message.kind.as_str());
            out.push_str("] ");
            out.push_str(&message.content);
        }
        out
    }

    /// Messages for a completion request. Markdown annotations and empty
    /// blocks are dropped.
    pub fn completion_messages(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .filter(|m| !m.content.is_empty())
            .filter_map(|m| {
                let role = match m.kind {
                    BlockKind::Prompt => ChatRole::User,
                    BlockKind::Response => ChatRole::Assistant,
                    BlockKind::Markdown => return None,
                };
                Some(ChatMessage {
                    role,
                    content: m.content.clone(),
                })
            })
            .collect()
    }
}

/// Traversal state for one [`build`](ThreadReconstructor::build) call.
pub struct ThreadReconstructor<'a> {
    store: &'a GraphStore,
    excluded: HashSet<NodeId>,
    visited: HashSet<NodeId>,
}

impl<'a> ThreadReconstructor<'a> {
    pub fn new(store: &'a GraphStore) -> Self {
        Self {
            store,
            excluded: HashSet::new(),
            visited: HashSet::new(),
        }
    }

    pub fn build(mut self, target: NodeId) -> Result<Thread, ThreadError> {
        let mut node = self
            .store
            .get(target)
            .ok_or(ThreadError::NodeNotFound(target))?;
        let mut path = vec![target];
        self.visited.insert(target);

        loop {
            self.exclude_rivals(node);

            let Some(parent) = self.next_parent(node)? else {
                break;
            };
            if !self.visited.insert(parent.id) {
                tracing::warn!(at = %node.id, parent = %parent.id, "thread walk revisited a node");
                return Err(ThreadError::Cycle { at: node.id });
            }
            path.push(parent.id);
            node = parent;
        }

        path.reverse();
        let messages = path
            .iter()
            .filter_map(|id| self.store.get(*id))
            .flat_map(|n| {
                let mut blocks: Vec<_> = n.blocks.iter().collect();
                blocks.sort_by_key(|b| b.order);
                blocks.into_iter().map(move |b| Message {
                    node: n.id,
                    block: b.id,
                    kind: b.kind,
                    content: b.content.clone(),
                })
            })
            .collect();

        let mut excluded: Vec<NodeId> = self.excluded.into_iter().collect();
        excluded.sort();

        Ok(Thread {
            root: path[0],
            target,
            path,
            messages,
            excluded,
        })
    }

    /// Add the alternatives to `node` to the exclusion set.
    fn exclude_rivals(&mut self, node: &Node) {
        if let Some(origin_id) = node.branched_from {
            self.excluded.insert(origin_id);
            if let Some(origin) = self.store.get(origin_id) {
                self.excluded
                    .extend(origin.branches.iter().filter(|b| **b != node.id));
            }
        }
        self.excluded.extend(node.branches.iter().copied());
    }

    /// First unexcluded ancestor of `node`, or `None` at the root.
    fn next_parent(&mut self, node: &'a Node) -> Result<Option<&'a Node>, ThreadError> {
        let store = self.store;
        let mut at = node;
        while let Some(pid) = at.parent {
            let parent = store
                .get(pid)
                .ok_or(ThreadError::BrokenParentReference { at: at.id, parent: pid })?;
            if !self.excluded.contains(&pid) {
                return Ok(Some(parent));
            }
            if !self.visited.insert(pid) {
                return Err(ThreadError::Cycle { at: node.id });
            }
            tracing::trace!(skipped = %pid, "skipping excluded ancestor");
            at = parent;
        }
        Ok(None)
    }
}

/// Reconstruct the thread ending at `target`.
pub fn build_thread(store: &GraphStore, target: NodeId) -> Result<Thread, ThreadError> {
    ThreadReconstructor::new(store).build(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branching::BranchingEngine;
    use crate::history::VersionHistory;
    use loom_types::Block;

    fn qa(q: &str, a: &str) -> Vec<Block> {
        vec![Block::prompt(q), Block::response(a)]
    }

    fn revise_prompt(store: &mut GraphStore, node: NodeId, content: &str) -> NodeId {
        let mut history = VersionHistory::default();
        let q = store.get(node).unwrap().first_of(BlockKind::Prompt).unwrap().id;
        BranchingEngine::new(store, &mut history)
            .apply_edit(node, q, content)
            .unwrap()
            .node(node)
    }

    #[test]
    fn test_linear_chain() {
        let mut store = GraphStore::new();
        let root = store.create_node(None, qa("Q1", "A1")).unwrap();
        let mid = store.create_node(Some(root), qa("Q2", "A2")).unwrap();
        let leaf = store.create_node(Some(mid), qa("Q3", "A3")).unwrap();

        let thread = build_thread(&store, leaf).unwrap();
        assert_eq!(thread.root, root);
        assert_eq!(thread.target, leaf);
        assert_eq!(thread.path, vec![root, mid, leaf]);
        assert!(thread.excluded.is_empty());

        let contents: Vec<&str> = thread.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["Q1", "A1", "Q2", "A2", "Q3", "A3"]);
        assert_eq!(thread.messages[2].node, mid);
    }

    #[test]
    fn test_root_fork_threads_are_disjoint() {
        let mut store = GraphStore::new();
        let r = store.create_node(None, qa("Q1", "A1")).unwrap();
        let f = revise_prompt(&mut store, r, "Q1-revised");

        let from_fork = build_thread(&store, f).unwrap();
        assert_eq!(from_fork.path, vec![f]);
        assert_eq!(from_fork.excluded, vec![r]);

        let from_origin = build_thread(&store, r).unwrap();
        assert_eq!(from_origin.path, vec![r]);
        assert_eq!(from_origin.excluded, vec![f]);
    }

    #[test]
    fn test_branch_exclusion_with_two_forks() {
        let mut store = GraphStore::new();
        let root = store.create_node(None, qa("Q0", "A0")).unwrap();
        let a = store.create_node(Some(root), qa("Q1", "A1")).unwrap();
        let b1 = revise_prompt(&mut store, a, "Q1 b1");
        let b2 = revise_prompt(&mut store, a, "Q1 b2");
        assert_eq!(store.get(a).unwrap().branches, vec![b1, b2]);

        let ta = build_thread(&store, a).unwrap();
        assert_eq!(ta.path, vec![root, a]);
        assert!(!ta.contains(b1) && !ta.contains(b2));

        let tb1 = build_thread(&store, b1).unwrap();
        assert_eq!(tb1.path, vec![root, b1]);
        assert!(!tb1.contains(a) && !tb1.contains(b2));
        let mut expected = vec![a, b2];
        expected.sort();
        assert_eq!(tb1.excluded, expected);
    }

    #[test]
    fn test_continuation_under_fork() {
        let mut store = GraphStore::new();
        let root = store.create_node(None, qa("Q0", "A0")).unwrap();
        let a = store.create_node(Some(root), qa("Q1", "A1")).unwrap();
        let _old_tail = store.create_node(Some(a), qa("Q2", "A2")).unwrap();
        let fork = revise_prompt(&mut store, a, "Q1 revised");
        let new_tail = store.create_node(Some(fork), qa("Q2'", "A2'")).unwrap();

        let thread = build_thread(&store, new_tail).unwrap();
        assert_eq!(thread.path, vec![root, fork, new_tail]);
        let prompts: Vec<&str> = thread
            .messages
            .iter()
            .filter(|m| m.kind == BlockKind::Prompt)
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(prompts, vec!["Q0", "Q1 revised", "Q2'"]);
    }

    #[test]
    fn test_excluded_parent_is_skipped() {
        let mut store = GraphStore::new();
        let root = store.create_node(None, qa("Q0", "A0")).unwrap();
        let a = store.create_node(Some(root), qa("Q1", "A1")).unwrap();
        let leaf = store.create_node(Some(a), qa("Q2", "A2")).unwrap();
        // Corrupt lineage: leaf claims to be a fork of its own parent.
        store.node_mut(leaf).unwrap().branched_from = Some(a);
        store.node_mut(a).unwrap().branches.push(leaf);

        let thread = build_thread(&store, leaf).unwrap();
        assert_eq!(thread.path, vec![root, leaf]);
        assert!(thread.excluded.contains(&a));
    }

    #[test]
    fn test_broken_parent_reference() {
        let mut store = GraphStore::new();
        let root = store.create_node(None, qa("Q0", "A0")).unwrap();
        let child = store.create_node(Some(root), qa("Q1", "A1")).unwrap();
        let ghost = NodeId::new();
        store.node_mut(child).unwrap().parent = Some(ghost);

        assert_eq!(
            build_thread(&store, child),
            Err(ThreadError::BrokenParentReference { at: child, parent: ghost })
        );
    }

    #[test]
    fn test_missing_target_and_cycle() {
        let mut store = GraphStore::new();
        let ghost = NodeId::new();
        assert_eq!(build_thread(&store, ghost), Err(ThreadError::NodeNotFound(ghost)));

        let a = store.create_node(None, vec![]).unwrap();
        let b = store.create_node(Some(a), vec![]).unwrap();
        store.node_mut(a).unwrap().parent = Some(b);
        assert!(matches!(build_thread(&store, b), Err(ThreadError::Cycle { .. })));
    }

    #[test]
    fn test_cycle_through_excluded_ancestors() {
        let mut store = GraphStore::new();
        let a = store.create_node(None, qa("Q0", "A0")).unwrap();
        let leaf = store.create_node(Some(a), qa("Q1", "A1")).unwrap();
        // Corrupt: leaf excludes its parent, which is its own parent.
        store.node_mut(leaf).unwrap().branched_from = Some(a);
        store.node_mut(a).unwrap().parent = Some(a);

        assert_eq!(build_thread(&store, leaf), Err(ThreadError::Cycle { at: leaf }));
    }

    #[test]
    fn test_deep_chain_with_late_fork() {
        let mut store = GraphStore::new();
        let root = store.create_node(None, qa("Q0", "A0")).unwrap();
        let mut tail = root;
        for i in 1..=700 {
            tail = store.create_node(Some(tail), qa(&format!("Q{i}"), "A")).unwrap();
        }
        let fork = revise_prompt(&mut store, tail, "Q700 revised");
        assert!(store.validate().is_ok());

        let thread = build_thread(&store, fork).unwrap();
        assert_eq!(thread.root, root);
        assert_eq!(thread.path.len(), 701);
        assert_eq!(thread.excluded, vec![tail]);
        assert_eq!(thread.messages.len(), 1402);
        assert_eq!(thread.messages[1400].content, "Q700 revised");
    }

    #[test]
    fn test_completion_messages_and_transcript() {
        let mut store = GraphStore::new();
        let root = store
            .create_node(None, vec![Block::markdown("system note"), Block::prompt("hi")])
            .unwrap();
        store.append_block(root, Block::response("hello")).unwrap();
        store.append_block(root, Block::response("")).unwrap();

        let thread = build_thread(&store, root).unwrap();
        let chat = thread.completion_messages();
        assert_eq!(
            chat,
            vec![
                ChatMessage { role: ChatRole::User, content: "hi".into() },
                ChatMessage { role: ChatRole::Assistant, content: "hello".into() },
            ]
        );
        assert!(thread.transcript().starts_with("[markdown] system note\n\n[prompt] hi"));
    }
}
