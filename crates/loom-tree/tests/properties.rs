//! Randomised structural properties of the conversation tree.
//!
//! Each test drives a seeded sequence of creates, appends, edits, and
//! deletes, then checks the forest invariants. Seeds are fixed so failures
//! reproduce.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use loom_tree::{
    Block, BlockKind, ConversationTree, EditOutcome, Footprints, ForestSnapshot, GraphStore,
    LayoutConfig, NodeId, Position, TreeError, TreeLayoutEngine,
};

const SEEDS: [u64; 6] = [1, 7, 42, 1337, 0xdead_beef, 2024];

fn random_text(rng: &mut StdRng) -> String {
    let words = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta"];
    let n = rng.gen_range(1..12);
    (0..n)
        .map(|_| *words.choose(rng).unwrap_or(&"x"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn pick(rng: &mut StdRng, tree: &ConversationTree) -> Option<NodeId> {
    let ids: Vec<NodeId> = tree.store().ids().collect();
    ids.choose(rng).copied()
}

/// Apply `steps` random operations. Failed deletes are expected and ignored.
fn churn(rng: &mut StdRng, tree: &mut ConversationTree, steps: usize) {
    for _ in 0..steps {
        match rng.gen_range(0..10) {
            0..=2 => {
                let parent = if tree.is_empty() || rng.gen_bool(0.1) {
                    None
                } else {
                    pick(rng, tree)
                };
                let blocks = vec![Block::prompt(random_text(rng)), Block::response("")];
                tree.create_node(parent, blocks).unwrap();
            }
            3 => {
                if let Some(node) = pick(rng, tree) {
                    let kind = if rng.gen_bool(0.5) { BlockKind::Markdown } else { BlockKind::Response };
                    tree.append_block(node, Block::new(kind, random_text(rng))).unwrap();
                }
            }
            4..=7 => {
                let Some(node) = pick(rng, tree) else { continue };
                let blocks = tree.get(node).unwrap().blocks.clone();
                let Some(block) = blocks.choose(rng) else { continue };
                tree.edit_block(node, block.id, random_text(rng)).unwrap();
            }
            _ => {
                if let Some(node) = pick(rng, tree) {
                    let before = tree.store().clone();
                    match tree.delete_node(node) {
                        Ok(()) => assert!(tree.get(node).is_none()),
                        Err(err) => {
                            assert!(matches!(err, TreeError::Structure(_)));
                            assert_eq!(tree.store(), &before);
                        }
                    }
                }
            }
        }
    }
}

fn grown(seed: u64, steps: usize) -> ConversationTree {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut tree = ConversationTree::default();
    churn(&mut rng, &mut tree, steps);
    tree
}

#[test]
fn invariants_hold_after_random_operations() {
    for seed in SEEDS {
        let tree = grown(seed, 300);
        assert!(!tree.is_empty(), "seed {seed}");
        if let Err(violation) = tree.store().validate() {
            panic!("seed {seed}: {violation}");
        }
    }
}

#[test]
fn parent_chains_never_revisit() {
    for seed in SEEDS {
        let tree = grown(seed, 300);
        for node in tree.store().iter() {
            let ancestors = tree.store().ancestors(node.id);
            assert!(!ancestors.contains(&node.id), "seed {seed}: cycle at {}", node.id);
            assert_eq!(ancestors.len(), node.depth, "seed {seed}");
        }
    }
}

#[test]
fn forks_are_siblings_of_their_origin() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut tree = ConversationTree::default();
        churn(&mut rng, &mut tree, 150);

        // Answer every node, then revise every prompt once.
        let ids: Vec<NodeId> = tree.store().ids().collect();
        for id in &ids {
            tree.append_block(*id, Block::response("answer")).unwrap();
        }
        for id in ids {
            let Some(prompt) = tree.get(id).unwrap().first_of(BlockKind::Prompt).map(|b| b.id)
            else {
                continue;
            };
            let outcome = tree.edit_block(id, prompt, "revised").unwrap();
            let EditOutcome::Forked(fork) = outcome else {
                // Unchanged when an earlier random edit already said "revised".
                continue;
            };
            let origin = tree.get(id).unwrap();
            let copy = tree.get(fork.new_node_id).unwrap();
            assert_eq!(copy.parent, origin.parent);
            assert_eq!(copy.depth, origin.depth);
            assert_eq!(copy.branched_from, Some(id));
            assert!(origin.branches.contains(&fork.new_node_id));
        }
        assert!(tree.store().validate().is_ok(), "seed {seed}");
    }
}

#[test]
fn threads_exclude_rival_branches() {
    for seed in SEEDS {
        let tree = grown(seed, 400);
        for node in tree.store().iter().filter(|n| !n.branches.is_empty()) {
            let thread = tree.thread(node.id).unwrap();
            for fork in &node.branches {
                assert!(!thread.contains(*fork), "seed {seed}");
                let forked = tree.thread(*fork).unwrap();
                assert!(!forked.contains(node.id), "seed {seed}");
                for rival in node.branches.iter().filter(|b| *b != fork) {
                    assert!(!forked.contains(*rival), "seed {seed}");
                }
            }
        }
    }
}

#[test]
fn threads_follow_parent_links_to_a_root() {
    for seed in SEEDS {
        let tree = grown(seed, 300);
        for node in tree.store().iter() {
            let thread = tree.thread(node.id).unwrap();
            assert_eq!(thread.target, node.id);
            assert_eq!(*thread.path.last().unwrap(), node.id);
            assert!(tree.get(thread.root).unwrap().is_root());
            for pair in thread.path.windows(2) {
                assert_eq!(tree.get(pair[1]).unwrap().parent, Some(pair[0]));
            }
        }
    }
}

#[test]
fn layout_never_overlaps_within_a_depth() {
    let config = LayoutConfig::default();
    let engine = TreeLayoutEngine::new(config);
    let sizes = |n: &loom_tree::Node| {
        // Vary widths so the width pass matters.
        let w = 100.0 + (n.blocks.len() as f32) * 35.0;
        loom_tree::Footprint::new(w, 60.0)
    };

    for seed in SEEDS {
        let tree = grown(seed, 300);
        let positions = engine.layout_with(tree.store(), &sizes);
        assert_eq!(positions.len(), tree.len(), "seed {seed}");

        let mut by_depth: HashMap<usize, Vec<(f32, f32)>> = HashMap::new();
        for node in tree.store().iter() {
            let pos: Position = positions[&node.id];
            let half = sizes.footprint(node).width / 2.0;
            by_depth.entry(node.depth).or_default().push((pos.x - half, pos.x + half));
        }
        for (depth, mut spans) in by_depth {
            spans.sort_by(|a, b| a.0.total_cmp(&b.0));
            for pair in spans.windows(2) {
                assert!(
                    pair[0].1 <= pair[1].0 + 1e-3,
                    "seed {seed}: overlap at depth {depth}: {:?}",
                    pair
                );
            }
        }
    }
}

#[test]
fn layout_bands_do_not_overlap_vertically() {
    for seed in SEEDS {
        let tree = grown(seed, 200);
        let positions = tree.layout();
        for node in tree.store().iter() {
            if let Some(parent) = node.parent {
                assert!(positions[&parent].y < positions[&node.id].y, "seed {seed}");
            }
        }
    }
}

#[test]
fn deep_conversations_thread_and_lay_out() {
    let mut tree = ConversationTree::default();
    let root = tree.create_node(None, vec![Block::prompt("Q0"), Block::response("A0")]).unwrap();
    let mut tail = root;
    for i in 1..=1500 {
        tail = tree
            .create_node(Some(tail), vec![Block::prompt(format!("Q{i}")), Block::response("A")])
            .unwrap();
    }
    let prompt = tree.get(tail).unwrap().blocks[0].id;
    let fork = tree.edit_block(tail, prompt, "Q1500 revised").unwrap().node(tail);

    let thread = tree.thread(fork).unwrap();
    assert_eq!(thread.root, root);
    assert_eq!(thread.path.len(), 1501);
    assert!(!thread.contains(tail));
    assert_eq!(tree.store().ancestors(fork).len(), 1500);

    let positions = tree.layout();
    assert_eq!(positions.len(), tree.len());
    for pair in thread.path.windows(2) {
        assert!(positions[&pair[0]].y < positions[&pair[1]].y);
    }
    assert_eq!(positions[&fork].y, positions[&tail].y);
    assert_ne!(positions[&fork].x, positions[&tail].x);

    let restored = GraphStore::import(tree.export()).unwrap();
    assert_eq!(&restored, tree.store());
}

#[test]
fn reused_block_ids_never_reach_a_snapshot() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut tree = ConversationTree::default();
        churn(&mut rng, &mut tree, 150);

        let mut held: Vec<Block> = tree.store().iter().flat_map(|n| n.blocks.clone()).collect();
        held.shuffle(&mut rng);
        for block in held.into_iter().take(20) {
            let before = tree.store().clone();
            let parent = pick(&mut rng, &tree);
            let err = tree.create_node(parent, vec![block.clone()]).unwrap_err();
            assert_eq!(err, TreeError::DuplicateBlock(block.id), "seed {seed}");
            if let Some(node) = pick(&mut rng, &tree) {
                let err = tree.append_block(node, block.clone()).unwrap_err();
                assert_eq!(err, TreeError::DuplicateBlock(block.id), "seed {seed}");
            }
            assert_eq!(tree.store(), &before, "seed {seed}");
        }

        let restored = GraphStore::import(tree.export()).unwrap();
        assert_eq!(&restored, tree.store(), "seed {seed}");
    }
}

#[test]
fn snapshots_round_trip() {
    for seed in SEEDS {
        let mut tree = grown(seed, 250);
        tree.auto_layout();

        let snapshot = tree.export();
        let json = snapshot.to_json().unwrap();
        let from_json = GraphStore::import(ForestSnapshot::from_json(&json).unwrap()).unwrap();
        assert_eq!(&from_json, tree.store(), "seed {seed}");

        let bytes = snapshot.to_bytes().unwrap();
        let from_bytes = GraphStore::import(ForestSnapshot::from_bytes(&bytes).unwrap()).unwrap();
        assert_eq!(&from_bytes, tree.store(), "seed {seed}");
    }
}

#[test]
fn delete_guard_leaves_store_unchanged() {
    for seed in SEEDS {
        let mut tree = grown(seed, 200);
        let parents: Vec<NodeId> = tree
            .store()
            .iter()
            .filter(|n| !n.children.is_empty())
            .map(|n| n.id)
            .collect();
        for id in parents {
            let before = tree.store().clone();
            let err = tree.delete_node(id).unwrap_err();
            assert!(err.is_structure_violation(), "seed {seed}");
            assert_eq!(tree.store(), &before);
        }
    }
}

#[test]
fn history_stays_bounded() {
    let mut rng = StdRng::seed_from_u64(99);
    let config = loom_tree::EngineConfig {
        history: loom_tree::HistoryConfig {
            capacity: 20,
            evict_fraction: 0.2,
        },
        ..Default::default()
    };
    let mut tree = ConversationTree::new(config);
    let root = tree
        .create_node(None, vec![Block::prompt("Q"), Block::response("A")])
        .unwrap();
    let prompt = tree.get(root).unwrap().blocks[0].id;

    for i in 0..100 {
        let outcome = tree.edit_block(root, prompt, format!("Q {i} {}", rng.gen_range(0..1000)));
        assert!(outcome.unwrap().is_fork());
        assert!(tree.history().len() < 20);
    }
    assert_eq!(tree.get(root).unwrap().branches.len(), 100);
    let latest = tree.branch_history(root);
    assert!(!latest.is_empty());
    assert!(latest.last().unwrap().new_content.starts_with("Q 99 "));
}
