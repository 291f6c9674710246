//! Tidy-tree layout for the whole forest.
//!
//! ```text
//!   ┌──R──┐          ┌──R'─┐        inter_tree_gap between root trees
//!   │     │          │     │
//!   A ┄ A'  B        C                forks sit right of their origin
//!   │                                 in the same slot list
//!   D
//! ```
//!
//! Three passes over an explicit layout tree:
//!
//! 1. **Width** (post-order): a subtree is as wide as its node's footprint or
//!    the sum of its child subtrees plus `horizontal_spacing` between them,
//!    whichever is larger.
//! 2. **Position** (pre-order): roots are placed left to right with a running
//!    offset; each child is centred in its own slice of the parent's span.
//! 3. **Vertical repack**: each depth band starts below the tallest node of
//!    the band above it, plus `inter_level_gap`.
//!
//! Forks do not appear in their parent's `children`, so layout children are
//! `children` with each child followed by its transitive forks. Positions are
//! top-centre anchors.

use std::collections::{HashMap, HashSet};

use loom_types::{BlockKind, Footprint, NodeId, Position};

use crate::config::LayoutConfig;
use crate::node::Node;
use crate::store::GraphStore;

// ============================================================================
// FOOTPRINTS
// ============================================================================

/// Source of rendered node sizes.
pub trait Footprints {
    fn footprint(&self, node: &Node) -> Footprint;
}

impl<F> Footprints for F
where
    F: Fn(&Node) -> Footprint,
{
    fn footprint(&self, node: &Node) -> Footprint {
        self(node)
    }
}

/// Estimates node size from text: fixed width, wrapped line count for height.
#[derive(Clone, Copy, Debug, Default)]
pub struct EstimatedFootprint {
    config: LayoutConfig,
}

impl EstimatedFootprint {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    /// Wrapped line count for one block. Empty blocks still take a line.
    fn lines(&self, content: &str) -> usize {
        let per_line = self.config.chars_per_line.max(1.0);
        let wrapped: usize = content
            .lines()
            .map(|line| ((line.chars().count() as f32) / per_line).ceil().max(1.0) as usize)
            .sum();
        wrapped.max(1)
    }
}

impl Footprints for EstimatedFootprint {
    fn footprint(&self, node: &Node) -> Footprint {
        let lines: usize = node.blocks.iter().map(|b| self.lines(&b.content)).sum();
        // Prompt/response separator rule
        let separators = node
            .blocks
            .iter()
            .filter(|b| b.kind != BlockKind::Markdown)
            .count()
            .saturating_sub(1);
        let height = 2.0 * self.config.padding
            + (lines + separators) as f32 * self.config.line_height;
        Footprint::new(self.config.node_width, height.max(self.config.min_height))
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Computes positions for every node in a [`GraphStore`].
#[derive(Clone, Copy, Debug, Default)]
pub struct TreeLayoutEngine {
    config: LayoutConfig,
}

/// Layout tree derived from the store.
struct Plan {
    tops: Vec<NodeId>,
    kids: HashMap<NodeId, Vec<NodeId>>,
    depth: HashMap<NodeId, usize>,
    /// Every placed node, parents before children.
    preorder: Vec<NodeId>,
}

impl TreeLayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Layout with [`EstimatedFootprint`] sizing.
    pub fn layout(&self, store: &GraphStore) -> HashMap<NodeId, Position> {
        self.layout_with(store, &EstimatedFootprint::new(self.config))
    }

    pub fn layout_with<F>(&self, store: &GraphStore, footprints: &F) -> HashMap<NodeId, Position>
    where
        F: Footprints + ?Sized,
    {
        if store.is_empty() {
            return HashMap::new();
        }
        let cfg = &self.config;
        let sizes: HashMap<NodeId, Footprint> = store
            .iter()
            .map(|n| (n.id, footprints.footprint(n)))
            .collect();
        let plan = plan(store);

        // Pass 1: subtree widths, children before parents.
        let mut width: HashMap<NodeId, f32> = HashMap::with_capacity(plan.preorder.len());
        for id in plan.preorder.iter().rev() {
            let own = sizes.get(id).map(|f| f.width).unwrap_or(0.0);
            let kids = plan.kids.get(id).map(Vec::as_slice).unwrap_or(&[]);
            let span = if kids.is_empty() {
                own
            } else {
                let sum: f32 = kids.iter().map(|k| width.get(k).copied().unwrap_or(0.0)).sum();
                sum + (kids.len() - 1) as f32 * cfg.horizontal_spacing
            };
            width.insert(*id, own.max(span));
        }

        // Pass 2: centres, parents before children.
        let mut positions: HashMap<NodeId, Position> = HashMap::with_capacity(width.len());
        let mut offset = 0.0_f32;
        let mut stack: Vec<(NodeId, f32)> = Vec::new();
        for top in &plan.tops {
            let w = width.get(top).copied().unwrap_or(0.0);
            stack.push((*top, offset + w / 2.0));
            offset += w + cfg.inter_tree_gap;

            while let Some((id, center)) = stack.pop() {
                let depth = plan.depth.get(&id).copied().unwrap_or(0);
                positions.insert(id, Position::new(center, depth as f32 * cfg.vertical_spacing));

                let Some(kids) = plan.kids.get(&id) else {
                    continue;
                };
                let total: f32 = kids.iter().map(|k| width.get(k).copied().unwrap_or(0.0)).sum::<f32>()
                    + kids.len().saturating_sub(1) as f32 * cfg.horizontal_spacing;
                let mut left = center - total / 2.0;
                for kid in kids {
                    let w = width.get(kid).copied().unwrap_or(0.0);
                    stack.push((*kid, left + w / 2.0));
                    left += w + cfg.horizontal_spacing;
                }
            }
        }

        // Pass 3: repack depth bands by their tallest node.
        let max_depth = plan.depth.values().copied().max().unwrap_or(0);
        let mut band = vec![0.0_f32; max_depth + 1];
        for (id, depth) in &plan.depth {
            let h = sizes.get(id).map(|f| f.height).unwrap_or(0.0);
            band[*depth] = band[*depth].max(h);
        }
        let mut band_y = Vec::with_capacity(band.len());
        let mut y = 0.0_f32;
        for height in &band {
            band_y.push(y);
            y += (height + cfg.inter_level_gap).max(cfg.vertical_spacing);
        }
        for (id, pos) in positions.iter_mut() {
            let depth = plan.depth.get(id).copied().unwrap_or(0);
            pos.y = band_y[depth];
        }

        tracing::debug!(
            nodes = positions.len(),
            trees = plan.tops.len(),
            width = offset - cfg.inter_tree_gap,
            "laid out forest"
        );
        positions
    }
}

/// Layout with default configuration and [`EstimatedFootprint`] sizing.
pub fn layout(store: &GraphStore) -> HashMap<NodeId, Position> {
    TreeLayoutEngine::default().layout(store)
}

/// Layout with explicit configuration and footprint source.
pub fn layout_with<F>(
    store: &GraphStore,
    config: LayoutConfig,
    footprints: &F,
) -> HashMap<NodeId, Position>
where
    F: Footprints + ?Sized,
{
    TreeLayoutEngine::new(config).layout_with(store, footprints)
}

/// Build the layout tree: which nodes sit under which, and in what order.
fn plan(store: &GraphStore) -> Plan {
    let mut claimed: HashSet<NodeId> = HashSet::with_capacity(store.len());
    let mut plan = Plan {
        tops: Vec::new(),
        kids: HashMap::new(),
        depth: HashMap::new(),
        preorder: Vec::with_capacity(store.len()),
    };

    let mut tops = Vec::new();
    for node in store.iter().filter(|n| n.parent.is_none() && !n.is_fork()) {
        slot_with_forks(store, node.id, &mut claimed, &mut tops);
    }
    let mut leftovers = 0;
    let mut next = 0;
    loop {
        // Walk any tops gathered so far.
        while next < tops.len() {
            let top = tops[next];
            next += 1;
            plan.tops.push(top);
            descend(store, top, &mut claimed, &mut plan);
        }
        // Anything still unclaimed has no route from a root.
        let Some(stray) = store.iter().find(|n| !claimed.contains(&n.id)) else {
            break;
        };
        leftovers += 1;
        slot_with_forks(store, stray.id, &mut claimed, &mut tops);
    }
    if leftovers > 0 {
        tracing::warn!(leftovers, "nodes unreachable from any root laid out as extra trees");
    }
    plan
}

/// Push `id` and then its forks, transitively, skipping anything claimed.
fn slot_with_forks(
    store: &GraphStore,
    id: NodeId,
    claimed: &mut HashSet<NodeId>,
    out: &mut Vec<NodeId>,
) {
    let mut stack = vec![id];
    while let Some(current) = stack.pop() {
        if !store.contains(current) || !claimed.insert(current) {
            continue;
        }
        out.push(current);
        if let Some(node) = store.get(current) {
            stack.extend(node.branches.iter().rev());
        }
    }
}

/// Pre-order walk from `top`, filling kids/depth/preorder.
fn descend(store: &GraphStore, top: NodeId, claimed: &mut HashSet<NodeId>, plan: &mut Plan) {
    let mut stack = vec![(top, 0usize)];
    while let Some((id, depth)) = stack.pop() {
        plan.depth.insert(id, depth);
        plan.preorder.push(id);

        let mut kids = Vec::new();
        if let Some(node) = store.get(id) {
            for child in &node.children {
                slot_with_forks(store, *child, claimed, &mut kids);
            }
        }
        for kid in kids.iter().rev() {
            stack.push((*kid, depth + 1));
        }
        if !kids.is_empty() {
            plan.kids.insert(id, kids);
        }
    }
}
