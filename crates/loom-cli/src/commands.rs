//! Subcommand implementations. Each writes human-readable output to `out`.

use std::io::Write;

use anyhow::{Context, Result};
use loom_tree::{
    Block, BlockKind, ConversationTree, EditOutcome, EngineConfig, NodeId, build_thread,
};

use crate::resolve::resolve_node;

/// Build a small forest with two roots and a few forks.
pub fn demo(config: EngineConfig) -> Result<ConversationTree> {
    let mut tree = ConversationTree::new(config);

    let root = tree.create_node(
        None,
        vec![
            Block::markdown("Pairing session: parser refactor"),
            Block::prompt("How should I structure a recursive descent parser?"),
            Block::response("Start with one function per grammar rule."),
        ],
    )?;
    let follow = tree.create_node(
        Some(root),
        vec![
            Block::prompt("How do I handle operator precedence?"),
            Block::response("Use precedence climbing."),
        ],
    )?;
    tree.create_node(
        Some(follow),
        vec![
            Block::prompt("Show precedence climbing for + and *."),
            Block::response("fn expr(min_bp: u8) -> Expr { ... }"),
        ],
    )?;

    // Revise the answered follow-up: forks beside the original.
    let prompt = first_block(&tree, follow, BlockKind::Prompt)?;
    let fork = tree
        .edit_block(follow, prompt, "How do I handle operator precedence without recursion?")?
        .node(follow);
    tree.create_node(
        Some(fork),
        vec![
            Block::prompt("Is the shunting-yard algorithm a fit?"),
            Block::response(""),
        ],
    )?;

    // Regenerate the first response: forks the root.
    let response = first_block(&tree, root, BlockKind::Response)?;
    tree.edit_block(root, response, "Write a grammar first, then one function per rule.")?;

    tree.create_node(None, vec![Block::prompt("Unrelated: name ideas for a CLI?")])?;

    tree.auto_layout();
    Ok(tree)
}

fn first_block(tree: &ConversationTree, node: NodeId, kind: BlockKind) -> Result<loom_tree::BlockId> {
    tree.get(node)
        .and_then(|n| n.first_of(kind))
        .map(|b| b.id)
        .with_context(|| format!("node {} has no {kind} block", node.short()))
}

/// Print the forest as an indented outline. Forks are marked with `⑂`.
pub fn show(tree: &ConversationTree, out: &mut impl Write) -> Result<()> {
    let store = tree.store();
    let mut stack: Vec<(NodeId, usize)> = store
        .iter()
        .filter(|n| n.is_root() && !n.is_fork())
        .map(|n| (n.id, 0))
        .collect();
    stack.reverse();

    let mut seen = std::collections::HashSet::new();
    while let Some((id, indent)) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        let Some(node) = store.get(id) else { continue };
        let marker = if node.is_fork() { "⑂ " } else { "" };
        writeln!(
            out,
            "{:indent$}{marker}{} {}",
            "",
            id.short(),
            node.label(),
            indent = indent * 2
        )?;

        // Forks print beside their origin, children one level in.
        for child in node.children.iter().rev() {
            stack.push((*child, indent + 1));
        }
        for fork in node.branches.iter().rev() {
            stack.push((*fork, indent));
        }
    }

    let missed = store.len() - seen.len();
    if missed > 0 {
        writeln!(out, "({missed} node(s) unreachable from any root)")?;
    }
    Ok(())
}

/// Print the thread ending at `node`, as a transcript or completion JSON.
pub fn thread(tree: &ConversationTree, node: &str, chat: bool, out: &mut impl Write) -> Result<()> {
    let target = resolve_node(tree.store(), node)?;
    let thread = build_thread(tree.store(), target)?;
    if chat {
        let json = serde_json::to_string_pretty(&thread.completion_messages())?;
        writeln!(out, "{json}")?;
    } else {
        writeln!(out, "{}", thread.transcript())?;
        if !thread.excluded.is_empty() {
            let excluded: Vec<String> = thread.excluded.iter().map(|id| id.short()).collect();
            writeln!(out, "\n(excluded branches: {})", excluded.join(", "))?;
        }
    }
    Ok(())
}

/// Print computed positions, one node per line, sorted top-to-bottom then
/// left-to-right.
pub fn layout(tree: &ConversationTree, out: &mut impl Write) -> Result<()> {
    let positions = tree.layout();
    let mut rows: Vec<_> = positions.into_iter().collect();
    rows.sort_by(|(_, a), (_, b)| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));
    for (id, pos) in rows {
        let label = tree.get(id).map(|n| n.label()).unwrap_or_default();
        writeln!(out, "{} {:>9.1} {:>9.1}  {label}", id.short(), pos.x, pos.y)?;
    }
    Ok(())
}

/// Validate and summarise. Fails if any invariant is broken.
pub fn check(tree: &ConversationTree, out: &mut impl Write) -> Result<()> {
    let store = tree.store();
    store.validate().context("forest is inconsistent")?;
    let forks = store.iter().filter(|n| n.is_fork()).count();
    let blocks: usize = store.iter().map(|n| n.blocks.len()).sum();
    let depth = store.iter().map(|n| n.depth).max().unwrap_or(0);
    writeln!(
        out,
        "ok: {} node(s), {} root(s), {forks} fork(s), {blocks} block(s), max depth {depth}",
        store.len(),
        store.roots().len(),
    )?;
    Ok(())
}

/// Edit the block at `order` in `node`, forking if the policy requires.
pub fn edit(
    tree: &mut ConversationTree,
    node: &str,
    order: u32,
    content: &str,
    out: &mut impl Write,
) -> Result<EditOutcome> {
    let id = resolve_node(tree.store(), node)?;
    let block = tree
        .get(id)
        .and_then(|n| n.block_at_order(order))
        .map(|b| b.id)
        .with_context(|| format!("node {} has no block at order {order}", id.short()))?;

    let outcome = tree.edit_block(id, block, content)?;
    match &outcome {
        EditOutcome::Unchanged => writeln!(out, "unchanged")?,
        EditOutcome::InPlace => writeln!(out, "edited {} in place", id.short())?,
        EditOutcome::Forked(fork) => writeln!(
            out,
            "forked {} -> {} ({})",
            id.short(),
            fork.new_node_id.short(),
            fork.metadata.reason
        )?,
    }
    Ok(outcome)
}
