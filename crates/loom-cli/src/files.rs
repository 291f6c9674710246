//! Snapshot files on disk.
//!
//! `.json` files hold pretty-printed JSON; anything else is postcard.

use std::path::Path;

use anyhow::{Context, Result};
use loom_tree::{ConversationTree, EngineConfig, ForestSnapshot};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Json,
    Postcard,
}

impl Format {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Postcard,
        }
    }
}

pub fn read_tree(path: &Path, config: EngineConfig) -> Result<ConversationTree> {
    let snapshot = match Format::for_path(path) {
        Format::Json => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            ForestSnapshot::from_json(&text)
        }
        Format::Postcard => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            ForestSnapshot::from_bytes(&bytes)
        }
    }
    .with_context(|| format!("failed to decode {}", path.display()))?;

    let tree = ConversationTree::import(snapshot, config)
        .with_context(|| format!("invalid forest in {}", path.display()))?;
    tracing::debug!(path = %path.display(), nodes = tree.len(), "read snapshot");
    Ok(tree)
}

pub fn write_tree(path: &Path, tree: &ConversationTree) -> Result<()> {
    let snapshot = tree.export();
    let bytes = match Format::for_path(path) {
        Format::Json => snapshot.to_json_pretty()?.into_bytes(),
        Format::Postcard => snapshot.to_bytes()?,
    };
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::debug!(path = %path.display(), nodes = tree.len(), "wrote snapshot");
    Ok(())
}
