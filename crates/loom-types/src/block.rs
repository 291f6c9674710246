//! Block types.
//!
//! A block is the content unit inside a node. `BlockKind` is deliberately
//! small — three variants covering what a block *is*:
//!
//! - `Prompt`: what the user asked
//! - `Response`: what came back from the model
//! - `Markdown`: free-form notes pinned to a turn (never part of the chat)

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::ids::BlockId;

/// What a block *is* (content type).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum BlockKind {
    /// User-authored question or instruction.
    #[strum(serialize = "prompt", serialize = "user")]
    Prompt,
    /// Model output answering the prompt.
    #[strum(serialize = "response", serialize = "assistant", serialize = "model")]
    Response,
    /// Annotation. Edited in place, never forks history.
    #[strum(serialize = "markdown", serialize = "md", serialize = "note")]
    Markdown,
}

impl BlockKind {
    /// Parse from string (case-insensitive).
    ///
    /// Supports aliases: "user" -> Prompt, "assistant"/"model" -> Response.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Prompt => "prompt",
            BlockKind::Response => "response",
            BlockKind::Markdown => "markdown",
        }
    }

    /// Whether edits to this kind of block may fork history.
    pub fn is_conversational(&self) -> bool {
        matches!(self, BlockKind::Prompt | BlockKind::Response)
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A content unit inside a node.
///
/// `order` is assigned by the owning store on insertion and never changes
/// afterwards; values are unique within a node and increase with each append.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Stable for the block's lifetime.
    pub id: BlockId,
    pub kind: BlockKind,
    pub content: String,
    /// Position within the owning node's block list.
    pub order: u32,
}

impl Block {
    /// Create a detached block. The store assigns `order` when it is attached.
    pub fn new(kind: BlockKind, content: impl Into<String>) -> Self {
        Self {
            id: BlockId::new(),
            kind,
            content: content.into(),
            order: 0,
        }
    }

    pub fn prompt(content: impl Into<String>) -> Self {
        Self::new(BlockKind::Prompt, content)
    }

    pub fn response(content: impl Into<String>) -> Self {
        Self::new(BlockKind::Response, content)
    }

    pub fn markdown(content: impl Into<String>) -> Self {
        Self::new(BlockKind::Markdown, content)
    }

    /// Deep copy with a fresh id; kind, order, and content are preserved.
    pub fn deep_clone(&self) -> Self {
        Self {
            id: BlockId::new(),
            kind: self.kind,
            content: self.content.clone(),
            order: self.order,
        }
    }

    /// True when the block has never received content (or was cleared).
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_aliases() {
        assert_eq!(BlockKind::from_str("prompt"), Some(BlockKind::Prompt));
        assert_eq!(BlockKind::from_str("USER"), Some(BlockKind::Prompt));
        assert_eq!(BlockKind::from_str("assistant"), Some(BlockKind::Response));
        assert_eq!(BlockKind::from_str("md"), Some(BlockKind::Markdown));
        assert_eq!(BlockKind::from_str("tool"), None);
    }

    #[test]
    fn test_kind_serde_lowercase() {
        let json = serde_json::to_string(&BlockKind::Response).unwrap();
        assert_eq!(json, "\"response\"");
    }

    #[test]
    fn test_only_prompt_and_response_are_conversational() {
        assert!(BlockKind::Prompt.is_conversational());
        assert!(BlockKind::Response.is_conversational());
        assert!(!BlockKind::Markdown.is_conversational());
    }

    #[test]
    fn test_deep_clone_gets_fresh_id() {
        let mut block = Block::response("A1");
        block.order = 3;
        let copy = block.deep_clone();
        assert_ne!(copy.id, block.id);
        assert_eq!(copy.kind, block.kind);
        assert_eq!(copy.order, 3);
        assert_eq!(copy.content, "A1");
    }

    #[test]
    fn test_block_postcard_roundtrip() {
        let block = Block::markdown("# notes");
        let bytes = postcard::to_stdvec(&block).unwrap();
        let parsed: Block = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(block, parsed);
    }
}
