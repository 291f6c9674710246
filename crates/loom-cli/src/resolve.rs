//! Resolve user-typed node references.

use loom_tree::{GraphStore, NodeId};

/// Error from node reference resolution.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("no node matches '{0}'")]
    NoMatch(String),
    #[error("ambiguous node '{query}': matches {candidates:?}")]
    Ambiguous { query: String, candidates: Vec<String> },
}

/// Resolve `query` against the nodes of `store`.
///
/// Resolution order:
/// 1. Full UUID
/// 2. Unique hex prefix of the id
/// 3. Unique prefix of the node label (first prompt line)
pub fn resolve_node(store: &GraphStore, query: &str) -> Result<NodeId, ResolveError> {
    if let Ok(id) = NodeId::parse(query)
        && store.contains(id)
    {
        return Ok(id);
    }

    let hex = query.replace('-', "").to_ascii_lowercase();
    if !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        let hex_matches: Vec<NodeId> = store.ids().filter(|id| id.matches_hex_prefix(&hex)).collect();
        match hex_matches.len() {
            0 => {}
            1 => return Ok(hex_matches[0]),
            _ => {
                return Err(ResolveError::Ambiguous {
                    query: query.to_string(),
                    candidates: hex_matches.iter().map(|id| id.short()).collect(),
                });
            }
        }
    }

    let label_matches: Vec<(NodeId, String)> = store
        .iter()
        .map(|n| (n.id, n.label()))
        .filter(|(_, label)| label.starts_with(query))
        .collect();
    match label_matches.len() {
        0 => Err(ResolveError::NoMatch(query.to_string())),
        1 => Ok(label_matches[0].0),
        _ => Err(ResolveError::Ambiguous {
            query: query.to_string(),
            candidates: label_matches
                .iter()
                .map(|(id, label)| format!("{} ({label})", id.short()))
                .collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_tree::Block;

    #[test]
    fn test_resolve_by_id_prefix_and_label() {
        let mut store = GraphStore::new();
        let a = store.create_node(None, vec![Block::prompt("What is a monad?")]).unwrap();
        let b = store.create_node(Some(a), vec![Block::prompt("Show me one")]).unwrap();

        assert_eq!(resolve_node(&store, &a.to_string()), Ok(a));
        assert_eq!(resolve_node(&store, &b.to_hex()), Ok(b));
        assert_eq!(resolve_node(&store, "Show"), Ok(b));
        assert_eq!(resolve_node(&store, "What is"), Ok(a));
    }

    #[test]
    fn test_resolve_errors() {
        let mut store = GraphStore::new();
        store.create_node(None, vec![Block::prompt("same start one")]).unwrap();
        store.create_node(None, vec![Block::prompt("same start two")]).unwrap();

        assert!(matches!(
            resolve_node(&store, "same"),
            Err(ResolveError::Ambiguous { .. })
        ));
        assert_eq!(
            resolve_node(&store, "nothing here"),
            Err(ResolveError::NoMatch("nothing here".into()))
        );
    }
}
