//! Engine configuration for the CLI.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use loom_tree::EngineConfig;

/// Default config file path (~/.config/loom/loom.ron).
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("loom").join("loom.ron"))
}

/// Load configuration.
///
/// An explicit path must exist and parse. The default path is optional: a
/// missing or broken file falls back to defaults with a log line.
pub fn load_config(explicit: Option<&Path>) -> Result<EngineConfig> {
    if let Some(path) = explicit {
        return load_config_from_file(path);
    }

    let Some(path) = config_file_path() else {
        tracing::debug!("no config directory available, using default config");
        return Ok(EngineConfig::default());
    };
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(EngineConfig::default());
    }

    match load_config_from_file(&path) {
        Ok(config) => Ok(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), "failed to load config: {e:#}");
            Ok(EngineConfig::default())
        }
    }
}

fn load_config_from_file(path: &Path) -> Result<EngineConfig> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = EngineConfig::from_ron_str(&source)
        .with_context(|| format!("invalid config {}", path.display()))?;
    tracing::info!(path = %path.display(), "loaded config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loom.ron");
        std::fs::write(&path, "(layout: (inter_tree_gap: 300.0))").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.layout.inter_tree_gap, 300.0);
        assert_eq!(config.history, EngineConfig::default().history);
    }

    #[test]
    fn test_explicit_path_must_exist_and_parse() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.ron");
        assert!(load_config(Some(&missing)).is_err());

        let broken = dir.path().join("broken.ron");
        std::fs::write(&broken, "(history: (evict_fraction: -1.0))").unwrap();
        let err = load_config(Some(&broken)).unwrap_err();
        assert!(format!("{err:#}").contains("evict_fraction"));
    }
}
