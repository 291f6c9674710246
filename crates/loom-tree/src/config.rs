//! Engine configuration, loaded from RON.
//!
//! Every field has a serde default, so a config file only needs the values
//! it overrides:
//!
//! ```ron
//! (
//!     layout: (horizontal_spacing: 60.0),
//!     history: (capacity: 500),
//! )
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ============================================================================
// LAYOUT
// ============================================================================

/// Spacing and footprint-estimation parameters for the tree layout.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Gap between adjacent sibling subtrees.
    #[serde(default = "default_horizontal_spacing")]
    pub horizontal_spacing: f32,
    /// Per-depth step used before vertical repacking.
    #[serde(default = "default_vertical_spacing")]
    pub vertical_spacing: f32,
    /// Gap between depth bands after repacking.
    #[serde(default = "default_inter_level_gap")]
    pub inter_level_gap: f32,
    /// Gap between separate root trees.
    #[serde(default = "default_inter_tree_gap")]
    pub inter_tree_gap: f32,

    // Footprint estimation
    #[serde(default = "default_node_width")]
    pub node_width: f32,
    #[serde(default = "default_min_height")]
    pub min_height: f32,
    #[serde(default = "default_line_height")]
    pub line_height: f32,
    #[serde(default = "default_chars_per_line")]
    pub chars_per_line: f32,
    #[serde(default = "default_padding")]
    pub padding: f32,
}

fn default_horizontal_spacing() -> f32 {
    40.0
}
fn default_vertical_spacing() -> f32 {
    80.0
}
fn default_inter_level_gap() -> f32 {
    48.0
}
fn default_inter_tree_gap() -> f32 {
    120.0
}
fn default_node_width() -> f32 {
    320.0
}
fn default_min_height() -> f32 {
    64.0
}
fn default_line_height() -> f32 {
    18.0
}
fn default_chars_per_line() -> f32 {
    48.0
}
fn default_padding() -> f32 {
    24.0
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            horizontal_spacing: default_horizontal_spacing(),
            vertical_spacing: default_vertical_spacing(),
            inter_level_gap: default_inter_level_gap(),
            inter_tree_gap: default_inter_tree_gap(),
            node_width: default_node_width(),
            min_height: default_min_height(),
            line_height: default_line_height(),
            chars_per_line: default_chars_per_line(),
            padding: default_padding(),
        }
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = [
            ("layout.horizontal_spacing", self.horizontal_spacing),
            ("layout.vertical_spacing", self.vertical_spacing),
            ("layout.inter_level_gap", self.inter_level_gap),
            ("layout.inter_tree_gap", self.inter_tree_gap),
            ("layout.min_height", self.min_height),
            ("layout.padding", self.padding),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be a finite, non-negative number (got {value})"),
                });
            }
        }

        let positive = [
            ("layout.node_width", self.node_width),
            ("layout.line_height", self.line_height),
            ("layout.chars_per_line", self.chars_per_line),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be a finite, positive number (got {value})"),
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// HISTORY
// ============================================================================

/// Bounds for [`VersionHistory`](crate::VersionHistory).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// High-water mark. `0` disables eviction.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Share of entries dropped per eviction batch.
    #[serde(default = "default_evict_fraction")]
    pub evict_fraction: f64,
}

fn default_capacity() -> usize {
    1000
}
fn default_evict_fraction() -> f64 {
    0.2
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            evict_fraction: default_evict_fraction(),
        }
    }
}

impl HistoryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.evict_fraction > 0.0 && self.evict_fraction <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "history.evict_fraction",
                reason: format!("must be in (0, 1] (got {})", self.evict_fraction),
            });
        }
        Ok(())
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Top-level configuration for a [`ConversationTree`](crate::ConversationTree).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

impl EngineConfig {
    /// Parse and validate a RON document.
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Invalid {
                field: "config",
                reason: e.to_string(),
            })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.layout.validate()?;
        self.history.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = EngineConfig::from_ron_str("()").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_ron_str(
            "(layout: (horizontal_spacing: 60.0), history: (capacity: 5))",
        )
        .unwrap();
        assert_eq!(config.layout.horizontal_spacing, 60.0);
        assert_eq!(config.layout.vertical_spacing, 80.0);
        assert_eq!(config.history.capacity, 5);
        assert_eq!(config.history.evict_fraction, 0.2);
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = EngineConfig::from_ron_str("(layout: (line_height: 0.0))").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { field: "layout.line_height", .. }
        ));

        let err = EngineConfig::from_ron_str("(history: (evict_fraction: 1.5))").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { field: "history.evict_fraction", .. }
        ));
    }

    #[test]
    fn test_parse_error() {
        let err = EngineConfig::from_ron_str("(layout: ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_ron_round_trip() {
        let mut config = EngineConfig::default();
        config.layout.inter_tree_gap = 200.0;
        let text = config.to_ron_string().unwrap();
        assert_eq!(EngineConfig::from_ron_str(&text).unwrap(), config);
    }
}
