//! 2-D primitives for tree layout.

use serde::{Deserialize, Serialize};

/// Node anchor: `x` is the horizontal centre, `y` the top edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Rendered extent of a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub width: f32,
    pub height: f32,
}

impl Footprint {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Horizontal span `[left, right]` when centred on `center_x`.
    pub fn span_at(&self, center_x: f32) -> (f32, f32) {
        let half = self.width / 2.0;
        (center_x - half, center_x + half)
    }
}
