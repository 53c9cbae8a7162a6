//! Pixel-space placement of the composited layers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A point on the canvas, in pixels. May be negative before clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PixelPoint {
    pub x: i64,
    pub y: i64,
}

impl PixelPoint {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Placement and size of the label box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LabelBox {
    /// Top-left corner
    pub origin: PixelPoint,
    pub width: u32,
    pub height: u32,
}

impl LabelBox {
    /// Right edge (exclusive).
    pub fn right(&self) -> i64 {
        self.origin.x + i64::from(self.width)
    }
}

/// Derived layout for one job. Immutable once computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GeometrySpec {
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Side of the square avatar canvas; the mask is a circle inscribed in it
    pub avatar_diameter: u32,
    /// Avatar top-left
    pub anchor: PixelPoint,
    pub label: LabelBox,
}

impl GeometrySpec {
    /// Centre of the avatar circle.
    pub fn avatar_center(&self) -> PixelPoint {
        let r = i64::from(self.avatar_diameter / 2);
        PixelPoint::new(self.anchor.x + r, self.anchor.y + r)
    }
}
