//! Ephemeral raster asset roles.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Symbolic role of a generated raster layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssetRole {
    /// Circular-masked photo
    Avatar,
    /// Rounded, semi-transparent box behind the label
    LabelBackground,
    /// Label string on a transparent canvas the size of the box
    LabelText,
}

impl AssetRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetRole::Avatar => "avatar",
            AssetRole::LabelBackground => "label-bg",
            AssetRole::LabelText => "label-text",
        }
    }

    /// Encoder input index for this layer. Index 0 is always the base video.
    pub fn input_index(&self) -> usize {
        match self {
            AssetRole::Avatar => 1,
            AssetRole::LabelBackground => 2,
            AssetRole::LabelText => 3,
        }
    }
}

impl fmt::Display for AssetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
