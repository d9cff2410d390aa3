use serde::{Deserialize, Serialize};

pub const EXTENT_DEFAULT: u32 = 4096;
pub const BUFFER_DEFAULT: u32 = 256;
pub const MAX_FEATURES_DEFAULT: u32 = 10_000;
pub const MINZOOM_DEFAULT: u8 = 0;
pub const MAXZOOM_DEFAULT: u8 = 22;

/// Settings shared by every generated tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileSettings {
    /// Tile extent in tile coordinate space
    pub extent: u32,
    /// Buffer distance in tile coordinate space for geometry clipping
    pub buffer: u32,
    /// Maximum number of features per tile
    pub max_features: u32,
    /// Advertised in `TileJSON` for tables that do not declare their own zoom range
    pub default_minzoom: u8,
    pub default_maxzoom: u8,
}

impl Default for TileSettings {
    fn default() -> Self {
        Self {
            extent: EXTENT_DEFAULT,
            buffer: BUFFER_DEFAULT,
            max_features: MAX_FEATURES_DEFAULT,
            default_minzoom: MINZOOM_DEFAULT,
            default_maxzoom: MAXZOOM_DEFAULT,
        }
    }
}
