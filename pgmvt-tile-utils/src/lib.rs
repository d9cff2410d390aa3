//! Tile coordinates and OGC tile matrix sets for the pg-mvt vector tile server.

use std::fmt::{Display, Formatter};

mod tms;
pub use tms::{
    BoundingBox, DEFAULT_TILE_MATRIX_SET, TileEnvelope, TileMatrix, TileMatrixError,
    TileMatrixResult, TileMatrixSet, tile_matrix_sets,
};

/// Highest zoom level a tile request may ask for.
///
/// Individual tile matrix sets usually stop much earlier, see [`TileMatrixSet::maxzoom`].
pub const MAX_ZOOM: u8 = 30;

/// Raw tile payload as produced by the database.
pub type TileData = Vec<u8>;

/// Mime type of an encoded Mapbox Vector Tile.
pub const MVT_CONTENT_TYPE: &str = "application/x-protobuf";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    /// Creates a tile coordinate if `z` does not exceed [`MAX_ZOOM`].
    ///
    /// Column and row are only checked against a concrete [`TileMatrixSet`],
    /// because matrix sizes differ between sets.
    #[must_use]
    pub fn new_checked(z: u8, x: u32, y: u32) -> Option<Self> {
        (z <= MAX_ZOOM).then_some(Self { z, x, y })
    }
}

impl Display for TileCoord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            write!(f, "{}/{}/{}", self.z, self.x, self.y)
        } else {
            write!(f, "{},{},{}", self.z, self.x, self.y)
        }
    }
}
