//! OGC two dimensional tile matrix sets.
//!
//! Only quad-tree sets are provided: every zoom level halves the cell size of the previous
//! one and doubles the matrix size in both directions.
//! See <https://docs.ogc.org/is/17-083r4/17-083r4.html>

use std::f64::consts::PI;
use std::sync::LazyLock;

use serde::Serialize;

/// Tile matrix set used when a request does not name one.
pub const DEFAULT_TILE_MATRIX_SET: &str = "WebMercatorQuad";

/// OGC "standardized rendering pixel size" of 0.28mm, used to convert scale denominators to cell sizes.
const STANDARDIZED_PIXEL_SIZE: f64 = 0.000_28;

/// Length of one degree on the equator of the WGS84 ellipsoid.
const METERS_PER_DEGREE: f64 = 2.0 * PI * 6_378_137.0 / 360.0;

const TILE_SIZE: u32 = 256;

pub type TileMatrixResult<T> = Result<T, TileMatrixError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TileMatrixError {
    #[error("Unknown tile matrix set {0}")]
    UnknownTileMatrixSet(String),

    #[error("Zoom {zoom} is outside of the {tms} zoom range {minzoom}..={maxzoom}")]
    ZoomOutOfRange {
        tms: String,
        zoom: u8,
        minzoom: u8,
        maxzoom: u8,
    },
}

/// Bounding box of one tile, expressed in the CRS of its tile matrix set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileEnvelope {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    /// `PostGIS` SRID of the coordinates
    pub srid: i32,
}

/// Extent of a [`TileMatrixSet`] as `[x, y]` corners in its CRS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub lower_left: [f64; 2],
    pub upper_right: [f64; 2],
}

impl TileEnvelope {
    #[must_use]
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }
}

/// A single zoom level of a [`TileMatrixSet`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileMatrix {
    pub id: String,
    #[serde(skip)]
    pub zoom: u8,
    pub scale_denominator: f64,
    pub cell_size: f64,
    /// Top-left corner as `[x, y]`
    pub point_of_origin: [f64; 2],
    pub tile_width: u32,
    pub tile_height: u32,
    pub matrix_width: u32,
    pub matrix_height: u32,
}

impl TileMatrix {
    #[must_use]
    pub fn contains(&self, col: u32, row: u32) -> bool {
        col < self.matrix_width && row < self.matrix_height
    }

    /// Envelope of the tile at `col`/`row`, or `None` if the tile is outside of this matrix.
    #[must_use]
    pub fn envelope(&self, col: u32, row: u32, srid: i32) -> Option<TileEnvelope> {
        if !self.contains(col, row) {
            return None;
        }
        let span_x = f64::from(self.tile_width) * self.cell_size;
        let span_y = f64::from(self.tile_height) * self.cell_size;
        let [origin_x, origin_y] = self.point_of_origin;
        let xmin = origin_x + f64::from(col) * span_x;
        let ymax = origin_y - f64::from(row) * span_y;
        Some(TileEnvelope {
            xmin,
            ymin: ymax - span_y,
            xmax: xmin + span_x,
            ymax,
            srid,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileMatrixSet {
    pub id: &'static str,
    pub title: &'static str,
    pub uri: String,
    pub crs: &'static str,
    #[serde(skip)]
    pub srid: i32,
    pub ordered_axes: [&'static str; 2],
    pub bounding_box: BoundingBox,
    pub tile_matrices: Vec<TileMatrix>,
}

impl TileMatrixSet {
    /// Look up one of the built-in tile matrix sets by its exact identifier.
    pub fn get(id: &str) -> TileMatrixResult<&'static Self> {
        tile_matrix_sets()
            .iter()
            .find(|tms| tms.id == id)
            .ok_or_else(|| TileMatrixError::UnknownTileMatrixSet(id.to_string()))
    }

    #[must_use]
    pub fn default_set() -> &'static Self {
        &TILE_MATRIX_SETS[0]
    }

    #[must_use]
    pub fn minzoom(&self) -> u8 {
        self.tile_matrices.first().map_or(0, |m| m.zoom)
    }

    #[must_use]
    pub fn maxzoom(&self) -> u8 {
        self.tile_matrices.last().map_or(0, |m| m.zoom)
    }

    pub fn matrix(&self, zoom: u8) -> TileMatrixResult<&TileMatrix> {
        zoom.checked_sub(self.minzoom())
            .and_then(|idx| self.tile_matrices.get(usize::from(idx)))
            .ok_or_else(|| TileMatrixError::ZoomOutOfRange {
                tms: self.id.to_string(),
                zoom,
                minzoom: self.minzoom(),
                maxzoom: self.maxzoom(),
            })
    }

    /// Compute the envelope of a tile in the CRS of this set.
    ///
    /// A zoom outside of the set is an error.
    /// A column or row outside of the matrix is not: it yields `Ok(None)`, i.e. a tile without data.
    pub fn envelope(&self, z: u8, x: u32, y: u32) -> TileMatrixResult<Option<TileEnvelope>> {
        Ok(self.matrix(z)?.envelope(x, y, self.srid))
    }
}

struct QuadDef {
    id: &'static str,
    title: &'static str,
    crs: &'static str,
    srid: i32,
    ordered_axes: [&'static str; 2],
    origin: [f64; 2],
    scale_denominator: f64,
    meters_per_unit: f64,
    matrix_size: (u32, u32),
    maxzoom: u8,
}

impl QuadDef {
    fn build(self) -> TileMatrixSet {
        let tile_matrices = (0..=self.maxzoom)
            .map(|zoom| {
                let factor = f64::from(1_u32 << zoom);
                let scale_denominator = self.scale_denominator / factor;
                TileMatrix {
                    id: zoom.to_string(),
                    zoom,
                    scale_denominator,
                    cell_size: scale_denominator * STANDARDIZED_PIXEL_SIZE / self.meters_per_unit,
                    point_of_origin: self.origin,
                    tile_width: TILE_SIZE,
                    tile_height: TILE_SIZE,
                    matrix_width: self.matrix_size.0 << zoom,
                    matrix_height: self.matrix_size.1 << zoom,
                }
            })
            .collect();

        let (width, height) = self.matrix_size;
        let span = f64::from(TILE_SIZE) * self.scale_denominator * STANDARDIZED_PIXEL_SIZE
            / self.meters_per_unit;
        let [xmin, ymax] = self.origin;
        let bounding_box = BoundingBox {
            lower_left: [xmin, ymax - f64::from(height) * span],
            upper_right: [xmin + f64::from(width) * span, ymax],
        };

        TileMatrixSet {
            id: self.id,
            title: self.title,
            uri: format!("http://www.opengis.net/def/tilematrixset/OGC/1.0/{}", self.id),
            crs: self.crs,
            srid: self.srid,
            ordered_axes: self.ordered_axes,
            bounding_box,
            tile_matrices,
        }
    }
}

static TILE_MATRIX_SETS: LazyLock<Vec<TileMatrixSet>> = LazyLock::new(|| {
    let mercator_origin = [-20_037_508.342_789_244, 20_037_508.342_789_244];
    vec![
        QuadDef {
            id: DEFAULT_TILE_MATRIX_SET,
            title: "Google Maps Compatible for the World",
            crs: "http://www.opengis.net/def/crs/EPSG/0/3857",
            srid: 3857,
            ordered_axes: ["X", "Y"],
            origin: mercator_origin,
            scale_denominator: 559_082_264.028_717_8,
            meters_per_unit: 1.0,
            matrix_size: (1, 1),
            maxzoom: 24,
        }
        .build(),
        QuadDef {
            id: "WorldCRS84Quad",
            title: "CRS84 for the World",
            crs: "http://www.opengis.net/def/crs/OGC/1.3/CRS84",
            srid: 4326,
            ordered_axes: ["Lon", "Lat"],
            origin: [-180.0, 90.0],
            scale_denominator: 279_541_132.014_358_9,
            meters_per_unit: METERS_PER_DEGREE,
            matrix_size: (2, 1),
            maxzoom: 17,
        }
        .build(),
        QuadDef {
            id: "WorldMercatorWGS84Quad",
            title: "World Mercator WGS84 (ellipsoid)",
            crs: "http://www.opengis.net/def/crs/EPSG/0/3395",
            srid: 3395,
            ordered_axes: ["E", "N"],
            origin: mercator_origin,
            scale_denominator: 559_082_264.028_717_8,
            meters_per_unit: 1.0,
            matrix_size: (1, 1),
            maxzoom: 24,
        }
        .build(),
        QuadDef {
            id: "EuropeanETRS89_LAEAQuad",
            title: "Lambert Azimuthal Equal Area ETRS89 for Europe",
            crs: "http://www.opengis.net/def/crs/EPSG/0/3035",
            srid: 3035,
            ordered_axes: ["E", "N"],
            origin: [2_000_000.0, 5_500_000.0],
            scale_denominator: 62_779_017.857_142_866,
            meters_per_unit: 1.0,
            matrix_size: (1, 1),
            maxzoom: 15,
        }
        .build(),
    ]
});

/// All built-in tile matrix sets. The first one is [`DEFAULT_TILE_MATRIX_SET`].
#[must_use]
pub fn tile_matrix_sets() -> &'static [TileMatrixSet] {
    &TILE_MATRIX_SETS
}
