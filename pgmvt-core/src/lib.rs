//! Layer resolution and dynamic `PostGIS` vector tile queries.
//!
//! A requested layer id is resolved by [`LayerResolver`] into either a catalog table or a
//! registered function, the tile envelope is computed from a tile matrix set, and the database
//! encodes the intersecting features as a Mapbox Vector Tile.

mod cancel;
mod catalog;
mod errors;
mod function;
mod layer;
pub mod metadata;
mod pool;
mod registry;
mod settings;
mod table;

pub use catalog::{Catalog, InfoMap, TableInfo};
pub use errors::{PgMvtCoreError, PgMvtCoreResult};
pub use function::{FunctionInfo, FunctionParam, ParamType, ParamValue, UrlQuery};
pub use layer::{Layer, LayerResolver};
pub use pool::{POOL_SIZE_DEFAULT, POOL_TIMEOUT_DEFAULT, PgPool};
pub use registry::FunctionRegistry;
pub use settings::{
    BUFFER_DEFAULT, EXTENT_DEFAULT, MAX_FEATURES_DEFAULT, MAXZOOM_DEFAULT, MINZOOM_DEFAULT,
    TileSettings,
};
