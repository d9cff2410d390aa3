//! On-demand Mapbox Vector Tile server for `PostGIS` tables and SQL functions.
//!
//! Tables are discovered once at startup, function layers are declared in the configuration,
//! and every tile is generated by the database when it is requested.
#![forbid(unsafe_code)]

pub mod args;
pub mod config;
pub mod logging;
pub mod srv;

mod error;
pub use error::{PgMvtError, PgMvtResult};
