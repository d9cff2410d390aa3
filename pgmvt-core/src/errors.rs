use deadpool_postgres::tokio_postgres::Error as TokioPgError;
use deadpool_postgres::{BuildError, PoolError};
use pgmvt_tile_utils::{TileCoord, TileMatrixError};
use semver::Version;

pub type PgMvtCoreResult<T> = Result<T, PgMvtCoreError>;

/// Errors of layer resolution, tile query synthesis and execution.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum PgMvtCoreError {
    #[error("Invalid layer identifier {0}, expected a registered function or <schema>.<table>")]
    InvalidIdentifier(String),

    #[error("Table/Function {0} not found")]
    LayerNotFound(String),

    #[error("Zoom {0} is above the maximum supported zoom {max}", max = pgmvt_tile_utils::MAX_ZOOM)]
    InvalidZoom(u8),

    #[error(transparent)]
    TileMatrixError(#[from] TileMatrixError),

    #[error("Layer {layer} requires parameter {param}")]
    MissingParameter { layer: String, param: String },

    #[error("Invalid parameter {param}={value:?} for layer {layer}: {reason}")]
    InvalidParameter {
        layer: String,
        param: String,
        value: String,
        reason: String,
    },

    #[error("Function {0} is not a valid schema-qualified function name")]
    InvalidFunctionName(String),

    #[error(r"Unable to get tile {2:#} from {1}: {0}")]
    QueryExecutionError(#[source] TokioPgError, String, TileCoord),

    #[error("Postgres error while {1}: {0}")]
    PostgresError(#[source] TokioPgError, &'static str),

    #[error("Unable to build a Postgres connection pool {1}: {0}")]
    PostgresPoolBuildError(#[source] BuildError, String),

    #[error("Unable to get a Postgres connection from the pool {1}: {0}")]
    PostgresPoolConnError(#[source] PoolError, String),

    #[error("Unable to parse connection string {1}: {0}")]
    BadConnectionString(#[source] TokioPgError, String),

    #[error("Unable to parse PostGIS version {1}: {0}")]
    BadPostgisVersion(#[source] semver::Error, String),

    #[error("PostGIS version {0} is too old, minimum required is {1}")]
    PostgisTooOld(Version, Version),
}

impl PgMvtCoreError {
    /// Errors caused by the request rather than by the server or the database.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidIdentifier(_)
                | Self::LayerNotFound(_)
                | Self::InvalidZoom(_)
                | Self::TileMatrixError(_)
                | Self::MissingParameter { .. }
                | Self::InvalidParameter { .. }
        )
    }

    /// The requested layer does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::InvalidIdentifier(_) | Self::LayerNotFound(_))
    }

    /// No pooled connection became available within the pool wait timeout.
    #[must_use]
    pub fn is_pool_timeout(&self) -> bool {
        matches!(self, Self::PostgresPoolConnError(PoolError::Timeout(_), _))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::invalid_id(PgMvtCoreError::InvalidIdentifier("roads".into()), true, true)]
    #[case::not_found(PgMvtCoreError::LayerNotFound("public.roads".into()), true, true)]
    #[case::zoom(PgMvtCoreError::InvalidZoom(31), true, false)]
    #[case::tms(TileMatrixError::UnknownTileMatrixSet("foo".into()).into(), true, false)]
    #[case::missing(PgMvtCoreError::MissingParameter { layer: "hexbin".into(), param: "size".into() }, true, false)]
    #[case::bad_fn(PgMvtCoreError::InvalidFunctionName("a.b.c".into()), false, false)]
    fn classification(
        #[case] err: PgMvtCoreError,
        #[case] client: bool,
        #[case] not_found: bool,
    ) {
        assert_eq!(err.is_client_error(), client);
        assert_eq!(err.is_not_found(), not_found);
        assert!(!err.is_pool_timeout());
    }

    #[test]
    fn messages() {
        let err = PgMvtCoreError::InvalidParameter {
            layer: "hexbin".into(),
            param: "resolution".into(),
            value: "abc".into(),
            reason: "expected an integer".into(),
        };
        assert_eq!(
            err.to_string(),
            r#"Invalid parameter resolution="abc" for layer hexbin: expected an integer"#
        );
        assert_eq!(
            PgMvtCoreError::InvalidZoom(31).to_string(),
            "Zoom 31 is above the maximum supported zoom 30"
        );
    }
}
