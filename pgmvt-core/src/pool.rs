//! `PostgreSQL` connection pool shared by all tile requests.

use std::str::FromStr as _;
use std::time::Duration;

use deadpool_postgres::tokio_postgres::{Config, NoTls};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod, Runtime};
use semver::Version;
use tracing::info;

use crate::PgMvtCoreError::{
    BadConnectionString, BadPostgisVersion, PostgisTooOld, PostgresError, PostgresPoolBuildError,
    PostgresPoolConnError,
};
use crate::PgMvtCoreResult;

/// `ST_AsMVT`/`ST_AsMVTGeom` with the parameters used here are stable since
/// [`PostGIS 3.0.0`](https://postgis.net/2019/10/PostGIS-3.0.0/)
const MINIMUM_POSTGIS_VERSION: Version = Version::new(3, 0, 0);

pub const POOL_SIZE_DEFAULT: usize = 10;
pub const POOL_TIMEOUT_DEFAULT: Duration = Duration::from_secs(30);

/// Bounded pool of `PostgreSQL` connections with `PostGIS` support.
///
/// When all connections are checked out, [`PgPool::get`] waits up to the configured timeout
/// and then fails, which surfaces to clients as "service unavailable".
#[derive(Clone, Debug)]
pub struct PgPool {
    id: String,
    pool: Pool,
}

impl PgPool {
    /// Creates the pool and verifies that the database has a usable `PostGIS` installation.
    ///
    /// Arguments:
    /// - `connection_string`: the postgres connection string
    /// - `pool_size`: maximum number of connections in the pool
    /// - `wait_timeout`: how long a request may wait for a free connection
    pub async fn new(
        connection_string: &str,
        pool_size: usize,
        wait_timeout: Duration,
    ) -> PgMvtCoreResult<Self> {
        let res = Self::new_lazy(connection_string, pool_size, wait_timeout)?;
        let conn = res.get().await?;
        let postgis_ver = get_postgis_version(&conn).await?;
        if postgis_ver < MINIMUM_POSTGIS_VERSION {
            return Err(PostgisTooOld(postgis_ver, MINIMUM_POSTGIS_VERSION));
        }
        info!(
            "Connected to PostGIS {postgis_ver} database {} (pool size {pool_size})",
            res.id
        );
        Ok(res)
    }

    /// Creates the pool without opening any connection.
    pub fn new_lazy(
        connection_string: &str,
        pool_size: usize,
        wait_timeout: Duration,
    ) -> PgMvtCoreResult<Self> {
        let pg_cfg = Config::from_str(connection_string)
            .map_err(|e| BadConnectionString(e, connection_string.to_string()))?;
        let id = pg_cfg.get_dbname().map_or_else(
            || format!("{:?}", pg_cfg.get_hosts().first()),
            ToString::to_string,
        );

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let mgr = Manager::from_config(pg_cfg, NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(pool_size)
            .runtime(Runtime::Tokio1)
            .wait_timeout(Some(wait_timeout))
            .build()
            .map_err(|e| PostgresPoolBuildError(e, id.clone()))?;

        Ok(Self { id, pool })
    }

    /// Retrieves an [`Object`] from this pool or waits for one to become available.
    pub async fn get(&self) -> PgMvtCoreResult<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| PostgresPoolConnError(e, self.id.clone()))
    }

    /// ID under which this pool is identified in logs
    #[must_use]
    pub fn get_id(&self) -> &str {
        &self.id
    }
}

/// Get [PostGIS version](https://postgis.net/docs/PostGIS_Lib_Version.html)
async fn get_postgis_version(conn: &Object) -> PgMvtCoreResult<Version> {
    let version: String = conn
        .query_one(
            r"
SELECT (regexp_matches(
           PostGIS_Lib_Version(),
           '^(\d+\.\d+\.\d+)',
           'g'
       ))[1] as version;",
            &[],
        )
        .await
        .map(|row| row.get("version"))
        .map_err(|e| PostgresError(e, "querying postgis version"))?;

    version.parse().map_err(|e| BadPostgisVersion(e, version))
}
