use pgmvt_core::{POOL_SIZE_DEFAULT, TileSettings};

use crate::config::env::Env;
use crate::config::postgres::PostgresConfig;

#[derive(clap::Args, Debug, PartialEq, Default, Clone)]
#[command(about, version)]
pub struct PgArgs {
    #[arg(help = format!("Maximum Postgres connections pool size [DEFAULT: {POOL_SIZE_DEFAULT}]"), short, long)]
    pub pool_size: Option<usize>,
    /// Limit the number of features in a tile from a table layer.
    #[arg(short, long)]
    pub max_feature_count: Option<u32>,
}

impl PgArgs {
    /// Build the postgres section when no config file was given.
    ///
    /// The connection string comes from the command line, or else from `DATABASE_URL`.
    pub fn into_config<'a>(
        self,
        connection: Option<String>,
        env: &impl Env<'a>,
    ) -> Option<PostgresConfig> {
        let connection_string = connection.or_else(|| env.get_env_str("DATABASE_URL"))?;
        Some(PostgresConfig {
            connection_string: Some(connection_string),
            pool_size: self.pool_size,
            ..PostgresConfig::default()
        })
    }

    /// Apply the few command line values that may override a config file.
    pub fn override_config(&self, pg_config: Option<&mut PostgresConfig>) {
        if let Some(pg_config) = pg_config {
            if self.pool_size.is_some() {
                pg_config.pool_size = self.pool_size;
            }
        }
    }

    pub fn override_tiles(&self, tiles: &mut TileSettings) {
        if let Some(max_features) = self.max_feature_count {
            tiles.max_features = max_features;
        }
    }
}
