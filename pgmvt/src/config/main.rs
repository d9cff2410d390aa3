use std::ffi::OsStr;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;

use pgmvt_core::{
    Catalog, FunctionInfo, FunctionRegistry, LayerResolver, POOL_SIZE_DEFAULT,
    POOL_TIMEOUT_DEFAULT, PgPool, TileSettings,
};
use serde::{Deserialize, Serialize};
use subst::VariableMap;
use tracing::{info, warn};

use crate::PgMvtError::{
    BasePathError, ConfigLoadError, ConfigParseError, ConfigSerializeError, ConfigWriteError,
    NoConnectionString,
};
use crate::PgMvtResult;
use crate::config::postgres::PostgresConfig;
use crate::config::srv::SrvConfig;
use crate::config::{UnrecognizedKeys, UnrecognizedValues};

/// Everything the HTTP handlers need, built once before the server starts.
#[derive(Debug)]
pub struct ServerState {
    pub resolver: LayerResolver,
    pub pool: PgPool,
    pub settings: TileSettings,
}

#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub srv: SrvConfig,

    pub postgres: Option<PostgresConfig>,

    #[serde(default)]
    pub tiles: TileSettings,

    /// Function layers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionInfo>,

    #[serde(flatten, skip_serializing)]
    pub unrecognized: UnrecognizedValues,
}

impl Config {
    /// Validate the configuration and normalize the values the server relies on.
    ///
    /// Returns the unrecognized keys, each of them is also logged as a warning.
    pub fn finalize(&mut self) -> PgMvtResult<UnrecognizedKeys> {
        let mut res = self.srv.get_unrecognized_keys();
        res.extend(self.unrecognized.keys().cloned());

        if let Some(path) = &self.srv.base_path {
            self.srv.base_path = Some(parse_base_path(path)?);
        }
        if let Some(cors) = &self.srv.cors {
            cors.validate()?;
        }
        res.extend(
            self.postgres
                .as_ref()
                .ok_or(NoConnectionString)?
                .finalize()?,
        );
        if self.tiles.default_minzoom > self.tiles.default_maxzoom {
            warn!(
                "tiles.default_minzoom {} is above tiles.default_maxzoom {}",
                self.tiles.default_minzoom, self.tiles.default_maxzoom
            );
        }

        for key in &res {
            warn!(
                "Ignoring unrecognized configuration key '{key}'. Please check your configuration file for typos."
            );
        }
        Ok(res)
    }

    /// Connect to the database, introspect the catalog and register function layers.
    ///
    /// Any failure here is fatal: the server never starts with a partial catalog.
    pub async fn resolve(&self) -> PgMvtResult<ServerState> {
        let pg = self.postgres.as_ref().ok_or(NoConnectionString)?;
        let connection_string = pg.connection_string.as_deref().ok_or(NoConnectionString)?;
        let pool = PgPool::new(
            connection_string,
            pg.pool_size.unwrap_or(POOL_SIZE_DEFAULT),
            pg.pool_timeout.unwrap_or(POOL_TIMEOUT_DEFAULT),
        )
        .await?;

        let catalog = Catalog::build(&pool).await?;
        let registry = self.build_registry()?;

        Ok(ServerState {
            resolver: LayerResolver::new(catalog, registry),
            pool,
            settings: self.tiles,
        })
    }

    pub fn build_registry(&self) -> PgMvtResult<FunctionRegistry> {
        let mut registry = FunctionRegistry::new();
        for func in &self.functions {
            registry.register(func.clone())?;
        }
        Ok(registry)
    }

    /// Write the configuration as YAML, or print it if `file_name` is `-`.
    pub fn save_to_file(&self, file_name: &Path) -> PgMvtResult<()> {
        let yaml = serde_yaml::to_string(&self).map_err(ConfigSerializeError)?;
        if file_name.as_os_str() == OsStr::new("-") {
            info!("Current system configuration:");
            println!("\n\n{yaml}\n");
            Ok(())
        } else {
            info!(
                "Saving config to {}, use --config to load it",
                file_name.display()
            );
            File::create(file_name)
                .map_err(|e| ConfigWriteError(e, file_name.to_path_buf()))?
                .write_all(yaml.as_bytes())
                .map_err(|e| ConfigWriteError(e, file_name.to_path_buf()))
        }
    }
}

/// Read config from a file, substituting `${VAR}` references from `env`.
pub fn read_config<'a, M>(file_name: &Path, env: &'a M) -> PgMvtResult<Config>
where
    M: VariableMap<'a>,
    M::Value: AsRef<str>,
{
    let mut file = File::open(file_name).map_err(|e| ConfigLoadError(e, file_name.into()))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| ConfigLoadError(e, file_name.into()))?;
    parse_config(&contents, env, file_name)
}

pub fn parse_config<'a, M>(contents: &str, env: &'a M, file_name: &Path) -> PgMvtResult<Config>
where
    M: VariableMap<'a>,
    M::Value: AsRef<str>,
{
    subst::yaml::from_str(contents, env).map_err(|e| ConfigParseError(e, file_name.into()))
}

pub fn parse_base_path(path: &str) -> PgMvtResult<String> {
    if !path.starts_with('/') {
        return Err(BasePathError(path.to_string()));
    }
    if let Ok(uri) = path.parse::<actix_web::http::Uri>() {
        return Ok(uri.path().trim_end_matches('/').to_string());
    }
    Err(BasePathError(path.to_string()))
}
