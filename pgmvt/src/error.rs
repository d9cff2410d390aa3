use std::io;
use std::path::PathBuf;

use pgmvt_core::PgMvtCoreError;

/// A convenience [`Result`] for the pgmvt crate.
pub type PgMvtResult<T> = Result<T, PgMvtError>;

#[derive(thiserror::Error, Debug)]
pub enum PgMvtError {
    #[error("The --config and the connection string cannot be used together")]
    ConfigAndConnectionError,

    #[error("Unable to bind to {1}: {0}")]
    BindingError(#[source] io::Error, String),

    #[error("Base path must be a valid URL path, and must begin with a '/' symbol, but is '{0}'")]
    BasePathError(String),

    #[error("Unable to load config file {1}: {0}")]
    ConfigLoadError(#[source] io::Error, PathBuf),

    #[error("Unable to parse config file {1}: {0}")]
    ConfigParseError(#[source] subst::yaml::Error, PathBuf),

    #[error("Unable to write config file {1}: {0}")]
    ConfigWriteError(#[source] io::Error, PathBuf),

    #[error("Unable to serialize the configuration: {0}")]
    ConfigSerializeError(#[source] serde_yaml::Error),

    #[error(
        "A postgres connection string must be provided on the command line, in the DATABASE_URL env variable, or in the config file"
    )]
    NoConnectionString,

    #[error("The postgres pool_size must be greater than or equal to 1")]
    PoolSizeInvalid,

    #[error("At least one 'origin' must be specified in the 'cors' configuration")]
    CorsNoOriginsConfigured,

    #[error(transparent)]
    CoreError(#[from] PgMvtCoreError),

    #[error(transparent)]
    IoError(#[from] io::Error),
}
