use actix_http::Method;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::PgMvtError::CorsNoOriginsConfigured;
use crate::PgMvtResult;
use crate::config::{UnrecognizedKeys, UnrecognizedValues};

/// `cors: true`, `cors: false`, or explicit properties.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum CorsConfig {
    Properties(CorsProperties),
    SimpleFlag(bool),
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self::SimpleFlag(true)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct CorsProperties {
    #[serde(default)]
    pub origin: Vec<String>,
    pub max_age: Option<usize>,

    #[serde(flatten, skip_serializing)]
    pub unrecognized: UnrecognizedValues,
}

impl Default for CorsProperties {
    fn default() -> Self {
        Self {
            origin: vec!["*".to_string()],
            max_age: None,
            unrecognized: UnrecognizedValues::default(),
        }
    }
}

impl CorsConfig {
    pub fn log_current_configuration(&self) {
        match self {
            Self::SimpleFlag(false) => info!("CORS is disabled"),
            Self::SimpleFlag(true) => info!(
                "CORS enabled with defaults: {:?}",
                CorsProperties::default().origin
            ),
            Self::Properties(props) => {
                info!(
                    "CORS enabled for {:?} (max age {:?})",
                    props.origin, props.max_age
                );
            }
        }
    }

    /// An explicit configuration must name at least one origin.
    pub fn validate(&self) -> PgMvtResult<()> {
        match self {
            Self::Properties(props) if props.origin.is_empty() => Err(CorsNoOriginsConfigured),
            _ => Ok(()),
        }
    }

    #[must_use]
    pub fn get_unrecognized_keys(&self) -> UnrecognizedKeys {
        match self {
            Self::Properties(props) => props.unrecognized.keys().cloned().collect(),
            Self::SimpleFlag(_) => UnrecognizedKeys::new(),
        }
    }

    /// Create [`actix_cors::Cors`] from the configuration, `None` if CORS is disabled
    #[must_use]
    pub fn make_cors_middleware(&self) -> Option<actix_cors::Cors> {
        match self {
            Self::SimpleFlag(false) => None,
            Self::SimpleFlag(true) => Some(Self::create_cors(&CorsProperties::default())),
            Self::Properties(props) => Some(Self::create_cors(props)),
        }
    }

    fn create_cors(props: &CorsProperties) -> actix_cors::Cors {
        let mut cors = actix_cors::Cors::default();
        if props.origin.iter().any(|o| o == "*") {
            cors = cors.allow_any_origin();
        } else {
            for origin in &props.origin {
                cors = cors.allowed_origin(origin);
            }
        }
        cors.allowed_methods([Method::GET, Method::HEAD])
            .max_age(props.max_age)
    }
}
