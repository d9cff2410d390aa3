use serde::{Deserialize, Serialize};

use crate::config::UnrecognizedKeys;
use crate::config::cors::CorsConfig;

pub const KEEP_ALIVE_DEFAULT: u64 = 75;
pub const LISTEN_ADDRESSES_DEFAULT: &str = "0.0.0.0:8081";
pub const CACHE_CONTROL_DEFAULT: &str = "public, max-age=3600";

#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct SrvConfig {
    pub keep_alive: Option<u64>,
    pub listen_addresses: Option<String>,
    /// Path prefix of the URLs returned in `TileJSON` and catalogs, e.g. when behind a proxy
    pub base_path: Option<String>,
    pub worker_processes: Option<usize>,
    /// `Cache-Control` header value of every response except `/healthz`
    pub cache_control: Option<String>,
    pub cors: Option<CorsConfig>,
}

impl SrvConfig {
    #[must_use]
    pub fn get_unrecognized_keys(&self) -> UnrecognizedKeys {
        self.cors
            .as_ref()
            .map(CorsConfig::get_unrecognized_keys)
            .unwrap_or_default()
            .into_iter()
            .map(|k| format!("cors.{k}"))
            .collect()
    }
}
