//! Environment variable access that can be replaced in tests.

use std::collections::HashMap;
use std::ffi::OsString;

use subst::VariableMap;
use tracing::warn;

/// Environment used for `${VAR}` substitution in the config file and for CLI fallbacks.
pub trait Env<'a>: VariableMap<'a> {
    fn var_os(&self, key: &str) -> Option<OsString>;

    /// Get an environment variable as a UTF-8 string.
    ///
    /// Logs a warning and returns `None` if the variable is not valid Unicode.
    #[must_use]
    fn get_env_str(&self, key: &str) -> Option<String> {
        match self.var_os(key)?.into_string() {
            Ok(v) => Some(v),
            Err(v) => {
                let v = v.to_string_lossy();
                warn!("Environment variable {key} has invalid unicode. Lossy representation: {v}");
                None
            }
        }
    }
}

/// The process environment.
#[derive(Debug, Default)]
pub struct OsEnv;

impl Env<'_> for OsEnv {
    fn var_os(&self, key: &str) -> Option<OsString> {
        std::env::var_os(key)
    }
}

impl<'a> VariableMap<'a> for OsEnv {
    type Value = String;

    fn get(&'a self, key: &str) -> Option<Self::Value> {
        std::env::var(key).ok()
    }
}

/// A fixed set of variables, for tests.
#[derive(Debug, Default)]
pub struct FauxEnv(pub HashMap<&'static str, OsString>);

impl<'a> VariableMap<'a> for FauxEnv {
    type Value = String;

    fn get(&'a self, key: &str) -> Option<Self::Value> {
        self.0.get(key).map(|s| s.to_string_lossy().to_string())
    }
}

impl Env<'_> for FauxEnv {
    fn var_os(&self, key: &str) -> Option<OsString> {
        self.0.get(key).cloned()
    }
}
