use std::collections::{HashMap, HashSet};

pub mod cors;
pub mod env;
pub mod postgres;
pub mod srv;

mod main;
pub use main::*;

/// Configuration keys that no section recognized, with their values
pub type UnrecognizedValues = HashMap<String, serde_yaml::Value>;
pub type UnrecognizedKeys = HashSet<String>;
