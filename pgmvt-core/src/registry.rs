use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::PgMvtCoreResult;
use crate::function::FunctionInfo;

/// Function layers, keyed by id.
///
/// Filled while the server starts and only read afterwards.
#[derive(Clone, Debug, Default)]
pub struct FunctionRegistry {
    funcs: BTreeMap<String, FunctionInfo>,
}

impl FunctionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a function layer. A function with the same id is replaced.
    pub fn register(&mut self, mut func: FunctionInfo) -> PgMvtCoreResult<()> {
        func.validate()?;
        if let Some(old) = self.funcs.get(&func.id) {
            warn!(
                "Function layer {} is registered more than once, {} replaces {}",
                func.id, func.function, old.function
            );
        } else {
            info!("Registered function layer {} as {}", func.id, func.function);
        }
        self.funcs.insert(func.id.clone(), func);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&FunctionInfo> {
        self.funcs.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionInfo> {
        self.funcs.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }
}
