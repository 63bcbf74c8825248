//! Import resolution for WebAssembly modules
//!
//! An [`ImportObject`] holds runtime-level values keyed by the two-level
//! `(module, name)` namespace. The host layer fills it in from host values;
//! [`super::Instance::new`] checks each entry against the import declaration.

use super::{HostFunc, RuntimeError, SharedGlobal, SharedMemory, SharedTable};
use crate::parser::module::{GlobalType, Limits};
use std::collections::HashMap;

type Key = (String, String);

fn key(module: &str, name: &str) -> Key {
    (module.to_string(), name.to_string())
}

fn unknown(module: &str, name: &str) -> RuntimeError {
    RuntimeError::UnknownImport(format!("{}.{}", module, name))
}

#[derive(Clone, Default)]
pub struct ImportObject {
    functions: HashMap<Key, HostFunc>,
    globals: HashMap<Key, (GlobalType, SharedGlobal)>,
    memories: HashMap<Key, SharedMemory>,
    tables: HashMap<Key, SharedTable>,
}

impl ImportObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_function(&mut self, module: impl Into<String>, name: impl Into<String>, func: HostFunc) {
        self.functions.insert((module.into(), name.into()), func);
    }

    /// # Errors
    /// Returns `UnknownImport` if the import doesn't exist
    pub fn get_function(&self, module: &str, name: &str) -> Result<HostFunc, RuntimeError> {
        self.functions
            .get(&key(module, name))
            .cloned()
            .ok_or_else(|| unknown(module, name))
    }

    pub fn add_global(
        &mut self,
        module: impl Into<String>,
        name: impl Into<String>,
        global_type: GlobalType,
        global: SharedGlobal,
    ) {
        self.globals.insert((module.into(), name.into()), (global_type, global));
    }

    /// Look up a global and check it has exactly the declared type.
    pub fn get_global(&self, module: &str, name: &str, expected: &GlobalType) -> Result<SharedGlobal, RuntimeError> {
        let (actual, global) = self
            .globals
            .get(&key(module, name))
            .ok_or_else(|| unknown(module, name))?;
        if actual != expected {
            return Err(RuntimeError::IncompatibleImportType(format!(
                "{}.{}: expected global {}, got {}",
                module, name, expected, actual
            )));
        }
        Ok(global.clone())
    }

    pub fn add_memory(&mut self, module: impl Into<String>, name: impl Into<String>, memory: SharedMemory) {
        self.memories.insert((module.into(), name.into()), memory);
    }

    pub fn get_memory(&self, module: &str, name: &str, expected: &Limits) -> Result<SharedMemory, RuntimeError> {
        let memory = self
            .memories
            .get(&key(module, name))
            .ok_or_else(|| unknown(module, name))?;
        {
            let memory = memory.borrow();
            validate_import_limits(memory.size(), memory.max_pages(), expected, module, name)?;
        }
        Ok(memory.clone())
    }

    pub fn add_table(&mut self, module: impl Into<String>, name: impl Into<String>, table: SharedTable) {
        self.tables.insert((module.into(), name.into()), table);
    }

    pub fn get_table(&self, module: &str, name: &str, expected: &Limits) -> Result<SharedTable, RuntimeError> {
        let table = self
            .tables
            .get(&key(module, name))
            .ok_or_else(|| unknown(module, name))?;
        {
            let table = table.borrow();
            validate_import_limits(table.size(), table.max(), expected, module, name)?;
        }
        Ok(table.clone())
    }
}

/// The imported entity's minimum must be >= the declared minimum, and if a maximum
/// is declared, the imported entity must also have a maximum that is <= the declared one.
fn validate_import_limits(
    actual_min: u32,
    actual_max: Option<u32>,
    expected: &Limits,
    module_name: &str,
    field_name: &str,
) -> Result<(), RuntimeError> {
    let compatible = actual_min >= expected.min
        && match expected.max {
            Some(expected_max) => matches!(actual_max, Some(actual_max) if actual_max <= expected_max),
            None => true,
        };
    if !compatible {
        return Err(RuntimeError::IncompatibleImportType(format!(
            "{}.{}: limits {} do not satisfy {}",
            module_name,
            field_name,
            Limits {
                min: actual_min,
                max: actual_max
            },
            expected
        )));
    }
    Ok(())
}
