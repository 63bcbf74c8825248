//! Compiled module handles
//!
//! A [`WasmModule`] owns the decoded module and its interface table. Both are
//! fixed at construction; reflection only ever reads them.

use super::{HostError, HostValue};
use crate::parser::{self, module::Module, reader::Reader};
use crate::reflect::{list_exports, list_imports, InterfaceTable};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
pub struct WasmModule {
    parsed: Arc<Module>,
    interface: InterfaceTable,
}

impl WasmModule {
    /// Decode and validate `bytes` into a shareable module handle.
    pub fn new(bytes: &[u8]) -> Result<Arc<WasmModule>, HostError> {
        Self::with_name("module", bytes)
    }

    pub fn with_name(name: &str, bytes: &[u8]) -> Result<Arc<WasmModule>, HostError> {
        let mut reader = Reader::new(bytes);
        let parsed = parser::parse(name, &mut reader)?;
        let interface = InterfaceTable::build(&parsed)?;
        debug!(
            module = name,
            imports = interface.import_entries().len(),
            exports = interface.export_entries().len(),
            "compiled module"
        );
        Ok(Arc::new(WasmModule {
            parsed: Arc::new(parsed),
            interface,
        }))
    }

    pub fn interface(&self) -> &InterfaceTable {
        &self.interface
    }

    pub fn parsed(&self) -> &Arc<Module> {
        &self.parsed
    }
}

/// Check that the first argument is a module handle and hand it back.
///
/// Only `HostValue::Module` qualifies; the module type and its prototype are
/// not instances.
pub fn expect_module(args: &[HostValue]) -> Result<&Arc<WasmModule>, HostError> {
    match args.first() {
        Some(HostValue::Module(module)) => Ok(module),
        Some(other) => Err(HostError::InvalidArgument(format!(
            "argument 0 must be a WebAssembly.Module, got {}",
            other.type_name()
        ))),
        None => Err(HostError::InvalidArgument(
            "argument 0 must be a WebAssembly.Module, got nothing".to_string(),
        )),
    }
}

/// The reflection functions exposed on the module type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleFunction {
    Exports,
    Imports,
}

impl ModuleFunction {
    pub fn name(&self) -> &'static str {
        match self {
            ModuleFunction::Exports => "exports",
            ModuleFunction::Imports => "imports",
        }
    }

    /// Call with any receiver. The receiver plays no part in the result.
    pub fn call(&self, _this: &HostValue, args: &[HostValue]) -> Result<HostValue, HostError> {
        let descriptors: Vec<HostValue> = match self {
            ModuleFunction::Exports => list_exports(args)?
                .iter()
                .map(|descriptor| descriptor.to_host_value())
                .collect(),
            ModuleFunction::Imports => list_imports(args)?
                .iter()
                .map(|descriptor| descriptor.to_host_value())
                .collect(),
        };
        Ok(HostValue::Array(descriptors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ModuleBuilder;
    use crate::parser::encoding::DESC_GLOBAL;
    use crate::parser::module::ValueType;
    use crate::reflect::Kind;

    #[test]
    fn test_compile_error() {
        assert!(matches!(WasmModule::new(b"not wasm"), Err(HostError::Compile(_))));
    }

    #[test]
    fn test_expect_module() {
        let module = WasmModule::new(&ModuleBuilder::new().to_bytes()).unwrap();
        let args = [HostValue::Module(module.clone())];
        assert!(Arc::ptr_eq(expect_module(&args).unwrap(), &module));

        for bad in [HostValue::ModuleConstructor, HostValue::ModulePrototype, HostValue::Object(vec![])] {
            assert!(matches!(expect_module(&[bad]), Err(HostError::InvalidArgument(_))));
        }
    }

    #[test]
    fn test_call_ignores_receiver() {
        let module = WasmModule::new(&ModuleBuilder::new().to_bytes()).unwrap();
        let args = [HostValue::Module(module)];
        for this in [HostValue::Undefined, HostValue::Null, HostValue::from(1.0)] {
            assert_eq!(
                ModuleFunction::Exports.call(&this, &args).unwrap(),
                HostValue::Array(vec![])
            );
        }
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_shared_across_threads() {
        assert_send_sync::<WasmModule>();

        let mut builder = ModuleBuilder::new();
        let g = builder.add_imported_global("env", "g", ValueType::I64, false);
        builder.add_export_of_kind("g", DESC_GLOBAL, g);
        let module = WasmModule::new(&builder.to_bytes()).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let module = module.clone();
                std::thread::spawn(move || {
                    let args = [HostValue::Module(module)];
                    (list_exports(&args).unwrap(), list_imports(&args).unwrap())
                })
            })
            .collect();
        for handle in handles {
            let (exports, imports) = handle.join().unwrap();
            assert_eq!(exports.len(), 1);
            assert_eq!(exports[0].name, "g");
            assert_eq!(exports[0].kind, Kind::Global);
            assert_eq!(imports.len(), 1);
            assert_eq!(imports[0].module, "env");
            assert_eq!(imports[0].kind, Kind::Global);
        }
    }
}
