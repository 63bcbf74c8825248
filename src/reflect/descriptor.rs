//! Descriptor Builder
//!
//! Every call builds a new `Vec` of new descriptors from the module's
//! interface table. Nothing is memoised, so callers own what they get back.

use super::kind::Kind;
use super::table::{ExportEntry, ImportEntry};
use crate::host::module::expect_module;
use crate::host::{HostError, HostValue};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDescriptor {
    pub name: String,
    pub kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDescriptor {
    pub module: String,
    pub name: String,
    pub kind: Kind,
}

impl ExportDescriptor {
    pub fn new(name: impl Into<String>, kind: Kind) -> Self {
        ExportDescriptor {
            name: name.into(),
            kind,
        }
    }

    /// Plain host object `{ name, kind }`.
    pub fn to_host_value(&self) -> HostValue {
        HostValue::Object(vec![
            ("name".to_string(), HostValue::String(self.name.clone())),
            ("kind".to_string(), HostValue::String(self.kind.to_string())),
        ])
    }
}

impl ImportDescriptor {
    pub fn new(module: impl Into<String>, name: impl Into<String>, kind: Kind) -> Self {
        ImportDescriptor {
            module: module.into(),
            name: name.into(),
            kind,
        }
    }

    /// Plain host object `{ module, name, kind }`.
    pub fn to_host_value(&self) -> HostValue {
        HostValue::Object(vec![
            ("module".to_string(), HostValue::String(self.module.clone())),
            ("name".to_string(), HostValue::String(self.name.clone())),
            ("kind".to_string(), HostValue::String(self.kind.to_string())),
        ])
    }
}

impl From<&ExportEntry> for ExportDescriptor {
    fn from(entry: &ExportEntry) -> Self {
        ExportDescriptor::new(entry.field_name.clone(), entry.kind)
    }
}

impl From<&ImportEntry> for ImportDescriptor {
    fn from(entry: &ImportEntry) -> Self {
        ImportDescriptor::new(entry.module_name.clone(), entry.field_name.clone(), entry.kind)
    }
}

/// Describe the exports of the module passed as the first argument. Any
/// further arguments are ignored.
pub fn list_exports(args: &[HostValue]) -> Result<Vec<ExportDescriptor>, HostError> {
    let module = expect_module(args)?;
    Ok(module
        .interface()
        .export_entries()
        .iter()
        .map(ExportDescriptor::from)
        .collect())
}

/// Describe the imports of the module passed as the first argument. Any
/// further arguments are ignored.
pub fn list_imports(args: &[HostValue]) -> Result<Vec<ImportDescriptor>, HostError> {
    let module = expect_module(args)?;
    Ok(module
        .interface()
        .import_entries()
        .iter()
        .map(ImportDescriptor::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ModuleBuilder;
    use crate::host::WasmModule;

    fn module_value(builder: &ModuleBuilder) -> HostValue {
        HostValue::Module(WasmModule::new(&builder.to_bytes()).unwrap())
    }

    #[test]
    fn test_export_descriptor_object() {
        let value = ExportDescriptor::new("fn", Kind::Function).to_host_value();
        assert_eq!(value.get("name"), Some(&HostValue::from("fn")));
        assert_eq!(value.get("kind"), Some(&HostValue::from("function")));
    }

    #[test]
    fn test_import_descriptor_json() {
        let descriptor = ImportDescriptor::new("module", "memory", Kind::Memory);
        assert_eq!(
            serde_json::to_string(&descriptor).unwrap(),
            r#"{"module":"module","name":"memory","kind":"memory"}"#
        );
    }

    #[test]
    fn test_fresh_vec_per_call() {
        let mut builder = ModuleBuilder::new();
        builder.add_imported_global("m", "g", crate::parser::module::ValueType::I32, false);
        let module = module_value(&builder);

        let first = list_imports(&[module.clone()]).unwrap();
        let second = list_imports(&[module]).unwrap();
        assert_eq!(first, second);
        assert_ne!(first.as_ptr(), second.as_ptr());
    }

    #[test]
    fn test_missing_argument() {
        assert!(matches!(list_exports(&[]), Err(HostError::InvalidArgument(_))));
        assert!(matches!(list_imports(&[]), Err(HostError::InvalidArgument(_))));
    }
}
