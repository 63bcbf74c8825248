//! Import/Export Table
//!
//! Built once per module from the decoded import and export sections. Entries
//! keep declaration order; repeated names stay as separate entries.

use super::kind::{Kind, UnknownKindError};
use crate::parser::module::{ExternalKind, Module};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    pub module_name: String,
    pub field_name: String,
    pub kind: Kind,
    /// Signature index, for function imports only
    pub type_index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEntry {
    pub field_name: String,
    pub kind: Kind,
    /// Index into the index space of `kind`
    pub index: u32,
}

#[derive(Debug, Default)]
pub struct InterfaceTable {
    imports: Vec<ImportEntry>,
    exports: Vec<ExportEntry>,
}

impl InterfaceTable {
    pub fn build(module: &Module) -> Result<InterfaceTable, UnknownKindError> {
        let imports = module
            .imports
            .iter()
            .map(|import| {
                Ok(ImportEntry {
                    module_name: import.module.clone(),
                    field_name: import.name.clone(),
                    kind: Kind::from_tag(import.external_kind.tag())?,
                    type_index: match import.external_kind {
                        ExternalKind::Function(type_idx) => Some(type_idx),
                        _ => None,
                    },
                })
            })
            .collect::<Result<Vec<_>, UnknownKindError>>()?;

        let exports = module
            .exports
            .iter()
            .map(|export| {
                Ok(ExportEntry {
                    field_name: export.name.clone(),
                    kind: Kind::from_tag(export.index.tag())?,
                    index: export.index.index(),
                })
            })
            .collect::<Result<Vec<_>, UnknownKindError>>()?;

        Ok(InterfaceTable { imports, exports })
    }

    pub fn import_entries(&self) -> &[ImportEntry] {
        &self.imports
    }

    pub fn export_entries(&self) -> &[ExportEntry] {
        &self.exports
    }
}
