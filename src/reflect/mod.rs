//! Module interface reflection
//!
//! Resolves descriptor tags to [`Kind`]s, records each module's imports and
//! exports once in an [`InterfaceTable`], and turns that table into
//! descriptor lists on request.

pub mod descriptor;
pub mod kind;
pub mod table;

pub use descriptor::{list_exports, list_imports, ExportDescriptor, ImportDescriptor};
pub use kind::{Kind, UnknownKindError};
pub use table::{ExportEntry, ImportEntry, InterfaceTable};
