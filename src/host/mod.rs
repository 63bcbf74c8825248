//! Host bridge
//!
//! The host side of the boundary: dynamically typed [`HostValue`]s, compiled
//! module handles, the 64-bit integer marshaller and host-facing instances.

pub mod bigint;
pub mod error;
pub mod instance;
pub mod module;
pub mod value;

pub use bigint::{to_host64, to_native64};
pub use error::HostError;
pub use instance::{Export, ExportedFunction, Extern, GlobalObject, HostFunction, Imports, Instance, MemoryObject, TableObject};
pub use module::{expect_module, ModuleFunction, WasmModule};
pub use value::{to_host_value, to_wasm_value, HostValue};
