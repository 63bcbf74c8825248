//! Reflection and value marshalling for WebAssembly modules seen from a
//! dynamically typed host.
//!
//! wasmhost decodes a `.wasm` binary once, records its imports and exports,
//! and answers `imports`/`exports` queries with fresh descriptor lists. It
//! also carries 64-bit integers across the boundary as arbitrary-precision
//! host integers, wrapping to two's complement on the way in.
//!
//! # Modules
//!
//! - [`parser`] -- Binary format decoder and validator.
//! - [`reflect`] -- Kind resolution, the interface table and descriptor lists.
//! - [`host`] -- Host values, module handles, the 64-bit marshaller and instances.
//! - [`runtime`] -- A small interpreter that host instances run on.
//! - [`builder`] -- Programmatic construction of module binaries.
//!
//! # Example
//!
//! ```
//! use wasmhost::builder::ModuleBuilder;
//! use wasmhost::host::{HostValue, WasmModule};
//! use wasmhost::parser::module::ValueType;
//! use wasmhost::reflect::{list_imports, Kind};
//!
//! let mut builder = ModuleBuilder::new();
//! builder.add_imported_global("env", "counter", ValueType::I64, false);
//! let module = WasmModule::new(&builder.to_bytes()).unwrap();
//!
//! let imports = list_imports(&[HostValue::Module(module)]).unwrap();
//! assert_eq!(imports[0].name, "counter");
//! assert_eq!(imports[0].kind, Kind::Global);
//! ```

pub mod builder;
pub mod host;
pub mod logger;
pub mod parser;
pub mod reflect;
pub mod runtime;
