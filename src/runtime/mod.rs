//! WebAssembly runtime
//!
//! A small stack-machine interpreter for the straight-line instruction subset,
//! plus the instance state (functions, globals, memories, tables) that host
//! objects share with running code.

pub mod executor;
pub mod imports;
pub mod instance;
pub mod memory;
pub mod stack;
pub mod table;
pub mod value;

pub use imports::ImportObject;
pub use instance::{FunctionInstance, HostFunc, Instance, SharedGlobal, SharedMemory, SharedTable};
pub use memory::Memory;
pub use table::Table;
pub use value::Value;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },
    #[error("Unsupported value type: {0}")]
    UnsupportedType(String),
    #[error("Unknown import: {0}")]
    UnknownImport(String),
    #[error("Incompatible import type: {0}")]
    IncompatibleImportType(String),
    #[error("Function index out of bounds: {0}")]
    FunctionIndexOutOfBounds(u32),
    #[error("Local variable index out of bounds: {0}")]
    LocalIndexOutOfBounds(u32),
    #[error("Global variable index out of bounds: {0}")]
    GlobalIndexOutOfBounds(u32),
    #[error("Global {0} is immutable")]
    ImmutableGlobal(u32),
    #[error("Memory error: {0}")]
    MemoryError(String),
    #[error("Table index out of bounds: {0}")]
    TableIndexOutOfBounds(u32),
    #[error("Table size exceeded")]
    TableSizeExceeded,
    #[error("Trap: {0}")]
    Trap(String),
    #[error("Invalid constant expression: {0}")]
    InvalidConstExpr(String),
    #[error("Call stack overflow")]
    CallStackOverflow,
    #[error("Host function failed: {0}")]
    HostFunction(Box<dyn std::error::Error>),
}
