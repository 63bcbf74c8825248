use crate::parser::ParseError;
use crate::reflect::UnknownKindError;
use crate::runtime::RuntimeError;
use thiserror::Error;

/// Errors surfaced to host callers. The first four mirror the failures of
/// reflection and 64-bit marshalling; the rest come from compiling, linking
/// and running modules.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("TypeError: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    UnknownKind(#[from] UnknownKindError),

    #[error("TypeError: {0}")]
    TypeConversion(String),

    #[error("RangeError: {0}")]
    RangeConversion(String),

    #[error("CompileError: {0}")]
    Compile(#[from] ParseError),

    #[error("LinkError: {0}")]
    Link(String),

    #[error("RuntimeError: {0}")]
    Runtime(RuntimeError),

    #[error("TypeError: {0}")]
    Immutable(String),
}

impl From<RuntimeError> for HostError {
    fn from(e: RuntimeError) -> Self {
        match e {
            // host function errors travel through the interpreter unchanged
            RuntimeError::HostFunction(inner) => match inner.downcast::<HostError>() {
                Ok(host) => *host,
                Err(other) => HostError::Runtime(RuntimeError::HostFunction(other)),
            },
            RuntimeError::UnknownImport(name) => HostError::Link(format!("import {} is not provided", name)),
            RuntimeError::IncompatibleImportType(detail) => HostError::Link(detail),
            other => HostError::Runtime(other),
        }
    }
}
