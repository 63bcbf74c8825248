//! WebAssembly value representation

use super::RuntimeError;
use crate::parser::instruction::InstructionKind;
use crate::parser::module::ValueType;
use fhex::ToHex;
use std::fmt;

/// Runtime representation of WebAssembly values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Value {
    /// Get the WebAssembly type of this value
    pub fn typ(&self) -> ValueType {
        match self {
            Value::I32(_) => ValueType::I32,
            Value::I64(_) => ValueType::I64,
            Value::F32(_) => ValueType::F32,
            Value::F64(_) => ValueType::F64,
        }
    }

    /// Zero value used for locals and fresh globals.
    pub fn default_for(value_type: ValueType) -> Result<Value, RuntimeError> {
        match value_type {
            ValueType::I32 => Ok(Value::I32(0)),
            ValueType::I64 => Ok(Value::I64(0)),
            ValueType::F32 => Ok(Value::F32(0.0)),
            ValueType::F64 => Ok(Value::F64(0.0)),
            other => Err(RuntimeError::UnsupportedType(other.to_string())),
        }
    }

    /// The value pushed by a `*.const` instruction, if it is one.
    pub fn from_const(kind: &InstructionKind) -> Option<Value> {
        match *kind {
            InstructionKind::I32Const { value } => Some(Value::I32(value)),
            InstructionKind::I64Const { value } => Some(Value::I64(value)),
            InstructionKind::F32Const { value } => Some(Value::F32(value)),
            InstructionKind::F64Const { value } => Some(Value::F64(value)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I32(v) => write!(f, "i32:{v}"),
            Value::I64(v) => write!(f, "i64:{v}"),
            Value::F32(v) => write!(f, "f32:{}", v.to_hex()),
            Value::F64(v) => write!(f, "f64:{}", v.to_hex()),
        }
    }
}
