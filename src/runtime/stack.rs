//! WebAssembly value stack implementation

use super::{RuntimeError, Value};
use crate::parser::module::ValueType;

/// Operand stack for a single function activation
#[derive(Debug, Default)]
pub struct Stack {
    values: Vec<Value>,
}

impl Stack {
    pub fn new() -> Self {
        Stack { values: Vec::new() }
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn push_all(&mut self, values: impl IntoIterator<Item = Value>) {
        self.values.extend(values);
    }

    pub fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.values.pop().ok_or(RuntimeError::StackUnderflow)
    }

    /// Pop a value and check its type
    pub fn pop_typed(&mut self, expected_type: ValueType) -> Result<Value, RuntimeError> {
        let value = self.pop()?;
        if value.typ() != expected_type {
            return Err(RuntimeError::TypeMismatch {
                expected: expected_type.to_string(),
                actual: value.typ().to_string(),
            });
        }
        Ok(value)
    }

    pub fn pop_i32(&mut self) -> Result<i32, RuntimeError> {
        match self.pop_typed(ValueType::I32)? {
            Value::I32(v) => Ok(v),
            _ => Err(RuntimeError::StackUnderflow),
        }
    }

    pub fn pop_i64(&mut self) -> Result<i64, RuntimeError> {
        match self.pop_typed(ValueType::I64)? {
            Value::I64(v) => Ok(v),
            _ => Err(RuntimeError::StackUnderflow),
        }
    }

    /// Pop one value per type, returning them in declaration order.
    pub fn pop_values(&mut self, types: &[ValueType]) -> Result<Vec<Value>, RuntimeError> {
        let mut values = Vec::with_capacity(types.len());
        for value_type in types.iter().rev() {
            values.push(self.pop_typed(*value_type)?);
        }
        values.reverse();
        Ok(values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
