//! WebAssembly instruction executor

use super::instance::{FunctionInstance, Instance};
use super::{stack::Stack, RuntimeError, Value};
use crate::parser::instruction::InstructionKind;
use crate::parser::module::{FunctionType, ValueType};
use tracing::trace;

/// Nested calls beyond this depth trap with `CallStackOverflow`.
pub const MAX_CALL_DEPTH: usize = 128;

/// Executes function bodies against a single instance. Call depth lives on
/// the instance, so re-entry from host functions counts against the same limit.
pub struct Executor<'a> {
    instance: &'a Instance,
}

fn check_values(expected: &[ValueType], values: &[Value], what: &str) -> Result<(), RuntimeError> {
    if values.len() != expected.len() {
        return Err(RuntimeError::TypeMismatch {
            expected: format!("{} {}", expected.len(), what),
            actual: format!("{} {}", values.len(), what),
        });
    }
    for (value, expected_type) in values.iter().zip(expected) {
        if value.typ() != *expected_type {
            return Err(RuntimeError::TypeMismatch {
                expected: expected_type.to_string(),
                actual: value.typ().to_string(),
            });
        }
    }
    Ok(())
}

impl<'a> Executor<'a> {
    pub fn new(instance: &'a Instance) -> Self {
        Executor { instance }
    }

    /// Call a function by index, checking arguments and results against its type.
    pub fn call(&mut self, func_idx: u32, args: Vec<Value>) -> Result<Vec<Value>, RuntimeError> {
        let instance = self.instance;
        let function = instance
            .function(func_idx)
            .ok_or(RuntimeError::FunctionIndexOutOfBounds(func_idx))?;
        check_values(&function.func_type().parameters, &args, "arguments")?;

        let depth = instance.call_depth();
        if depth.get() >= MAX_CALL_DEPTH {
            return Err(RuntimeError::CallStackOverflow);
        }
        depth.set(depth.get() + 1);
        let result = match function {
            FunctionInstance::Host { func, func_type } => {
                trace!(func_idx, "calling host function");
                func(func_type, args).and_then(|results| {
                    check_values(&func_type.return_types, &results, "results")?;
                    Ok(results)
                })
            }
            FunctionInstance::Wasm { code_idx, func_type } => self.execute_body(*code_idx, func_type, args),
        };
        depth.set(depth.get() - 1);
        result
    }

    fn execute_body(
        &mut self,
        code_idx: usize,
        func_type: &FunctionType,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, RuntimeError> {
        let instance = self.instance;
        let body = instance
            .body(code_idx)
            .ok_or(RuntimeError::FunctionIndexOutOfBounds(code_idx as u32))?;

        let mut locals = args;
        for value_type in body.locals.types() {
            locals.push(Value::default_for(value_type)?);
        }
        let mut stack = Stack::new();

        for instruction in &body.instructions {
            use InstructionKind::*;
            match instruction.kind {
                Unreachable => return Err(RuntimeError::Trap("unreachable".to_string())),
                Nop => {}
                End | Return => break,
                Call { func_idx } => {
                    let params = &instance
                        .function_type(func_idx)
                        .ok_or(RuntimeError::FunctionIndexOutOfBounds(func_idx))?
                        .parameters;
                    let call_args = stack.pop_values(params)?;
                    let results = self.call(func_idx, call_args)?;
                    stack.push_all(results);
                }
                Drop => {
                    stack.pop()?;
                }
                LocalGet { local_idx } => {
                    let value = *locals
                        .get(local_idx as usize)
                        .ok_or(RuntimeError::LocalIndexOutOfBounds(local_idx))?;
                    stack.push(value);
                }
                LocalSet { local_idx } | LocalTee { local_idx } => {
                    let value = stack.pop()?;
                    let local = locals
                        .get_mut(local_idx as usize)
                        .ok_or(RuntimeError::LocalIndexOutOfBounds(local_idx))?;
                    *local = value;
                    if matches!(instruction.kind, LocalTee { .. }) {
                        stack.push(value);
                    }
                }
                GlobalGet { global_idx } => stack.push(instance.global_value(global_idx)?),
                GlobalSet { global_idx } => {
                    let value = stack.pop()?;
                    instance.set_global_value(global_idx, value)?;
                }
                I32Const { value } => stack.push(Value::I32(value)),
                I64Const { value } => stack.push(Value::I64(value)),
                F32Const { value } => stack.push(Value::F32(value)),
                F64Const { value } => stack.push(Value::F64(value)),
                I32Add => {
                    let b = stack.pop_i32()?;
                    let a = stack.pop_i32()?;
                    stack.push(Value::I32(a.wrapping_add(b)));
                }
                I64Add => {
                    let b = stack.pop_i64()?;
                    let a = stack.pop_i64()?;
                    stack.push(Value::I64(a.wrapping_add(b)));
                }
            }
        }

        stack.pop_values(&func_type.return_types)
    }
}
