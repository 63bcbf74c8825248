use super::instruction::{Instruction, InstructionKind};
use super::module::{ExportIndex, FunctionType, Locals, Module, ValueType, ValueType::*};
use std::collections::HashSet;
use thiserror::Error;
use MaybeValue::{Unknown, Val};

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("type mismatch")]
    TypeMismatch,

    #[error("unknown type {0}")]
    UnknownType(u32),

    #[error("unknown function {0}")]
    UnknownFunction(u32),

    #[error("unknown local {0}")]
    UnknownLocal(u32),

    #[error("unknown global {0}")]
    UnknownGlobal(u32),

    #[error("unknown table {0}")]
    UnknownTable(u32),

    #[error("unknown memory {0}")]
    UnknownMemory(u32),

    #[error("global is immutable")]
    ImmutableGlobal,

    #[error("multiple memories")]
    MultipleMemories,

    #[error("size minimum must not be greater than maximum")]
    LimitsMismatch,

    #[error("duplicate export name \"{0}\"")]
    DuplicateExport(String),

    #[error("function and code section have inconsistent lengths")]
    FunctionCodeMismatch,

    #[error("start function must have type [] -> []")]
    StartFunction,

    #[error("constant expression required")]
    ConstantExpressionRequired,
}

/// Validate the cross-section constraints of a fully decoded module.
pub fn validate_module(module: &Module) -> Result<(), ValidationError> {
    if module.functions.len() != module.code.len() {
        return Err(ValidationError::FunctionCodeMismatch);
    }
    if module.memory_count() > 1 {
        return Err(ValidationError::MultipleMemories);
    }

    for import in &module.imports {
        if let super::module::ExternalKind::Function(type_idx) = import.external_kind {
            check_type(module, type_idx)?;
        }
    }
    for function in &module.functions {
        check_type(module, function.ftype_index)?;
    }

    let limits = module
        .memories
        .iter()
        .chain(module.tables.iter().map(|t| &t.limits));
    for limit in limits {
        if matches!(limit.max, Some(max) if max < limit.min) {
            return Err(ValidationError::LimitsMismatch);
        }
    }

    for global in &module.globals {
        validate_constant_expression(module, &global.init, global.global_type.value_type)?;
    }

    let mut names = HashSet::new();
    for export in &module.exports {
        if !names.insert(export.name.as_str()) {
            return Err(ValidationError::DuplicateExport(export.name.clone()));
        }
        match export.index {
            ExportIndex::Function(i) if i as usize >= module.function_count() => {
                return Err(ValidationError::UnknownFunction(i))
            }
            ExportIndex::Table(i) if i as usize >= module.table_count() => return Err(ValidationError::UnknownTable(i)),
            ExportIndex::Memory(i) if i as usize >= module.memory_count() => {
                return Err(ValidationError::UnknownMemory(i))
            }
            ExportIndex::Global(i) if i as usize >= module.global_count() => {
                return Err(ValidationError::UnknownGlobal(i))
            }
            _ => {}
        }
    }

    if let Some(start) = module.start {
        let ftype = module
            .function_type(start)
            .ok_or(ValidationError::UnknownFunction(start))?;
        if !ftype.parameters.is_empty() || !ftype.return_types.is_empty() {
            return Err(ValidationError::StartFunction);
        }
    }

    let imported = module.imported_function_count();
    for (i, body) in module.code.iter().enumerate() {
        let ftype = module
            .function_type((imported + i) as u32)
            .ok_or(ValidationError::UnknownFunction((imported + i) as u32))?;
        let mut validator = CodeValidator::new(module, &body.locals, ftype);
        for instruction in &body.instructions {
            validator.validate(instruction)?;
        }
        if !validator.ended() {
            return Err(ValidationError::TypeMismatch);
        }
    }

    Ok(())
}

fn check_type(module: &Module, type_idx: u32) -> Result<(), ValidationError> {
    match module.types.get(type_idx as usize) {
        Some(_) => Ok(()),
        None => Err(ValidationError::UnknownType(type_idx)),
    }
}

/// A constant expression is a single constant of the expected type, or a
/// `global.get` of an immutable imported global, followed by `end`.
fn validate_constant_expression(
    module: &Module,
    expr: &[Instruction],
    return_type: ValueType,
) -> Result<(), ValidationError> {
    let (value, end) = match expr {
        [value, end] => (value, end),
        _ => return Err(ValidationError::TypeMismatch),
    };
    if end.kind != InstructionKind::End {
        return Err(ValidationError::TypeMismatch);
    }
    let produced = match value.kind {
        InstructionKind::I32Const { .. } => I32,
        InstructionKind::I64Const { .. } => I64,
        InstructionKind::F32Const { .. } => F32,
        InstructionKind::F64Const { .. } => F64,
        InstructionKind::GlobalGet { global_idx } => {
            if global_idx as usize >= module.imported_global_count() {
                return Err(ValidationError::UnknownGlobal(global_idx));
            }
            let global_type = module
                .global_type(global_idx)
                .ok_or(ValidationError::UnknownGlobal(global_idx))?;
            if global_type.mutable {
                return Err(ValidationError::ConstantExpressionRequired);
            }
            global_type.value_type
        }
        _ => return Err(ValidationError::ConstantExpressionRequired),
    };
    (produced == return_type)
        .then_some(())
        .ok_or(ValidationError::TypeMismatch)
}

pub trait Validator {
    fn validate(&mut self, inst: &Instruction) -> Result<(), ValidationError>;
    fn ended(&mut self) -> bool;
}

#[derive(PartialEq, Debug, Clone, Copy)]
enum MaybeValue {
    Val(ValueType),
    Unknown,
}

/// Operand-stack type checker for straight-line function bodies. After
/// `unreachable` or `return` the stack becomes polymorphic.
pub struct CodeValidator<'a> {
    module: &'a Module,
    locals: Vec<ValueType>,
    results: &'a [ValueType],
    vals: Vec<MaybeValue>,
    unreachable: bool,
    has_end: bool,
}

impl<'a> CodeValidator<'a> {
    pub fn new(module: &'a Module, locals: &Locals, function_type: &'a FunctionType) -> CodeValidator<'a> {
        let mut all_locals = function_type.parameters.clone();
        all_locals.extend(locals.types());
        CodeValidator {
            module,
            locals: all_locals,
            results: &function_type.return_types,
            vals: Vec::new(),
            unreachable: false,
            has_end: false,
        }
    }

    fn push_val(&mut self, value_type: ValueType) {
        self.vals.push(Val(value_type));
    }

    fn pop_val(&mut self) -> Result<MaybeValue, ValidationError> {
        match self.vals.pop() {
            Some(v) => Ok(v),
            None if self.unreachable => Ok(Unknown),
            None => Err(ValidationError::TypeMismatch),
        }
    }

    fn pop_expect(&mut self, expected: ValueType) -> Result<(), ValidationError> {
        match self.pop_val()? {
            Val(actual) if actual != expected => Err(ValidationError::TypeMismatch),
            _ => Ok(()),
        }
    }

    fn pop_results(&mut self) -> Result<(), ValidationError> {
        for value_type in self.results.iter().rev() {
            self.pop_expect(*value_type)?;
        }
        Ok(())
    }

    fn set_unreachable(&mut self) {
        self.vals.clear();
        self.unreachable = true;
    }

    fn local(&self, local_idx: u32) -> Result<ValueType, ValidationError> {
        self.locals
            .get(local_idx as usize)
            .copied()
            .ok_or(ValidationError::UnknownLocal(local_idx))
    }
}

impl Validator for CodeValidator<'_> {
    fn validate(&mut self, inst: &Instruction) -> Result<(), ValidationError> {
        if self.has_end {
            return Err(ValidationError::TypeMismatch);
        }

        use InstructionKind::*;
        match inst.kind {
            Unreachable => self.set_unreachable(),
            Nop => {}
            End => {
                self.pop_results()?;
                if !self.vals.is_empty() {
                    return Err(ValidationError::TypeMismatch);
                }
                self.has_end = true;
            }
            Return => {
                self.pop_results()?;
                self.set_unreachable();
            }
            Call { func_idx } => {
                let ftype = self
                    .module
                    .function_type(func_idx)
                    .ok_or(ValidationError::UnknownFunction(func_idx))?;
                for param in ftype.parameters.iter().rev() {
                    self.pop_expect(*param)?;
                }
                for result in &ftype.return_types {
                    self.push_val(*result);
                }
            }
            Drop => {
                self.pop_val()?;
            }
            LocalGet { local_idx } => {
                let value_type = self.local(local_idx)?;
                self.push_val(value_type);
            }
            LocalSet { local_idx } => {
                let value_type = self.local(local_idx)?;
                self.pop_expect(value_type)?;
            }
            LocalTee { local_idx } => {
                let value_type = self.local(local_idx)?;
                self.pop_expect(value_type)?;
                self.push_val(value_type);
            }
            GlobalGet { global_idx } => {
                let global_type = self
                    .module
                    .global_type(global_idx)
                    .ok_or(ValidationError::UnknownGlobal(global_idx))?;
                self.push_val(global_type.value_type);
            }
            GlobalSet { global_idx } => {
                let global_type = self
                    .module
                    .global_type(global_idx)
                    .ok_or(ValidationError::UnknownGlobal(global_idx))?;
                if !global_type.mutable {
                    return Err(ValidationError::ImmutableGlobal);
                }
                self.pop_expect(global_type.value_type)?;
            }
            I32Const { .. } => self.push_val(I32),
            I64Const { .. } => self.push_val(I64),
            F32Const { .. } => self.push_val(F32),
            F64Const { .. } => self.push_val(F64),
            I32Add => {
                self.pop_expect(I32)?;
                self.pop_expect(I32)?;
                self.push_val(I32);
            }
            I64Add => {
                self.pop_expect(I64)?;
                self.pop_expect(I64)?;
                self.push_val(I64);
            }
        }
        Ok(())
    }

    fn ended(&mut self) -> bool {
        self.has_end
    }
}
