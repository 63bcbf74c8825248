use std::fmt;
use std::io;

use crate::parser::encoding::{
    DESC_FUNC, DESC_GLOBAL, DESC_MEMORY, DESC_TABLE, LIMITS_MIN, LIMITS_MIN_MAX, VALTYPE_EXTERNREF, VALTYPE_F32,
    VALTYPE_F64, VALTYPE_FUNCREF, VALTYPE_I32, VALTYPE_I64, VALTYPE_V128,
};
use crate::parser::instruction::Instruction;
use crate::parser::reader::Reader;

/// A decoded module. Index spaces follow the binary format: imported
/// entities come first, in import order, followed by local definitions.
#[derive(Debug)]
pub struct Module {
    pub name: String,
    pub types: Vec<FunctionType>,
    pub imports: Vec<Import>,
    pub functions: Vec<Function>,
    pub tables: Vec<TableType>,
    pub memories: Vec<Limits>,
    pub globals: Vec<Global>,
    pub exports: Vec<Export>,
    pub start: Option<u32>,
    pub code: Vec<FunctionBody>,
}

impl Module {
    pub fn new(name: &str) -> Module {
        Module {
            name: name.to_string(),
            types: Vec::new(),
            imports: Vec::new(),
            functions: Vec::new(),
            tables: Vec::new(),
            memories: Vec::new(),
            globals: Vec::new(),
            exports: Vec::new(),
            start: None,
            code: Vec::new(),
        }
    }

    pub fn imported_function_count(&self) -> usize {
        self.imports
            .iter()
            .filter(|imp| matches!(imp.external_kind, ExternalKind::Function(_)))
            .count()
    }

    pub fn imported_global_count(&self) -> usize {
        self.imports
            .iter()
            .filter(|imp| matches!(imp.external_kind, ExternalKind::Global(_)))
            .count()
    }

    pub fn function_count(&self) -> usize {
        self.imported_function_count() + self.functions.len()
    }

    pub fn table_count(&self) -> usize {
        self.imports
            .iter()
            .filter(|imp| matches!(imp.external_kind, ExternalKind::Table(_)))
            .count()
            + self.tables.len()
    }

    pub fn memory_count(&self) -> usize {
        self.imports
            .iter()
            .filter(|imp| matches!(imp.external_kind, ExternalKind::Memory(_)))
            .count()
            + self.memories.len()
    }

    pub fn global_count(&self) -> usize {
        self.imported_global_count() + self.globals.len()
    }

    /// Signature of the function at `func_idx` in the function index space.
    pub fn function_type(&self, func_idx: u32) -> Option<&FunctionType> {
        let imported = self.imported_function_count();
        let type_idx = if (func_idx as usize) < imported {
            self.imports
                .iter()
                .filter_map(|imp| match imp.external_kind {
                    ExternalKind::Function(type_idx) => Some(type_idx),
                    _ => None,
                })
                .nth(func_idx as usize)?
        } else {
            self.functions.get(func_idx as usize - imported)?.ftype_index
        };
        self.types.get(type_idx as usize)
    }

    /// Type of the global at `global_idx` in the global index space.
    pub fn global_type(&self, global_idx: u32) -> Option<GlobalType> {
        let imported = self.imported_global_count();
        if (global_idx as usize) < imported {
            self.imports
                .iter()
                .filter_map(|imp| match imp.external_kind {
                    ExternalKind::Global(global_type) => Some(global_type),
                    _ => None,
                })
                .nth(global_idx as usize)
        } else {
            self.globals
                .get(global_idx as usize - imported)
                .map(|g| g.global_type)
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "module \"{}\"", self.name)?;
        for (i, ft) in self.types.iter().enumerate() {
            writeln!(f, " - type[{}] {}", i, ft)?;
        }
        for import in &self.imports {
            writeln!(f, " - import {}", import)?;
        }
        for export in &self.exports {
            writeln!(f, " - export {}", export)?;
        }
        if let Some(start) = self.start {
            writeln!(f, " - start func[{}]", start)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionType {
    pub parameters: Vec<ValueType>,
    pub return_types: Vec<ValueType>,
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let join = |types: &[ValueType]| {
            types
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<String>>()
                .join(", ")
        };
        let returns = match self.return_types.len() {
            0 => "nil".to_string(),
            1 => join(&self.return_types),
            _ => format!("({})", join(&self.return_types)),
        };
        write!(f, "({}) -> {}", join(&self.parameters), returns)
    }
}

#[derive(Debug)]
pub struct Import {
    pub module: String,
    pub name: String,
    pub external_kind: ExternalKind,
}

impl fmt::Display for Import {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} <- {}.{}", self.external_kind, self.module, self.name)
    }
}

#[derive(Debug)]
pub struct Function {
    pub ftype_index: u32,
}

/// What an import declares, with the type information that follows its descriptor tag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExternalKind {
    Function(u32), // typeidx
    Table(TableType),
    Memory(Limits),
    Global(GlobalType),
}

impl ExternalKind {
    pub fn decode(reader: &mut Reader) -> Result<ExternalKind, io::Error> {
        let tag = reader.read_byte()?;
        match tag {
            DESC_FUNC => Ok(ExternalKind::Function(reader.read_vu32()?)),
            DESC_TABLE => Ok(ExternalKind::Table(TableType::decode(reader)?)),
            DESC_MEMORY => Ok(ExternalKind::Memory(Limits::decode(reader)?)),
            DESC_GLOBAL => Ok(ExternalKind::Global(GlobalType::decode(reader)?)),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("malformed import kind: {:#04x}", tag),
            )),
        }
    }

    /// The descriptor byte this kind was decoded from.
    pub fn tag(&self) -> u8 {
        match self {
            ExternalKind::Function(_) => DESC_FUNC,
            ExternalKind::Table(_) => DESC_TABLE,
            ExternalKind::Memory(_) => DESC_MEMORY,
            ExternalKind::Global(_) => DESC_GLOBAL,
        }
    }
}

impl fmt::Display for ExternalKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExternalKind::Function(typeidx) => write!(f, "Function(sig={})", typeidx),
            ExternalKind::Table(table_type) => write!(f, "Table({})", table_type),
            ExternalKind::Memory(limits) => write!(f, "Memory({})", limits),
            ExternalKind::Global(global_type) => write!(f, "Global({})", global_type),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExportIndex {
    Function(u32),
    Table(u32),
    Memory(u32),
    Global(u32),
}

impl ExportIndex {
    pub fn decode(tag: u8, idx: u32) -> Result<ExportIndex, io::Error> {
        match tag {
            DESC_FUNC => Ok(ExportIndex::Function(idx)),
            DESC_TABLE => Ok(ExportIndex::Table(idx)),
            DESC_MEMORY => Ok(ExportIndex::Memory(idx)),
            DESC_GLOBAL => Ok(ExportIndex::Global(idx)),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("malformed export kind: {:#04x}", tag),
            )),
        }
    }

    pub fn tag(&self) -> u8 {
        match self {
            ExportIndex::Function(_) => DESC_FUNC,
            ExportIndex::Table(_) => DESC_TABLE,
            ExportIndex::Memory(_) => DESC_MEMORY,
            ExportIndex::Global(_) => DESC_GLOBAL,
        }
    }

    pub fn index(&self) -> u32 {
        match *self {
            ExportIndex::Function(i) | ExportIndex::Table(i) | ExportIndex::Memory(i) | ExportIndex::Global(i) => i,
        }
    }
}

#[derive(Debug)]
pub struct Export {
    pub index: ExportIndex,
    pub name: String,
}

impl fmt::Display for Export {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let typ = match self.index {
            ExportIndex::Function(i) => format!("func[{}]", i),
            ExportIndex::Table(i) => format!("table[{}]", i),
            ExportIndex::Memory(i) => format!("memory[{}]", i),
            ExportIndex::Global(i) => format!("global[{}]", i),
        };
        write!(f, "{} -> \"{}\"", typ, self.name)
    }
}

#[derive(Debug, Default)]
pub struct Locals {
    entries: Vec<(u32, ValueType)>,
}

impl Locals {
    pub fn new(entries: Vec<(u32, ValueType)>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> u64 {
        self.entries.iter().map(|(count, _)| *count as u64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expand run-length entries into one type per local.
    pub fn types(&self) -> impl Iterator<Item = ValueType> + '_ {
        self.entries
            .iter()
            .flat_map(|(count, value_type)| std::iter::repeat(*value_type).take(*count as usize))
    }
}

#[derive(Debug)]
pub struct FunctionBody {
    pub locals: Locals,
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefType {
    FuncRef,
    ExternRef,
}

impl RefType {
    pub fn decode(byte: u8) -> Result<Self, io::Error> {
        match byte {
            VALTYPE_FUNCREF => Ok(RefType::FuncRef),
            VALTYPE_EXTERNREF => Ok(RefType::ExternRef),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("malformed reference type: {:#04x}", byte),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub min: u32,
    pub max: Option<u32>,
}

impl Limits {
    pub fn decode(reader: &mut Reader) -> Result<Self, io::Error> {
        match reader.read_byte()? {
            LIMITS_MIN => Ok(Limits {
                min: reader.read_vu32()?,
                max: None,
            }),
            LIMITS_MIN_MAX => {
                let min = reader.read_vu32()?;
                let max = reader.read_vu32()?;
                Ok(Limits { min, max: Some(max) })
            }
            flag => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("malformed limits flags: {:#04x}", flag),
            )),
        }
    }
}

impl fmt::Display for Limits {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "initial={} max={}", self.min, max),
            None => write!(f, "initial={}", self.min),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableType {
    pub ref_type: RefType,
    pub limits: Limits,
}

impl TableType {
    pub fn decode(reader: &mut Reader) -> Result<Self, io::Error> {
        let ref_type = RefType::decode(reader.read_byte()?)?;
        let limits = Limits::decode(reader)?;
        Ok(TableType { ref_type, limits })
    }
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let ref_type = match self.ref_type {
            RefType::FuncRef => "funcref",
            RefType::ExternRef => "externref",
        };
        write!(f, "type={} {}", ref_type, self.limits)
    }
}

#[derive(PartialEq, Clone, Copy, Debug)]
pub struct GlobalType {
    pub value_type: ValueType,
    pub mutable: bool,
}

impl GlobalType {
    pub fn decode(reader: &mut Reader) -> Result<Self, io::Error> {
        let value_type = ValueType::decode(reader.read_byte()?)?;
        let mutable = match reader.read_byte()? {
            0 => false,
            1 => true,
            flag => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("malformed mutability: {:#04x}", flag),
                ))
            }
        };
        Ok(GlobalType { value_type, mutable })
    }
}

impl fmt::Display for GlobalType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.value_type, if self.mutable { "var" } else { "const" })
    }
}

#[derive(Debug)]
pub struct Global {
    pub global_type: GlobalType,
    pub init: Vec<Instruction>,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum ValueType {
    // Number types
    I32,
    I64,
    F32,
    F64,
    // Vector types
    V128,
    // Reference types
    FuncRef,
    ExternRef,
}

impl ValueType {
    pub fn decode(byte: u8) -> Result<Self, io::Error> {
        match byte {
            VALTYPE_I32 => Ok(ValueType::I32),
            VALTYPE_I64 => Ok(ValueType::I64),
            VALTYPE_F32 => Ok(ValueType::F32),
            VALTYPE_F64 => Ok(ValueType::F64),
            VALTYPE_V128 => Ok(ValueType::V128),
            VALTYPE_FUNCREF => Ok(ValueType::FuncRef),
            VALTYPE_EXTERNREF => Ok(ValueType::ExternRef),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("malformed value type: {:#04x}", byte),
            )),
        }
    }

    pub fn emit_byte(&self) -> u8 {
        match self {
            ValueType::I32 => VALTYPE_I32,
            ValueType::I64 => VALTYPE_I64,
            ValueType::F32 => VALTYPE_F32,
            ValueType::F64 => VALTYPE_F64,
            ValueType::V128 => VALTYPE_V128,
            ValueType::FuncRef => VALTYPE_FUNCREF,
            ValueType::ExternRef => VALTYPE_EXTERNREF,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ValueType::I32 => "i32",
                ValueType::I64 => "i64",
                ValueType::F32 => "f32",
                ValueType::F64 => "f64",
                ValueType::V128 => "v128",
                ValueType::FuncRef => "funcref",
                ValueType::ExternRef => "externref",
            }
        )
    }
}
