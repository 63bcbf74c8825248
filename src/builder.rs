//! Programmatic module builder
//!
//! Assembles small binaries for tests and tooling. Index spaces follow the
//! binary format: imports must be added before local definitions of the same
//! kind, since returned indices count the imports declared so far.

use crate::parser::encoding::*;
use crate::parser::module::ValueType;

/// Constant initialiser for a builder global.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GlobalInit {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    /// `global.get` of an imported immutable global
    Global(u32),
}

impl GlobalInit {
    fn default_for(value_type: ValueType) -> GlobalInit {
        match value_type {
            ValueType::I64 => GlobalInit::I64(0),
            ValueType::F32 => GlobalInit::F32(0.0),
            ValueType::F64 => GlobalInit::F64(0.0),
            _ => GlobalInit::I32(0),
        }
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        match *self {
            GlobalInit::I32(v) => {
                buf.push(OP_I32_CONST);
                write_vs32(buf, v);
            }
            GlobalInit::I64(v) => {
                buf.push(OP_I64_CONST);
                write_vs64(buf, v);
            }
            GlobalInit::F32(v) => {
                buf.push(OP_F32_CONST);
                write_f32(buf, v);
            }
            GlobalInit::F64(v) => {
                buf.push(OP_F64_CONST);
                write_f64(buf, v);
            }
            GlobalInit::Global(idx) => {
                buf.push(OP_GLOBAL_GET);
                write_vu32(buf, idx);
            }
        }
        buf.push(OP_END);
    }
}

enum ImportDesc {
    Function(u32),
    Table { min: u32, max: Option<u32> },
    Memory { min: u32, max: Option<u32> },
    Global { value_type: ValueType, mutable: bool },
}

struct BuilderImport {
    module: String,
    name: String,
    desc: ImportDesc,
}

struct BuilderFunction {
    name: Option<String>,
    type_index: u32,
    locals: Vec<(u32, ValueType)>,
    body: Vec<u8>,
}

struct BuilderGlobal {
    value_type: ValueType,
    mutable: bool,
    init: GlobalInit,
}

struct BuilderMemory {
    min: u32,
    max: Option<u32>,
    exported: bool,
}

#[derive(Default)]
pub struct ModuleBuilder {
    types: Vec<(Vec<ValueType>, Vec<ValueType>)>,
    imports: Vec<BuilderImport>,
    functions: Vec<BuilderFunction>,
    table: Option<(u32, Option<u32>)>,
    memory: Option<BuilderMemory>,
    globals: Vec<BuilderGlobal>,
    exports: Vec<(String, u8, u32)>,
    start: Option<u32>,
}

fn write_limits(buf: &mut Vec<u8>, min: u32, max: Option<u32>) {
    match max {
        Some(max) => {
            buf.push(LIMITS_MIN_MAX);
            write_vu32(buf, min);
            write_vu32(buf, max);
        }
        None => {
            buf.push(LIMITS_MIN);
            write_vu32(buf, min);
        }
    }
}

/// Emit a vector section if it has any entries.
fn write_vec_section<T>(out: &mut Vec<u8>, id: u8, items: &[T], mut write_item: impl FnMut(&mut Vec<u8>, &T)) {
    if items.is_empty() {
        return;
    }
    let mut contents = Vec::new();
    write_vu32(&mut contents, items.len() as u32);
    for item in items {
        write_item(&mut contents, item);
    }
    write_section(out, id, &contents);
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn count_imports(&self, matches: impl Fn(&ImportDesc) -> bool) -> u32 {
        self.imports.iter().filter(|import| matches(&import.desc)).count() as u32
    }

    /// Add a signature and return its type index.
    pub fn add_type(&mut self, parameters: Vec<ValueType>, results: Vec<ValueType>) -> u32 {
        self.types.push((parameters, results));
        self.types.len() as u32 - 1
    }

    /// Import a function with signature `type_index`; returns its function index.
    pub fn add_import(&mut self, module: &str, name: &str, type_index: u32) -> u32 {
        let index = self.count_imports(|desc| matches!(desc, ImportDesc::Function(_)));
        self.push_import(module, name, ImportDesc::Function(type_index));
        index
    }

    /// Import a global; returns its global index.
    pub fn add_imported_global(&mut self, module: &str, name: &str, value_type: ValueType, mutable: bool) -> u32 {
        let index = self.count_imports(|desc| matches!(desc, ImportDesc::Global { .. }));
        self.push_import(module, name, ImportDesc::Global { value_type, mutable });
        index
    }

    pub fn add_imported_memory(&mut self, module: &str, name: &str, min: u32, max: Option<u32>) -> &mut Self {
        self.push_import(module, name, ImportDesc::Memory { min, max });
        self
    }

    pub fn add_imported_table(&mut self, module: &str, name: &str, min: u32, max: Option<u32>) -> &mut Self {
        self.push_import(module, name, ImportDesc::Table { min, max });
        self
    }

    fn push_import(&mut self, module: &str, name: &str, desc: ImportDesc) {
        self.imports.push(BuilderImport {
            module: module.to_string(),
            name: name.to_string(),
            desc,
        });
    }

    /// Declare a function with an empty body; returns its function index.
    pub fn add_function(&mut self, name: Option<&str>, type_index: u32) -> u32 {
        let index = self.count_imports(|desc| matches!(desc, ImportDesc::Function(_))) + self.functions.len() as u32;
        self.functions.push(BuilderFunction {
            name: name.map(str::to_string),
            type_index,
            locals: Vec::new(),
            body: Vec::new(),
        });
        index
    }

    /// Set the locals and instructions of a function. The closing `end` is
    /// appended.
    pub fn add_body(&mut self, func_idx: u32, locals: Vec<(u32, ValueType)>, body: &[u8]) -> &mut Self {
        let imported = self.count_imports(|desc| matches!(desc, ImportDesc::Function(_)));
        if let Some(function) = func_idx
            .checked_sub(imported)
            .and_then(|local| self.functions.get_mut(local as usize))
        {
            function.locals = locals;
            function.body = body.to_vec();
        }
        self
    }

    /// Export a function under the name it was declared with.
    pub fn export_func(&mut self, func_idx: u32) -> &mut Self {
        let imported = self.count_imports(|desc| matches!(desc, ImportDesc::Function(_)));
        let name = func_idx
            .checked_sub(imported)
            .and_then(|local| self.functions.get(local as usize))
            .and_then(|function| function.name.clone())
            .unwrap_or_else(|| func_idx.to_string());
        self.add_export_of_kind(&name, DESC_FUNC, func_idx)
    }

    /// Declare a global; returns its global index.
    pub fn add_global(&mut self, value_type: ValueType, mutable: bool, init: Option<GlobalInit>) -> u32 {
        let index = self.count_imports(|desc| matches!(desc, ImportDesc::Global { .. })) + self.globals.len() as u32;
        self.globals.push(BuilderGlobal {
            value_type,
            mutable,
            init: init.unwrap_or_else(|| GlobalInit::default_for(value_type)),
        });
        index
    }

    /// Define the module's funcref table.
    pub fn set_table_bounds(&mut self, min: u32, max: Option<u32>) -> &mut Self {
        self.table = Some((min, max));
        self
    }

    /// Define the module's memory. An exported memory is exported as
    /// `"memory"` after all other exports.
    pub fn add_memory(&mut self, min: u32, max: Option<u32>, exported: bool) -> &mut Self {
        self.memory = Some(BuilderMemory { min, max, exported });
        self
    }

    /// Export index `index` of the kind named by descriptor tag `kind`.
    pub fn add_export_of_kind(&mut self, name: &str, kind: u8, index: u32) -> &mut Self {
        self.exports.push((name.to_string(), kind, index));
        self
    }

    pub fn add_start(&mut self, func_idx: u32) -> &mut Self {
        self.start = Some(func_idx);
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC.to_le_bytes());
        out.extend_from_slice(&VERSION.to_le_bytes());

        write_vec_section(&mut out, SECTION_TYPE, &self.types, |buf, (parameters, results)| {
            buf.push(TYPE_FUNC);
            write_vu32(buf, parameters.len() as u32);
            buf.extend(parameters.iter().map(ValueType::emit_byte));
            write_vu32(buf, results.len() as u32);
            buf.extend(results.iter().map(ValueType::emit_byte));
        });

        write_vec_section(&mut out, SECTION_IMPORT, &self.imports, |buf, import| {
            write_name(buf, &import.module);
            write_name(buf, &import.name);
            match import.desc {
                ImportDesc::Function(type_index) => {
                    buf.push(DESC_FUNC);
                    write_vu32(buf, type_index);
                }
                ImportDesc::Table { min, max } => {
                    buf.push(DESC_TABLE);
                    buf.push(VALTYPE_FUNCREF);
                    write_limits(buf, min, max);
                }
                ImportDesc::Memory { min, max } => {
                    buf.push(DESC_MEMORY);
                    write_limits(buf, min, max);
                }
                ImportDesc::Global { value_type, mutable } => {
                    buf.push(DESC_GLOBAL);
                    buf.push(value_type.emit_byte());
                    buf.push(mutable as u8);
                }
            }
        });

        write_vec_section(&mut out, SECTION_FUNCTION, &self.functions, |buf, function| {
            write_vu32(buf, function.type_index);
        });

        if let Some((min, max)) = self.table {
            write_vec_section(&mut out, SECTION_TABLE, &[(min, max)], |buf, (min, max)| {
                buf.push(VALTYPE_FUNCREF);
                write_limits(buf, *min, *max);
            });
        }

        if let Some(memory) = &self.memory {
            write_vec_section(&mut out, SECTION_MEMORY, &[(memory.min, memory.max)], |buf, (min, max)| {
                write_limits(buf, *min, *max);
            });
        }

        write_vec_section(&mut out, SECTION_GLOBAL, &self.globals, |buf, global| {
            buf.push(global.value_type.emit_byte());
            buf.push(global.mutable as u8);
            global.init.encode(buf);
        });

        let mut exports = self.exports.clone();
        if matches!(&self.memory, Some(memory) if memory.exported) {
            exports.push(("memory".to_string(), DESC_MEMORY, 0));
        }
        write_vec_section(&mut out, SECTION_EXPORT, &exports, |buf, (name, kind, index)| {
            write_name(buf, name);
            buf.push(*kind);
            write_vu32(buf, *index);
        });

        if let Some(start) = self.start {
            let mut contents = Vec::new();
            write_vu32(&mut contents, start);
            write_section(&mut out, SECTION_START, &contents);
        }

        write_vec_section(&mut out, SECTION_CODE, &self.functions, |buf, function| {
            let mut body = Vec::new();
            write_vu32(&mut body, function.locals.len() as u32);
            for (count, value_type) in &function.locals {
                write_vu32(&mut body, *count);
                body.push(value_type.emit_byte());
            }
            body.extend_from_slice(&function.body);
            body.push(OP_END);
            write_vu32(buf, body.len() as u32);
            buf.extend_from_slice(&body);
        });

        out
    }
}
