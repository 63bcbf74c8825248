//! WebAssembly module instance
//!
//! Index spaces are laid out as in the module: imports first, in declaration
//! order, then local definitions. Globals, memories and tables are shared
//! handles so that host objects observe writes made by running code.

use super::executor::Executor;
use super::{ImportObject, Memory, RuntimeError, Table, Value};
use crate::parser::instruction::{Instruction, InstructionKind};
use crate::parser::module::{ExternalKind, FunctionBody, FunctionType, GlobalType, Module};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, trace};

/// Host function implementation. Receives the declared signature of the
/// import it satisfies so it can convert its results.
pub type HostFunc = Rc<dyn Fn(&FunctionType, Vec<Value>) -> Result<Vec<Value>, RuntimeError>>;

pub type SharedGlobal = Rc<Cell<Value>>;

pub type SharedMemory = Rc<RefCell<Memory>>;

pub type SharedTable = Rc<RefCell<Table>>;

pub enum FunctionInstance {
    /// Function defined in this module; `code_idx` indexes the code section
    Wasm { code_idx: usize, func_type: FunctionType },
    /// Imported function provided by the host
    Host { func: HostFunc, func_type: FunctionType },
}

impl FunctionInstance {
    pub fn func_type(&self) -> &FunctionType {
        match self {
            FunctionInstance::Wasm { func_type, .. } | FunctionInstance::Host { func_type, .. } => func_type,
        }
    }
}

pub struct Instance {
    module: Arc<Module>,
    functions: Vec<FunctionInstance>,
    globals: Vec<(GlobalType, SharedGlobal)>,
    memories: Vec<SharedMemory>,
    tables: Vec<SharedTable>,
    depth: Cell<usize>,
}

impl Instance {
    /// Link `module` against `imports`, initialise its globals, memories and
    /// tables, and run the start function if there is one.
    pub fn new(module: Arc<Module>, imports: &ImportObject) -> Result<Self, RuntimeError> {
        let mut instance = Instance {
            module: module.clone(),
            functions: Vec::new(),
            globals: Vec::new(),
            memories: Vec::new(),
            tables: Vec::new(),
            depth: Cell::new(0),
        };

        instance.resolve_imports(imports)?;

        for (code_idx, function) in module.functions.iter().enumerate() {
            let func_type = module
                .types
                .get(function.ftype_index as usize)
                .ok_or(RuntimeError::FunctionIndexOutOfBounds(function.ftype_index))?
                .clone();
            instance
                .functions
                .push(FunctionInstance::Wasm { code_idx, func_type });
        }

        for limits in &module.memories {
            instance
                .memories
                .push(Rc::new(RefCell::new(Memory::from_limits(limits)?)));
        }

        for table_type in &module.tables {
            instance.tables.push(Rc::new(RefCell::new(Table::new(
                table_type.ref_type,
                table_type.limits,
            )?)));
        }

        for global in &module.globals {
            let value = instance.eval_const(&global.init)?;
            if value.typ() != global.global_type.value_type {
                return Err(RuntimeError::InvalidConstExpr(format!(
                    "initialiser produces {}, global is {}",
                    value.typ(),
                    global.global_type.value_type
                )));
            }
            instance
                .globals
                .push((global.global_type, Rc::new(Cell::new(value))));
        }

        debug!(
            module = %module.name,
            functions = instance.functions.len(),
            globals = instance.globals.len(),
            "instantiated module"
        );

        if let Some(start) = module.start {
            trace!(start, "running start function");
            instance.invoke(start, Vec::new())?;
        }

        Ok(instance)
    }

    fn resolve_imports(&mut self, imports: &ImportObject) -> Result<(), RuntimeError> {
        let module = self.module.clone();
        for import in &module.imports {
            let (m, n) = (import.module.as_str(), import.name.as_str());
            match &import.external_kind {
                ExternalKind::Function(type_idx) => {
                    let func_type = module
                        .types
                        .get(*type_idx as usize)
                        .ok_or(RuntimeError::FunctionIndexOutOfBounds(*type_idx))?
                        .clone();
                    let func = imports.get_function(m, n)?;
                    self.functions.push(FunctionInstance::Host { func, func_type });
                }
                ExternalKind::Global(global_type) => {
                    let global = imports.get_global(m, n, global_type)?;
                    self.globals.push((*global_type, global));
                }
                ExternalKind::Memory(limits) => self.memories.push(imports.get_memory(m, n, limits)?),
                ExternalKind::Table(table_type) => {
                    let table = imports.get_table(m, n, &table_type.limits)?;
                    if table.borrow().ref_type() != table_type.ref_type {
                        return Err(RuntimeError::IncompatibleImportType(format!("{}.{}", m, n)));
                    }
                    self.tables.push(table);
                }
            }
        }
        Ok(())
    }

    /// Evaluate a validated constant expression.
    fn eval_const(&self, expr: &[Instruction]) -> Result<Value, RuntimeError> {
        let first = expr
            .first()
            .ok_or_else(|| RuntimeError::InvalidConstExpr("empty".to_string()))?;
        if let Some(value) = Value::from_const(&first.kind) {
            return Ok(value);
        }
        match first.kind {
            InstructionKind::GlobalGet { global_idx } => self.global_value(global_idx),
            ref other => Err(RuntimeError::InvalidConstExpr(other.to_string())),
        }
    }

    /// Call the function at `func_idx` in the function index space.
    pub fn invoke(&self, func_idx: u32, args: Vec<Value>) -> Result<Vec<Value>, RuntimeError> {
        Executor::new(self).call(func_idx, args)
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn function(&self, func_idx: u32) -> Option<&FunctionInstance> {
        self.functions.get(func_idx as usize)
    }

    pub fn function_type(&self, func_idx: u32) -> Option<&FunctionType> {
        self.function(func_idx).map(FunctionInstance::func_type)
    }

    /// Nesting of calls currently executing on this instance.
    pub(crate) fn call_depth(&self) -> &Cell<usize> {
        &self.depth
    }

    pub(crate) fn body(&self, code_idx: usize) -> Option<&FunctionBody> {
        self.module.code.get(code_idx)
    }

    pub fn global(&self, global_idx: u32) -> Option<(GlobalType, SharedGlobal)> {
        self.globals
            .get(global_idx as usize)
            .map(|(global_type, global)| (*global_type, global.clone()))
    }

    pub fn global_value(&self, global_idx: u32) -> Result<Value, RuntimeError> {
        self.globals
            .get(global_idx as usize)
            .map(|(_, global)| global.get())
            .ok_or(RuntimeError::GlobalIndexOutOfBounds(global_idx))
    }

    pub fn set_global_value(&self, global_idx: u32, value: Value) -> Result<(), RuntimeError> {
        let (global_type, global) = self
            .globals
            .get(global_idx as usize)
            .ok_or(RuntimeError::GlobalIndexOutOfBounds(global_idx))?;
        if !global_type.mutable {
            return Err(RuntimeError::ImmutableGlobal(global_idx));
        }
        if value.typ() != global_type.value_type {
            return Err(RuntimeError::TypeMismatch {
                expected: global_type.value_type.to_string(),
                actual: value.typ().to_string(),
            });
        }
        global.set(value);
        Ok(())
    }

    pub fn memory(&self, memory_idx: u32) -> Option<SharedMemory> {
        self.memories.get(memory_idx as usize).cloned()
    }

    pub fn table(&self, table_idx: u32) -> Option<SharedTable> {
        self.tables.get(table_idx as usize).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::instruction::ByteRange;
    use crate::parser::module::{Function, Global, Import, Locals, ValueType};

    fn inst(kind: InstructionKind) -> Instruction {
        Instruction::new(kind, ByteRange { offset: 0, length: 0 })
    }

    fn i64_global(mutable: bool) -> GlobalType {
        GlobalType {
            value_type: ValueType::I64,
            mutable,
        }
    }

    #[test]
    fn test_imported_global_shared() {
        let mut module = Module::new("test");
        module.imports.push(Import {
            module: "mod".to_string(),
            name: "a".to_string(),
            external_kind: ExternalKind::Global(i64_global(false)),
        });
        // local global initialised from the import
        module.globals.push(Global {
            global_type: i64_global(true),
            init: vec![
                inst(InstructionKind::GlobalGet { global_idx: 0 }),
                inst(InstructionKind::End),
            ],
        });

        let cell = Rc::new(Cell::new(Value::I64(i64::MIN)));
        let mut imports = ImportObject::new();
        imports.add_global("mod", "a", i64_global(false), cell.clone());

        let instance = Instance::new(Arc::new(module), &imports).unwrap();
        assert_eq!(instance.global_value(1).unwrap(), Value::I64(i64::MIN));

        let (_, shared) = instance.global(0).unwrap();
        assert!(Rc::ptr_eq(&shared, &cell));

        assert!(matches!(
            instance.set_global_value(0, Value::I64(1)),
            Err(RuntimeError::ImmutableGlobal(0))
        ));
        instance.set_global_value(1, Value::I64(5)).unwrap();
        assert_eq!(instance.global_value(1).unwrap(), Value::I64(5));
    }

    #[test]
    fn test_missing_import_fails() {
        let mut module = Module::new("test");
        module.imports.push(Import {
            module: "a".to_string(),
            name: "a".to_string(),
            external_kind: ExternalKind::Function(0),
        });
        module.types.push(FunctionType {
            parameters: vec![],
            return_types: vec![],
        });
        assert!(matches!(
            Instance::new(Arc::new(module), &ImportObject::new()),
            Err(RuntimeError::UnknownImport(_))
        ));
    }

    #[test]
    fn test_start_calls_host_with_i64() {
        let mut module = Module::new("test");
        module.types.push(FunctionType {
            parameters: vec![ValueType::I64],
            return_types: vec![],
        });
        module.types.push(FunctionType {
            parameters: vec![],
            return_types: vec![],
        });
        module.imports.push(Import {
            module: "a".to_string(),
            name: "a".to_string(),
            external_kind: ExternalKind::Function(0),
        });
        module.functions.push(Function { ftype_index: 1 });
        module.code.push(FunctionBody {
            locals: Locals::default(),
            instructions: vec![
                inst(InstructionKind::I64Const { value: 1 }),
                inst(InstructionKind::Call { func_idx: 0 }),
                inst(InstructionKind::End),
            ],
        });
        module.start = Some(1);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let recorder = seen.clone();
        let mut imports = ImportObject::new();
        imports.add_function(
            "a",
            "a",
            Rc::new(move |_: &FunctionType, args: Vec<Value>| {
                recorder.borrow_mut().extend(args);
                Ok(vec![])
            }),
        );

        Instance::new(Arc::new(module), &imports).unwrap();
        assert_eq!(*seen.borrow(), vec![Value::I64(1)]);
    }
}
