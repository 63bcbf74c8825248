//! Host-facing instances
//!
//! Wraps [`runtime::Instance`] so that every value crossing between host and
//! module goes through the conversions in [`super::value`]. There are three
//! crossing points: global reads and writes, arguments passed to imported host
//! functions, and arguments and results of exported functions.

use super::value::{to_host_value, to_wasm_value};
use super::{HostError, HostValue, WasmModule};
use crate::parser::module::{ExportIndex, ExternalKind, FunctionType, GlobalType, Limits, RefType, ValueType};
use crate::runtime::{self, HostFunc, ImportObject, Memory, RuntimeError, SharedGlobal, SharedMemory, SharedTable, Table, Value};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, trace};

/// A host function that can satisfy a function import.
#[derive(Clone)]
pub struct HostFunction(Rc<dyn Fn(&[HostValue]) -> Result<HostValue, HostError>>);

impl HostFunction {
    pub fn new(func: impl Fn(&[HostValue]) -> Result<HostValue, HostError> + 'static) -> Self {
        HostFunction(Rc::new(func))
    }

    pub fn call(&self, args: &[HostValue]) -> Result<HostValue, HostError> {
        (self.0)(args)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "HostFunction")
    }
}

/// A global shared between the host and any instances that import or export it.
#[derive(Clone, Debug)]
pub struct GlobalObject {
    global_type: GlobalType,
    cell: SharedGlobal,
}

impl GlobalObject {
    pub fn new(value_type: ValueType, mutable: bool, initial: &HostValue) -> Result<Self, HostError> {
        let value = to_wasm_value(initial, value_type)?;
        Ok(GlobalObject {
            global_type: GlobalType { value_type, mutable },
            cell: Rc::new(Cell::new(value)),
        })
    }

    pub fn global_type(&self) -> GlobalType {
        self.global_type
    }

    pub fn value(&self) -> HostValue {
        to_host_value(self.cell.get())
    }

    pub fn set_value(&self, value: &HostValue) -> Result<(), HostError> {
        if !self.global_type.mutable {
            return Err(HostError::Immutable(format!(
                "cannot set the value of an immutable {} global",
                self.global_type.value_type
            )));
        }
        self.cell.set(to_wasm_value(value, self.global_type.value_type)?);
        Ok(())
    }

    /// Whether both objects refer to the same underlying global.
    pub fn same_as(&self, other: &GlobalObject) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

#[derive(Clone, Debug)]
pub struct MemoryObject {
    memory: SharedMemory,
}

impl MemoryObject {
    pub fn new(initial: u32, maximum: Option<u32>) -> Result<Self, HostError> {
        Ok(MemoryObject {
            memory: Rc::new(RefCell::new(Memory::new(initial, maximum)?)),
        })
    }

    /// Size in pages
    pub fn size(&self) -> u32 {
        self.memory.borrow().size()
    }

    /// Grow by `delta` pages, returning the previous size.
    pub fn grow(&self, delta: u32) -> Result<u32, HostError> {
        self.memory
            .borrow_mut()
            .grow(delta)
            .ok_or_else(|| HostError::RangeConversion(format!("cannot grow memory by {} pages", delta)))
    }
}

#[derive(Clone, Debug)]
pub struct TableObject {
    table: SharedTable,
}

impl TableObject {
    pub fn new(ref_type: RefType, initial: u32, maximum: Option<u32>) -> Result<Self, HostError> {
        let limits = Limits {
            min: initial,
            max: maximum,
        };
        Ok(TableObject {
            table: Rc::new(RefCell::new(Table::new(ref_type, limits)?)),
        })
    }

    pub fn size(&self) -> u32 {
        self.table.borrow().size()
    }

    pub fn grow(&self, delta: u32) -> Result<u32, HostError> {
        self.table
            .borrow_mut()
            .grow(delta)
            .ok_or_else(|| HostError::RangeConversion(format!("cannot grow table by {} elements", delta)))
    }
}

/// A value supplied for one import.
#[derive(Clone, Debug)]
pub enum Extern {
    /// A plain host value; only satisfies an immutable global import
    Value(HostValue),
    Function(HostFunction),
    Global(GlobalObject),
    Memory(MemoryObject),
    Table(TableObject),
}

impl Extern {
    fn describe(&self) -> &'static str {
        match self {
            Extern::Value(_) => "value",
            Extern::Function(_) => "function",
            Extern::Global(_) => "global",
            Extern::Memory(_) => "memory",
            Extern::Table(_) => "table",
        }
    }
}

/// Values for a module's imports, keyed by the two-level `(module, name)`
/// namespace.
#[derive(Clone, Debug, Default)]
pub struct Imports {
    entries: HashMap<(String, String), Extern>,
}

impl Imports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, module: impl Into<String>, name: impl Into<String>, value: Extern) -> &mut Self {
        self.entries.insert((module.into(), name.into()), value);
        self
    }

    pub fn get(&self, module: &str, name: &str) -> Option<&Extern> {
        self.entries.get(&(module.to_string(), name.to_string()))
    }
}

fn boxed(e: HostError) -> RuntimeError {
    RuntimeError::HostFunction(Box::new(e))
}

/// Adapt a host function to the runtime's calling convention. Arguments go
/// native → host; the result goes host → native by the import's signature.
fn wrap_host_function(func: HostFunction) -> HostFunc {
    Rc::new(move |func_type: &FunctionType, args: Vec<Value>| {
        let host_args: Vec<HostValue> = args.into_iter().map(to_host_value).collect();
        trace!(args = host_args.len(), "dispatching to host function");
        let result = func.call(&host_args).map_err(boxed)?;
        match func_type.return_types.as_slice() {
            [] => Ok(Vec::new()),
            [single] => Ok(vec![to_wasm_value(&result, *single).map_err(boxed)?]),
            many => match result {
                HostValue::Array(items) if items.len() == many.len() => items
                    .iter()
                    .zip(many)
                    .map(|(item, value_type)| to_wasm_value(item, *value_type).map_err(boxed))
                    .collect(),
                other => Err(boxed(HostError::TypeConversion(format!(
                    "expected an array of {} results, got {}",
                    many.len(),
                    other.type_name()
                )))),
            },
        }
    })
}

fn kind_name(kind: &ExternalKind) -> &'static str {
    match kind {
        ExternalKind::Function(_) => "function",
        ExternalKind::Table(_) => "table",
        ExternalKind::Memory(_) => "memory",
        ExternalKind::Global(_) => "global",
    }
}

/// Translate host import values into the runtime's import object.
fn link(module: &WasmModule, imports: &Imports) -> Result<ImportObject, HostError> {
    let mut object = ImportObject::new();
    for import in &module.parsed().imports {
        let (m, n) = (import.module.as_str(), import.name.as_str());
        let supplied = imports
            .get(m, n)
            .ok_or_else(|| HostError::Link(format!("import {}.{} is not provided", m, n)))?;

        match (&import.external_kind, supplied) {
            (ExternalKind::Function(_), Extern::Function(func)) => {
                object.add_function(m, n, wrap_host_function(func.clone()));
            }
            (ExternalKind::Global(_), Extern::Global(global)) => {
                object.add_global(m, n, global.global_type, global.cell.clone());
            }
            (ExternalKind::Global(global_type), Extern::Value(value)) => {
                if global_type.mutable {
                    return Err(HostError::Link(format!(
                        "import {}.{}: a mutable global needs a global object",
                        m, n
                    )));
                }
                let value = to_wasm_value(value, global_type.value_type)?;
                object.add_global(m, n, *global_type, Rc::new(Cell::new(value)));
            }
            (ExternalKind::Memory(_), Extern::Memory(memory)) => object.add_memory(m, n, memory.memory.clone()),
            (ExternalKind::Table(_), Extern::Table(table)) => object.add_table(m, n, table.table.clone()),
            (kind, other) => {
                return Err(HostError::Link(format!(
                    "import {}.{}: expected {}, got {}",
                    m,
                    n,
                    kind_name(kind),
                    other.describe()
                )))
            }
        }
    }
    Ok(object)
}

/// An instantiated module seen from the host.
pub struct Instance {
    module: Arc<WasmModule>,
    inner: Rc<runtime::Instance>,
}

/// One export of an [`Instance`].
#[derive(Clone, Debug)]
pub enum Export {
    Function(ExportedFunction),
    Global(GlobalObject),
    Memory(MemoryObject),
    Table(TableObject),
}

impl Instance {
    /// Link `module` against `imports` and instantiate it, running its start
    /// function.
    pub fn new(module: &Arc<WasmModule>, imports: &Imports) -> Result<Instance, HostError> {
        let object = link(module, imports)?;
        let inner = runtime::Instance::new(module.parsed().clone(), &object)?;
        debug!(module = %module.parsed().name, "instance ready");
        Ok(Instance {
            module: module.clone(),
            inner: Rc::new(inner),
        })
    }

    pub fn module(&self) -> &Arc<WasmModule> {
        &self.module
    }

    /// All exports in declaration order.
    pub fn exports(&self) -> Vec<(String, Export)> {
        self.module
            .parsed()
            .exports
            .iter()
            .filter_map(|export| Some((export.name.clone(), self.resolve(&export.index)?)))
            .collect()
    }

    pub fn export(&self, name: &str) -> Option<Export> {
        let export = self.module.parsed().exports.iter().find(|export| export.name == name)?;
        self.resolve(&export.index)
    }

    fn resolve(&self, index: &ExportIndex) -> Option<Export> {
        Some(match *index {
            ExportIndex::Function(func_idx) => Export::Function(ExportedFunction {
                instance: self.inner.clone(),
                func_idx,
                func_type: self.inner.function_type(func_idx)?.clone(),
            }),
            ExportIndex::Global(global_idx) => {
                let (global_type, cell) = self.inner.global(global_idx)?;
                Export::Global(GlobalObject { global_type, cell })
            }
            ExportIndex::Memory(memory_idx) => Export::Memory(MemoryObject {
                memory: self.inner.memory(memory_idx)?,
            }),
            ExportIndex::Table(table_idx) => Export::Table(TableObject {
                table: self.inner.table(table_idx)?,
            }),
        })
    }
}

/// An exported function, callable with host values.
#[derive(Clone)]
pub struct ExportedFunction {
    instance: Rc<runtime::Instance>,
    func_idx: u32,
    func_type: FunctionType,
}

impl fmt::Debug for ExportedFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ExportedFunction({} {})", self.func_idx, self.func_type)
    }
}

impl ExportedFunction {
    pub fn func_type(&self) -> &FunctionType {
        &self.func_type
    }

    /// Missing arguments are `undefined`; extra ones are ignored. No results
    /// give `undefined`, one gives the value and several give an array.
    pub fn call(&self, args: &[HostValue]) -> Result<HostValue, HostError> {
        let undefined = HostValue::Undefined;
        let values = self
            .func_type
            .parameters
            .iter()
            .enumerate()
            .map(|(i, value_type)| to_wasm_value(args.get(i).unwrap_or(&undefined), *value_type))
            .collect::<Result<Vec<_>, _>>()?;

        trace!(func_idx = self.func_idx, "calling exported function");
        let mut results = self.instance.invoke(self.func_idx, values)?;
        Ok(match results.len() {
            0 => HostValue::Undefined,
            1 => to_host_value(results.remove(0)),
            _ => HostValue::Array(results.into_iter().map(to_host_value).collect()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ModuleBuilder;
    use crate::parser::encoding::OP_CALL;

    #[test]
    fn test_global_object() {
        let global = GlobalObject::new(ValueType::I64, true, &HostValue::bigint(3)).unwrap();
        assert_eq!(global.value(), HostValue::bigint(3));
        global.set_value(&HostValue::from("-4")).unwrap();
        assert_eq!(global.value(), HostValue::bigint(-4));
        assert!(matches!(
            global.set_value(&HostValue::from(1.0)),
            Err(HostError::TypeConversion(_))
        ));

        let fixed = GlobalObject::new(ValueType::I32, false, &HostValue::from(1.0)).unwrap();
        assert!(matches!(
            fixed.set_value(&HostValue::from(2.0)),
            Err(HostError::Immutable(_))
        ));
        assert_eq!(fixed.value(), HostValue::Number(1.0));
    }

    #[test]
    fn test_memory_and_table_objects() {
        let memory = MemoryObject::new(0, Some(1)).unwrap();
        assert_eq!(memory.grow(1).unwrap(), 0);
        assert!(memory.grow(1).is_err());
        assert_eq!(memory.size(), 1);

        let table = TableObject::new(RefType::FuncRef, 1, None).unwrap();
        assert_eq!(table.grow(2).unwrap(), 1);
        assert_eq!(table.size(), 3);
    }

    #[test]
    fn test_missing_and_mismatched_imports() {
        let mut builder = ModuleBuilder::new();
        builder.add_imported_global("m", "g", ValueType::I32, false);
        let module = WasmModule::new(&builder.to_bytes()).unwrap();

        assert!(matches!(Instance::new(&module, &Imports::new()), Err(HostError::Link(_))));

        let mut imports = Imports::new();
        imports.insert("m", "g", Extern::Function(HostFunction::new(|_| Ok(HostValue::Undefined))));
        assert!(matches!(Instance::new(&module, &imports), Err(HostError::Link(_))));

        let mut imports = Imports::new();
        imports.insert("m", "g", Extern::Value(HostValue::from(42.0)));
        assert!(Instance::new(&module, &imports).is_ok());
    }

    #[test]
    fn test_mutable_global_needs_object() {
        let mut builder = ModuleBuilder::new();
        builder.add_imported_global("m", "g", ValueType::I64, true);
        let module = WasmModule::new(&builder.to_bytes()).unwrap();

        let mut imports = Imports::new();
        imports.insert("m", "g", Extern::Value(HostValue::bigint(1)));
        assert!(matches!(Instance::new(&module, &imports), Err(HostError::Link(_))));

        let global = GlobalObject::new(ValueType::I64, true, &HostValue::bigint(1)).unwrap();
        let mut imports = Imports::new();
        imports.insert("m", "g", Extern::Global(global));
        assert!(Instance::new(&module, &imports).is_ok());
    }

    #[test]
    fn test_exported_function_results() {
        let mut builder = ModuleBuilder::new();
        let sig = builder.add_type(vec![ValueType::I32], vec![ValueType::I32]);
        let id = builder.add_function(Some("id"), sig);
        builder.add_body(id, vec![], &[0x20, 0x00]).export_func(id);
        let module = WasmModule::new(&builder.to_bytes()).unwrap();
        let instance = Instance::new(&module, &Imports::new()).unwrap();

        let Some(Export::Function(id)) = instance.export("id") else {
            panic!("missing export");
        };
        assert_eq!(id.call(&[HostValue::from(5.0)]).unwrap(), HostValue::Number(5.0));
        assert_eq!(id.call(&[HostValue::from("7")]).unwrap(), HostValue::Number(7.0));
        // undefined → NaN → 0
        assert_eq!(id.call(&[]).unwrap(), HostValue::Number(0.0));
    }

    #[test]
    fn test_reentry_through_host_function_is_bounded() {
        // each level nests several frames; keep clear of the default test stack
        let runner = std::thread::Builder::new().stack_size(64 << 20).spawn(|| {
            let mut builder = ModuleBuilder::new();
            let v_v = builder.add_type(vec![], vec![]);
            let again = builder.add_import("env", "again", v_v);
            let f = builder.add_function(Some("f"), v_v);
            builder.add_body(f, vec![], &[OP_CALL, again as u8]).export_func(f);
            let module = WasmModule::new(&builder.to_bytes()).unwrap();

            let slot: Rc<RefCell<Option<ExportedFunction>>> = Rc::new(RefCell::new(None));
            let target = slot.clone();
            let mut imports = Imports::new();
            imports.insert(
                "env",
                "again",
                Extern::Function(HostFunction::new(move |_| {
                    let f = target
                        .borrow()
                        .clone()
                        .ok_or_else(|| HostError::Link("export not bound yet".to_string()))?;
                    f.call(&[])
                })),
            );
            let instance = Instance::new(&module, &imports).unwrap();
            let Some(Export::Function(f)) = instance.export("f") else {
                panic!("expected function export");
            };
            *slot.borrow_mut() = Some(f.clone());

            assert!(matches!(
                f.call(&[]),
                Err(HostError::Runtime(RuntimeError::CallStackOverflow))
            ));
            assert_eq!(instance.inner.call_depth().get(), 0);
            slot.borrow_mut().take();
        });
        runner.unwrap().join().unwrap();
    }
}
