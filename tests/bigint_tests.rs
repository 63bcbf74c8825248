#[cfg(test)]
mod tests {
    use num_bigint::BigInt;
    use num_traits::One;
    use rand::Rng;
    use rstest::rstest;
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasmhost::builder::ModuleBuilder;
    use wasmhost::host::{
        to_host64, to_native64, Export, ExportedFunction, Extern, GlobalObject, HostError, HostFunction, HostValue,
        Imports, Instance, WasmModule,
    };
    use wasmhost::parser::encoding::{DESC_GLOBAL, OP_CALL, OP_I64_CONST, OP_LOCAL_GET};
    use wasmhost::parser::module::ValueType;

    fn two_pow(bits: u32) -> BigInt {
        BigInt::one() << bits
    }

    /// Exported `f: (i64) -> i64` returning its argument.
    fn identity() -> ExportedFunction {
        let mut builder = ModuleBuilder::new();
        let l_l = builder.add_type(vec![ValueType::I64], vec![ValueType::I64]);
        let f = builder.add_function(Some("f"), l_l);
        builder.add_body(f, vec![], &[OP_LOCAL_GET, 0]).export_func(f);

        let module = WasmModule::new(&builder.to_bytes()).unwrap();
        let instance = Instance::new(&module, &Imports::new()).unwrap();
        match instance.export("f") {
            Some(Export::Function(f)) => f,
            other => panic!("expected function export, got {:?}", other),
        }
    }

    #[rstest]
    #[case(HostValue::bigint(0), HostValue::bigint(0))]
    #[case(HostValue::bigint(-0), HostValue::bigint(0))]
    #[case(HostValue::bigint(123), HostValue::bigint(123))]
    #[case(HostValue::bigint(-123), HostValue::bigint(-123))]
    #[case(HostValue::from("5"), HostValue::bigint(5))]
    #[case(HostValue::from("0x10"), HostValue::bigint(16))]
    #[case(HostValue::BigInt(two_pow(63)), HostValue::bigint(i64::MIN))]
    #[case(HostValue::bigint(u64::MAX), HostValue::bigint(-1))]
    fn test_exported_function_i64(#[case] argument: HostValue, #[case] expected: HostValue) {
        assert_eq!(identity().call(&[argument]).unwrap(), expected);
    }

    #[rstest]
    #[case(HostValue::Number(5.0))]
    #[case(HostValue::Boolean(true))]
    #[case(HostValue::Undefined)]
    #[case(HostValue::Null)]
    #[case(HostValue::Symbol(Some("s".to_string())))]
    #[case(HostValue::from("five"))]
    fn test_exported_function_rejects_non_bigint(#[case] argument: HostValue) {
        assert!(matches!(identity().call(&[argument]), Err(HostError::TypeConversion(_))));
    }

    #[test]
    fn test_exported_function_missing_argument() {
        assert!(matches!(identity().call(&[]), Err(HostError::TypeConversion(_))));
    }

    #[test]
    fn test_exported_function_out_of_range() {
        let f = identity();
        assert!(matches!(
            f.call(&[HostValue::BigInt(two_pow(64))]),
            Err(HostError::RangeConversion(_))
        ));
        assert!(matches!(
            f.call(&[HostValue::BigInt(-two_pow(63) - 1)]),
            Err(HostError::RangeConversion(_))
        ));
    }

    #[test]
    fn test_reexported_globals() {
        let mut builder = ModuleBuilder::new();
        let a = builder.add_imported_global("mod", "a", ValueType::I64, false);
        let b = builder.add_imported_global("mod", "b", ValueType::I64, false);
        builder
            .add_export_of_kind("a", DESC_GLOBAL, a)
            .add_export_of_kind("b", DESC_GLOBAL, b);
        let module = WasmModule::new(&builder.to_bytes()).unwrap();

        let mut imports = Imports::new();
        imports
            .insert("mod", "a", Extern::Value(HostValue::bigint(1)))
            .insert("mod", "b", Extern::Value(HostValue::BigInt(two_pow(63))));
        let instance = Instance::new(&module, &imports).unwrap();

        let values: Vec<HostValue> = instance
            .exports()
            .into_iter()
            .map(|(_, export)| match export {
                Export::Global(global) => global.value(),
                other => panic!("expected global export, got {:?}", other),
            })
            .collect();
        assert_eq!(values, vec![HostValue::bigint(1), HostValue::BigInt(-two_pow(63))]);
    }

    #[test]
    fn test_reexported_global_object_is_shared() {
        let mut builder = ModuleBuilder::new();
        let g = builder.add_imported_global("mod", "g", ValueType::I64, true);
        builder.add_export_of_kind("g", DESC_GLOBAL, g);
        let module = WasmModule::new(&builder.to_bytes()).unwrap();

        let global = GlobalObject::new(ValueType::I64, true, &HostValue::bigint(1)).unwrap();
        let mut imports = Imports::new();
        imports.insert("mod", "g", Extern::Global(global.clone()));
        let instance = Instance::new(&module, &imports).unwrap();

        let Some(Export::Global(exported)) = instance.export("g") else {
            panic!("expected global export");
        };
        assert!(exported.same_as(&global));
        exported.set_value(&HostValue::BigInt(two_pow(64) - 1)).unwrap();
        assert_eq!(global.value(), HostValue::bigint(-1));
    }

    #[test]
    fn test_host_function_receives_bigint() {
        let mut builder = ModuleBuilder::new();
        let v_l = builder.add_type(vec![ValueType::I64], vec![]);
        let v_v = builder.add_type(vec![], vec![]);
        let import = builder.add_import("a", "a", v_l);
        let start = builder.add_function(None, v_v);
        builder.add_body(start, vec![], &[OP_I64_CONST, 0x01, OP_CALL, import as u8]);
        builder.add_start(start);
        let module = WasmModule::new(&builder.to_bytes()).unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let recorder = seen.clone();
        let mut imports = Imports::new();
        imports.insert(
            "a",
            "a",
            Extern::Function(HostFunction::new(move |args| {
                recorder.borrow_mut().extend_from_slice(args);
                Ok(HostValue::Undefined)
            })),
        );
        Instance::new(&module, &imports).unwrap();

        assert_eq!(*seen.borrow(), vec![HostValue::bigint(1)]);
    }

    #[test]
    fn test_host_function_error_propagates() {
        let mut builder = ModuleBuilder::new();
        let l_l = builder.add_type(vec![ValueType::I64], vec![ValueType::I64]);
        let import = builder.add_import("env", "echo", l_l);
        let f = builder.add_function(Some("f"), l_l);
        builder
            .add_body(f, vec![], &[OP_LOCAL_GET, 0, OP_CALL, import as u8])
            .export_func(f);
        let module = WasmModule::new(&builder.to_bytes()).unwrap();

        // returns a host number where a 64-bit result is declared
        let mut imports = Imports::new();
        imports.insert(
            "env",
            "echo",
            Extern::Function(HostFunction::new(|_| Ok(HostValue::Number(1.0)))),
        );
        let instance = Instance::new(&module, &imports).unwrap();
        let Some(Export::Function(f)) = instance.export("f") else {
            panic!("expected function export");
        };
        assert!(matches!(
            f.call(&[HostValue::bigint(1)]),
            Err(HostError::TypeConversion(_))
        ));
    }

    #[test]
    fn test_random_round_trip() {
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let value = rng.gen::<i64>();
            assert_eq!(to_native64(&to_host64(value)).unwrap(), value);

            let unsigned = rng.gen::<u64>();
            assert_eq!(to_native64(&HostValue::bigint(unsigned)).unwrap(), unsigned as i64);
        }
    }

    #[test]
    fn test_random_through_exported_function() {
        let f = identity();
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let value = rng.gen::<i64>();
            assert_eq!(f.call(&[HostValue::from(value.to_string().as_str())]).unwrap(), HostValue::bigint(value));
        }
    }
}
