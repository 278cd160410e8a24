#![no_main]

use std::sync::{Arc, OnceLock};

use formula_expr::{HostError, Object, Parser, Type, TypeBuilder, TypeRegistry, Value};
use libfuzzer_sys::fuzz_target;

/// Keep evaluation fuzzing bounded; string members can grow values quickly.
const MAX_INPUT_BYTES: usize = 2_048;

struct Sheet {
    cells: Vec<f64>,
    title: String,
}

fn registry() -> Arc<TypeRegistry> {
    static REGISTRY: OnceLock<Arc<TypeRegistry>> = OnceLock::new();
    REGISTRY
        .get_or_init(|| {
            let mut registry = TypeRegistry::with_builtins();
            registry.insert(
                TypeBuilder::<Sheet>::new("Fuzz.Sheet")
                    .property("Title", Type::Text, |s| Value::from(s.title.as_str()))
                    .field("Size", Type::Int, |s| Value::from(s.cells.len() as i32))
                    .method("Sum", &[], Type::Double, |s, _| {
                        Ok(Value::from(s.cells.iter().sum::<f64>()))
                    })
                    .indexer(&[Type::Int], Type::Double, |s, args| {
                        let idx = args[0].as_int().unwrap_or(-1);
                        usize::try_from(idx)
                            .ok()
                            .and_then(|i| s.cells.get(i))
                            .map(|v| Value::from(*v))
                            .ok_or_else(|| HostError::new("cell out of range"))
                    })
                    .build(),
            );
            Arc::new(registry)
        })
        .clone()
}

fuzz_target!(|data: &[u8]| {
    let data = &data[..data.len().min(MAX_INPUT_BYTES)];
    let formula = String::from_utf8_lossy(data);

    let sheet = Object::new(
        "Fuzz.Sheet",
        Sheet {
            cells: vec![1.0, -2.5, 1e300, f64::NAN],
            title: "Fuzz".to_string(),
        },
    );
    let mut parser = Parser::new(registry()).with_context(sheet);
    if let Ok(compiled) = parser.compile(&formula) {
        if let Ok(value) = compiled.evaluate() {
            assert_eq!(value.ty(), *compiled.result_type());
        }
    }
});
