#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use formula_expr::{HostError, Object, Type, TypeBuilder, TypeInfo, TypeRegistry, Value};

pub struct Library {
    pub name: String,
    pub count: i32,
    pub inner: Object,
    pub items: Object,
    pub calls: Mutex<i32>,
}

pub struct Inner {
    pub b: i32,
}

pub struct Items(pub Vec<i32>);

pub fn library(name: &str, count: i32) -> Object {
    Object::new(
        "Test.Library",
        Library {
            name: name.to_string(),
            count,
            inner: Object::new("Test.Inner", Inner { b: count * 10 }),
            items: Object::new("Test.Items", Items(vec![10, 20, 30])),
            calls: Mutex::new(0),
        },
    )
}

fn library_type() -> TypeInfo {
    TypeBuilder::<Library>::new("Test.Library")
        .property("Name", Type::Text, |l| Value::from(l.name.as_str()))
        .field("Count", Type::Int, |l| Value::from(l.count))
        .property("Inner", Type::object("Test.Inner"), |l| {
            Value::from(l.inner.clone())
        })
        .property("Items", Type::object("Test.Items"), |l| {
            Value::from(l.items.clone())
        })
        .method("Scale", &[Type::Int], Type::Int, |l, args| {
            Ok(Value::from(l.count * args[0].as_int().unwrap_or_default()))
        })
        .method("Scale", &[Type::Double], Type::Double, |l, args| {
            Ok(Value::from(
                f64::from(l.count) * args[0].as_double().unwrap_or_default(),
            ))
        })
        .method("Greet", &[], Type::Text, |l, _| {
            Ok(Value::from(format!("hello {}", l.name)))
        })
        .method("Next", &[], Type::Int, |l, _| {
            let mut calls = l
                .calls
                .lock()
                .map_err(|_| HostError::new("call counter poisoned"))?;
            *calls += 1;
            Ok(Value::from(*calls))
        })
        .method("Fail", &[], Type::Int, |_, _| Err(HostError::new("boom")))
        .method("Nothing", &[], Type::Void, |_, _| Ok(Value::Unit))
        .indexer(&[Type::Int], Type::Int, |l, args| {
            Ok(Value::from(l.count + args[0].as_int().unwrap_or_default()))
        })
        .indexer(&[Type::Text], Type::Text, |l, args| {
            Ok(Value::from(format!(
                "{}:{}",
                l.name,
                args[0].as_str().unwrap_or_default()
            )))
        })
        .build()
}

fn inner_type() -> TypeInfo {
    TypeBuilder::<Inner>::new("Test.Inner")
        .property("B", Type::Int, |i| Value::from(i.b))
        .method("Twice", &[Type::Int], Type::Int, |_, args| {
            Ok(Value::from(2 * args[0].as_int().unwrap_or_default()))
        })
        .build()
}

fn items_type() -> TypeInfo {
    TypeBuilder::<Items>::new("Test.Items")
        .property("Count", Type::Int, |items| Value::from(items.0.len() as i32))
        .indexer(&[Type::Int], Type::Int, |items, args| {
            let idx = args[0].as_int().unwrap_or_default();
            usize::try_from(idx)
                .ok()
                .and_then(|i| items.0.get(i))
                .map(|v| Value::from(*v))
                .ok_or_else(|| HostError::new(format!("index {idx} is out of range")))
        })
        .build()
}

/// `Test` and `Test.Units` overlap so qualified lookups can check that the longest type prefix
/// wins.
fn unit_types() -> [TypeInfo; 2] {
    [
        TypeInfo::new("Test").static_field("Units", Type::Int, Value::from(7)),
        TypeInfo::new("Test.Units")
            .static_field("Meter", Type::Double, Value::from(1.0))
            .static_method("Convert", &[Type::Double], Type::Double, |args| {
                Ok(Value::from(args[0].as_double().unwrap_or_default() * 100.0))
            }),
    ]
}

pub fn registry() -> Arc<TypeRegistry> {
    let mut registry = TypeRegistry::with_builtins();
    registry.register(library_type()).unwrap();
    registry.register(inner_type()).unwrap();
    registry.register(items_type()).unwrap();
    for info in unit_types() {
        registry.register(info).unwrap();
    }
    Arc::new(registry)
}
