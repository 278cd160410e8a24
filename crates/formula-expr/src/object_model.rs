//! Named capability sets that formulas bind against.
//!
//! Every type a formula can touch (the context object, the values its members return, and any
//! type referenced by a qualified name) is described once by a [`TypeInfo`] and stored in a
//! [`TypeRegistry`]. The binder only ever looks names up here, so resolving `Order.Total` costs a
//! couple of hash lookups instead of any per-call introspection.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::error::{HostError, RegistryError};
use crate::value::{Type, Value};

pub(crate) type Getter = Arc<dyn Fn(&Value) -> Result<Value, HostError> + Send + Sync>;
pub(crate) type Invoker = Arc<dyn Fn(&Value, &[Value]) -> Result<Value, HostError> + Send + Sync>;

/// Parameter types of a method or indexer.
pub type Signature = SmallVec<[Type; 4]>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberKind {
    Property,
    Field,
}

/// A readable property or field.
pub struct Member {
    name: String,
    kind: MemberKind,
    ty: Type,
    is_static: bool,
    get: Getter,
}

impl Member {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Read the member. Static members ignore `receiver`.
    pub fn get(&self, receiver: &Value) -> Result<Value, HostError> {
        (self.get)(receiver)
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("ty", &self.ty)
            .field("is_static", &self.is_static)
            .finish_non_exhaustive()
    }
}

/// One overload of a named method.
pub struct Method {
    name: String,
    params: Signature,
    ret: Type,
    is_static: bool,
    invoke: Invoker,
}

impl Method {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Type] {
        &self.params
    }

    pub fn ret(&self) -> &Type {
        &self.ret
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn invoke(&self, receiver: &Value, args: &[Value]) -> Result<Value, HostError> {
        (self.invoke)(receiver, args)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("ret", &self.ret)
            .field("is_static", &self.is_static)
            .finish_non_exhaustive()
    }
}

/// A parameterized `receiver[...]` accessor.
pub struct Indexer {
    params: Signature,
    ret: Type,
    get: Invoker,
}

impl Indexer {
    pub fn params(&self) -> &[Type] {
        &self.params
    }

    pub fn ret(&self) -> &Type {
        &self.ret
    }

    pub fn get(&self, receiver: &Value, index: &[Value]) -> Result<Value, HostError> {
        (self.get)(receiver, index)
    }
}

impl fmt::Debug for Indexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Indexer")
            .field("params", &self.params)
            .field("ret", &self.ret)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct MemberTable {
    properties: AHashMap<String, Arc<Member>>,
    fields: AHashMap<String, Arc<Member>>,
    methods: AHashMap<String, Vec<Arc<Method>>>,
}

impl MemberTable {
    fn member(&self, name: &str) -> Option<&Arc<Member>> {
        self.properties.get(name).or_else(|| self.fields.get(name))
    }

    fn method(&self, name: &str, args: &[Type]) -> Option<&Arc<Method>> {
        self.methods
            .get(name)?
            .iter()
            .find(|m| m.params.as_slice() == args)
    }
}

/// Everything a formula may reach through one named type.
pub struct TypeInfo {
    name: String,
    instance: MemberTable,
    statics: MemberTable,
    indexers: Vec<Arc<Indexer>>,
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl TypeInfo {
    /// An empty type. Use [`TypeBuilder`] for host types backed by a Rust struct.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instance: MemberTable::default(),
            statics: MemberTable::default(),
            indexers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instance property, falling back to an instance field of the same name.
    pub fn find_member(&self, name: &str) -> Option<&Arc<Member>> {
        self.instance.member(name)
    }

    /// Static property, falling back to a static field of the same name.
    pub fn find_static_member(&self, name: &str) -> Option<&Arc<Member>> {
        self.statics.member(name)
    }

    /// Instance overload whose parameter types are exactly `args`.
    pub fn find_method(&self, name: &str, args: &[Type]) -> Option<&Arc<Method>> {
        self.instance.method(name, args)
    }

    /// Static overload whose parameter types are exactly `args`.
    pub fn find_static_method(&self, name: &str, args: &[Type]) -> Option<&Arc<Method>> {
        self.statics.method(name, args)
    }

    pub fn has_method(&self, name: &str, is_static: bool) -> bool {
        let table = if is_static {
            &self.statics
        } else {
            &self.instance
        };
        table.methods.contains_key(name)
    }

    /// Indexer whose parameter types are exactly `args`.
    pub fn find_indexer(&self, args: &[Type]) -> Option<&Arc<Indexer>> {
        self.indexers.iter().find(|ix| ix.params.as_slice() == args)
    }

    pub(crate) fn add_member(
        &mut self,
        name: impl Into<String>,
        kind: MemberKind,
        is_static: bool,
        ty: Type,
        get: Getter,
    ) {
        let name = name.into();
        let member = Arc::new(Member {
            name: name.clone(),
            kind,
            ty,
            is_static,
            get,
        });
        let table = if is_static {
            &mut self.statics
        } else {
            &mut self.instance
        };
        let map = match kind {
            MemberKind::Property => &mut table.properties,
            MemberKind::Field => &mut table.fields,
        };
        map.insert(name, member);
    }

    pub(crate) fn add_method(
        &mut self,
        name: impl Into<String>,
        is_static: bool,
        params: Signature,
        ret: Type,
        invoke: Invoker,
    ) {
        let name = name.into();
        let table = if is_static {
            &mut self.statics
        } else {
            &mut self.instance
        };
        let overloads = table.methods.entry(name.clone()).or_default();
        // Re-registering an identical signature replaces the previous body.
        overloads.retain(|m| m.params != params);
        overloads.push(Arc::new(Method {
            name,
            params,
            ret,
            is_static,
            invoke,
        }));
    }

    pub(crate) fn add_indexer(&mut self, params: Signature, ret: Type, get: Invoker) {
        self.indexers.retain(|ix| ix.params != params);
        self.indexers.push(Arc::new(Indexer { params, ret, get }));
    }

    /// Register a static property.
    pub fn static_property<F>(mut self, name: impl Into<String>, ty: Type, get: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.add_member(
            name,
            MemberKind::Property,
            true,
            ty,
            Arc::new(move |_: &Value| -> Result<Value, HostError> { Ok(get()) }),
        );
        self
    }

    /// Register a static field.
    pub fn static_field(mut self, name: impl Into<String>, ty: Type, value: Value) -> Self {
        self.add_member(
            name,
            MemberKind::Field,
            true,
            ty,
            Arc::new(move |_: &Value| -> Result<Value, HostError> { Ok(value.clone()) }),
        );
        self
    }

    /// Register a static method overload.
    pub fn static_method<F>(
        mut self,
        name: impl Into<String>,
        params: &[Type],
        ret: Type,
        f: F,
    ) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        self.add_method(
            name,
            true,
            params.iter().cloned().collect(),
            ret,
            Arc::new(move |_: &Value, args: &[Value]| f(args)),
        );
        self
    }

    /// Register an instance property whose receiver is any [`Value`] of this type.
    ///
    /// This is the untyped form used for the primitive types; host structs should go through
    /// [`TypeBuilder`] instead.
    pub fn value_property<F>(mut self, name: impl Into<String>, ty: Type, get: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        self.add_member(name, MemberKind::Property, false, ty, Arc::new(get));
        self
    }

    /// Untyped instance method, see [`TypeInfo::value_property`].
    pub fn value_method<F>(
        mut self,
        name: impl Into<String>,
        params: &[Type],
        ret: Type,
        f: F,
    ) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        self.add_method(name, false, params.iter().cloned().collect(), ret, Arc::new(f));
        self
    }

    /// Untyped indexer, see [`TypeInfo::value_property`].
    pub fn value_indexer<F>(
        mut self,
        params: &[Type],
        ret: Type,
        f: F,
    ) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        self.add_indexer(params.iter().cloned().collect(), ret, Arc::new(f));
        self
    }
}

/// Typed registration for a host type backed by the Rust type `T`.
///
/// ```
/// use formula_expr::{Type, TypeBuilder, Value};
///
/// struct Order {
///     total: f64,
/// }
///
/// let info = TypeBuilder::<Order>::new("Shop.Order")
///     .property("Total", Type::Double, |o| Value::from(o.total))
///     .build();
/// assert_eq!(info.name(), "Shop.Order");
/// assert!(info.find_member("Total").is_some());
/// ```
pub struct TypeBuilder<T> {
    info: TypeInfo,
    _receiver: PhantomData<fn(&T)>,
}

impl<T: Any + Send + Sync> TypeBuilder<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: TypeInfo::new(name),
            _receiver: PhantomData,
        }
    }

    pub fn property<F>(self, name: impl Into<String>, ty: Type, get: F) -> Self
    where
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        self.member(name, MemberKind::Property, ty, get)
    }

    pub fn field<F>(self, name: impl Into<String>, ty: Type, get: F) -> Self
    where
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        self.member(name, MemberKind::Field, ty, get)
    }

    fn member<F>(mut self, name: impl Into<String>, kind: MemberKind, ty: Type, get: F) -> Self
    where
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        let type_name = self.info.name.clone();
        self.info.add_member(
            name,
            kind,
            false,
            ty,
            Arc::new(move |receiver: &Value| -> Result<Value, HostError> {
                Ok(get(downcast::<T>(receiver, &type_name)?))
            }),
        );
        self
    }

    pub fn method<F>(
        mut self,
        name: impl Into<String>,
        params: &[Type],
        ret: Type,
        f: F,
    ) -> Self
    where
        F: Fn(&T, &[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        let type_name = self.info.name.clone();
        self.info.add_method(
            name,
            false,
            params.iter().cloned().collect(),
            ret,
            Arc::new(move |receiver: &Value, args: &[Value]| -> Result<Value, HostError> {
                f(downcast::<T>(receiver, &type_name)?, args)
            }),
        );
        self
    }

    pub fn indexer<F>(mut self, params: &[Type], ret: Type, f: F) -> Self
    where
        F: Fn(&T, &[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        let type_name = self.info.name.clone();
        self.info.add_indexer(
            params.iter().cloned().collect(),
            ret,
            Arc::new(move |receiver: &Value, args: &[Value]| -> Result<Value, HostError> {
                f(downcast::<T>(receiver, &type_name)?, args)
            }),
        );
        self
    }

    pub fn static_property<F>(mut self, name: impl Into<String>, ty: Type, get: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.info = self.info.static_property(name, ty, get);
        self
    }

    pub fn static_field(mut self, name: impl Into<String>, ty: Type, value: Value) -> Self {
        self.info = self.info.static_field(name, ty, value);
        self
    }

    pub fn static_method<F>(
        mut self,
        name: impl Into<String>,
        params: &[Type],
        ret: Type,
        f: F,
    ) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        self.info = self.info.static_method(name, params, ret, f);
        self
    }

    pub fn build(self) -> TypeInfo {
        self.info
    }
}

fn downcast<'a, T: Any>(receiver: &'a Value, type_name: &str) -> Result<&'a T, HostError> {
    receiver
        .as_object()
        .and_then(|o| o.downcast_ref::<T>())
        .ok_or_else(|| HostError::new(format!("receiver is not a {type_name}")))
}

/// All types visible to formulas, keyed by fully-qualified name.
#[derive(Default)]
pub struct TypeRegistry {
    types: AHashMap<String, Arc<TypeInfo>>,
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("TypeRegistry").field("types", &names).finish()
    }
}

impl TypeRegistry {
    /// A registry with no types at all, not even the primitives.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the primitive types, `string` and `Math`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for info in crate::builtins::types() {
            registry.insert(info);
        }
        registry
    }

    /// Add a type; fails if the name is already taken.
    pub fn register(&mut self, info: TypeInfo) -> Result<(), RegistryError> {
        if self.types.contains_key(info.name()) {
            return Err(RegistryError::DuplicateType(info.name().to_string()));
        }
        self.types.insert(info.name().to_string(), Arc::new(info));
        Ok(())
    }

    /// Add a type, replacing any existing type of the same name.
    pub fn insert(&mut self, info: TypeInfo) {
        if self.types.contains_key(info.name()) {
            log::warn!("replacing registered type {}", info.name());
        }
        self.types.insert(info.name().to_string(), Arc::new(info));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TypeInfo>> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Object;

    struct Counter {
        start: i32,
    }

    fn counter_type() -> TypeInfo {
        TypeBuilder::<Counter>::new("Counter")
            .property("Start", Type::Int, |c| Value::from(c.start))
            .field("Start", Type::Double, |c| Value::from(f64::from(c.start)))
            .field("Step", Type::Int, |_| Value::from(1))
            .method("Add", &[Type::Int], Type::Int, |c, args| {
                Ok(Value::from(c.start + args[0].as_int().unwrap_or(0)))
            })
            .method("Add", &[Type::Double], Type::Double, |c, args| {
                Ok(Value::from(f64::from(c.start) + args[0].as_double().unwrap_or(0.0)))
            })
            .build()
    }

    #[test]
    fn property_shadows_field_of_same_name() {
        let info = counter_type();
        let start = info.find_member("Start").unwrap();
        assert_eq!(start.kind(), MemberKind::Property);
        assert_eq!(start.ty(), &Type::Int);
        assert_eq!(info.find_member("Step").unwrap().kind(), MemberKind::Field);
        assert!(info.find_member("Missing").is_none());
    }

    #[test]
    fn overloads_are_selected_by_exact_signature() {
        let info = counter_type();
        let receiver = Value::from(Object::new("Counter", Counter { start: 2 }));

        let int_add = info.find_method("Add", &[Type::Int]).unwrap();
        assert_eq!(int_add.invoke(&receiver, &[Value::from(3)]), Ok(Value::from(5)));

        let double_add = info.find_method("Add", &[Type::Double]).unwrap();
        assert_eq!(double_add.ret(), &Type::Double);

        assert!(info.find_method("Add", &[Type::Float]).is_none());
        assert!(info.find_method("Add", &[]).is_none());
        assert!(info.find_static_method("Add", &[Type::Int]).is_none());
    }

    #[test]
    fn wrong_receiver_is_a_host_error() {
        let info = counter_type();
        let err = info
            .find_member("Start")
            .unwrap()
            .get(&Value::from(Object::new("Counter", "not a counter")))
            .unwrap_err();
        assert_eq!(err, HostError::new("receiver is not a Counter"));
    }

    #[test]
    fn register_rejects_duplicates() {
        let mut registry = TypeRegistry::new();
        registry.register(counter_type()).unwrap();
        assert_eq!(
            registry.register(counter_type()),
            Err(RegistryError::DuplicateType("Counter".to_string()))
        );
        registry.insert(counter_type());
        assert_eq!(registry.len(), 1);
    }
}
