//! Script values and objects
//!
//! Objects carry identity, a prototype link, own properties, optional native
//! call/construct behavior and a host-internal slot.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::dom::NodeId;
use super::Realm;
use crate::error::{Error, Result};

/// Global counter for object identities (never reused)
static OBJECT_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a host object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

/// Shared handle to a host object
pub type ObjectRef = Rc<Object>;

/// Native behavior: `(realm, this, arguments)`
pub type NativeFn = Rc<dyn Fn(&Realm, &Value, &[Value]) -> Result<Value>>;

/// Native construct behavior: `(realm, arguments)`
pub type NativeCtor = Rc<dyn Fn(&Realm, &[Value]) -> Result<Value>>;

/// Box a closure as a [`NativeFn`]
pub fn native<F>(f: F) -> NativeFn
where
    F: Fn(&Realm, &Value, &[Value]) -> Result<Value> + 'static,
{
    Rc::new(f)
}

/// Box a closure as a [`NativeCtor`]
pub fn native_ctor<F>(f: F) -> NativeCtor
where
    F: Fn(&Realm, &[Value]) -> Result<Value> + 'static,
{
    Rc::new(f)
}

/// The source text a host-native function reports for `name`
pub fn native_source(name: &str) -> String {
    format!("function {}() {{ [native code] }}", name)
}

/// A script value
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Object(ObjectRef),
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Whether this value can be invoked
    pub fn is_callable(&self) -> bool {
        self.as_object().map(|o| o.is_callable()).unwrap_or(false)
    }

    /// Result of the `typeof` operator
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Object(obj) if obj.is_callable() => "function",
            Value::Object(_) => "object",
        }
    }

    /// String conversion used where host APIs coerce arguments
    pub fn to_display(&self) -> String {
        match self {
            Value::Undefined => "undefined".into(),
            Value::Null => "null".into(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() => format!("{}", *n as i64),
            Value::Number(n) => n.to_string(),
            Value::Str(s) => s.to_string(),
            Value::Object(obj) => format!("[object {}]", obj.class()),
        }
    }

    /// Identity/strict equality
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Object(obj) => write!(f, "{}#{}", obj.class(), obj.id().0),
            other => f.write_str(&other.to_display()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

/// An own property
#[derive(Clone)]
pub enum Property {
    Data {
        value: Value,
        writable: bool,
        configurable: bool,
    },
    Accessor {
        get: Option<ObjectRef>,
        set: Option<ObjectRef>,
        configurable: bool,
    },
}

impl Property {
    /// Writable, configurable data property
    pub fn data(value: impl Into<Value>) -> Self {
        Property::Data {
            value: value.into(),
            writable: true,
            configurable: true,
        }
    }

    /// Non-writable, non-configurable data property
    pub fn frozen(value: impl Into<Value>) -> Self {
        Property::Data {
            value: value.into(),
            writable: false,
            configurable: false,
        }
    }

    /// Configurable accessor
    pub fn accessor(get: Option<ObjectRef>, set: Option<ObjectRef>) -> Self {
        Property::Accessor {
            get,
            set,
            configurable: true,
        }
    }

    pub fn is_configurable(&self) -> bool {
        match self {
            Property::Data { configurable, .. } | Property::Accessor { configurable, .. } => {
                *configurable
            }
        }
    }
}

/// Host-internal state attached to an object
#[derive(Debug, Clone, Default)]
pub enum Slot {
    #[default]
    None,
    /// Wrapper for a DOM node
    Element(NodeId),
    /// Uint8ClampedArray backing store
    Bytes(Vec<u8>),
    /// Float32Array backing store
    Floats(Vec<f32>),
    /// Array-like contents
    List(Vec<Value>),
    /// A settled promise
    Promise(Value),
}

/// A host object
pub struct Object {
    id: ObjectId,
    class: String,
    prototype: RefCell<Option<ObjectRef>>,
    properties: RefCell<BTreeMap<String, Property>>,
    call: Option<NativeFn>,
    construct: Option<NativeCtor>,
    source: Option<String>,
    slot: RefCell<Slot>,
}

impl Object {
    fn build(
        class: impl Into<String>,
        prototype: Option<ObjectRef>,
        call: Option<NativeFn>,
        construct: Option<NativeCtor>,
        source: Option<String>,
    ) -> ObjectRef {
        Rc::new(Self {
            id: ObjectId(OBJECT_COUNTER.fetch_add(1, Ordering::Relaxed)),
            class: class.into(),
            prototype: RefCell::new(prototype),
            properties: RefCell::new(BTreeMap::new()),
            call,
            construct,
            source,
            slot: RefCell::new(Slot::None),
        })
    }

    /// Create an ordinary object
    pub fn plain(class: impl Into<String>, prototype: Option<ObjectRef>) -> ObjectRef {
        Self::build(class, prototype, None, None, None)
    }

    /// Create a callable with the given source text
    pub fn function(
        prototype: Option<ObjectRef>,
        source: impl Into<String>,
        call: NativeFn,
        construct: Option<NativeCtor>,
    ) -> ObjectRef {
        Self::build("Function", prototype, Some(call), construct, Some(source.into()))
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn prototype(&self) -> Option<ObjectRef> {
        self.prototype.borrow().clone()
    }

    pub fn set_prototype(&self, prototype: Option<ObjectRef>) {
        *self.prototype.borrow_mut() = prototype;
    }

    pub fn is_callable(&self) -> bool {
        self.call.is_some()
    }

    pub fn is_constructor(&self) -> bool {
        self.construct.is_some()
    }

    pub(crate) fn call_behavior(&self) -> Option<NativeFn> {
        self.call.clone()
    }

    pub(crate) fn construct_behavior(&self) -> Option<NativeCtor> {
        self.construct.clone()
    }

    /// True source text of a callable
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn own_property(&self, key: &str) -> Option<Property> {
        self.properties.borrow().get(key).cloned()
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.properties.borrow().contains_key(key)
    }

    pub fn own_keys(&self) -> Vec<String> {
        self.properties.borrow().keys().cloned().collect()
    }

    /// Define or redefine an own property, honoring `configurable`
    pub fn define_own(&self, key: &str, property: Property) -> Result<()> {
        let mut props = self.properties.borrow_mut();
        if let Some(existing) = props.get(key) {
            if !existing.is_configurable() {
                return Err(Error::immutable(self.class.clone(), key));
            }
        }
        props.insert(key.to_string(), property);
        Ok(())
    }

    /// Overwrite the value of an existing writable data property
    pub(crate) fn write_own(&self, key: &str, value: Value) -> bool {
        match self.properties.borrow_mut().get_mut(key) {
            Some(Property::Data {
                value: slot,
                writable: true,
                ..
            }) => {
                *slot = value;
                true
            }
            _ => false,
        }
    }

    pub fn slot(&self) -> Ref<'_, Slot> {
        self.slot.borrow()
    }

    pub fn slot_mut(&self) -> RefMut<'_, Slot> {
        self.slot.borrow_mut()
    }

    pub fn set_slot(&self, slot: Slot) {
        *self.slot.borrow_mut() = slot;
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class, self.id.0)
    }
}

/// Argument at `index`, or `undefined`
pub fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}
