//! Interceptor adapters
//!
//! An [`Interceptor`] is the capability table a wrapper consults on every
//! call, construct, read or write directed at a hooked binding. Each method
//! defaults to plain delegation, so an implementation overrides only what it
//! alters.

use crate::error::{Error, Result};
use crate::host::{ObjectRef, Property, Realm, Value};

/// A binding that can be hooked: `object[key]`
#[derive(Clone)]
pub struct Target {
    pub object: ObjectRef,
    pub key: String,
}

impl Target {
    pub fn new(object: ObjectRef, key: impl Into<String>) -> Self {
        Self {
            object,
            key: key.into(),
        }
    }

    /// `window[key]`
    pub fn global(realm: &Realm, key: impl Into<String>) -> Self {
        Self::new(realm.global().clone(), key)
    }

    /// `window[constructor].prototype[key]`; fails when the interface is absent
    pub fn on_prototype(realm: &Realm, constructor: &str, key: impl Into<String>) -> Result<Self> {
        Ok(Self::new(realm.prototype_of(constructor)?, key))
    }

    /// Human-readable name for logs
    pub fn describe(&self) -> String {
        format!("{}.{}", self.object.class(), self.key)
    }
}

/// What a binding resolved to before it was hooked
#[derive(Clone, Debug, Default)]
pub enum Original {
    Function(ObjectRef),
    Accessor {
        get: Option<ObjectRef>,
        set: Option<ObjectRef>,
    },
    Value(Value),
    #[default]
    Absent,
}

impl Original {
    pub(crate) fn from_property(property: Option<Property>) -> Self {
        match property {
            Some(Property::Data {
                value: Value::Object(obj),
                ..
            }) if obj.is_callable() => Original::Function(obj),
            Some(Property::Data { value, .. }) => Original::Value(value),
            Some(Property::Accessor { get, set, .. }) => Original::Accessor { get, set },
            None => Original::Absent,
        }
    }

    /// The original callable, if it was one
    pub fn function(&self) -> Option<&ObjectRef> {
        match self {
            Original::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Invoke the original callable
    pub fn call(&self, realm: &Realm, this: &Value, args: &[Value]) -> Result<Value> {
        match self {
            Original::Function(f) => realm.call(&Value::Object(f.clone()), this, args),
            Original::Value(v) => realm.call(v, this, args),
            _ => Err(Error::type_error("not a function")),
        }
    }

    /// `new original(...args)`
    pub fn construct(&self, realm: &Realm, args: &[Value]) -> Result<Value> {
        match self {
            Original::Function(f) => realm.construct(&Value::Object(f.clone()), args),
            Original::Value(v) => realm.construct(v, args),
            _ => Err(Error::type_error("not a constructor")),
        }
    }

    /// Read the original binding with `this` as receiver
    pub fn get(&self, realm: &Realm, this: &Value) -> Result<Value> {
        match self {
            Original::Function(f) => Ok(Value::Object(f.clone())),
            Original::Value(v) => Ok(v.clone()),
            Original::Accessor { get: Some(g), .. } => {
                realm.call(&Value::Object(g.clone()), this, &[])
            }
            Original::Accessor { get: None, .. } | Original::Absent => Ok(Value::Undefined),
        }
    }

    /// Write through the original setter; data bindings are not restored
    pub fn set(&self, realm: &Realm, this: &Value, value: Value) -> Result<()> {
        if let Original::Accessor { set: Some(s), .. } = self {
            realm.call(&Value::Object(s.clone()), this, &[value])?;
        }
        Ok(())
    }
}

/// Context handed to every interceptor method
pub struct HookContext<'a> {
    pub realm: &'a Realm,
    pub original: &'a Original,
    pub key: &'a str,
}

impl HookContext<'_> {
    /// Delegate a call to the original
    pub fn call_original(&self, this: &Value, args: &[Value]) -> Result<Value> {
        self.original.call(self.realm, this, args)
    }

    /// Delegate a construct to the original
    pub fn construct_original(&self, args: &[Value]) -> Result<Value> {
        self.original.construct(self.realm, args)
    }

    /// Delegate a read to the original
    pub fn get_original(&self, this: &Value) -> Result<Value> {
        self.original.get(self.realm, this)
    }
}

/// Wrapping behavior around a hooked binding
pub trait Interceptor: 'static {
    fn call(&self, cx: &HookContext<'_>, this: &Value, args: &[Value]) -> Result<Value> {
        cx.call_original(this, args)
    }

    fn construct(&self, cx: &HookContext<'_>, args: &[Value]) -> Result<Value> {
        cx.construct_original(args)
    }

    fn get(&self, cx: &HookContext<'_>, this: &Value) -> Result<Value> {
        cx.get_original(this)
    }

    fn set(&self, cx: &HookContext<'_>, this: &Value, value: Value) -> Result<()> {
        cx.original.set(cx.realm, this, value)
    }
}

/// Intercepts calls with a closure
pub struct CallHook<F>(pub F);

impl<F> Interceptor for CallHook<F>
where
    F: Fn(&HookContext<'_>, &Value, &[Value]) -> Result<Value> + 'static,
{
    fn call(&self, cx: &HookContext<'_>, this: &Value, args: &[Value]) -> Result<Value> {
        (self.0)(cx, this, args)
    }
}

/// Intercepts reads with a closure; writes are dropped
pub struct GetHook<F>(pub F);

impl<F> Interceptor for GetHook<F>
where
    F: Fn(&HookContext<'_>, &Value) -> Result<Value> + 'static,
{
    fn get(&self, cx: &HookContext<'_>, this: &Value) -> Result<Value> {
        (self.0)(cx, this)
    }

    fn set(&self, _cx: &HookContext<'_>, _this: &Value, _value: Value) -> Result<()> {
        Ok(())
    }
}

/// Reads always yield the same value; writes are dropped
pub struct Constant(pub Value);

impl Interceptor for Constant {
    fn get(&self, _cx: &HookContext<'_>, _this: &Value) -> Result<Value> {
        Ok(self.0.clone())
    }

    fn set(&self, _cx: &HookContext<'_>, _this: &Value, _value: Value) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::native;

    #[test]
    fn test_original_from_property() {
        let realm = Realm::new("https://example.com/");
        let f = realm.new_native("f", native(|_, _, _| Ok(Value::from(1.0))));
        assert!(matches!(
            Original::from_property(Some(Property::data(f))),
            Original::Function(_)
        ));
        assert!(matches!(
            Original::from_property(Some(Property::data(3.0))),
            Original::Value(_)
        ));
        assert!(matches!(Original::from_property(None), Original::Absent));
    }

    #[test]
    fn test_original_delegation() {
        let realm = Realm::new("https://example.com/");
        let f = realm.new_native("f", native(|_, _, args| Ok(crate::host::arg(args, 0))));
        let original = Original::Function(f);
        let out = original
            .call(&realm, &Value::Undefined, &[Value::from("x")])
            .unwrap();
        assert_eq!(out, Value::from("x"));
        assert!(Original::Absent
            .call(&realm, &Value::Undefined, &[])
            .unwrap_err()
            .is_thrown());
        assert!(Original::Absent
            .get(&realm, &Value::Undefined)
            .unwrap()
            .is_undefined());
    }

    #[test]
    fn test_target_describe() {
        let realm = Realm::new("https://example.com/");
        let t = Target::on_prototype(&realm, "Navigator", "plugins").unwrap();
        assert_eq!(t.describe(), "Navigator.plugins");
        assert!(Target::on_prototype(&realm, "NoSuchThing", "x").is_err());
    }
}
