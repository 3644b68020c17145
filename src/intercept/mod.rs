//! Interception Registry
//!
//! Rebinds host bindings to wrappers that route every call, construct, read
//! and write through an [`Interceptor`]. Wrappers may carry a native label;
//! page code stringifying a labeled wrapper sees the text of an untouched
//! host-native function. That is done by hooking
//! `Function.prototype.toString` once, before anything else, and consulting
//! a label table keyed by wrapper identity.

mod interceptor;

pub use interceptor::{CallHook, Constant, GetHook, HookContext, Interceptor, Original, Target};

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::Result;
use crate::host::{
    native, native_ctor, native_source, Object, ObjectId, ObjectRef, Property, Realm, Value,
};

/// Source text of a wrapper that carries no label
pub const WRAPPER_SOURCE: &str = "function () { return hook.apply(this, arguments); }";

/// The installed wrapper of a hook
#[derive(Clone, Debug)]
pub enum Wrapper {
    Function(ObjectRef),
    Accessor { get: ObjectRef, set: ObjectRef },
    Value(Value),
}

impl Wrapper {
    fn ids(&self) -> Vec<ObjectId> {
        match self {
            Wrapper::Function(f) => vec![f.id()],
            Wrapper::Accessor { get, set } => vec![get.id(), set.id()],
            Wrapper::Value(_) => Vec::new(),
        }
    }
}

/// One installed interception
#[derive(Clone, Debug)]
pub struct HookRecord {
    pub target: String,
    pub original: Original,
    pub wrapper: Wrapper,
    pub label: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Shape {
    Auto,
    Accessor,
}

type LabelTable = Rc<RefCell<HashMap<ObjectId, String>>>;

/// Owns every hook installed in one realm
pub struct Registry {
    labels: LabelTable,
    records: RefCell<HashMap<(ObjectId, String), HookRecord>>,
    skipped: RefCell<Vec<String>>,
}

impl Registry {
    /// Create the registry and install the stringification hook
    pub fn new(realm: &Realm) -> Self {
        let registry = Self {
            labels: Rc::new(RefCell::new(HashMap::new())),
            records: RefCell::new(HashMap::new()),
            skipped: RefCell::new(Vec::new()),
        };
        let labels = registry.labels.clone();
        let stealth = CallHook(move |cx: &HookContext<'_>, this: &Value, args: &[Value]| {
            let label = this
                .as_object()
                .and_then(|o| labels.borrow().get(&o.id()).cloned());
            match label {
                Some(label) => Ok(Value::from(native_source(&label))),
                None => cx.call_original(this, args),
            }
        });
        let target = Target::new(realm.function_prototype().clone(), "toString");
        if registry.install(realm, target, stealth, Some("toString")) {
            tracing::debug!("stringification hook installed");
        }
        registry
    }

    /// A registry sharing this one's label table but keeping its own records
    ///
    /// Hooks that install further hooks hold one of these, so the handle lives
    /// exactly as long as the hook does.
    pub fn scoped(&self) -> Registry {
        Self {
            labels: self.labels.clone(),
            records: RefCell::new(HashMap::new()),
            skipped: RefCell::new(Vec::new()),
        }
    }

    /// Hook `target`; returns whether the hook is in place
    ///
    /// A callable data binding gets a function wrapper; anything else (plain
    /// values, accessors, absent bindings) gets an accessor pair.
    pub fn install(
        &self,
        realm: &Realm,
        target: Target,
        interceptor: impl Interceptor,
        label: Option<&str>,
    ) -> bool {
        self.install_shaped(realm, target, Rc::new(interceptor), label, Shape::Auto)
    }

    /// Hook `target` as an accessor pair regardless of its current shape
    pub fn install_accessor(
        &self,
        realm: &Realm,
        target: Target,
        interceptor: impl Interceptor,
        label: Option<&str>,
    ) -> bool {
        self.install_shaped(realm, target, Rc::new(interceptor), label, Shape::Accessor)
    }

    /// Rebind `target` to a plain value (e.g. `undefined` to remove an API)
    pub fn define(&self, realm: &Realm, target: Target, value: Value) -> bool {
        let description = target.describe();
        let original = self.original_for(realm, &target);
        let property = Property::data(value.clone());
        let result = realm.define_property(&target.object, &target.key, property);
        self.commit(
            result,
            &target,
            HookRecord {
                target: description,
                original,
                wrapper: Wrapper::Value(value),
                label: None,
            },
        )
    }

    fn install_shaped(
        &self,
        realm: &Realm,
        target: Target,
        interceptor: Rc<dyn Interceptor>,
        label: Option<&str>,
        shape: Shape,
    ) -> bool {
        let description = target.describe();
        let original = self.original_for(realm, &target);
        let as_function = shape == Shape::Auto && matches!(original, Original::Function(_));

        let (wrapper, property) = if as_function {
            let f = self.function_wrapper(realm, &target.key, &original, interceptor, label);
            (Wrapper::Function(f.clone()), Property::data(f))
        } else {
            let (get, set) =
                self.accessor_wrapper(realm, &target.key, &original, interceptor, label);
            (
                Wrapper::Accessor {
                    get: get.clone(),
                    set: set.clone(),
                },
                Property::accessor(Some(get), Some(set)),
            )
        };

        let result = realm.define_property(&target.object, &target.key, property);
        if result.is_err() {
            let mut labels = self.labels.borrow_mut();
            for id in wrapper.ids() {
                labels.remove(&id);
            }
        }
        self.commit(
            result,
            &target,
            HookRecord {
                target: description,
                original,
                wrapper,
                label: label.map(str::to_string),
            },
        )
    }

    /// The true original: from a previous record if re-installing, else the
    /// live binding (own or inherited)
    fn original_for(&self, realm: &Realm, target: &Target) -> Original {
        let key = (target.object.id(), target.key.clone());
        if let Some(record) = self.records.borrow().get(&key) {
            return record.original.clone();
        }
        Original::from_property(
            realm
                .find_property(&target.object, &target.key)
                .map(|(_, property)| property),
        )
    }

    fn commit(&self, result: Result<()>, target: &Target, record: HookRecord) -> bool {
        match result {
            Ok(()) => {
                let key = (target.object.id(), target.key.clone());
                let previous = self.records.borrow_mut().insert(key, record);
                if let Some(previous) = previous {
                    tracing::debug!("replaced hook on {}", previous.target);
                    let mut labels = self.labels.borrow_mut();
                    for id in previous.wrapper.ids() {
                        labels.remove(&id);
                    }
                }
                true
            }
            Err(e) => {
                tracing::warn!("skipping hook on {}: {}", record.target, e);
                self.skipped.borrow_mut().push(record.target);
                false
            }
        }
    }

    fn register_label(&self, wrapper: &ObjectRef, label: Option<String>) {
        if let Some(label) = label {
            self.labels.borrow_mut().insert(wrapper.id(), label);
        }
    }

    fn function_wrapper(
        &self,
        realm: &Realm,
        key: &str,
        original: &Original,
        interceptor: Rc<dyn Interceptor>,
        label: Option<&str>,
    ) -> ObjectRef {
        let call = {
            let original = original.clone();
            let interceptor = interceptor.clone();
            let key = key.to_string();
            native(move |realm, this, args| {
                let cx = HookContext {
                    realm,
                    original: &original,
                    key: &key,
                };
                recover(&key, interceptor.call(&cx, this, args), || {
                    original.call(realm, this, args)
                })
            })
        };

        let is_constructor = original.function().is_some_and(|f| f.is_constructor());
        let construct = is_constructor.then(|| {
            let original = original.clone();
            let key = key.to_string();
            native_ctor(move |realm, args| {
                let cx = HookContext {
                    realm,
                    original: &original,
                    key: &key,
                };
                recover(&key, interceptor.construct(&cx, args), || {
                    original.construct(realm, args)
                })
            })
        });

        let prototype = original
            .function()
            .and_then(|f| f.prototype())
            .unwrap_or_else(|| realm.function_prototype().clone());
        let wrapper = Object::function(Some(prototype), WRAPPER_SOURCE, call, construct);
        if let Some(proto) = original
            .function()
            .and_then(|f| f.own_property("prototype"))
        {
            if let Err(e) = wrapper.define_own("prototype", proto) {
                tracing::warn!("wrapper for {} lost its prototype: {}", key, e);
            }
        }
        self.register_label(&wrapper, label.map(str::to_string));
        wrapper
    }

    fn accessor_wrapper(
        &self,
        realm: &Realm,
        key: &str,
        original: &Original,
        interceptor: Rc<dyn Interceptor>,
        label: Option<&str>,
    ) -> (ObjectRef, ObjectRef) {
        let get = {
            let original = original.clone();
            let interceptor = interceptor.clone();
            let key = key.to_string();
            native(move |realm, this, _| {
                let cx = HookContext {
                    realm,
                    original: &original,
                    key: &key,
                };
                recover(&key, interceptor.get(&cx, this), || original.get(realm, this))
            })
        };
        let set = {
            let original = original.clone();
            let key = key.to_string();
            native(move |realm, this, args| {
                let cx = HookContext {
                    realm,
                    original: &original,
                    key: &key,
                };
                let value = args.first().cloned().unwrap_or_default();
                let outcome = interceptor.set(&cx, this, value.clone()).map(|_| Value::Undefined);
                recover(&key, outcome, || {
                    original.set(realm, this, value).map(|_| Value::Undefined)
                })
            })
        };
        let getter = realm.new_function(WRAPPER_SOURCE, get);
        let setter = realm.new_function(WRAPPER_SOURCE, set);
        self.register_label(&getter, label.map(|l| format!("get {}", l)));
        self.register_label(&setter, label.map(|l| format!("set {}", l)));
        (getter, setter)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Whether `target` currently carries a hook from this registry
    pub fn is_hooked(&self, target: &Target) -> bool {
        self.records
            .borrow()
            .contains_key(&(target.object.id(), target.key.clone()))
    }

    /// The record for `target`
    pub fn record(&self, target: &Target) -> Option<HookRecord> {
        self.records
            .borrow()
            .get(&(target.object.id(), target.key.clone()))
            .cloned()
    }

    /// The function wrapper installed on `target`
    pub fn wrapper(&self, target: &Target) -> Option<ObjectRef> {
        match self.record(target)?.wrapper {
            Wrapper::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Native label reported for a wrapper
    pub fn label_of(&self, id: ObjectId) -> Option<String> {
        self.labels.borrow().get(&id).cloned()
    }

    pub fn hook_count(&self) -> usize {
        self.records.borrow().len()
    }

    /// Targets that refused a hook
    pub fn skipped(&self) -> Vec<String> {
        self.skipped.borrow().clone()
    }
}

/// Keep page-visible exceptions; turn internal failures into delegation
fn recover(
    key: &str,
    outcome: Result<Value>,
    fallback: impl FnOnce() -> Result<Value>,
) -> Result<Value> {
    match outcome {
        Err(e) if !e.is_thrown() => {
            tracing::debug!("hook on {} failed, delegating: {}", key, e);
            fallback()
        }
        other => other,
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("hooks", &self.hook_count())
            .field("skipped", &self.skipped.borrow().len())
            .finish()
    }
}
