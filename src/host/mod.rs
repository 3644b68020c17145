//! Host Surface
//!
//! The scripting-host object model the shield acts on: values and objects,
//! the document tree, a task queue and batched mutation observers. An engine
//! embedding veil exposes its page globals through a [`Realm`]; the in-memory
//! realm built by [`Realm::new`] carries a browser-shaped global surface.

pub mod bootstrap;
pub mod dom;
pub mod value;

use std::cell::{Ref, RefCell, RefMut};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use crate::error::{Error, Result};

pub use dom::{Bitmap, Dom, MutationRecord, Node, NodeId};
pub use value::{
    arg, native, native_ctor, native_source, NativeCtor, NativeFn, Object, ObjectId, ObjectRef,
    Property, Slot, Value,
};

/// Deferred work queued with [`Realm::set_timeout`]
pub type Task = Box<dyn FnOnce(&Realm)>;

/// Observer callback receiving one batch of records
pub type MutationCallback = Rc<dyn Fn(&Realm, &[MutationRecord])>;

/// Which changes an observer is interested in
#[derive(Debug, Clone, Copy, Default)]
pub struct ObserveOptions {
    pub child_list: bool,
    pub attributes: bool,
    pub subtree: bool,
}

impl ObserveOptions {
    /// Inserted nodes anywhere below the root
    pub fn child_list_subtree() -> Self {
        Self {
            child_list: true,
            attributes: false,
            subtree: true,
        }
    }

    /// Attribute changes anywhere below the root
    pub fn attributes_subtree() -> Self {
        Self {
            child_list: false,
            attributes: true,
            subtree: true,
        }
    }
}

struct Observer {
    root: NodeId,
    options: ObserveOptions,
    callback: MutationCallback,
}

/// Intrinsic objects every realm carries
pub(crate) struct Intrinsics {
    pub object_prototype: ObjectRef,
    pub function_prototype: ObjectRef,
    pub array_prototype: ObjectRef,
}

/// A page's script realm: globals, document and event loop
pub struct Realm {
    url: String,
    global: ObjectRef,
    intrinsics: Intrinsics,
    dom: RefCell<Dom>,
    elements: RefCell<HashMap<NodeId, ObjectRef>>,
    tasks: RefCell<VecDeque<Task>>,
    observers: RefCell<Vec<Observer>>,
    ready_listeners: RefCell<Vec<Task>>,
    evaluated: RefCell<Vec<String>>,
}

impl Realm {
    /// Create a realm for `url` with the default browser surface
    pub fn new(url: impl Into<String>) -> Self {
        let object_prototype = Object::plain("Object", None);
        let function_prototype = Object::function(
            Some(object_prototype.clone()),
            native_source(""),
            native(|_, _, _| Ok(Value::Undefined)),
            None,
        );
        let array_prototype = Object::plain("Array", Some(object_prototype.clone()));
        let global = Object::plain("Window", Some(object_prototype.clone()));

        let realm = Self {
            url: url.into(),
            global,
            intrinsics: Intrinsics {
                object_prototype,
                function_prototype,
                array_prototype,
            },
            dom: RefCell::new(Dom::new()),
            elements: RefCell::new(HashMap::new()),
            tasks: RefCell::new(VecDeque::new()),
            observers: RefCell::new(Vec::new()),
            ready_listeners: RefCell::new(Vec::new()),
            evaluated: RefCell::new(Vec::new()),
        };
        bootstrap::install(&realm);
        realm
    }

    /// Page URL as loaded
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Page URL parsed, if well-formed
    pub fn parsed_url(&self) -> Option<url::Url> {
        url::Url::parse(&self.url).ok()
    }

    /// Hostname of the page; `None` for malformed or host-less URLs
    pub fn hostname(&self) -> Option<String> {
        self.parsed_url()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
    }

    /// The global (`window`) object
    pub fn global(&self) -> &ObjectRef {
        &self.global
    }

    pub fn object_prototype(&self) -> &ObjectRef {
        &self.intrinsics.object_prototype
    }

    pub fn function_prototype(&self) -> &ObjectRef {
        &self.intrinsics.function_prototype
    }

    pub fn array_prototype(&self) -> &ObjectRef {
        &self.intrinsics.array_prototype
    }

    pub fn dom(&self) -> Ref<'_, Dom> {
        self.dom.borrow()
    }

    pub fn dom_mut(&self) -> RefMut<'_, Dom> {
        self.dom.borrow_mut()
    }

    // =========================================================================
    // Object operations
    // =========================================================================

    /// Find `key` on `obj` or its prototype chain
    pub fn find_property(&self, obj: &ObjectRef, key: &str) -> Option<(ObjectRef, Property)> {
        let mut current = Some(obj.clone());
        while let Some(o) = current {
            if let Some(prop) = o.own_property(key) {
                return Some((o, prop));
            }
            current = o.prototype();
        }
        None
    }

    /// Property read (`target[key]`)
    pub fn get(&self, target: &Value, key: &str) -> Result<Value> {
        let Value::Object(obj) = target else {
            if target.is_nullish() {
                return Err(Error::type_error(format!(
                    "Cannot read properties of {} (reading '{}')",
                    target.to_display(),
                    key
                )));
            }
            return Ok(Value::Undefined);
        };
        match self.find_property(obj, key) {
            Some((_, Property::Data { value, .. })) => Ok(value),
            Some((_, Property::Accessor { get: Some(getter), .. })) => {
                self.call(&Value::Object(getter), target, &[])
            }
            _ => Ok(Value::Undefined),
        }
    }

    /// Property read on an object handle
    pub fn get_key(&self, obj: &ObjectRef, key: &str) -> Result<Value> {
        self.get(&Value::Object(obj.clone()), key)
    }

    /// Property write (`target[key] = value`), sloppy-mode semantics
    pub fn set(&self, obj: &ObjectRef, key: &str, value: Value) -> Result<()> {
        match self.find_property(obj, key) {
            Some((_, Property::Accessor { set: Some(setter), .. })) => {
                self.call(&Value::Object(setter), &Value::Object(obj.clone()), &[value])?;
                Ok(())
            }
            Some((_, Property::Accessor { set: None, .. })) => Ok(()),
            Some((owner, Property::Data { writable, .. })) => {
                if !writable {
                    return Ok(());
                }
                if std::rc::Rc::ptr_eq(&owner, obj) {
                    owner.write_own(key, value);
                    Ok(())
                } else {
                    obj.define_own(key, Property::data(value))
                }
            }
            None => obj.define_own(key, Property::data(value)),
        }
    }

    /// `Object.defineProperty`
    pub fn define_property(&self, obj: &ObjectRef, key: &str, property: Property) -> Result<()> {
        obj.define_own(key, property)
    }

    /// Invoke a callable
    pub fn call(&self, callee: &Value, this: &Value, args: &[Value]) -> Result<Value> {
        let behavior = callee
            .as_object()
            .and_then(|o| o.call_behavior())
            .ok_or_else(|| Error::type_error(format!("{:?} is not a function", callee)))?;
        behavior(self, this, args)
    }

    /// `new callee(...args)`
    pub fn construct(&self, callee: &Value, args: &[Value]) -> Result<Value> {
        let behavior = callee
            .as_object()
            .and_then(|o| o.construct_behavior())
            .ok_or_else(|| Error::type_error(format!("{:?} is not a constructor", callee)))?;
        behavior(self, args)
    }

    /// Read `this[method]` and invoke it
    pub fn invoke(&self, this: &Value, method: &str, args: &[Value]) -> Result<Value> {
        let callee = self.get(this, method)?;
        self.call(&callee, this, args)
    }

    /// Read `window[name]`
    pub fn global_value(&self, name: &str) -> Result<Value> {
        self.get_key(&self.global, name)
    }

    /// `window[ctor].prototype`
    pub fn prototype_of(&self, constructor: &str) -> Result<ObjectRef> {
        let ctor = self.global_value(constructor)?;
        if ctor.is_nullish() {
            return Err(Error::Inaccessible(format!("{} is not defined", constructor)));
        }
        self.get(&ctor, "prototype")?
            .as_object()
            .cloned()
            .ok_or_else(|| Error::mismatch("prototype object", constructor))
    }

    /// Source text as page code observes it, through `Function.prototype.toString`
    pub fn stringify(&self, callee: &Value) -> Result<String> {
        let to_string = self.get_key(self.function_prototype(), "toString")?;
        let text = self.call(&to_string, callee, &[])?;
        text.as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::mismatch("string", text.type_of()))
    }

    /// Sequence iteration (`[...value]`) through the `@@iterator` protocol
    pub fn iterate(&self, value: &Value) -> Result<Vec<Value>> {
        let iterator = self.invoke(value, "@@iterator", &[])?;
        let items = match iterator.as_object().map(|o| o.slot().clone()) {
            Some(Slot::List(items)) => items,
            _ => return Err(Error::type_error("object is not iterable")),
        };
        Ok(items)
    }

    // =========================================================================
    // Object factories
    // =========================================================================

    /// A callable inheriting from `Function.prototype`
    pub fn new_function(&self, source: impl Into<String>, call: NativeFn) -> ObjectRef {
        Object::function(Some(self.function_prototype().clone()), source, call, None)
    }

    /// A host-native function reporting `function name() { [native code] }`
    pub fn new_native(&self, name: &str, call: NativeFn) -> ObjectRef {
        self.new_function(native_source(name), call)
    }

    /// A callable that is also a constructor
    pub fn new_constructor(
        &self,
        source: impl Into<String>,
        call: NativeFn,
        construct: NativeCtor,
    ) -> ObjectRef {
        Object::function(
            Some(self.function_prototype().clone()),
            source,
            call,
            Some(construct),
        )
    }

    /// An ordinary object inheriting from `Object.prototype`
    pub fn new_object(&self, class: &str) -> ObjectRef {
        Object::plain(class, Some(self.object_prototype().clone()))
    }

    /// An object literal from key/value pairs
    pub fn new_record(&self, class: &str, fields: Vec<(&str, Value)>) -> ObjectRef {
        let obj = self.new_object(class);
        for (key, value) in fields {
            let _ = obj.define_own(key, Property::data(value));
        }
        obj
    }

    /// An array
    pub fn new_array(&self, items: Vec<Value>) -> ObjectRef {
        let arr = Object::plain("Array", Some(self.array_prototype().clone()));
        Self::fill_indexed(&arr, &items);
        arr.set_slot(Slot::List(items));
        arr
    }

    /// An array-like collection (`length`, indexed access, `@@iterator` via the prototype)
    pub fn new_collection(&self, class: &str, prototype: ObjectRef, items: Vec<Value>) -> ObjectRef {
        let coll = Object::plain(class, Some(prototype));
        Self::fill_indexed(&coll, &items);
        coll.set_slot(Slot::List(items));
        coll
    }

    fn fill_indexed(obj: &ObjectRef, items: &[Value]) {
        for (i, item) in items.iter().enumerate() {
            let _ = obj.define_own(&i.to_string(), Property::data(item.clone()));
        }
        let _ = obj.define_own("length", Property::data(items.len()));
    }

    /// A promise already resolved with `value`
    pub fn resolved(&self, value: Value) -> Value {
        let promise = self.new_object("Promise");
        promise.set_slot(Slot::Promise(value));
        Value::Object(promise)
    }

    /// Settled value of a promise
    pub fn settle(&self, promise: &Value) -> Result<Value> {
        match promise.as_object().map(|o| o.slot().clone()) {
            Some(Slot::Promise(value)) => Ok(value),
            _ => Err(Error::mismatch("Promise", promise.type_of())),
        }
    }

    /// The stable wrapper object of a DOM node
    pub fn element(&self, id: NodeId) -> ObjectRef {
        if let Some(existing) = self.elements.borrow().get(&id) {
            return existing.clone();
        }
        let tag = self.dom().tag(id).unwrap_or("").to_string();
        let (class, ctor) = match tag.as_str() {
            "#document" => ("HTMLDocument", "Document"),
            "canvas" => ("HTMLCanvasElement", "HTMLCanvasElement"),
            "script" => ("HTMLScriptElement", "Element"),
            "iframe" => ("HTMLIFrameElement", "Element"),
            _ => ("HTMLElement", "Element"),
        };
        let prototype = self
            .prototype_of(ctor)
            .unwrap_or_else(|_| self.object_prototype().clone());
        let obj = Object::plain(class, Some(prototype));
        obj.set_slot(Slot::Element(id));
        self.elements.borrow_mut().insert(id, obj.clone());
        obj
    }

    /// Node behind an element wrapper
    pub fn node_of(&self, value: &Value) -> Result<NodeId> {
        match value.as_object().map(|o| o.slot().clone()) {
            Some(Slot::Element(id)) => Ok(id),
            _ => Err(Error::type_error("Illegal invocation")),
        }
    }

    /// The `document` wrapper
    pub fn document(&self) -> ObjectRef {
        let id = self.dom().document();
        self.element(id)
    }

    /// Detach and reclaim a node, dropping its wrapper
    pub fn remove_node(&self, id: NodeId) {
        let reclaimed: Vec<NodeId> = {
            let mut dom = self.dom_mut();
            dom.remove(id);
            self.elements
                .borrow()
                .keys()
                .filter(|k| !dom.contains(**k))
                .copied()
                .collect()
        };
        let mut elements = self.elements.borrow_mut();
        for k in reclaimed {
            elements.remove(&k);
        }
    }

    /// Sources passed to the real `eval`
    pub fn evaluated(&self) -> Vec<String> {
        self.evaluated.borrow().clone()
    }

    pub(crate) fn record_evaluation(&self, source: &str) {
        self.evaluated.borrow_mut().push(source.to_string());
    }

    // =========================================================================
    // Event loop
    // =========================================================================

    /// Queue a task
    pub fn set_timeout(&self, task: impl FnOnce(&Realm) + 'static) {
        self.tasks.borrow_mut().push_back(Box::new(task));
    }

    /// Register a mutation observer on `root`
    pub fn observe(
        &self,
        root: NodeId,
        options: ObserveOptions,
        callback: impl Fn(&Realm, &[MutationRecord]) + 'static,
    ) {
        self.observers.borrow_mut().push(Observer {
            root,
            options,
            callback: Rc::new(callback),
        });
    }

    /// Run `listener` once the document is parsed
    pub fn on_ready(&self, listener: impl FnOnce(&Realm) + 'static) {
        if self.dom().is_ready() {
            self.set_timeout(listener);
        } else {
            self.ready_listeners.borrow_mut().push(Box::new(listener));
        }
    }

    /// Fire `DOMContentLoaded`
    pub fn mark_ready(&self) {
        if !self.dom_mut().set_ready() {
            return;
        }
        let listeners = std::mem::take(&mut *self.ready_listeners.borrow_mut());
        for listener in listeners {
            listener(self);
        }
    }

    /// Deliver one batch of queued mutation records to every interested observer
    pub fn deliver_mutations(&self) -> bool {
        let records = self.dom_mut().take_records();
        if records.is_empty() {
            return false;
        }
        let observers: Vec<(NodeId, ObserveOptions, MutationCallback)> = self
            .observers
            .borrow()
            .iter()
            .map(|o| (o.root, o.options, o.callback.clone()))
            .collect();
        for (root, options, callback) in observers {
            let batch: Vec<MutationRecord> = {
                let dom = self.dom();
                records
                    .iter()
                    .filter(|r| match r {
                        MutationRecord::ChildList { .. } => options.child_list,
                        MutationRecord::Attributes { .. } => options.attributes,
                    })
                    .filter(|r| {
                        let target = r.target();
                        if options.subtree {
                            dom.is_inclusive_ancestor(root, target)
                        } else {
                            target == root
                        }
                    })
                    .cloned()
                    .collect()
            };
            if !batch.is_empty() {
                callback(self, &batch);
            }
        }
        true
    }

    /// Deliver mutations and run tasks until nothing is pending
    pub fn run_until_idle(&self) {
        loop {
            if self.deliver_mutations() {
                continue;
            }
            let task = self.tasks.borrow_mut().pop_front();
            match task {
                Some(task) => task(self),
                None => break,
            }
        }
    }
}
