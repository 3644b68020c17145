//! Script-list filtering and creation-time vetoing

use std::cell::Cell;
use std::rc::{Rc, Weak};

use super::classifier::{excerpt, is_trap, is_trap_url};
use crate::error::Result;
use crate::host::{NodeId, Object, ObjectRef, Realm, Value};
use crate::intercept::{CallHook, GetHook, HookContext, Interceptor, Registry, Target};

/// Text a script is judged by: inline body plus source URL
fn script_signature(realm: &Realm, id: NodeId) -> String {
    let dom = realm.dom();
    format!(
        "{} {}",
        dom.text(id).unwrap_or(""),
        dom.attribute(id, "src").unwrap_or("")
    )
}

/// Replace `document.scripts` with a freshly filtered view on every read
pub fn install_script_filter(realm: &Realm, registry: &Registry) -> Result<bool> {
    let target = Target::on_prototype(realm, "Document", "scripts")?;
    let hook = GetHook(|cx: &HookContext<'_>, this: &Value| {
        let live = cx.get_original(this)?;
        let realm = cx.realm;
        let mut kept = Vec::new();
        for item in realm.iterate(&live)? {
            let Ok(id) = realm.node_of(&item) else {
                kept.push(item);
                continue;
            };
            let signature = script_signature(realm, id);
            if is_trap(&signature) {
                if tracing::enabled!(tracing::Level::DEBUG) {
                    let text = excerpt(signature.trim());
                    tracing::debug!("hiding script from document.scripts: {}", text);
                }
            } else {
                kept.push(item);
            }
        }
        let proto = realm.prototype_of("HTMLCollection")?;
        Ok(Value::Object(realm.new_collection("HTMLCollection", proto, kept)))
    });
    Ok(registry.install(realm, target, hook, Some("scripts")))
}

/// Instrument every `script`/`iframe` created through `document.createElement`
///
/// The hook owns the registry its per-element guards go into, so guarding
/// lasts as long as the hook itself.
pub fn install_creation_veto(realm: &Realm, registry: &Registry) -> Result<bool> {
    let target = Target::on_prototype(realm, "Document", "createElement")?;
    let guards = registry.scoped();
    let hook = CallHook(move |cx: &HookContext<'_>, this: &Value, args: &[Value]| {
        let element = cx.call_original(this, args)?;
        let tag = args
            .first()
            .map(|t| t.to_display().to_ascii_lowercase())
            .unwrap_or_default();
        if tag == "script" || tag == "iframe" {
            if let Some(obj) = element.as_object() {
                guard_element(cx.realm, &guards, obj, tag == "script");
            }
        }
        Ok(element)
    });
    Ok(registry.install(realm, target, hook, Some("createElement")))
}

/// Per-element hooks on `setAttribute` and the `src` accessor
fn guard_element(realm: &Realm, registry: &Registry, element: &ObjectRef, is_script: bool) {
    let onload = Rc::new(OnloadOnce {
        element: Rc::downgrade(element),
        scheduled: Cell::new(false),
        is_script,
    });
    registry.install(
        realm,
        Target::new(element.clone(), "setAttribute"),
        AttributeVeto {
            onload: onload.clone(),
        },
        Some("setAttribute"),
    );
    registry.install(
        realm,
        Target::new(element.clone(), "src"),
        SrcVeto { onload },
        Some("src"),
    );
}

fn vetoes(realm: &Realm, raw: &str) -> bool {
    is_trap_url(realm.parsed_url().as_ref(), raw)
}

/// Fires a vetoed script's `onload` once, asynchronously
///
/// Holds the element weakly: the element's own hooks hold this.
struct OnloadOnce {
    element: Weak<Object>,
    scheduled: Cell<bool>,
    is_script: bool,
}

impl OnloadOnce {
    fn schedule(&self, realm: &Realm) {
        if !self.is_script || self.scheduled.replace(true) {
            return;
        }
        let Some(element) = self.element.upgrade() else {
            return;
        };
        let element = Value::Object(element);
        realm.set_timeout(move |realm| {
            let Ok(callback) = realm.get(&element, "onload") else {
                return;
            };
            if !callback.is_callable() {
                return;
            }
            let event = Value::Object(realm.new_record(
                "Event",
                vec![("type", Value::from("load")), ("target", element.clone())],
            ));
            if let Err(e) = realm.call(&callback, &element, &[event]) {
                tracing::debug!("onload of vetoed script threw: {}", e);
            }
        });
    }
}

struct AttributeVeto {
    onload: Rc<OnloadOnce>,
}

impl Interceptor for AttributeVeto {
    fn call(&self, cx: &HookContext<'_>, this: &Value, args: &[Value]) -> Result<Value> {
        let name = args.first().map(Value::to_display).unwrap_or_default();
        if name.eq_ignore_ascii_case("src") {
            let value = args.get(1).map(Value::to_display).unwrap_or_default();
            if vetoes(cx.realm, &value) {
                tracing::debug!("vetoed src attribute: {}", excerpt(&value));
                self.onload.schedule(cx.realm);
                return Ok(Value::Undefined);
            }
        }
        cx.call_original(this, args)
    }
}

struct SrcVeto {
    onload: Rc<OnloadOnce>,
}

impl Interceptor for SrcVeto {
    fn set(&self, cx: &HookContext<'_>, this: &Value, value: Value) -> Result<()> {
        let raw = value.to_display();
        if vetoes(cx.realm, &raw) {
            tracing::debug!("vetoed src property: {}", excerpt(&raw));
            self.onload.schedule(cx.realm);
            return Ok(());
        }
        cx.original.set(cx.realm, this, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::native;

    fn setup() -> (Realm, Rc<Registry>) {
        let realm = Realm::new("https://news.example.com/");
        let registry = Rc::new(Registry::new(&realm));
        (realm, registry)
    }

    fn add_script(realm: &Realm, src: Option<&str>, text: &str) -> NodeId {
        let mut dom = realm.dom_mut();
        let head = dom.head();
        let s = dom.create_element("script");
        if let Some(src) = src {
            dom.set_attribute(s, "src", src).unwrap();
        }
        dom.set_text(s, text).unwrap();
        dom.append_child(head, s).unwrap();
        s
    }

    #[test]
    fn test_filtered_view_keeps_order_and_shape() {
        let (realm, registry) = setup();
        let a = add_script(&realm, Some("/app.js"), "");
        add_script(&realm, Some("https://x.com/blockadblock.js"), "");
        let c = add_script(&realm, None, "init()");
        add_script(&realm, None, "if (adblock) punish()");
        assert!(install_script_filter(&realm, &registry).unwrap());

        let document = Value::Object(realm.document());
        let scripts = realm.get(&document, "scripts").unwrap();
        assert_eq!(realm.get(&scripts, "length").unwrap(), Value::from(2usize));
        let items: Vec<NodeId> = realm
            .iterate(&scripts)
            .unwrap()
            .iter()
            .map(|v| realm.node_of(v).unwrap())
            .collect();
        assert_eq!(items, vec![a, c]);
        let first = realm.invoke(&scripts, "item", &[Value::from(0.0)]).unwrap();
        assert_eq!(realm.node_of(&first).unwrap(), a);
    }

    #[test]
    fn test_filter_is_not_cached() {
        let (realm, registry) = setup();
        let s = add_script(&realm, None, "run()");
        install_script_filter(&realm, &registry).unwrap();
        let document = Value::Object(realm.document());
        let before = realm.get(&document, "scripts").unwrap();
        assert_eq!(realm.get(&before, "length").unwrap(), Value::from(1usize));
        realm.dom_mut().set_text(s, "new BlockAdBlock()").unwrap();
        let after = realm.get(&document, "scripts").unwrap();
        assert_eq!(realm.get(&after, "length").unwrap(), Value::from(0usize));
    }

    #[test]
    fn test_path_equivalence() {
        let (realm, registry) = setup();
        install_creation_veto(&realm, &registry).unwrap();
        let document = Value::Object(realm.document());

        let by_attr = realm
            .invoke(&document, "createElement", &[Value::from("script")])
            .unwrap();
        realm
            .invoke(
                &by_attr,
                "setAttribute",
                &[Value::from("src"), Value::from("//cdn.example.net/ads.js")],
            )
            .unwrap();

        let by_prop = realm
            .invoke(&document, "createElement", &[Value::from("SCRIPT")])
            .unwrap();
        realm
            .set(by_prop.as_object().unwrap(), "src", Value::from("/pagefair.js"))
            .unwrap();

        for el in [&by_attr, &by_prop] {
            let id = realm.node_of(el).unwrap();
            assert_eq!(realm.dom().attribute(id, "src"), None);
            assert_eq!(realm.get(el, "src").unwrap(), Value::from(""));
        }
    }

    #[test]
    fn test_clean_src_applies() {
        let (realm, registry) = setup();
        install_creation_veto(&realm, &registry).unwrap();
        let document = Value::Object(realm.document());
        let iframe = realm
            .invoke(&document, "createElement", &[Value::from("iframe")])
            .unwrap();
        realm
            .set(iframe.as_object().unwrap(), "src", Value::from("/embed/video"))
            .unwrap();
        assert_eq!(realm.get(&iframe, "src").unwrap(), Value::from("/embed/video"));
    }

    #[test]
    fn test_vetoed_script_onload_fires_once() {
        let (realm, registry) = setup();
        install_creation_veto(&realm, &registry).unwrap();
        let document = Value::Object(realm.document());
        let script = realm
            .invoke(&document, "createElement", &[Value::from("script")])
            .unwrap();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let onload = realm.new_function(
            "function () { done(); }",
            native(move |_, _, _| {
                h.set(h.get() + 1);
                Ok(Value::Undefined)
            }),
        );
        let obj = script.as_object().unwrap();
        realm.set(obj, "src", Value::from("/ads.js")).unwrap();
        realm.set(obj, "onload", Value::Object(onload)).unwrap();
        realm
            .invoke(&script, "setAttribute", &[Value::from("src"), Value::from("/ads.js")])
            .unwrap();
        assert_eq!(hits.get(), 0);
        realm.run_until_idle();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_page_host_does_not_veto_clean_src() {
        for page in ["https://ad.example.org/", "https://news.example.com/ad/"] {
            let realm = Realm::new(page);
            let registry = Registry::new(&realm);
            install_creation_veto(&realm, &registry).unwrap();
            let document = Value::Object(realm.document());
            let script = realm
                .invoke(&document, "createElement", &[Value::from("script")])
                .unwrap();
            realm
                .set(script.as_object().unwrap(), "src", Value::from("app.js"))
                .unwrap();
            let id = realm.node_of(&script).unwrap();
            assert_eq!(realm.dom().attribute(id, "src"), Some("app.js"), "{}", page);
        }
    }

    #[test]
    fn test_veto_outlives_registry_handle() {
        let (realm, registry) = setup();
        install_creation_veto(&realm, &registry).unwrap();
        drop(registry);

        let document = Value::Object(realm.document());
        let script = realm
            .invoke(&document, "createElement", &[Value::from("script")])
            .unwrap();
        realm
            .set(
                script.as_object().unwrap(),
                "src",
                Value::from("https://x.com/blockadblock.js"),
            )
            .unwrap();
        let id = realm.node_of(&script).unwrap();
        assert_eq!(realm.dom().attribute(id, "src"), None);
    }

    #[test]
    fn test_other_elements_untouched() {
        let (realm, registry) = setup();
        install_creation_veto(&realm, &registry).unwrap();
        let before = registry.hook_count();
        let document = Value::Object(realm.document());
        realm
            .invoke(&document, "createElement", &[Value::from("div")])
            .unwrap();
        assert_eq!(registry.hook_count(), before);
    }
}
