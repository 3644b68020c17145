//! Empty plugin and MIME-type enumeration

use crate::host::{Realm, Value};
use crate::intercept::{GetHook, HookContext, Registry, Target};

/// `(navigator property, collection interface)`
const ENUMERATIONS: &[(&str, &str)] = &[("plugins", "PluginArray"), ("mimeTypes", "MimeTypeArray")];

pub fn install(realm: &Realm, registry: &Registry) -> bool {
    let mut installed = 0;
    for &(key, interface) in ENUMERATIONS {
        let Ok(target) = Target::on_prototype(realm, "Navigator", key) else {
            continue;
        };
        let hook = GetHook(move |cx: &HookContext<'_>, _: &Value| {
            let proto = cx
                .realm
                .prototype_of(interface)
                .unwrap_or_else(|_| cx.realm.object_prototype().clone());
            Ok(Value::Object(cx.realm.new_collection(interface, proto, Vec::new())))
        });
        if registry.install(realm, target, hook, Some(key)) {
            installed += 1;
        }
    }
    installed == ENUMERATIONS.len()
}
