//! Global nullification and detection-probe answers

use crate::error::Result;
use crate::host::{Realm, Value};
use crate::intercept::{CallHook, Constant, HookContext, Registry, Target};

/// Well-known trap-library globals; reading any of them yields `undefined`
pub const NULLIFIED_GLOBALS: &[&str] = &[
    "adblock",
    "BlockAdBlock",
    "FuckAdBlock",
    "Bait",
    "Trap",
    "AdServer",
];

/// Pin each trap global to `undefined`; returns how many were pinned
pub fn install_nullified_globals(realm: &Realm, registry: &Registry) -> usize {
    NULLIFIED_GLOBALS
        .iter()
        .filter(|name| {
            registry.install_accessor(
                realm,
                Target::global(realm, **name),
                Constant(Value::Undefined),
                None,
            )
        })
        .count()
}

/// `navigator.webdriver` reads `false`; notification permission reads `prompt`
pub fn install_probe_answers(realm: &Realm, registry: &Registry) -> Result<bool> {
    let webdriver = Target::on_prototype(realm, "Navigator", "webdriver")?;
    let answer = Constant(Value::Bool(false));
    let mut installed = registry.install(realm, webdriver, answer, Some("webdriver"));

    let navigator = realm.global_value("navigator")?;
    let permissions = realm.get(&navigator, "permissions")?;
    if let Some(permissions) = permissions.as_object() {
        let hook = CallHook(|cx: &HookContext<'_>, this: &Value, args: &[Value]| {
            let descriptor = args.first().cloned().unwrap_or_default();
            let name = cx.realm.get(&descriptor, "name")?;
            if name.as_str() == Some("notifications") {
                tracing::debug!("answered notifications permission probe");
                let status = cx.realm.new_record(
                    "PermissionStatus",
                    vec![("name", name.clone()), ("state", Value::from("prompt"))],
                );
                return Ok(cx.realm.resolved(Value::Object(status)));
            }
            cx.call_original(this, args)
        });
        let query = Target::new(permissions.clone(), "query");
        installed &= registry.install(realm, query, hook, Some("query"));
    }
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trap_globals_read_undefined() {
        let realm = Realm::new("https://example.com/");
        let registry = Registry::new(&realm);
        assert_eq!(install_nullified_globals(&realm, &registry), NULLIFIED_GLOBALS.len());
        realm
            .set(realm.global(), "BlockAdBlock", Value::from("lib"))
            .unwrap();
        assert!(realm.global_value("BlockAdBlock").unwrap().is_undefined());
        assert_eq!(realm.global_value("FuckAdBlock").unwrap().type_of(), "undefined");
    }

    #[test]
    fn test_probe_answers() {
        let realm = Realm::new("https://example.com/");
        let registry = Registry::new(&realm);
        assert!(install_probe_answers(&realm, &registry).unwrap());
        let nav = realm.global_value("navigator").unwrap();
        assert_eq!(realm.get(&nav, "webdriver").unwrap(), Value::Bool(false));

        let permissions = realm.get(&nav, "permissions").unwrap();
        let query = |name: &str| {
            let desc = realm.new_record("Descriptor", vec![("name", Value::from(name))]);
            let desc = Value::Object(desc);
            let promise = realm.invoke(&permissions, "query", &[desc]).unwrap();
            let status = realm.settle(&promise).unwrap();
            realm.get(&status, "state").unwrap()
        };
        assert_eq!(query("notifications"), Value::from("prompt"));
        assert_eq!(query("geolocation"), Value::from("granted"));
        assert_eq!(query("camera"), Value::from("prompt"));
    }
}
