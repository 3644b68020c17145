//! Fixed layout geometry

use super::profile::{SpoofProfile, SyntheticRect};
use crate::host::bootstrap::{rect, rect_list};
use crate::host::{Realm, Value};
use crate::intercept::{CallHook, HookContext, Registry, Target};

const SURFACES: &[&str] = &["Element", "Range"];

fn synthetic(realm: &Realm, r: SyntheticRect) -> Value {
    Value::Object(rect(realm, r.x, r.y, r.width, r.height))
}

/// Replace rectangle queries on elements and ranges with one synthetic box
pub fn install(realm: &Realm, registry: &Registry, profile: &SpoofProfile) -> bool {
    let r = profile.rect;
    let mut installed = 0;
    for surface in SURFACES {
        if let Ok(target) = Target::on_prototype(realm, surface, "getBoundingClientRect") {
            let hook = CallHook(move |cx: &HookContext<'_>, _: &Value, _: &[Value]| {
                Ok(synthetic(cx.realm, r))
            });
            if registry.install(realm, target, hook, Some("getBoundingClientRect")) {
                installed += 1;
            }
        }
        if let Ok(target) = Target::on_prototype(realm, surface, "getClientRects") {
            let hook = CallHook(move |cx: &HookContext<'_>, _: &Value, _: &[Value]| {
                let list = rect_list(cx.realm, vec![synthetic(cx.realm, r)])?;
                Ok(Value::Object(list))
            });
            if registry.install(realm, target, hook, Some("getClientRects")) {
                installed += 1;
            }
        }
    }
    installed > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_is_synthetic() {
        let realm = Realm::new("https://example.com/");
        let body = realm.dom().body();
        realm.dom_mut().set_style(body, "width", "1234px").unwrap();
        let registry = Registry::new(&realm);
        assert!(install(&realm, &registry, &SpoofProfile::default()));

        let el = Value::Object(realm.element(body));
        let r = realm.invoke(&el, "getBoundingClientRect", &[]).unwrap();
        assert_eq!(realm.get(&r, "width").unwrap(), Value::from(100.0));
        assert_eq!(realm.get(&r, "bottom").unwrap(), Value::from(100.0));

        let list = realm.invoke(&el, "getClientRects", &[]).unwrap();
        assert_eq!(realm.get(&list, "length").unwrap(), Value::from(1usize));
        let first = realm.invoke(&list, "item", &[Value::from(0.0)]).unwrap();
        assert_eq!(realm.get(&first, "right").unwrap(), Value::from(100.0));

        let document = Value::Object(realm.document());
        let range = realm.invoke(&document, "createRange", &[]).unwrap();
        let rr = realm.invoke(&range, "getBoundingClientRect", &[]).unwrap();
        assert_eq!(realm.get(&rr, "x").unwrap(), Value::from(0.0));
        assert_eq!(realm.get(&rr, "height").unwrap(), Value::from(100.0));
    }
}
