//! WebGL vendor and renderer masking

use super::profile::SpoofProfile;
use crate::host::bootstrap::{UNMASKED_RENDERER_WEBGL, UNMASKED_VENDOR_WEBGL};
use crate::host::{Realm, Value};
use crate::intercept::{CallHook, HookContext, Registry, Target};

const CONTEXTS: &[&str] = &["WebGLRenderingContext", "WebGL2RenderingContext"];

/// Answer the two unmasked identifier queries on every present WebGL context
pub fn install(realm: &Realm, registry: &Registry, profile: &SpoofProfile) -> bool {
    let mut installed = 0;
    for context in CONTEXTS {
        let Ok(target) = Target::on_prototype(realm, context, "getParameter") else {
            tracing::debug!("{} not present", context);
            continue;
        };
        let vendor = profile.webgl_vendor.clone();
        let renderer = profile.webgl_renderer.clone();
        let hook = CallHook(move |cx: &HookContext<'_>, this: &Value, args: &[Value]| {
            match args.first().and_then(Value::as_f64) {
                Some(p) if p == UNMASKED_VENDOR_WEBGL => Ok(Value::from(vendor.as_str())),
                Some(p) if p == UNMASKED_RENDERER_WEBGL => Ok(Value::from(renderer.as_str())),
                _ => cx.call_original(this, args),
            }
        });
        if registry.install(realm, target, hook, Some("getParameter")) {
            installed += 1;
        }
    }
    installed > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_masked_others_pass_through() {
        let realm = Realm::new("https://example.com/");
        let registry = Registry::new(&realm);
        let profile = SpoofProfile::default();
        assert!(install(&realm, &registry, &profile));

        let document = Value::Object(realm.document());
        let canvas = realm
            .invoke(&document, "createElement", &[Value::from("canvas")])
            .unwrap();
        for kind in ["webgl", "webgl2"] {
            let gl = realm.invoke(&canvas, "getContext", &[Value::from(kind)]).unwrap();
            let query = |p: f64| realm.invoke(&gl, "getParameter", &[Value::from(p)]).unwrap();
            assert_eq!(query(UNMASKED_VENDOR_WEBGL), Value::from("Google Inc."));
            assert_eq!(
                query(UNMASKED_RENDERER_WEBGL),
                Value::from(profile.webgl_renderer.as_str())
            );
            assert_eq!(query(7936.0), Value::from("WebKit"));
        }
    }
}
