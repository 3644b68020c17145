//! Processor, memory and device enumeration

use super::profile::SpoofProfile;
use crate::host::{Realm, Value};
use crate::intercept::{CallHook, Constant, HookContext, Registry, Target};

pub fn install(realm: &Realm, registry: &Registry, profile: &SpoofProfile) -> bool {
    let mut ok = true;
    let constants = [
        ("hardwareConcurrency", f64::from(profile.hardware_concurrency)),
        ("deviceMemory", f64::from(profile.device_memory)),
    ];
    for (key, value) in constants {
        match Target::on_prototype(realm, "Navigator", key) {
            Ok(target) => {
                ok &= registry.install(realm, target, Constant(Value::from(value)), Some(key))
            }
            Err(e) => tracing::debug!("{} not spoofed: {}", key, e),
        }
    }

    if let Ok(target) = Target::on_prototype(realm, "Navigator", "getVRDisplays") {
        ok &= registry.define(realm, target, Value::Undefined);
    }
    if let Ok(target) = Target::on_prototype(realm, "Navigator", "getGamepads") {
        let hook = CallHook(|cx: &HookContext<'_>, _: &Value, _: &[Value]| {
            Ok(Value::Object(cx.realm.new_array(Vec::new())))
        });
        ok &= registry.install(realm, target, hook, Some("getGamepads"));
    }
    ok
}
