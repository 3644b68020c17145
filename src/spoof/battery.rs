//! Constant battery snapshot

use crate::host::{Realm, Value};
use crate::intercept::{CallHook, HookContext, Registry, Target};

/// Replace `getBattery` when the engine has one
pub fn install(realm: &Realm, registry: &Registry) -> bool {
    let Ok(target) = Target::on_prototype(realm, "Navigator", "getBattery") else {
        return false;
    };
    let present = realm
        .get_key(&target.object, "getBattery")
        .is_ok_and(|f| f.is_callable());
    if !present {
        tracing::debug!("getBattery not present");
        return false;
    }
    let hook = CallHook(|cx: &HookContext<'_>, _: &Value, _: &[Value]| {
        let battery = cx.realm.new_record(
            "BatteryManager",
            vec![
                ("charging", Value::Bool(true)),
                ("chargingTime", Value::from(0.0)),
                ("dischargingTime", Value::from(f64::INFINITY)),
                ("level", Value::from(1.0)),
                ("onchargingchange", Value::Null),
                ("onlevelchange", Value::Null),
            ],
        );
        Ok(cx.realm.resolved(Value::Object(battery)))
    });
    registry.install(realm, target, hook, Some("getBattery"))
}
