//! Audio sample jitter

use super::noise::jitter_samples;
use super::profile::SpoofProfile;
use crate::host::{Realm, Slot, Value};
use crate::intercept::{CallHook, HookContext, Registry, Target};

/// Jitter the float buffer passed as the first argument after the real call fills it
fn jitter_output(
    realm: &Realm,
    registry: &Registry,
    interface: &str,
    method: &'static str,
    amplitude: f32,
) -> bool {
    let Ok(target) = Target::on_prototype(realm, interface, method) else {
        tracing::debug!("{} not present", interface);
        return false;
    };
    let hook = CallHook(move |cx: &HookContext<'_>, this: &Value, args: &[Value]| {
        let out = cx.call_original(this, args)?;
        if let Some(dest) = args.first().and_then(Value::as_object) {
            if let Slot::Floats(samples) = &mut *dest.slot_mut() {
                jitter_samples(samples, amplitude);
                tracing::debug!("jittered {} ({} samples)", method, samples.len());
            }
        }
        Ok(out)
    });
    registry.install(realm, target, hook, Some(method))
}

pub fn install(realm: &Realm, registry: &Registry, profile: &SpoofProfile) -> bool {
    let analyser = jitter_output(
        realm,
        registry,
        "AnalyserNode",
        "getFloatFrequencyData",
        profile.frequency_jitter,
    );
    let buffer = jitter_output(
        realm,
        registry,
        "AudioBuffer",
        "copyFromChannel",
        profile.sample_jitter,
    );
    analyser || buffer
}
