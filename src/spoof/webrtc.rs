//! Peer-connection removal and ICE candidate scrubbing

use std::sync::OnceLock;

use regex::Regex;

use crate::error::Result;
use crate::host::{Realm, Value};
use crate::intercept::{CallHook, HookContext, Interceptor, Registry, Target};

/// Constructors removed outright
pub const REMOVED_CONSTRUCTORS: &[&str] =
    &["RTCPeerConnection", "webkitRTCPeerConnection", "RTCDataChannel"];

static IPV4: OnceLock<Regex> = OnceLock::new();

fn ipv4() -> &'static Regex {
    IPV4.get_or_init(|| Regex::new(r"(\d{1,3}\.){3}\d{1,3}").expect("ipv4 pattern compiles"))
}

/// Replace every IPv4-looking substring with `0.0.0.0`
pub fn scrub_candidate(candidate: &str) -> String {
    ipv4().replace_all(candidate, "0.0.0.0").into_owned()
}

/// Rewrites `candidate` in the init dictionary before constructing
struct CandidateScrubber;

impl Interceptor for CandidateScrubber {
    fn construct(&self, cx: &HookContext<'_>, args: &[Value]) -> Result<Value> {
        let Some(init) = args.first().and_then(Value::as_object) else {
            return cx.construct_original(args);
        };
        let candidate = cx.realm.get_key(init, "candidate")?;
        let Some(raw) = candidate.as_str() else {
            return cx.construct_original(args);
        };
        let scrubbed = scrub_candidate(raw);
        if scrubbed != raw {
            tracing::debug!("scrubbed ICE candidate: {}", scrubbed);
        }
        let copy = cx.realm.new_object("Object");
        for key in init.own_keys() {
            let value = cx.realm.get_key(init, &key)?;
            cx.realm.set(&copy, &key, value)?;
        }
        cx.realm.set(&copy, "candidate", Value::from(scrubbed))?;

        let mut forwarded = args.to_vec();
        forwarded[0] = Value::Object(copy);
        cx.construct_original(&forwarded)
    }
}

pub fn install(realm: &Realm, registry: &Registry) -> bool {
    let mut ok = true;
    for name in REMOVED_CONSTRUCTORS {
        ok &= registry.define(realm, Target::global(realm, *name), Value::Undefined);
    }

    match realm
        .global_value("navigator")
        .and_then(|nav| realm.get(&nav, "mediaDevices"))
    {
        Ok(Value::Object(media)) => {
            let hook = CallHook(|cx: &HookContext<'_>, _: &Value, _: &[Value]| {
                tracing::debug!("enumerateDevices answered with no devices");
                Ok(cx.realm.resolved(Value::Object(cx.realm.new_array(Vec::new()))))
            });
            let target = Target::new(media, "enumerateDevices");
            ok &= registry.install(realm, target, hook, Some("enumerateDevices"));
        }
        _ => tracing::debug!("mediaDevices not present"),
    }

    let candidate_ctor = realm.global_value("RTCIceCandidate").unwrap_or_default();
    if candidate_ctor.is_callable() {
        ok &= registry.install(
            realm,
            Target::global(realm, "RTCIceCandidate"),
            CandidateScrubber,
            Some("RTCIceCandidate"),
        );
    }
    ok
}
