//! Integration tests for veil
//!
//! End-to-end page scenarios against the in-memory host surface.
//! Run with: RUST_LOG=veil=debug cargo test --test integration -- --nocapture

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use serde_json::json;
use veil::host::{native, NodeId, Realm, Value};
use veil::{
    Activation, Capability, Config, FileStore, InertReason, MemoryStore, Mode, Settings, Shield,
    Whitelist,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn add_script(realm: &Realm, src: Option<&str>, text: &str) -> NodeId {
    let mut dom = realm.dom_mut();
    let head = dom.head();
    let script = dom.create_element("script");
    if let Some(src) = src {
        dom.set_attribute(script, "src", src).unwrap();
    }
    dom.set_text(script, text).unwrap();
    dom.append_child(head, script).unwrap();
    script
}

fn global_source(realm: &Realm, name: &str) -> String {
    realm.stringify(&realm.global_value(name).unwrap()).unwrap()
}

fn navigator(realm: &Realm) -> Value {
    realm.global_value("navigator").unwrap()
}

fn document(realm: &Realm) -> Value {
    Value::Object(realm.document())
}

fn create(realm: &Realm, tag: &str) -> Value {
    realm
        .invoke(&document(realm), "createElement", &[Value::from(tag)])
        .unwrap()
}

// =============================================================================
// Activation scenarios
// =============================================================================

#[tokio::test]
async fn test_standard_mode_end_to_end() {
    init_tracing();
    let realm = Realm::new("https://news.example.com/article");
    let app = add_script(&realm, Some("/static/app.js"), "");
    add_script(&realm, Some("https://x.com/blockadblock.js"), "");

    let store = MemoryStore::new(json!({ "config": { "mode": "standard" } }));
    let activation = Shield::activate(&realm, &store).await.unwrap();
    let shield = activation.shield().expect("standard mode activates");
    assert_eq!(shield.mode(), Mode::Standard);

    // Trap script hidden from the live view
    let scripts = realm.get(&document(&realm), "scripts").unwrap();
    assert_eq!(realm.get(&scripts, "length").unwrap(), Value::from(1usize));
    let first = realm.invoke(&scripts, "item", &[Value::from(0.0)]).unwrap();
    assert_eq!(realm.node_of(&first).unwrap(), app);

    // Plugins hidden
    let plugins = realm.get(&navigator(&realm), "plugins").unwrap();
    assert_eq!(realm.get(&plugins, "length").unwrap(), Value::from(0usize));

    // WebRTC is heavy-only
    assert!(realm.global_value("RTCPeerConnection").unwrap().is_callable());
    assert!(!shield.capabilities().is_enabled(Capability::WebRtcProtection));

    for cap in [
        Capability::CanvasSpoofing,
        Capability::WebglSpoofing,
        Capability::BatterySpoofing,
    ] {
        assert!(shield.spoofed().contains(&cap), "{} not active", cap);
    }

    let battery = realm.invoke(&navigator(&realm), "getBattery", &[]).unwrap();
    let battery = realm.settle(&battery).unwrap();
    assert_eq!(realm.get(&battery, "level").unwrap(), Value::from(1.0));
    assert_eq!(realm.get(&battery, "charging").unwrap(), Value::from(true));

    let canvas = create(&realm, "canvas");
    let gl = realm
        .invoke(&canvas, "getContext", &[Value::from("webgl")])
        .unwrap();
    let vendor = realm
        .invoke(&gl, "getParameter", &[Value::from(37445.0)])
        .unwrap();
    assert_eq!(vendor, Value::from("Google Inc."));

    // Not in standard
    assert_eq!(
        realm.get(&navigator(&realm), "hardwareConcurrency").unwrap(),
        Value::from(12.0)
    );
}

#[tokio::test]
async fn test_heavy_mode_removes_webrtc_and_masks_hardware() {
    let realm = Realm::new("https://example.com/");
    let store = MemoryStore::new(json!({ "config": { "mode": "heavy" } }));
    let activation = Shield::activate(&realm, &store).await.unwrap();
    assert!(activation.is_active());

    assert_eq!(realm.global_value("RTCPeerConnection").unwrap(), Value::Undefined);
    let nav = navigator(&realm);
    assert_eq!(realm.get(&nav, "hardwareConcurrency").unwrap(), Value::from(4.0));
    assert_eq!(realm.get(&nav, "deviceMemory").unwrap(), Value::from(4.0));
}

#[tokio::test]
async fn test_countdown_only_custom_installs_nothing() {
    let realm = Realm::new("https://example.com/");
    let eval_before = global_source(&realm, "eval");
    add_script(&realm, Some("/blockadblock.js"), "");

    let store = MemoryStore::new(json!({
        "config": { "mode": "custom", "custom": { "countdownKiller": true } }
    }));
    let activation = Shield::activate(&realm, &store).await.unwrap();
    assert!(matches!(
        activation,
        Activation::Inert(InertReason::Inactive { mode: Mode::Custom })
    ));

    let scripts = realm.get(&document(&realm), "scripts").unwrap();
    assert_eq!(realm.get(&scripts, "length").unwrap(), Value::from(1usize));
    let plugins = realm.get(&navigator(&realm), "plugins").unwrap();
    assert_eq!(realm.get(&plugins, "length").unwrap(), Value::from(2usize));
    assert_eq!(global_source(&realm, "eval"), eval_before);
}

#[tokio::test]
async fn test_whitelisted_subdomain_is_untouched() {
    let realm = Realm::new("https://shop.trusted.org/cart");
    let method = |ctor: &str, key: &str| {
        realm
            .get_key(&realm.prototype_of(ctor).unwrap(), key)
            .unwrap()
    };
    let get_image_data = method("CanvasRenderingContext2D", "getImageData");
    let create_element = method("Document", "createElement");
    let settings = Settings::new(Config::new(Mode::Extreme))
        .with_whitelist(Whitelist::new(["ads.net", "trusted.org"]));
    let store = MemoryStore::from_settings(&settings).unwrap();

    let activation = Shield::activate(&realm, &store).await.unwrap();
    assert_eq!(
        activation.inert_reason(),
        Some(&InertReason::Whitelisted {
            host: "shop.trusted.org".into(),
            entry: "trusted.org".into()
        })
    );

    assert_eq!(method("CanvasRenderingContext2D", "getImageData"), get_image_data);
    assert_eq!(method("Document", "createElement"), create_element);
    assert!(realm.global_value("RTCPeerConnection").unwrap().is_callable());
}

#[tokio::test]
async fn test_absent_config_is_inert() {
    let realm = Realm::new("https://example.com/");
    let activation = Shield::activate(&realm, &MemoryStore::new(json!({}))).await.unwrap();
    assert_eq!(activation.inert_reason(), Some(&InertReason::NoConfig));

    let missing = FileStore::new(std::env::temp_dir().join("veil-missing-settings.json"));
    let activation = Shield::activate(&realm, &missing).await.unwrap();
    assert_eq!(activation.inert_reason(), Some(&InertReason::NoConfig));
}

#[tokio::test]
async fn test_file_store_activation() {
    let path = std::env::temp_dir().join(format!("veil-settings-{}.json", std::process::id()));
    tokio::fs::write(
        &path,
        r#"{"config":{"mode":"custom","custom":{"canvasSpoofing":true,"audioSpoofing":"yes"}}}"#,
    )
    .await
    .unwrap();

    let realm = Realm::new("https://example.com/");
    let activation = Shield::activate(&realm, &FileStore::new(&path)).await.unwrap();
    let shield = activation.shield().unwrap();
    assert_eq!(shield.spoofed(), &[Capability::CanvasSpoofing]);
    assert!(shield.suppression().is_none());

    tokio::fs::remove_file(&path).await.unwrap();
}

#[test]
fn test_malformed_store_is_an_error() {
    let realm = Realm::new("https://example.com/");
    let store = MemoryStore::new(json!("standard"));
    let outcome = tokio_test::block_on(Shield::activate(&realm, &store));
    assert!(matches!(outcome, Err(veil::Error::Config(_))));
}

// =============================================================================
// Trap suppression
// =============================================================================

#[test]
fn test_path_equivalence_and_single_onload() {
    let realm = Realm::new("https://example.com/");
    Shield::activate_with(&realm, Settings::new(Config::new(Mode::Standard)));

    let hits = Rc::new(Cell::new(0));
    let mut scripts = Vec::new();
    for by_attribute in [true, false] {
        let script = create(&realm, "script");
        let h = hits.clone();
        let onload = realm.new_function(
            "function () { loaded(); }",
            native(move |_, _, _| {
                h.set(h.get() + 1);
                Ok(Value::Undefined)
            }),
        );
        let obj = script.as_object().unwrap();
        realm.set(obj, "onload", Value::Object(onload)).unwrap();
        if by_attribute {
            realm
                .invoke(
                    &script,
                    "setAttribute",
                    &[Value::from("src"), Value::from("https://cdn.x.com/fuckadblock.js")],
                )
                .unwrap();
        } else {
            realm
                .set(obj, "src", Value::from("https://cdn.x.com/fuckadblock.js"))
                .unwrap();
        }
        scripts.push(script);
    }

    realm.run_until_idle();
    assert_eq!(hits.get(), 2);
    for script in &scripts {
        assert_eq!(realm.get(script, "src").unwrap(), Value::from(""));
    }

    // Later runs do not fire again
    realm.run_until_idle();
    assert_eq!(hits.get(), 2);
}

#[test]
fn test_guards_outlive_dropped_activation() {
    let realm = Realm::new("https://example.com/");
    let activation = Shield::activate_with(&realm, Settings::new(Config::new(Mode::Standard)));
    assert!(activation.is_active());
    drop(activation);

    let script = create(&realm, "script");
    realm
        .set(
            script.as_object().unwrap(),
            "src",
            Value::from("https://x.com/blockadblock.js"),
        )
        .unwrap();
    assert_eq!(realm.get(&script, "src").unwrap(), Value::from(""));

    let scripts = realm.get(&document(&realm), "scripts").unwrap();
    assert_eq!(realm.get(&scripts, "length").unwrap(), Value::from(0usize));
}

#[test]
fn test_clean_relative_src_on_trap_named_host() {
    for page in ["https://ad.example.org/", "https://news.example.com/ad/", "https://detect.io/"] {
        let realm = Realm::new(page);
        let _activation =
            Shield::activate_with(&realm, Settings::new(Config::new(Mode::Standard)));
        let script = create(&realm, "script");
        realm
            .set(script.as_object().unwrap(), "src", Value::from("app.js"))
            .unwrap();
        assert_eq!(realm.get(&script, "src").unwrap(), Value::from("app.js"), "{}", page);
    }
}

#[test]
fn test_inserted_inline_trap_swept() {
    let realm = Realm::new("https://example.com/");
    Shield::activate_with(&realm, Settings::new(Config::new(Mode::Standard)));

    let trap = add_script(&realm, None, "var bait = detect(); if (bait) lock();");
    let clean = add_script(&realm, None, "analytics.init()");
    realm.run_until_idle();

    let dom = realm.dom();
    assert!(!dom.contains(trap));
    assert!(dom.contains(clean));
}

#[test]
fn test_dynamic_code_vetoed() {
    let realm = Realm::new("https://example.com/");
    Shield::activate_with(&realm, Settings::new(Config::new(Mode::Standard)));

    let eval = realm.global_value("eval").unwrap();
    let vetoed = realm
        .call(
            &eval,
            &Value::Undefined,
            &[Value::from("if (adblock) window.location = '/blocked'")],
        )
        .unwrap();
    assert_eq!(vetoed, Value::Undefined);
    assert!(realm.evaluated().is_empty());

    realm
        .call(&eval, &Value::Undefined, &[Value::from("render()")])
        .unwrap();
    assert_eq!(realm.evaluated(), vec!["render()".to_string()]);

    let function = realm.global_value("Function").unwrap();
    let inert = realm
        .construct(&function, &[Value::from("debugger;")])
        .unwrap();
    assert!(inert.is_callable());
    assert_eq!(
        realm.call(&inert, &Value::Undefined, &[]).unwrap(),
        Value::Undefined
    );
}

// =============================================================================
// Stealth and spoofing
// =============================================================================

#[test]
fn test_wrappers_stringify_as_natives() {
    let realm = Realm::new("https://example.com/");
    let canvas_proto = realm.prototype_of("HTMLCanvasElement").unwrap();
    let element_proto = realm.prototype_of("Element").unwrap();
    let untouched = [
        realm.get_key(&element_proto, "getAttribute").unwrap(),
        realm.get_key(&element_proto, "appendChild").unwrap(),
        realm.global_value("Float32Array").unwrap(),
    ];
    let untouched_before: Vec<String> = untouched
        .iter()
        .map(|f| realm.stringify(f).unwrap())
        .collect();

    let activation = Shield::activate_with(&realm, Settings::new(Config::new(Mode::Extreme)));
    assert!(activation.is_active());

    let to_string = realm
        .get_key(realm.function_prototype(), "toString")
        .unwrap();
    assert_eq!(
        realm.stringify(&to_string).unwrap(),
        "function toString() { [native code] }"
    );
    assert_eq!(global_source(&realm, "eval"), "function eval() { [native code] }");
    assert_eq!(
        global_source(&realm, "Function"),
        "function Function() { [native code] }"
    );
    let to_data_url = realm.get_key(&canvas_proto, "toDataURL").unwrap();
    assert_eq!(
        realm.stringify(&to_data_url).unwrap(),
        "function toDataURL() { [native code] }"
    );

    let untouched_after: Vec<String> = untouched
        .iter()
        .map(|f| realm.stringify(f).unwrap())
        .collect();
    assert_eq!(untouched_before, untouched_after);
}

#[test]
fn test_canvas_reads_noisy_within_bounds() {
    let realm = Realm::new("https://example.com/");
    let canvas = create(&realm, "canvas");
    let ctx = realm
        .invoke(&canvas, "getContext", &[Value::from("2d")])
        .unwrap();
    realm
        .set(ctx.as_object().unwrap(), "fillStyle", Value::from("#808080"))
        .unwrap();
    realm
        .invoke(&ctx, "fillRect", &[0.0, 0.0, 64.0, 64.0].map(Value::from))
        .unwrap();

    let read = || {
        let image = realm
            .invoke(&ctx, "getImageData", &[0.0, 0.0, 32.0, 32.0].map(Value::from))
            .unwrap();
        let data = realm.get(&image, "data").unwrap();
        let bytes = match data.as_object().unwrap().slot().clone() {
            veil::host::Slot::Bytes(bytes) => bytes,
            other => panic!("unexpected slot {:?}", other),
        };
        bytes
    };
    let clean = read();

    Shield::activate_with(&realm, Settings::new(Config::new(Mode::Standard)));
    let a = read();
    let b = read();
    assert_ne!(a, b);
    for noisy in [&a, &b] {
        let max = clean
            .iter()
            .zip(noisy.iter())
            .map(|(x, y)| x.abs_diff(*y))
            .max()
            .unwrap();
        assert!(max <= 7);
    }
}

// =============================================================================
// Healing
// =============================================================================

#[test]
fn test_heal_throttle_and_ready_pass() {
    let realm = Realm::new("https://example.com/");
    let overlay = |class: &str| {
        let mut dom = realm.dom_mut();
        let body = dom.body();
        let el = dom.create_element("div");
        dom.set_attribute(el, "class", class).unwrap();
        dom.set_style(el, "position", "fixed").unwrap();
        dom.set_style(el, "z-index", "10000").unwrap();
        dom.append_child(body, el).unwrap();
        el
    };

    let activation = Shield::activate_with(&realm, Settings::new(Config::new(Mode::Standard)));
    let shield = activation.shield().unwrap();
    let healer = shield.healer().unwrap();

    let first = overlay("adblock-overlay");
    let body = realm.dom().body();
    realm.dom_mut().set_style(body, "overflow", "hidden").unwrap();
    realm.mark_ready();
    realm.run_until_idle();
    assert!(!realm.dom().contains(first));
    assert_eq!(realm.dom().style(body, "overflow"), None);

    // Within the window nothing happens
    let t0 = healer.last_pass().unwrap();
    let second = overlay("popup-wall");
    assert!(healer.heal_at(&realm, t0 + Duration::from_millis(500)).is_none());
    assert!(realm.dom().contains(second));

    let report = healer
        .heal_at(&realm, t0 + Duration::from_millis(1501))
        .unwrap();
    assert_eq!(report.removed, 1);
    assert!(!realm.dom().contains(second));
}
