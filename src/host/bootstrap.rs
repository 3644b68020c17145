//! Default browser surface
//!
//! Populates a fresh [`Realm`] with the globals, prototypes and native
//! behaviors a Chromium-like page sees: DOM, canvas, WebGL, audio, navigator
//! and WebRTC. Values returned here play the part of the real machine (real
//! GPU, real core count, real layout) that spoofers hide.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::value::{arg, native, native_ctor, native_source, NativeCtor, NativeFn};
use super::{Bitmap, NodeId, Object, ObjectRef, Property, Realm, Slot, Value};
use crate::error::{Error, Result};

/// `UNMASKED_VENDOR_WEBGL`
pub const UNMASKED_VENDOR_WEBGL: f64 = 37445.0;
/// `UNMASKED_RENDERER_WEBGL`
pub const UNMASKED_RENDERER_WEBGL: f64 = 37446.0;

const REAL_GPU_VENDOR: &str = "Intel Inc.";
const REAL_GPU_RENDERER: &str = "Intel(R) Iris(TM) Plus Graphics 640";
const REAL_CORES: f64 = 12.0;
const REAL_MEMORY_GB: f64 = 16.0;
/// Largest pixel count a canvas or image region may cover
const MAX_CANVAS_PIXELS: u64 = 1 << 24;

/// Install the default surface on `realm`
pub(crate) fn install(realm: &Realm) {
    install_function(realm);
    install_collections(realm);
    install_dom(realm);
    install_canvas(realm);
    install_webgl(realm);
    install_audio(realm);
    install_navigator(realm);
    install_webrtc(realm);
    install_window(realm);
}

// =========================================================================
// Helpers
// =========================================================================

fn define(target: &ObjectRef, key: &str, property: Property) {
    if let Err(e) = target.define_own(key, property) {
        tracing::warn!("bootstrap could not define {}: {}", key, e);
    }
}

fn method(realm: &Realm, target: &ObjectRef, name: &str, call: NativeFn) {
    let f = realm.new_native(name, call);
    define(target, name, Property::data(f));
}

fn getter(realm: &Realm, target: &ObjectRef, name: &str, get: NativeFn) {
    let g = realm.new_native(&format!("get {}", name), get);
    define(target, name, Property::accessor(Some(g), None));
}

fn accessor(realm: &Realm, target: &ObjectRef, name: &str, get: NativeFn, set: NativeFn) {
    let g = realm.new_native(&format!("get {}", name), get);
    let s = realm.new_native(&format!("set {}", name), set);
    define(target, name, Property::accessor(Some(g), Some(s)));
}

/// Define a global constructor and return its prototype
fn interface(
    realm: &Realm,
    name: &str,
    parent: Option<ObjectRef>,
    construct: Option<NativeCtor>,
) -> ObjectRef {
    let proto = Object::plain(
        name,
        Some(parent.unwrap_or_else(|| realm.object_prototype().clone())),
    );
    let type_name = name.to_string();
    let construct = construct.unwrap_or_else(|| {
        native_ctor(|_, _| Err(Error::type_error("Illegal constructor")))
    });
    let ctor = realm.new_constructor(
        native_source(name),
        native(move |_, _, _| {
            Err(Error::type_error(format!(
                "Failed to construct '{}': Please use the 'new' operator",
                type_name
            )))
        }),
        construct,
    );
    define(&ctor, "prototype", Property::frozen(proto.clone()));
    define(&proto, "constructor", Property::data(ctor.clone()));
    define(realm.global(), name, Property::data(ctor));
    proto
}

fn instance(realm: &Realm, ctor_name: &str, class: &str) -> ObjectRef {
    let proto = realm
        .prototype_of(ctor_name)
        .unwrap_or_else(|_| realm.object_prototype().clone());
    Object::plain(class, Some(proto))
}

/// Numeric coercion of an argument
fn number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => *n,
        Value::Str(s) => s.trim().parse().unwrap_or(f64::NAN),
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => f64::NAN,
    }
}

/// Non-negative integer coercion, saturating at `u32::MAX`
fn dimension(value: &Value) -> u32 {
    number(value).max(0.0) as u32
}

/// Pixel count of a `w` by `h` region, refused past the canvas limit
fn region_pixels(w: u32, h: u32) -> Result<usize> {
    let pixels = u64::from(w) * u64::from(h);
    if pixels > MAX_CANVAS_PIXELS {
        return Err(Error::index_size(format!(
            "The requested region ({}x{}) is too large",
            w, h
        )));
    }
    Ok(pixels as usize)
}

fn px(value: Option<&str>) -> f64 {
    value
        .map(|v| v.trim().trim_end_matches("px"))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.0)
}

fn list_of(value: &Value) -> Vec<Value> {
    match value.as_object().map(|o| o.slot().clone()) {
        Some(Slot::List(items)) => items,
        _ => Vec::new(),
    }
}

/// `@@iterator` shared by arrays and collections
fn iterator_native() -> NativeFn {
    native(|realm, this, _| {
        let iter = realm.new_object("Array Iterator");
        iter.set_slot(Slot::List(list_of(this)));
        Ok(Value::Object(iter))
    })
}

pub(crate) fn rect(realm: &Realm, x: f64, y: f64, width: f64, height: f64) -> ObjectRef {
    let rect = instance(realm, "DOMRect", "DOMRect");
    for (key, value) in [
        ("x", x),
        ("y", y),
        ("width", width),
        ("height", height),
        ("top", y),
        ("left", x),
        ("right", x + width),
        ("bottom", y + height),
    ] {
        define(&rect, key, Property::data(value));
    }
    rect
}

pub(crate) fn rect_list(realm: &Realm, rects: Vec<Value>) -> Result<ObjectRef> {
    let proto = realm.prototype_of("DOMRectList")?;
    Ok(realm.new_collection("DOMRectList", proto, rects))
}

// =========================================================================
// Functions, eval, collections
// =========================================================================

fn install_function(realm: &Realm) {
    let fp = realm.function_prototype().clone();
    method(
        realm,
        &fp,
        "toString",
        native(|_, this, _| {
            this.as_object()
                .and_then(|o| o.source().map(|s| Value::from(s.to_string())))
                .ok_or_else(|| {
                    Error::type_error(
                        "Function.prototype.toString requires that 'this' be a Function",
                    )
                })
        }),
    );

    let build: NativeCtor = native_ctor(|realm, args| {
        let (params, body) = match args.split_last() {
            Some((body, params)) => (
                params
                    .iter()
                    .map(Value::to_display)
                    .collect::<Vec<_>>()
                    .join(","),
                body.to_display(),
            ),
            None => (String::new(), String::new()),
        };
        let source = format!("function anonymous({}\n) {{\n{}\n}}", params, body);
        Ok(Value::Object(realm.new_function(
            source,
            native(|_, _, _| Ok(Value::Undefined)),
        )))
    });
    let call_build = build.clone();
    let function = realm.new_constructor(
        native_source("Function"),
        native(move |realm, _, args| call_build(realm, args)),
        build,
    );
    define(&function, "prototype", Property::frozen(fp.clone()));
    define(&fp, "constructor", Property::data(function.clone()));
    define(realm.global(), "Function", Property::data(function));

    let eval = realm.new_native(
        "eval",
        native(|realm, _, args| match args.first() {
            Some(Value::Str(source)) => {
                realm.record_evaluation(source);
                Ok(Value::Undefined)
            }
            Some(other) => Ok(other.clone()),
            None => Ok(Value::Undefined),
        }),
    );
    define(realm.global(), "eval", Property::data(eval));

    let ap = realm.array_prototype().clone();
    define(&ap, "@@iterator", Property::data(realm.new_native("values", iterator_native())));
}

fn install_collections(realm: &Realm) {
    let collection = interface(realm, "HTMLCollection", None, None);
    method(
        realm,
        &collection,
        "item",
        native(|_, this, args| {
            let index = number(&arg(args, 0));
            let items = list_of(this);
            Ok(if index >= 0.0 {
                items.get(index as usize).cloned().unwrap_or(Value::Null)
            } else {
                Value::Null
            })
        }),
    );
    method(
        realm,
        &collection,
        "namedItem",
        native(|realm, this, args| {
            let name = arg(args, 0).to_display();
            let dom = realm.dom();
            Ok(list_of(this)
                .into_iter()
                .find(|item| {
                    realm.node_of(item).ok().is_some_and(|id| {
                        dom.attribute(id, "name") == Some(name.as_str())
                            || dom.attribute(id, "id") == Some(name.as_str())
                    })
                })
                .unwrap_or(Value::Null))
        }),
    );
    define(
        &collection,
        "@@iterator",
        Property::data(realm.new_native("values", iterator_native())),
    );

    let rects = interface(realm, "DOMRectList", None, None);
    method(
        realm,
        &rects,
        "item",
        native(|_, this, args| {
            let index = number(&arg(args, 0)).max(0.0) as usize;
            Ok(list_of(this).get(index).cloned().unwrap_or(Value::Null))
        }),
    );
    define(
        &rects,
        "@@iterator",
        Property::data(realm.new_native("values", iterator_native())),
    );
    interface(realm, "DOMRect", None, None);

    for name in ["PluginArray", "MimeTypeArray"] {
        let proto = interface(realm, name, None, None);
        method(
            realm,
            &proto,
            "item",
            native(|_, this, args| {
                let index = number(&arg(args, 0)).max(0.0) as usize;
                Ok(list_of(this).get(index).cloned().unwrap_or(Value::Null))
            }),
        );
        method(
            realm,
            &proto,
            "namedItem",
            native(|realm, this, args| {
                let name = arg(args, 0);
                for item in list_of(this) {
                    let candidate = realm.get(&item, "name")?;
                    if candidate.same(&name) {
                        return Ok(item);
                    }
                }
                Ok(Value::Null)
            }),
        );
        method(realm, &proto, "refresh", native(|_, _, _| Ok(Value::Undefined)));
        define(
            &proto,
            "@@iterator",
            Property::data(realm.new_native("values", iterator_native())),
        );
    }
}

// =========================================================================
// DOM
// =========================================================================

fn install_dom(realm: &Realm) {
    let document = interface(realm, "Document", None, None);
    method(
        realm,
        &document,
        "createElement",
        native(|realm, _, args| {
            let tag = arg(args, 0).to_display();
            let id = realm.dom_mut().create_element(&tag);
            Ok(Value::Object(realm.element(id)))
        }),
    );
    method(
        realm,
        &document,
        "createRange",
        native(|realm, _, _| Ok(Value::Object(instance(realm, "Range", "Range")))),
    );
    getter(
        realm,
        &document,
        "scripts",
        native(|realm, _, _| {
            let ids = realm.dom().scripts();
            let items = ids
                .into_iter()
                .map(|id| Value::Object(realm.element(id)))
                .collect();
            let proto = realm.prototype_of("HTMLCollection")?;
            Ok(Value::Object(realm.new_collection("HTMLCollection", proto, items)))
        }),
    );
    getter(
        realm,
        &document,
        "body",
        native(|realm, _, _| {
            let id = realm.dom().body();
            Ok(Value::Object(realm.element(id)))
        }),
    );
    getter(
        realm,
        &document,
        "head",
        native(|realm, _, _| {
            let id = realm.dom().head();
            Ok(Value::Object(realm.element(id)))
        }),
    );
    getter(
        realm,
        &document,
        "documentElement",
        native(|realm, _, _| {
            let id = realm.dom().document_element();
            Ok(Value::Object(realm.element(id)))
        }),
    );

    let element = interface(realm, "Element", None, None);
    method(
        realm,
        &element,
        "setAttribute",
        native(|realm, this, args| {
            let id = realm.node_of(this)?;
            let name = arg(args, 0).to_display();
            let value = arg(args, 1).to_display();
            realm.dom_mut().set_attribute(id, &name, &value)?;
            Ok(Value::Undefined)
        }),
    );
    method(
        realm,
        &element,
        "getAttribute",
        native(|realm, this, args| {
            let id = realm.node_of(this)?;
            let name = arg(args, 0).to_display();
            Ok(realm
                .dom()
                .attribute(id, &name)
                .map(Value::from)
                .unwrap_or(Value::Null))
        }),
    );
    method(
        realm,
        &element,
        "appendChild",
        native(|realm, this, args| {
            let parent = realm.node_of(this)?;
            let child = arg(args, 0);
            let child_id = realm.node_of(&child)?;
            realm.dom_mut().append_child(parent, child_id)?;
            Ok(child)
        }),
    );
    method(
        realm,
        &element,
        "remove",
        native(|realm, this, _| {
            let id = realm.node_of(this)?;
            realm.remove_node(id);
            Ok(Value::Undefined)
        }),
    );
    method(
        realm,
        &element,
        "attachShadow",
        native(|realm, this, _| {
            let id = realm.node_of(this)?;
            let root = realm.dom_mut().attach_shadow(id)?;
            Ok(Value::Object(realm.element(root)))
        }),
    );
    getter(
        realm,
        &element,
        "shadowRoot",
        native(|realm, this, _| {
            let id = realm.node_of(this)?;
            let root = realm.dom().node(id).and_then(|n| n.shadow_root);
            Ok(root
                .map(|r| Value::Object(realm.element(r)))
                .unwrap_or(Value::Null))
        }),
    );
    getter(
        realm,
        &element,
        "tagName",
        native(|realm, this, _| {
            let id = realm.node_of(this)?;
            let tag = realm.dom().tag(id).unwrap_or("").to_ascii_uppercase();
            Ok(Value::from(tag))
        }),
    );
    for (prop, attr) in [("src", "src"), ("name", "name"), ("id", "id"), ("className", "class")] {
        accessor(
            realm,
            &element,
            prop,
            native(move |realm, this, _| {
                let id = realm.node_of(this)?;
                Ok(Value::from(realm.dom().attribute(id, attr).unwrap_or("")))
            }),
            native(move |realm, this, args| {
                let id = realm.node_of(this)?;
                let value = arg(args, 0).to_display();
                realm.dom_mut().set_attribute(id, attr, &value)?;
                Ok(Value::Undefined)
            }),
        );
    }
    accessor(
        realm,
        &element,
        "textContent",
        native(|realm, this, _| {
            let id = realm.node_of(this)?;
            Ok(Value::from(realm.dom().text(id).unwrap_or("")))
        }),
        native(|realm, this, args| {
            let id = realm.node_of(this)?;
            realm.dom_mut().set_text(id, &arg(args, 0).to_display())?;
            Ok(Value::Undefined)
        }),
    );
    method(
        realm,
        &element,
        "getBoundingClientRect",
        native(|realm, this, _| {
            let (x, y, w, h) = layout_box(realm, realm.node_of(this)?);
            Ok(Value::Object(rect(realm, x, y, w, h)))
        }),
    );
    method(
        realm,
        &element,
        "getClientRects",
        native(|realm, this, _| {
            let (x, y, w, h) = layout_box(realm, realm.node_of(this)?);
            let rect = Value::Object(rect(realm, x, y, w, h));
            Ok(Value::Object(rect_list(realm, vec![rect])?))
        }),
    );

    let range = interface(realm, "Range", None, None);
    method(
        realm,
        &range,
        "getBoundingClientRect",
        native(|realm, _, _| Ok(Value::Object(rect(realm, 8.0, 8.0, 120.5, 18.0)))),
    );
    method(
        realm,
        &range,
        "getClientRects",
        native(|realm, _, _| {
            let rect = Value::Object(rect(realm, 8.0, 8.0, 120.5, 18.0));
            Ok(Value::Object(rect_list(realm, vec![rect])?))
        }),
    );

    let doc = realm.document();
    define(realm.global(), "document", Property::frozen(doc));
}

/// Layout box of an element, from its inline geometry
fn layout_box(realm: &Realm, id: NodeId) -> (f64, f64, f64, f64) {
    let dom = realm.dom();
    (
        px(dom.style(id, "left")),
        px(dom.style(id, "top")),
        px(dom.style(id, "width")),
        px(dom.style(id, "height")),
    )
}

// =========================================================================
// Canvas
// =========================================================================

fn canvas_node(realm: &Realm, this: &Value) -> Result<NodeId> {
    let id = realm.node_of(this)?;
    if realm.dom().bitmap(id).is_none() {
        return Err(Error::type_error("Illegal invocation"));
    }
    Ok(id)
}

fn install_canvas(realm: &Realm) {
    let element = realm
        .prototype_of("Element")
        .unwrap_or_else(|_| realm.object_prototype().clone());
    let canvas = interface(realm, "HTMLCanvasElement", Some(element), None);
    method(
        realm,
        &canvas,
        "getContext",
        native(|realm, this, args| {
            canvas_node(realm, this)?;
            let kind = arg(args, 0).to_display();
            let (ctor, class) = match kind.as_str() {
                "2d" => ("CanvasRenderingContext2D", "CanvasRenderingContext2D"),
                "webgl" | "experimental-webgl" => {
                    ("WebGLRenderingContext", "WebGLRenderingContext")
                }
                "webgl2" => ("WebGL2RenderingContext", "WebGL2RenderingContext"),
                _ => return Ok(Value::Null),
            };
            let ctx = instance(realm, ctor, class);
            ctx.set_slot(realm.node_of(this).map(Slot::Element)?);
            define(&ctx, "canvas", Property::data(this.clone()));
            Ok(Value::Object(ctx))
        }),
    );
    method(
        realm,
        &canvas,
        "toDataURL",
        native(|realm, this, _| {
            let id = canvas_node(realm, this)?;
            let dom = realm.dom();
            let pixels = dom.bitmap(id).map(|b| b.pixels.as_slice()).unwrap_or(&[]);
            Ok(Value::from(format!(
                "data:image/png;base64,{}",
                STANDARD.encode(pixels)
            )))
        }),
    );
    for dim in ["width", "height"] {
        accessor(
            realm,
            &canvas,
            dim,
            native(move |realm, this, _| {
                let id = canvas_node(realm, this)?;
                let dom = realm.dom();
                let b = dom.bitmap(id);
                Ok(Value::from(
                    b.map(|b| if dim == "width" { b.width } else { b.height })
                        .unwrap_or(0),
                ))
            }),
            native(move |realm, this, args| {
                let id = canvas_node(realm, this)?;
                let size = dimension(&arg(args, 0));
                let mut dom = realm.dom_mut();
                if let Some(b) = dom.bitmap_mut(id) {
                    let (w, h) = if dim == "width" {
                        (size, b.height)
                    } else {
                        (b.width, size)
                    };
                    region_pixels(w, h)?;
                    *b = Bitmap::new(w, h);
                }
                Ok(Value::Undefined)
            }),
        );
    }

    let ctx2d = interface(realm, "CanvasRenderingContext2D", None, None);
    define(&ctx2d, "fillStyle", Property::data("#000000"));
    method(
        realm,
        &ctx2d,
        "getImageData",
        native(|realm, this, args| {
            let id = realm.node_of(this)?;
            let x = dimension(&arg(args, 0));
            let y = dimension(&arg(args, 1));
            let w = dimension(&arg(args, 2));
            let h = dimension(&arg(args, 3));
            region_pixels(w, h)?;
            let data = {
                let dom = realm.dom();
                let bitmap = dom
                    .bitmap(id)
                    .ok_or_else(|| Error::type_error("Illegal invocation"))?;
                read_region(bitmap, x, y, w, h)
            };
            Ok(Value::Object(image_data(realm, w, h, data)))
        }),
    );
    method(
        realm,
        &ctx2d,
        "putImageData",
        native(|realm, this, args| {
            let id = realm.node_of(this)?;
            let image = arg(args, 0);
            let dx = dimension(&arg(args, 1));
            let dy = dimension(&arg(args, 2));
            let w = dimension(&realm.get(&image, "width")?);
            let h = dimension(&realm.get(&image, "height")?);
            region_pixels(w, h)?;
            let bytes = match realm.get(&image, "data")?.as_object().map(|o| o.slot().clone()) {
                Some(Slot::Bytes(bytes)) => bytes,
                _ => return Err(Error::type_error("parameter 1 is not of type 'ImageData'")),
            };
            let mut dom = realm.dom_mut();
            if let Some(bitmap) = dom.bitmap_mut(id) {
                write_region(bitmap, dx, dy, w, h, &bytes);
            }
            Ok(Value::Undefined)
        }),
    );
    method(
        realm,
        &ctx2d,
        "fillRect",
        native(|realm, this, args| {
            let id = realm.node_of(this)?;
            let color = parse_color(&realm.get(this, "fillStyle")?.to_display());
            let x = dimension(&arg(args, 0));
            let y = dimension(&arg(args, 1));
            let w = dimension(&arg(args, 2));
            let h = dimension(&arg(args, 3));
            // Only the part inside the canvas is ever drawn
            let (w, h) = {
                let dom = realm.dom();
                match dom.bitmap(id) {
                    Some(b) => (
                        w.min(b.width.saturating_sub(x)),
                        h.min(b.height.saturating_sub(y)),
                    ),
                    None => (0, 0),
                }
            };
            let fill: Vec<u8> = std::iter::repeat(color)
                .take(region_pixels(w, h)?)
                .flatten()
                .collect();
            let mut dom = realm.dom_mut();
            if let Some(bitmap) = dom.bitmap_mut(id) {
                write_region(bitmap, x, y, w, h, &fill);
            }
            Ok(Value::Undefined)
        }),
    );
}

fn image_data(realm: &Realm, width: u32, height: u32, data: Vec<u8>) -> ObjectRef {
    let bytes = realm.new_object("Uint8ClampedArray");
    define(&bytes, "length", Property::data(data.len()));
    bytes.set_slot(Slot::Bytes(data));
    realm.new_record(
        "ImageData",
        vec![
            ("width", Value::from(width)),
            ("height", Value::from(height)),
            ("data", Value::Object(bytes)),
        ],
    )
}

/// Byte offset of pixel (`x`, `y`), if it lies inside the bitmap
fn pixel_offset(bitmap: &Bitmap, x: Option<u32>, y: Option<u32>) -> Option<usize> {
    let (x, y) = (x?, y?);
    if x >= bitmap.width || y >= bitmap.height {
        return None;
    }
    Some((y as usize * bitmap.width as usize + x as usize) * 4)
}

fn read_region(bitmap: &Bitmap, x: u32, y: u32, w: u32, h: u32) -> Vec<u8> {
    let mut out = vec![0u8; w as usize * h as usize * 4];
    for row in 0..h {
        for col in 0..w {
            let Some(src) = pixel_offset(bitmap, x.checked_add(col), y.checked_add(row)) else {
                continue;
            };
            let dst = (row as usize * w as usize + col as usize) * 4;
            out[dst..dst + 4].copy_from_slice(&bitmap.pixels[src..src + 4]);
        }
    }
    out
}

fn write_region(bitmap: &mut Bitmap, x: u32, y: u32, w: u32, h: u32, data: &[u8]) {
    for row in 0..h {
        for col in 0..w {
            let src = (row as usize * w as usize + col as usize) * 4;
            if src + 4 > data.len() {
                return;
            }
            let Some(dst) = pixel_offset(bitmap, x.checked_add(col), y.checked_add(row)) else {
                continue;
            };
            bitmap.pixels[dst..dst + 4].copy_from_slice(&data[src..src + 4]);
        }
    }
}

fn parse_color(style: &str) -> [u8; 4] {
    let hex = style.trim().trim_start_matches('#');
    if hex.len() == 6 {
        if let Ok(rgb) = u32::from_str_radix(hex, 16) {
            return [(rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8, 255];
        }
    }
    [0, 0, 0, 255]
}

// =========================================================================
// WebGL, audio
// =========================================================================

fn install_webgl(realm: &Realm) {
    for name in ["WebGLRenderingContext", "WebGL2RenderingContext"] {
        let proto = interface(realm, name, None, None);
        method(
            realm,
            &proto,
            "getParameter",
            native(|_, _, args| {
                let p = number(&arg(args, 0));
                Ok(if p == UNMASKED_VENDOR_WEBGL {
                    Value::from(REAL_GPU_VENDOR)
                } else if p == UNMASKED_RENDERER_WEBGL {
                    Value::from(REAL_GPU_RENDERER)
                } else if p == 7936.0 {
                    Value::from("WebKit")
                } else if p == 7937.0 {
                    Value::from("WebKit WebGL")
                } else {
                    Value::Null
                })
            }),
        );
    }
}

fn float_array(realm: &Realm, samples: Vec<f32>) -> ObjectRef {
    let arr = instance(realm, "Float32Array", "Float32Array");
    define(&arr, "length", Property::data(samples.len()));
    arr.set_slot(Slot::Floats(samples));
    arr
}

fn install_audio(realm: &Realm) {
    interface(
        realm,
        "Float32Array",
        None,
        Some(native_ctor(|realm, args| {
            let len = number(&arg(args, 0)).max(0.0) as usize;
            Ok(Value::Object(float_array(realm, vec![0.0; len])))
        })),
    );

    let analyser = interface(
        realm,
        "AnalyserNode",
        None,
        Some(native_ctor(|realm, _| {
            Ok(Value::Object(instance(realm, "AnalyserNode", "AnalyserNode")))
        })),
    );
    method(
        realm,
        &analyser,
        "getFloatFrequencyData",
        native(|_, _, args| {
            if let Some(obj) = arg(args, 0).as_object() {
                if let Slot::Floats(samples) = &mut *obj.slot_mut() {
                    for (i, s) in samples.iter_mut().enumerate() {
                        *s = -100.0 + i as f32 * 0.25;
                    }
                }
            }
            Ok(Value::Undefined)
        }),
    );

    let buffer = interface(
        realm,
        "AudioBuffer",
        None,
        Some(native_ctor(|realm, args| {
            let options = arg(args, 0);
            let len = match &options {
                Value::Object(_) => number(&realm.get(&options, "length")?),
                other => number(other),
            };
            let len = if len.is_nan() { 0 } else { len.max(0.0) as usize };
            let samples = (0..len).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
            let obj = instance(realm, "AudioBuffer", "AudioBuffer");
            define(&obj, "length", Property::data(len));
            obj.set_slot(Slot::Floats(samples));
            Ok(Value::Object(obj))
        })),
    );
    method(
        realm,
        &buffer,
        "copyFromChannel",
        native(|_, this, args| {
            let source = match this.as_object().map(|o| o.slot().clone()) {
                Some(Slot::Floats(samples)) => samples,
                _ => return Err(Error::type_error("Illegal invocation")),
            };
            let start = number(&arg(args, 2));
            let start = if start.is_nan() { 0 } else { start.max(0.0) as usize };
            if let Some(dest) = arg(args, 0).as_object() {
                if let Slot::Floats(out) = &mut *dest.slot_mut() {
                    for (i, s) in out.iter_mut().enumerate() {
                        *s = source.get(start + i).copied().unwrap_or(0.0);
                    }
                }
            }
            Ok(Value::Undefined)
        }),
    );
}

// =========================================================================
// Navigator
// =========================================================================

fn install_navigator(realm: &Realm) {
    let nav = interface(realm, "Navigator", None, None);
    getter(
        realm,
        &nav,
        "hardwareConcurrency",
        native(|_, _, _| Ok(Value::from(REAL_CORES))),
    );
    getter(
        realm,
        &nav,
        "deviceMemory",
        native(|_, _, _| Ok(Value::from(REAL_MEMORY_GB))),
    );
    getter(realm, &nav, "webdriver", native(|_, _, _| Ok(Value::Bool(false))));
    getter(
        realm,
        &nav,
        "plugins",
        native(|realm, _, _| {
            let items = ["PDF Viewer", "Chrome PDF Viewer"]
                .into_iter()
                .map(|name| {
                    Value::Object(realm.new_record(
                        "Plugin",
                        vec![
                            ("name", Value::from(name)),
                            ("filename", Value::from("internal-pdf-viewer")),
                        ],
                    ))
                })
                .collect();
            let proto = realm.prototype_of("PluginArray")?;
            Ok(Value::Object(realm.new_collection("PluginArray", proto, items)))
        }),
    );
    getter(
        realm,
        &nav,
        "mimeTypes",
        native(|realm, _, _| {
            let items = ["application/pdf", "text/pdf"]
                .into_iter()
                .map(|ty| {
                    Value::Object(realm.new_record("MimeType", vec![("type", Value::from(ty))]))
                })
                .collect();
            let proto = realm.prototype_of("MimeTypeArray")?;
            Ok(Value::Object(realm.new_collection("MimeTypeArray", proto, items)))
        }),
    );
    method(
        realm,
        &nav,
        "getBattery",
        native(|realm, _, _| {
            let battery = realm.new_record(
                "BatteryManager",
                vec![
                    ("charging", Value::Bool(false)),
                    ("chargingTime", Value::from(f64::INFINITY)),
                    ("dischargingTime", Value::from(8520.0)),
                    ("level", Value::from(0.64)),
                ],
            );
            Ok(realm.resolved(Value::Object(battery)))
        }),
    );
    method(
        realm,
        &nav,
        "getGamepads",
        native(|realm, _, _| Ok(Value::Object(realm.new_array(vec![Value::Null; 4])))),
    );
    method(
        realm,
        &nav,
        "getVRDisplays",
        native(|realm, _, _| Ok(realm.resolved(Value::Object(realm.new_array(Vec::new()))))),
    );

    let navigator = instance(realm, "Navigator", "Navigator");

    let permissions = realm.new_object("Permissions");
    method(
        realm,
        &permissions,
        "query",
        native(|realm, _, args| {
            let name = realm.get(&arg(args, 0), "name")?.to_display();
            let state = match name.as_str() {
                "notifications" => "denied",
                "geolocation" => "granted",
                _ => "prompt",
            };
            let status = realm.new_record(
                "PermissionStatus",
                vec![("name", Value::from(name)), ("state", Value::from(state))],
            );
            Ok(realm.resolved(Value::Object(status)))
        }),
    );
    define(&navigator, "permissions", Property::data(permissions));

    let media = realm.new_object("MediaDevices");
    method(
        realm,
        &media,
        "enumerateDevices",
        native(|realm, _, _| {
            let devices = [("audioinput", "default"), ("videoinput", "c2b7f1")]
                .into_iter()
                .map(|(kind, id)| {
                    Value::Object(realm.new_record(
                        "MediaDeviceInfo",
                        vec![("kind", Value::from(kind)), ("deviceId", Value::from(id))],
                    ))
                })
                .collect();
            Ok(realm.resolved(Value::Object(realm.new_array(devices))))
        }),
    );
    define(&navigator, "mediaDevices", Property::data(media));
    define(realm.global(), "navigator", Property::frozen(navigator));
}

// =========================================================================
// WebRTC, window
// =========================================================================

fn install_webrtc(realm: &Realm) {
    interface(
        realm,
        "RTCPeerConnection",
        None,
        Some(native_ctor(|realm, _| {
            Ok(Value::Object(instance(
                realm,
                "RTCPeerConnection",
                "RTCPeerConnection",
            )))
        })),
    );
    if let Ok(ctor) = realm.global_value("RTCPeerConnection") {
        define(realm.global(), "webkitRTCPeerConnection", Property::data(ctor));
    }
    interface(realm, "RTCDataChannel", None, None);
    interface(
        realm,
        "RTCIceCandidate",
        None,
        Some(native_ctor(|realm, args| {
            let candidate = realm.get(&arg(args, 0), "candidate")?.to_display();
            let obj = instance(realm, "RTCIceCandidate", "RTCIceCandidate");
            define(&obj, "candidate", Property::data(candidate));
            Ok(Value::Object(obj))
        })),
    );
}

fn install_window(realm: &Realm) {
    let global = realm.global().clone();
    define(&global, "window", Property::frozen(global.clone()));
    let opener = realm.new_object("Window");
    define(&global, "opener", Property::data(opener));
}
