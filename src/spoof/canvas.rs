//! Canvas pixel noise on read and export

use super::noise::perturb_pixels;
use super::profile::SpoofProfile;
use crate::host::{Realm, Slot, Value};
use crate::intercept::{CallHook, HookContext, Registry, Target};

pub fn install(realm: &Realm, registry: &Registry, profile: &SpoofProfile) -> bool {
    let read = install_read_noise(realm, registry, profile.canvas_read_noise);
    let export = install_export_noise(realm, registry, profile.canvas_export_noise);
    read && export
}

/// `getImageData` returns a perturbed copy
fn install_read_noise(realm: &Realm, registry: &Registry, max: u8) -> bool {
    let Ok(target) = Target::on_prototype(realm, "CanvasRenderingContext2D", "getImageData") else {
        return false;
    };
    let hook = CallHook(move |cx: &HookContext<'_>, this: &Value, args: &[Value]| {
        let image = cx.call_original(this, args)?;
        let data = cx.realm.get(&image, "data")?;
        if let Some(buffer) = data.as_object() {
            if let Slot::Bytes(bytes) = &mut *buffer.slot_mut() {
                perturb_pixels(bytes, max);
                tracing::debug!("perturbed getImageData ({} bytes)", bytes.len());
            }
        }
        Ok(image)
    });
    registry.install(realm, target, hook, Some("getImageData"))
}

/// `toDataURL` serializes a perturbed bitmap, then the real pixels are restored
fn install_export_noise(realm: &Realm, registry: &Registry, max: u8) -> bool {
    let Ok(target) = Target::on_prototype(realm, "HTMLCanvasElement", "toDataURL") else {
        return false;
    };
    let hook = CallHook(move |cx: &HookContext<'_>, this: &Value, args: &[Value]| {
        let Ok(id) = cx.realm.node_of(this) else {
            return cx.call_original(this, args);
        };
        let saved = cx.realm.dom_mut().bitmap_mut(id).map(|bitmap| {
            let saved = bitmap.pixels.clone();
            perturb_pixels(&mut bitmap.pixels, max);
            saved
        });
        let Some(saved) = saved else {
            return cx.call_original(this, args);
        };
        let url = cx.call_original(this, args);
        if let Some(bitmap) = cx.realm.dom_mut().bitmap_mut(id) {
            bitmap.pixels = saved;
        }
        tracing::debug!("perturbed toDataURL export");
        url
    });
    registry.install(realm, target, hook, Some("toDataURL"))
}
