//! Fingerprint Spoofing
//!
//! Independent spoofers, one per capability flag. Each installs its hooks
//! eagerly and then stays passive until page code calls the hooked API. A
//! spoofer whose API is missing from the engine does nothing.

pub mod audio;
pub mod battery;
pub mod canvas;
pub mod geometry;
pub mod hardware;
pub mod noise;
pub mod opener;
pub mod plugins;
pub mod profile;
pub mod webgl;
pub mod webrtc;

pub use profile::{SpoofProfile, SyntheticRect};

use crate::activation::{Capability, CapabilitySet};
use crate::host::Realm;
use crate::intercept::Registry;

/// Install the spoofer behind `capability`; false when it has none or could not install
pub fn install_capability(
    realm: &Realm,
    registry: &Registry,
    capability: Capability,
    profile: &SpoofProfile,
) -> bool {
    match capability {
        Capability::ClientRectsSpoofing => geometry::install(realm, registry, profile),
        Capability::HidePlugins => plugins::install(realm, registry),
        Capability::NullifyOpener => opener::install(realm, registry),
        Capability::CanvasSpoofing => canvas::install(realm, registry, profile),
        Capability::WebglSpoofing => webgl::install(realm, registry, profile),
        Capability::BatterySpoofing => battery::install(realm, registry),
        Capability::AudioSpoofing => audio::install(realm, registry, profile),
        Capability::HardwareSpoofing => hardware::install(realm, registry, profile),
        Capability::WebRtcProtection => webrtc::install(realm, registry),
        Capability::AntiAdblockKiller | Capability::CountdownKiller => false,
    }
}

/// Whether `capability` is handled by a spoofer
pub fn is_spoofer(capability: Capability) -> bool {
    !matches!(
        capability,
        Capability::AntiAdblockKiller | Capability::CountdownKiller
    )
}

/// Install every enabled spoofer; returns those that installed
pub fn install_all(
    realm: &Realm,
    registry: &Registry,
    capabilities: &CapabilitySet,
    profile: &SpoofProfile,
) -> Vec<Capability> {
    let mut active = Vec::new();
    for capability in capabilities.iter().filter(|c| is_spoofer(*c)) {
        if install_capability(realm, registry, capability, profile) {
            tracing::debug!("spoofing {}", capability);
            active.push(capability);
        } else {
            tracing::debug!("{} left as-is (API absent or locked)", capability);
        }
    }
    active
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Value;

    #[test]
    fn test_only_enabled_spoofers_install() {
        let realm = Realm::new("https://example.com/");
        let registry = Registry::new(&realm);
        let caps: CapabilitySet = [Capability::HidePlugins, Capability::AntiAdblockKiller]
            .into_iter()
            .collect();
        let active = install_all(&realm, &registry, &caps, &SpoofProfile::default());
        assert_eq!(active, vec![Capability::HidePlugins]);

        let nav = realm.global_value("navigator").unwrap();
        assert_eq!(realm.get(&nav, "hardwareConcurrency").unwrap(), Value::from(12.0));
        assert!(realm.global_value("RTCPeerConnection").unwrap().is_callable());
    }

    #[test]
    fn test_every_spoofer_installs_on_default_surface() {
        let realm = Realm::new("https://example.com/");
        let registry = Registry::new(&realm);
        let all: CapabilitySet = Capability::ALL.into_iter().collect();
        let active = install_all(&realm, &registry, &all, &SpoofProfile::default());
        assert_eq!(active.len(), 9);
        assert!(registry.skipped().is_empty());
    }
}
