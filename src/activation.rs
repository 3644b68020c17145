//! Activation Resolver
//!
//! Maps a [`Config`] to the capability flags enabled for one page load.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{Config, Mode};

/// A named on/off feature switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    #[serde(rename = "clientRectsSpoofing")]
    ClientRectsSpoofing,
    #[serde(rename = "hidePlugins")]
    HidePlugins,
    #[serde(rename = "nullifyOpener")]
    NullifyOpener,
    #[serde(rename = "canvasSpoofing")]
    CanvasSpoofing,
    #[serde(rename = "webglSpoofing")]
    WebglSpoofing,
    #[serde(rename = "batterySpoofing")]
    BatterySpoofing,
    #[serde(rename = "audioSpoofing")]
    AudioSpoofing,
    #[serde(rename = "hardwareSpoofing")]
    HardwareSpoofing,
    #[serde(rename = "webRTCProtection")]
    WebRtcProtection,
    #[serde(rename = "antiAdblockKiller")]
    AntiAdblockKiller,
    #[serde(rename = "countdownKiller")]
    CountdownKiller,
}

impl Capability {
    pub const ALL: [Capability; 11] = [
        Capability::ClientRectsSpoofing,
        Capability::HidePlugins,
        Capability::NullifyOpener,
        Capability::CanvasSpoofing,
        Capability::WebglSpoofing,
        Capability::BatterySpoofing,
        Capability::AudioSpoofing,
        Capability::HardwareSpoofing,
        Capability::WebRtcProtection,
        Capability::AntiAdblockKiller,
        Capability::CountdownKiller,
    ];

    /// Stored name
    pub fn name(&self) -> &'static str {
        match self {
            Capability::ClientRectsSpoofing => "clientRectsSpoofing",
            Capability::HidePlugins => "hidePlugins",
            Capability::NullifyOpener => "nullifyOpener",
            Capability::CanvasSpoofing => "canvasSpoofing",
            Capability::WebglSpoofing => "webglSpoofing",
            Capability::BatterySpoofing => "batterySpoofing",
            Capability::AudioSpoofing => "audioSpoofing",
            Capability::HardwareSpoofing => "hardwareSpoofing",
            Capability::WebRtcProtection => "webRTCProtection",
            Capability::AntiAdblockKiller => "antiAdblockKiller",
            Capability::CountdownKiller => "countdownKiller",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Whether this flag drives behavior in this crate
    ///
    /// `countdownKiller` belongs to a separate per-page script.
    pub fn is_core(&self) -> bool {
        !matches!(self, Capability::CountdownKiller)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const LIGHT: &[Capability] = &[
    Capability::ClientRectsSpoofing,
    Capability::HidePlugins,
    Capability::NullifyOpener,
];

const STANDARD: &[Capability] = &[
    Capability::CanvasSpoofing,
    Capability::WebglSpoofing,
    Capability::BatterySpoofing,
    Capability::AntiAdblockKiller,
    Capability::CountdownKiller,
];

const HEAVY: &[Capability] = &[
    Capability::AudioSpoofing,
    Capability::HardwareSpoofing,
    Capability::WebRtcProtection,
];

/// Capabilities a fixed mode enables; empty for custom and unknown modes
pub fn mode_table(mode: Mode) -> Vec<Capability> {
    let tiers: &[&[Capability]] = match mode {
        Mode::Light => &[LIGHT],
        Mode::Standard => &[LIGHT, STANDARD],
        Mode::Heavy | Mode::Extreme => &[LIGHT, STANDARD, HEAVY],
        Mode::Custom | Mode::Unknown => &[],
    };
    tiers.iter().flat_map(|t| t.iter().copied()).collect()
}

/// Resolved flags; read-only once built
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    enabled: BTreeSet<Capability>,
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(caps: I) -> Self {
        Self {
            enabled: caps.into_iter().collect(),
        }
    }
}

impl CapabilitySet {
    pub fn is_enabled(&self, capability: Capability) -> bool {
        self.enabled.contains(&capability)
    }

    /// Whether any flag this crate acts on is on
    pub fn is_core_active(&self) -> bool {
        self.enabled.iter().any(Capability::is_core)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.enabled.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.enabled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }
}

/// Resolve a configuration; `None` means the core stays inactive
pub fn resolve(config: Option<&Config>) -> Option<CapabilitySet> {
    let config = config?;
    let set = match config.mode {
        Mode::Custom => Capability::ALL
            .into_iter()
            .filter(|c| config.custom_enabled(c.name()))
            .collect(),
        mode => mode_table(mode).into_iter().collect(),
    };
    Some(set)
}
