//! Shield activation
//!
//! The per-page entry point. Configuration is read once, then the gates run
//! in a fixed order: whitelist, configuration, flag resolution. Only a page
//! that passes every gate gets a registry, trap suppression, healing and the
//! enabled spoofers.

use std::rc::Rc;

use crate::activation::{self, Capability, CapabilitySet};
use crate::config::{ConfigSource, Mode, Settings};
use crate::error::Result;
use crate::heal::{HealReport, Healer};
use crate::host::Realm;
use crate::intercept::Registry;
use crate::spoof::{self, SpoofProfile};
use crate::traps::{SuppressionOptions, TrapSuppression};

/// Why a page was left untouched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InertReason {
    /// Hostname ends with a whitelist entry
    Whitelisted { host: String, entry: String },
    /// The store held no configuration
    NoConfig,
    /// The configuration enables nothing this crate acts on
    Inactive { mode: Mode },
}

/// Outcome of activating on one page
#[derive(Debug)]
pub enum Activation {
    Inert(InertReason),
    Active(Shield),
}

impl Activation {
    pub fn is_active(&self) -> bool {
        matches!(self, Activation::Active(_))
    }

    pub fn shield(&self) -> Option<&Shield> {
        match self {
            Activation::Active(shield) => Some(shield),
            Activation::Inert(_) => None,
        }
    }

    pub fn inert_reason(&self) -> Option<&InertReason> {
        match self {
            Activation::Inert(reason) => Some(reason),
            Activation::Active(_) => None,
        }
    }
}

/// Overrides for the installed behaviors
#[derive(Debug, Clone, Default)]
pub struct ShieldOptions {
    pub suppression: SuppressionOptions,
    pub profile: SpoofProfile,
}

/// Active protection on one page
#[derive(Debug)]
pub struct Shield {
    mode: Mode,
    capabilities: CapabilitySet,
    registry: Rc<Registry>,
    suppression: Option<TrapSuppression>,
    healer: Option<Rc<Healer>>,
    spoofed: Vec<Capability>,
}

impl Shield {
    /// Load settings from `source` and activate
    pub async fn activate(realm: &Realm, source: &impl ConfigSource) -> Result<Activation> {
        let settings = source.load().await?;
        Ok(Self::activate_with(realm, settings))
    }

    /// Activate with already-loaded settings
    pub fn activate_with(realm: &Realm, settings: Settings) -> Activation {
        Self::activate_with_options(realm, settings, ShieldOptions::default())
    }

    /// Activate with explicit suppression switches and spoof values
    pub fn activate_with_options(
        realm: &Realm,
        settings: Settings,
        options: ShieldOptions,
    ) -> Activation {
        // Whitelist gate
        if let Some(host) = realm.hostname() {
            if let Some(entry) = settings.whitelist.matches(&host) {
                tracing::info!("{} whitelisted by {:?}, staying inert", host, entry);
                return Activation::Inert(InertReason::Whitelisted {
                    entry: entry.to_string(),
                    host,
                });
            }
        }

        // Configuration gate
        let Some(config) = settings.config.as_ref() else {
            tracing::info!("no configuration, staying inert");
            return Activation::Inert(InertReason::NoConfig);
        };
        let capabilities = activation::resolve(Some(config)).unwrap_or_default();
        if !capabilities.is_core_active() {
            tracing::info!("mode {} enables no core capability", config.mode);
            return Activation::Inert(InertReason::Inactive { mode: config.mode });
        }

        tracing::info!(
            "activating in {} mode on {} ({} capabilities)",
            config.mode,
            realm.url(),
            capabilities.len()
        );

        // Stringification hook goes in before anything else
        let registry = Rc::new(Registry::new(realm));

        let (suppression, healer) = if capabilities.is_enabled(Capability::AntiAdblockKiller) {
            let suppression = TrapSuppression::install(realm, &registry, options.suppression);
            (Some(suppression), Some(Healer::install(realm)))
        } else {
            (None, None)
        };

        let spoofed = spoof::install_all(realm, &registry, &capabilities, &options.profile);

        Activation::Active(Shield {
            mode: config.mode,
            capabilities,
            registry,
            suppression,
            healer,
            spoofed,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Resolved flags for this page
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn registry(&self) -> &Rc<Registry> {
        &self.registry
    }

    pub fn suppression(&self) -> Option<&TrapSuppression> {
        self.suppression.as_ref()
    }

    pub fn healer(&self) -> Option<&Rc<Healer>> {
        self.healer.as_ref()
    }

    /// Spoofers that installed
    pub fn spoofed(&self) -> &[Capability] {
        &self.spoofed
    }

    /// Run a throttled healing pass now, if healing is on
    pub fn heal_now(&self, realm: &Realm) -> Option<HealReport> {
        self.healer.as_ref()?.heal(realm)
    }
}
