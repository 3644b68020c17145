//! # Veil
//!
//! Page-embedded anti-fingerprinting and anti-adblock-trap shield.
//!
//! Veil runs inside a page's scripting host. It neutralizes scripts built to
//! detect or punish a blocking client, reverts full-screen lockouts, and
//! answers fingerprinting probes with plausible, non-identifying values. Every
//! hook it installs looks native to page-level introspection.
//!
//! ## Features
//!
//! - **Trap Suppression** - script filtering, creation-time vetoes, dynamic-code vetoes
//! - **Page Healing** - throttled removal of overlay and scroll-lock lockouts
//! - **Fingerprint Spoofing** - canvas, WebGL, audio, geometry, hardware, battery, WebRTC
//! - **Stealth** - wrapped functions stringify as the natives they replace
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use veil::{host::Realm, MemoryStore, Shield};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> veil::Result<()> {
//!     let realm = Realm::new("https://example.com/");
//!     let store = MemoryStore::new(serde_json::json!({
//!         "config": { "mode": "standard" },
//!         "whitelist": ["trusted.org"]
//!     }));
//!
//!     let activation = Shield::activate(&realm, &store).await?;
//!     if let Some(shield) = activation.shield() {
//!         println!("spoofing {:?}", shield.spoofed());
//!     }
//!
//!     realm.mark_ready();
//!     realm.run_until_idle();
//!     Ok(())
//! }
//! ```
//!
//! ## Custom Mode
//!
//! ```rust,no_run
//! use veil::{host::Realm, Config, Settings, Shield};
//!
//! let realm = Realm::new("https://example.com/");
//! let settings = Settings::new(Config::custom(["canvasSpoofing", "antiAdblockKiller"]));
//! let activation = Shield::activate_with(&realm, settings);
//! assert!(activation.is_active());
//! ```

pub mod activation;
pub mod config;
pub mod error;
pub mod heal;
pub mod host;
pub mod intercept;
pub mod shield;
pub mod spoof;
pub mod traps;

// Re-exports
pub use activation::{Capability, CapabilitySet};
pub use config::{Config, ConfigSource, FileStore, MemoryStore, Mode, Settings, Whitelist};
pub use error::{Error, Result};
pub use heal::{HealReport, Healer};
pub use intercept::{Interceptor, Registry, Target};
pub use shield::{Activation, InertReason, Shield, ShieldOptions};
pub use spoof::{SpoofProfile, SyntheticRect};
pub use traps::{SuppressionOptions, TrapSuppression};
