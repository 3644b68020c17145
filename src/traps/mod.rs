//! Trap Suppression
//!
//! Neutralizes scripts built to detect or punish a blocking client. Each
//! behavior installs on its own; one that cannot install never blocks the
//! others.

pub mod classifier;
pub mod dynamic_code;
pub mod globals;
pub mod observer;
pub mod scripts;

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::host::Realm;
use crate::intercept::Registry;

pub use classifier::{has_debugger_directive, is_trap, is_trap_url};
pub use observer::{ScriptSweeper, SeenSet};

/// Per-behavior switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SuppressionOptions {
    /// Filter `document.scripts`
    pub script_filter: bool,
    /// Veto trap `src` on created scripts and iframes
    pub creation_veto: bool,
    /// Remove inserted inline trap scripts
    pub mutation_sweep: bool,
    /// Veto trap `eval` and `debugger` functions
    pub dynamic_code: bool,
    /// Pin trap-library globals to `undefined`
    pub global_nullify: bool,
    /// Answer `webdriver` and permission probes
    pub probe_answers: bool,
}

impl Default for SuppressionOptions {
    fn default() -> Self {
        Self {
            script_filter: true,
            creation_veto: true,
            mutation_sweep: true,
            dynamic_code: true,
            global_nullify: true,
            probe_answers: true,
        }
    }
}

/// Installed suppression behaviors
#[derive(Debug, Default)]
pub struct TrapSuppression {
    /// Behaviors that installed
    pub installed: Vec<&'static str>,
    /// Behaviors that failed to install
    pub failed: Vec<&'static str>,
    sweeper: Option<Rc<ScriptSweeper>>,
}

impl TrapSuppression {
    /// Install every enabled behavior
    pub fn install(realm: &Realm, registry: &Rc<Registry>, options: SuppressionOptions) -> Self {
        let mut this = Self::default();

        if options.script_filter {
            this.record("script_filter", scripts::install_script_filter(realm, registry));
        }
        if options.creation_veto {
            this.record("creation_veto", scripts::install_creation_veto(realm, registry));
        }
        if options.mutation_sweep {
            this.sweeper = Some(ScriptSweeper::install(realm));
            this.installed.push("mutation_sweep");
        }
        if options.dynamic_code {
            let eval = dynamic_code::install_eval_guard(realm, registry);
            let function = dynamic_code::install_function_guard(realm, registry);
            this.record("dynamic_code", Ok(eval && function));
        }
        if options.global_nullify {
            let pinned = globals::install_nullified_globals(realm, registry);
            this.record("global_nullify", Ok(pinned == globals::NULLIFIED_GLOBALS.len()));
        }
        if options.probe_answers {
            this.record("probe_answers", globals::install_probe_answers(realm, registry));
        }

        tracing::info!(
            "trap suppression: {} installed, {} failed",
            this.installed.len(),
            this.failed.len()
        );
        this
    }

    fn record(&mut self, name: &'static str, outcome: Result<bool>) {
        match outcome {
            Ok(true) => self.installed.push(name),
            Ok(false) => self.failed.push(name),
            Err(e) => {
                tracing::warn!("{} unavailable: {}", name, e);
                self.failed.push(name);
            }
        }
    }

    /// The script sweeper, if mutation sweeping is on
    pub fn sweeper(&self) -> Option<&Rc<ScriptSweeper>> {
        self.sweeper.as_ref()
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.installed.contains(&name)
    }
}
