//! Page Healing
//!
//! Reverts lockout patterns added after load: full-screen overlays and
//! scroll or interaction locks on the body. Passes are throttled by a single
//! cursor so attribute churn cannot drive unbounded work.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use aho_corasick::AhoCorasick;
use smallvec::SmallVec;

use crate::host::{NodeId, ObserveOptions, Realm};

/// Minimum wall-clock time between two passes
pub const HEAL_INTERVAL: Duration = Duration::from_millis(1500);

/// Fixed elements stacked above this are treated as lockouts
pub const Z_INDEX_THRESHOLD: i64 = 500;

/// Body styles reset on every pass
const BODY_LOCKS: &[&str] = &["overflow", "pointer-events"];

static LOCKOUT_MARKERS: OnceLock<AhoCorasick> = OnceLock::new();

fn lockout_markers() -> &'static AhoCorasick {
    LOCKOUT_MARKERS.get_or_init(|| {
        AhoCorasick::new(["overlay", "popup"]).expect("Failed to build lockout matcher")
    })
}

/// What one pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealReport {
    pub removed: usize,
    pub body_unlocked: bool,
    pub skipped_subtrees: usize,
}

/// Throttled lockout remover
#[derive(Debug, Default)]
pub struct Healer {
    cursor: Cell<Option<Instant>>,
}

impl Healer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Heal on document-ready and on every attribute change batch
    pub fn install(realm: &Realm) -> Rc<Self> {
        let healer = Rc::new(Self::new());
        let root = realm.dom().document();

        let on_change = healer.clone();
        realm.observe(root, ObserveOptions::attributes_subtree(), move |realm, _| {
            on_change.heal(realm);
        });
        let on_ready = healer.clone();
        realm.on_ready(move |realm| {
            on_ready.heal(realm);
        });
        healer
    }

    /// Run a pass now, unless one ran within [`HEAL_INTERVAL`]
    pub fn heal(&self, realm: &Realm) -> Option<HealReport> {
        self.heal_at(realm, Instant::now())
    }

    /// Run a pass as of `now`
    pub fn heal_at(&self, realm: &Realm, now: Instant) -> Option<HealReport> {
        if let Some(last) = self.cursor.get() {
            if now.saturating_duration_since(last) <= HEAL_INTERVAL {
                return None;
            }
        }
        self.cursor.set(Some(now));

        let mut report = HealReport::default();
        let mut lockouts: SmallVec<[NodeId; 8]> = SmallVec::new();
        let document = realm.dom().document();
        scan(realm, document, &mut lockouts, &mut report);

        for id in lockouts {
            if tracing::enabled!(tracing::Level::DEBUG) {
                let dom = realm.dom();
                tracing::debug!(
                    "removed lockout <{}> id={:?} class={:?}",
                    dom.tag(id).unwrap_or(""),
                    dom.attribute(id, "id").unwrap_or(""),
                    dom.attribute(id, "class").unwrap_or("")
                );
            }
            realm.remove_node(id);
            report.removed += 1;
        }

        report.body_unlocked = unlock_body(realm);
        Some(report)
    }

    /// When the last pass ran
    pub fn last_pass(&self) -> Option<Instant> {
        self.cursor.get()
    }
}

/// Collect lockout elements below `root`, entering shadow trees
fn scan(realm: &Realm, root: NodeId, out: &mut SmallVec<[NodeId; 8]>, report: &mut HealReport) {
    let (nodes, shadows) = {
        let dom = realm.dom();
        let nodes = match dom.descendants(root) {
            Ok(nodes) => nodes,
            Err(e) => {
                tracing::debug!("heal skipped subtree: {}", e);
                report.skipped_subtrees += 1;
                return;
            }
        };
        let shadows: Vec<NodeId> = nodes
            .iter()
            .filter_map(|id| dom.node(*id).and_then(|n| n.shadow_root))
            .collect();
        (nodes, shadows)
    };

    for id in nodes {
        if is_lockout(realm, id) {
            out.push(id);
        }
    }
    for shadow in shadows {
        scan(realm, shadow, out, report);
    }
}

fn is_lockout(realm: &Realm, id: NodeId) -> bool {
    let dom = realm.dom();
    let matcher = lockout_markers();
    let marked = ["id", "class"]
        .iter()
        .filter_map(|attr| dom.attribute(id, attr))
        .any(|value| matcher.is_match(value));
    if !marked || dom.style(id, "position") != Some("fixed") {
        return false;
    }
    dom.style(id, "z-index")
        .and_then(parse_int)
        .is_some_and(|z| z > Z_INDEX_THRESHOLD)
}

/// Leading-integer parse: `"9999 !important"` is 9999, `"auto"` is nothing
fn parse_int(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

fn unlock_body(realm: &Realm) -> bool {
    let mut dom = realm.dom_mut();
    let body = dom.body();
    let locked: SmallVec<[&str; 2]> = BODY_LOCKS
        .iter()
        .copied()
        .filter(|prop| dom.style(body, prop).is_some())
        .collect();
    for prop in &locked {
        if dom.set_style(body, prop, "").is_ok() {
            tracing::debug!("reset body {}", prop);
        }
    }
    !locked.is_empty()
}
