//! Mutation-time removal of inline trap scripts

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use super::classifier::{excerpt, is_trap};
use crate::host::{MutationRecord, NodeId, ObserveOptions, Realm};

/// Nodes already judged, keyed by node id
///
/// Holds no reference to the node itself; ids of reclaimed nodes are pruned
/// on the next batch.
#[derive(Debug, Default)]
pub struct SeenSet {
    ids: HashSet<NodeId>,
}

impl SeenSet {
    /// Mark `id`; returns false if it was already marked
    pub fn mark(&mut self, id: NodeId) -> bool {
        self.ids.insert(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.ids.contains(&id)
    }

    /// Drop entries for nodes the document no longer holds
    pub fn prune(&mut self, realm: &Realm) {
        let dom = realm.dom();
        self.ids.retain(|id| dom.contains(*id));
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Watches the document for inserted scripts and strips trap bodies
#[derive(Debug, Default)]
pub struct ScriptSweeper {
    seen: RefCell<SeenSet>,
}

impl ScriptSweeper {
    /// Start observing the whole document
    pub fn install(realm: &Realm) -> Rc<Self> {
        let sweeper = Rc::new(Self::default());
        let root = realm.dom().document();
        let handle = sweeper.clone();
        realm.observe(root, ObserveOptions::child_list_subtree(), move |realm, records| {
            handle.sweep(realm, records);
        });
        sweeper
    }

    /// Process one batch of records; returns how many scripts were removed
    pub fn sweep(&self, realm: &Realm, records: &[MutationRecord]) -> usize {
        self.seen.borrow_mut().prune(realm);
        let mut removed = 0;
        for record in records {
            let MutationRecord::ChildList { added, .. } = record else {
                continue;
            };
            for &node in added {
                for script in self.unseen_scripts(realm, node) {
                    if self.strip(realm, script) {
                        removed += 1;
                    }
                }
            }
        }
        removed
    }

    fn unseen_scripts(&self, realm: &Realm, node: NodeId) -> Vec<NodeId> {
        let dom = realm.dom();
        if !dom.contains(node) {
            return Vec::new();
        }
        let candidates = match dom.descendants(node) {
            Ok(mut below) => {
                below.insert(0, node);
                below
            }
            Err(e) => {
                tracing::debug!("skipping inserted subtree: {}", e);
                vec![node]
            }
        };
        let mut seen = self.seen.borrow_mut();
        candidates
            .into_iter()
            .filter(|id| dom.tag(*id) == Some("script"))
            .filter(|id| seen.mark(*id))
            .collect()
    }

    fn strip(&self, realm: &Realm, script: NodeId) -> bool {
        let text = match realm.dom().text(script) {
            Some(text) if is_trap(text) => text.to_string(),
            _ => return false,
        };
        tracing::debug!("removed inline trap script: {}", excerpt(&text));
        realm.remove_node(script);
        true
    }

    /// Number of nodes currently marked
    pub fn seen_count(&self) -> usize {
        self.seen.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert_script(realm: &Realm, text: &str) -> NodeId {
        let mut dom = realm.dom_mut();
        let body = dom.body();
        let s = dom.create_element("script");
        dom.set_text(s, text).unwrap();
        dom.append_child(body, s).unwrap();
        s
    }

    #[test]
    fn test_trap_script_removed_on_insert() {
        let realm = Realm::new("https://example.com/");
        let _sweeper = ScriptSweeper::install(&realm);
        let trap = insert_script(&realm, "var fuckAdBlock = new FuckAdBlock();");
        let ok = insert_script(&realm, "console.log('hi')");
        realm.run_until_idle();
        assert!(!realm.dom().contains(trap));
        assert!(realm.dom().contains(ok));
    }

    #[test]
    fn test_nested_scripts_inspected() {
        let realm = Realm::new("https://example.com/");
        let _sweeper = ScriptSweeper::install(&realm);
        let trap = {
            let mut dom = realm.dom_mut();
            let wrapper = dom.create_element("div");
            let s = dom.create_element("script");
            dom.set_text(s, "detect()").unwrap();
            dom.append_child(wrapper, s).unwrap();
            let body = dom.body();
            dom.append_child(body, wrapper).unwrap();
            s
        };
        realm.run_until_idle();
        assert!(!realm.dom().contains(trap));
    }

    #[test]
    fn test_redelivery_is_idempotent() {
        let realm = Realm::new("https://example.com/");
        let sweeper = ScriptSweeper::default();
        let ok = insert_script(&realm, "run()");
        let batch = realm.dom_mut().take_records();
        sweeper.sweep(&realm, &batch);
        assert_eq!(sweeper.seen_count(), 1);
        assert_eq!(sweeper.sweep(&realm, &batch), 0);
        assert_eq!(sweeper.seen_count(), 1);

        realm.remove_node(ok);
        sweeper.sweep(&realm, &[]);
        assert_eq!(sweeper.seen_count(), 0);
    }
}
