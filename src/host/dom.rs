//! Document tree
//!
//! Arena of nodes keyed by [`NodeId`]. Every insertion and attribute change is
//! queued as a [`MutationRecord`] for batched delivery to observers.

use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};

/// Stable per-node identifier (never reused after a node is reclaimed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

/// RGBA pixel storage of a canvas element
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Bitmap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }
}

/// A document node
#[derive(Debug, Clone, Default)]
pub struct Node {
    /// Lowercase tag name, or `#document` / `#shadow-root`
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub text: String,
    /// Inline style declarations
    pub style: BTreeMap<String, String>,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    /// Shadow root attached to this element
    pub shadow_root: Option<NodeId>,
    /// Host element of a shadow root
    pub host: Option<NodeId>,
    /// Cross-origin content that cannot be inspected
    pub restricted: bool,
    pub bitmap: Option<Bitmap>,
}

/// A queued change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    ChildList { target: NodeId, added: Vec<NodeId> },
    Attributes { target: NodeId, name: String },
}

impl MutationRecord {
    pub fn target(&self) -> NodeId {
        match self {
            MutationRecord::ChildList { target, .. } | MutationRecord::Attributes { target, .. } => {
                *target
            }
        }
    }
}

/// The document tree
#[derive(Debug)]
pub struct Dom {
    nodes: HashMap<NodeId, Node>,
    next_id: u64,
    document: NodeId,
    document_element: NodeId,
    head: NodeId,
    body: NodeId,
    records: Vec<MutationRecord>,
    ready: bool,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    /// Create `#document > html > (head, body)`
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: HashMap::new(),
            next_id: 1,
            document: NodeId(0),
            document_element: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
            records: Vec::new(),
            ready: false,
        };
        dom.document = dom.alloc("#document");
        dom.document_element = dom.alloc("html");
        dom.head = dom.alloc("head");
        dom.body = dom.alloc("body");
        dom.link(dom.document, dom.document_element);
        dom.link(dom.document_element, dom.head);
        dom.link(dom.document_element, dom.body);
        dom
    }

    fn alloc(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        let mut node = Node {
            tag: tag.to_ascii_lowercase(),
            ..Default::default()
        };
        if node.tag == "canvas" {
            node.bitmap = Some(Bitmap::new(300, 150));
        }
        self.nodes.insert(id, node);
        id
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(child);
        }
        if let Some(c) = self.nodes.get_mut(&child) {
            c.parent = Some(parent);
        }
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| Error::Inaccessible(format!("node {:?} was reclaimed", id)))
    }

    pub fn document(&self) -> NodeId {
        self.document
    }

    pub fn document_element(&self) -> NodeId {
        self.document_element
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Whether the node still exists (not reclaimed)
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(&id).map(|n| n.tag.as_str())
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(tag)
    }

    /// Append `child` to `parent` and queue a child-list record
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if !self.contains(parent) || !self.contains(child) {
            return Err(Error::Inaccessible("append on reclaimed node".into()));
        }
        if let Some(old) = self.nodes.get(&child).and_then(|n| n.parent) {
            if let Some(p) = self.nodes.get_mut(&old) {
                p.children.retain(|c| *c != child);
            }
        }
        self.link(parent, child);
        self.records.push(MutationRecord::ChildList {
            target: parent,
            added: vec![child],
        });
        Ok(())
    }

    /// Detach `id` and reclaim it with its whole subtree
    pub fn remove(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes.get(&id).and_then(|n| n.parent) {
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.children.retain(|c| *c != id);
            }
        }
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                stack.extend(node.children);
                stack.extend(node.shadow_root);
            }
        }
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<()> {
        let name = name.to_ascii_lowercase();
        self.node_mut(id)?
            .attributes
            .insert(name.clone(), value.to_string());
        self.records
            .push(MutationRecord::Attributes { target: id, name });
        Ok(())
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.nodes
            .get(&id)
            .and_then(|n| n.attributes.get(&name.to_ascii_lowercase()))
            .map(|s| s.as_str())
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<()> {
        self.node_mut(id)?.text = text.to_string();
        Ok(())
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(&id).map(|n| n.text.as_str())
    }

    /// Set an inline style declaration; an empty value unsets it
    pub fn set_style(&mut self, id: NodeId, property: &str, value: &str) -> Result<()> {
        let node = self.node_mut(id)?;
        if value.is_empty() {
            node.style.remove(property);
        } else {
            node.style.insert(property.to_string(), value.to_string());
        }
        self.records.push(MutationRecord::Attributes {
            target: id,
            name: "style".into(),
        });
        Ok(())
    }

    pub fn style(&self, id: NodeId, property: &str) -> Option<&str> {
        self.nodes
            .get(&id)
            .and_then(|n| n.style.get(property))
            .map(|s| s.as_str())
    }

    /// Attach a shadow root to `host`
    pub fn attach_shadow(&mut self, host: NodeId) -> Result<NodeId> {
        if let Some(existing) = self.nodes.get(&host).and_then(|n| n.shadow_root) {
            return Ok(existing);
        }
        self.node_mut(host)?;
        let root = self.alloc("#shadow-root");
        if let Some(r) = self.nodes.get_mut(&root) {
            r.host = Some(host);
        }
        if let Some(h) = self.nodes.get_mut(&host) {
            h.shadow_root = Some(root);
        }
        Ok(root)
    }

    pub fn set_restricted(&mut self, id: NodeId, restricted: bool) -> Result<()> {
        self.node_mut(id)?.restricted = restricted;
        Ok(())
    }

    pub fn bitmap(&self, id: NodeId) -> Option<&Bitmap> {
        self.nodes.get(&id).and_then(|n| n.bitmap.as_ref())
    }

    pub fn bitmap_mut(&mut self, id: NodeId) -> Option<&mut Bitmap> {
        self.nodes.get_mut(&id).and_then(|n| n.bitmap.as_mut())
    }

    /// Whether `ancestor` is `id` or one of its light-tree ancestors
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.nodes.get(&node).and_then(|n| n.parent);
        }
        false
    }

    /// Descendants of `root` in tree order, excluding `root` itself.
    ///
    /// Restricted subtrees below `root` are skipped; a restricted or reclaimed
    /// `root` cannot be inspected at all. Shadow trees are not entered.
    pub fn descendants(&self, root: NodeId) -> Result<Vec<NodeId>> {
        let node = self
            .nodes
            .get(&root)
            .ok_or_else(|| Error::Inaccessible(format!("node {:?} was reclaimed", root)))?;
        if node.restricted {
            return Err(Error::Inaccessible(format!(
                "cross-origin subtree at {:?}",
                root
            )));
        }
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = node.children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if node.restricted {
                continue;
            }
            out.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        Ok(out)
    }

    /// All `script` elements of the document, in tree order
    pub fn scripts(&self) -> Vec<NodeId> {
        self.descendants(self.document)
            .unwrap_or_default()
            .into_iter()
            .filter(|id| self.tag(*id) == Some("script"))
            .collect()
    }

    /// Mark the document as parsed
    pub fn set_ready(&mut self) -> bool {
        !std::mem::replace(&mut self.ready, true)
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Drain queued mutation records in the order they occurred
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }

    pub fn has_pending_records(&self) -> bool {
        !self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skeleton() {
        let dom = Dom::new();
        assert_eq!(dom.tag(dom.document_element()), Some("html"));
        assert_eq!(dom.tag(dom.body()), Some("body"));
        assert!(dom.is_inclusive_ancestor(dom.document(), dom.body()));
    }

    #[test]
    fn test_append_queues_record() {
        let mut dom = Dom::new();
        let script = dom.create_element("SCRIPT");
        assert_eq!(dom.tag(script), Some("script"));
        dom.append_child(dom.head(), script).unwrap();
        let records = dom.take_records();
        assert_eq!(
            records,
            vec![MutationRecord::ChildList {
                target: dom.head(),
                added: vec![script]
            }]
        );
        assert_eq!(dom.scripts(), vec![script]);
    }

    #[test]
    fn test_remove_reclaims_subtree() {
        let mut dom = Dom::new();
        let div = dom.create_element("div");
        let inner = dom.create_element("span");
        dom.append_child(dom.body(), div).unwrap();
        dom.append_child(div, inner).unwrap();
        dom.remove(div);
        assert!(!dom.contains(div));
        assert!(!dom.contains(inner));
        assert!(dom.node(dom.body()).unwrap().children.is_empty());
    }

    #[test]
    fn test_restricted_subtree_skipped() {
        let mut dom = Dom::new();
        let frame = dom.create_element("iframe");
        let inner = dom.create_element("div");
        dom.append_child(dom.body(), frame).unwrap();
        dom.append_child(frame, inner).unwrap();
        dom.set_restricted(frame, true).unwrap();

        let all = dom.descendants(dom.document()).unwrap();
        assert!(!all.contains(&frame));
        assert!(!all.contains(&inner));
        assert!(dom.descendants(frame).is_err());
    }

    #[test]
    fn test_style_unset() {
        let mut dom = Dom::new();
        let body = dom.body();
        dom.set_style(body, "overflow", "hidden").unwrap();
        assert_eq!(dom.style(body, "overflow"), Some("hidden"));
        dom.set_style(body, "overflow", "").unwrap();
        assert_eq!(dom.style(body, "overflow"), None);
    }
}
