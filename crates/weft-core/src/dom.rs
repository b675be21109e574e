//! The live output tree owned by a component.
//!
//! Nodes live in a [`SlotMap`]; a [`NodeId`] stays valid for as long as the
//! node is attached and is invalidated (never reused) once the node is
//! removed or replaced. That makes identity preservation observable: a
//! patch that updates a node in place leaves its id resolving, a structural
//! replacement does not.

use std::rc::Rc;

use slotmap::{SecondaryMap, SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::error::Result;
use crate::events::Event;
use crate::markup::{self, Attr, Node};

new_key_type! {
    pub struct NodeId;
}

pub type Listener = Rc<dyn Fn(&Event) -> Result<()>>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// The container every rendered top-level node hangs from.
    Root,
    Element { tag: String, attrs: Vec<Attr> },
    Text(String),
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

pub struct Document {
    nodes: SlotMap<NodeId, NodeData>,
    root: NodeId,
    listeners: SecondaryMap<NodeId, SmallVec<[(String, Listener); 1]>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.nodes.len())
            .field("html", &self.to_html())
            .finish()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(NodeData {
            kind: NodeKind::Root,
            parent: None,
            children: Vec::new(),
        });
        Self {
            nodes,
            root,
            listeners: SecondaryMap::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of live nodes, the root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` while nothing has been rendered under the root.
    pub fn is_empty(&self) -> bool {
        self.children(self.root).is_empty()
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id).map(|n| &n.kind)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.nodes.get(id) {
            Some(n) => &n.children,
            None => &[],
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.kind(id), Some(NodeKind::Text(_)))
    }

    pub fn attrs(&self, id: NodeId) -> &[Attr] {
        match self.kind(id) {
            Some(NodeKind::Element { attrs, .. }) => attrs.as_slice(),
            _ => &[],
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attrs(id)
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Overwrites a text node's value. `false` if `id` is not a text node.
    pub fn set_text(&mut self, id: NodeId, value: impl Into<String>) -> bool {
        match self.nodes.get_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Text(text)) => {
                *text = value.into();
                true
            }
            _ => false,
        }
    }

    fn attrs_mut(&mut self, id: NodeId) -> Option<&mut Vec<Attr>> {
        match self.nodes.get_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Element { attrs, .. }) => Some(attrs),
            _ => None,
        }
    }

    /// Sets the named attribute in place, or appends it.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        let Some(attrs) = self.attrs_mut(id) else {
            return;
        };
        let value = value.into();
        match attrs.iter_mut().find(|a| a.name == name) {
            Some(attr) => attr.value = value,
            None => attrs.push(Attr::new(name, value)),
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Option<String> {
        let attrs = self.attrs_mut(id)?;
        let index = attrs.iter().position(|a| a.name == name)?;
        Some(attrs.remove(index).value)
    }

    /// Builds a detached copy of `node` and returns the id of its top.
    fn build(&mut self, node: &Node, parent: NodeId) -> NodeId {
        match node {
            Node::Text(text) => self.nodes.insert(NodeData {
                kind: NodeKind::Text(text.clone()),
                parent: Some(parent),
                children: Vec::new(),
            }),
            Node::Element {
                tag,
                attrs,
                children,
            } => {
                let id = self.nodes.insert(NodeData {
                    kind: NodeKind::Element {
                        tag: tag.clone(),
                        attrs: attrs.clone(),
                    },
                    parent: Some(parent),
                    children: Vec::with_capacity(children.len()),
                });
                for child in children {
                    let child_id = self.build(child, id);
                    self.nodes[id].children.push(child_id);
                }
                id
            }
        }
    }

    pub fn append(&mut self, parent: NodeId, node: &Node) -> Option<NodeId> {
        let index = self.nodes.get(parent)?.children.len();
        self.insert(parent, index, node)
    }

    /// Inserts a copy of `node` at `index` among `parent`'s children
    /// (clamped to the end).
    pub fn insert(&mut self, parent: NodeId, index: usize, node: &Node) -> Option<NodeId> {
        if matches!(self.kind(parent)?, NodeKind::Text(_)) {
            return None;
        }
        let id = self.build(node, parent);
        let children = &mut self.nodes[parent].children;
        let index = index.min(children.len());
        children.insert(index, id);
        Some(id)
    }

    /// Swaps the subtree at `old` for a copy of `node`, at the same position.
    /// `old` and its descendants are invalidated.
    pub fn replace(&mut self, old: NodeId, node: &Node) -> Option<NodeId> {
        let parent = self.parent(old)?;
        let index = self.children(parent).iter().position(|&c| c == old)?;
        self.remove(old);
        self.insert(parent, index, node)
    }

    /// Detaches and drops `id` with its whole subtree and listeners. The
    /// root cannot be removed.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.root || !self.contains(id) {
            return false;
        }
        if let Some(parent) = self.parent(id) {
            self.nodes[parent].children.retain(|&c| c != id);
        }
        let mut doomed = vec![id];
        while let Some(next) = doomed.pop() {
            if let Some(data) = self.nodes.remove(next) {
                doomed.extend(data.children);
            }
            self.listeners.remove(next);
        }
        true
    }

    /// Preorder traversal below `id`, not including `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|&id| self.tag(id) == Some(tag))
            .collect()
    }

    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.text(id) {
            return text.to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|d| self.text(d))
            .collect()
    }

    /// Converts the subtree at `id` back into a detached [`Node`].
    pub fn node(&self, id: NodeId) -> Option<Node> {
        match self.kind(id)? {
            NodeKind::Root => None,
            NodeKind::Text(text) => Some(Node::Text(text.clone())),
            NodeKind::Element { tag, attrs } => Some(Node::Element {
                tag: tag.clone(),
                attrs: attrs.clone(),
                children: self
                    .children(id)
                    .iter()
                    .filter_map(|&c| self.node(c))
                    .collect(),
            }),
        }
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        match self.kind(id) {
            Some(NodeKind::Root) => self.inner_html(id),
            _ => self.node(id).map(|n| n.to_html()).unwrap_or_default(),
        }
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let raw = matches!(self.tag(id), Some("style" | "script"));
        let mut out = String::new();
        for &child in self.children(id) {
            if let Some(node) = self.node(child) {
                markup::write_node(&node, raw, &mut out);
            }
        }
        out
    }

    pub fn to_html(&self) -> String {
        self.inner_html(self.root)
    }

    pub fn add_listener(&mut self, id: NodeId, kind: &str, listener: Listener) -> bool {
        if !self.contains(id) {
            return false;
        }
        match self.listeners.entry(id) {
            Some(entry) => {
                entry
                    .or_insert_with(SmallVec::new)
                    .push((kind.to_string(), listener));
                true
            }
            None => false,
        }
    }

    /// Listeners registered on `id` for `kind`, in registration order.
    pub fn listeners(&self, id: NodeId, kind: &str) -> Vec<Listener> {
        self.listeners
            .get(id)
            .map(|list| {
                list.iter()
                    .filter(|(k, _)| k == kind)
                    .map(|(_, l)| l.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn listener_count(&self, id: NodeId) -> usize {
        self.listeners.get(id).map_or(0, |list| list.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(markup: &str) -> Document {
        let mut doc = Document::new();
        for node in markup::parse(markup).unwrap() {
            doc.append(doc.root(), &node);
        }
        doc
    }

    #[test]
    fn builds_and_serialises() {
        let doc = doc(r#"<ul class="l"><li>a</li><li>b &amp; c</li></ul>"#);
        assert_eq!(doc.to_html(), r#"<ul class="l"><li>a</li><li>b &amp; c</li></ul>"#);
        assert_eq!(doc.elements_by_tag("li").len(), 2);
        assert_eq!(doc.text_content(doc.root()), "ab & c");
    }

    #[test]
    fn replace_invalidates_old_ids() {
        let mut doc = doc("<span>x</span><i></i>");
        let span = doc.children(doc.root())[0];
        let text = doc.children(span)[0];
        let p = doc
            .replace(span, &Node::Element {
                tag: "p".into(),
                attrs: vec![],
                children: vec![Node::Text("x".into())],
            })
            .unwrap();
        assert!(!doc.contains(span));
        assert!(!doc.contains(text));
        assert_eq!(doc.children(doc.root())[0], p);
        assert_eq!(doc.to_html(), "<p>x</p><i></i>");
    }

    #[test]
    fn remove_drops_subtree_and_listeners() {
        let mut doc = doc("<div><button>b</button></div>");
        let div = doc.children(doc.root())[0];
        let button = doc.children(div)[0];
        assert!(doc.add_listener(button, "click", Rc::new(|_| Ok(()))));
        assert!(doc.remove(div));
        assert!(!doc.contains(button));
        assert_eq!(doc.listener_count(button), 0);
        assert_eq!(doc.len(), 1);
        assert!(!doc.remove(doc.root()));
    }

    #[test]
    fn attributes_are_keyed_by_name() {
        let mut doc = doc(r#"<a href="x" id="y"></a>"#);
        let a = doc.children(doc.root())[0];
        doc.set_attribute(a, "href", "t");
        assert_eq!(doc.remove_attribute(a, "id").as_deref(), Some("y"));
        doc.set_attribute(a, "href", "u");
        doc.set_attribute(a, "rel", "next");
        assert_eq!(doc.outer_html(a), r#"<a href="u" rel="next"></a>"#);
        assert_eq!(doc.remove_attribute(a, "rel").as_deref(), Some("next"));
        assert_eq!(doc.attribute(a, "href"), Some("u"));
    }

    #[test]
    fn text_nodes_take_no_children() {
        let mut doc = doc("hi");
        let text = doc.children(doc.root())[0];
        assert!(doc.insert(text, 0, &Node::Text("x".into())).is_none());
        assert!(doc.set_text(text, "bye"));
        assert_eq!(doc.to_html(), "bye");
    }

    #[test]
    fn descendants_are_preorder() {
        let doc = doc("<a><b></b><c><d></d></c></a><e></e>");
        let tags: Vec<_> = doc
            .descendants(doc.root())
            .into_iter()
            .filter_map(|id| doc.tag(id))
            .collect();
        assert_eq!(tags, ["a", "b", "c", "d", "e"]);
    }
}
