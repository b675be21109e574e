//! Positional reconciliation of a live [`Document`] against freshly parsed
//! markup.
//!
//! Nodes and attributes are matched by index, never by key or name:
//!
//! - an old node with no counterpart at its index is removed;
//! - if either side is text, only the text value is synchronised;
//! - a tag mismatch replaces the whole old subtree;
//! - otherwise old attribute slot `j` takes the value of new slot `j` under
//!   its old name, old slots with no new counterpart are removed, new slots
//!   past the old length are set by name, and children recurse;
//! - new nodes past the end of the old list are appended to the parent.
//!
//! Same-tag elements and text nodes keep their [`NodeId`] across a patch.

use std::ops::AddAssign;

use crate::dom::{Document, NodeId, NodeKind};
use crate::markup::Node;

/// Mutations applied by one [`reconcile`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PatchStats {
    pub text_updates: usize,
    pub attrs_set: usize,
    pub attrs_removed: usize,
    pub replacements: usize,
    pub removals: usize,
    pub insertions: usize,
}

impl PatchStats {
    /// `true` when the tree was already up to date.
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

impl AddAssign for PatchStats {
    fn add_assign(&mut self, rhs: Self) {
        self.text_updates += rhs.text_updates;
        self.attrs_set += rhs.attrs_set;
        self.attrs_removed += rhs.attrs_removed;
        self.replacements += rhs.replacements;
        self.removals += rhs.removals;
        self.insertions += rhs.insertions;
    }
}

/// Patches the children of `parent` in place until they match `new`.
pub fn reconcile(doc: &mut Document, parent: NodeId, new: &[Node]) -> PatchStats {
    let mut stats = PatchStats::default();
    patch_children(doc, parent, new, &mut stats);
    log::debug!("reconcile: {stats:?}");
    stats
}

fn patch_children(doc: &mut Document, parent: NodeId, new: &[Node], stats: &mut PatchStats) {
    let old = doc.children(parent).to_vec();
    for (i, &old_id) in old.iter().enumerate() {
        match new.get(i) {
            Some(next) => patch_node(doc, old_id, next, stats),
            None => {
                log::trace!("remove node {old_id:?} at {i}");
                if doc.remove(old_id) {
                    stats.removals += 1;
                }
            }
        }
    }
    for extra in new.iter().skip(old.len()) {
        if let Some(id) = doc.append(parent, extra) {
            log::trace!("append node {id:?} under {parent:?}");
            stats.insertions += 1;
        }
    }
}

fn patch_node(doc: &mut Document, old_id: NodeId, new: &Node, stats: &mut PatchStats) {
    let old_tag = match doc.kind(old_id) {
        Some(NodeKind::Element { tag, .. }) => tag.clone(),
        Some(NodeKind::Text(current)) => {
            // An element has no text value of its own, so text facing an
            // element is cleared.
            let wanted = new.as_text().unwrap_or_default();
            if current != wanted {
                log::trace!("text {old_id:?}: {current:?} -> {wanted:?}");
                doc.set_text(old_id, wanted);
                stats.text_updates += 1;
            }
            return;
        }
        Some(NodeKind::Root) | None => return,
    };

    let Node::Element {
        tag,
        attrs,
        children,
    } = new
    else {
        // Element facing text: nothing to write.
        return;
    };

    if old_tag != *tag {
        log::trace!("replace <{old_tag}> {old_id:?} with <{tag}>");
        if doc.replace(old_id, new).is_some() {
            stats.replacements += 1;
        }
        return;
    }

    // Slot `j` of the old list is compared with slot `j` of the new one. A
    // differing slot keeps its old name and takes the new value.
    let old_attrs = doc.attrs(old_id).to_vec();
    for (j, old_attr) in old_attrs.iter().enumerate() {
        let Some(attr) = attrs.get(j) else {
            if doc.remove_attribute(old_id, &old_attr.name).is_some() {
                log::trace!("remove attr {} of {old_id:?}", old_attr.name);
                stats.attrs_removed += 1;
            }
            continue;
        };
        if doc.attribute(old_id, &old_attr.name) != Some(attr.value.as_str()) {
            log::trace!("attr slot {j} of {old_id:?}: {}={:?}", old_attr.name, attr.value);
            doc.set_attribute(old_id, &old_attr.name, attr.value.clone());
            stats.attrs_set += 1;
        }
    }
    for attr in attrs.iter().skip(old_attrs.len()) {
        if doc.attribute(old_id, &attr.name) != Some(attr.value.as_str()) {
            log::trace!("attr {} of {old_id:?} -> {:?}", attr.name, attr.value);
            doc.set_attribute(old_id, &attr.name, attr.value.clone());
            stats.attrs_set += 1;
        }
    }

    patch_children(doc, old_id, children, stats);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{Attr, parse};

    fn mount(markup: &str) -> Document {
        let mut doc = Document::new();
        let root = doc.root();
        reconcile(&mut doc, root, &parse(markup).unwrap());
        doc
    }

    fn patch(doc: &mut Document, markup: &str) -> PatchStats {
        let root = doc.root();
        reconcile(doc, root, &parse(markup).unwrap())
    }

    #[test]
    fn initial_mount_appends_under_root() {
        let mut doc = Document::new();
        let root = doc.root();
        let stats = reconcile(&mut doc, root, &parse("<p>a</p><p>b</p>").unwrap());
        assert_eq!(stats.insertions, 2);
        assert_eq!(doc.to_html(), "<p>a</p><p>b</p>");
    }

    #[test]
    fn text_change_keeps_identity() {
        let mut doc = mount(r#"<div id="a">1</div>"#);
        let div = doc.children(doc.root())[0];
        let text = doc.children(div)[0];
        let stats = patch(&mut doc, r#"<div id="a">2</div>"#);
        assert_eq!(stats.text_updates, 1);
        assert_eq!(stats.replacements, 0);
        assert_eq!(doc.children(doc.root())[0], div);
        assert_eq!(doc.text(text), Some("2"));
    }

    #[test]
    fn tag_mismatch_replaces_subtree() {
        let mut doc = mount("<span>x</span>");
        let span = doc.children(doc.root())[0];
        let stats = patch(&mut doc, "<p>x</p>");
        assert_eq!(stats.replacements, 1);
        assert!(!doc.contains(span));
        assert_eq!(doc.to_html(), "<p>x</p>");
    }

    #[test]
    fn identical_trees_need_no_mutations() {
        let markup = r#"<ul class="l"><li>1</li><li title="t">2</li></ul>"#;
        let mut doc = mount(markup);
        assert!(patch(&mut doc, markup).is_noop());
    }

    #[test]
    fn attributes_compare_by_position() {
        let mut doc = mount(r#"<a href="x" id="y" class="z"></a>"#);
        let a = doc.children(doc.root())[0];
        let stats = patch(&mut doc, r#"<a id="y" href="x"></a>"#);
        assert_eq!(stats.attrs_set, 2);
        assert_eq!(stats.attrs_removed, 1);
        assert_eq!(doc.outer_html(a), r#"<a href="y" id="x"></a>"#);
        assert_eq!(
            doc.attrs(a),
            [Attr::new("href", "y"), Attr::new("id", "x")]
        );

        // Names still differ slot by slot, but the values already match.
        assert!(patch(&mut doc, r#"<a id="y" href="x"></a>"#).is_noop());
    }

    #[test]
    fn extra_attributes_are_set_by_name() {
        let mut doc = mount(r#"<a id="y"></a>"#);
        let a = doc.children(doc.root())[0];
        let stats = patch(&mut doc, r#"<a id="y" rel="r" title="t"></a>"#);
        assert_eq!(stats.attrs_set, 2);
        assert_eq!(doc.outer_html(a), r#"<a id="y" rel="r" title="t"></a>"#);

        // A new slot whose name already exists overwrites that attribute.
        let mut doc = mount(r#"<a href="x"></a>"#);
        let a = doc.children(doc.root())[0];
        patch(&mut doc, r#"<a id="y" href="z"></a>"#);
        assert_eq!(doc.outer_html(a), r#"<a href="z"></a>"#);
    }

    #[test]
    fn shorter_list_removes_trailing_nodes() {
        let mut doc = mount("<li>1</li><li>2</li><li>3</li>");
        let first = doc.children(doc.root())[0];
        let stats = patch(&mut doc, "<li>1</li>");
        assert_eq!(stats.removals, 2);
        assert_eq!(doc.children(doc.root()), [first]);
    }

    #[test]
    fn longer_child_list_appends_to_its_parent() {
        let mut doc = mount("<ul><li>1</li></ul>");
        let stats = patch(&mut doc, "<ul><li>1</li><li>2</li></ul>");
        assert_eq!(stats.insertions, 1);
        assert_eq!(doc.to_html(), "<ul><li>1</li><li>2</li></ul>");
    }

    #[test]
    fn text_facing_element_is_cleared() {
        let mut doc = mount("hello<b>x</b>");
        let stats = patch(&mut doc, "<i>y</i>hi");
        assert_eq!(stats.text_updates, 1);
        // The old <b> faces new text and is left alone.
        assert_eq!(doc.to_html(), "<b>x</b>");
    }

    #[test]
    fn empty_children_get_filled() {
        let mut doc = mount("<p></p>");
        let p = doc.children(doc.root())[0];
        patch(&mut doc, "<p>now</p>");
        assert_eq!(doc.children(doc.root())[0], p);
        assert_eq!(doc.text_content(p), "now");
    }
}
