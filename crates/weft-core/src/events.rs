//! Event binding markers and the per-component binding registry.

use std::collections::HashSet;

use crate::dom::{Document, Listener, NodeId};
use crate::value::Value;

/// Attribute produced by the `@event="method"` shorthand. Its value is
/// `event,method`; the binder removes it once read.
pub const EVENT_ATTRIBUTE: &str = "data-event";

#[derive(Clone, Debug)]
pub struct Event {
    pub kind: String,
    /// Node the event was dispatched at, filled in by the host.
    pub target: Option<NodeId>,
    pub detail: Value,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            target: None,
            detail: Value::Undefined,
        }
    }

    /// An event carrying a payload, like a DOM `CustomEvent`.
    pub fn custom(kind: impl Into<String>, detail: impl Into<Value>) -> Self {
        Self {
            detail: detail.into(),
            ..Self::new(kind)
        }
    }

    pub fn with_target(mut self, target: NodeId) -> Self {
        self.target = Some(target);
        self
    }
}

/// Remembers which `(node, event)` pairs already carry a listener.
///
/// Entries are never pruned. A node that keeps its identity across renders
/// is bound once for its lifetime; if a later render points the same node
/// and event at a different method, the first binding stays in effect.
///
/// Ids of removed or replaced nodes stay in the set too, so a template
/// whose tags keep flipping grows the registry without bound: every
/// replacement mints new ids that bind again.
#[derive(Debug, Default)]
pub struct EventBinder {
    bound: HashSet<(NodeId, String)>,
}

impl EventBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes every [`EVENT_ATTRIBUTE`] marker in `doc` and attaches a
    /// listener built by `listener_for(event, method)` for each pair not
    /// bound before. Returns how many listeners were attached.
    pub fn bind(
        &mut self,
        doc: &mut Document,
        mut listener_for: impl FnMut(&str, &str) -> Listener,
    ) -> usize {
        let marked: Vec<NodeId> = doc
            .descendants(doc.root())
            .into_iter()
            .filter(|&id| doc.attribute(id, EVENT_ATTRIBUTE).is_some())
            .collect();

        let mut attached = 0;
        for id in marked {
            let Some(marker) = doc.remove_attribute(id, EVENT_ATTRIBUTE) else {
                continue;
            };
            let Some((kind, method)) = marker.split_once(',') else {
                log::warn!("ignoring malformed {EVENT_ATTRIBUTE}=\"{marker}\"");
                continue;
            };
            if !self.bound.insert((id, kind.to_string())) {
                log::trace!("{kind} already bound on {id:?}");
                continue;
            }
            doc.add_listener(id, kind, listener_for(kind, method));
            attached += 1;
        }
        if attached > 0 {
            log::debug!("bound {attached} listener(s)");
        }
        attached
    }

    pub fn is_bound(&self, id: NodeId, kind: &str) -> bool {
        self.bound.contains(&(id, kind.to_string()))
    }

    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::reconcile;
    use crate::markup::parse;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn render(doc: &mut Document, markup: &str) {
        let root = doc.root();
        reconcile(doc, root, &parse(markup).unwrap());
    }

    fn noop(_: &str, _: &str) -> Listener {
        Rc::new(|_| Ok(()))
    }

    #[test]
    fn consumes_markers_and_binds_once() {
        let mut doc = Document::new();
        let mut binder = EventBinder::new();
        let markup = r#"<button data-event="click,add">+</button>"#;

        render(&mut doc, markup);
        assert_eq!(binder.bind(&mut doc, noop), 1);
        let button = doc.children(doc.root())[0];
        assert_eq!(doc.attribute(button, EVENT_ATTRIBUTE), None);
        assert!(binder.is_bound(button, "click"));

        // The next render re-adds the marker on the same node.
        render(&mut doc, markup);
        assert_eq!(doc.attribute(button, EVENT_ATTRIBUTE), Some("click,add"));
        assert_eq!(binder.bind(&mut doc, noop), 0);
        assert_eq!(doc.attribute(button, EVENT_ATTRIBUTE), None);
        assert_eq!(doc.listener_count(button), 1);
    }

    #[test]
    fn first_method_wins_for_a_pair() {
        let mut doc = Document::new();
        let mut binder = EventBinder::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut recorder = |_: &str, method: &str| -> Listener {
            seen.borrow_mut().push(method.to_string());
            Rc::new(|_| Ok(()))
        };

        render(&mut doc, r#"<a data-event="click,first"></a>"#);
        binder.bind(&mut doc, &mut recorder);
        render(&mut doc, r#"<a data-event="click,second"></a>"#);
        binder.bind(&mut doc, &mut recorder);
        assert_eq!(*seen.borrow(), ["first"]);
    }

    #[test]
    fn replaced_nodes_bind_again() {
        let mut doc = Document::new();
        let mut binder = EventBinder::new();
        render(&mut doc, r#"<a data-event="click,go"></a>"#);
        binder.bind(&mut doc, noop);
        render(&mut doc, r#"<b data-event="click,go"></b>"#);
        assert_eq!(binder.bind(&mut doc, noop), 1);
        assert_eq!(binder.len(), 2);

        for _ in 0..3 {
            render(&mut doc, r#"<a data-event="click,go"></a>"#);
            binder.bind(&mut doc, noop);
            render(&mut doc, r#"<b data-event="click,go"></b>"#);
            binder.bind(&mut doc, noop);
        }
        assert_eq!(binder.len(), 8);
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn malformed_marker_is_ignored() {
        let mut doc = Document::new();
        let mut binder = EventBinder::new();
        render(&mut doc, r#"<a data-event="click"></a>"#);
        assert_eq!(binder.bind(&mut doc, noop), 0);
        assert!(binder.is_empty());
    }
}
