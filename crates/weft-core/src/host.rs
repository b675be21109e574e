//! The render pipeline.
//!
//! A [`ComponentHost`] owns one component and its output tree. Every pass runs
//! `Idle → Rendering → Patching → Binding → Idle` to completion on the
//! calling thread:
//!
//! 1. **Rendering**: read the template source and fields, compile, and parse
//!    the resulting markup.
//! 2. **Patching**: reconcile the live [`Document`] against the parsed nodes.
//! 3. **Binding**: consume event markers and attach listeners.
//!
//! A failure in step 1 aborts the pass before the tree is touched and is
//! returned to whoever triggered it: the caller of [`ComponentHost::update`]
//! or of the state write that caused it.

use std::cell::{Cell, Ref, RefCell};
use std::rc::{Rc, Weak};

use web_time::Instant;

use crate::component::{Component, Context, Methods};
use crate::definition::Definition;
use crate::diff::{PatchStats, reconcile};
use crate::dom::{Document, Listener, NodeId};
use crate::error::Result;
use crate::events::{Event, EventBinder};
use crate::markup;
use crate::options::Options;
use crate::template::Template;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderPhase {
    #[default]
    Idle,
    Rendering,
    Patching,
    Binding,
}

pub struct ComponentHost<C: Component> {
    component: C,
    methods: Methods<C>,
    definition: Option<Definition>,
    stylesheet: String,
    options: Options,
    document: RefCell<Document>,
    binder: RefCell<EventBinder>,
    phase: Cell<RenderPhase>,
    renders: Cell<usize>,
    this: Weak<Self>,
}

impl<C: Component> ComponentHost<C> {
    /// Builds the component with `build`, which receives a [`Context`] for
    /// creating reactive state. Nothing is rendered until [`connected`] or
    /// [`update`] is called.
    ///
    /// [`connected`]: Self::connected
    /// [`update`]: Self::update
    pub fn new(build: impl FnOnce(&Context<C>) -> C) -> Rc<Self> {
        Self::construct(Options::default(), None, build)
    }

    pub fn with_options(options: Options, build: impl FnOnce(&Context<C>) -> C) -> Rc<Self> {
        Self::construct(options, None, build)
    }

    /// Uses the definition's template and style in place of the
    /// component's own `render()` and `css()`.
    pub fn with_definition(
        definition: Definition,
        build: impl FnOnce(&Context<C>) -> C,
    ) -> Rc<Self> {
        Self::construct(Options::default(), Some(definition), build)
    }

    fn construct(
        options: Options,
        definition: Option<Definition>,
        build: impl FnOnce(&Context<C>) -> C,
    ) -> Rc<Self> {
        Rc::new_cyclic(|this| {
            let component = build(&Context { host: this.clone() });
            let stylesheet = match &definition {
                Some(def) => def.style.clone(),
                None => component.css(),
            };
            Self {
                component,
                methods: C::methods(),
                definition,
                stylesheet,
                options,
                document: RefCell::new(Document::new()),
                binder: RefCell::new(EventBinder::new()),
                phase: Cell::new(RenderPhase::Idle),
                renders: Cell::new(0),
                this: this.clone(),
            }
        })
    }

    /// Runs one full render pass.
    ///
    /// A call that arrives while a pass is already running (a state write
    /// from inside `fields()` or a template function) does not nest: the
    /// write has already landed and is picked up by the next pass.
    pub fn update(&self) -> Result<PatchStats> {
        let phase = self.phase.get();
        if phase != RenderPhase::Idle {
            log::warn!("update requested during {phase:?}; skipping nested pass");
            return Ok(PatchStats::default());
        }
        let started = Instant::now();
        self.phase.set(RenderPhase::Rendering);
        let result = self.pass();
        self.phase.set(RenderPhase::Idle);
        match &result {
            Ok(stats) => log::debug!(
                "pass {} finished in {:?}: {stats:?}",
                self.renders.get(),
                started.elapsed()
            ),
            Err(err) => log::debug!("pass aborted: {err}"),
        }
        result
    }

    fn pass(&self) -> Result<PatchStats> {
        let source = match &self.definition {
            Some(def) => def.template.clone(),
            None => self.component.render(),
        };
        let fields = self.component.fields();
        let html = Template::parse(&source)?.render(&fields, &self.options)?;
        let nodes = markup::parse(&html)?;

        self.phase.set(RenderPhase::Patching);
        let stats = {
            let mut doc = self.document.borrow_mut();
            let root = doc.root();
            reconcile(&mut doc, root, &nodes)
        };

        self.phase.set(RenderPhase::Binding);
        let host = self.this.clone();
        self.binder
            .borrow_mut()
            .bind(&mut self.document.borrow_mut(), |_, method| {
                method_listener(host.clone(), method.to_string())
            });

        self.renders.set(self.renders.get() + 1);
        Ok(stats)
    }

    /// Mount path: renders, then runs the component's `connected` hook.
    pub fn connected(&self) -> Result<PatchStats> {
        let stats = self.update()?;
        self.component.connected();
        Ok(stats)
    }

    pub fn disconnected(&self) {
        self.component.disconnected();
    }

    pub fn adopted(&self) {
        self.component.adopted();
    }

    pub fn attribute_changed(&self, name: &str, old: Option<&str>, new: Option<&str>) {
        self.component.attribute_changed(name, old, new);
    }

    /// Fires `event` at `target`, then at each ancestor up to the root.
    /// Returns the number of listeners run; a target that is not in the tree
    /// is logged and reported as `0`.
    pub fn dispatch(&self, target: NodeId, event: Event) -> Result<usize> {
        let event = event.with_target(target);
        let chain: Vec<Listener> = {
            let doc = self.document.borrow();
            if !doc.contains(target) {
                log::warn!("dispatch of {:?} to a node not in the tree", event.kind);
                return Ok(0);
            }
            let mut chain = Vec::new();
            let mut node = Some(target);
            while let Some(id) = node {
                chain.extend(doc.listeners(id, &event.kind));
                node = doc.parent(id);
            }
            chain
        };
        for listener in &chain {
            listener(&event)?;
        }
        Ok(chain.len())
    }

    /// Calls a method by name. `Ok(false)` (and a warning) when the component
    /// has no such method.
    pub fn invoke(&self, method: &str, event: &Event) -> Result<bool> {
        let Some(handler) = self.methods.get(method) else {
            log::warn!("no method `{method}` on component");
            return Ok(false);
        };
        handler(&self.component, event)?;
        Ok(true)
    }

    pub fn component(&self) -> &C {
        &self.component
    }

    pub fn document(&self) -> Ref<'_, Document> {
        self.document.borrow()
    }

    pub fn html(&self) -> String {
        self.document.borrow().to_html()
    }

    pub fn stylesheet(&self) -> &str {
        &self.stylesheet
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn phase(&self) -> RenderPhase {
        self.phase.get()
    }

    /// Completed passes since construction.
    pub fn render_count(&self) -> usize {
        self.renders.get()
    }

    /// Distinct `(node, event)` pairs bound so far.
    pub fn bound_count(&self) -> usize {
        self.binder.borrow().len()
    }
}

fn method_listener<C: Component>(host: Weak<ComponentHost<C>>, method: String) -> Listener {
    Rc::new(move |event: &Event| match host.upgrade() {
        Some(host) => host.invoke(&method, event).map(|_| ()),
        None => Ok(()),
    })
}
