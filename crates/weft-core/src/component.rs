use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::error::Result;
use crate::events::Event;
use crate::host::ComponentHost;
use crate::state::{OnChange, Tracked};
use crate::value::Value;

/// A component rendered through a [`ComponentHost`].
///
/// State lives in [`Tracked`] handles obtained from [`Context::state`] while
/// the component is being built; every write through them re-renders.
pub trait Component: Sized + 'static {
    /// Directive template source.
    fn render(&self) -> String;

    /// Stylesheet text, read once when the host is created.
    fn css(&self) -> String {
        String::new()
    }

    /// Names visible to the template, read on every render.
    fn fields(&self) -> Fields;

    /// Handlers reachable from `@event="method"` bindings.
    fn methods() -> Methods<Self> {
        Methods::new()
    }

    fn connected(&self) {}

    fn disconnected(&self) {}

    fn adopted(&self) {}

    fn attribute_changed(&self, _name: &str, _old: Option<&str>, _new: Option<&str>) {}
}

/// Ordered name → value map exposed to a template.
#[derive(Clone, Debug, Default)]
pub struct Fields(IndexMap<String, Value>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Adds each top-level key of an object-backed state as its own field.
    pub fn spread(mut self, state: &Tracked) -> Self {
        for key in state.keys() {
            let value = state.get_value(&key);
            self.0.insert(key, value);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

pub type Handler<C> = Rc<dyn Fn(&C, &Event) -> Result<()>>;

/// Method table consulted when a bound event fires.
pub struct Methods<C> {
    table: HashMap<String, Handler<C>>,
}

impl<C> Default for Methods<C> {
    fn default() -> Self {
        Self {
            table: HashMap::new(),
        }
    }
}

impl<C> fmt::Debug for Methods<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.table.keys()).finish()
    }
}

impl<C> Methods<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(
        mut self,
        name: impl Into<String>,
        handler: impl Fn(&C, &Event) -> Result<()> + 'static,
    ) -> Self {
        self.table.insert(name.into(), Rc::new(handler));
        self
    }

    pub fn get(&self, name: &str) -> Option<Handler<C>> {
        self.table.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Handed to the builder closure of a [`ComponentHost`].
pub struct Context<C: Component> {
    pub(crate) host: Weak<ComponentHost<C>>,
}

impl<C: Component> Context<C> {
    /// Creates reactive state whose writes re-render the host.
    ///
    /// `initial` should be an object or array. A scalar yields an inert
    /// handle: reads give `undefined` and writes fail.
    pub fn state(&self, initial: impl Into<Value>) -> Tracked {
        let initial = initial.into();
        if !initial.is_container() {
            log::warn!(
                "state() expects an object or array, got {}",
                initial.type_name()
            );
        }
        let host = self.host.clone();
        let on_change: OnChange = Rc::new(move || match host.upgrade() {
            Some(host) => host.update().map(|_| ()),
            None => Ok(()),
        });
        Tracked::new(initial, on_change)
    }
}
