//! # Components, templates and patches
//!
//! Weft keeps a component's rendered output in sync with its state. There
//! are four moving parts:
//!
//! - [`Tracked`]: a view over object/array state. Every write re-renders.
//! - [`Template`]: a directive template (`{#if}`, `{#each}`, `{{ }}`, ...)
//!   rendered against the component's [`Fields`].
//! - [`reconcile`]: positional patching of the live [`Document`] against the
//!   freshly rendered markup.
//! - [`EventBinder`]: turns `@click="method"` markers into listeners, once per
//!   node and event.
//!
//! [`ComponentHost`] wires them into the render pipeline.
//!
//! ## A counter
//!
//! ```rust
//! use weft_core::*;
//! use serde_json::json;
//!
//! struct Counter {
//!     state: Tracked,
//! }
//!
//! impl Component for Counter {
//!     fn render(&self) -> String {
//!         r#"<button @click="add">{{count}}</button>"#.into()
//!     }
//!
//!     fn fields(&self) -> Fields {
//!         Fields::new().spread(&self.state)
//!     }
//!
//!     fn methods() -> Methods<Self> {
//!         Methods::new().on("add", |c: &Counter, _| {
//!             let n = c.state.get_value("count").to_number();
//!             c.state.set("count", n + 1.0)
//!         })
//!     }
//! }
//!
//! let host = ComponentHost::new(|cx| Counter {
//!     state: cx.state(json!({ "count": 1 })),
//! });
//! host.connected().unwrap();
//! assert_eq!(host.html(), "<button>1</button>");
//!
//! let button = host.document().elements_by_tag("button")[0];
//! host.dispatch(button, Event::new("click")).unwrap();
//! assert_eq!(host.html(), "<button>2</button>");
//! ```
//!
//! ## Directives
//!
//! | Marker | Meaning |
//! |---|---|
//! | `{#if E}…{#else if E}…{#else}…{/if}` | conditional |
//! | `{#for init; test; step}…{/for}` | counted loop |
//! | `{#each C as item, i}…{/each}` | iterate an array |
//! | `{{E}}` | escaped interpolation |
//! | `{#html E}` | raw insertion |
//! | `@event="method"` | event binding |
//!
//! Inside `{#if}` and `{#for}` the keywords `eq neq gt egt lt elt heq nheq`
//! stand for `== != > >= < <= === !==`.
//!
//! ## What is not here
//!
//! Lists are not keyed, writes are not batched (N writes are N passes), and
//! nothing renders asynchronously.

pub mod comparison;
pub mod component;
pub mod definition;
pub mod diff;
pub mod dom;
pub mod error;
pub mod events;
pub mod host;
pub mod markup;
pub mod options;
pub mod prelude;
pub mod state;
pub mod template;
pub mod value;

pub use comparison::translate;
pub use component::*;
pub use definition::Definition;
pub use diff::*;
pub use dom::{Document, Listener, NodeId, NodeKind};
pub use error::{Error, Result};
pub use events::*;
pub use host::*;
pub use markup::{Attr, Node};
pub use options::Options;
pub use state::*;
pub use template::{EscapeFn, Template, compile, escape_html, rewrite_event_shorthand};
pub use value::{Callable, Value};
