pub use crate::component::{Component, Context, Fields, Methods};
pub use crate::definition::Definition;
pub use crate::dom::{Document, NodeId};
pub use crate::error::{Error, Result};
pub use crate::events::Event;
pub use crate::host::{ComponentHost, RenderPhase};
pub use crate::options::Options;
pub use crate::state::{Prop, Tracked};
pub use crate::value::Value;
