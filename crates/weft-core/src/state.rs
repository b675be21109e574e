//! # Trackable state
//!
//! A [`Tracked`] is a view over a container [`Value`] plus a change callback.
//!
//! - Reading a property that holds a container returns a *new* `Tracked`
//!   over the same backing storage (never a copy), carrying the same
//!   callback. Scalars come back as plain values.
//! - Every write lands in the backing storage first, then runs the callback
//!   exactly once, synchronously, before `set` returns.
//!
//! Wrapper identity is not memoized: two reads of the same nested property
//! give two distinct `Tracked` handles. Both see, and write through to, the
//! same data.
//!
//! ```rust
//! use std::{cell::Cell, rc::Rc};
//! use weft_core::*;
//!
//! let writes = Rc::new(Cell::new(0));
//! let on_change: OnChange = {
//!     let writes = writes.clone();
//!     Rc::new(move || {
//!         writes.set(writes.get() + 1);
//!         Ok(())
//!     })
//! };
//! let Prop::Tracked(state) = wrap(serde_json::json!({"user": {"name": "ada"}}).into(), on_change)
//! else {
//!     unreachable!()
//! };
//! let user = state.get("user").into_tracked().unwrap();
//! user.set("name", "grace").unwrap();
//! assert_eq!(writes.get(), 1);
//! ```

use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::value::Value;

/// Largest array length a write may produce, as for script arrays.
pub const MAX_ARRAY_LENGTH: usize = u32::MAX as usize;

/// Callback run after every successful write.
pub type OnChange = Rc<dyn Fn() -> Result<()>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key<'a> {
    Name(&'a str),
    Index(usize),
}

impl<'a> From<&'a str> for Key<'a> {
    fn from(name: &'a str) -> Self {
        Key::Name(name)
    }
}

impl<'a> From<&'a String> for Key<'a> {
    fn from(name: &'a String) -> Self {
        Key::Name(name)
    }
}

impl From<usize> for Key<'_> {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

/// Result of a read: either a nested trackable view or a scalar.
#[derive(Clone, Debug)]
pub enum Prop {
    Value(Value),
    Tracked(Tracked),
}

impl Prop {
    pub fn into_tracked(self) -> Option<Tracked> {
        match self {
            Prop::Tracked(t) => Some(t),
            Prop::Value(_) => None,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Prop::Value(v) => v,
            Prop::Tracked(t) => t.target,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Prop::Value(v) => v.as_f64(),
            Prop::Tracked(_) => None,
        }
    }
}

/// Wraps containers; scalars pass through unmodified.
pub fn wrap(value: Value, on_change: OnChange) -> Prop {
    if value.is_container() {
        Prop::Tracked(Tracked {
            target: value,
            on_change,
        })
    } else {
        Prop::Value(value)
    }
}

#[derive(Clone)]
pub struct Tracked {
    target: Value,
    on_change: OnChange,
}

impl fmt::Debug for Tracked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracked")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl Tracked {
    /// Builds a view directly. A scalar `target` yields an inert view: reads
    /// give `undefined` and writes fail with [`Error::State`].
    pub fn new(target: Value, on_change: OnChange) -> Self {
        Self { target, on_change }
    }

    /// The backing value. Containers share storage with this view.
    pub fn value(&self) -> Value {
        self.target.clone()
    }

    pub fn get<'k>(&self, key: impl Into<Key<'k>>) -> Prop {
        wrap(self.read(key.into()), self.on_change.clone())
    }

    /// Plain read without wrapping.
    pub fn get_value<'k>(&self, key: impl Into<Key<'k>>) -> Value {
        self.read(key.into())
    }

    pub fn set<'k>(&self, key: impl Into<Key<'k>>, value: impl Into<Value>) -> Result<()> {
        self.write(key.into(), value.into())?;
        (self.on_change)()
    }

    /// Appends to an array-backed view. One write, one callback.
    pub fn push(&self, value: impl Into<Value>) -> Result<()> {
        match &self.target {
            Value::Array(items) => items.borrow_mut().push(value.into()),
            other => {
                return Err(Error::State(format!(
                    "cannot push onto a {}",
                    other.type_name()
                )));
            }
        }
        (self.on_change)()
    }

    pub fn len(&self) -> usize {
        match &self.target {
            Value::Array(items) => items.borrow().len(),
            Value::Object(map) => map.borrow().len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Top-level keys of an object-backed view, in insertion order.
    pub fn keys(&self) -> Vec<String> {
        match &self.target {
            Value::Object(map) => map.borrow().keys().cloned().collect(),
            Value::Array(items) => (0..items.borrow().len()).map(|i| i.to_string()).collect(),
            _ => Vec::new(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        self.target.to_json()
    }

    fn read(&self, key: Key<'_>) -> Value {
        let found = match (&self.target, key) {
            (Value::Object(map), Key::Name(name)) => map.borrow().get(name).cloned(),
            (Value::Object(map), Key::Index(i)) => map.borrow().get(&i.to_string()).cloned(),
            (Value::Array(items), Key::Index(i)) => items.borrow().get(i).cloned(),
            (Value::Array(items), Key::Name("length")) => {
                Some(Value::from(items.borrow().len()))
            }
            (Value::Array(items), Key::Name(name)) => name
                .parse::<usize>()
                .ok()
                .and_then(|i| items.borrow().get(i).cloned()),
            _ => None,
        };
        found.unwrap_or_default()
    }

    fn write(&self, key: Key<'_>, value: Value) -> Result<()> {
        match (&self.target, key) {
            (Value::Object(map), Key::Name(name)) => {
                map.borrow_mut().insert(name.to_string(), value);
            }
            (Value::Object(map), Key::Index(i)) => {
                map.borrow_mut().insert(i.to_string(), value);
            }
            (Value::Array(items), Key::Name("length")) => {
                let len = value.to_number();
                let valid = len >= 0.0 && len.fract() == 0.0 && len <= MAX_ARRAY_LENGTH as f64;
                if !valid {
                    return Err(Error::State(format!("invalid array length {value}")));
                }
                resize(&mut items.borrow_mut(), len as usize)?;
            }
            (Value::Array(items), key) => {
                let index = match key {
                    Key::Index(i) => i,
                    Key::Name(name) => name.parse::<usize>().map_err(|_| {
                        Error::State(format!("`{name}` is not an array index"))
                    })?,
                };
                let len = index
                    .checked_add(1)
                    .filter(|&len| len <= MAX_ARRAY_LENGTH)
                    .ok_or_else(|| Error::State(format!("invalid array index {index}")))?;
                let mut items = items.borrow_mut();
                if len > items.len() {
                    resize(&mut items, len)?;
                }
                items[index] = value;
            }
            (other, _) => {
                return Err(Error::State(format!(
                    "cannot write a property of a {}",
                    other.type_name()
                )));
            }
        }
        Ok(())
    }
}

/// Grows or truncates `items`, filling holes with `undefined`. Growth the
/// allocator refuses is an error rather than an abort.
fn resize(items: &mut Vec<Value>, len: usize) -> Result<()> {
    if let Some(extra) = len.checked_sub(items.len()) {
        items
            .try_reserve_exact(extra)
            .map_err(|err| Error::State(format!("cannot grow array to {len}: {err}")))?;
    }
    items.resize(len, Value::Undefined);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    fn counting() -> (OnChange, Rc<Cell<usize>>) {
        let count = Rc::new(Cell::new(0));
        let on_change: OnChange = {
            let count = count.clone();
            Rc::new(move || {
                count.set(count.get() + 1);
                Ok(())
            })
        };
        (on_change, count)
    }

    fn tracked(v: serde_json::Value) -> (Tracked, Rc<Cell<usize>>) {
        let (on_change, count) = counting();
        let state = wrap(v.into(), on_change).into_tracked().unwrap();
        (state, count)
    }

    #[test]
    fn scalars_pass_through() {
        let (on_change, _) = counting();
        assert!(matches!(wrap(Value::from(3), on_change), Prop::Value(_)));
    }

    #[test]
    fn each_write_triggers_one_callback() {
        let (state, count) = tracked(json!({"count": 1}));
        state.set("count", 2).unwrap();
        assert_eq!(count.get(), 1);
        assert_eq!(state.get("count").as_f64(), Some(2.0));
        state.set("count", 3).unwrap();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn nested_reads_wrap_shared_storage() {
        let (state, count) = tracked(json!({"user": {"name": "ada"}}));
        let first = state.get("user").into_tracked().unwrap();
        let second = state.get("user").into_tracked().unwrap();
        first.set("name", "grace").unwrap();
        assert_eq!(count.get(), 1);
        assert_eq!(second.get_value("name").to_string(), "grace");
        assert_eq!(state.to_json(), json!({"user": {"name": "grace"}}));
    }

    #[test]
    fn reads_do_not_trigger() {
        let (state, count) = tracked(json!({"a": [1, 2]}));
        let list = state.get("a").into_tracked().unwrap();
        let _ = list.get(0usize);
        let _ = list.get("length");
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn array_writes_extend_and_push() {
        let (state, count) = tracked(json!([1]));
        state.set(2usize, 9).unwrap();
        assert_eq!(state.to_json(), json!([1, null, 9]));
        state.push(4).unwrap();
        assert_eq!(state.len(), 4);
        state.set("length", 1).unwrap();
        assert_eq!(state.to_json(), json!([1]));
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn bad_array_key_is_rejected_without_callback() {
        let (state, count) = tracked(json!([]));
        assert!(matches!(state.set("name", 1), Err(Error::State(_))));
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn out_of_range_index_is_a_state_error() {
        let (state, count) = tracked(json!([1]));
        assert!(matches!(state.set(usize::MAX, 1), Err(Error::State(_))));
        assert!(matches!(state.set(MAX_ARRAY_LENGTH, 1), Err(Error::State(_))));
        assert!(matches!(state.set("99999999999", 1), Err(Error::State(_))));
        assert!(matches!(state.set("length", 1e12), Err(Error::State(_))));
        assert_eq!(state.to_json(), json!([1]));
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn callback_error_surfaces_after_write() {
        let on_change: OnChange = Rc::new(|| Err(Error::Template("boom".into())));
        let state = wrap(json!({"x": 1}).into(), on_change)
            .into_tracked()
            .unwrap();
        assert_eq!(state.set("x", 2), Err(Error::Template("boom".into())));
        assert_eq!(state.get_value("x").as_f64(), Some(2.0));
    }
}
