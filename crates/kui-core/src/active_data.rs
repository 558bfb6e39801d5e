#![forbid(unsafe_code)]

//! Change-notifying key/value containers.
//!
//! An [`ActiveData`] behaves like a JSON object whose writes are observable:
//! every [`set`](ActiveData::set) or [`remove`](ActiveData::remove) emits an
//! [`ActiveDataEvent`] to the handlers registered with
//! [`on`](ActiveData::on). Identity is a side id ([`ActiveDataId`]) assigned at
//! construction; it is never stored among the keys.
//!
//! # Invariants
//!
//! 1. Every mutation emits exactly one event, after the new value is visible
//!    through [`get`](ActiveData::get).
//! 2. `Add` is emitted for a key that did not exist, `Change` for one that did
//!    (even if the new value is equal), `Delete` for a removal.
//! 3. Handlers run with no internal borrow held, so they may read or write the
//!    same container.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::ser::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::emitter::{Emitter, HandlerId, Message};

/// Message name of every [`ActiveDataEvent`].
pub const ACTIVE_DATA_MESSAGE: &str = "ActiveData";

static ACTIVE_DATA_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an [`ActiveData`] container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActiveDataId(u64);

impl ActiveDataId {
    fn next() -> Self {
        Self(ACTIVE_DATA_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActiveDataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ad#{}", self.0)
    }
}

/// Kind of mutation reported by an [`ActiveDataEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveDataAction {
    /// A new key was inserted.
    Add,
    /// An existing key was overwritten.
    Change,
    /// A key was removed.
    Delete,
}

/// Notification emitted for every mutation of an [`ActiveData`].
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveDataEvent {
    pub active_data: ActiveDataId,
    pub action: ActiveDataAction,
    pub key: String,
    /// Value before the mutation (`None` for `Add`).
    pub old_value: Option<Value>,
    /// Value after the mutation (`None` for `Delete`).
    pub new_value: Option<Value>,
}

impl Message for ActiveDataEvent {
    fn name(&self) -> &str {
        ACTIVE_DATA_MESSAGE
    }
}

struct ActiveDataInner {
    id: ActiveDataId,
    fields: RefCell<Map<String, Value>>,
    emitter: Emitter<ActiveDataEvent>,
}

/// Shared, change-notifying string-keyed container.
///
/// Cloning yields another handle to the same data; equality is identity.
#[derive(Clone)]
pub struct ActiveData {
    inner: Rc<ActiveDataInner>,
}

impl Default for ActiveData {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ActiveData {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for ActiveData {}

impl fmt::Debug for ActiveData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveData")
            .field("id", &self.inner.id)
            .field("fields", &*self.inner.fields.borrow())
            .finish()
    }
}

impl Serialize for ActiveData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.inner.fields.borrow().serialize(serializer)
    }
}

impl ActiveData {
    /// Create an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::from_map(Map::new())
    }

    /// Create a container holding the entries of `fields`.
    #[must_use]
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self {
            inner: Rc::new(ActiveDataInner {
                id: ActiveDataId::next(),
                fields: RefCell::new(fields),
                emitter: Emitter::new(),
            }),
        }
    }

    /// Create a container from a JSON value. Objects contribute their
    /// entries; any other value yields an empty container.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::from_map(map),
            _ => Self::new(),
        }
    }

    /// Identity of this container.
    #[inline]
    pub fn id(&self) -> ActiveDataId {
        self.inner.id
    }

    /// Current value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.fields.borrow().get(key).cloned()
    }

    /// Whether `key` exists.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.inner.fields.borrow().contains_key(key)
    }

    /// Keys in storage order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.fields.borrow().keys().cloned().collect()
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.fields.borrow().len()
    }

    /// Whether the container has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.fields.borrow().is_empty()
    }

    /// Snapshot of the whole container as a JSON object.
    #[must_use]
    pub fn value(&self) -> Value {
        Value::Object(self.inner.fields.borrow().clone())
    }

    /// Write `key`, emitting `Add` or `Change`.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        let old_value = self
            .inner
            .fields
            .borrow_mut()
            .insert(key.clone(), value.clone());
        let action = if old_value.is_some() {
            ActiveDataAction::Change
        } else {
            ActiveDataAction::Add
        };

        self.inner.emitter.send(&ActiveDataEvent {
            active_data: self.inner.id,
            action,
            key,
            old_value,
            new_value: Some(value),
        });
    }

    /// Insert `key` with `value` only if it is absent. Returns whether a
    /// write happened.
    pub fn ensure(&self, key: &str, value: impl Into<Value>) -> bool {
        if self.has(key) {
            return false;
        }
        self.set(key, value);
        true
    }

    /// Write every entry of `entries`, one event per key.
    pub fn assign(&self, entries: &Map<String, Value>) {
        for (key, value) in entries {
            self.set(key.clone(), value.clone());
        }
    }

    /// Remove `key`, emitting `Delete` if it existed.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let old_value = self.inner.fields.borrow_mut().remove(key)?;
        self.inner.emitter.send(&ActiveDataEvent {
            active_data: self.inner.id,
            action: ActiveDataAction::Delete,
            key: key.to_owned(),
            old_value: Some(old_value.clone()),
            new_value: None,
        });
        Some(old_value)
    }

    /// Register a change handler.
    pub fn on(&self, handler: impl Fn(&ActiveDataEvent) + 'static) -> HandlerId {
        self.inner.emitter.on(ACTIVE_DATA_MESSAGE, handler)
    }

    /// Register a handler that only sees events for `key`.
    pub fn on_key(
        &self,
        key: impl Into<String>,
        handler: impl Fn(&ActiveDataEvent) + 'static,
    ) -> HandlerId {
        let key = key.into();
        self.inner
            .emitter
            .on_filtered(ACTIVE_DATA_MESSAGE, move |ev| ev.key == key, handler)
    }

    /// Register a handler removed after its first event.
    pub fn once(&self, handler: impl Fn(&ActiveDataEvent) + 'static) -> HandlerId {
        self.inner.emitter.once(ACTIVE_DATA_MESSAGE, handler)
    }

    /// Remove a change handler.
    pub fn off(&self, id: HandlerId) -> bool {
        self.inner.emitter.off(ACTIVE_DATA_MESSAGE, id)
    }

    /// Number of registered change handlers.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.emitter.handler_count(ACTIVE_DATA_MESSAGE)
    }
}
