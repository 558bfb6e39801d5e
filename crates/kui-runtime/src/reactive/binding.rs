#![forbid(unsafe_code)]

//! Two-way bindings between [`ActiveData`] keys and [`Widget`] surfaces.
//!
//! A [`BindingTable`] owns every binding of one UI context. Each binding ties
//! one `(widget, active data, key)` triple to a [`BindingKind`]: a widget
//! attribute, the widget value, its inner content, or a map from values to
//! pre-built child widgets.
//!
//! # Usage
//!
//! ```
//! use kui_core::{ActiveData, Widget};
//! use kui_runtime::reactive::BindingTable;
//! use serde_json::json;
//!
//! let table = BindingTable::new();
//! let person = ActiveData::new();
//! let input = Widget::new("input");
//!
//! table.bind_value(&input, &person, "name");
//! assert_eq!(person.get("name"), Some(json!("")));
//!
//! person.set("name", "Ada");
//! assert_eq!(input.value(), json!("Ada"));
//!
//! input.set_value("Grace");
//! assert_eq!(person.get("name"), Some(json!("Grace")));
//! ```
//!
//! # Architecture
//!
//! Bindings live in an arena addressed by [`BindingId`], with two side
//! indexes: widget id → binding ids and active-data id → binding ids. The
//! table installs one `Widget.Changed` listener per widget and one change
//! listener per active data object, no matter how many bindings share them.
//! Listener closures hold a `Weak` reference to the table state.
//!
//! # Invariants
//!
//! 1. A binding is present in the arena and in both indexes, or in none.
//! 2. A widget (or active data) has a table listener iff its index entry is
//!    non-empty; the listener is removed exactly when the entry empties.
//! 3. A widget-originated change is forwarded once: the originating binding is
//!    marked in flight while the active data is written, and in-flight
//!    bindings are skipped when the change is echoed back. Marks are per
//!    binding and stacked, so nested updates from other widgets are unaffected.
//! 4. Active data → widget updates never emit `Widget.Changed` for the bound
//!    surface, so they cannot loop back.
//! 5. Dropping the last table handle removes every listener it installed.
//!
//! # Failure Modes
//!
//! - Unknown binding, widget, or active data ids: no-ops returning `false`/`0`.
//! - Widget→data forwarding of a non-object into an empty-key binding is
//!   ignored.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use kui_core::active_data::{ActiveData, ActiveDataEvent, ActiveDataId};
use kui_core::emitter::HandlerId;
use kui_core::widget::{WIDGET_CHANGED, Widget, WidgetChange, WidgetEvent, WidgetId};
use serde_json::Value;

/// Identifier of a binding within its [`BindingTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

impl BindingId {
    /// Get the raw id value.
    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// MapTargets / BindingKind
// ---------------------------------------------------------------------------

/// Pre-built widgets selected by a map binding, keyed by the string form of
/// the bound value.
///
/// String values map by their contents; other values by their JSON text
/// (`true`, `3`, ...); `null` maps to the empty string.
#[derive(Clone, Default)]
pub struct MapTargets {
    targets: Rc<AHashMap<String, Widget>>,
}

impl MapTargets {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the widget shown for `value`.
    #[must_use]
    pub fn with(mut self, value: impl Into<String>, widget: Widget) -> Self {
        Rc::make_mut(&mut self.targets).insert(value.into(), widget);
        self
    }

    /// Widget registered for `value`, if any.
    #[must_use]
    pub fn get(&self, value: &Value) -> Option<&Widget> {
        self.targets.get(&map_key(value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl fmt::Debug for MapTargets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.targets.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("MapTargets").field("values", &keys).finish()
    }
}

fn map_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Which widget surface a binding synchronizes.
#[derive(Debug, Clone)]
pub enum BindingKind {
    /// A named attribute. Bidirectional.
    Attribute(String),
    /// The widget value. Bidirectional.
    Value,
    /// The inner content. Bidirectional.
    InnerHtml,
    /// Swap the widget's children for the widget mapped to the value.
    /// Active data → widget only.
    Map(MapTargets),
}

impl BindingKind {
    /// Value to forward into the active data for a widget change, if this
    /// kind listens to that change.
    fn forwarded_value(&self, change: &WidgetChange) -> Option<Value> {
        match (self, change) {
            (Self::Attribute(bound), WidgetChange::Attribute { name, value }) if bound == name => {
                Some(value.clone().unwrap_or(Value::Null))
            }
            (Self::Value, WidgetChange::Value(value)) => Some(value.clone()),
            (Self::InnerHtml, WidgetChange::Content(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Push `value` into the widget without echoing a change for the bound
    /// surface.
    fn apply(&self, widget: &Widget, value: Value) {
        match self {
            Self::Attribute(name) => widget.set_attribute_silently(name, value),
            Self::Value => widget.set_value_silently(value),
            Self::InnerHtml => widget.set_content_silently(value),
            Self::Map(targets) => widget.replace_children(targets.get(&value)),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Attribute(_) => "attribute",
            Self::Value => "value",
            Self::InnerHtml => "inner_html",
            Self::Map(_) => "map",
        }
    }
}

/// Read-only description of a registered binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingInfo {
    pub id: BindingId,
    pub widget: WidgetId,
    pub active_data: ActiveDataId,
    /// Bound key; empty when bound to the whole active data value.
    pub key: String,
}

// ---------------------------------------------------------------------------
// Table state
// ---------------------------------------------------------------------------

struct BindingRecord {
    widget: Widget,
    data: ActiveData,
    key: String,
    kind: BindingKind,
}

impl BindingRecord {
    fn current_value(&self) -> Value {
        if self.key.is_empty() {
            self.data.value()
        } else {
            self.data.get(&self.key).unwrap_or_default()
        }
    }
}

struct Slot<T> {
    target: T,
    handler: HandlerId,
    members: BTreeSet<BindingId>,
}

impl<T> Slot<T> {
    fn new(target: T, handler: HandlerId) -> Self {
        Self {
            target,
            handler,
            members: BTreeSet::new(),
        }
    }
}

struct TableState {
    bindings: BTreeMap<BindingId, BindingRecord>,
    by_widget: AHashMap<WidgetId, Slot<Widget>>,
    by_active_data: AHashMap<ActiveDataId, Slot<ActiveData>>,
    in_flight: Vec<BindingId>,
    next_id: u64,
}

impl TableState {
    fn remove_binding(&mut self, id: BindingId) -> bool {
        let Some(record) = self.bindings.remove(&id) else {
            return false;
        };

        let widget_id = record.widget.id();
        let widget_empty = self.by_widget.get_mut(&widget_id).is_some_and(|slot| {
            slot.members.remove(&id);
            slot.members.is_empty()
        });
        if widget_empty && let Some(slot) = self.by_widget.remove(&widget_id) {
            slot.target.off(WIDGET_CHANGED, slot.handler);
            tracing::trace!(widget = %widget_id, "binding listener released");
        }

        let data_id = record.data.id();
        let data_empty = self.by_active_data.get_mut(&data_id).is_some_and(|slot| {
            slot.members.remove(&id);
            slot.members.is_empty()
        });
        if data_empty && let Some(slot) = self.by_active_data.remove(&data_id) {
            slot.target.off(slot.handler);
            tracing::trace!(active_data = %data_id, "binding listener released");
        }

        true
    }
}

impl Drop for TableState {
    fn drop(&mut self) {
        for slot in self.by_widget.values() {
            slot.target.off(WIDGET_CHANGED, slot.handler);
        }
        for slot in self.by_active_data.values() {
            slot.target.off(slot.handler);
        }
    }
}

/// Marks a binding as the origin of an update for the guard's lifetime.
struct InFlightGuard<'a> {
    state: &'a RefCell<TableState>,
    id: BindingId,
}

impl<'a> InFlightGuard<'a> {
    fn new(state: &'a RefCell<TableState>, id: BindingId) -> Self {
        state.borrow_mut().in_flight.push(id);
        Self { state, id }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut st = self.state.borrow_mut();
        if let Some(pos) = st.in_flight.iter().rposition(|id| *id == self.id) {
            st.in_flight.remove(pos);
        }
    }
}

fn on_active_data_changed(state: &RefCell<TableState>, event: &ActiveDataEvent) {
    let updates: Vec<(Widget, BindingKind, Value)> = {
        let st = state.borrow();
        let Some(slot) = st.by_active_data.get(&event.active_data) else {
            return;
        };
        slot.members
            .iter()
            .filter(|id| !st.in_flight.contains(id))
            .filter_map(|id| st.bindings.get(id))
            .filter(|b| b.key.is_empty() || b.key == event.key)
            .map(|b| (b.widget.clone(), b.kind.clone(), b.current_value()))
            .collect()
    };

    for (widget, kind, value) in updates {
        kind.apply(&widget, value);
    }
}

fn on_widget_changed(state: &RefCell<TableState>, event: &WidgetEvent) {
    let WidgetEvent::Changed { widget, change } = event else {
        return;
    };

    let forwards: Vec<(BindingId, ActiveData, String, Value)> = {
        let st = state.borrow();
        let Some(slot) = st.by_widget.get(widget) else {
            return;
        };
        slot.members
            .iter()
            .filter_map(|id| {
                let b = st.bindings.get(id)?;
                let value = b.kind.forwarded_value(change)?;
                Some((*id, b.data.clone(), b.key.clone(), value))
            })
            .collect()
    };

    for (id, data, key, value) in forwards {
        let _guard = InFlightGuard::new(state, id);
        if key.is_empty() {
            match value {
                Value::Object(entries) => data.assign(&entries),
                _ => tracing::trace!(
                    binding = id.id(),
                    "non-object value for whole-data binding ignored"
                ),
            }
        } else {
            data.set(key, value);
        }
    }
}

// ---------------------------------------------------------------------------
// BindingTable
// ---------------------------------------------------------------------------

/// Registry of bindings for one UI context.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct BindingTable {
    state: Rc<RefCell<TableState>>,
}

impl Default for BindingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BindingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.state.borrow();
        f.debug_struct("BindingTable")
            .field("bindings", &st.bindings.len())
            .field("widgets", &st.by_widget.len())
            .field("active_data", &st.by_active_data.len())
            .finish()
    }
}

impl BindingTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(TableState {
                bindings: BTreeMap::new(),
                by_widget: AHashMap::new(),
                by_active_data: AHashMap::new(),
                in_flight: Vec::new(),
                next_id: 1,
            })),
        }
    }

    /// Bind `widget` to `key` of `data`.
    ///
    /// An absent key is initialized to the empty string. The widget is then
    /// updated from the active data.
    pub fn bind(
        &self,
        widget: &Widget,
        data: &ActiveData,
        key: &str,
        kind: BindingKind,
    ) -> BindingId {
        self.bind_with_initial(widget, data, key, kind, None)
    }

    /// Like [`bind`](Self::bind), but writes `initial` into the key first.
    ///
    /// With an empty key, an object `initial` is assigned entry by entry.
    pub fn bind_with_initial(
        &self,
        widget: &Widget,
        data: &ActiveData,
        key: &str,
        kind: BindingKind,
        initial: Option<Value>,
    ) -> BindingId {
        match (key.is_empty(), initial) {
            (false, Some(value)) => data.set(key, value),
            (false, None) => {
                data.ensure(key, "");
            }
            (true, Some(Value::Object(entries))) => data.assign(&entries),
            (true, _) => {}
        }

        let label = kind.label();
        let (id, widget_value) = {
            let mut st = self.state.borrow_mut();
            let id = BindingId(st.next_id);
            st.next_id += 1;

            st.by_widget
                .entry(widget.id())
                .or_insert_with(|| {
                    let weak: Weak<RefCell<TableState>> = Rc::downgrade(&self.state);
                    let handler = widget.on(WIDGET_CHANGED, move |ev| {
                        if let Some(state) = weak.upgrade() {
                            on_widget_changed(&state, ev);
                        }
                    });
                    Slot::new(widget.clone(), handler)
                })
                .members
                .insert(id);

            st.by_active_data
                .entry(data.id())
                .or_insert_with(|| {
                    let weak: Weak<RefCell<TableState>> = Rc::downgrade(&self.state);
                    let handler = data.on(move |ev| {
                        if let Some(state) = weak.upgrade() {
                            on_active_data_changed(&state, ev);
                        }
                    });
                    Slot::new(data.clone(), handler)
                })
                .members
                .insert(id);

            let record = BindingRecord {
                widget: widget.clone(),
                data: data.clone(),
                key: key.to_owned(),
                kind: kind.clone(),
            };
            let value = record.current_value();
            st.bindings.insert(id, record);
            (id, value)
        };

        kind.apply(widget, widget_value);
        tracing::debug!(
            binding = id.id(),
            widget = %widget.id(),
            active_data = %data.id(),
            key,
            kind = label,
            "bound"
        );
        id
    }

    /// Bind a widget attribute to `key`.
    pub fn bind_attribute(
        &self,
        widget: &Widget,
        data: &ActiveData,
        key: &str,
        attribute: impl Into<String>,
    ) -> BindingId {
        self.bind(widget, data, key, BindingKind::Attribute(attribute.into()))
    }

    /// Bind the widget value to `key`.
    pub fn bind_value(&self, widget: &Widget, data: &ActiveData, key: &str) -> BindingId {
        self.bind(widget, data, key, BindingKind::Value)
    }

    /// Bind the widget's inner content to `key`.
    pub fn bind_inner_html(&self, widget: &Widget, data: &ActiveData, key: &str) -> BindingId {
        self.bind(widget, data, key, BindingKind::InnerHtml)
    }

    /// Show the widget from `targets` that matches the value of `key`.
    pub fn bind_map(
        &self,
        widget: &Widget,
        data: &ActiveData,
        key: &str,
        targets: MapTargets,
    ) -> BindingId {
        self.bind(widget, data, key, BindingKind::Map(targets))
    }

    /// Remove one binding.
    pub fn unbind(&self, id: BindingId) -> bool {
        let removed = self.state.borrow_mut().remove_binding(id);
        if removed {
            tracing::debug!(binding = id.id(), "unbound");
        }
        removed
    }

    fn unbind_all(&self, ids: Vec<BindingId>) -> usize {
        let mut st = self.state.borrow_mut();
        ids.into_iter().filter(|id| st.remove_binding(*id)).count()
    }

    /// Remove every binding between `data` and `widget`.
    pub fn unbind_pair(&self, data: &ActiveData, widget: &Widget) -> usize {
        let ids: Vec<BindingId> = {
            let st = self.state.borrow();
            match st.by_active_data.get(&data.id()) {
                Some(slot) => slot
                    .members
                    .iter()
                    .copied()
                    .filter(|id| st.bindings.get(id).is_some_and(|b| b.widget == *widget))
                    .collect(),
                None => return 0,
            }
        };
        let removed = self.unbind_all(ids);
        tracing::debug!(widget = %widget.id(), active_data = %data.id(), removed, "unbound pair");
        removed
    }

    /// Remove every binding of `widget`.
    pub fn unbind_widget(&self, widget: &Widget) -> usize {
        let ids: Vec<BindingId> = match self.state.borrow().by_widget.get(&widget.id()) {
            Some(slot) => slot.members.iter().copied().collect(),
            None => return 0,
        };
        let removed = self.unbind_all(ids);
        tracing::debug!(widget = %widget.id(), removed, "unbound widget");
        removed
    }

    /// Remove every binding of `data`.
    pub fn unbind_active_data(&self, data: &ActiveData) -> usize {
        let ids: Vec<BindingId> = match self.state.borrow().by_active_data.get(&data.id()) {
            Some(slot) => slot.members.iter().copied().collect(),
            None => return 0,
        };
        let removed = self.unbind_all(ids);
        tracing::debug!(active_data = %data.id(), removed, "unbound active data");
        removed
    }

    /// Describe a registered binding.
    #[must_use]
    pub fn binding(&self, id: BindingId) -> Option<BindingInfo> {
        self.state.borrow().bindings.get(&id).map(|b| BindingInfo {
            id,
            widget: b.widget.id(),
            active_data: b.data.id(),
            key: b.key.clone(),
        })
    }

    /// Total number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.borrow().bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.borrow().bindings.is_empty()
    }

    /// Number of bindings involving `widget`.
    #[must_use]
    pub fn bindings_for_widget(&self, widget: &Widget) -> usize {
        self.state
            .borrow()
            .by_widget
            .get(&widget.id())
            .map_or(0, |slot| slot.members.len())
    }

    /// Number of bindings involving `data`.
    #[must_use]
    pub fn bindings_for_active_data(&self, data: &ActiveData) -> usize {
        self.state
            .borrow()
            .by_active_data
            .get(&data.id())
            .map_or(0, |slot| slot.members.len())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use kui_core::active_data::ActiveDataAction;
    use kui_core::testing::Recorder;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn bind_initializes_missing_key() {
        let table = BindingTable::new();
        let data = ActiveData::new();
        let w = Widget::new("input");

        table.bind_value(&w, &data, "title");
        assert_eq!(data.get("title"), Some(json!("")));
        assert_eq!(w.value(), json!(""));
    }

    #[test]
    fn bind_keeps_existing_value() {
        let table = BindingTable::new();
        let data = ActiveData::from_value(json!({ "title": "Report" }));
        let w = Widget::new("input");

        table.bind_value(&w, &data, "title");
        assert_eq!(data.get("title"), Some(json!("Report")));
        assert_eq!(w.value(), json!("Report"));
    }

    #[test]
    fn bind_with_initial_overwrites() {
        let table = BindingTable::new();
        let data = ActiveData::from_value(json!({ "n": 1 }));
        let w = Widget::new("input");

        table.bind_with_initial(&w, &data, "n", BindingKind::Value, Some(json!(5)));
        assert_eq!(data.get("n"), Some(json!(5)));
        assert_eq!(w.value(), json!(5));
    }

    #[test]
    fn value_binding_round_trip() {
        let table = BindingTable::new();
        let data = ActiveData::new();
        let w = Widget::new("input");
        table.bind_value(&w, &data, "email");

        data.set("email", "a@example.com");
        assert_eq!(w.value(), json!("a@example.com"));

        w.set_value("b@example.com");
        assert_eq!(data.get("email"), Some(json!("b@example.com")));
    }

    #[test]
    fn single_mutation_propagates_once() {
        let table = BindingTable::new();
        let data = ActiveData::new();
        let w = Widget::new("input");
        table.bind_value(&w, &data, "k");

        let data_events = Recorder::<ActiveDataEvent>::new();
        data.on(data_events.handler());
        let widget_events = Recorder::<WidgetEvent>::new();
        w.on(WIDGET_CHANGED, widget_events.handler());

        w.set_value("typed");
        assert_eq!(data_events.len(), 1);
        assert_eq!(widget_events.len(), 1);

        data.set("k", "pushed");
        assert_eq!(data_events.len(), 2);
        // Data → widget is silent.
        assert_eq!(widget_events.len(), 1);
        assert_eq!(w.value(), json!("pushed"));
    }

    #[test]
    fn widget_change_fans_out_to_other_widgets() {
        let table = BindingTable::new();
        let data = ActiveData::new();
        let input = Widget::new("input");
        let label = Widget::new("span");
        table.bind_value(&input, &data, "name");
        table.bind_inner_html(&label, &data, "name");

        input.set_value("Ada");
        assert_eq!(label.content(), json!("Ada"));
    }

    #[test]
    fn attribute_binding_only_tracks_its_attribute() {
        let table = BindingTable::new();
        let data = ActiveData::new();
        let w = Widget::new("a");
        table.bind_attribute(&w, &data, "link", "href");

        data.set("link", "/home");
        assert_eq!(w.attribute("href"), Some(json!("/home")));

        w.set_attribute("title", "ignored");
        assert_eq!(data.get("link"), Some(json!("/home")));

        w.set_attribute("href", "/about");
        assert_eq!(data.get("link"), Some(json!("/about")));

        w.remove_attribute("href");
        assert_eq!(data.get("link"), Some(Value::Null));
    }

    #[test]
    fn other_keys_do_not_notify() {
        let table = BindingTable::new();
        let data = ActiveData::new();
        let w = Widget::new("input");
        table.bind_value(&w, &data, "a");

        data.set("b", "other");
        assert_eq!(w.value(), json!(""));
    }

    #[test]
    fn empty_key_binds_whole_value() {
        let table = BindingTable::new();
        let data = ActiveData::from_value(json!({ "x": 1 }));
        let w = Widget::new("pre");
        table.bind_inner_html(&w, &data, "");
        assert_eq!(w.content(), json!({ "x": 1 }));

        data.set("y", 2);
        assert_eq!(w.content(), json!({ "x": 1, "y": 2 }));

        w.set_content(json!({ "x": 9 }));
        assert_eq!(data.get("x"), Some(json!(9)));
        assert_eq!(data.get("y"), Some(json!(2)));

        w.set_content("not an object");
        assert_eq!(data.get("x"), Some(json!(9)));
    }

    #[test]
    fn map_binding_swaps_children_one_way() {
        let table = BindingTable::new();
        let data = ActiveData::from_value(json!({ "status": "ok" }));
        let host = Widget::new("div");
        let ok = Widget::new("span");
        let err = Widget::new("span");
        let targets = MapTargets::new().with("ok", ok.clone()).with("error", err.clone());
        table.bind_map(&host, &data, "status", targets);

        assert_eq!(host.children(), vec![ok.clone()]);
        data.set("status", "error");
        assert_eq!(host.children(), vec![err.clone()]);
        data.set("status", "unknown");
        assert!(host.children().is_empty());

        // Widget-side changes never reach the data.
        host.set_content("typed");
        assert_eq!(data.get("status"), Some(json!("unknown")));
    }

    #[test]
    fn map_keys_stringify_non_strings() {
        let one = Widget::new("span");
        let targets = MapTargets::new().with("1", one.clone()).with("true", Widget::new("b"));
        assert_eq!(targets.get(&json!(1)), Some(&one));
        assert!(targets.get(&json!(true)).is_some());
        assert!(targets.get(&Value::Null).is_none());
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn listeners_are_reference_counted() {
        let table = BindingTable::new();
        let data = ActiveData::new();
        let w1 = Widget::new("input");
        let w2 = Widget::new("input");

        table.bind_value(&w1, &data, "k");
        table.bind_value(&w2, &data, "k");
        assert_eq!(data.listener_count(), 1);
        assert_eq!(w1.handler_count(WIDGET_CHANGED), 1);

        assert_eq!(table.unbind_widget(&w1), 1);
        assert_eq!(data.listener_count(), 1, "w2 still bound");
        assert_eq!(w1.handler_count(WIDGET_CHANGED), 0);

        assert_eq!(table.unbind_widget(&w2), 1);
        assert_eq!(data.listener_count(), 0);
        assert!(table.is_empty());
    }

    #[test]
    fn one_listener_per_widget_regardless_of_bindings() {
        let table = BindingTable::new();
        let data = ActiveData::new();
        let w = Widget::new("input");
        table.bind_value(&w, &data, "v");
        table.bind_attribute(&w, &data, "t", "title");
        assert_eq!(w.handler_count(WIDGET_CHANGED), 1);
        assert_eq!(table.bindings_for_widget(&w), 2);
    }

    #[test]
    fn unbind_single_binding() {
        let table = BindingTable::new();
        let data = ActiveData::new();
        let w = Widget::new("input");
        let id = table.bind_value(&w, &data, "k");
        let info = table.binding(id).unwrap();
        assert_eq!(info.widget, w.id());
        assert_eq!(info.key, "k");

        assert!(table.unbind(id));
        assert!(!table.unbind(id));
        assert!(table.binding(id).is_none());

        data.set("k", "after");
        assert_eq!(w.value(), json!(""));
    }

    #[test]
    fn unbind_pair_leaves_other_pairs() {
        let table = BindingTable::new();
        let a = ActiveData::new();
        let b = ActiveData::new();
        let w = Widget::new("input");
        table.bind_value(&w, &a, "k");
        table.bind_attribute(&w, &b, "k", "title");

        assert_eq!(table.unbind_pair(&a, &w), 1);
        assert_eq!(a.listener_count(), 0);
        assert_eq!(w.handler_count(WIDGET_CHANGED), 1);
        assert_eq!(table.bindings_for_active_data(&b), 1);

        assert_eq!(table.unbind_pair(&a, &w), 0);
    }

    #[test]
    fn unbind_active_data_releases_widgets() {
        let table = BindingTable::new();
        let data = ActiveData::new();
        let widgets: Vec<Widget> = (0..3).map(|_| Widget::new("input")).collect();
        for w in &widgets {
            table.bind_value(w, &data, "k");
        }

        assert_eq!(table.unbind_active_data(&data), 3);
        assert_eq!(data.listener_count(), 0);
        assert!(widgets.iter().all(|w| w.handler_count(WIDGET_CHANGED) == 0));
        assert_eq!(table.unbind_active_data(&data), 0);
    }

    #[test]
    fn dropping_table_releases_listeners() {
        let data = ActiveData::new();
        let w = Widget::new("input");
        {
            let table = BindingTable::new();
            table.bind_value(&w, &data, "k");
            assert_eq!(data.listener_count(), 1);
        }
        assert_eq!(data.listener_count(), 0);
        assert_eq!(w.handler_count(WIDGET_CHANGED), 0);

        w.set_value("x");
        assert_eq!(data.get("k"), Some(json!("")));
    }

    #[test]
    fn nested_updates_from_two_widgets_do_not_clobber() {
        // `a` drives `k`; a data listener copies `k` into `w_b`, which is
        // itself bound to `mirror`. Both echoes must be suppressed only at
        // their own origin.
        let table = BindingTable::new();
        let data = ActiveData::new();
        let w_a = Widget::new("input");
        let w_b = Widget::new("input");
        let w_a_view = Widget::new("span");
        table.bind_value(&w_a, &data, "k");
        table.bind_inner_html(&w_a_view, &data, "k");
        table.bind_value(&w_b, &data, "mirror");

        let b = w_b.clone();
        data.on_key("k", move |ev| {
            if ev.action == ActiveDataAction::Change
                && let Some(v) = &ev.new_value
            {
                b.set_value(v.clone());
            }
        });

        w_a.set_value("hello");
        assert_eq!(data.get("k"), Some(json!("hello")));
        assert_eq!(data.get("mirror"), Some(json!("hello")));
        assert_eq!(w_a_view.content(), json!("hello"));
        assert_eq!(w_a.value(), json!("hello"));
    }

    #[test]
    fn debug_reports_counts() {
        let table = BindingTable::new();
        table.bind_value(&Widget::new("input"), &ActiveData::new(), "k");
        let debug = format!("{table:?}");
        assert!(debug.contains("bindings: 1"));
    }

    #[derive(Debug, Clone)]
    enum Edit {
        FromData(i64),
        FromWidget(i64),
    }

    fn edit() -> impl Strategy<Value = Edit> {
        prop_oneof![
            any::<i64>().prop_map(Edit::FromData),
            any::<i64>().prop_map(Edit::FromWidget),
        ]
    }

    proptest! {
        #[test]
        fn value_binding_stays_in_sync(edits in proptest::collection::vec(edit(), 1..32)) {
            let table = BindingTable::new();
            let data = ActiveData::new();
            let w = Widget::new("input");
            table.bind_value(&w, &data, "k");

            let events = Recorder::<ActiveDataEvent>::new();
            data.on(events.handler());

            for (n, e) in edits.iter().enumerate() {
                match e {
                    Edit::FromData(v) => data.set("k", *v),
                    Edit::FromWidget(v) => w.set_value(*v),
                }
                prop_assert_eq!(data.get("k"), Some(w.value()));
                prop_assert_eq!(events.len(), n + 1);
            }
        }
    }
}
