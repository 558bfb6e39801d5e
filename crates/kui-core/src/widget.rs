#![forbid(unsafe_code)]

//! Widget element model and widget-level events.
//!
//! A [`Widget`] pairs an element (tag, attributes, value, inner content,
//! children, visibility, focus) with a uniform event API:
//! [`on`](Widget::on) / [`off`](Widget::off) / [`send`](Widget::send).
//! Element mutations are reported as [`WidgetEvent::Changed`]; writes made on
//! behalf of a data source (the `*_silently` mutators) are reported as
//! [`WidgetEvent::Synced`] instead, so observers of the element state still
//! see them while `Widget.Changed` listeners do not echo them back. Raw
//! element events are re-broadcast under the `Widget.<Name>` convention by
//! [`dispatch`](Widget::dispatch).
//!
//! # Invariants
//!
//! 1. Every emitting mutator sends `Widget.Changed` after the mutation is
//!    visible, unless the widget is silenced.
//! 2. `*_silently` mutators never emit `Widget.Changed`; they send
//!    `Widget.Synced` unless the widget is silenced.
//! 3. Setting content removes all children; appending a child keeps content.
//! 4. A widget is never its own child, and appears at most once among the
//!    children of a given parent.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use serde_json::Value;

use crate::emitter::{Emitter, HandlerId, Message};

/// Message name for element mutations.
pub const WIDGET_CHANGED: &str = "Widget.Changed";
/// Message name for element writes that must not be forwarded back to their
/// source.
pub const WIDGET_SYNCED: &str = "Widget.Synced";
/// Message name for modification-status transitions.
pub const WIDGET_MODIFIED: &str = "Widget.Modified";
/// Message name for validity transitions.
pub const WIDGET_VALIDITY: &str = "Widget.Validity";

const DISABLED_ATTRIBUTE: &str = "disabled";

static WIDGET_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique widget identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(u64);

impl WidgetId {
    fn next() -> Self {
        Self(WIDGET_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "widget#{}", self.0)
    }
}

/// What part of the element a `Widget.Changed` message reports.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetChange {
    /// An attribute was set (`Some`) or removed (`None`).
    Attribute { name: String, value: Option<Value> },
    /// The element value changed.
    Value(Value),
    /// The inner content was replaced.
    Content(Value),
    ChildAdded(WidgetId),
    ChildRemoved(WidgetId),
}

/// Events emitted by a widget.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetEvent {
    Changed {
        widget: WidgetId,
        change: WidgetChange,
    },
    /// The element was updated by a `*_silently` mutator.
    Synced {
        widget: WidgetId,
        change: WidgetChange,
    },
    Modified {
        widget: WidgetId,
        modified: bool,
    },
    Validity {
        widget: WidgetId,
        valid: bool,
    },
    /// A raw element event re-broadcast as `Widget.<Name>`.
    Element {
        widget: WidgetId,
        name: String,
    },
}

impl WidgetEvent {
    /// The widget that emitted this event.
    pub fn widget(&self) -> WidgetId {
        match self {
            Self::Changed { widget, .. }
            | Self::Synced { widget, .. }
            | Self::Modified { widget, .. }
            | Self::Validity { widget, .. }
            | Self::Element { widget, .. } => *widget,
        }
    }
}

impl Message for WidgetEvent {
    fn name(&self) -> &str {
        match self {
            Self::Changed { .. } => WIDGET_CHANGED,
            Self::Synced { .. } => WIDGET_SYNCED,
            Self::Modified { .. } => WIDGET_MODIFIED,
            Self::Validity { .. } => WIDGET_VALIDITY,
            Self::Element { name, .. } => name.as_str(),
        }
    }
}

/// Map a raw element event name to its widget-level message name.
///
/// `"click"` becomes `"Widget.Click"`, `"keydown"` becomes `"Widget.Keydown"`.
#[must_use]
pub fn element_message_name(event: &str) -> String {
    let mut chars = event.chars();
    match chars.next() {
        Some(first) => format!("Widget.{}{}", first.to_uppercase(), chars.as_str()),
        None => "Widget.".to_owned(),
    }
}

#[derive(Default)]
struct Element {
    attributes: AHashMap<String, Value>,
    value: Value,
    content: Value,
    children: Vec<Widget>,
    hidden: bool,
    autofocus: bool,
    focused: bool,
}

struct WidgetInner {
    id: WidgetId,
    tag: String,
    element: RefCell<Element>,
    emitter: Emitter<WidgetEvent>,
}

/// Shared handle to a widget.
///
/// Cloning yields another handle to the same widget; equality is identity.
#[derive(Clone)]
pub struct Widget {
    inner: Rc<WidgetInner>,
}

impl PartialEq for Widget {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Widget {}

impl fmt::Debug for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let el = self.inner.element.borrow();
        f.debug_struct("Widget")
            .field("id", &self.inner.id)
            .field("tag", &self.inner.tag)
            .field("children", &el.children.len())
            .field("hidden", &el.hidden)
            .finish()
    }
}

impl Widget {
    /// Create a widget for an element with the given tag name.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(WidgetInner {
                id: WidgetId::next(),
                tag: tag.into(),
                element: RefCell::new(Element {
                    content: Value::String(String::new()),
                    ..Element::default()
                }),
                emitter: Emitter::new(),
            }),
        }
    }

    /// Process-unique id of this widget.
    #[inline]
    pub fn id(&self) -> WidgetId {
        self.inner.id
    }

    /// Element tag name.
    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    // --- Events ---

    /// Register a handler for messages named `name`.
    pub fn on(&self, name: &str, handler: impl Fn(&WidgetEvent) + 'static) -> HandlerId {
        self.inner.emitter.on(name, handler)
    }

    /// Register a handler removed after its first delivery.
    pub fn once(&self, name: &str, handler: impl Fn(&WidgetEvent) + 'static) -> HandlerId {
        self.inner.emitter.once(name, handler)
    }

    /// Remove a handler. Unknown ids return `false`.
    pub fn off(&self, name: &str, id: HandlerId) -> bool {
        self.inner.emitter.off(name, id)
    }

    /// Deliver `event` to the handlers of its message name.
    pub fn send(&self, event: &WidgetEvent) {
        self.inner.emitter.send(event);
    }

    /// Number of handlers registered for `name`.
    #[must_use]
    pub fn handler_count(&self, name: &str) -> usize {
        self.inner.emitter.handler_count(name)
    }

    /// Suppress all events from this widget until [`resume`](Self::resume).
    pub fn silence(&self) {
        self.inner.emitter.silence();
    }

    /// Undo [`silence`](Self::silence).
    pub fn resume(&self) {
        self.inner.emitter.resume();
    }

    /// Whether events are currently suppressed.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.inner.emitter.is_silent()
    }

    /// Re-broadcast a raw element event (`"click"`, `"input"`, ...) as
    /// `Widget.<Name>`.
    pub fn dispatch(&self, event: &str) {
        self.send(&WidgetEvent::Element {
            widget: self.id(),
            name: element_message_name(event),
        });
    }

    fn changed(&self, change: WidgetChange, emit: bool) {
        let widget = self.id();
        let event = if emit {
            WidgetEvent::Changed { widget, change }
        } else {
            WidgetEvent::Synced { widget, change }
        };
        self.send(&event);
    }

    // --- Attributes ---

    /// Current value of attribute `name`.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.inner.element.borrow().attributes.get(name).cloned()
    }

    /// Whether attribute `name` is set.
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.inner.element.borrow().attributes.contains_key(name)
    }

    /// Set attribute `name`, emitting `Widget.Changed`.
    pub fn set_attribute(&self, name: &str, value: impl Into<Value>) {
        self.write_attribute(name, value.into(), true);
    }

    /// Set an attribute, reporting it as `Widget.Synced`.
    pub fn set_attribute_silently(&self, name: &str, value: impl Into<Value>) {
        self.write_attribute(name, value.into(), false);
    }

    fn write_attribute(&self, name: &str, value: Value, emit: bool) {
        self.inner
            .element
            .borrow_mut()
            .attributes
            .insert(name.to_owned(), value.clone());
        self.changed(
            WidgetChange::Attribute {
                name: name.to_owned(),
                value: Some(value),
            },
            emit,
        );
    }

    /// Remove attribute `name`, emitting `Widget.Changed` with no value.
    pub fn remove_attribute(&self, name: &str) -> Option<Value> {
        let old = self.inner.element.borrow_mut().attributes.remove(name)?;
        self.changed(
            WidgetChange::Attribute {
                name: name.to_owned(),
                value: None,
            },
            true,
        );
        Some(old)
    }

    // --- Value and content ---

    /// Current element value.
    #[must_use]
    pub fn value(&self) -> Value {
        self.inner.element.borrow().value.clone()
    }

    /// Set the element value, emitting `Widget.Changed`.
    pub fn set_value(&self, value: impl Into<Value>) {
        self.write_value(value.into(), true);
    }

    /// Set the value, reporting it as `Widget.Synced`.
    pub fn set_value_silently(&self, value: impl Into<Value>) {
        self.write_value(value.into(), false);
    }

    fn write_value(&self, value: Value, emit: bool) {
        self.inner.element.borrow_mut().value = value.clone();
        self.changed(WidgetChange::Value(value), emit);
    }

    /// Current inner content.
    #[must_use]
    pub fn content(&self) -> Value {
        self.inner.element.borrow().content.clone()
    }

    /// Replace the inner content. Existing children are discarded.
    pub fn set_content(&self, content: impl Into<Value>) {
        self.write_content(content.into(), true);
    }

    /// Replace the inner content, reporting it as `Widget.Synced`.
    pub fn set_content_silently(&self, content: impl Into<Value>) {
        self.write_content(content.into(), false);
    }

    fn write_content(&self, content: Value, emit: bool) {
        {
            let mut el = self.inner.element.borrow_mut();
            el.children.clear();
            el.content = content.clone();
        }
        self.changed(WidgetChange::Content(content), emit);
    }

    // --- Children ---

    /// Child widgets in order.
    #[must_use]
    pub fn children(&self) -> Vec<Widget> {
        self.inner.element.borrow().children.clone()
    }

    /// Number of children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.inner.element.borrow().children.len()
    }

    /// Whether `child` is a direct child.
    #[must_use]
    pub fn contains(&self, child: &Widget) -> bool {
        self.inner.element.borrow().children.contains(child)
    }

    /// Append `child`. Returns `false` if it is already a child or is `self`.
    pub fn append(&self, child: &Widget) -> bool {
        self.insert_child(child, None)
    }

    /// Insert `child` before all other children.
    pub fn prepend(&self, child: &Widget) -> bool {
        self.insert_child(child, Some(0))
    }

    fn insert_child(&self, child: &Widget, at: Option<usize>) -> bool {
        if child == self {
            return false;
        }
        {
            let mut el = self.inner.element.borrow_mut();
            if el.children.contains(child) {
                return false;
            }
            match at {
                Some(index) => {
                    let index = index.min(el.children.len());
                    el.children.insert(index, child.clone());
                }
                None => el.children.push(child.clone()),
            }
        }
        self.changed(WidgetChange::ChildAdded(child.id()), true);
        true
    }

    /// Detach `child`. Returns `false` if it was not a child.
    pub fn remove_child(&self, child: &Widget) -> bool {
        let removed = {
            let mut el = self.inner.element.borrow_mut();
            let before = el.children.len();
            el.children.retain(|c| c != child);
            el.children.len() != before
        };
        if removed {
            self.changed(WidgetChange::ChildRemoved(child.id()), true);
        }
        removed
    }

    /// Remove every child.
    pub fn clear(&self) {
        let removed = std::mem::take(&mut self.inner.element.borrow_mut().children);
        for child in removed {
            self.changed(WidgetChange::ChildRemoved(child.id()), true);
        }
    }

    /// Swap all children for `replacement` (or none).
    pub fn replace_children(&self, replacement: Option<&Widget>) {
        self.clear();
        if let Some(child) = replacement {
            self.append(child);
        }
    }

    // --- Visibility, enablement, focus ---

    /// Make the widget visible.
    pub fn reveal(&self) {
        self.inner.element.borrow_mut().hidden = false;
    }

    /// Hide the widget. A concealed widget loses focus.
    pub fn conceal(&self) {
        let mut el = self.inner.element.borrow_mut();
        el.hidden = true;
        el.focused = false;
    }

    /// Whether the widget is visible.
    #[must_use]
    pub fn is_revealed(&self) -> bool {
        !self.inner.element.borrow().hidden
    }

    /// Enable or disable the widget (the `disabled` attribute).
    pub fn set_enabled(&self, enabled: bool) {
        if enabled {
            self.remove_attribute(DISABLED_ATTRIBUTE);
        } else if !self.has_attribute(DISABLED_ATTRIBUTE) {
            self.set_attribute(DISABLED_ATTRIBUTE, true);
        }
    }

    /// Whether the `disabled` attribute is absent.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.has_attribute(DISABLED_ATTRIBUTE)
    }

    /// Mark the widget as the one to focus when its container is revealed.
    pub fn set_autofocus(&self, autofocus: bool) {
        self.inner.element.borrow_mut().autofocus = autofocus;
    }

    /// Whether the autofocus marker is set.
    #[must_use]
    pub fn has_autofocus(&self) -> bool {
        self.inner.element.borrow().autofocus
    }

    /// Give the widget focus and broadcast `Widget.Focus`. Concealed widgets
    /// cannot take focus.
    pub fn focus(&self) -> bool {
        {
            let mut el = self.inner.element.borrow_mut();
            if el.hidden {
                return false;
            }
            el.focused = true;
        }
        self.dispatch("focus");
        true
    }

    /// Drop focus, broadcasting `Widget.Blur` if the widget had it.
    pub fn blur(&self) {
        let was_focused = std::mem::replace(&mut self.inner.element.borrow_mut().focused, false);
        if was_focused {
            self.dispatch("blur");
        }
    }

    /// Whether the widget holds focus.
    #[must_use]
    pub fn is_focused(&self) -> bool {
        self.inner.element.borrow().focused
    }
}
