#![forbid(unsafe_code)]

//! Editing capabilities and the single-value [`EditableField`].
//!
//! Editing is split into small capability traits instead of a widget class
//! hierarchy:
//!
//! - [`Validatable`]: reports whether the current input is acceptable.
//! - [`Editable`]: a value with a baseline that can be reverted to or
//!   committed.
//!
//! [`EditableField`] implements both over one widget's value, and
//! [`Editor`](crate::editor::Editor) implements both over a set of members.
//!
//! # Invariants
//!
//! 1. `is_modified()` is `current != baseline` using structural equality on
//!    [`Value`]: an equal object built separately is not a modification.
//! 2. `Widget.Modified` and `Widget.Validity` are emitted on the field's widget
//!    only when the corresponding state flips, and carry the new state.
//! 3. Writing the baseline (`set_value`, `commit`) clears the modified state.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use kui_core::emitter::HandlerId;
use kui_core::widget::{WIDGET_CHANGED, WIDGET_SYNCED, Widget, WidgetChange, WidgetEvent};
use regex::Regex;
use serde_json::Value;

/// Something whose current input can be checked.
pub trait Validatable {
    fn is_valid(&self) -> bool;
}

/// A value with a revertible baseline.
pub trait Editable: Validatable {
    /// Widget that carries the value and emits state messages.
    fn widget(&self) -> Widget;

    fn value(&self) -> Value;

    /// Replace both the value and the baseline.
    fn set_value(&self, value: Value);

    fn is_modified(&self) -> bool;

    /// Restore the baseline.
    fn revert(&self);

    /// Make the current value the new baseline.
    fn commit(&self);
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// A rule a field value must satisfy.
///
/// Lengths count characters for strings and entries for arrays and objects.
#[derive(Debug, Clone)]
pub enum Validator {
    /// Not null, not blank, not an empty collection.
    Required,
    MinLength(usize),
    MaxLength(usize),
    /// The text form must match the expression.
    Pattern(Regex),
}

impl Validator {
    /// Compile a [`Validator::Pattern`].
    pub fn pattern(expr: &str) -> Result<Self, regex::Error> {
        Ok(Self::Pattern(Regex::new(expr)?))
    }

    /// Whether `value` satisfies the rule.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Required => match value {
                Value::Null => false,
                Value::String(s) => !s.trim().is_empty(),
                Value::Array(items) => !items.is_empty(),
                Value::Object(entries) => !entries.is_empty(),
                Value::Bool(_) | Value::Number(_) => true,
            },
            Self::MinLength(min) => value_len(value) >= *min,
            Self::MaxLength(max) => value_len(value) <= *max,
            Self::Pattern(re) => match value {
                Value::Null => re.is_match(""),
                Value::String(s) => re.is_match(s),
                Value::Bool(_) | Value::Number(_) => re.is_match(&value.to_string()),
                Value::Array(_) | Value::Object(_) => false,
            },
        }
    }
}

fn value_len(value: &Value) -> usize {
    match value {
        Value::Null => 0,
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(entries) => entries.len(),
        Value::Bool(_) | Value::Number(_) => value.to_string().chars().count(),
    }
}

// ---------------------------------------------------------------------------
// EditableField
// ---------------------------------------------------------------------------

struct FieldInner {
    widget: Widget,
    baseline: RefCell<Value>,
    validators: RefCell<Vec<Validator>>,
    reported_modified: Cell<bool>,
    reported_valid: Cell<bool>,
    listeners: Cell<Option<(HandlerId, HandlerId)>>,
}

impl Drop for FieldInner {
    fn drop(&mut self) {
        if let Some((changed, synced)) = self.listeners.take() {
            self.widget.off(WIDGET_CHANGED, changed);
            self.widget.off(WIDGET_SYNCED, synced);
        }
    }
}

/// An editable scalar backed by a widget's value.
///
/// Any value write on the widget re-checks the modified and validity state,
/// whether it is user input (`Widget.Changed`) or a bound data source
/// (`Widget.Synced`).
///
/// ```
/// use kui_core::Widget;
/// use kui_widgets::editable::{Editable, EditableField, Validatable, Validator};
/// use serde_json::json;
///
/// let field = EditableField::new(Widget::new("input")).with_validator(Validator::Required);
/// field.set_value(json!("Ada"));
/// assert!(!field.is_modified());
///
/// field.input("");
/// assert!(field.is_modified());
/// assert!(!field.is_valid());
///
/// field.revert();
/// assert_eq!(field.value(), json!("Ada"));
/// ```
#[derive(Clone)]
pub struct EditableField {
    inner: Rc<FieldInner>,
}

impl fmt::Debug for EditableField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditableField")
            .field("widget", &self.inner.widget.id())
            .field("baseline", &*self.inner.baseline.borrow())
            .field("modified", &self.inner.reported_modified.get())
            .field("valid", &self.inner.reported_valid.get())
            .finish()
    }
}

impl PartialEq for EditableField {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl EditableField {
    /// Wrap `widget`, taking its current value as the baseline.
    #[must_use]
    pub fn new(widget: Widget) -> Self {
        let baseline = widget.value();
        let inner = Rc::new(FieldInner {
            widget,
            baseline: RefCell::new(baseline),
            validators: RefCell::new(Vec::new()),
            reported_modified: Cell::new(false),
            reported_valid: Cell::new(true),
            listeners: Cell::new(None),
        });

        let weak: Weak<FieldInner> = Rc::downgrade(&inner);
        let handler = move |ev: &WidgetEvent| {
            if let WidgetEvent::Changed { change, .. } | WidgetEvent::Synced { change, .. } = ev
                && matches!(change, WidgetChange::Value(_))
                && let Some(inner) = weak.upgrade()
            {
                EditableField { inner }.refresh();
            }
        };
        let changed = inner.widget.on(WIDGET_CHANGED, handler.clone());
        let synced = inner.widget.on(WIDGET_SYNCED, handler);
        inner.listeners.set(Some((changed, synced)));

        Self { inner }
    }

    /// Add a validation rule.
    #[must_use]
    pub fn with_validator(self, validator: Validator) -> Self {
        self.add_validator(validator);
        self
    }

    /// Add a validation rule to a live field.
    pub fn add_validator(&self, validator: Validator) {
        self.inner.validators.borrow_mut().push(validator);
        self.refresh();
    }

    /// Record user input: update the widget value and re-check state.
    pub fn input(&self, value: impl Into<Value>) {
        self.inner.widget.set_value(value);
        self.refresh();
    }

    /// Value the field reverts to.
    #[must_use]
    pub fn baseline(&self) -> Value {
        self.inner.baseline.borrow().clone()
    }

    fn refresh(&self) {
        let modified = self.is_modified();
        let valid = self.is_valid();
        let widget = &self.inner.widget;

        if self.inner.reported_modified.replace(modified) != modified {
            tracing::trace!(widget = %widget.id(), modified, "field modified state");
            widget.send(&WidgetEvent::Modified {
                widget: widget.id(),
                modified,
            });
        }
        if self.inner.reported_valid.replace(valid) != valid {
            tracing::trace!(widget = %widget.id(), valid, "field validity");
            widget.send(&WidgetEvent::Validity {
                widget: widget.id(),
                valid,
            });
        }
    }
}

impl Validatable for EditableField {
    fn is_valid(&self) -> bool {
        let value = self.inner.widget.value();
        self.inner
            .validators
            .borrow()
            .iter()
            .all(|v| v.accepts(&value))
    }
}

impl Editable for EditableField {
    fn widget(&self) -> Widget {
        self.inner.widget.clone()
    }

    fn value(&self) -> Value {
        self.inner.widget.value()
    }

    fn set_value(&self, value: Value) {
        *self.inner.baseline.borrow_mut() = value.clone();
        self.inner.widget.set_value(value);
        self.refresh();
    }

    fn is_modified(&self) -> bool {
        self.inner.widget.value() != *self.inner.baseline.borrow()
    }

    fn revert(&self) {
        let baseline = self.baseline();
        self.inner.widget.set_value(baseline);
        self.refresh();
    }

    fn commit(&self) {
        *self.inner.baseline.borrow_mut() = self.inner.widget.value();
        self.refresh();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kui_core::testing::Recorder;
    use kui_core::widget::{WIDGET_MODIFIED, WIDGET_VALIDITY};
    use serde_json::json;

    fn field() -> EditableField {
        EditableField::new(Widget::new("input"))
    }

    #[test]
    fn baseline_is_initial_widget_value() {
        let w = Widget::new("input");
        w.set_value("seed");
        let f = EditableField::new(w);
        assert_eq!(f.baseline(), json!("seed"));
        assert!(!f.is_modified());
    }

    #[test]
    fn input_marks_modified_once() {
        let f = field();
        let rec = Recorder::<WidgetEvent>::new();
        f.widget().on(WIDGET_MODIFIED, rec.handler());

        f.input("a");
        f.input("ab");
        assert!(f.is_modified());
        assert_eq!(rec.len(), 1);
        assert_eq!(
            rec.last(),
            Some(WidgetEvent::Modified {
                widget: f.widget().id(),
                modified: true
            })
        );

        f.input(Value::Null);
        assert!(!f.is_modified());
        assert_eq!(rec.len(), 2);
    }

    #[test]
    fn input_emits_changed() {
        let f = field();
        let rec = Recorder::<WidgetEvent>::new();
        f.widget().on(WIDGET_CHANGED, rec.handler());
        f.input("x");
        assert_eq!(rec.len(), 1);
    }

    #[test]
    fn validity_message_carries_actual_state() {
        let f = field().with_validator(Validator::MinLength(3));
        let rec = Recorder::<WidgetEvent>::new();
        f.widget().on(WIDGET_VALIDITY, rec.handler());

        f.input("abc");
        f.input("ab");
        f.input("abcd");
        let valid: Vec<bool> = rec
            .messages()
            .into_iter()
            .filter_map(|m| match m {
                WidgetEvent::Validity { valid, .. } => Some(valid),
                _ => None,
            })
            .collect();
        // Initial Null fails MinLength(3): the first flip is to valid.
        assert_eq!(valid, vec![true, false, true]);
    }

    #[test]
    fn set_value_resets_baseline() {
        let f = field();
        f.input("draft");
        f.set_value(json!("saved"));
        assert!(!f.is_modified());
        assert_eq!(f.value(), json!("saved"));
        assert_eq!(f.baseline(), json!("saved"));
    }

    #[test]
    fn revert_and_commit() {
        let f = field();
        f.set_value(json!("one"));
        f.input("two");
        f.revert();
        assert_eq!(f.value(), json!("one"));
        assert!(!f.is_modified());

        f.input("three");
        f.commit();
        assert!(!f.is_modified());
        assert_eq!(f.baseline(), json!("three"));
    }

    #[test]
    fn structural_equality_for_objects() {
        let f = field();
        f.set_value(json!({ "address": { "city": "Oslo", "zip": ["0150"] } }));

        f.input(json!({ "address": { "city": "Oslo", "zip": ["0150"] } }));
        assert!(!f.is_modified(), "equal but distinct value");

        f.input(json!({ "address": { "city": "Bergen", "zip": ["0150"] } }));
        assert!(f.is_modified());

        f.revert();
        assert_eq!(
            f.value(),
            json!({ "address": { "city": "Oslo", "zip": ["0150"] } })
        );
        assert!(!f.is_modified());
    }

    #[test]
    fn widget_changes_outside_input_are_tracked() {
        let f = field();
        let rec = Recorder::<WidgetEvent>::new();
        f.widget().on(WIDGET_MODIFIED, rec.handler());
        f.widget().set_value("typed directly");
        assert!(f.is_modified());
        assert_eq!(rec.len(), 1);
    }

    #[test]
    fn silent_value_writes_are_tracked() {
        let f = field().with_validator(Validator::MaxLength(3));
        let rec = Recorder::<WidgetEvent>::new();
        f.widget().on(WIDGET_MODIFIED, rec.handler());
        f.widget().on(WIDGET_VALIDITY, rec.handler());

        f.widget().set_value_silently("pushed from data");
        assert!(f.is_modified());
        assert_eq!(
            rec.messages(),
            vec![
                WidgetEvent::Modified {
                    widget: f.widget().id(),
                    modified: true
                },
                WidgetEvent::Validity {
                    widget: f.widget().id(),
                    valid: false
                },
            ]
        );
    }

    #[test]
    fn dropping_field_releases_listeners() {
        let w = Widget::new("input");
        let before = w.handler_count(WIDGET_CHANGED);
        {
            let _f = EditableField::new(w.clone());
            assert_eq!(w.handler_count(WIDGET_CHANGED), before + 1);
            assert_eq!(w.handler_count(WIDGET_SYNCED), 1);
        }
        assert_eq!(w.handler_count(WIDGET_CHANGED), before);
        assert_eq!(w.handler_count(WIDGET_SYNCED), 0);
    }

    #[test]
    fn validators() {
        assert!(!Validator::Required.accepts(&Value::Null));
        assert!(!Validator::Required.accepts(&json!("  ")));
        assert!(!Validator::Required.accepts(&json!([])));
        assert!(Validator::Required.accepts(&json!(0)));
        assert!(Validator::Required.accepts(&json!("x")));

        assert!(Validator::MinLength(2).accepts(&json!("éé")));
        assert!(!Validator::MinLength(2).accepts(&json!("é")));
        assert!(Validator::MaxLength(2).accepts(&json!([1, 2])));
        assert!(!Validator::MaxLength(2).accepts(&json!([1, 2, 3])));

        let digits = Validator::pattern(r"^\d+$").unwrap();
        assert!(digits.accepts(&json!("123")));
        assert!(digits.accepts(&json!(42)));
        assert!(!digits.accepts(&json!("12a")));
        assert!(!digits.accepts(&Value::Null));
        assert!(!digits.accepts(&json!({ "n": 1 })));

        assert!(Validator::pattern("(").is_err());
    }

    #[test]
    fn all_validators_must_pass() {
        let f = field()
            .with_validator(Validator::Required)
            .with_validator(Validator::MaxLength(3));
        f.input("abc");
        assert!(f.is_valid());
        f.input("abcd");
        assert!(!f.is_valid());
        f.input("");
        assert!(!f.is_valid());
    }
}
