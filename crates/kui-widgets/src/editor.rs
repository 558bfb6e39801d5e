#![forbid(unsafe_code)]

//! Aggregate editing over named members.
//!
//! An [`Editor`] owns a set of named [`EditorMember`]s (fields or nested
//! editors) and presents them as one [`Editable`] whose value is an object
//! keyed by member name. It listens to each member's `Widget.Modified` and
//! `Widget.Validity` messages and keeps two counters:
//!
//! - `modified`: members currently modified;
//! - `invalid`: members currently invalid.
//!
//! The editor emits its own `Widget.Modified` when `modified` moves between 0
//! and 1, and `Widget.Validity` when `invalid` does, so editors nest: a parent
//! editor sees a child editor exactly like a field.
//!
//! # Invariants
//!
//! 1. Counters equal the number of members whose last observed state is
//!    modified (resp. invalid). Member state is re-read on every message, so a
//!    duplicated or out-of-order message cannot skew a counter.
//! 2. `is_modified()` is `modified > 0`; `is_valid()` is `invalid == 0`.
//! 3. Member names are trimmed, non-empty, and unique.
//!
//! # Failure Modes
//!
//! - While ignoring ([`Editor::ignore`]) member messages are not observed;
//!   [`Editor::listen`] re-reads every member before resuming.
//! - `save()` on an invalid editor fails with [`SaveError::Invalid`] without
//!   calling the save hook.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use kui_core::emitter::HandlerId;
use kui_core::widget::{WIDGET_MODIFIED, WIDGET_VALIDITY, Widget, WidgetEvent};
use serde_json::{Map, Value};

use crate::editable::{Editable, EditableField, Validatable};
use crate::panel::{Panel, SaveError, SaveFuture};

/// A member of an [`Editor`].
#[derive(Debug, Clone, PartialEq)]
pub enum EditorMember {
    Field(EditableField),
    Editor(Editor),
}

impl From<EditableField> for EditorMember {
    fn from(field: EditableField) -> Self {
        Self::Field(field)
    }
}

impl From<Editor> for EditorMember {
    fn from(editor: Editor) -> Self {
        Self::Editor(editor)
    }
}

impl Validatable for EditorMember {
    fn is_valid(&self) -> bool {
        match self {
            Self::Field(f) => f.is_valid(),
            Self::Editor(e) => Validatable::is_valid(e),
        }
    }
}

impl Editable for EditorMember {
    fn widget(&self) -> Widget {
        match self {
            Self::Field(f) => f.widget(),
            Self::Editor(e) => e.widget(),
        }
    }

    fn value(&self) -> Value {
        match self {
            Self::Field(f) => f.value(),
            Self::Editor(e) => e.value(),
        }
    }

    fn set_value(&self, value: Value) {
        match self {
            Self::Field(f) => f.set_value(value),
            Self::Editor(e) => e.set_value(value),
        }
    }

    fn is_modified(&self) -> bool {
        match self {
            Self::Field(f) => f.is_modified(),
            Self::Editor(e) => Editable::is_modified(e),
        }
    }

    fn revert(&self) {
        match self {
            Self::Field(f) => f.revert(),
            Self::Editor(e) => Editable::revert(e),
        }
    }

    fn commit(&self) {
        match self {
            Self::Field(f) => f.commit(),
            Self::Editor(e) => e.commit(),
        }
    }
}

/// Async hook that persists an editor value.
pub type SaveHook = Rc<dyn Fn(Value) -> LocalBoxFuture<'static, Result<(), SaveError>>>;

struct Slot {
    name: String,
    member: EditorMember,
    modified: bool,
    valid: bool,
    listeners: Option<(HandlerId, HandlerId)>,
}

impl Slot {
    fn detach(&mut self) {
        if let Some((modified, validity)) = self.listeners.take() {
            let widget = self.member.widget();
            widget.off(WIDGET_MODIFIED, modified);
            widget.off(WIDGET_VALIDITY, validity);
        }
    }
}

struct EditorInner {
    widget: Widget,
    slots: RefCell<Vec<Slot>>,
    modified: Cell<usize>,
    invalid: Cell<usize>,
    listening: Cell<bool>,
    no_close: Cell<bool>,
    transient: Cell<bool>,
    save_hook: RefCell<Option<SaveHook>>,
}

impl Drop for EditorInner {
    fn drop(&mut self) {
        for slot in self.slots.get_mut() {
            slot.detach();
        }
    }
}

/// A panel editing a group of named members.
///
/// Cloning yields another handle to the same editor.
#[derive(Clone)]
pub struct Editor {
    inner: Rc<EditorInner>,
}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editor")
            .field("widget", &self.inner.widget.id())
            .field("members", &self.names())
            .field("modified", &self.inner.modified.get())
            .field("invalid", &self.inner.invalid.get())
            .finish()
    }
}

impl PartialEq for Editor {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Editor {
    /// Create an editor rooted at `widget` (typically a `form`).
    #[must_use]
    pub fn new(widget: Widget) -> Self {
        Self {
            inner: Rc::new(EditorInner {
                widget,
                slots: RefCell::new(Vec::new()),
                modified: Cell::new(0),
                invalid: Cell::new(0),
                listening: Cell::new(true),
                no_close: Cell::new(false),
                transient: Cell::new(false),
                save_hook: RefCell::new(None),
            }),
        }
    }

    /// Persist values through `hook` when saved.
    #[must_use]
    pub fn with_save_hook<F>(self, hook: F) -> Self
    where
        F: Fn(Value) -> LocalBoxFuture<'static, Result<(), SaveError>> + 'static,
    {
        *self.inner.save_hook.borrow_mut() = Some(Rc::new(hook));
        self
    }

    /// Root widget; members' widgets are its children.
    #[must_use]
    pub fn widget(&self) -> Widget {
        self.inner.widget.clone()
    }

    /// Add a member and append its widget to the editor widget.
    ///
    /// Returns `false` (and adds nothing) for a blank or taken name, or for a
    /// member that is already present.
    pub fn add(&self, name: &str, member: impl Into<EditorMember>) -> bool {
        let name = name.trim();
        let member = member.into();
        let widget = member.widget();
        if name.is_empty() || widget == self.inner.widget {
            return false;
        }
        {
            let slots = self.inner.slots.borrow();
            if slots
                .iter()
                .any(|s| s.name == name || s.member.widget() == widget)
            {
                return false;
            }
        }

        let listeners = self
            .inner
            .listening
            .get()
            .then(|| self.attach(name, &widget));
        self.inner.slots.borrow_mut().push(Slot {
            name: name.to_owned(),
            member,
            modified: false,
            valid: true,
            listeners,
        });
        self.inner.widget.append(&widget);
        self.sync(name);
        tracing::debug!(editor = %self.inner.widget.id(), member = name, "editor member added");
        true
    }

    /// Remove a member, detaching its widget.
    pub fn remove(&self, name: &str) -> Option<EditorMember> {
        let mut slot = {
            let mut slots = self.inner.slots.borrow_mut();
            let index = slots.iter().position(|s| s.name == name)?;
            slots.remove(index)
        };
        slot.detach();
        self.inner.widget.remove_child(&slot.member.widget());
        self.record(slot.modified, false, slot.valid, true);
        tracing::debug!(editor = %self.inner.widget.id(), member = name, "editor member removed");
        Some(slot.member)
    }

    #[must_use]
    pub fn member(&self, name: &str) -> Option<EditorMember> {
        self.inner
            .slots
            .borrow()
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.member.clone())
    }

    /// Member names in insertion order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.inner
            .slots
            .borrow()
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.slots.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.slots.borrow().is_empty()
    }

    /// Number of modified members.
    #[must_use]
    pub fn modified_count(&self) -> usize {
        self.inner.modified.get()
    }

    /// Number of invalid members.
    #[must_use]
    pub fn invalid_count(&self) -> usize {
        self.inner.invalid.get()
    }

    /// Stop observing member messages.
    pub fn ignore(&self) {
        self.inner.listening.set(false);
        for slot in self.inner.slots.borrow_mut().iter_mut() {
            slot.detach();
        }
    }

    /// Resume observing member messages, re-reading every member first.
    pub fn listen(&self) {
        if self.inner.listening.replace(true) {
            return;
        }
        let pending: Vec<(String, Widget)> = self
            .inner
            .slots
            .borrow()
            .iter()
            .map(|s| (s.name.clone(), s.member.widget()))
            .collect();
        for (name, widget) in &pending {
            let ids = self.attach(name, widget);
            if let Some(slot) = self
                .inner
                .slots
                .borrow_mut()
                .iter_mut()
                .find(|s| s.name == *name)
            {
                slot.listeners = Some(ids);
            }
        }
        self.sync_all();
    }

    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.inner.listening.get()
    }

    /// Refuse (or allow) closing through a view's Done control.
    pub fn set_no_close(&self, no_close: bool) {
        self.inner.no_close.set(no_close);
        self.emit_validity(Validatable::is_valid(self));
    }

    /// Mark the editor as discarded once covered by another panel.
    pub fn set_transient(&self, transient: bool) {
        self.inner.transient.set(transient);
    }

    fn attach(&self, name: &str, widget: &Widget) -> (HandlerId, HandlerId) {
        let weak: Weak<EditorInner> = Rc::downgrade(&self.inner);
        let member = name.to_owned();
        let on_modified = widget.on(WIDGET_MODIFIED, move |_| {
            if let Some(inner) = weak.upgrade() {
                Editor { inner }.sync(&member);
            }
        });

        let weak: Weak<EditorInner> = Rc::downgrade(&self.inner);
        let member = name.to_owned();
        let on_validity = widget.on(WIDGET_VALIDITY, move |_| {
            if let Some(inner) = weak.upgrade() {
                Editor { inner }.sync(&member);
            }
        });

        (on_modified, on_validity)
    }

    /// Re-read one member's state and fold it into the counters.
    fn sync(&self, name: &str) {
        let Some(member) = self.member(name) else {
            return;
        };
        let modified = member.is_modified();
        let valid = member.is_valid();

        let previous = {
            let mut slots = self.inner.slots.borrow_mut();
            let Some(slot) = slots.iter_mut().find(|s| s.name == name) else {
                return;
            };
            let previous = (slot.modified, slot.valid);
            slot.modified = modified;
            slot.valid = valid;
            previous
        };

        self.record(previous.0, modified, previous.1, valid);
    }

    fn sync_all(&self) {
        for name in self.names() {
            self.sync(&name);
        }
    }

    /// Apply one member's state transition to the counters.
    fn record(&self, was_modified: bool, modified: bool, was_valid: bool, valid: bool) {
        if was_modified != modified {
            let count = self.inner.modified.get();
            if modified {
                self.inner.modified.set(count + 1);
                if count == 0 {
                    self.emit_modified(true);
                }
            } else {
                let count = count.saturating_sub(1);
                self.inner.modified.set(count);
                if count == 0 {
                    self.emit_modified(false);
                }
            }
        }

        if was_valid != valid {
            let count = self.inner.invalid.get();
            if valid {
                let count = count.saturating_sub(1);
                self.inner.invalid.set(count);
                if count == 0 {
                    self.emit_validity(true);
                }
            } else {
                self.inner.invalid.set(count + 1);
                if count == 0 {
                    self.emit_validity(false);
                }
            }
        }
    }

    fn emit_modified(&self, modified: bool) {
        let widget = &self.inner.widget;
        tracing::trace!(editor = %widget.id(), modified, "editor modified state");
        widget.send(&WidgetEvent::Modified {
            widget: widget.id(),
            modified,
        });
    }

    fn emit_validity(&self, valid: bool) {
        let widget = &self.inner.widget;
        tracing::trace!(editor = %widget.id(), valid, "editor validity");
        widget.send(&WidgetEvent::Validity {
            widget: widget.id(),
            valid,
        });
    }

    fn members(&self) -> Vec<EditorMember> {
        self.inner
            .slots
            .borrow()
            .iter()
            .map(|s| s.member.clone())
            .collect()
    }
}

impl Validatable for Editor {
    fn is_valid(&self) -> bool {
        self.inner.invalid.get() == 0
    }
}

impl Editable for Editor {
    fn widget(&self) -> Widget {
        self.inner.widget.clone()
    }

    /// Object of member values keyed by member name.
    fn value(&self) -> Value {
        let slots = self.inner.slots.borrow();
        let entries: Map<String, Value> = slots
            .iter()
            .map(|s| (s.name.clone(), s.member.value()))
            .collect();
        Value::Object(entries)
    }

    /// Set members named in an object value; other members and non-object
    /// values are left alone.
    fn set_value(&self, value: Value) {
        let Value::Object(entries) = value else {
            tracing::trace!(editor = %self.inner.widget.id(), "non-object editor value ignored");
            return;
        };
        for (name, value) in entries {
            if let Some(member) = self.member(&name) {
                member.set_value(value);
            }
        }
        self.sync_all();
    }

    fn is_modified(&self) -> bool {
        self.inner.modified.get() > 0
    }

    fn revert(&self) {
        for member in self.members() {
            member.revert();
        }
        self.sync_all();
    }

    fn commit(&self) {
        for member in self.members() {
            member.commit();
        }
        self.sync_all();
    }
}

impl Panel for Editor {
    fn widget(&self) -> Widget {
        self.inner.widget.clone()
    }

    fn is_modified(&self) -> bool {
        Editable::is_modified(self)
    }

    fn is_valid(&self) -> bool {
        Validatable::is_valid(self)
    }

    fn no_close(&self) -> bool {
        self.inner.no_close.get()
    }

    fn is_transient(&self) -> bool {
        self.inner.transient.get()
    }

    /// Run the save hook with the current value, then commit.
    fn save(&self) -> SaveFuture {
        let editor = self.clone();
        async move {
            if !Validatable::is_valid(&editor) {
                return Err(SaveError::Invalid);
            }
            let hook = editor.inner.save_hook.borrow().clone();
            if let Some(hook) = hook {
                hook(Editable::value(&editor)).await?;
            }
            Editable::commit(&editor);
            tracing::debug!(editor = %editor.inner.widget.id(), "editor saved");
            Ok(())
        }
        .boxed_local()
    }

    fn revert(&self) {
        Editable::revert(self);
    }
}
