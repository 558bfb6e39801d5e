#![forbid(unsafe_code)]

//! Visibility state machine.
//!
//! A [`StateMachine`] couples one current mode and a set of named boolean
//! flags to the visibility of a fixed set of child widgets. Output is a pure
//! function of state: a child is revealed iff its mode set contains the
//! current mode and every flag it names is on.
//!
//! # Invariants
//!
//! 1. The mode is always one of the declared modes (or empty when none were
//!    declared).
//! 2. Child names and widgets are unique; declared-but-unknown modes and flags
//!    passed to [`StateMachine::add_child`] are dropped.
//! 3. Every recomputation emits exactly one `StateMachine` message; requests
//!    that change nothing (unknown names, same mode, flag already in the
//!    requested state) emit none.
//! 4. While updates are disabled nothing is recomputed; re-enabling
//!    recomputes once.
//!
//! # Autofocus
//!
//! After a recomputation, the first revealed child marked with
//! [`Widget::set_autofocus`] is scheduled for focus after
//! [`UiConfig::autofocus_delay`]. The host applies it with
//! [`StateMachine::poll_focus`] from its event loop (or immediately with
//! [`StateMachine::flush_focus`]).

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use kui_core::config::UiConfig;
use kui_core::emitter::{Emitter, HandlerId, Message};
use kui_core::widget::Widget;
use web_time::Instant;

/// Name of the message emitted after each recomputation.
pub const STATE_MACHINE_MESSAGE: &str = "StateMachine";

/// Snapshot of a machine's state after a recomputation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateMachineEvent {
    pub mode: String,
    pub flags: BTreeMap<String, bool>,
}

impl Message for StateMachineEvent {
    fn name(&self) -> &str {
        STATE_MACHINE_MESSAGE
    }
}

#[derive(Debug)]
struct Child {
    name: String,
    widget: Widget,
    modes: BTreeSet<String>,
    flags: BTreeSet<String>,
}

#[derive(Debug)]
struct PendingFocus {
    widget: Widget,
    due: Instant,
}

/// Mode/flag driven visibility controller for an owner widget's children.
#[derive(Debug)]
pub struct StateMachine {
    owner: Widget,
    modes: Vec<String>,
    mode: String,
    flags: BTreeMap<String, bool>,
    children: Vec<Child>,
    updates_enabled: bool,
    autofocus_delay: Duration,
    pending_focus: Option<PendingFocus>,
    emitter: Emitter<StateMachineEvent>,
}

impl StateMachine {
    /// Create a machine over `owner` with the given declared modes and flags.
    ///
    /// The initial mode is the first declared mode; every flag starts off.
    pub fn new<M, F>(owner: Widget, modes: M, flags: F) -> Self
    where
        M: IntoIterator,
        M::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        Self::with_config(owner, modes, flags, &UiConfig::default())
    }

    /// Like [`new`](Self::new), taking the autofocus delay from `config`.
    pub fn with_config<M, F>(owner: Widget, modes: M, flags: F, config: &UiConfig) -> Self
    where
        M: IntoIterator,
        M::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        let mut declared: Vec<String> = Vec::new();
        for mode in modes {
            let mode = mode.into();
            if !declared.contains(&mode) {
                declared.push(mode);
            }
        }
        let mode = declared.first().cloned().unwrap_or_default();

        Self {
            owner,
            modes: declared,
            mode,
            flags: flags.into_iter().map(|f| (f.into(), false)).collect(),
            children: Vec::new(),
            updates_enabled: true,
            autofocus_delay: config.autofocus_delay(),
            pending_focus: None,
            emitter: Emitter::new(),
        }
    }

    #[must_use]
    pub fn owner(&self) -> &Widget {
        &self.owner
    }

    // --- Children ---

    /// Register `widget` under `name` without attaching it to the owner.
    ///
    /// Returns `false` when the trimmed name is empty or taken, or the widget
    /// is already registered.
    pub fn add_child(
        &mut self,
        widget: &Widget,
        name: &str,
        modes: &[&str],
        flags: &[&str],
    ) -> bool {
        let name = name.trim();
        if name.is_empty()
            || self
                .children
                .iter()
                .any(|c| c.name == name || c.widget == *widget)
        {
            return false;
        }

        let modes = modes
            .iter()
            .filter(|m| self.modes.iter().any(|d| d == *m))
            .map(|m| (*m).to_owned())
            .collect();
        let flags = flags
            .iter()
            .filter(|f| self.flags.contains_key(**f))
            .map(|f| (*f).to_owned())
            .collect();

        self.children.push(Child {
            name: name.to_owned(),
            widget: widget.clone(),
            modes,
            flags,
        });
        true
    }

    /// Register `widget`, append it to the owner, and recompute.
    pub fn append_child(
        &mut self,
        widget: &Widget,
        name: &str,
        modes: &[&str],
        flags: &[&str],
    ) -> bool {
        if !self.add_child(widget, name, modes, flags) {
            return false;
        }
        self.owner.append(widget);
        self.update();
        true
    }

    /// Register `widget`, prepend it to the owner, and recompute.
    pub fn prepend_child(
        &mut self,
        widget: &Widget,
        name: &str,
        modes: &[&str],
        flags: &[&str],
    ) -> bool {
        if !self.add_child(widget, name, modes, flags) {
            return false;
        }
        self.owner.prepend(widget);
        self.update();
        true
    }

    /// Unregister `widget`, detach it from the owner, and recompute.
    pub fn remove_child(&mut self, widget: &Widget) -> bool {
        let Some(index) = self.children.iter().position(|c| c.widget == *widget) else {
            return false;
        };
        self.children.remove(index);
        self.owner.remove_child(widget);
        if self
            .pending_focus
            .as_ref()
            .is_some_and(|p| p.widget == *widget)
        {
            self.pending_focus = None;
        }
        self.update();
        true
    }

    /// Registered child named `name`.
    #[must_use]
    pub fn widget(&self, name: &str) -> Option<&Widget> {
        self.children
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.widget)
    }

    /// Name `widget` was registered under.
    #[must_use]
    pub fn child_name(&self, widget: &Widget) -> Option<&str> {
        self.children
            .iter()
            .find(|c| c.widget == *widget)
            .map(|c| c.name.as_str())
    }

    /// Number of registered children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    // --- Mode and flags ---

    #[must_use]
    pub fn mode(&self) -> &str {
        &self.mode
    }

    /// Declared modes in declaration order.
    #[must_use]
    pub fn modes(&self) -> &[String] {
        &self.modes
    }

    /// Switch to `mode`. Unknown or current modes are ignored.
    pub fn set_mode(&mut self, mode: &str) {
        if mode == self.mode || !self.modes.iter().any(|m| m == mode) {
            tracing::trace!(mode, "state machine mode request ignored");
            return;
        }
        tracing::debug!(from = %self.mode, to = mode, "state machine mode");
        self.mode = mode.to_owned();
        self.update();
    }

    /// Current state of `flag`; unknown flags read as off.
    #[must_use]
    pub fn flag(&self, flag: &str) -> bool {
        self.flags.get(flag).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn flags(&self) -> &BTreeMap<String, bool> {
        &self.flags
    }

    pub fn set_flag(&mut self, flag: &str) {
        self.write_flag(flag, Some(true));
    }

    pub fn clear_flag(&mut self, flag: &str) {
        self.write_flag(flag, Some(false));
    }

    pub fn toggle_flag(&mut self, flag: &str) {
        self.write_flag(flag, None);
    }

    /// `Some(v)` sets the flag to `v`; `None` flips it.
    fn write_flag(&mut self, flag: &str, value: Option<bool>) {
        let Some(current) = self.flags.get_mut(flag) else {
            tracing::trace!(flag, "unknown state machine flag ignored");
            return;
        };
        let next = value.unwrap_or(!*current);
        if next == *current {
            return;
        }
        *current = next;
        tracing::debug!(flag, on = next, "state machine flag");
        self.update();
    }

    // --- Recomputation ---

    /// Suspend recomputation until [`enable_updates`](Self::enable_updates).
    pub fn disable_updates(&mut self) {
        self.updates_enabled = false;
    }

    /// Resume recomputation, recomputing once if updates were disabled.
    pub fn enable_updates(&mut self) {
        if !self.updates_enabled {
            self.updates_enabled = true;
            self.update();
        }
    }

    #[must_use]
    pub fn updates_enabled(&self) -> bool {
        self.updates_enabled
    }

    fn is_visible(&self, child: &Child) -> bool {
        child.modes.contains(&self.mode) && child.flags.iter().all(|f| self.flag(f))
    }

    /// Reveal or conceal every child for the current state, schedule
    /// autofocus, and emit a `StateMachine` message.
    pub fn update(&mut self) {
        if !self.updates_enabled {
            return;
        }

        let mut autofocus = None;
        for child in &self.children {
            if self.is_visible(child) {
                child.widget.reveal();
                if autofocus.is_none() && child.widget.has_autofocus() {
                    autofocus = Some(child.widget.clone());
                }
            } else {
                child.widget.conceal();
            }
        }

        let due = Instant::now() + self.autofocus_delay;
        self.pending_focus = autofocus.map(|widget| PendingFocus { widget, due });

        self.emitter.send(&StateMachineEvent {
            mode: self.mode.clone(),
            flags: self.flags.clone(),
        });
    }

    // --- Autofocus ---

    /// Widget waiting to be focused, if any.
    #[must_use]
    pub fn pending_focus(&self) -> Option<&Widget> {
        self.pending_focus.as_ref().map(|p| &p.widget)
    }

    /// Focus the pending widget if its delay has elapsed by `now`.
    ///
    /// Returns the widget that received focus.
    pub fn poll_focus(&mut self, now: Instant) -> Option<Widget> {
        if self.pending_focus.as_ref().is_some_and(|p| p.due <= now) {
            self.flush_focus()
        } else {
            None
        }
    }

    /// Focus the pending widget now, regardless of its delay.
    pub fn flush_focus(&mut self) -> Option<Widget> {
        let pending = self.pending_focus.take()?;
        pending.widget.focus().then_some(pending.widget)
    }

    // --- Messages ---

    /// Observe `StateMachine` messages.
    pub fn on(&self, handler: impl Fn(&StateMachineEvent) + 'static) -> HandlerId {
        self.emitter.on(STATE_MACHINE_MESSAGE, handler)
    }

    pub fn off(&self, id: HandlerId) -> bool {
        self.emitter.off(STATE_MACHINE_MESSAGE, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kui_core::testing::Recorder;

    fn machine() -> (StateMachine, Widget) {
        let sm = StateMachine::new(Widget::new("div"), ["A", "B"], ["x"]);
        let child = Widget::new("div");
        (sm, child)
    }

    #[test]
    fn initial_state() {
        let (sm, _) = machine();
        assert_eq!(sm.mode(), "A");
        assert_eq!(sm.modes(), ["A".to_owned(), "B".to_owned()]);
        assert!(!sm.flag("x"));
        assert!(sm.is_empty());

        let bare = StateMachine::new(
            Widget::new("div"),
            Vec::<String>::new(),
            Vec::<String>::new(),
        );
        assert_eq!(bare.mode(), "");
    }

    #[test]
    fn visibility_follows_mode_and_flags() {
        let (mut sm, child) = machine();
        assert!(sm.append_child(&child, "panel", &["A"], &["x"]));
        assert!(!child.is_revealed(), "x is off");

        sm.set_flag("x");
        assert!(child.is_revealed());

        sm.clear_flag("x");
        assert!(!child.is_revealed());

        sm.set_flag("x");
        sm.set_mode("B");
        assert!(!child.is_revealed(), "B is not among the child's modes");
        sm.set_mode("A");
        assert!(child.is_revealed());
    }

    #[test]
    fn child_without_flags_tracks_mode_only() {
        let (mut sm, child) = machine();
        sm.append_child(&child, "always-in-a", &["A"], &[]);
        assert!(child.is_revealed());
        sm.set_mode("B");
        assert!(!child.is_revealed());
    }

    #[test]
    fn unknown_requests_are_silent_no_ops() {
        let (mut sm, child) = machine();
        sm.append_child(&child, "c", &["A"], &[]);
        let rec = Recorder::<StateMachineEvent>::new();
        sm.on(rec.handler());

        sm.set_mode("nonexistent");
        sm.set_mode("A");
        sm.set_flag("y");
        sm.clear_flag("x");
        sm.toggle_flag("nope");
        assert_eq!(sm.mode(), "A");
        assert!(rec.is_empty());
    }

    #[test]
    fn update_emits_snapshot() {
        let (mut sm, _) = machine();
        let rec = Recorder::<StateMachineEvent>::new();
        sm.on(rec.handler());

        sm.toggle_flag("x");
        sm.set_mode("B");
        let messages = rec.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[1],
            StateMachineEvent {
                mode: "B".into(),
                flags: BTreeMap::from([("x".to_owned(), true)]),
            }
        );
    }

    #[test]
    fn toggle_flips_both_ways() {
        let (mut sm, _) = machine();
        sm.toggle_flag("x");
        assert!(sm.flag("x"));
        sm.toggle_flag("x");
        assert!(!sm.flag("x"));
    }

    #[test]
    fn add_child_filters_and_rejects_duplicates() {
        let (mut sm, child) = machine();
        assert!(sm.add_child(&child, "  main ", &["A", "Z"], &["x", "q"]));
        assert_eq!(sm.widget("main"), Some(&child));
        assert_eq!(sm.child_name(&child), Some("main"));

        assert!(!sm.add_child(&child, "other", &["A"], &[]), "same widget");
        assert!(!sm.add_child(&Widget::new("p"), "main", &["A"], &[]), "same name");
        assert!(!sm.add_child(&Widget::new("p"), "  ", &["A"], &[]), "blank name");
        assert_eq!(sm.len(), 1);

        // add_child neither attaches nor recomputes.
        assert!(sm.owner().children().is_empty());
        sm.update();
        assert!(!child.is_revealed(), "requires x");
    }

    #[test]
    fn prepend_and_remove_child() {
        let (mut sm, first) = machine();
        let second = Widget::new("div");
        sm.append_child(&first, "first", &["A"], &[]);
        sm.prepend_child(&second, "second", &["A"], &[]);
        assert_eq!(sm.owner().children(), vec![second.clone(), first.clone()]);

        assert!(sm.remove_child(&second));
        assert!(!sm.remove_child(&second));
        assert_eq!(sm.owner().children(), vec![first]);
        assert!(sm.widget("second").is_none());
    }

    #[test]
    fn batched_updates_recompute_once() {
        let (mut sm, child) = machine();
        sm.add_child(&child, "c", &["B"], &["x"]);
        let rec = Recorder::<StateMachineEvent>::new();
        sm.on(rec.handler());

        sm.disable_updates();
        sm.set_mode("B");
        sm.set_flag("x");
        assert!(rec.is_empty());

        sm.enable_updates();
        assert_eq!(rec.len(), 1);
        assert!(child.is_revealed());

        sm.enable_updates();
        assert_eq!(rec.len(), 1, "already enabled");
    }

    #[test]
    fn autofocus_waits_for_delay() {
        let config = UiConfig {
            autofocus_delay_ms: 50,
            ..UiConfig::default()
        };
        let mut sm = StateMachine::with_config(
            Widget::new("div"),
            ["edit", "view"],
            Vec::<String>::new(),
            &config,
        );
        let label = Widget::new("span");
        let input = Widget::new("input");
        input.set_autofocus(true);
        sm.append_child(&label, "label", &["edit", "view"], &[]);
        sm.append_child(&input, "input", &["edit"], &[]);

        assert_eq!(sm.pending_focus(), Some(&input));
        assert!(sm.poll_focus(Instant::now()).is_none());
        assert!(!input.is_focused());

        let later = Instant::now() + Duration::from_millis(60);
        assert_eq!(sm.poll_focus(later), Some(input.clone()));
        assert!(input.is_focused());
        assert!(sm.pending_focus().is_none());
    }

    #[test]
    fn concealed_autofocus_is_not_scheduled() {
        let (mut sm, child) = machine();
        child.set_autofocus(true);
        sm.append_child(&child, "c", &["B"], &[]);
        assert!(sm.pending_focus().is_none());

        sm.set_mode("B");
        assert_eq!(sm.flush_focus(), Some(child.clone()));
        assert!(child.is_focused());

        sm.set_mode("A");
        assert!(!child.is_focused(), "concealing drops focus");
    }
}
