#![forbid(unsafe_code)]

//! Navigation view: a stack of panels with shared Done/Cancel controls.
//!
//! A [`View`] owns a root widget with two children: a control bar and a stack
//! widget holding the panels' widgets. Only the top panel is revealed. The
//! control bar carries any external controls added with
//! [`View::push_ctl`], followed by Cancel and Done.
//!
//! # Invariants
//!
//! 1. The view listens to `Widget.Modified` and `Widget.Validity` on the top
//!    panel's widget only; the listeners move whenever the top changes.
//! 2. After every stack change or top-panel message, controls satisfy:
//!    Done is present iff the stack is non-empty; Cancel is present iff the
//!    top panel is modified; Done is enabled iff the top panel is valid and
//!    not `no_close`.
//! 3. A transient panel is discarded when another panel is pushed over it or
//!    promoted above it.
//!
//! # Failure Modes
//!
//! - `pop()` on an empty stack returns `None` and emits nothing.
//! - `promote()` of the current top or a non-member returns `false` and emits
//!   nothing.
//! - `done()` leaves the stack untouched when the top panel is invalid,
//!   refuses to close, or fails to save.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use kui_core::Widget;
//! use kui_widgets::editor::Editor;
//! use kui_widgets::view::View;
//!
//! let mut view = View::new();
//! let settings = Rc::new(Editor::new(Widget::new("form")));
//! view.push(settings.clone());
//! assert!(view.done_ctl().is_enabled());
//! assert!(view.pop().is_some());
//! assert!(view.is_empty());
//! ```

use std::fmt;
use std::rc::{Rc, Weak};

use kui_core::config::UiConfig;
use kui_core::emitter::{Emitter, HandlerId, Message};
use kui_core::widget::{WIDGET_MODIFIED, WIDGET_VALIDITY, Widget, WidgetEvent};

use crate::panel::{Panel, SaveError};

pub const VIEW_PUSH: &str = "View.Push";
pub const VIEW_POP: &str = "View.Pop";
pub const VIEW_PROMOTE: &str = "View.Promote";

/// Stack changes reported by a [`View`].
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    Push {
        pushed: Widget,
        prior: Option<Widget>,
    },
    Pop {
        popped: Widget,
        top: Option<Widget>,
    },
    Promote {
        promoted: Widget,
        demoted: Widget,
    },
}

impl Message for ViewEvent {
    fn name(&self) -> &str {
        match self {
            Self::Push { .. } => VIEW_PUSH,
            Self::Pop { .. } => VIEW_POP,
            Self::Promote { .. } => VIEW_PROMOTE,
        }
    }
}

/// Control bar widgets, shared with the top-panel listeners.
#[derive(Clone)]
struct Controls {
    bar: Widget,
    done: Widget,
    cancel: Widget,
}

impl Controls {
    fn adjust(&self, top: Option<&dyn Panel>) {
        let Some(top) = top else {
            self.bar.remove_child(&self.cancel);
            self.bar.remove_child(&self.done);
            return;
        };

        let modified = top.is_modified();
        if modified && !self.bar.contains(&self.cancel) {
            // Cancel sits immediately before Done.
            self.bar.remove_child(&self.done);
            self.bar.append(&self.cancel);
        } else if !modified {
            self.bar.remove_child(&self.cancel);
        }
        if !self.bar.contains(&self.done) {
            self.bar.append(&self.done);
        }

        self.done.set_enabled(top.is_valid() && !top.no_close());
    }
}

struct Listening {
    widget: Widget,
    modified: HandlerId,
    validity: HandlerId,
}

/// Navigation stack of [`Panel`]s.
pub struct View {
    widget: Widget,
    stack: Widget,
    controls: Controls,
    panels: Vec<Rc<dyn Panel>>,
    listening: Option<Listening>,
    emitter: Emitter<ViewEvent>,
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("widget", &self.widget.id())
            .field("depth", &self.panels.len())
            .finish()
    }
}

impl Default for View {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for View {
    fn drop(&mut self) {
        self.ignore();
    }
}

impl View {
    /// Create an empty view with default labels.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&UiConfig::default())
    }

    /// Create an empty view labelling its controls from `config`.
    #[must_use]
    pub fn with_config(config: &UiConfig) -> Self {
        let widget = Widget::new("div");
        let bar = Widget::new("nav");
        let stack = Widget::new("div");
        widget.append(&bar);
        widget.append(&stack);

        let done = Widget::new("button");
        done.set_content(config.done_label.as_str());
        let cancel = Widget::new("button");
        cancel.set_content(config.cancel_label.as_str());

        Self {
            widget,
            stack,
            controls: Controls { bar, done, cancel },
            panels: Vec::new(),
            listening: None,
            emitter: Emitter::new(),
        }
    }

    // --- Accessors ---

    #[must_use]
    pub fn widget(&self) -> &Widget {
        &self.widget
    }

    /// Control bar widget.
    #[must_use]
    pub fn ctl_bar(&self) -> &Widget {
        &self.controls.bar
    }

    #[must_use]
    pub fn done_ctl(&self) -> &Widget {
        &self.controls.done
    }

    #[must_use]
    pub fn cancel_ctl(&self) -> &Widget {
        &self.controls.cancel
    }

    #[must_use]
    pub fn top(&self) -> Option<&Rc<dyn Panel>> {
        self.panels.last()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.panels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    /// Whether a panel rooted at `widget` is on the stack.
    #[must_use]
    pub fn contains(&self, widget: &Widget) -> bool {
        self.position(widget).is_some()
    }

    fn position(&self, widget: &Widget) -> Option<usize> {
        self.panels.iter().position(|p| p.widget() == *widget)
    }

    // --- Messages ---

    /// Observe `View.Push`, `View.Pop`, or `View.Promote`.
    pub fn on(&self, name: &str, handler: impl Fn(&ViewEvent) + 'static) -> HandlerId {
        self.emitter.on(name, handler)
    }

    pub fn off(&self, name: &str, id: HandlerId) -> bool {
        self.emitter.off(name, id)
    }

    // --- Stack operations ---

    /// Push `panel` on top, covering (or discarding, if transient) the
    /// previous top. Pushing a panel already on the stack promotes it.
    pub fn push(&mut self, panel: Rc<dyn Panel>) {
        let pushed = panel.widget();
        if self.contains(&pushed) {
            self.promote(&pushed);
            return;
        }

        let prior = self.panels.last().cloned();
        if let Some(prior) = &prior {
            self.cover(prior);
        }

        self.stack.append(&pushed);
        pushed.reveal();
        self.panels.push(panel);
        self.listen();
        self.adjust_ctls();

        tracing::debug!(panel = %pushed.id(), depth = self.panels.len(), "view push");
        self.emitter.send(&ViewEvent::Push {
            pushed,
            prior: prior.map(|p| p.widget()),
        });
    }

    /// Remove the top panel, revealing the one beneath.
    pub fn pop(&mut self) -> Option<Rc<dyn Panel>> {
        let popped = self.panels.pop()?;
        let popped_widget = popped.widget();
        self.stack.remove_child(&popped_widget);

        let top = self.panels.last().map(|p| p.widget());
        if let Some(top) = &top {
            top.reveal();
        }
        self.listen();
        self.adjust_ctls();

        tracing::debug!(panel = %popped_widget.id(), depth = self.panels.len(), "view pop");
        self.emitter.send(&ViewEvent::Pop {
            popped: popped_widget,
            top,
        });
        Some(popped)
    }

    /// Move the stacked panel rooted at `widget` to the top.
    ///
    /// Returns `false` when it is already on top or not on the stack.
    pub fn promote(&mut self, widget: &Widget) -> bool {
        let Some(index) = self.position(widget) else {
            return false;
        };
        if index + 1 == self.panels.len() {
            return false;
        }

        let Some(demoted) = self.panels.last().cloned() else {
            return false;
        };
        let promoted = self.panels.remove(index);
        self.cover(&demoted);

        // Keep stack widget order in step with the panel order.
        self.stack.remove_child(widget);
        self.stack.append(widget);
        widget.reveal();
        self.panels.push(promoted);
        self.listen();
        self.adjust_ctls();

        tracing::debug!(panel = %widget.id(), "view promote");
        self.emitter.send(&ViewEvent::Promote {
            promoted: widget.clone(),
            demoted: demoted.widget(),
        });
        true
    }

    /// Conceal the current top before another panel goes above it, dropping
    /// it entirely if it is transient.
    fn cover(&mut self, top: &Rc<dyn Panel>) {
        let widget = top.widget();
        widget.conceal();
        if top.is_transient() {
            self.panels.retain(|p| !Rc::ptr_eq(p, top));
            self.stack.remove_child(&widget);
            tracing::debug!(panel = %widget.id(), "transient panel discarded");
        }
    }

    /// Add an external control to the bar, ahead of Cancel and Done.
    pub fn push_ctl(&mut self, ctl: &Widget) {
        let bar = &self.controls.bar;
        bar.remove_child(&self.controls.cancel);
        bar.remove_child(&self.controls.done);
        bar.append(ctl);
        self.adjust_ctls();
    }

    /// Recompute control presence and enablement from the top panel.
    pub fn adjust_ctls(&self) {
        self.controls.adjust(self.panels.last().map(|p| p.as_ref()));
    }

    fn ignore(&mut self) {
        if let Some(l) = self.listening.take() {
            l.widget.off(WIDGET_MODIFIED, l.modified);
            l.widget.off(WIDGET_VALIDITY, l.validity);
        }
    }

    fn listen(&mut self) {
        self.ignore();
        let Some(top) = self.panels.last() else {
            return;
        };

        let widget = top.widget();
        let handler = {
            let panel: Weak<dyn Panel> = Rc::downgrade(top);
            let controls = self.controls.clone();
            move |_: &WidgetEvent| {
                if let Some(panel) = panel.upgrade() {
                    controls.adjust(Some(panel.as_ref()));
                }
            }
        };
        let modified = widget.on(WIDGET_MODIFIED, handler.clone());
        let validity = widget.on(WIDGET_VALIDITY, handler);
        self.listening = Some(Listening {
            widget,
            modified,
            validity,
        });
    }

    // --- Controls ---

    /// Close the top panel, saving it first if it is modified.
    ///
    /// Returns `Ok(true)` when a panel was popped, `Ok(false)` when the stack
    /// is empty or the panel refuses to close.
    pub async fn done(&mut self) -> Result<bool, SaveError> {
        let Some(top) = self.panels.last().cloned() else {
            return Ok(false);
        };
        if !top.is_valid() {
            return Err(SaveError::Invalid);
        }
        if top.no_close() {
            return Ok(false);
        }
        if top.is_modified()
            && let Err(err) = top.save().await
        {
            tracing::debug!(panel = %top.widget().id(), error = %err, "view save failed");
            self.adjust_ctls();
            return Err(err);
        }
        self.pop();
        Ok(true)
    }

    /// Revert the top panel if it is modified. Does not pop.
    pub fn cancel(&mut self) -> bool {
        let Some(top) = self.panels.last().cloned() else {
            return false;
        };
        if !top.is_modified() {
            return false;
        }
        top.revert();
        self.adjust_ctls();
        true
    }
}
