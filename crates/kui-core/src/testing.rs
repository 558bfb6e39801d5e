#![forbid(unsafe_code)]

//! Test helpers for observing emitted messages.

use std::cell::RefCell;
use std::rc::Rc;

/// Collects every message delivered to the handlers it hands out.
///
/// ```ignore
/// use kui_core::testing::Recorder;
/// use kui_core::widget::{Widget, WIDGET_CHANGED};
///
/// let widget = Widget::new("input");
/// let recorder = Recorder::new();
/// widget.on(WIDGET_CHANGED, recorder.handler());
/// widget.set_value("x");
/// assert_eq!(recorder.len(), 1);
/// ```
pub struct Recorder<M> {
    log: Rc<RefCell<Vec<M>>>,
}

impl<M> Clone for Recorder<M> {
    fn clone(&self) -> Self {
        Self {
            log: Rc::clone(&self.log),
        }
    }
}

impl<M> Default for Recorder<M> {
    fn default() -> Self {
        Self {
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl<M: Clone + 'static> Recorder<M> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A handler that appends each message to this recorder.
    pub fn handler(&self) -> impl Fn(&M) + 'static {
        let log = Rc::clone(&self.log);
        move |m: &M| log.borrow_mut().push(m.clone())
    }

    #[must_use]
    pub fn messages(&self) -> Vec<M> {
        self.log.borrow().clone()
    }

    #[must_use]
    pub fn last(&self) -> Option<M> {
        self.log.borrow().last().cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.log.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }
}
