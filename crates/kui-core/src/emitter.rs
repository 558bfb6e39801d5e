#![forbid(unsafe_code)]

//! Named-message emitter shared by widgets, active data, and views.
//!
//! An [`Emitter<M>`] keeps, per message name, an ordered list of handlers.
//! [`send`](Emitter::send) delivers a message to the handlers registered under
//! [`Message::name`] in registration order.
//!
//! # Invariants
//!
//! 1. Handlers are called in registration order.
//! 2. A `once` handler is delivered at most one message, even when a handler
//!    re-enters `send` on the same emitter.
//! 3. A handler removed with [`off`](Emitter::off) while a message is being
//!    delivered is not called for the remainder of that delivery.
//! 4. Handlers registered during a delivery only see later messages.
//! 5. No internal borrow is held while a handler runs, so handlers may call
//!    `send`, `on`, or `off` on the same emitter.
//!
//! # Failure Modes
//!
//! - `off()` with an unknown id is a no-op.
//! - `send()` on a silenced emitter drops the message.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::trap::{TrapFuture, TrapId, TrapTable};

/// A message that can be dispatched through an [`Emitter`].
pub trait Message {
    /// Dispatch name, e.g. `"Widget.Changed"`.
    fn name(&self) -> &str;

    /// Trap id stamped on this message by [`Emitter::query`], if any.
    fn trap(&self) -> Option<TrapId> {
        None
    }

    /// Stamp a trap id on this message. Messages that never take part in
    /// queries may ignore it.
    fn set_trap(&mut self, _trap: TrapId) {}
}

/// Identifier of a registered handler, unique per emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl HandlerId {
    /// Get the raw id value.
    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

type Handler<M> = Rc<dyn Fn(&M)>;
type Filter<M> = Rc<dyn Fn(&M) -> bool>;

struct Thunk<M> {
    id: HandlerId,
    once: bool,
    filter: Option<Filter<M>>,
    func: Handler<M>,
}

impl<M> Clone for Thunk<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            once: self.once,
            filter: self.filter.clone(),
            func: Rc::clone(&self.func),
        }
    }
}

struct Registry<M> {
    handlers: AHashMap<String, Vec<Thunk<M>>>,
    next_id: u64,
    silent: bool,
}

impl<M> Registry<M> {
    fn contains(&self, name: &str, id: HandlerId) -> bool {
        self.handlers
            .get(name)
            .is_some_and(|list| list.iter().any(|t| t.id == id))
    }

    fn remove(&mut self, name: &str, id: HandlerId) -> bool {
        let Some(list) = self.handlers.get_mut(name) else {
            return false;
        };
        let before = list.len();
        list.retain(|t| t.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.handlers.remove(name);
        }
        removed
    }
}

/// Shared, single-threaded message emitter.
///
/// Cloning an `Emitter` yields another handle to the same handler registry.
pub struct Emitter<M> {
    inner: Rc<RefCell<Registry<M>>>,
}

impl<M> Clone for Emitter<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<M> Default for Emitter<M> {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Registry {
                handlers: AHashMap::new(),
                next_id: 1,
                silent: false,
            })),
        }
    }
}

impl<M> fmt::Debug for Emitter<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reg = self.inner.borrow();
        let mut names: Vec<&str> = reg.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Emitter")
            .field("messages", &names)
            .field("silent", &reg.silent)
            .finish()
    }
}

impl<M: Message + 'static> Emitter<M> {
    /// Create an emitter with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn register(
        &self,
        name: &str,
        once: bool,
        filter: Option<Filter<M>>,
        func: Handler<M>,
    ) -> HandlerId {
        let mut reg = self.inner.borrow_mut();
        let id = HandlerId(reg.next_id);
        reg.next_id += 1;
        reg.handlers
            .entry(name.to_owned())
            .or_default()
            .push(Thunk {
                id,
                once,
                filter,
                func,
            });
        id
    }

    /// Register a handler for messages named `name`.
    pub fn on(&self, name: &str, handler: impl Fn(&M) + 'static) -> HandlerId {
        self.register(name, false, None, Rc::new(handler))
    }

    /// Register a handler that only sees messages accepted by `filter`.
    pub fn on_filtered(
        &self,
        name: &str,
        filter: impl Fn(&M) -> bool + 'static,
        handler: impl Fn(&M) + 'static,
    ) -> HandlerId {
        self.register(name, false, Some(Rc::new(filter)), Rc::new(handler))
    }

    /// Register a handler that is removed after its first delivery.
    pub fn once(&self, name: &str, handler: impl Fn(&M) + 'static) -> HandlerId {
        self.register(name, true, None, Rc::new(handler))
    }

    /// Remove one handler. Returns whether it was registered.
    pub fn off(&self, name: &str, id: HandlerId) -> bool {
        self.inner.borrow_mut().remove(name, id)
    }

    /// Remove every handler registered for `name`.
    pub fn off_all(&self, name: &str) {
        self.inner.borrow_mut().handlers.remove(name);
    }

    /// Whether any handler is registered for `name`.
    #[must_use]
    pub fn handles(&self, name: &str) -> bool {
        self.inner.borrow().handlers.contains_key(name)
    }

    /// Number of handlers registered for `name`.
    #[must_use]
    pub fn handler_count(&self, name: &str) -> usize {
        self.inner.borrow().handlers.get(name).map_or(0, Vec::len)
    }

    /// Drop all messages until [`resume`](Self::resume) is called.
    pub fn silence(&self) {
        self.inner.borrow_mut().silent = true;
    }

    /// Resume delivery after [`silence`](Self::silence).
    pub fn resume(&self) {
        self.inner.borrow_mut().silent = false;
    }

    /// Whether the emitter is currently dropping messages.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.inner.borrow().silent
    }

    /// Deliver `message` to the handlers registered under its name.
    pub fn send(&self, message: &M) {
        let name = message.name();
        let thunks: Vec<Thunk<M>> = {
            let reg = self.inner.borrow();
            if reg.silent {
                return;
            }
            match reg.handlers.get(name) {
                Some(list) => list.clone(),
                None => return,
            }
        };

        tracing::trace!(message = name, handlers = thunks.len(), "emitter send");

        for thunk in thunks {
            if let Some(filter) = &thunk.filter
                && !filter(message)
            {
                continue;
            }

            {
                let mut reg = self.inner.borrow_mut();
                if thunk.once {
                    // A re-entrant send may already have consumed it.
                    if !reg.remove(name, thunk.id) {
                        continue;
                    }
                } else if !reg.contains(name, thunk.id) {
                    continue;
                }
            }

            (thunk.func)(message);
        }
    }

    /// Send `message` as a query whose replies are collected by `traps`.
    ///
    /// The expected reply count is the number of handlers registered for the
    /// message name at the time of the call, including filtered handlers that
    /// skip the message. When a filter can reject a query, close the trap with
    /// [`TrapTable::done`] or drop the future to release it. With no handlers
    /// (or a silenced emitter) the returned future resolves immediately with
    /// no replies.
    pub fn query<R: 'static>(&self, mut message: M, traps: &TrapTable<R>) -> TrapFuture<R> {
        let (id, future) = traps.create();
        message.set_trap(id);

        let expected = self.handler_count(message.name());
        if expected == 0 || self.is_silent() {
            traps.done(id);
            return future;
        }

        traps.set_expected(id, expected);
        self.send(&message);
        future
    }
}
