#![forbid(unsafe_code)]

//! Request/reply correlation for queries.
//!
//! A trap is a pending request waiting for a known number of replies. The
//! requester holds a [`TrapFuture`]; whoever answers calls
//! [`TrapTable::push_reply`] with the trap id carried on the message. The
//! future resolves once the expected count of replies has arrived, when the
//! trap is closed early with [`TrapTable::done`], or with
//! [`TrapError::Cancelled`] when the request is aborted.
//!
//! # Invariants
//!
//! 1. A trap resolves at most once; later replies for its id are dropped.
//! 2. Replies are returned in arrival order.
//! 3. Unknown trap ids are ignored by every operation.
//! 4. A trap whose future was dropped is discarded the next time the table
//!    is touched (`create`, `push_reply`, `pending`), whether or not all
//!    replies arrived.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use ahash::AHashMap;
use futures::channel::oneshot;

/// Identifier of a pending trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrapId(u64);

impl TrapId {
    /// Get the raw id value.
    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TrapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trap#{}", self.0)
    }
}

/// Error resolving a trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapError {
    /// The request was aborted before all replies arrived.
    Cancelled,
}

impl fmt::Display for TrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "request was cancelled before it completed"),
        }
    }
}

impl std::error::Error for TrapError {}

type TrapResult<R> = Result<Vec<R>, TrapError>;

struct PendingTrap<R> {
    replies: Vec<R>,
    expected: usize,
    tx: oneshot::Sender<TrapResult<R>>,
}

struct TrapRegistry<R> {
    traps: AHashMap<TrapId, PendingTrap<R>>,
    next_id: u64,
}

impl<R> TrapRegistry<R> {
    /// Drop traps nobody is waiting on any more.
    fn prune(&mut self) {
        let before = self.traps.len();
        self.traps.retain(|_, trap| !trap.tx.is_canceled());
        let dropped = before - self.traps.len();
        if dropped > 0 {
            tracing::trace!(dropped, "abandoned traps discarded");
        }
    }
}

/// Table of pending traps for one context.
///
/// Cloning yields another handle to the same table, so reply handlers can hold
/// their own copy.
pub struct TrapTable<R> {
    inner: Rc<RefCell<TrapRegistry<R>>>,
}

impl<R> Clone for TrapTable<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<R> Default for TrapTable<R> {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(TrapRegistry {
                traps: AHashMap::new(),
                next_id: 1,
            })),
        }
    }
}

impl<R> fmt::Debug for TrapTable<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrapTable")
            .field("pending", &self.inner.borrow().traps.len())
            .finish()
    }
}

impl<R> TrapTable<R> {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new trap.
    pub fn create(&self) -> (TrapId, TrapFuture<R>) {
        let (tx, rx) = oneshot::channel();
        let mut reg = self.inner.borrow_mut();
        reg.prune();
        let id = TrapId(reg.next_id);
        reg.next_id += 1;
        reg.traps.insert(
            id,
            PendingTrap {
                replies: Vec::new(),
                expected: 0,
                tx,
            },
        );
        (id, TrapFuture { id, rx })
    }

    /// Set how many replies complete the trap.
    pub fn set_expected(&self, id: TrapId, expected: usize) {
        if let Some(trap) = self.inner.borrow_mut().traps.get_mut(&id) {
            trap.expected = expected;
        }
    }

    /// Record one reply; resolves the trap when the expected count is reached.
    pub fn push_reply(&self, id: TrapId, reply: R) {
        let finished = {
            let mut reg = self.inner.borrow_mut();
            reg.prune();
            let Some(trap) = reg.traps.get_mut(&id) else {
                tracing::trace!(%id, "reply for unknown trap dropped");
                return;
            };
            trap.replies.push(reply);
            if trap.expected > 0 && trap.replies.len() >= trap.expected {
                reg.traps.remove(&id)
            } else {
                None
            }
        };

        if let Some(trap) = finished {
            let _ = trap.tx.send(Ok(trap.replies));
        }
    }

    /// Resolve the trap with the replies received so far.
    pub fn done(&self, id: TrapId) {
        let trap = self.inner.borrow_mut().traps.remove(&id);
        if let Some(trap) = trap {
            let _ = trap.tx.send(Ok(trap.replies));
        }
    }

    /// Abort the trap; its future resolves with [`TrapError::Cancelled`].
    pub fn cancel(&self, id: TrapId) {
        let trap = self.inner.borrow_mut().traps.remove(&id);
        if let Some(trap) = trap {
            tracing::debug!(%id, "trap cancelled");
            let _ = trap.tx.send(Err(TrapError::Cancelled));
        }
    }

    /// Whether `id` is still waiting for replies.
    #[must_use]
    pub fn is_pending(&self, id: TrapId) -> bool {
        self.inner.borrow().traps.contains_key(&id)
    }

    /// Number of traps still waiting for replies.
    #[must_use]
    pub fn pending(&self) -> usize {
        let mut reg = self.inner.borrow_mut();
        reg.prune();
        reg.traps.len()
    }
}

/// Future side of a trap.
#[must_use = "a trap future does nothing unless awaited"]
pub struct TrapFuture<R> {
    id: TrapId,
    rx: oneshot::Receiver<TrapResult<R>>,
}

impl<R> TrapFuture<R> {
    /// The trap this future waits on.
    pub fn id(&self) -> TrapId {
        self.id
    }
}

impl<R> fmt::Debug for TrapFuture<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrapFuture").field("id", &self.id).finish()
    }
}

impl<R> Future for TrapFuture<R> {
    type Output = TrapResult<R>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // Sender dropped with the table.
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(TrapError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}
