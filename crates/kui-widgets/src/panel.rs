#![forbid(unsafe_code)]

//! Panels: the unit a [`View`](crate::view::View) stacks.
//!
//! A panel is anything with a root [`Widget`] that can report whether it is
//! modified and valid, save its edits, and revert them. The view listens to
//! the top panel's `Widget.Modified` and `Widget.Validity` messages, so a
//! panel must emit those on its root widget whenever either state flips.

use std::fmt;

use futures::future::LocalBoxFuture;
use kui_core::Widget;

/// Errors from [`Panel::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveError {
    /// The save hook refused the edits.
    Rejected(String),
    /// The panel holds invalid input.
    Invalid,
}

impl fmt::Display for SaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(reason) => write!(f, "save rejected: {reason}"),
            Self::Invalid => write!(f, "panel contains invalid input"),
        }
    }
}

impl std::error::Error for SaveError {}

/// Future returned by [`Panel::save`].
pub type SaveFuture = LocalBoxFuture<'static, Result<(), SaveError>>;

/// A stackable, editable surface.
pub trait Panel {
    /// Root widget shown while the panel is on top.
    fn widget(&self) -> Widget;

    fn is_modified(&self) -> bool;

    fn is_valid(&self) -> bool;

    /// Whether the panel currently refuses to be closed with Done.
    fn no_close(&self) -> bool {
        false
    }

    /// Transient panels are discarded as soon as another panel covers them.
    fn is_transient(&self) -> bool {
        false
    }

    /// Persist the current edits.
    fn save(&self) -> SaveFuture;

    /// Discard edits since the last save.
    fn revert(&self);
}
