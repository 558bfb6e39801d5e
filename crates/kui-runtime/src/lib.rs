#![forbid(unsafe_code)]

//! Runtime layer for KUI.
//!
//! Holds the [`reactive`] binding machinery that keeps [`ActiveData`] and
//! [`Widget`] surfaces in sync.
//!
//! [`ActiveData`]: kui_core::ActiveData
//! [`Widget`]: kui_core::Widget

pub mod reactive;

pub use reactive::{BindingId, BindingInfo, BindingKind, BindingTable, MapTargets};
