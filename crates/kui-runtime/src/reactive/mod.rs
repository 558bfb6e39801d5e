#![forbid(unsafe_code)]

//! Reactive bindings between active data and widgets.
//!
//! - [`BindingTable`]: per-context registry of two-way bindings.
//! - [`BindingKind`]: which widget surface a binding drives.
//! - [`MapTargets`]: value → child widget table for map bindings.
//!
//! # Architecture
//!
//! There is no process-wide binding state. Each UI context owns a
//! `BindingTable`; two tables never see each other's bindings, and dropping a
//! table detaches everything it attached.
//!
//! # Invariants
//!
//! 1. Active data listeners are notified in registration order, so bindings
//!    on the same object update their widgets in the order they were made.
//! 2. A change originating at a widget is written to the active data once and
//!    is never echoed back into the originating binding.
//! 3. Map bindings are one-way: widget changes never reach the active data.

pub mod binding;

pub use binding::{BindingId, BindingInfo, BindingKind, BindingTable, MapTargets};
