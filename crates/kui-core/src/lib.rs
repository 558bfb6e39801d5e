#![forbid(unsafe_code)]

//! Core types for KUI: emitters, active data, and the widget element model.
//!
//! - [`emitter`]: named-message dispatch shared by every event source.
//! - [`trap`]: request/reply correlation for [`Emitter::query`](emitter::Emitter::query).
//! - [`active_data`]: change-notifying key/value containers.
//! - [`widget`]: the element model widgets, bindings, and views operate on.
//! - [`config`] / [`logging`]: runtime settings and `tracing` setup.
//!
//! All handles are single-threaded (`Rc`-based) and cheap to clone.

pub mod active_data;
pub mod config;
pub mod emitter;
pub mod logging;
#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;
pub mod trap;
pub mod widget;

pub use active_data::{ActiveData, ActiveDataAction, ActiveDataEvent, ActiveDataId};
pub use config::{ConfigError, UiConfig};
pub use emitter::{Emitter, HandlerId, Message};
pub use trap::{TrapError, TrapFuture, TrapId, TrapTable};
pub use widget::{Widget, WidgetChange, WidgetEvent, WidgetId};

/// JSON value carried by active data keys and widget surfaces.
pub use serde_json::Value;
