#![forbid(unsafe_code)]

//! Editors, visibility state machines, and navigation views for KUI.

pub mod editable;
pub mod editor;
pub mod panel;
pub mod state_machine;
pub mod view;

pub use editable::{Editable, EditableField, Validatable, Validator};
pub use editor::{Editor, EditorMember, SaveHook};
pub use panel::{Panel, SaveError, SaveFuture};
pub use state_machine::{STATE_MACHINE_MESSAGE, StateMachine, StateMachineEvent};
pub use view::{VIEW_POP, VIEW_PROMOTE, VIEW_PUSH, View, ViewEvent};
