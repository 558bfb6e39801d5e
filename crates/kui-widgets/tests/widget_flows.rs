#![forbid(unsafe_code)]

//! End-to-end flows across active data, bindings, editors, state machines,
//! and views.

use std::cell::RefCell;
use std::rc::Rc;

use futures::FutureExt;
use futures::executor::block_on;
use kui_core::testing::Recorder;
use kui_core::widget::WIDGET_CHANGED;
use kui_core::{ActiveData, ActiveDataEvent, Widget, WidgetEvent};
use kui_runtime::BindingTable;
use kui_widgets::{
    Editable, EditableField, Editor, Panel, SaveError, StateMachine, StateMachineEvent, VIEW_POP,
    Validatable, Validator, View, ViewEvent,
};
use serde_json::json;

struct ContactForm {
    data: ActiveData,
    bindings: BindingTable,
    editor: Editor,
    name: EditableField,
    email: EditableField,
}

fn contact_form() -> ContactForm {
    let data = ActiveData::from_value(json!({ "name": "Ada", "email": "ada@example.com" }));
    let bindings = BindingTable::new();

    let name = EditableField::new(Widget::new("input")).with_validator(Validator::Required);
    let email = EditableField::new(Widget::new("input"))
        .with_validator(Validator::pattern(r"^[^@\s]+@[^@\s]+$").unwrap());
    bindings.bind_value(&name.widget(), &data, "name");
    bindings.bind_value(&email.widget(), &data, "email");
    name.commit();
    email.commit();

    let editor = Editor::new(Widget::new("form"));
    editor.add("name", name.clone());
    editor.add("email", email.clone());

    ContactForm {
        data,
        bindings,
        editor,
        name,
        email,
    }
}

#[test]
fn bound_field_round_trips_without_echo() {
    let form = contact_form();
    let data_events = Recorder::<ActiveDataEvent>::new();
    form.data.on(data_events.handler());
    let widget_events = Recorder::<WidgetEvent>::new();
    form.name.widget().on(WIDGET_CHANGED, widget_events.handler());

    form.name.input("Grace");
    assert_eq!(form.data.get("name"), Some(json!("Grace")));
    assert_eq!(data_events.len(), 1);
    assert_eq!(widget_events.len(), 1);

    form.data.set("email", "grace@example.com");
    assert_eq!(form.email.value(), json!("grace@example.com"));
    assert_eq!(widget_events.len(), 1);
}

#[test]
fn data_updates_reach_editor_and_view() {
    let form = contact_form();
    let mut view = View::new();
    view.push(Rc::new(form.editor.clone()));
    let cancel = view.cancel_ctl().clone();

    form.data.set("name", "Grace");
    assert!(form.name.is_modified());
    assert_eq!(form.editor.modified_count(), 1);
    assert!(Editable::is_modified(&form.editor));
    assert!(view.ctl_bar().contains(&cancel));

    form.data.set("name", "");
    assert_eq!(form.editor.invalid_count(), 1);
    assert!(!view.done_ctl().is_enabled());

    form.data.set("name", "Ada");
    assert_eq!(form.editor.modified_count(), 0);
    assert_eq!(form.editor.invalid_count(), 0);
    assert!(!view.ctl_bar().contains(&cancel));
    assert!(view.done_ctl().is_enabled());
}

#[test]
fn editor_tracks_bound_fields() {
    let form = contact_form();
    assert_eq!(form.editor.value(), json!({ "name": "Ada", "email": "ada@example.com" }));
    assert!(!Editable::is_modified(&form.editor));

    form.email.input("not-an-email");
    assert!(Editable::is_modified(&form.editor));
    assert!(!Validatable::is_valid(&form.editor));

    Editable::revert(&form.editor);
    assert!(Validatable::is_valid(&form.editor));
    assert_eq!(form.data.get("email"), Some(json!("ada@example.com")));
}

#[test]
fn view_controls_follow_editor_state() {
    let form = contact_form();
    let mut view = View::new();
    view.push(Rc::new(form.editor.clone()));

    let done = view.done_ctl().clone();
    let cancel = view.cancel_ctl().clone();
    assert!(done.is_enabled());
    assert!(!view.ctl_bar().contains(&cancel));

    form.name.input("Grace");
    assert!(view.ctl_bar().contains(&cancel));
    assert!(done.is_enabled(), "modified and valid");

    form.name.input("");
    assert!(!done.is_enabled(), "required name is blank");

    assert!(view.cancel());
    assert_eq!(form.name.value(), json!("Ada"));
    assert!(done.is_enabled());
    assert!(!view.ctl_bar().contains(&cancel));
}

#[test]
fn done_saves_editor_value_and_pops() {
    let form = contact_form();
    let saved = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&saved);
    let editor = form.editor.clone().with_save_hook(move |value| {
        *sink.borrow_mut() = Some(value);
        async { Ok(()) }.boxed_local()
    });

    let mut view = View::new();
    let pops = Recorder::<ViewEvent>::new();
    view.on(VIEW_POP, pops.handler());
    view.push(Rc::new(editor.clone()));

    form.name.input("Grace");
    assert_eq!(block_on(view.done()), Ok(true));
    assert_eq!(
        *saved.borrow(),
        Some(json!({ "name": "Grace", "email": "ada@example.com" }))
    );
    assert!(!Panel::is_modified(&editor));
    assert!(view.is_empty());
    assert_eq!(pops.len(), 1);
}

#[test]
fn rejected_save_keeps_editor_on_stack() {
    let form = contact_form();
    let editor = form
        .editor
        .clone()
        .with_save_hook(|_| async { Err(SaveError::Rejected("email taken".into())) }.boxed_local());

    let mut view = View::new();
    view.push(Rc::new(editor.clone()));
    form.email.input("taken@example.com");

    assert_eq!(
        block_on(view.done()),
        Err(SaveError::Rejected("email taken".into()))
    );
    assert_eq!(view.depth(), 1);
    assert!(Panel::is_modified(&editor));
}

#[test]
fn stacked_editors_pop_back_to_parent() {
    let list = Editor::new(Widget::new("form"));
    let detail = contact_form();
    let mut view = View::new();
    let rec = Recorder::<ViewEvent>::new();
    view.on(VIEW_POP, rec.handler());

    view.push(Rc::new(list.clone()));
    view.push(Rc::new(detail.editor.clone()));
    view.pop();

    assert_eq!(view.top().map(|p| p.widget()), Some(list.widget()));
    assert_eq!(
        rec.last(),
        Some(ViewEvent::Pop {
            popped: detail.editor.widget(),
            top: Some(list.widget()),
        })
    );
}

#[test]
fn state_machine_switches_editor_sections() {
    let owner = Widget::new("div");
    let mut sm = StateMachine::new(owner.clone(), ["view", "edit"], ["advanced"]);
    let summary = Widget::new("div");
    let form = contact_form();
    let advanced = Widget::new("fieldset");

    sm.append_child(&summary, "summary", &["view"], &[]);
    sm.append_child(&form.editor.widget(), "form", &["edit"], &[]);
    sm.append_child(&advanced, "advanced", &["edit"], &["advanced"]);
    assert_eq!(owner.child_count(), 3);

    let rec = Recorder::<StateMachineEvent>::new();
    sm.on(rec.handler());

    assert!(summary.is_revealed());
    assert!(!form.editor.widget().is_revealed());

    sm.set_mode("edit");
    assert!(!summary.is_revealed());
    assert!(form.editor.widget().is_revealed());
    assert!(!advanced.is_revealed());

    sm.toggle_flag("advanced");
    assert!(advanced.is_revealed());

    sm.set_mode("archived");
    assert_eq!(sm.mode(), "edit");
    assert_eq!(rec.len(), 2);
}

#[test]
fn dropping_bindings_leaves_editor_working() {
    let form = contact_form();
    let ContactForm {
        data,
        bindings,
        editor,
        name,
        ..
    } = form;
    drop(bindings);

    name.input("Grace");
    assert_eq!(data.get("name"), Some(json!("Ada")));
    assert!(Editable::is_modified(&editor));
}
