#![no_main]

//! Random bind/unbind/mutate sequences over a small pool of widgets and
//! active data objects. Checks listener reference counts and value sync.

use arbitrary::Arbitrary;
use kui_core::widget::WIDGET_CHANGED;
use kui_core::{ActiveData, Widget};
use kui_runtime::{BindingKind, BindingTable};
use libfuzzer_sys::fuzz_target;

const KEYS: [&str; 3] = ["a", "b", ""];

#[derive(Debug, Arbitrary)]
enum Op {
    BindValue { widget: u8, data: u8, key: u8 },
    BindAttribute { widget: u8, data: u8, key: u8 },
    Unbind { index: u8 },
    UnbindWidget { widget: u8 },
    UnbindData { data: u8 },
    SetData { data: u8, key: u8, value: i32 },
    SetWidget { widget: u8, value: i32 },
    RemoveKey { data: u8, key: u8 },
}

fuzz_target!(|ops: Vec<Op>| {
    let table = BindingTable::new();
    let widgets: Vec<Widget> = (0..4).map(|_| Widget::new("input")).collect();
    let data: Vec<ActiveData> = (0..3).map(|_| ActiveData::new()).collect();
    let mut ids = Vec::new();

    let w = |i: u8| &widgets[usize::from(i) % widgets.len()];
    let d = |i: u8| &data[usize::from(i) % data.len()];
    let k = |i: u8| KEYS[usize::from(i) % KEYS.len()];

    for op in ops.into_iter().take(256) {
        match op {
            Op::BindValue { widget, data, key } => {
                ids.push(table.bind(w(widget), d(data), k(key), BindingKind::Value));
            }
            Op::BindAttribute { widget, data, key } => {
                let kind = BindingKind::Attribute("title".into());
                ids.push(table.bind(w(widget), d(data), k(key), kind));
            }
            Op::Unbind { index } => {
                if !ids.is_empty() {
                    let id = ids.swap_remove(usize::from(index) % ids.len());
                    table.unbind(id);
                }
            }
            Op::UnbindWidget { widget } => {
                table.unbind_widget(w(widget));
            }
            Op::UnbindData { data } => {
                table.unbind_active_data(d(data));
            }
            Op::SetData { data, key, value } => {
                let key = k(key);
                if !key.is_empty() {
                    d(data).set(key, value);
                }
            }
            Op::SetWidget { widget, value } => w(widget).set_value(value),
            Op::RemoveKey { data, key } => {
                d(data).remove(k(key));
            }
        }

        for widget in &widgets {
            let bound = table.bindings_for_widget(widget) > 0;
            assert_eq!(widget.handler_count(WIDGET_CHANGED), usize::from(bound));
        }
        for item in &data {
            let bound = table.bindings_for_active_data(item) > 0;
            assert_eq!(item.listener_count(), usize::from(bound));
        }
    }

    drop(table);
    assert!(widgets.iter().all(|w| w.handler_count(WIDGET_CHANGED) == 0));
    assert!(data.iter().all(|d| d.listener_count() == 0));
});
