#![no_main]

//! Random mode/flag sequences; every child's visibility must match the
//! reveal rule after each step.

use arbitrary::Arbitrary;
use kui_core::Widget;
use kui_widgets::StateMachine;
use libfuzzer_sys::fuzz_target;

const MODES: [&str; 4] = ["list", "edit", "view", "bogus"];
const FLAGS: [&str; 3] = ["admin", "dirty", "bogus"];

#[derive(Debug, Arbitrary)]
enum Op {
    SetMode(u8),
    SetFlag(u8),
    ClearFlag(u8),
    ToggleFlag(u8),
    Disable,
    Enable,
}

#[derive(Debug, Arbitrary)]
struct Input {
    children: Vec<(u8, u8)>,
    ops: Vec<Op>,
}

fuzz_target!(|input: Input| {
    let mut sm = StateMachine::new(
        Widget::new("div"),
        MODES[..3].iter().copied(),
        FLAGS[..2].iter().copied(),
    );
    let mut children = Vec::new();

    for (i, (mode_bits, flag_bits)) in input.children.into_iter().take(16).enumerate() {
        let modes: Vec<&str> = MODES
            .iter()
            .enumerate()
            .filter(|(b, _)| mode_bits & (1 << b) != 0)
            .map(|(_, m)| *m)
            .collect();
        let flags: Vec<&str> = FLAGS
            .iter()
            .enumerate()
            .filter(|(b, _)| flag_bits & (1 << b) != 0)
            .map(|(_, f)| *f)
            .collect();
        let widget = Widget::new("div");
        if sm.append_child(&widget, &format!("c{i}"), &modes, &flags) {
            children.push((widget, modes, flags));
        }
    }

    let pick = |set: &[&'static str], i: u8| set[usize::from(i) % set.len()];
    for op in input.ops.into_iter().take(256) {
        match op {
            Op::SetMode(i) => sm.set_mode(pick(&MODES[..], i)),
            Op::SetFlag(i) => sm.set_flag(pick(&FLAGS[..], i)),
            Op::ClearFlag(i) => sm.clear_flag(pick(&FLAGS[..], i)),
            Op::ToggleFlag(i) => sm.toggle_flag(pick(&FLAGS[..], i)),
            Op::Disable => sm.disable_updates(),
            Op::Enable => sm.enable_updates(),
        }

        assert!(sm.modes().iter().any(|m| m == sm.mode()));
        if !sm.updates_enabled() {
            continue;
        }
        for (widget, modes, flags) in &children {
            let expected = modes.contains(&sm.mode())
                && flags
                    .iter()
                    .filter(|f| **f != "bogus")
                    .all(|f| sm.flag(f));
            assert_eq!(widget.is_revealed(), expected);
        }
    }
});
