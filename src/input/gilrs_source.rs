//! Real `InputAggregator` backed by `gilrs`.

use std::collections::HashMap;
use std::sync::Mutex;

use gilrs::{Axis, Button, EventType, GamepadId, Gilrs};

use super::{dynamic_id, InputAggregator, JoystickSnapshot};

/// The fixed axis/button sets read from every connected gamepad. `gilrs`
/// reports axis values already normalized to `[-1.0, 1.0]`, matching the
/// collaborator contract directly.
const AXES: [Axis; 6] = [
    Axis::LeftStickX,
    Axis::LeftStickY,
    Axis::LeftZ,
    Axis::RightStickX,
    Axis::RightStickY,
    Axis::RightZ,
];

const BUTTONS: [Button; 14] = [
    Button::South,
    Button::East,
    Button::North,
    Button::West,
    Button::LeftTrigger,
    Button::LeftTrigger2,
    Button::RightTrigger,
    Button::RightTrigger2,
    Button::Select,
    Button::Start,
    Button::LeftThumb,
    Button::RightThumb,
    Button::DPadUp,
    Button::DPadDown,
];

struct State {
    gilrs: Gilrs,
    tracker: i64,
    raw_index_of: HashMap<GamepadId, i64>,
    next_raw_index: i64,
}

pub struct GilrsAggregator {
    state: Mutex<State>,
}

impl GilrsAggregator {
    pub fn new() -> anyhow::Result<Self> {
        let gilrs = Gilrs::new().map_err(|err| anyhow::anyhow!("gilrs init failed: {err}"))?;
        Ok(Self {
            state: Mutex::new(State {
                gilrs,
                tracker: -1,
                raw_index_of: HashMap::new(),
                next_raw_index: 0,
            }),
        })
    }

    fn pump(state: &mut State) {
        while let Some(event) = state.gilrs.next_event() {
            match event.event {
                EventType::Connected => {
                    state.tracker += 1;
                    let raw_index = state.next_raw_index;
                    state.next_raw_index += 1;
                    state.raw_index_of.insert(event.id, raw_index);
                }
                EventType::Disconnected => {
                    state.raw_index_of.remove(&event.id);
                }
                _ => {}
            }
        }
    }
}

impl InputAggregator for GilrsAggregator {
    fn snapshot(&self) -> Vec<JoystickSnapshot> {
        let mut state = self.state.lock().expect("gilrs aggregator mutex poisoned");
        Self::pump(&mut state);

        let ids: Vec<GamepadId> = state.gilrs.gamepads().map(|(id, _)| id).collect();
        let count = ids.len() as i64;
        let tracker = state.tracker;

        let mut slots: Vec<(usize, JoystickSnapshot)> = Vec::with_capacity(ids.len());
        for id in ids {
            let raw_index = *state.raw_index_of.get(&id).unwrap_or(&0);
            let slot = dynamic_id(tracker, raw_index, count);

            let gamepad = state.gilrs.gamepad(id);
            let axes = AXES.iter().map(|axis| gamepad.value(*axis)).collect();
            let buttons = BUTTONS.iter().map(|btn| gamepad.is_pressed(*btn)).collect();

            slots.push((slot, JoystickSnapshot { axes, buttons }));
        }

        slots.sort_by_key(|(slot, _)| *slot);
        slots.into_iter().map(|(_, snap)| snap).collect()
    }

    fn rumble(&self, id: usize, left: u16, right: u16) {
        let mut state = self.state.lock().expect("gilrs aggregator mutex poisoned");
        let tracker = state.tracker;
        let count = state.raw_index_of.len() as i64;
        let Some(gamepad_id) = state
            .raw_index_of
            .iter()
            .find(|(_, raw)| dynamic_id(tracker, **raw, count) == id)
            .map(|(gid, _)| *gid)
        else {
            return;
        };

        if !state.gilrs.gamepad(gamepad_id).is_ff_supported() {
            return;
        }

        // Force-feedback magnitude is the max of the two motors; gilrs
        // models a single combined strong-rumble effect per gamepad.
        let magnitude = left.max(right);
        if let Ok(effect) = gilrs::ff::EffectBuilder::new()
            .add_effect(gilrs::ff::BaseEffect {
                kind: gilrs::ff::BaseEffectType::Strong { magnitude },
                ..Default::default()
            })
            .gamepads(&[gamepad_id])
            .finish(&mut state.gilrs)
        {
            let _ = effect.play();
        }
    }
}
