//! WASD mapper: the left-side finger drives a floating joystick.
//!
//! The geometry (deadzone, leash, sector hysteresis) lives in
//! [`touchmap_core::mapping::Joystick`].  This use case owns the gesture
//! lifecycle and turns the joystick's desired key set into key transitions
//! by diffing against what is currently held: releases first, then presses.
//!
//! `held` tracks what the bridge accepted.  A transition the bridge rejects
//! as overloaded is rolled back, so the next diff sends it again; a release
//! is never forgotten while the key is still down in the game.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use touchmap_core::mapping::{Joystick, JoystickTunables, KeySet};
use touchmap_core::{CommandSink, InjectCommand, KeyDirection, SinkError, TouchAction, TouchEvent};

use super::dispatcher::TouchHandler;

#[derive(Debug)]
struct WasdState {
    stick: Option<Joystick>,
    anchor: Option<i32>,
    held: KeySet,
    blocked: bool,
    tunables: JoystickTunables,
}

pub struct WasdMapper {
    sink: Arc<dyn CommandSink>,
    state: Mutex<WasdState>,
}

impl WasdMapper {
    pub fn new(sink: Arc<dyn CommandSink>, tunables: JoystickTunables) -> Self {
        Self {
            sink,
            state: Mutex::new(WasdState {
                stick: None,
                anchor: None,
                held: KeySet::EMPTY,
                blocked: false,
                tunables,
            }),
        }
    }

    /// Called on `ConfigReload` and `LayoutReload`; the next sample uses the
    /// new radii.
    pub fn update_tunables(&self, tunables: JoystickTunables) {
        self.lock().tunables = tunables;
    }

    pub fn tunables(&self) -> JoystickTunables {
        self.lock().tunables
    }

    /// Raising the block releases every held key and suppresses presses
    /// until it is lifted.
    pub fn set_blocked(&self, blocked: bool) {
        let commands = {
            let mut state = self.lock();
            state.blocked = blocked;
            if blocked {
                release_all(&mut state)
            } else {
                Vec::new()
            }
        };
        debug!("joystick block {}", if blocked { "raised" } else { "lifted" });
        self.submit_all(commands);
    }

    pub fn is_blocked(&self) -> bool {
        self.lock().blocked
    }

    pub fn held_keys(&self) -> KeySet {
        self.lock().held
    }

    fn handle(&self, action: TouchAction, touch: &TouchEvent) {
        let commands = {
            let mut state = self.lock();
            match action {
                TouchAction::Down => start_gesture(&mut state, touch),
                TouchAction::Pressed => {
                    if state.anchor != Some(touch.tracking_id) {
                        start_gesture(&mut state, touch)
                    } else {
                        steer(&mut state, touch)
                    }
                }
                TouchAction::Up => {
                    state.anchor = None;
                    state.stick = None;
                    release_all(&mut state)
                }
            }
        };
        self.submit_all(commands);
    }

    fn submit_all(&self, commands: Vec<InjectCommand>) {
        let mut rejected = Vec::new();
        for command in commands {
            match self.sink.submit(command) {
                Ok(()) => {}
                Err(SinkError::Overloaded) => {
                    warn!("input bridge overloaded; will retry {command:?}");
                    rejected.push(command);
                }
                Err(SinkError::Stopped) => debug!("input bridge stopped; dropped {command:?}"),
            }
        }
        if !rejected.is_empty() {
            let mut state = self.lock();
            for command in rejected {
                roll_back(&mut state, command);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, WasdState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn start_gesture(state: &mut WasdState, touch: &TouchEvent) -> Vec<InjectCommand> {
    state.anchor = Some(touch.tracking_id);
    state.stick = Some(Joystick::new((touch.x as f64, touch.y as f64)));
    release_all(state)
}

fn steer(state: &mut WasdState, touch: &TouchEvent) -> Vec<InjectCommand> {
    let tunables = state.tunables;
    let Some(stick) = state.stick.as_mut() else {
        return Vec::new();
    };
    let wanted = stick.update((touch.x as f64, touch.y as f64), &tunables);
    let target = if state.blocked { KeySet::EMPTY } else { wanted };
    apply(state, target)
}

fn release_all(state: &mut WasdState) -> Vec<InjectCommand> {
    apply(state, KeySet::EMPTY)
}

/// Undoes the bookkeeping for a transition the bridge did not take.
fn roll_back(state: &mut WasdState, command: InjectCommand) {
    let InjectCommand::Key { scancode, direction } = command else {
        return;
    };
    let Some(key) = KeySet::from_scancode(scancode) else {
        return;
    };
    state.held = match direction {
        KeyDirection::Up => state.held.union(key),
        KeyDirection::Down => state.held.difference(key),
    };
}

fn apply(state: &mut WasdState, target: KeySet) -> Vec<InjectCommand> {
    let released = state.held.difference(target);
    let pressed = target.difference(state.held);
    state.held = target;
    released
        .scancodes()
        .map(InjectCommand::key_up)
        .chain(pressed.scancodes().map(InjectCommand::key_down))
        .collect()
}

impl TouchHandler for WasdMapper {
    fn on_touch(&self, action: TouchAction, touch: &TouchEvent) {
        self.handle(action, touch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::recording_sink::RecordingSink;
    use touchmap_core::keymap::{SC_D, SC_S, SC_W};

    fn tunables() -> JoystickTunables {
        JoystickTunables {
            deadzone: 0.2,
            hysteresis_deg: 5.0,
            inner_radius_px: 80.0,
            outer_radius_px: 350.0,
        }
    }

    fn finger(id: i32, x: i32, y: i32) -> TouchEvent {
        TouchEvent {
            slot: 1,
            tracking_id: id,
            x,
            y,
            sx: x,
            sy: y,
            is_mouse: false,
            is_wasd: true,
        }
    }

    fn mapper() -> (WasdMapper, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        (WasdMapper::new(sink.clone(), tunables()), sink)
    }

    #[test]
    fn test_floating_joystick_diff_applies_keys() {
        // Arrange
        let (mapper, sink) = mapper();

        // Act / Assert
        mapper.on_touch(TouchAction::Down, &finger(1, 200, 900));
        assert!(sink.take().is_empty());

        mapper.on_touch(TouchAction::Pressed, &finger(1, 200, 800));
        assert_eq!(sink.take(), vec![InjectCommand::key_down(SC_W)]);

        mapper.on_touch(TouchAction::Pressed, &finger(1, 260, 800));
        assert_eq!(sink.take(), vec![InjectCommand::key_down(SC_D)]);

        mapper.on_touch(TouchAction::Pressed, &finger(1, 200, 890));
        assert_eq!(
            sink.take(),
            vec![InjectCommand::key_up(SC_W), InjectCommand::key_up(SC_D)]
        );

        mapper.on_touch(TouchAction::Pressed, &finger(1, 200, 1300));
        assert_eq!(sink.take(), vec![InjectCommand::key_down(SC_S)]);
        assert_eq!(mapper.held_keys(), KeySet::S);
    }

    #[test]
    fn test_up_releases_everything() {
        let (mapper, sink) = mapper();
        mapper.on_touch(TouchAction::Down, &finger(1, 200, 900));
        mapper.on_touch(TouchAction::Pressed, &finger(1, 300, 800));
        sink.take();

        mapper.on_touch(TouchAction::Up, &finger(1, 300, 800));

        let released = sink.take();
        assert_eq!(released, vec![InjectCommand::key_up(SC_W), InjectCommand::key_up(SC_D)]);
        assert_eq!(mapper.held_keys(), KeySet::EMPTY);
    }

    #[test]
    fn test_release_rejected_by_full_bridge_is_retried() {
        // Arrange
        let (mapper, sink) = mapper();
        mapper.on_touch(TouchAction::Down, &finger(1, 200, 900));
        mapper.on_touch(TouchAction::Pressed, &finger(1, 200, 800));
        *sink.fail_with.lock().unwrap() = Some(SinkError::Overloaded);

        // Act
        mapper.on_touch(TouchAction::Up, &finger(1, 200, 800));
        let still_held = mapper.held_keys();
        *sink.fail_with.lock().unwrap() = None;
        mapper.on_touch(TouchAction::Down, &finger(2, 200, 900));
        mapper.on_touch(TouchAction::Up, &finger(2, 200, 900));

        // Assert
        assert_eq!(still_held, KeySet::W);
        assert_eq!(
            sink.snapshot(),
            vec![InjectCommand::key_down(SC_W), InjectCommand::key_up(SC_W)]
        );
        assert_eq!(mapper.held_keys(), KeySet::EMPTY);
    }

    #[test]
    fn test_press_rejected_by_full_bridge_is_sent_on_next_sample() {
        let (mapper, sink) = mapper();
        mapper.on_touch(TouchAction::Down, &finger(1, 200, 900));
        *sink.fail_with.lock().unwrap() = Some(SinkError::Overloaded);
        mapper.on_touch(TouchAction::Pressed, &finger(1, 200, 800));
        assert_eq!(mapper.held_keys(), KeySet::EMPTY);

        *sink.fail_with.lock().unwrap() = None;
        mapper.on_touch(TouchAction::Pressed, &finger(1, 200, 795));

        assert_eq!(sink.take(), vec![InjectCommand::key_down(SC_W)]);
        assert_eq!(mapper.held_keys(), KeySet::W);
    }

    #[test]
    fn test_block_releases_and_inhibits_presses() {
        // Arrange
        let (mapper, sink) = mapper();
        mapper.on_touch(TouchAction::Down, &finger(1, 200, 900));
        mapper.on_touch(TouchAction::Pressed, &finger(1, 200, 800));
        sink.take();

        // Act
        mapper.set_blocked(true);
        let on_block = sink.take();
        mapper.on_touch(TouchAction::Pressed, &finger(1, 300, 900));
        let while_blocked = sink.take();
        mapper.set_blocked(false);
        mapper.on_touch(TouchAction::Pressed, &finger(1, 310, 900));
        let after = sink.take();

        // Assert
        assert_eq!(on_block, vec![InjectCommand::key_up(SC_W)]);
        assert!(while_blocked.is_empty());
        assert_eq!(after, vec![InjectCommand::key_down(SC_D)]);
    }

    #[test]
    fn test_new_finger_recentres_without_pressing() {
        let (mapper, sink) = mapper();
        mapper.on_touch(TouchAction::Down, &finger(1, 200, 900));
        mapper.on_touch(TouchAction::Pressed, &finger(1, 200, 800));
        sink.take();

        // Identity moved to an older finger at another spot.
        mapper.on_touch(TouchAction::Pressed, &finger(2, 500, 500));

        assert_eq!(sink.take(), vec![InjectCommand::key_up(SC_W)]);
        mapper.on_touch(TouchAction::Pressed, &finger(2, 500, 400));
        assert_eq!(sink.take(), vec![InjectCommand::key_down(SC_W)]);
    }

    #[test]
    fn test_tunable_update_applies_to_next_sample() {
        let (mapper, sink) = mapper();
        mapper.on_touch(TouchAction::Down, &finger(1, 200, 900));

        // Deadzone grows to 0.9 * 80 = 72 px.
        mapper.update_tunables(JoystickTunables { deadzone: 0.9, ..tunables() });
        mapper.on_touch(TouchAction::Pressed, &finger(1, 200, 850));

        assert!(sink.take().is_empty());
        assert_eq!(mapper.tunables().deadzone, 0.9);
    }
}
