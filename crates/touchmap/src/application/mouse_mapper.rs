//! Mouse mapper: the right-side finger becomes camera look or a menu click.
//!
//! # Two modes
//!
//! - **Gameplay** (host cursor hidden): dragging produces relative mouse
//!   motion.  Each sample's raw delta is multiplied by
//!   `TOTAL_MULT = sensitivity × (DEF_DPI / device_dpi)` and run through a
//!   sub-pixel accumulator so slow drags still move the camera.
//! - **Menu** (host cursor visible): touching warps the cursor to the
//!   matching point of the game window and presses the left button; a second
//!   touch inside the double-tap window presses the right button instead.
//!
//! Lifting the finger always releases both buttons.  The bridge ignores
//! releases for buttons that are not held, so this is safe in either mode.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use touchmap_core::mapping::SubPixelAccumulator;
use touchmap_core::{
    ButtonFlag, CommandSink, ConfigSnapshot, InjectCommand, SinkError, TouchAction, TouchEvent,
};

use super::dispatcher::TouchHandler;

/// Device-to-host mapping provided by the window tracker.
#[cfg_attr(test, mockall::automock)]
pub trait GameWindow: Send + Sync {
    /// `false` while the game window is minimised, hidden or gone.
    fn is_acquired(&self) -> bool;

    /// Absolute desktop pixel for a device pixel; `None` while lost.
    fn device_to_game_abs(&self, x: i32, y: i32) -> Option<(i32, i32)>;
}

/// Values the mapper copies out of the config snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseTunables {
    pub total_mult: f64,
    pub invert_y: bool,
    pub double_tap_window: Duration,
}

impl MouseTunables {
    pub fn from_config(config: &ConfigSnapshot) -> Self {
        Self {
            total_mult: config.total_mult(),
            invert_y: config.mouse.invert_y,
            double_tap_window: config.double_tap_window(),
        }
    }
}

impl Default for MouseTunables {
    fn default() -> Self {
        Self::from_config(&ConfigSnapshot::default())
    }
}

#[derive(Debug, Default)]
struct MouseState {
    /// Tracking id of the finger currently driving the camera.
    anchor: Option<i32>,
    prev: (i32, i32),
    acc: SubPixelAccumulator,
    last_down: Option<Instant>,
    tunables: MouseTunables,
}

pub struct MouseMapper {
    sink: Arc<dyn CommandSink>,
    window: Arc<dyn GameWindow>,
    menu_mode: AtomicBool,
    state: Mutex<MouseState>,
}

impl MouseMapper {
    pub fn new(sink: Arc<dyn CommandSink>, window: Arc<dyn GameWindow>, tunables: MouseTunables) -> Self {
        Self {
            sink,
            window,
            menu_mode: AtomicBool::new(false),
            state: Mutex::new(MouseState {
                tunables,
                ..MouseState::default()
            }),
        }
    }

    /// Called on `MenuModeToggle`; sampled at the next finger down.
    pub fn set_menu_mode(&self, visible: bool) {
        self.menu_mode.store(visible, Ordering::Release);
    }

    pub fn menu_mode(&self) -> bool {
        self.menu_mode.load(Ordering::Acquire)
    }

    /// Called on `ConfigReload`.
    pub fn update_tunables(&self, tunables: MouseTunables) {
        self.lock().tunables = tunables;
    }

    pub fn tunables(&self) -> MouseTunables {
        self.lock().tunables
    }

    /// Handles one touch with an explicit clock, for deterministic tests.
    pub fn handle_at(&self, action: TouchAction, touch: &TouchEvent, now: Instant) {
        let commands = {
            let mut state = self.lock();
            match action {
                TouchAction::Down => self.on_down(&mut state, touch, now),
                TouchAction::Pressed => self.on_pressed(&mut state, touch),
                TouchAction::Up => on_up(&mut state),
            }
        };
        for command in commands {
            self.submit(command);
        }
    }

    fn on_down(&self, state: &mut MouseState, touch: &TouchEvent, now: Instant) -> Vec<InjectCommand> {
        state.anchor = Some(touch.tracking_id);
        state.prev = (touch.x, touch.y);
        state.acc.reset();

        let double_tap = state
            .last_down
            .is_some_and(|last| now.saturating_duration_since(last) < state.tunables.double_tap_window);
        state.last_down = Some(now);

        if !self.menu_mode() {
            return Vec::new();
        }
        let Some((x, y)) = self.window.device_to_game_abs(touch.x, touch.y) else {
            debug!("menu tap ignored: game window not acquired");
            return Vec::new();
        };
        let button = if double_tap { ButtonFlag::RightDown } else { ButtonFlag::LeftDown };
        vec![InjectCommand::MoveAbs { x, y }, InjectCommand::Button(button)]
    }

    fn on_pressed(&self, state: &mut MouseState, touch: &TouchEvent) -> Vec<InjectCommand> {
        if state.anchor != Some(touch.tracking_id) {
            // The camera role moved to a finger that was already down.
            state.anchor = Some(touch.tracking_id);
            state.prev = (touch.x, touch.y);
            state.acc.reset();
            return Vec::new();
        }

        let dx = touch.x - state.prev.0;
        let dy = touch.y - state.prev.1;
        state.prev = (touch.x, touch.y);
        if !self.window.is_acquired() {
            return Vec::new();
        }

        let mult = state.tunables.total_mult;
        let sy = if state.tunables.invert_y { -(dy as f64) } else { dy as f64 };
        let (mx, my) = state.acc.push(dx as f64 * mult, sy * mult);
        if mx == 0 && my == 0 {
            return Vec::new();
        }
        vec![InjectCommand::MoveRel { dx: mx, dy: my }]
    }

    fn submit(&self, command: InjectCommand) {
        match self.sink.submit(command) {
            Ok(()) => {}
            Err(SinkError::Overloaded) => warn!("input bridge overloaded; dropped {command:?}"),
            Err(SinkError::Stopped) => debug!("input bridge stopped; dropped {command:?}"),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MouseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn on_up(state: &mut MouseState) -> Vec<InjectCommand> {
    state.anchor = None;
    state.acc.reset();
    vec![
        InjectCommand::Button(ButtonFlag::LeftUp),
        InjectCommand::Button(ButtonFlag::RightUp),
    ]
}

impl TouchHandler for MouseMapper {
    fn on_touch(&self, action: TouchAction, touch: &TouchEvent) {
        self.handle_at(action, touch, Instant::now());
    }
}
