//! Button mapper: HUD button zones become key presses.
//!
//! A finger whose DOWN lands inside a button zone holds that zone's scancode
//! until the same finger lifts.  Where the finger moves in between does not
//! matter; sliding off a button never releases it early.
//!
//! When the pressing finger is the joystick finger, the joystick is blocked
//! for the duration of the press so the HUD tap does not also walk the
//! character.  The block is announced on the dispatcher's `WasdBlock`
//! channel rather than by calling the WASD mapper directly.
//!
//! A release the bridge rejects as overloaded is kept and sent again ahead
//! of the next touch event, so a button never stays down in the game.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, warn};

use touchmap_core::keymap::scancode_name;
use touchmap_core::{CommandSink, InjectCommand, LayoutSnapshot, MapperEvent, SinkError, TouchAction, TouchEvent};

use super::dispatcher::{Dispatcher, TouchHandler};

struct ButtonState {
    layout: Arc<LayoutSnapshot>,
    /// Scancode held per `(slot, tracking_id)`.
    held: HashMap<(usize, i32), u16>,
    /// Tracking id of the joystick finger currently holding a button.
    blocking: Option<i32>,
    /// Releases the bridge turned away, oldest first.
    unreleased: Vec<u16>,
}

pub struct ButtonMapper {
    sink: Arc<dyn CommandSink>,
    publisher: Weak<Dispatcher>,
    state: Mutex<ButtonState>,
}

impl ButtonMapper {
    pub fn new(
        sink: Arc<dyn CommandSink>,
        publisher: Weak<Dispatcher>,
        layout: Arc<LayoutSnapshot>,
    ) -> Self {
        Self {
            sink,
            publisher,
            state: Mutex::new(ButtonState {
                layout,
                held: HashMap::new(),
                blocking: None,
                unreleased: Vec::new(),
            }),
        }
    }

    /// Swaps in a reloaded layout.  Buttons already held keep their
    /// scancode until released.
    pub fn set_layout(&self, layout: Arc<LayoutSnapshot>) {
        self.lock().layout = layout;
    }

    pub fn held_count(&self) -> usize {
        self.lock().held.len()
    }

    fn handle(&self, action: TouchAction, touch: &TouchEvent) {
        self.retry_releases();
        let key = (touch.slot, touch.tracking_id);
        match action {
            TouchAction::Down => {
                let (scancode, block) = {
                    let mut state = self.lock();
                    let Some(scancode) = state
                        .layout
                        .button_at(touch.x, touch.y)
                        .and_then(|zone| zone.key.scancode())
                    else {
                        return;
                    };
                    state.held.insert(key, scancode);
                    let block = touch.is_wasd && state.blocking.is_none();
                    if block {
                        state.blocking = Some(touch.tracking_id);
                    }
                    (scancode, block)
                };
                debug!(
                    "button {} down",
                    scancode_name(scancode).unwrap_or("?")
                );
                self.submit(InjectCommand::key_down(scancode));
                if block {
                    self.publish(MapperEvent::WasdBlock { blocked: true });
                }
            }
            TouchAction::Pressed => {}
            TouchAction::Up => {
                let (scancode, unblock) = {
                    let mut state = self.lock();
                    let scancode = state.held.remove(&key);
                    let unblock = state.blocking == Some(touch.tracking_id);
                    if unblock {
                        state.blocking = None;
                    }
                    (scancode, unblock)
                };
                if let Some(scancode) = scancode {
                    self.release(scancode);
                }
                if unblock {
                    self.publish(MapperEvent::WasdBlock { blocked: false });
                }
            }
        }
    }

    fn submit(&self, command: InjectCommand) {
        if let Err(e) = self.sink.submit(command) {
            warn!("dropped {command:?}: {e}");
        }
    }

    fn release(&self, scancode: u16) {
        match self.sink.submit(InjectCommand::key_up(scancode)) {
            Ok(()) => {}
            Err(SinkError::Overloaded) => {
                warn!("input bridge overloaded; will retry release of {scancode:#04x}");
                self.lock().unreleased.push(scancode);
            }
            Err(e) => debug!("dropped release of {scancode:#04x}: {e}"),
        }
    }

    fn retry_releases(&self) {
        let pending = std::mem::take(&mut self.lock().unreleased);
        for scancode in pending {
            self.release(scancode);
        }
    }

    fn publish(&self, event: MapperEvent) {
        if let Some(dispatcher) = self.publisher.upgrade() {
            dispatcher.publish(event);
        }
    }

    fn lock(&self) -> MutexGuard<'_, ButtonState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TouchHandler for ButtonMapper {
    fn on_touch(&self, action: TouchAction, touch: &TouchEvent) {
        self.handle(action, touch);
    }
}
