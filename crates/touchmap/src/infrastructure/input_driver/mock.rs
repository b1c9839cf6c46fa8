//! Recording input driver for tests.
//!
//! Each call is pushed into a shared `Arc<Mutex<Vec<DriverCall>>>`.  The
//! driver itself moves into the bridge worker thread, so tests keep a clone
//! of the `calls` handle to inspect what was injected and in what order.
//!
//! # `should_fail` flag
//!
//! Set `should_fail = true` to make every call return
//! `DriverError::Platform`, to exercise the bridge's error paths.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use touchmap_core::{ButtonFlag, KeyDirection};

use super::{DriverError, InputDriver, VirtualDesktop};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverCall {
    Key(u16, KeyDirection),
    MoveRelative(i32, i32),
    MoveAbsolute(i32, i32),
    Button(ButtonFlag),
}

#[derive(Debug, Clone)]
pub struct RecordingDriver {
    pub calls: Arc<Mutex<Vec<DriverCall>>>,
    pub should_fail: bool,
    /// Simulated latency of every call.
    pub delay: Duration,
    pub desktop: VirtualDesktop,
}

impl RecordingDriver {
    /// A driver on a single 1920×1080 monitor.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            should_fail: false,
            delay: Duration::ZERO,
            desktop: VirtualDesktop {
                left: 0,
                top: 0,
                width: 1920,
                height: 1080,
            },
        }
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, call: DriverCall) -> Result<(), DriverError> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if self.should_fail {
            return Err(DriverError::Platform("mock failure".into()));
        }
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        Ok(())
    }
}

impl Default for RecordingDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl InputDriver for RecordingDriver {
    fn emit_key(&self, scancode: u16, direction: KeyDirection) -> Result<(), DriverError> {
        self.record(DriverCall::Key(scancode, direction))
    }

    fn emit_move_relative(&self, dx: i32, dy: i32) -> Result<(), DriverError> {
        self.record(DriverCall::MoveRelative(dx, dy))
    }

    fn emit_move_absolute(&self, nx: i32, ny: i32) -> Result<(), DriverError> {
        self.record(DriverCall::MoveAbsolute(nx, ny))
    }

    fn emit_button(&self, flag: ButtonFlag) -> Result<(), DriverError> {
        self.record(DriverCall::Button(flag))
    }

    fn virtual_desktop(&self) -> VirtualDesktop {
        self.desktop
    }
}
