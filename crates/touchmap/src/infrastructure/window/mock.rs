//! Scriptable window probe for integration tests and non-Windows hosts.

use std::sync::{Arc, Mutex, PoisonError};

use touchmap_core::WindowInfo;

use super::{WindowProbe, WindowProbeError};

/// Probe whose answers are set by the test.  Clones share state.
#[derive(Debug, Clone, Default)]
pub struct FakeWindowProbe {
    windows: Arc<Mutex<Vec<WindowInfo>>>,
    cursor_visible: Arc<Mutex<bool>>,
    foreground: Arc<Mutex<Option<u64>>>,
}

impl FakeWindowProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_windows(&self, windows: Vec<WindowInfo>) {
        *self.windows.lock().unwrap_or_else(PoisonError::into_inner) = windows;
    }

    pub fn set_cursor_visible(&self, visible: bool) {
        *self.cursor_visible.lock().unwrap_or_else(PoisonError::into_inner) = visible;
    }

    pub fn set_foreground(&self, handle: Option<u64>) {
        *self.foreground.lock().unwrap_or_else(PoisonError::into_inner) = handle;
    }
}

impl WindowProbe for FakeWindowProbe {
    fn find_windows(&self, _class: &str) -> Result<Vec<WindowInfo>, WindowProbeError> {
        Ok(self.windows.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn cursor_visible(&self) -> Result<bool, WindowProbeError> {
        Ok(*self.cursor_visible.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn foreground_window(&self) -> Option<u64> {
        *self.foreground.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
