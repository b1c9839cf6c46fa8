//! In-memory hotkey source.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::{Hotkey, HotkeyError, HotkeySource};

/// Hotkey source driven by [`ManualHotkeys::press`].
#[derive(Debug, Default)]
pub struct ManualHotkeys {
    sender: Mutex<Option<Sender<Hotkey>>>,
    started: AtomicBool,
    pub should_fail: bool,
}

impl ManualHotkeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `hotkey` as if it had been pressed.  Returns `false` when
    /// the source is not running.
    pub fn press(&self, hotkey: Hotkey) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|tx| tx.send(hotkey).is_ok())
    }
}

impl HotkeySource for ManualHotkeys {
    fn start(&self) -> Result<Receiver<Hotkey>, HotkeyError> {
        if self.should_fail {
            return Err(HotkeyError::HookInstallFailed("mock failure".into()));
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(HotkeyError::AlreadyStarted);
        }
        let (tx, rx) = unbounded();
        *self.sender.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        Ok(rx)
    }

    fn stop(&self) {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}
