//! Global hotkeys.
//!
//! A [`HotkeySource`] watches the keyboard system-wide and delivers
//! [`Hotkey`]s on a channel.  It never swallows a key: the game still sees
//! every Esc.  Whether a key is acted on is the supervisor's decision
//! (launch-window focus, reload debounce), made on the handler thread that
//! [`spawn_handler`] starts.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use thiserror::Error;
use tracing::{debug, info};

use touchmap_core::keymap::{VK_ESCAPE, VK_F5};

pub use crate::application::lifecycle::Hotkey;
use crate::application::lifecycle::{HotkeyOutcome, Supervisor};

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

#[derive(Debug, Error)]
pub enum HotkeyError {
    #[error("failed to install keyboard hook: {0}")]
    HookInstallFailed(String),
    #[error("hotkey source already started")]
    AlreadyStarted,
    #[error("global hotkeys are not supported on this platform")]
    Unsupported,
}

/// System-wide key watcher.
pub trait HotkeySource: Send + Sync {
    /// Starts watching.  The receiver disconnects when the source stops.
    fn start(&self) -> Result<Receiver<Hotkey>, HotkeyError>;

    fn stop(&self);
}

/// Hotkey bound to a Windows virtual-key code.
pub fn hotkey_for_vk(vk: u32) -> Option<Hotkey> {
    match vk {
        VK_ESCAPE => Some(Hotkey::Shutdown),
        VK_F5 => Some(Hotkey::Reload),
        _ => None,
    }
}

/// Feeds hotkeys to the supervisor on a thread named `hotkey-handler`.
///
/// Reloads run on this thread, so a slow disk never stalls the keyboard
/// hook.  The thread exits once shutdown has been requested or the source
/// disconnects.
pub fn spawn_handler(
    hotkeys: Receiver<Hotkey>,
    supervisor: Arc<Supervisor>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("hotkey-handler".to_string())
        .spawn(move || {
            for hotkey in hotkeys.iter() {
                match supervisor.handle_hotkey(hotkey) {
                    HotkeyOutcome::Ignored => debug!("{hotkey:?} ignored: launch window not focused"),
                    HotkeyOutcome::Debounced => debug!("{hotkey:?} debounced"),
                    HotkeyOutcome::Reloaded(report) => info!(
                        "hot reload applied (config: {}, layout: {})",
                        report.config, report.layout
                    ),
                    HotkeyOutcome::ShutdownRequested | HotkeyOutcome::AlreadyShuttingDown => {}
                }
                if supervisor.is_shutting_down() {
                    break;
                }
            }
            debug!("hotkey handler stopped");
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_keys_map_to_hotkeys() {
        assert_eq!(hotkey_for_vk(0x1B), Some(Hotkey::Shutdown));
        assert_eq!(hotkey_for_vk(0x74), Some(Hotkey::Reload));
        assert_eq!(hotkey_for_vk(0x41), None);
    }
}
