//! Lifecycle supervisor: hotkeys, hot reload and the shutdown sequence.
//!
//! # Hotkeys (for beginners)
//!
//! The player is looking at the game, not at a terminal, so touchmap listens
//! for two global keys:
//!
//! - **Esc** shuts down: the touch stream stops, every held key and button
//!   is released, the input bridge exits, and the process says "Goodbye".
//! - **F5** reloads the configuration and layout files.
//!
//! Both are only honoured while the window that was in the foreground when
//! touchmap started (normally the terminal it was launched from) still has
//! focus.  Pressing Esc inside the game therefore does what the game expects
//! and does not kill the mapper.
//!
//! # Shutdown is two-phase
//!
//! [`Supervisor::request_shutdown`] is cheap and may be called from any
//! thread (hotkey thread, Ctrl-C task).  It flips a `watch` channel that the
//! async tasks are waiting on.  Once the touch reader has stopped, the main
//! task calls [`Supervisor::finish`], which releases everything through the
//! bridge and stops the worker.  Both steps run at most once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info};

use super::reload::{ReloadCoordinator, ReloadReport};

/// A global hotkey the supervisor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hotkey {
    /// Esc.
    Shutdown,
    /// F5.
    Reload,
}

/// Control surface of the input bridge used during shutdown.
#[cfg_attr(test, mockall::automock)]
pub trait InjectionControl: Send + Sync {
    /// Releases every key and button currently held.  Idempotent.
    fn release_all(&self);
    /// Stops the worker after draining.  Idempotent.
    fn stop(&self);
}

/// Reports which top-level window has keyboard focus.
#[cfg_attr(test, mockall::automock)]
pub trait ForegroundProbe: Send + Sync {
    fn foreground_window(&self) -> Option<u64>;
}

/// What a hotkey press led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyOutcome {
    /// The launch window was not focused.
    Ignored,
    /// F5 arrived inside the debounce interval.
    Debounced,
    Reloaded(ReloadReport),
    ShutdownRequested,
    /// Esc arrived after shutdown had already begun.
    AlreadyShuttingDown,
}

pub struct Supervisor {
    launch_window: Option<u64>,
    foreground: Arc<dyn ForegroundProbe>,
    injection: Arc<dyn InjectionControl>,
    reloader: Arc<ReloadCoordinator>,
    reload_debounce: Duration,
    last_reload: Mutex<Option<Instant>>,
    shutdown_requested: AtomicBool,
    finished: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

impl Supervisor {
    /// Captures the currently focused window as the launch window.
    pub fn new(
        foreground: Arc<dyn ForegroundProbe>,
        injection: Arc<dyn InjectionControl>,
        reloader: Arc<ReloadCoordinator>,
        reload_debounce: Duration,
    ) -> Self {
        let launch_window = foreground.foreground_window();
        match launch_window {
            Some(handle) => debug!("hotkeys bound to launch window {handle:#x}"),
            None => info!("no focused window at launch; Esc and F5 are disabled, use Ctrl-C"),
        }
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            launch_window,
            foreground,
            injection,
            reloader,
            reload_debounce,
            last_reload: Mutex::new(None),
            shutdown_requested: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    /// Receiver that flips to `true` once shutdown is requested.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }

    pub fn handle_hotkey(&self, hotkey: Hotkey) -> HotkeyOutcome {
        self.handle_hotkey_at(hotkey, Instant::now())
    }

    pub fn handle_hotkey_at(&self, hotkey: Hotkey, now: Instant) -> HotkeyOutcome {
        if self.launch_window.is_none() || self.foreground.foreground_window() != self.launch_window {
            return HotkeyOutcome::Ignored;
        }
        match hotkey {
            Hotkey::Shutdown => {
                if self.request_shutdown("Esc") {
                    HotkeyOutcome::ShutdownRequested
                } else {
                    HotkeyOutcome::AlreadyShuttingDown
                }
            }
            Hotkey::Reload => {
                if self.is_shutting_down() {
                    return HotkeyOutcome::Ignored;
                }
                {
                    let mut last = self.last_reload.lock().unwrap_or_else(PoisonError::into_inner);
                    if last.is_some_and(|t| now.saturating_duration_since(t) < self.reload_debounce) {
                        return HotkeyOutcome::Debounced;
                    }
                    *last = Some(now);
                }
                info!("reloading config and layout");
                HotkeyOutcome::Reloaded(self.reloader.reload_all())
            }
        }
    }

    /// Starts shutdown.  Returns `false` if it had already started.
    pub fn request_shutdown(&self, reason: &str) -> bool {
        if self.shutdown_requested.swap(true, Ordering::AcqRel) {
            return false;
        }
        info!("shutdown requested ({reason})");
        self.shutdown_tx.send_replace(true);
        true
    }

    /// Releases everything and stops the bridge.  Returns `false` if it had
    /// already run.
    pub fn finish(&self) -> bool {
        if self.finished.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.request_shutdown("finish");
        self.injection.release_all();
        self.injection.stop();
        true
    }
}
