//! Window tracker: where is the game, and is its cursor showing?
//!
//! A background task asks the OS for the game window (matched by window
//! class, largest visible one by client-area diagonal) every 50 ms while it
//! is found and every second while it is lost.  Each tick also samples
//! cursor visibility: a visible cursor means the game is showing a menu,
//! and every change is published as `MenuMode{visible}`.
//!
//! Readers on the touch path copy the window rectangle out under a short
//! lock and do the coordinate math afterwards.  While the window is lost,
//! every device-to-game mapping returns `None`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use touchmap_core::{MapperEvent, WindowInfo};

use crate::application::dispatcher::Dispatcher;
use crate::application::lifecycle::ForegroundProbe;
use crate::application::mouse_mapper::GameWindow;

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

pub const ACQUIRED_TICK: Duration = Duration::from_millis(50);
pub const LOST_TICK: Duration = Duration::from_secs(1);
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum WindowProbeError {
    #[error("window query failed: {0}")]
    Platform(String),
    #[error("window queries are not supported on this platform")]
    Unsupported,
}

/// OS window queries.  Implementations may block; the tracker calls them
/// off the async runtime with a timeout.
#[cfg_attr(test, mockall::automock)]
pub trait WindowProbe: Send + Sync {
    /// Visible, non-minimised top-level windows of `class`, as client
    /// rectangles in desktop pixels.
    fn find_windows(&self, class: &str) -> Result<Vec<WindowInfo>, WindowProbeError>;

    fn cursor_visible(&self) -> Result<bool, WindowProbeError>;

    fn foreground_window(&self) -> Option<u64>;
}

/// The window with the longest client-area diagonal.
pub fn select_largest(windows: &[WindowInfo]) -> Option<WindowInfo> {
    windows
        .iter()
        .filter(|w| !w.is_empty())
        .max_by(|a, b| a.diagonal().total_cmp(&b.diagonal()))
        .copied()
}

/// Result of one probe round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Observation {
    pub window: Option<WindowInfo>,
    /// `None` when the cursor query failed; menu mode is left as it was.
    pub cursor_visible: Option<bool>,
}

impl Observation {
    pub fn take(probe: &dyn WindowProbe, class: &str) -> Self {
        let window = match probe.find_windows(class) {
            Ok(found) => select_largest(&found),
            Err(e) => {
                debug!("window query failed: {e}");
                None
            }
        };
        Self {
            window,
            cursor_visible: probe.cursor_visible().ok(),
        }
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    window: Option<WindowInfo>,
    device_res: (u32, u32),
    menu_mode: bool,
    announced_wait: bool,
}

pub struct WindowTracker {
    probe: Arc<dyn WindowProbe>,
    class: String,
    state: Mutex<TrackerState>,
    publisher: Weak<Dispatcher>,
}

impl WindowTracker {
    pub fn new(
        probe: Arc<dyn WindowProbe>,
        class: impl Into<String>,
        device_res: (u32, u32),
        publisher: Weak<Dispatcher>,
    ) -> Self {
        Self {
            probe,
            class: class.into(),
            state: Mutex::new(TrackerState {
                device_res,
                ..TrackerState::default()
            }),
            publisher,
        }
    }

    /// Picks up a new `device_res` after a config reload.
    pub fn set_device_res(&self, device_res: (u32, u32)) {
        self.lock().device_res = device_res;
    }

    pub fn current(&self) -> Option<WindowInfo> {
        self.lock().window
    }

    pub fn menu_mode(&self) -> bool {
        self.lock().menu_mode
    }

    /// Applies one observation: logs found/lost edges once each and
    /// publishes menu-mode edges.  Returns whether the window is acquired.
    pub fn apply(&self, observation: Observation) -> bool {
        let (edge, acquired) = {
            let mut state = self.lock();
            match (state.window, observation.window) {
                (None, Some(found)) => info!(
                    "game window found: {}x{} at ({}, {})",
                    found.width, found.height, found.left, found.top
                ),
                (Some(_), None) => warn!("game window lost; touch mapping paused"),
                (None, None) if !state.announced_wait => {
                    info!("waiting for a game window of class {}", self.class);
                    state.announced_wait = true;
                }
                (Some(old), Some(new)) if old != new => {
                    debug!("game window moved to {}x{} at ({}, {})", new.width, new.height, new.left, new.top)
                }
                _ => {}
            }
            state.window = observation.window;

            let edge = match observation.cursor_visible {
                Some(visible) if visible != state.menu_mode => {
                    state.menu_mode = visible;
                    Some(visible)
                }
                _ => None,
            };
            (edge, state.window.is_some())
        };

        if let Some(visible) = edge {
            debug!("menu mode {}", if visible { "on" } else { "off" });
            if let Some(dispatcher) = self.publisher.upgrade() {
                dispatcher.publish(MapperEvent::MenuMode { visible });
            }
        }
        acquired
    }

    /// Polls until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            let probe = Arc::clone(&self.probe);
            let class = self.class.clone();
            let query = tokio::task::spawn_blocking(move || Observation::take(probe.as_ref(), &class));
            let acquired = match tokio::time::timeout(PROBE_TIMEOUT, query).await {
                Ok(Ok(observation)) => self.apply(observation),
                Ok(Err(e)) => {
                    warn!("window probe task failed: {e}");
                    self.current().is_some()
                }
                Err(_) => {
                    warn!("window probe timed out after {PROBE_TIMEOUT:?}");
                    self.current().is_some()
                }
            };
            let interval = if acquired { ACQUIRED_TICK } else { LOST_TICK };
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
        }
        debug!("window tracker stopped");
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl GameWindow for WindowTracker {
    fn is_acquired(&self) -> bool {
        self.lock().window.is_some()
    }

    fn device_to_game_abs(&self, x: i32, y: i32) -> Option<(i32, i32)> {
        let (window, device_res) = {
            let state = self.lock();
            (state.window?, state.device_res)
        };
        Some(window.device_to_game_abs(x, y, device_res))
    }
}

impl ForegroundProbe for WindowTracker {
    fn foreground_window(&self) -> Option<u64> {
        self.probe.foreground_window()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use touchmap_core::Channel;

    fn window(handle: u64, width: i32, height: i32) -> WindowInfo {
        WindowInfo {
            handle,
            left: 0,
            top: 0,
            width,
            height,
        }
    }

    fn tracker(probe: MockWindowProbe, dispatcher: &Arc<Dispatcher>) -> WindowTracker {
        WindowTracker::new(Arc::new(probe), "UnrealWindow", (2400, 1080), Arc::downgrade(dispatcher))
    }

    #[test]
    fn test_largest_window_wins() {
        let picked = select_largest(&[window(1, 800, 600), window(2, 1920, 1080), window(3, 0, 0)]);
        assert_eq!(picked.map(|w| w.handle), Some(2));
        assert_eq!(select_largest(&[]), None);
    }

    #[test]
    fn test_observation_uses_probe_results() {
        // Arrange
        let mut probe = MockWindowProbe::new();
        probe
            .expect_find_windows()
            .withf(|class| class == "UnrealWindow")
            .returning(|_| Ok(vec![window(4, 1280, 720), window(5, 2560, 1440)]));
        probe
            .expect_cursor_visible()
            .returning(|| Err(WindowProbeError::Unsupported));

        // Act
        let observation = Observation::take(&probe, "UnrealWindow");

        // Assert
        assert_eq!(observation.window.map(|w| w.handle), Some(5));
        assert_eq!(observation.cursor_visible, None);
    }

    #[test]
    fn test_lost_window_maps_nothing() {
        // Arrange
        let dispatcher = Arc::new(Dispatcher::new());
        let tracker = tracker(MockWindowProbe::new(), &dispatcher);

        // Act
        let acquired = tracker.apply(Observation::default());

        // Assert
        assert!(!acquired);
        assert!(!tracker.is_acquired());
        assert_eq!(tracker.device_to_game_abs(1200, 540), None);
    }

    #[test]
    fn test_found_window_maps_device_pixels() {
        let dispatcher = Arc::new(Dispatcher::new());
        let tracker = tracker(MockWindowProbe::new(), &dispatcher);

        tracker.apply(Observation {
            window: Some(WindowInfo {
                handle: 9,
                left: 100,
                top: 50,
                width: 1920,
                height: 1080,
            }),
            cursor_visible: Some(false),
        });

        assert!(tracker.is_acquired());
        assert_eq!(tracker.device_to_game_abs(1200, 540), Some((1060, 590)));
    }

    #[test]
    fn test_menu_mode_publishes_edges_only() {
        // Arrange
        let dispatcher = Arc::new(Dispatcher::new());
        let edges = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&edges);
        dispatcher.subscribe(Channel::MenuModeToggle, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let tracker = tracker(MockWindowProbe::new(), &dispatcher);
        let seen = |visible| Observation {
            window: Some(window(1, 1920, 1080)),
            cursor_visible: visible,
        };

        // Act
        tracker.apply(seen(Some(true)));
        tracker.apply(seen(Some(true)));
        tracker.apply(seen(None));
        tracker.apply(seen(Some(false)));

        // Assert
        assert_eq!(edges.load(Ordering::SeqCst), 2);
        assert!(!tracker.menu_mode());
    }

    #[test]
    fn test_foreground_is_delegated_to_probe() {
        let mut probe = MockWindowProbe::new();
        probe.expect_foreground_window().return_const(Some(0xABCu64));
        let dispatcher = Arc::new(Dispatcher::new());
        let tracker = tracker(probe, &dispatcher);

        assert_eq!(ForegroundProbe::foreground_window(&tracker), Some(0xABC));
    }

    #[tokio::test]
    async fn test_run_loop_acquires_and_stops() {
        // Arrange
        let mut probe = MockWindowProbe::new();
        probe
            .expect_find_windows()
            .returning(|_| Ok(vec![window(7, 1920, 1080)]));
        probe.expect_cursor_visible().returning(|| Ok(false));
        let dispatcher = Arc::new(Dispatcher::new());
        let tracker = Arc::new(tracker(probe, &dispatcher));
        let (stop_tx, stop_rx) = watch::channel(false);

        // Act
        let task = tokio::spawn(Arc::clone(&tracker).run(stop_rx));
        for _ in 0..100 {
            if tracker.is_acquired() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        stop_tx.send_replace(true);
        task.await.unwrap();

        // Assert
        assert_eq!(tracker.current().map(|w| w.handle), Some(7));
    }
}
