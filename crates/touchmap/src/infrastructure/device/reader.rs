//! Touch reader: device stream → touch tracker → dispatcher.
//!
//! The reader runs as one tokio task.  Each line is fed to the
//! [`TouchTracker`]; events completed by a `SYN_REPORT` go straight to the
//! dispatcher's touch path, in order.
//!
//! # Failure and shutdown
//!
//! If the stream ends or fails, the reader logs it, dispatches an UP for
//! every finger still on the glass, waits one second and launches a new
//! one.  The new stream starts from a fresh tracker, so no finger from the
//! dead stream keeps the mouse or joystick role.  Shutdown drops the stream,
//! which kills the `adb` child; no synthetic UP events are produced there,
//! since the supervisor releases everything through the bridge.
//!
//! Rotation is polled by a separate low-frequency task and handed over
//! through an `AtomicU8`, so the hot loop never waits on `adb`.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use touchmap_core::{Rotation, TouchAction, TouchEvent, TouchTracker};

use super::{RotationProbe, StreamLauncher};
use crate::application::dispatcher::Dispatcher;

pub const RESPAWN_DELAY: Duration = Duration::from_secs(1);
pub const ROTATION_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct TouchReader {
    tracker: TouchTracker,
    dispatcher: Arc<Dispatcher>,
    rotation: Arc<AtomicU8>,
    respawn_delay: Duration,
    epoch: Instant,
    events: Vec<(TouchAction, TouchEvent)>,
}

impl TouchReader {
    pub fn new(tracker: TouchTracker, dispatcher: Arc<Dispatcher>, rotation: Arc<AtomicU8>) -> Self {
        Self {
            tracker,
            dispatcher,
            rotation,
            respawn_delay: RESPAWN_DELAY,
            epoch: Instant::now(),
            events: Vec::with_capacity(8),
        }
    }

    pub fn with_respawn_delay(mut self, delay: Duration) -> Self {
        self.respawn_delay = delay;
        self
    }

    /// Reads until `shutdown` flips to `true`.
    pub async fn run(mut self, launcher: Arc<dyn StreamLauncher>, mut shutdown: watch::Receiver<bool>) {
        loop {
            let launched = tokio::select! {
                result = launcher.launch() => result,
                _ = shutdown_requested(&mut shutdown) => break,
            };

            match launched {
                Ok(mut stream) => {
                    info!("touch stream started");
                    loop {
                        let line = tokio::select! {
                            line = stream.next_line() => line,
                            _ = shutdown_requested(&mut shutdown) => return,
                        };
                        match line {
                            Ok(Some(line)) => self.on_line(&line),
                            Ok(None) => {
                                warn!("touch stream ended; restarting in {:?}", self.respawn_delay);
                                break;
                            }
                            Err(e) => {
                                warn!("touch stream failed: {e}; restarting in {:?}", self.respawn_delay);
                                break;
                            }
                        }
                    }
                    self.close_open_touches();
                }
                Err(e) => warn!("could not start touch stream: {e}; retrying in {:?}", self.respawn_delay),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.respawn_delay) => {}
                _ = shutdown_requested(&mut shutdown) => break,
            }
        }
        debug!("touch reader stopped");
    }

    fn close_open_touches(&mut self) {
        self.events.clear();
        self.tracker.reset(&mut self.events);
        for (action, touch) in &self.events {
            self.dispatcher.dispatch_touch(*action, touch);
        }
    }

    fn on_line(&mut self, line: &str) {
        let rotation = Rotation::from_index(self.rotation.load(Ordering::Relaxed));
        self.tracker.set_rotation(rotation);

        let now_ns = u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.events.clear();
        self.tracker.feed_line(line, now_ns, &mut self.events);
        for (action, touch) in &self.events {
            self.dispatcher.dispatch_touch(*action, touch);
        }
    }
}

/// Keeps `rotation` in sync with the device until shutdown.
pub async fn poll_rotation(
    probe: Arc<dyn RotationProbe>,
    rotation: Arc<AtomicU8>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        match probe.rotation().await {
            Ok(current) => {
                let previous = rotation.swap(current.index(), Ordering::Relaxed);
                if previous != current.index() {
                    info!("display rotation is now {}°", current.index() as u32 * 90);
                }
            }
            Err(e) => debug!("rotation poll failed: {e}"),
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown_requested(&mut shutdown) => break,
        }
    }
}

/// Resolves once shutdown is signalled or the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatcher::{TouchHandler, TouchRoutes};
    use crate::infrastructure::device::mock::{FixedRotation, ScriptedLauncher, Session, SessionEnd};
    use std::sync::Mutex;
    use touchmap_core::TrackerConfig;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(TouchAction, i32, i32, i32)>>,
    }

    impl TouchHandler for Recorder {
        fn on_touch(&self, action: TouchAction, touch: &TouchEvent) {
            self.seen
                .lock()
                .unwrap()
                .push((action, touch.tracking_id, touch.x, touch.y));
        }
    }

    fn tap(id: u32, x: u32, y: u32) -> Vec<String> {
        vec![
            "EV_ABS       ABS_MT_SLOT          00000000".to_string(),
            format!("EV_ABS       ABS_MT_TRACKING_ID   {id:08x}"),
            format!("EV_ABS       ABS_MT_POSITION_X    {x:08x}"),
            format!("EV_ABS       ABS_MT_POSITION_Y    {y:08x}"),
            "EV_SYN       SYN_REPORT           00000000".to_string(),
            "EV_ABS       ABS_MT_TRACKING_ID   ffffffff".to_string(),
            "EV_SYN       SYN_REPORT           00000000".to_string(),
        ]
    }

    fn finger(slot: u32, id: u32, x: u32, y: u32) -> Vec<String> {
        vec![
            format!("EV_ABS       ABS_MT_SLOT          {slot:08x}"),
            format!("EV_ABS       ABS_MT_TRACKING_ID   {id:08x}"),
            format!("EV_ABS       ABS_MT_POSITION_X    {x:08x}"),
            format!("EV_ABS       ABS_MT_POSITION_Y    {y:08x}"),
            "EV_SYN       SYN_REPORT           00000000".to_string(),
        ]
    }

    fn reader(rotation: Rotation) -> (TouchReader, Arc<Recorder>, Arc<AtomicU8>) {
        let (reader, recorder, _, cell) = reader_with_wasd(rotation);
        (reader, recorder, cell)
    }

    fn reader_with_wasd(rotation: Rotation) -> (TouchReader, Arc<Recorder>, Arc<Recorder>, Arc<AtomicU8>) {
        let dispatcher = Arc::new(Dispatcher::new());
        let recorder = Arc::new(Recorder::default());
        let wasd = Arc::new(Recorder::default());
        dispatcher.set_touch_routes(TouchRoutes {
            buttons: recorder.clone(),
            mouse: Arc::new(Recorder::default()),
            wasd: wasd.clone(),
        });
        let cell = Arc::new(AtomicU8::new(rotation.index()));
        let tracker = TouchTracker::new(TrackerConfig {
            rate_cap_hz: 0.0,
            ..TrackerConfig::default()
        });
        let reader = TouchReader::new(tracker, dispatcher, Arc::clone(&cell))
            .with_respawn_delay(Duration::from_millis(10));
        (reader, recorder, wasd, cell)
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        for _ in 0..200 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_stream_is_respawned_after_failure() {
        // Arrange
        let (reader, recorder, _) = reader(Rotation::Rot0);
        let launcher = Arc::new(ScriptedLauncher::new([
            Session::new(tap(1, 100, 200), SessionEnd::Error),
            Session::new(tap(2, 300, 400), SessionEnd::Eof),
        ]));
        let (stop_tx, stop_rx) = watch::channel(false);

        // Act
        let task = tokio::spawn(reader.run(launcher.clone(), stop_rx));
        wait_until(|| recorder.seen.lock().unwrap().len() >= 4 && launcher.launches() >= 3).await;
        stop_tx.send_replace(true);
        task.await.unwrap();

        // Assert
        assert!(launcher.launches() >= 3);
        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![
                (TouchAction::Down, 1, 100, 200),
                (TouchAction::Up, 1, 100, 200),
                (TouchAction::Down, 2, 300, 400),
                (TouchAction::Up, 2, 300, 400),
            ]
        );
    }

    #[tokio::test]
    async fn test_restart_mid_touch_releases_stale_finger() {
        // Arrange: natural 1080x2400 at Rot0, so x < 540 is the joystick side.
        let (reader, _, wasd, _) = reader_with_wasd(Rotation::Rot0);
        let mut second = finger(0, 2, 200, 1500);
        second.extend([
            "EV_ABS       ABS_MT_POSITION_Y    000005c8".to_string(),
            "EV_SYN       SYN_REPORT           00000000".to_string(),
            "EV_ABS       ABS_MT_TRACKING_ID   ffffffff".to_string(),
            "EV_SYN       SYN_REPORT           00000000".to_string(),
        ]);
        let launcher = Arc::new(ScriptedLauncher::new([
            Session::new(finger(1, 1, 100, 1500), SessionEnd::Error),
            Session::new(second, SessionEnd::Eof),
        ]));
        let (stop_tx, stop_rx) = watch::channel(false);

        // Act
        let task = tokio::spawn(reader.run(launcher.clone(), stop_rx));
        wait_until(|| wasd.seen.lock().unwrap().len() >= 5).await;
        stop_tx.send_replace(true);
        task.await.unwrap();

        // Assert
        let seen: Vec<(TouchAction, i32)> = wasd.seen.lock().unwrap().iter().map(|e| (e.0, e.1)).collect();
        assert_eq!(
            seen,
            vec![
                (TouchAction::Down, 1),
                (TouchAction::Up, 1),
                (TouchAction::Down, 2),
                (TouchAction::Pressed, 2),
                (TouchAction::Up, 2),
            ]
        );
    }

    #[tokio::test]
    async fn test_shutdown_stops_a_silent_stream() {
        let (reader, recorder, _) = reader(Rotation::Rot0);
        let launcher = Arc::new(ScriptedLauncher::new([]));
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(reader.run(launcher.clone(), stop_rx));
        wait_until(|| launcher.launches() == 1).await;
        stop_tx.send_replace(true);
        let finished = tokio::time::timeout(Duration::from_secs(1), task).await;

        assert!(finished.is_ok());
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rotation_cell_is_applied_to_coordinates() {
        // Arrange: natural 1080x2400, rotated 90°: (x, y) -> (y, w - x).
        let (reader, recorder, _) = reader(Rotation::Rot90);
        let launcher = Arc::new(ScriptedLauncher::new([Session::new(
            tap(5, 100, 200),
            SessionEnd::Eof,
        )]));
        let (stop_tx, stop_rx) = watch::channel(false);

        // Act
        let task = tokio::spawn(reader.run(launcher, stop_rx));
        wait_until(|| recorder.seen.lock().unwrap().len() >= 2).await;
        stop_tx.send_replace(true);
        task.await.unwrap();

        // Assert
        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen[0], (TouchAction::Down, 5, 200, 980));
    }

    #[tokio::test]
    async fn test_rotation_poller_updates_cell() {
        let cell = Arc::new(AtomicU8::new(0));
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(poll_rotation(
            Arc::new(FixedRotation(Rotation::Rot270)),
            Arc::clone(&cell),
            Duration::from_millis(10),
            stop_rx,
        ));
        wait_until(|| cell.load(Ordering::Relaxed) == 3).await;
        stop_tx.send_replace(true);
        task.await.unwrap();

        assert_eq!(cell.load(Ordering::Relaxed), 3);
    }
}
