//! Input bridge: the bounded queue between the mappers and the host driver.
//!
//! # Why a queue? (for beginners)
//!
//! Mappers run on the touch reader's task and must never stall on an OS
//! input call.  They hand an [`InjectCommand`] to the bridge instead; a
//! dedicated high-priority thread (the worker, see [`worker`]) drains the
//! queue, merges bursts of relative motion and paces driver calls.
//!
//! # Back-pressure
//!
//! The queue holds 128 commands.  When it is full:
//!
//! - a relative move is dropped on the spot (the camera loses a few pixels,
//!   nothing gets stuck);
//! - a key or button waits a short time for room, and if none appears the
//!   submit fails with [`SinkError::Overloaded`] and a `NetworkLag` event
//!   carrying running overload statistics is published.

mod worker;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, SendTimeoutError, Sender, TrySendError};
use thiserror::Error;
use tracing::{error, info, trace, warn};

use touchmap_core::{CommandSink, InjectCommand, MapperEvent, SinkError};

use crate::application::dispatcher::Dispatcher;
use crate::application::lifecycle::InjectionControl;
use crate::infrastructure::input_driver::InputDriver;
use crate::infrastructure::platform;

use worker::{BridgeMsg, Worker};

/// How long shutdown-path messages may wait for queue space.
const CONTROL_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to spawn the input bridge worker: {0}")]
    Spawn(#[source] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub capacity: usize,
    /// Driver calls per second; `0` disables pacing.
    pub pps: f64,
    /// How long a key or button submit may block on a full queue.
    pub enqueue_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            capacity: 128,
            pps: 1000.0,
            enqueue_timeout: Duration::from_millis(20),
        }
    }
}

impl BridgeConfig {
    fn pace(&self) -> Duration {
        if self.pps.is_finite() && self.pps > 0.0 {
            Duration::from_secs_f64(1.0 / self.pps)
        } else {
            Duration::ZERO
        }
    }
}

pub struct InputBridge {
    tx: Sender<BridgeMsg>,
    enqueue_timeout: Duration,
    stopped: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
    overloads: AtomicU64,
    blocked_ns: AtomicU64,
    dropped_moves: AtomicU64,
    publisher: Weak<Dispatcher>,
}

impl InputBridge {
    /// Spawns the worker thread that owns `driver`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Spawn`] if the OS refuses a new thread.
    pub fn start<D>(
        driver: D,
        config: BridgeConfig,
        publisher: Weak<Dispatcher>,
    ) -> Result<Self, BridgeError>
    where
        D: InputDriver + 'static,
    {
        let (tx, rx) = bounded(config.capacity.max(1));
        let worker = Worker::new(driver, rx, config.pace());
        let handle = thread::Builder::new()
            .name("input-bridge".into())
            .spawn(move || {
                platform::raise_current_thread_priority();
                worker.run();
            })
            .map_err(BridgeError::Spawn)?;

        info!(
            "input bridge started (queue {}, {} calls/s)",
            config.capacity, config.pps
        );
        Ok(Self {
            tx,
            enqueue_timeout: config.enqueue_timeout,
            stopped: AtomicBool::new(false),
            worker: Mutex::new(Some(handle)),
            overloads: AtomicU64::new(0),
            blocked_ns: AtomicU64::new(0),
            dropped_moves: AtomicU64::new(0),
            publisher,
        })
    }

    /// Relative moves discarded because the queue was full.
    pub fn dropped_moves(&self) -> u64 {
        self.dropped_moves.load(Ordering::Relaxed)
    }

    /// Key and button submits that timed out.
    pub fn overload_count(&self) -> u64 {
        self.overloads.load(Ordering::Relaxed)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    fn record_overload(&self, waited: Duration) {
        let waited_ns = u64::try_from(waited.as_nanos()).unwrap_or(u64::MAX);
        let n = self.overloads.fetch_add(1, Ordering::Relaxed) + 1;
        let total = self.blocked_ns.fetch_add(waited_ns, Ordering::Relaxed) + waited_ns;
        let avg_dt = total as f64 / n as f64 / 1e9;
        warn!("input bridge overloaded ({n} so far)");
        if let Some(dispatcher) = self.publisher.upgrade() {
            dispatcher.publish(MapperEvent::Network { n, avg_dt });
        }
    }
}

impl CommandSink for InputBridge {
    fn submit(&self, command: InjectCommand) -> Result<(), SinkError> {
        if self.is_stopped() {
            return Err(SinkError::Stopped);
        }

        if command.is_droppable() {
            return match self.tx.try_send(BridgeMsg::Inject(command)) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => {
                    self.dropped_moves.fetch_add(1, Ordering::Relaxed);
                    trace!("queue full, dropped {command:?}");
                    Ok(())
                }
                Err(TrySendError::Disconnected(_)) => Err(SinkError::Stopped),
            };
        }

        let started = Instant::now();
        match self
            .tx
            .send_timeout(BridgeMsg::Inject(command), self.enqueue_timeout)
        {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => {
                self.record_overload(started.elapsed());
                Err(SinkError::Overloaded)
            }
            Err(SendTimeoutError::Disconnected(_)) => Err(SinkError::Stopped),
        }
    }
}

impl InjectionControl for InputBridge {
    fn release_all(&self) {
        if self.is_stopped() {
            return;
        }
        let (ack_tx, ack_rx) = bounded(1);
        if self
            .tx
            .send_timeout(BridgeMsg::ReleaseAll(ack_tx), CONTROL_TIMEOUT)
            .is_err()
        {
            warn!("could not queue release-all; held inputs are released on stop");
            return;
        }
        if ack_rx.recv_timeout(CONTROL_TIMEOUT).is_err() {
            warn!("input bridge did not confirm release-all in time");
        }
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.tx.send_timeout(BridgeMsg::Stop, CONTROL_TIMEOUT).is_err() {
            warn!("could not queue stop for the input bridge");
        }
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("input bridge worker panicked");
            }
        }
        info!("input bridge stopped");
    }
}

impl Drop for InputBridge {
    fn drop(&mut self) {
        InjectionControl::stop(self);
    }
}
