//! Event dispatcher: the only collaborator shared by every component.
//!
//! Components never hold references to each other.  Stores, the window
//! tracker and the input bridge *publish* events on named channels; mappers
//! and the supervisor *subscribe*.  Callbacks run synchronously on the
//! publishing thread, in subscription order.
//!
//! # Two paths
//!
//! - **Broadcast channels** (`ConfigReload`, `LayoutReload`, `WasdBlock`,
//!   `MenuModeToggle`, `NetworkLag`) are rare.  They go through a registry
//!   behind an `RwLock`; a failing or panicking subscriber is logged and the
//!   remaining subscribers still run.
//! - **Touch events** arrive hundreds of times per second.  They use a fixed
//!   route table installed once at startup (`OnceLock`), so the hot path
//!   takes no lock and does no lookup.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::{error, warn};

use touchmap_core::{Channel, MapperEvent, TouchAction, TouchEvent};

/// A broadcast subscriber.  Returning `Err` logs the message.
pub type Subscriber = Arc<dyn Fn(&MapperEvent) -> Result<(), String> + Send + Sync>;

/// Receiver of touch events on the direct path.
pub trait TouchHandler: Send + Sync {
    fn on_touch(&self, action: TouchAction, touch: &TouchEvent);
}

/// Fixed destinations for touch events.
#[derive(Clone)]
pub struct TouchRoutes {
    /// Sees every touch; decides on its own which ones hit a HUD button.
    pub buttons: Arc<dyn TouchHandler>,
    /// Receives touches flagged `is_mouse`.
    pub mouse: Arc<dyn TouchHandler>,
    /// Receives touches flagged `is_wasd`.
    pub wasd: Arc<dyn TouchHandler>,
}

#[derive(Default)]
pub struct Dispatcher {
    subscribers: RwLock<HashMap<Channel, Vec<Subscriber>>>,
    routes: OnceLock<TouchRoutes>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` on `channel`.
    pub fn subscribe<F>(&self, channel: Channel, callback: F)
    where
        F: Fn(&MapperEvent) -> Result<(), String> + Send + Sync + 'static,
    {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(channel)
            .or_default()
            .push(Arc::new(callback));
    }

    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&channel)
            .map_or(0, Vec::len)
    }

    /// Installs the touch route table.  Returns `false` if one was already
    /// installed; routes are fixed for the life of the process.
    pub fn set_touch_routes(&self, routes: TouchRoutes) -> bool {
        self.routes.set(routes).is_ok()
    }

    /// Delivers `event` to its channel's subscribers.
    ///
    /// Touch events are forwarded to [`Dispatcher::dispatch_touch`].  Returns
    /// how many subscribers handled the event successfully.
    pub fn publish(&self, event: MapperEvent) -> usize {
        let channel = match event.channel() {
            Some(channel) => channel,
            None => {
                if let MapperEvent::Touch { action, touch } = event {
                    self.dispatch_touch(action, &touch);
                }
                return 0;
            }
        };

        // Clone the list so callbacks may publish or subscribe without
        // re-entering the registry lock.
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&channel)
            .cloned()
            .unwrap_or_default();

        let mut delivered = 0;
        for subscriber in &subscribers {
            match catch_unwind(AssertUnwindSafe(|| subscriber(&event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(message)) => warn!("{channel:?} subscriber failed: {message}"),
                Err(_) => error!("{channel:?} subscriber panicked; continuing"),
            }
        }
        delivered
    }

    /// Direct path for touch events.
    pub fn dispatch_touch(&self, action: TouchAction, touch: &TouchEvent) {
        let Some(routes) = self.routes.get() else {
            return;
        };
        routes.buttons.on_touch(action, touch);
        if touch.is_mouse {
            routes.mouse.on_touch(action, touch);
        }
        if touch.is_wasd {
            routes.wasd.on_touch(action, touch);
        }
    }
}
