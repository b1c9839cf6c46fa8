//! Hot reload: re-read the configuration, then the layout, then tell every
//! interested component.
//!
//! The stores live in the infrastructure layer; this module only sees them
//! through [`ConfigSource`] and [`LayoutSource`].  A failed reload keeps the
//! previous snapshot in place, so the mappers never observe a missing or
//! half-built zone map.
//!
//! # Order matters
//!
//! The layout is normalised against `device_res` from the configuration, so
//! the configuration is reloaded first.  The joystick radii derived from the
//! new layout are then written back into the in-memory configuration, and
//! only after both swaps are `ConfigReload` and `LayoutReload` observed by
//! subscribers that need both snapshots.

use std::error::Error as StdError;
use std::sync::Arc;

use tracing::{info, warn};

use touchmap_core::mapping::JoystickTunables;
use touchmap_core::{Channel, ConfigSnapshot, LayoutSnapshot, MapperEvent};

use super::button_mapper::ButtonMapper;
use super::dispatcher::Dispatcher;
use super::mouse_mapper::{MouseMapper, MouseTunables};
use super::wasd_mapper::WasdMapper;

/// Boxed error returned by a snapshot source.
pub type SourceError = Box<dyn StdError + Send + Sync>;

/// Owner of the configuration snapshot.
pub trait ConfigSource: Send + Sync {
    fn current(&self) -> Arc<ConfigSnapshot>;

    /// Re-reads the file.  On error the previous snapshot stays current.
    fn reload(&self) -> Result<Arc<ConfigSnapshot>, SourceError>;

    /// Records the joystick radii derived from the active layout.
    fn set_derived(&self, mouse_wheel_radius: f64, sprint_distance: f64);
}

/// Owner of the layout snapshot.
pub trait LayoutSource: Send + Sync {
    fn current(&self) -> Arc<LayoutSnapshot>;

    /// Rebuilds the layout for `config`.  On error the previous snapshot
    /// stays current.
    fn reload(&self, config: &ConfigSnapshot) -> Result<Arc<LayoutSnapshot>, SourceError>;
}

/// What a reload achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadReport {
    pub config: bool,
    pub layout: bool,
}

pub struct ReloadCoordinator {
    config: Arc<dyn ConfigSource>,
    layout: Arc<dyn LayoutSource>,
    dispatcher: Arc<Dispatcher>,
}

impl ReloadCoordinator {
    pub fn new(
        config: Arc<dyn ConfigSource>,
        layout: Arc<dyn LayoutSource>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            config,
            layout,
            dispatcher,
        }
    }

    /// Reloads both snapshots and publishes what changed.
    pub fn reload_all(&self) -> ReloadReport {
        let config_ok = match self.config.reload() {
            Ok(_) => true,
            Err(e) => {
                warn!("config reload failed, keeping previous settings: {e}");
                false
            }
        };

        let config = self.config.current();
        let layout_ok = match self.layout.reload(&config) {
            Ok(layout) => {
                self.config
                    .set_derived(layout.inner_radius_px(), layout.outer_radius_px());
                true
            }
            Err(e) => {
                warn!("layout reload failed, keeping previous zones: {e}");
                false
            }
        };

        if config_ok {
            self.dispatcher.publish(MapperEvent::Config);
        }
        if layout_ok {
            self.dispatcher.publish(MapperEvent::Layout);
        }
        info!(
            "reload finished (config: {}, layout: {})",
            if config_ok { "ok" } else { "kept" },
            if layout_ok { "ok" } else { "kept" }
        );
        ReloadReport {
            config: config_ok,
            layout: layout_ok,
        }
    }
}

/// The mappers that react to broadcast channels.
pub struct MapperSet {
    pub mouse: Arc<MouseMapper>,
    pub wasd: Arc<WasdMapper>,
    pub buttons: Arc<ButtonMapper>,
}

/// Subscribes the mappers to every broadcast channel they care about.
///
/// Subscribers re-read the sources on each event, so a `ConfigReload`
/// arriving before `LayoutReload` still sees the latest layout.
pub fn subscribe_mappers(
    dispatcher: &Dispatcher,
    config: Arc<dyn ConfigSource>,
    layout: Arc<dyn LayoutSource>,
    mappers: &MapperSet,
) {
    {
        let mouse = Arc::clone(&mappers.mouse);
        let wasd = Arc::clone(&mappers.wasd);
        let config = Arc::clone(&config);
        let layout = Arc::clone(&layout);
        dispatcher.subscribe(Channel::ConfigReload, move |_| {
            let snapshot = config.current();
            mouse.update_tunables(MouseTunables::from_config(&snapshot));
            wasd.update_tunables(JoystickTunables::from_snapshots(&snapshot, &layout.current()));
            Ok(())
        });
    }
    {
        let wasd = Arc::clone(&mappers.wasd);
        let buttons = Arc::clone(&mappers.buttons);
        dispatcher.subscribe(Channel::LayoutReload, move |_| {
            let current = layout.current();
            buttons.set_layout(Arc::clone(&current));
            wasd.update_tunables(JoystickTunables::from_snapshots(&config.current(), &current));
            Ok(())
        });
    }
    {
        let mouse = Arc::clone(&mappers.mouse);
        dispatcher.subscribe(Channel::MenuModeToggle, move |event| match event {
            MapperEvent::MenuMode { visible } => {
                mouse.set_menu_mode(*visible);
                Ok(())
            }
            other => Err(format!("unexpected event {other:?}")),
        });
    }
    {
        let wasd = Arc::clone(&mappers.wasd);
        dispatcher.subscribe(Channel::WasdBlock, move |event| match event {
            MapperEvent::WasdBlock { blocked } => {
                wasd.set_blocked(*blocked);
                Ok(())
            }
            other => Err(format!("unexpected event {other:?}")),
        });
    }
    dispatcher.subscribe(Channel::NetworkLag, |event| {
        if let MapperEvent::Network { n, avg_dt } = event {
            warn!("input bridge lagging: {n} commands rejected, {:.1} ms average wait", avg_dt * 1000.0);
        }
        Ok(())
    });
}
