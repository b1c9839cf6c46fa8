//! Startup wiring.
//!
//! Builds every long-lived service in the order the runtime needs them:
//!
//! ```text
//! load_stores()      config.toml, then the layout it names
//! assemble()
//!  ├─ Dispatcher
//!  ├─ InputBridge        (worker thread "input-bridge", owns the driver)
//!  ├─ WindowTracker
//!  ├─ Mouse / WASD / Button mappers + channel subscriptions + touch routes
//!  └─ Supervisor         (captures the launch window for hotkeys)
//! ```
//!
//! Device discovery and the async tasks are started by `main.rs`; keeping
//! them out of here lets the integration tests assemble a full pipeline
//! with a recording driver and a fake window probe.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use touchmap_core::mapping::JoystickTunables;
use touchmap_core::{Channel, LayoutError};

use crate::application::button_mapper::ButtonMapper;
use crate::application::dispatcher::{Dispatcher, TouchRoutes};
use crate::application::lifecycle::Supervisor;
use crate::application::mouse_mapper::{MouseMapper, MouseTunables};
use crate::application::reload::{subscribe_mappers, MapperSet, ReloadCoordinator};
use crate::application::wasd_mapper::WasdMapper;
use crate::infrastructure::bridge::{BridgeConfig, BridgeError, InputBridge};
use crate::infrastructure::device::DeviceError;
use crate::infrastructure::hotkeys::HotkeyError;
use crate::infrastructure::input_driver::InputDriver;
use crate::infrastructure::storage::config::{ConfigError, ConfigStore};
use crate::infrastructure::storage::layout::LayoutStore;
use crate::infrastructure::window::{WindowProbe, WindowTracker};

/// A failure that stops touchmap before it starts mapping.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("layout: {0}")]
    Layout(#[from] LayoutError),

    #[error("device: {0}")]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("hotkeys: {0}")]
    Hotkeys(#[from] HotkeyError),

    #[error("failed to spawn {name}: {source}")]
    Thread {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("touchmap only drives host input on Windows")]
    UnsupportedPlatform,
}

/// Loads the configuration (writing defaults on first run), then the layout
/// it names, and records the layout's joystick radii in the configuration.
pub fn load_stores(config_path: &Path) -> Result<(Arc<ConfigStore>, Arc<LayoutStore>), StartupError> {
    let config = ConfigStore::load_or_create(config_path)?;
    let layout = LayoutStore::load(&config.current(), config.base_dir())?;
    let snapshot = layout.current();
    config.set_derived(snapshot.inner_radius_px(), snapshot.outer_radius_px());
    debug!(
        "layout has {} zones, joystick radii {:.1}/{:.1} px",
        snapshot.len(),
        snapshot.inner_radius_px(),
        snapshot.outer_radius_px()
    );
    Ok((Arc::new(config), Arc::new(layout)))
}

/// Every service the runtime holds on to.
pub struct Services {
    pub config: Arc<ConfigStore>,
    pub layout: Arc<LayoutStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub bridge: Arc<InputBridge>,
    pub window: Arc<WindowTracker>,
    pub mappers: MapperSet,
    pub reloader: Arc<ReloadCoordinator>,
    pub supervisor: Arc<Supervisor>,
}

/// Wires the dispatcher, bridge, window tracker, mappers and supervisor.
pub fn assemble<D>(
    config: Arc<ConfigStore>,
    layout: Arc<LayoutStore>,
    driver: D,
    window_probe: Arc<dyn WindowProbe>,
    bridge_config: BridgeConfig,
) -> Result<Services, StartupError>
where
    D: InputDriver + 'static,
{
    let dispatcher = Arc::new(Dispatcher::new());
    let snapshot = config.current();

    let bridge = Arc::new(InputBridge::start(driver, bridge_config, Arc::downgrade(&dispatcher))?);

    let window = Arc::new(WindowTracker::new(
        window_probe,
        snapshot.system.window_class.clone(),
        snapshot.device_res(),
        Arc::downgrade(&dispatcher),
    ));
    {
        let window = Arc::clone(&window);
        let config = Arc::clone(&config);
        dispatcher.subscribe(Channel::ConfigReload, move |_| {
            window.set_device_res(config.current().device_res());
            Ok(())
        });
    }

    let mappers = MapperSet {
        mouse: Arc::new(MouseMapper::new(
            bridge.clone(),
            window.clone(),
            MouseTunables::from_config(&snapshot),
        )),
        wasd: Arc::new(WasdMapper::new(
            bridge.clone(),
            JoystickTunables::from_snapshots(&snapshot, &layout.current()),
        )),
        buttons: Arc::new(ButtonMapper::new(
            bridge.clone(),
            Arc::downgrade(&dispatcher),
            layout.current(),
        )),
    };
    subscribe_mappers(&dispatcher, config.clone(), layout.clone(), &mappers);
    dispatcher.set_touch_routes(TouchRoutes {
        buttons: mappers.buttons.clone(),
        mouse: mappers.mouse.clone(),
        wasd: mappers.wasd.clone(),
    });

    let reloader = Arc::new(ReloadCoordinator::new(
        config.clone(),
        layout.clone(),
        Arc::clone(&dispatcher),
    ));
    let supervisor = Arc::new(Supervisor::new(
        window.clone(),
        bridge.clone(),
        Arc::clone(&reloader),
        snapshot.reload_debounce(),
    ));

    Ok(Services {
        config,
        layout,
        dispatcher,
        bridge,
        window,
        mappers,
        reloader,
        supervisor,
    })
}
