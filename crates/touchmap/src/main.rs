//! touchmap entry point.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ run()
//!       ├─ load_stores()          config.toml + layout JSON
//!       ├─ AdbClient              discover, probe, resolution check
//!       ├─ assemble()             dispatcher, bridge, window tracker, mappers
//!       ├─ hotkey hook + handler  (std threads)
//!       └─ tokio tasks
//!            ├─ TouchReader       getevent stream -> tracker -> mappers
//!            ├─ poll_rotation     dumpsys display every 2 s
//!            ├─ WindowTracker     game window + cursor visibility
//!            └─ Ctrl-C            same shutdown as Esc
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicU8;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use touchmap::infrastructure::bridge::BridgeConfig;
use touchmap::infrastructure::device::adb::AdbClient;
use touchmap::infrastructure::device::check_resolution;
use touchmap::infrastructure::device::reader::{poll_rotation, TouchReader, ROTATION_POLL_INTERVAL};
use touchmap::infrastructure::hotkeys::{self, HotkeySource};
use touchmap::infrastructure::startup::{self, StartupError};
use touchmap::infrastructure::storage::resolve_relative;
use touchmap::infrastructure::{logging, platform};
use touchmap_core::{TouchTracker, TrackerConfig};

/// Turns an Android phone's touch screen into keyboard and mouse input.
#[derive(Debug, Parser)]
#[command(name = "touchmap", version, about)]
struct Args {
    /// Maximum rate of finger-move events per second (0 = unlimited).
    #[arg(default_value_t = 250.0)]
    rate_cap_hz: f64,

    /// Maximum host input calls per second (0 = unpaced).
    #[arg(default_value_t = 1000.0)]
    pps: f64,

    /// Configuration file; created with defaults if missing.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    platform::raise_process_priority();
    let (driver, window_probe, hotkey_source) = native::platform()?;

    let (config, layout) = startup::load_stores(&args.config)?;
    let snapshot = config.current();

    // ── Device ────────────────────────────────────────────────────────────────
    let adb = AdbClient::discover(&snapshot.system.adb_path, snapshot.system.device_serial.as_deref())
        .await
        .map_err(StartupError::from)?;
    let device = adb.probe().await.map_err(StartupError::from)?;
    check_resolution(device.natural_res, snapshot.device_res()).map_err(StartupError::from)?;
    if (f64::from(device.dpi) - snapshot.system.device_dpi).abs() > f64::EPSILON {
        warn!(
            "device reports {} dpi but device_dpi is {}; mouse speed follows the config",
            device.dpi, snapshot.system.device_dpi
        );
    }

    let hud_image = resolve_relative(&config.base_dir(), &snapshot.system.hud_image_path);
    if !hud_image.exists() {
        warn!("HUD image {} not found", hud_image.display());
    }

    // ── Services ──────────────────────────────────────────────────────────────
    let services = startup::assemble(
        config,
        layout,
        driver,
        window_probe,
        BridgeConfig {
            pps: args.pps,
            ..BridgeConfig::default()
        },
    )?;
    let supervisor = Arc::clone(&services.supervisor);

    match hotkey_source.start() {
        Ok(keys) => {
            hotkeys::spawn_handler(keys, Arc::clone(&supervisor)).map_err(|source| StartupError::Thread {
                name: "hotkey-handler",
                source,
            })?;
        }
        Err(e) => warn!("{e}; use Ctrl-C to quit"),
    }

    // ── Tasks ─────────────────────────────────────────────────────────────────
    let rotation = Arc::new(AtomicU8::new(device.rotation.index()));
    let tracker = TouchTracker::new(TrackerConfig {
        rate_cap_hz: args.rate_cap_hz,
        natural_res: device.natural_res,
        raw_max: (device.node.max_x, device.node.max_y),
    });
    let reader = TouchReader::new(tracker, Arc::clone(&services.dispatcher), Arc::clone(&rotation));
    let launcher = Arc::new(adb.launcher(&device.node.path));
    let reader_task = tokio::spawn(reader.run(launcher, supervisor.shutdown_signal()));

    tokio::spawn(poll_rotation(
        Arc::new(adb.clone()),
        rotation,
        ROTATION_POLL_INTERVAL,
        supervisor.shutdown_signal(),
    ));
    tokio::spawn(Arc::clone(&services.window).run(supervisor.shutdown_signal()));
    {
        let supervisor = Arc::clone(&supervisor);
        let mut shutdown = supervisor.shutdown_signal();
        tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if result.is_ok() {
                        supervisor.request_shutdown("Ctrl-C");
                    }
                }
                _ = shutdown.wait_for(|stop| *stop) => {}
            }
        });
    }

    let (width, height) = snapshot.device_res();
    info!(
        "touchmap ready: device {} ({}x{}, {} dpi), rate cap {} Hz, layout {}x{}. Esc quits, F5 reloads",
        device.serial, device.natural_res.0, device.natural_res.1, device.dpi, args.rate_cap_hz, width, height
    );

    // ── Shutdown ──────────────────────────────────────────────────────────────
    if let Err(e) = reader_task.await {
        warn!("touch reader task failed: {e}");
    }
    supervisor.finish();
    hotkey_source.stop();
    info!("Goodbye");
    Ok(())
}

#[cfg(target_os = "windows")]
mod native {
    use std::sync::Arc;

    use touchmap::infrastructure::hotkeys::windows::WindowsHotkeys;
    use touchmap::infrastructure::hotkeys::HotkeySource;
    use touchmap::infrastructure::input_driver::windows::WindowsInputDriver;
    use touchmap::infrastructure::startup::StartupError;
    use touchmap::infrastructure::window::windows::WindowsWindowProbe;
    use touchmap::infrastructure::window::WindowProbe;

    pub fn platform(
    ) -> Result<(WindowsInputDriver, Arc<dyn WindowProbe>, Box<dyn HotkeySource>), StartupError> {
        Ok((
            WindowsInputDriver::new(),
            Arc::new(WindowsWindowProbe::new()),
            Box::new(WindowsHotkeys::new()),
        ))
    }
}

#[cfg(not(target_os = "windows"))]
mod native {
    use std::sync::Arc;

    use touchmap::infrastructure::hotkeys::HotkeySource;
    use touchmap::infrastructure::input_driver::mock::RecordingDriver;
    use touchmap::infrastructure::startup::StartupError;
    use touchmap::infrastructure::window::WindowProbe;

    pub fn platform(
    ) -> Result<(RecordingDriver, Arc<dyn WindowProbe>, Box<dyn HotkeySource>), StartupError> {
        Err(StartupError::UnsupportedPlatform)
    }
}
