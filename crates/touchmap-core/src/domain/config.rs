//! Typed configuration snapshot.
//!
//! The on-disk format (TOML) and the file handling live in the host crate;
//! this module only defines the schema, the defaults and the validation
//! rules, so the mappers can be tested without touching the file system.
//!
//! ```toml
//! [system]
//! hud_image_path = "hud.png"
//! json_path = "layout.json"
//! device_res = [2400, 1080]
//! device_dpi = 160.0
//!
//! [mouse]
//! sensitivity = 1.0
//! invert_y = false
//!
//! [joystick]
//! deadzone = 0.2
//! hysteresis = 5.0
//! ```
//!
//! Every field has a `#[serde(default = ...)]` helper so a partial file (or
//! one written by an older release) still loads.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reference DPI for mouse sensitivity.  A device at this density moves the
/// host cursor one pixel per device pixel at `sensitivity = 1.0`.
pub const DEF_DPI: f64 = 160.0;

/// A configuration value outside its legal range.
#[derive(Debug, Error, PartialEq)]
#[error("invalid config value {field}: {reason}")]
pub struct InvalidConfig {
    pub field: &'static str,
    pub reason: &'static str,
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Immutable set of tunables shared by every component.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigSnapshot {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub mouse: MouseConfig,
    #[serde(default)]
    pub joystick: JoystickConfig,
    #[serde(default)]
    pub hotkeys: HotkeyConfig,
}

/// Device and host environment settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemConfig {
    /// Screenshot of the HUD shown on the phone.
    #[serde(default = "default_hud_image_path")]
    pub hud_image_path: PathBuf,
    /// Layout JSON exported by the HUD authoring tool.
    #[serde(default = "default_json_path")]
    pub json_path: PathBuf,
    /// Device resolution `[width, height]` in the orientation the HUD uses.
    #[serde(default = "default_device_res")]
    pub device_res: [u32; 2],
    /// Device pixel density, used to normalise mouse sensitivity.
    #[serde(default = "default_device_dpi")]
    pub device_dpi: f64,
    /// Window class of the host game window.
    #[serde(default = "default_window_class")]
    pub window_class: String,
    /// `adb` executable.
    #[serde(default = "default_adb_path")]
    pub adb_path: String,
    /// Serial of the device to use when several are attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_serial: Option<String>,
}

/// Camera (mouse) tunables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MouseConfig {
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f64,
    #[serde(default)]
    pub invert_y: bool,
    /// Two taps closer than this become a right click in menu mode.
    #[serde(default = "default_double_tap_ms")]
    pub double_tap_ms: u64,
}

/// Floating joystick tunables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoystickConfig {
    /// Fraction of the wheel radius that produces no movement, in `[0, 1)`.
    #[serde(default = "default_deadzone")]
    pub deadzone: f64,
    /// Sector boundary widening in degrees.
    #[serde(default = "default_hysteresis")]
    pub hysteresis: f64,
    /// Derived from the layout's `MOUSE_WHEEL` marker on every load.
    #[serde(default)]
    pub mouse_wheel_radius: f64,
    /// Derived from the layout's `SPRINT_DISTANCE` marker on every load.
    #[serde(default)]
    pub sprint_distance: f64,
}

/// Hotkey behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HotkeyConfig {
    #[serde(default = "default_reload_debounce_ms")]
    pub reload_debounce_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_hud_image_path() -> PathBuf {
    PathBuf::from("hud.png")
}
fn default_json_path() -> PathBuf {
    PathBuf::from("layout.json")
}
fn default_device_res() -> [u32; 2] {
    [2400, 1080]
}
fn default_device_dpi() -> f64 {
    DEF_DPI
}
fn default_window_class() -> String {
    "UnrealWindow".to_string()
}
fn default_adb_path() -> String {
    "adb".to_string()
}
fn default_sensitivity() -> f64 {
    1.0
}
fn default_double_tap_ms() -> u64 {
    250
}
fn default_deadzone() -> f64 {
    0.2
}
fn default_hysteresis() -> f64 {
    5.0
}
fn default_reload_debounce_ms() -> u64 {
    500
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            hud_image_path: default_hud_image_path(),
            json_path: default_json_path(),
            device_res: default_device_res(),
            device_dpi: default_device_dpi(),
            window_class: default_window_class(),
            adb_path: default_adb_path(),
            device_serial: None,
        }
    }
}

impl Default for MouseConfig {
    fn default() -> Self {
        Self {
            sensitivity: default_sensitivity(),
            invert_y: false,
            double_tap_ms: default_double_tap_ms(),
        }
    }
}

impl Default for JoystickConfig {
    fn default() -> Self {
        Self {
            deadzone: default_deadzone(),
            hysteresis: default_hysteresis(),
            mouse_wheel_radius: 0.0,
            sprint_distance: 0.0,
        }
    }
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            reload_debounce_ms: default_reload_debounce_ms(),
        }
    }
}

// ── Derived values ────────────────────────────────────────────────────────────

impl ConfigSnapshot {
    /// Device resolution as `(width, height)`.
    pub fn device_res(&self) -> (u32, u32) {
        (self.system.device_res[0], self.system.device_res[1])
    }

    /// `sensitivity × (DEF_DPI / device_dpi)`: host pixels per device pixel.
    pub fn total_mult(&self) -> f64 {
        self.mouse.sensitivity * (DEF_DPI / self.system.device_dpi)
    }

    pub fn double_tap_window(&self) -> Duration {
        Duration::from_millis(self.mouse.double_tap_ms)
    }

    pub fn reload_debounce(&self) -> Duration {
        Duration::from_millis(self.hotkeys.reload_debounce_ms)
    }

    /// Checks every range constraint.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvalidConfig`] found.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        let invalid = |field, reason| Err(InvalidConfig { field, reason });

        let [w, h] = self.system.device_res;
        if w == 0 || h == 0 {
            return invalid("system.device_res", "both dimensions must be non-zero");
        }
        if !(self.system.device_dpi.is_finite() && self.system.device_dpi > 0.0) {
            return invalid("system.device_dpi", "must be a positive number");
        }
        if !(self.mouse.sensitivity.is_finite() && self.mouse.sensitivity > 0.0) {
            return invalid("mouse.sensitivity", "must be a positive number");
        }
        if !(0.0..1.0).contains(&self.joystick.deadzone) {
            return invalid("joystick.deadzone", "must be in [0, 1)");
        }
        if !(self.joystick.hysteresis.is_finite() && self.joystick.hysteresis >= 0.0) {
            return invalid("joystick.hysteresis", "must be >= 0");
        }
        Ok(())
    }
}
