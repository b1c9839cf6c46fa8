//! # touchmap-core
//!
//! Pure logic for touchmap: turning an Android multi-touch stream into
//! keyboard and mouse commands for a host game window.
//!
//! This crate has zero dependencies on OS APIs, child processes, or threads.
//! Everything here can be driven from a unit test with plain values.
//!
//! # Architecture overview (for beginners)
//!
//! A phone shows a HUD image of the game's controls.  The player touches the
//! phone; `adb shell getevent -l` streams the raw multi-touch protocol to the
//! host, and touchmap converts each finger into host input:
//!
//! - **`touch`** – Parses `getevent` lines into tokens and runs the per-slot
//!   state machine (`DOWN → PRESSED* → UP`), applies display rotation, picks
//!   the "mouse finger" and the "joystick finger", and rate-caps motion.
//!
//! - **`domain`** – The HUD zone map (circles and rectangles normalised to
//!   the device resolution), the typed configuration snapshot, and the host
//!   window geometry used to map device pixels to game pixels.
//!
//! - **`mapping`** – The arithmetic behind the mappers: a sub-pixel
//!   accumulator for camera motion and the floating joystick quantizer that
//!   turns a finger offset into W/A/S/D.
//!
//! - **`command`** / **`events`** – The vocabulary shared with the host
//!   crate: injection commands sent to the input bridge and the events that
//!   travel through the dispatcher.

pub mod command;
pub mod domain;
pub mod events;
pub mod keymap;
pub mod mapping;
pub mod touch;

pub use command::{ButtonFlag, CommandSink, InjectCommand, KeyDirection, MouseButton, SinkError};
pub use domain::config::{ConfigSnapshot, InvalidConfig, DEF_DPI};
pub use domain::layout::{LayoutError, LayoutSnapshot};
pub use domain::window::WindowInfo;
pub use domain::zone::{Zone, ZoneKey, ZoneShape};
pub use events::{Channel, MapperEvent, TouchAction, TouchEvent};
pub use touch::rotation::Rotation;
pub use touch::tracker::{TouchTracker, TrackerConfig};
