//! Application layer use cases.
//!
//! Everything here talks to the outside world only through traits
//! (`CommandSink`, `GameWindow`, `ConfigSource`, `LayoutSource`,
//! `InjectionControl`, `ForegroundProbe`), so each use case can be tested
//! with in-memory fakes.
//!
//! - **`dispatcher`** – Broadcast channels plus the fixed touch route table.
//! - **`mouse_mapper`** – Right-side finger to relative camera motion, or to
//!   absolute clicks while the host cursor is visible.
//! - **`wasd_mapper`** – Left-side finger to a floating W/A/S/D joystick.
//! - **`button_mapper`** – Taps on HUD button zones to key presses.
//! - **`reload`** – Config-then-layout hot reload and mapper subscriptions.
//! - **`lifecycle`** – Hotkey gate, debounce and the shutdown sequence.
//! - **`recording_sink`** – A `CommandSink` that just records, for tests.

pub mod button_mapper;
pub mod dispatcher;
pub mod lifecycle;
pub mod mouse_mapper;
pub mod recording_sink;
pub mod reload;
pub mod wasd_mapper;
