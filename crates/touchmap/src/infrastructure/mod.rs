//! Infrastructure layer.
//!
//! OS-facing adapters: the adb touch stream, the SendInput bridge, window
//! and cursor queries, the global keyboard hook, and the config/layout
//! files on disk.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `touchmap_core`, but MUST NOT be imported by the `application` layer.

pub mod bridge;
pub mod device;
pub mod hotkeys;
pub mod input_driver;
pub mod logging;
pub mod platform;
pub mod startup;
pub mod storage;
pub mod window;
