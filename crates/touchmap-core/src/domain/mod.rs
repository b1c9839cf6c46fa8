//! Domain entities: HUD zones, layout and config snapshots, window geometry.

pub mod config;
pub mod layout;
pub mod window;
pub mod zone;
