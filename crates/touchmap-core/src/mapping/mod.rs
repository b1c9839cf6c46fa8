//! Arithmetic behind the mouse and joystick mappers.

pub mod accumulator;
pub mod joystick;

pub use accumulator::SubPixelAccumulator;
pub use joystick::{Joystick, JoystickTunables, KeySet, Sector};
