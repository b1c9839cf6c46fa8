//! Host input drivers.
//!
//! An [`InputDriver`] performs the OS call for one already-decided input
//! event.  Exactly one driver instance exists per process and it is owned by
//! the input bridge worker thread, which is why the trait only requires
//! `Send`.
//!
//! The correct implementation is selected at compile time via
//! `#[cfg(target_os = ...)]`; [`mock::RecordingDriver`] is available
//! everywhere for tests and dry runs.

use thiserror::Error;

use touchmap_core::{ButtonFlag, KeyDirection};

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

/// Largest coordinate of the absolute mouse range.
pub const ABSOLUTE_MAX: i32 = 65_535;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("platform error: {0}")]
    Platform(String),
    #[error("input injection is not supported on this platform")]
    Unsupported,
}

/// Bounding rectangle of all monitors in desktop pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VirtualDesktop {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl VirtualDesktop {
    /// Maps a desktop pixel to the driver's absolute range `[0, 65535]`.
    ///
    /// Points outside the desktop are clamped to its edge.
    pub fn normalize(&self, x: i32, y: i32) -> (i32, i32) {
        (
            scale_axis(x, self.left, self.width),
            scale_axis(y, self.top, self.height),
        )
    }
}

fn scale_axis(value: i32, origin: i32, extent: i32) -> i32 {
    if extent <= 1 {
        return 0;
    }
    let offset = (value as i64 - origin as i64).clamp(0, extent as i64 - 1);
    (offset * ABSOLUTE_MAX as i64 / (extent as i64 - 1)) as i32
}

/// One OS-level input call.
pub trait InputDriver: Send {
    fn emit_key(&self, scancode: u16, direction: KeyDirection) -> Result<(), DriverError>;

    fn emit_move_relative(&self, dx: i32, dy: i32) -> Result<(), DriverError>;

    /// Moves to an absolute position already normalised to `[0, 65535]`
    /// across the virtual desktop.
    fn emit_move_absolute(&self, nx: i32, ny: i32) -> Result<(), DriverError>;

    fn emit_button(&self, flag: ButtonFlag) -> Result<(), DriverError>;

    /// Current virtual desktop metrics, queried per absolute move so monitor
    /// changes are picked up.
    fn virtual_desktop(&self) -> VirtualDesktop;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_maps_corners() {
        let desk = VirtualDesktop {
            left: 0,
            top: 0,
            width: 1920,
            height: 1080,
        };
        assert_eq!(desk.normalize(0, 0), (0, 0));
        assert_eq!(desk.normalize(1919, 1079), (ABSOLUTE_MAX, ABSOLUTE_MAX));
    }

    #[test]
    fn test_normalize_handles_negative_origin_and_clamps() {
        // Secondary monitor to the left of the primary.
        let desk = VirtualDesktop {
            left: -1920,
            top: 0,
            width: 3840,
            height: 1080,
        };
        assert_eq!(desk.normalize(-1920, 0).0, 0);
        assert_eq!(desk.normalize(5000, -10), (ABSOLUTE_MAX, 0));
        let (mid, _) = desk.normalize(0, 0);
        assert!((mid - ABSOLUTE_MAX / 2).abs() <= 10);
    }

    #[test]
    fn test_degenerate_desktop_maps_to_origin() {
        assert_eq!(VirtualDesktop::default().normalize(100, 100), (0, 0));
    }
}
