//! Android device access over `adb`.
//!
//! - **`adb`** – Device discovery and capability probing (`adb devices`,
//!   `getevent -pl`, `wm size`, `wm density`, `dumpsys display`) plus the
//!   long-running `getevent -l` stream.
//! - **`reader`** – The touch reader task: feeds stream lines through the
//!   touch tracker and hands events to the dispatcher, respawning the stream
//!   when it dies.  Also the low-frequency rotation poller.
//! - **`mock`** – Scripted streams for tests.
//!
//! The reader only sees the stream through the [`StreamLauncher`] and
//! [`EventStream`] traits, so its respawn and shutdown logic is testable
//! without a phone.

use async_trait::async_trait;
use thiserror::Error;

use touchmap_core::Rotation;

pub mod adb;
pub mod mock;
pub mod reader;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("`{0}` timed out")]
    Timeout(String),

    #[error("reading the touch stream failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("no Android device attached (see `adb devices`)")]
    NoDevice,

    #[error("device {0} is not attached")]
    SerialNotFound(String),

    #[error("no input node reports ABS_MT_POSITION_X")]
    NoTouchNode,

    #[error("could not read the {what} from: {output}")]
    Unparseable { what: &'static str, output: String },

    #[error("device resolution {device:?} does not match device_res {configured:?} in the config")]
    ResolutionMismatch {
        device: (u32, u32),
        configured: (u32, u32),
    },
}

/// A running line-oriented event source.
#[async_trait]
pub trait EventStream: Send {
    /// Next line, or `None` once the stream has ended.
    async fn next_line(&mut self) -> Result<Option<String>, DeviceError>;
}

/// Starts a fresh [`EventStream`], used again after every failure.
#[async_trait]
pub trait StreamLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn EventStream>, DeviceError>;
}

/// Reads the current display rotation.
#[async_trait]
pub trait RotationProbe: Send + Sync {
    async fn rotation(&self) -> Result<Rotation, DeviceError>;
}

/// Checks the device's natural resolution against the configured one.
///
/// Either orientation matches: the config holds the landscape size the HUD
/// was drawn at, while `wm size` reports the natural (usually portrait) one.
pub fn check_resolution(device: (u32, u32), configured: (u32, u32)) -> Result<(), DeviceError> {
    let swapped = (configured.1, configured.0);
    if device == configured || device == swapped {
        Ok(())
    } else {
        Err(DeviceError::ResolutionMismatch { device, configured })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_matches_in_either_orientation() {
        assert!(check_resolution((1080, 2400), (2400, 1080)).is_ok());
        assert!(check_resolution((2400, 1080), (2400, 1080)).is_ok());
    }

    #[test]
    fn test_resolution_mismatch_is_fatal() {
        let result = check_resolution((1440, 3200), (2400, 1080));
        assert!(matches!(
            result,
            Err(DeviceError::ResolutionMismatch { device: (1440, 3200), .. })
        ));
    }
}
