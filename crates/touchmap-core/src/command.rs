//! Injection commands: what the mappers ask the input bridge to do.
//!
//! The bridge owns the only handle to the host input driver.  Mappers never
//! call the driver directly; they build an [`InjectCommand`] and hand it to a
//! [`CommandSink`].  The production sink is the bridge's bounded queue; tests
//! use a recording sink.

use thiserror::Error;

/// Whether a key goes down or comes up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyDirection {
    Down,
    Up,
}

/// Physical mouse buttons the mappers can press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Mouse button transitions, one per driver flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonFlag {
    LeftDown,
    LeftUp,
    RightDown,
    RightUp,
    MiddleDown,
    MiddleUp,
}

impl ButtonFlag {
    pub fn button(self) -> MouseButton {
        match self {
            Self::LeftDown | Self::LeftUp => MouseButton::Left,
            Self::RightDown | Self::RightUp => MouseButton::Right,
            Self::MiddleDown | Self::MiddleUp => MouseButton::Middle,
        }
    }

    pub fn is_down(self) -> bool {
        matches!(self, Self::LeftDown | Self::RightDown | Self::MiddleDown)
    }

    /// The release flag for `button`.
    pub fn up(button: MouseButton) -> Self {
        match button {
            MouseButton::Left => Self::LeftUp,
            MouseButton::Right => Self::RightUp,
            MouseButton::Middle => Self::MiddleUp,
        }
    }
}

/// A single request to the input bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectCommand {
    /// Keyboard scancode (PC set 1) press or release.
    Key { scancode: u16, direction: KeyDirection },
    /// Relative mouse motion in host pixels.  Consecutive moves coalesce.
    MoveRel { dx: i32, dy: i32 },
    /// Absolute cursor position in desktop pixels.
    MoveAbs { x: i32, y: i32 },
    /// Mouse button transition.
    Button(ButtonFlag),
}

impl InjectCommand {
    pub fn key_down(scancode: u16) -> Self {
        Self::Key { scancode, direction: KeyDirection::Down }
    }

    pub fn key_up(scancode: u16) -> Self {
        Self::Key { scancode, direction: KeyDirection::Up }
    }

    /// Relative moves are the only lossy commands: dropping one under load
    /// costs a few pixels, dropping a key release leaves a key stuck.
    pub fn is_droppable(&self) -> bool {
        matches!(self, Self::MoveRel { .. })
    }
}

/// Errors a [`CommandSink`] can report.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    /// The queue stayed full for the whole enqueue timeout.
    #[error("input bridge queue is full")]
    Overloaded,
    /// The bridge has been stopped; nothing will be injected any more.
    #[error("input bridge is stopped")]
    Stopped,
}

/// Destination for injection commands.
pub trait CommandSink: Send + Sync {
    /// Enqueues a command.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Overloaded`] when a key or button could not be
    /// queued in time and [`SinkError::Stopped`] after shutdown.  Dropped
    /// relative moves are not errors.
    fn submit(&self, command: InjectCommand) -> Result<(), SinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_flag_pairs() {
        for flag in [ButtonFlag::LeftDown, ButtonFlag::RightDown, ButtonFlag::MiddleDown] {
            let up = ButtonFlag::up(flag.button());
            assert!(flag.is_down());
            assert!(!up.is_down());
            assert_eq!(up.button(), flag.button());
        }
    }

    #[test]
    fn test_only_relative_moves_are_droppable() {
        assert!(InjectCommand::MoveRel { dx: 1, dy: 0 }.is_droppable());
        assert!(!InjectCommand::MoveAbs { x: 1, y: 0 }.is_droppable());
        assert!(!InjectCommand::key_up(0x11).is_droppable());
        assert!(!InjectCommand::Button(ButtonFlag::LeftUp).is_droppable());
    }
}
