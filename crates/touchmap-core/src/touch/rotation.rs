//! Display rotation and the coordinate transforms that follow from it.
//!
//! The touch panel always reports coordinates in its natural orientation.
//! When Android rotates the display the HUD rotates with it, so each point is
//! mapped into the rotated frame before any zone or side decision is made.

/// Android `Surface.ROTATION_*` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Rot0,
    Rot90,
    Rot180,
    Rot270,
}

impl Rotation {
    /// Converts the `0..=3` value reported by the device.  Out-of-range
    /// values wrap, as the display service does.
    pub fn from_index(index: u8) -> Self {
        match index % 4 {
            0 => Self::Rot0,
            1 => Self::Rot90,
            2 => Self::Rot180,
            _ => Self::Rot270,
        }
    }

    pub fn index(self) -> u8 {
        match self {
            Self::Rot0 => 0,
            Self::Rot90 => 1,
            Self::Rot180 => 2,
            Self::Rot270 => 3,
        }
    }

    /// Size of the rotated frame for a panel of natural size `(w, h)`.
    pub fn frame(self, natural: (u32, u32)) -> (u32, u32) {
        match self {
            Self::Rot0 | Self::Rot180 => natural,
            Self::Rot90 | Self::Rot270 => (natural.1, natural.0),
        }
    }

    /// Maps a natural-orientation point into the rotated frame.
    pub fn apply(self, x: i32, y: i32, natural: (u32, u32)) -> (i32, i32) {
        let (w, h) = (natural.0 as i32, natural.1 as i32);
        match self {
            Self::Rot0 => (x, y),
            Self::Rot90 => (y, w - x),
            Self::Rot180 => (w - x, h - y),
            Self::Rot270 => (h - y, x),
        }
    }
}
