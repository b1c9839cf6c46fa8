//! HUD zones: the tappable regions drawn on the phone's HUD image.
//!
//! Every zone is stored normalised to `[0, 1]` against the configured device
//! resolution so the same layout file survives a HUD re-export at another
//! size.  Circles normalise their radius against the device *width*.

use std::fmt;

/// Identifies what a zone does when touched.
///
/// Two entries in a layout are not buttons at all: they only exist to size
/// the floating joystick.  Keeping them as their own variants means a marker
/// can never be injected as a keystroke by accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ZoneKey {
    /// A real keyboard scancode (PC set 1).
    Scancode(u16),
    /// Joystick marker; its radius becomes the inner (deadzone) radius.
    MouseWheel,
    /// Joystick marker; its vertical offset from the wheel becomes the leash.
    SprintDistance,
}

impl ZoneKey {
    /// Marker name used for [`ZoneKey::MouseWheel`] in layout files.
    pub const MOUSE_WHEEL: &'static str = "MOUSE_WHEEL";
    /// Marker name used for [`ZoneKey::SprintDistance`] in layout files.
    pub const SPRINT_DISTANCE: &'static str = "SPRINT_DISTANCE";

    /// Parses the `scancode` field of a layout item.
    ///
    /// Accepts `"0x1E"`-style hex, plain decimal, or one of the marker names.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case(Self::MOUSE_WHEEL) {
            return Some(Self::MouseWheel);
        }
        if raw.eq_ignore_ascii_case(Self::SPRINT_DISTANCE) {
            return Some(Self::SprintDistance);
        }
        let code = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
            Some(hex) => u16::from_str_radix(hex, 16).ok()?,
            None => raw.parse::<u16>().ok()?,
        };
        Some(Self::Scancode(code))
    }

    /// Returns `true` for the joystick sizing markers.
    pub fn is_marker(self) -> bool {
        !matches!(self, Self::Scancode(_))
    }

    /// Returns the scancode for button zones, `None` for markers.
    pub fn scancode(self) -> Option<u16> {
        match self {
            Self::Scancode(code) => Some(code),
            _ => None,
        }
    }
}

impl fmt::Display for ZoneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scancode(code) => write!(f, "0x{code:02X}"),
            Self::MouseWheel => f.write_str(Self::MOUSE_WHEEL),
            Self::SprintDistance => f.write_str(Self::SPRINT_DISTANCE),
        }
    }
}

/// Geometry of a zone in normalised coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoneShape {
    /// Centre `(cx, cy)` and radius `r`, where `r` is relative to the width.
    Circle { cx: f64, cy: f64, r: f64 },
    /// Axis-aligned box; `x1 <= x2` and `y1 <= y2` after construction.
    Rect { x1: f64, y1: f64, x2: f64, y2: f64 },
}

/// A single HUD zone.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub key: ZoneKey,
    pub name: String,
    pub shape: ZoneShape,
}

impl Zone {
    /// Returns `true` if the normalised point lies inside the zone.
    ///
    /// `aspect` is `device_height / device_width`; circles are stored with a
    /// width-relative radius, so the vertical axis has to be rescaled before
    /// the distance test or circles would turn into ellipses on a wide screen.
    pub fn contains(&self, nx: f64, ny: f64, aspect: f64) -> bool {
        match self.shape {
            ZoneShape::Circle { cx, cy, r } => {
                let dx = nx - cx;
                let dy = (ny - cy) * aspect;
                dx * dx + dy * dy <= r * r
            }
            ZoneShape::Rect { x1, y1, x2, y2 } => nx >= x1 && nx <= x2 && ny >= y1 && ny <= y2,
        }
    }
}
