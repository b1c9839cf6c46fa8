//! Floating joystick: finger offset to W/A/S/D.
//!
//! The joystick has no fixed position on the HUD.  Wherever the left-side
//! finger lands becomes the centre; moving away from it selects one of eight
//! directions.  Three rules shape the feel:
//!
//! - **Deadzone** – inside `inner_radius × deadzone` no key is held.
//! - **Leash** – the centre follows the finger so it is never farther away
//!   than `outer_radius`.  Reversing direction after a long drag therefore
//!   takes effect immediately instead of after dragging all the way back.
//! - **Hysteresis** – a held direction is kept until the angle leaves its
//!   45° sector widened by half of `hysteresis` on each side.  Two
//!   neighbouring held sectors then overlap by the full `hysteresis`, so a
//!   thumb wobbling by less than that across a boundary switches keys at
//!   most once.
//!
//! Angles follow screen coordinates: `0°` points right and `+90°` points
//! *down* the screen.

use std::fmt;

use crate::domain::config::ConfigSnapshot;
use crate::domain::layout::LayoutSnapshot;
use crate::keymap::{SC_A, SC_D, SC_S, SC_W};

const HALF_SECTOR_DEG: f64 = 22.5;

/// Tunables read from the config and layout snapshots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoystickTunables {
    pub deadzone: f64,
    pub hysteresis_deg: f64,
    pub inner_radius_px: f64,
    pub outer_radius_px: f64,
}

impl JoystickTunables {
    pub fn from_snapshots(config: &ConfigSnapshot, layout: &LayoutSnapshot) -> Self {
        Self {
            deadzone: config.joystick.deadzone,
            hysteresis_deg: config.joystick.hysteresis,
            inner_radius_px: layout.inner_radius_px(),
            outer_radius_px: layout.outer_radius_px(),
        }
    }

    fn deadzone_px(&self) -> f64 {
        self.inner_radius_px * self.deadzone
    }
}

// ── Key sets ──────────────────────────────────────────────────────────────────

/// A set of joystick keys packed into four bits.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KeySet(u8);

impl KeySet {
    pub const EMPTY: KeySet = KeySet(0);
    pub const W: KeySet = KeySet(0b0001);
    pub const A: KeySet = KeySet(0b0010);
    pub const S: KeySet = KeySet(0b0100);
    pub const D: KeySet = KeySet(0b1000);

    const TABLE: [(KeySet, u16); 4] = [
        (KeySet::W, SC_W),
        (KeySet::A, SC_A),
        (KeySet::S, SC_S),
        (KeySet::D, SC_D),
    ];

    pub const fn union(self, other: KeySet) -> KeySet {
        KeySet(self.0 | other.0)
    }

    /// Keys in `self` that are not in `other`.
    pub const fn difference(self, other: KeySet) -> KeySet {
        KeySet(self.0 & !other.0)
    }

    pub const fn contains(self, other: KeySet) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The single-key set for `scancode`, if it is one of W, A, S, D.
    pub fn from_scancode(scancode: u16) -> Option<KeySet> {
        Self::TABLE
            .into_iter()
            .find(|(_, code)| *code == scancode)
            .map(|(key, _)| key)
    }

    /// Scancodes of the keys in the set, in W, A, S, D order.
    pub fn scancodes(self) -> impl Iterator<Item = u16> {
        Self::TABLE
            .into_iter()
            .filter(move |(key, _)| self.contains(*key))
            .map(|(_, code)| code)
    }
}

impl fmt::Debug for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("{}");
        }
        for (key, name) in [(Self::W, 'W'), (Self::A, 'A'), (Self::S, 'S'), (Self::D, 'D')] {
            if self.contains(key) {
                write!(f, "{name}")?;
            }
        }
        Ok(())
    }
}

// ── Sectors ───────────────────────────────────────────────────────────────────

/// One of the eight 45° directions, clockwise from east in screen space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sector {
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
    North,
    NorthEast,
}

impl Sector {
    pub const ALL: [Sector; 8] = [
        Sector::East,
        Sector::SouthEast,
        Sector::South,
        Sector::SouthWest,
        Sector::West,
        Sector::NorthWest,
        Sector::North,
        Sector::NorthEast,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn center_deg(self) -> f64 {
        self.index() as f64 * 45.0
    }

    pub fn keys(self) -> KeySet {
        match self {
            Sector::East => KeySet::D,
            Sector::SouthEast => KeySet::S.union(KeySet::D),
            Sector::South => KeySet::S,
            Sector::SouthWest => KeySet::S.union(KeySet::A),
            Sector::West => KeySet::A,
            Sector::NorthWest => KeySet::W.union(KeySet::A),
            Sector::North => KeySet::W,
            Sector::NorthEast => KeySet::W.union(KeySet::D),
        }
    }
}

fn angular_distance(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(360.0);
    d.min(360.0 - d)
}

/// Picks the sector for `angle_deg`, keeping `previous` while the angle is
/// within its widened boundary.
pub fn quantize(angle_deg: f64, previous: Option<Sector>, hysteresis_deg: f64) -> Sector {
    if let Some(prev) = previous {
        if angular_distance(angle_deg, prev.center_deg()) <= HALF_SECTOR_DEG + hysteresis_deg / 2.0 {
            return prev;
        }
    }
    let index = (angle_deg / 45.0).round() as i64;
    Sector::ALL[index.rem_euclid(8) as usize]
}

// ── Joystick ──────────────────────────────────────────────────────────────────

/// State of one joystick gesture, from finger down to finger up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Joystick {
    center: (f64, f64),
    sector: Option<Sector>,
}

impl Joystick {
    pub fn new(center: (f64, f64)) -> Self {
        Self { center, sector: None }
    }

    pub fn center(&self) -> (f64, f64) {
        self.center
    }

    pub fn sector(&self) -> Option<Sector> {
        self.sector
    }

    /// Moves the finger and returns the keys that should now be held.
    pub fn update(&mut self, finger: (f64, f64), tunables: &JoystickTunables) -> KeySet {
        let mut dx = finger.0 - self.center.0;
        let mut dy = finger.1 - self.center.1;
        let mut d2 = dx * dx + dy * dy;

        let outer = tunables.outer_radius_px;
        if outer > 0.0 && d2 > outer * outer {
            let d = d2.sqrt();
            let slide = d - outer;
            self.center.0 += dx / d * slide;
            self.center.1 += dy / d * slide;
            dx = finger.0 - self.center.0;
            dy = finger.1 - self.center.1;
            d2 = dx * dx + dy * dy;
        }

        let dead = tunables.deadzone_px();
        if d2 < dead * dead {
            self.sector = None;
            return KeySet::EMPTY;
        }

        let angle = dy.atan2(dx).to_degrees();
        let sector = quantize(angle, self.sector, tunables.hysteresis_deg);
        self.sector = Some(sector);
        sector.keys()
    }
}
