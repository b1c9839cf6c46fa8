//! Per-slot multi-touch state machine.
//!
//! # How multi-touch protocol B works (for beginners)
//!
//! The kernel keeps a fixed number of *slots*.  `ABS_MT_SLOT n` selects the
//! slot that the following events describe.  A finger landing gets a fresh
//! `ABS_MT_TRACKING_ID`; lifting it writes tracking id `-1` into its slot.
//! Positions are only reported when they change, and a `SYN_REPORT` closes
//! each frame.  Nothing is "final" until the `SYN_REPORT` arrives, so this
//! module accumulates slot updates and only emits events at sync time.
//!
//! # What the tracker adds on top
//!
//! - A lifecycle per finger: exactly one `Down`, any number of `Pressed`,
//!   exactly one `Up`, even when the kernel packs a short tap into a single
//!   frame or reuses a slot without an intervening `-1`.
//! - Rotation into the current display frame and scaling from the panel's
//!   raw range to pixels.
//! - Finger identity: the oldest finger that *started* on the right half is
//!   the mouse finger, the oldest that started on the left half is the
//!   joystick finger.  A newer finger never steals the role; when the owner
//!   lifts, the next-oldest on that side takes over at the next sync.
//! - A global rate cap on `Pressed` events.  `Down` and `Up` always pass.

use std::time::Duration;

use tracing::{debug, trace};

use super::rotation::Rotation;
use super::token::{parse_line, EventToken};
use crate::events::{TouchAction, TouchEvent};

/// Slots beyond this index are ignored; real panels expose 10 or fewer.
pub const MAX_SLOTS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotState {
    #[default]
    Idle,
    Down,
    Pressed,
    Up,
}

/// One kernel slot.  Positions are natural-orientation pixels.
#[derive(Debug, Clone, Default)]
pub struct TouchSlot {
    pub tracking_id: i32,
    pub x: i32,
    pub y: i32,
    /// Landing point in the rotated frame, pinned when `Down` is dispatched.
    pub start: Option<(i32, i32)>,
    pub state: SlotState,
    pub timestamp_ns: u64,
    pub is_mouse: bool,
    pub is_wasd: bool,
    down_unsent: bool,
}

impl TouchSlot {
    fn idle() -> Self {
        Self {
            tracking_id: -1,
            ..Self::default()
        }
    }

    fn is_active(&self) -> bool {
        matches!(self.state, SlotState::Down | SlotState::Pressed)
    }
}

/// Static geometry and pacing for a tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    /// Upper bound on `Pressed` dispatch rate; `0` disables the cap.
    pub rate_cap_hz: f64,
    /// Display size in natural orientation, e.g. `(1080, 2400)`.
    pub natural_res: (u32, u32),
    /// Maximum raw `ABS_MT_POSITION_X/Y` values; `(0, 0)` means raw = pixels.
    pub raw_max: (i32, i32),
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            rate_cap_hz: 250.0,
            natural_res: (1080, 2400),
            raw_max: (0, 0),
        }
    }
}

/// Multi-touch state machine.  Feed it tokens; collect events at each sync.
#[derive(Debug)]
pub struct TouchTracker {
    config: TrackerConfig,
    min_interval_ns: u64,
    slots: Vec<TouchSlot>,
    /// `None` after an out-of-range `ABS_MT_SLOT`: tokens are dropped until
    /// a valid slot is selected.
    current: Option<usize>,
    rotation: Rotation,
    last_dispatch_ns: Option<u64>,
    /// Lifetimes closed mid-frame by a slot reuse, flushed at the next sync.
    retired: Vec<(TouchAction, TouchEvent)>,
}

impl TouchTracker {
    pub fn new(config: TrackerConfig) -> Self {
        let min_interval_ns = if config.rate_cap_hz.is_finite() && config.rate_cap_hz > 0.0 {
            Duration::from_secs_f64(1.0 / config.rate_cap_hz).as_nanos() as u64
        } else {
            0
        };
        Self {
            config,
            min_interval_ns,
            slots: vec![TouchSlot::idle()],
            current: Some(0),
            rotation: Rotation::Rot0,
            last_dispatch_ns: None,
            retired: Vec::new(),
        }
    }

    pub fn set_rotation(&mut self, rotation: Rotation) {
        if rotation != self.rotation {
            debug!("display rotation is now {}", rotation.index());
            self.rotation = rotation;
        }
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Half the width of the rotated frame; fingers landing at or right of
    /// this column belong to the mouse side.
    pub fn side_limit(&self) -> i32 {
        (self.rotation.frame(self.config.natural_res).0 / 2) as i32
    }

    pub fn slots(&self) -> &[TouchSlot] {
        &self.slots
    }

    /// Slot index of the current mouse finger.
    pub fn mouse_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.is_active() && s.is_mouse)
    }

    /// Slot index of the current joystick finger.
    pub fn wasd_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.is_active() && s.is_wasd)
    }

    /// Parses and feeds one `getevent -l` line.  Returns `false` when the
    /// line was not an event.
    pub fn feed_line(
        &mut self,
        line: &str,
        now_ns: u64,
        out: &mut Vec<(TouchAction, TouchEvent)>,
    ) -> bool {
        match parse_line(line) {
            Some(token) => {
                self.feed(token, now_ns, out);
                true
            }
            None => false,
        }
    }

    /// Applies one token.  Events are appended to `out` on `SynReport` only.
    pub fn feed(
        &mut self,
        token: EventToken,
        now_ns: u64,
        out: &mut Vec<(TouchAction, TouchEvent)>,
    ) {
        match token {
            EventToken::Slot(index) => self.select_slot(index),
            EventToken::TrackingId(id) => self.set_tracking_id(id, now_ns),
            EventToken::PositionX(raw) => {
                let x = scale(raw, self.config.raw_max.0, self.config.natural_res.0);
                if let Some(slot) = self.current_slot() {
                    slot.x = x;
                }
            }
            EventToken::PositionY(raw) => {
                let y = scale(raw, self.config.raw_max.1, self.config.natural_res.1);
                if let Some(slot) = self.current_slot() {
                    slot.y = y;
                }
            }
            EventToken::SynReport => self.sync(now_ns, out),
            EventToken::Other => {}
        }
    }

    fn select_slot(&mut self, index: usize) {
        if index >= MAX_SLOTS {
            trace!("ignoring slot {index} beyond MAX_SLOTS");
            self.current = None;
            return;
        }
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, TouchSlot::idle);
        }
        self.current = Some(index);
    }

    fn current_slot(&mut self) -> Option<&mut TouchSlot> {
        self.current.and_then(|index| self.slots.get_mut(index))
    }

    fn set_tracking_id(&mut self, id: i32, now_ns: u64) {
        let rotation = self.rotation;
        let natural = self.config.natural_res;
        let Some(slot_index) = self.current else {
            return;
        };
        let slot = &mut self.slots[slot_index];

        if id < 0 {
            // A -1 for a slot that never went down (stream attached mid-touch)
            // has nothing to close.
            if slot.state != SlotState::Idle {
                slot.state = SlotState::Up;
            }
            return;
        }
        if id == slot.tracking_id && slot.state != SlotState::Idle {
            return;
        }

        // Slot reused before its previous lifetime was synced as ended.
        if slot.state != SlotState::Idle {
            let ended = event_for(slot_index, slot, rotation, natural);
            if slot.down_unsent {
                self.retired.push((TouchAction::Down, ended));
            }
            self.retired.push((TouchAction::Up, ended));
        }

        *slot = TouchSlot {
            tracking_id: id,
            x: slot.x,
            y: slot.y,
            start: None,
            state: SlotState::Down,
            timestamp_ns: now_ns,
            is_mouse: false,
            is_wasd: false,
            down_unsent: true,
        };
    }

    fn sync(&mut self, now_ns: u64, out: &mut Vec<(TouchAction, TouchEvent)>) {
        let rotation = self.rotation;
        let natural = self.config.natural_res;
        let side_limit = self.side_limit();

        out.append(&mut self.retired);

        // Pin the landing point of every finger announced in this frame.
        for slot in &mut self.slots {
            if slot.down_unsent && slot.start.is_none() {
                slot.start = Some(rotation.apply(slot.x, slot.y, natural));
            }
        }
        self.assign_identity(side_limit);

        // Releases first so an identity hand-over reads as UP then DOWN.
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.state != SlotState::Up {
                continue;
            }
            let event = event_for(index, slot, rotation, natural);
            if slot.down_unsent {
                out.push((TouchAction::Down, event));
            }
            out.push((TouchAction::Up, event));
            *slot = TouchSlot {
                x: slot.x,
                y: slot.y,
                ..TouchSlot::idle()
            };
        }

        let gate_open = self
            .last_dispatch_ns
            .map_or(true, |last| now_ns.saturating_sub(last) >= self.min_interval_ns);
        let mut pressed_sent = false;

        for (index, slot) in self.slots.iter_mut().enumerate() {
            match slot.state {
                SlotState::Down => {
                    out.push((TouchAction::Down, event_for(index, slot, rotation, natural)));
                    slot.state = SlotState::Pressed;
                    slot.down_unsent = false;
                }
                SlotState::Pressed if gate_open => {
                    out.push((TouchAction::Pressed, event_for(index, slot, rotation, natural)));
                    pressed_sent = true;
                }
                _ => {}
            }
        }

        if pressed_sent {
            self.last_dispatch_ns = Some(now_ns);
        }
    }

    /// Closes every lifetime the device may never finish, e.g. when the
    /// event stream dies mid-touch.
    ///
    /// Fingers whose `Down` was dispatched get their `Up` (carrying the role
    /// they held); fingers never announced are dropped silently.  Afterwards
    /// the tracker is as fresh as a new one, rotation aside.
    pub fn reset(&mut self, out: &mut Vec<(TouchAction, TouchEvent)>) {
        let rotation = self.rotation;
        let natural = self.config.natural_res;

        let before = out.len();
        out.append(&mut self.retired);
        for (index, slot) in self.slots.iter().enumerate() {
            let announced = matches!(slot.state, SlotState::Pressed | SlotState::Up) && !slot.down_unsent;
            if announced {
                out.push((TouchAction::Up, event_for(index, slot, rotation, natural)));
            }
        }
        debug!("touch tracker reset; {} event(s) closed", out.len() - before);
        self.slots = vec![TouchSlot::idle()];
        self.current = Some(0);
        self.last_dispatch_ns = None;
    }

    /// Recomputes `is_mouse` / `is_wasd` for every finger still on the glass.
    ///
    /// Fingers already in `Up` keep the role they had so their release
    /// reaches the right mapper.
    fn assign_identity(&mut self, side_limit: i32) {
        let oldest = |right_side: bool| {
            self.slots
                .iter()
                .enumerate()
                .filter(|(_, s)| holds_identity(s))
                .filter(|(_, s)| {
                    let sx = s.start.map_or(0, |(x, _)| x);
                    (sx >= side_limit) == right_side
                })
                .min_by_key(|(i, s)| (s.timestamp_ns, *i))
                .map(|(i, _)| i)
        };
        let mouse = oldest(true);
        let wasd = oldest(false);

        for (index, slot) in self.slots.iter_mut().enumerate() {
            if holds_identity(slot) {
                slot.is_mouse = Some(index) == mouse;
                slot.is_wasd = Some(index) == wasd;
            }
        }
    }
}

/// Fingers on the glass, plus taps that end in the frame they started.
fn holds_identity(slot: &TouchSlot) -> bool {
    slot.is_active() || (slot.state == SlotState::Up && slot.down_unsent)
}

fn event_for(index: usize, slot: &TouchSlot, rotation: Rotation, natural: (u32, u32)) -> TouchEvent {
    let (x, y) = rotation.apply(slot.x, slot.y, natural);
    let (sx, sy) = slot.start.unwrap_or((x, y));
    TouchEvent {
        slot: index,
        tracking_id: slot.tracking_id,
        x,
        y,
        sx,
        sy,
        is_mouse: slot.is_mouse,
        is_wasd: slot.is_wasd,
    }
}

fn scale(raw: i32, raw_max: i32, pixels: u32) -> i32 {
    if raw_max <= 0 || raw_max as i64 + 1 == pixels as i64 {
        return raw;
    }
    (raw as i64 * pixels as i64 / (raw_max as i64 + 1)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use EventToken::*;

    const MS: u64 = 1_000_000;

    fn tracker() -> TouchTracker {
        // Natural frame 2400x1080 so the side limit is x = 1200 at Rot0.
        TouchTracker::new(TrackerConfig {
            rate_cap_hz: 0.0,
            natural_res: (2400, 1080),
            raw_max: (0, 0),
        })
    }

    fn run(t: &mut TouchTracker, tokens: &[EventToken], now_ns: u64) -> Vec<(TouchAction, TouchEvent)> {
        let mut out = Vec::new();
        for &token in tokens {
            t.feed(token, now_ns, &mut out);
        }
        out
    }

    fn actions(events: &[(TouchAction, TouchEvent)]) -> Vec<(TouchAction, i32)> {
        events.iter().map(|(a, e)| (*a, e.tracking_id)).collect()
    }

    #[test]
    fn test_single_finger_lifecycle() {
        // Arrange
        let mut t = tracker();

        // Act
        let down = run(&mut t, &[Slot(0), TrackingId(7), PositionX(1400), PositionY(500), SynReport], 0);
        let moved = run(&mut t, &[PositionX(1420), SynReport], MS);
        let up = run(&mut t, &[TrackingId(-1), SynReport], 2 * MS);

        // Assert
        assert_eq!(actions(&down), vec![(TouchAction::Down, 7)]);
        assert_eq!(actions(&moved), vec![(TouchAction::Pressed, 7)]);
        assert_eq!(moved[0].1.x, 1420);
        assert_eq!((moved[0].1.sx, moved[0].1.sy), (1400, 500));
        assert_eq!(actions(&up), vec![(TouchAction::Up, 7)]);
        assert_eq!(t.slots()[0].state, SlotState::Idle);
    }

    #[test]
    fn test_right_side_finger_is_mouse_left_side_is_wasd() {
        let mut t = tracker();
        let out = run(
            &mut t,
            &[
                Slot(0), TrackingId(1), PositionX(1300), PositionY(400),
                Slot(1), TrackingId(2), PositionX(200), PositionY(900),
                SynReport,
            ],
            0,
        );

        assert!(out[0].1.is_mouse && !out[0].1.is_wasd);
        assert!(out[1].1.is_wasd && !out[1].1.is_mouse);
        assert_eq!(t.mouse_slot(), Some(0));
        assert_eq!(t.wasd_slot(), Some(1));
    }

    #[test]
    fn test_newer_finger_does_not_steal_mouse_identity() {
        let mut t = tracker();
        run(&mut t, &[Slot(0), TrackingId(1), PositionX(1300), PositionY(400), SynReport], 0);

        let out = run(&mut t, &[Slot(1), TrackingId(2), PositionX(2000), PositionY(400), SynReport], MS);

        let second = out.iter().find(|(_, e)| e.tracking_id == 2).map(|(_, e)| *e);
        assert_eq!(second.map(|e| e.is_mouse), Some(false));
        assert_eq!(t.mouse_slot(), Some(0));
    }

    #[test]
    fn test_identity_moves_to_next_oldest_after_up() {
        let mut t = tracker();
        run(&mut t, &[Slot(0), TrackingId(1), PositionX(1300), PositionY(400), SynReport], 0);
        run(&mut t, &[Slot(1), TrackingId(2), PositionX(2000), PositionY(400), SynReport], MS);

        let out = run(&mut t, &[Slot(0), TrackingId(-1), Slot(1), PositionX(2010), SynReport], 2 * MS);

        // The release still carries the old identity, then the survivor takes over.
        assert_eq!(actions(&out), vec![(TouchAction::Up, 1), (TouchAction::Pressed, 2)]);
        assert!(out[0].1.is_mouse);
        assert!(out[1].1.is_mouse);
        assert_eq!(t.mouse_slot(), Some(1));
    }

    #[test]
    fn test_side_is_decided_by_start_not_current_position() {
        let mut t = tracker();
        run(&mut t, &[Slot(0), TrackingId(1), PositionX(300), PositionY(400), SynReport], 0);

        // Drag across the middle.
        let out = run(&mut t, &[PositionX(2000), SynReport], MS);

        assert!(out[0].1.is_wasd);
        assert!(!out[0].1.is_mouse);
    }

    #[test]
    fn test_tap_inside_one_frame_emits_down_then_up() {
        let mut t = tracker();
        let out = run(
            &mut t,
            &[Slot(0), TrackingId(9), PositionX(1500), PositionY(300), TrackingId(-1), SynReport],
            0,
        );
        assert_eq!(actions(&out), vec![(TouchAction::Down, 9), (TouchAction::Up, 9)]);
        assert!(out[1].1.is_mouse);
    }

    #[test]
    fn test_slot_reuse_without_release_closes_old_lifetime() {
        let mut t = tracker();
        run(&mut t, &[Slot(0), TrackingId(1), PositionX(1500), PositionY(300), SynReport], 0);

        let out = run(&mut t, &[TrackingId(2), PositionX(1600), SynReport], MS);

        assert_eq!(actions(&out), vec![(TouchAction::Up, 1), (TouchAction::Down, 2)]);
    }

    #[test]
    fn test_release_for_unknown_slot_is_ignored() {
        let mut t = tracker();
        let out = run(&mut t, &[Slot(3), TrackingId(-1), SynReport], 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_rate_cap_gates_pressed_but_not_down_or_up() {
        // Arrange: 100 Hz cap => 10 ms between PRESSED dispatches.
        let mut t = TouchTracker::new(TrackerConfig {
            rate_cap_hz: 100.0,
            natural_res: (2400, 1080),
            raw_max: (0, 0),
        });
        run(&mut t, &[Slot(0), TrackingId(1), PositionX(1500), PositionY(300), SynReport], 0);

        // Act
        let first = run(&mut t, &[PositionX(1501), SynReport], MS);
        let too_soon = run(&mut t, &[PositionX(1502), SynReport], 5 * MS);
        let new_finger = run(&mut t, &[Slot(1), TrackingId(2), PositionX(100), PositionY(100), SynReport], 6 * MS);
        let later = run(&mut t, &[Slot(0), PositionX(1503), SynReport], 12 * MS);
        let up = run(&mut t, &[TrackingId(-1), SynReport], 13 * MS);

        // Assert
        assert_eq!(actions(&first), vec![(TouchAction::Pressed, 1)]);
        assert!(too_soon.is_empty());
        assert_eq!(actions(&new_finger), vec![(TouchAction::Down, 2)]);
        assert_eq!(actions(&later), vec![(TouchAction::Pressed, 1), (TouchAction::Pressed, 2)]);
        assert_eq!(later[0].1.x, 1503);
        assert_eq!(actions(&up), vec![(TouchAction::Up, 1)]);
    }

    #[test]
    fn test_rotation_moves_side_limit_and_coordinates() {
        // Natural portrait panel, landscape HUD.
        let mut t = TouchTracker::new(TrackerConfig {
            rate_cap_hz: 0.0,
            natural_res: (1080, 2400),
            raw_max: (0, 0),
        });
        t.set_rotation(Rotation::Rot90);

        // Panel (1000, 2000) -> rotated (2000, 80): right half of a 2400-wide frame.
        let out = run(&mut t, &[Slot(0), TrackingId(1), PositionX(1000), PositionY(2000), SynReport], 0);

        assert_eq!(t.side_limit(), 1200);
        assert_eq!((out[0].1.x, out[0].1.y), (2000, 80));
        assert!(out[0].1.is_mouse);
    }

    #[test]
    fn test_raw_range_is_scaled_to_pixels() {
        let mut t = TouchTracker::new(TrackerConfig {
            rate_cap_hz: 0.0,
            natural_res: (1080, 2400),
            raw_max: (4095, 4095),
        });
        let out = run(&mut t, &[Slot(0), TrackingId(1), PositionX(2048), PositionY(4095), SynReport], 0);
        assert_eq!((out[0].1.x, out[0].1.y), (540, 2399));
    }

    #[test]
    fn test_feed_line_reports_non_event_lines() {
        let mut t = tracker();
        let mut out = Vec::new();
        assert!(!t.feed_line("could not get driver version", 0, &mut out));
        assert!(t.feed_line("EV_SYN SYN_REPORT 00000000", 0, &mut out));
    }

    #[test]
    fn test_slot_index_beyond_limit_is_ignored() {
        let mut t = tracker();
        run(&mut t, &[Slot(MAX_SLOTS + 5), TrackingId(1), SynReport], 0);
        assert_eq!(t.slots().len(), 1);
    }

    #[test]
    fn test_tokens_after_out_of_range_slot_do_not_touch_previous_slot() {
        // Arrange
        let mut t = tracker();
        run(&mut t, &[Slot(0), TrackingId(1), PositionX(1500), PositionY(300), SynReport], 0);

        // Act
        let out = run(
            &mut t,
            &[Slot(MAX_SLOTS), TrackingId(2), PositionX(100), SynReport],
            MS,
        );
        let back = run(&mut t, &[Slot(0), PositionX(1510), SynReport], 2 * MS);

        // Assert
        assert_eq!(actions(&out), vec![(TouchAction::Pressed, 1)]);
        assert_eq!(out[0].1.x, 1500);
        assert_eq!(actions(&back), vec![(TouchAction::Pressed, 1)]);
        assert_eq!(back[0].1.x, 1510);
    }

    #[test]
    fn test_reset_closes_announced_fingers_and_clears_identity() {
        // Arrange: a joystick finger on the glass, plus a finger announced
        // in a frame that never synced.
        let mut t = tracker();
        run(&mut t, &[Slot(1), TrackingId(1), PositionX(200), PositionY(900), SynReport], 0);
        run(&mut t, &[Slot(2), TrackingId(5), PositionX(1500), PositionY(300)], MS);

        // Act
        let mut closed = Vec::new();
        t.reset(&mut closed);
        let next = run(&mut t, &[Slot(0), TrackingId(2), PositionX(300), PositionY(800), SynReport], 2 * MS);

        // Assert
        assert_eq!(actions(&closed), vec![(TouchAction::Up, 1)]);
        assert!(closed[0].1.is_wasd);
        assert_eq!(actions(&next), vec![(TouchAction::Down, 2)]);
        assert!(next[0].1.is_wasd);
        assert_eq!(t.wasd_slot(), Some(0));
    }

    #[test]
    fn test_reset_on_idle_tracker_emits_nothing() {
        let mut t = tracker();
        let mut closed = Vec::new();
        t.reset(&mut closed);
        assert!(closed.is_empty());
    }
}
