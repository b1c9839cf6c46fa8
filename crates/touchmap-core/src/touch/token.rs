//! `getevent -l` line tokenizer.
//!
//! With `-l`, `getevent` prints one event per line as symbolic type and code
//! names followed by an 8-digit hex value:
//!
//! ```text
//! EV_ABS       ABS_MT_SLOT          00000001
//! EV_ABS       ABS_MT_TRACKING_ID   00000e5c
//! EV_ABS       ABS_MT_POSITION_X    000003b8
//! EV_ABS       ABS_MT_POSITION_Y    00000521
//! EV_SYN       SYN_REPORT           00000000
//! EV_ABS       ABS_MT_TRACKING_ID   ffffffff
//! ```
//!
//! When no device node is given on the command line each line is prefixed
//! with `/dev/input/eventN:`; the prefix is skipped.  Only the code name and
//! the value matter to the state machine.

/// The subset of multi-touch protocol B that drives the slot state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventToken {
    Slot(usize),
    /// `-1` (`ffffffff`) ends a contact.
    TrackingId(i32),
    PositionX(i32),
    PositionY(i32),
    SynReport,
    /// A well-formed event the state machine does not use.
    Other,
}

/// Parses one line of `getevent -l` output.
///
/// Returns `None` for banners, blank lines and anything that is not an
/// event line.
pub fn parse_line(line: &str) -> Option<EventToken> {
    let mut parts = line.split_whitespace();
    let mut kind = parts.next()?;
    if kind.ends_with(':') {
        kind = parts.next()?;
    }
    if !kind.starts_with("EV_") {
        return None;
    }
    let code = parts.next()?;
    let raw = parts.next()?;

    let value = || u32::from_str_radix(raw, 16).ok().map(|v| v as i32);
    let token = match code {
        "ABS_MT_SLOT" => EventToken::Slot(usize::try_from(value()?).ok()?),
        "ABS_MT_TRACKING_ID" => EventToken::TrackingId(value()?),
        "ABS_MT_POSITION_X" => EventToken::PositionX(value()?),
        "ABS_MT_POSITION_Y" => EventToken::PositionY(value()?),
        "SYN_REPORT" => EventToken::SynReport,
        _ => EventToken::Other,
    };
    Some(token)
}
