//! PC set-1 scancodes and host virtual-key codes used by touchmap.
//!
//! Layout files carry raw scancodes, so there is no translation table on the
//! injection path.  The names here are only for log lines and for the
//! joystick's fixed W/A/S/D keys.

/// Set-1 make codes for the joystick keys.
pub const SC_W: u16 = 0x11;
pub const SC_A: u16 = 0x1E;
pub const SC_S: u16 = 0x1F;
pub const SC_D: u16 = 0x20;

/// Windows virtual-key codes watched by the hotkey hook.
pub const VK_ESCAPE: u32 = 0x1B;
pub const VK_F5: u32 = 0x74;

const NAMES: &[(u16, &str)] = &[
    (0x01, "Esc"),
    (0x02, "1"),
    (0x03, "2"),
    (0x04, "3"),
    (0x05, "4"),
    (0x06, "5"),
    (0x07, "6"),
    (0x08, "7"),
    (0x09, "8"),
    (0x0A, "9"),
    (0x0B, "0"),
    (0x0E, "Backspace"),
    (0x0F, "Tab"),
    (0x10, "Q"),
    (0x11, "W"),
    (0x12, "E"),
    (0x13, "R"),
    (0x14, "T"),
    (0x15, "Y"),
    (0x16, "U"),
    (0x17, "I"),
    (0x18, "O"),
    (0x19, "P"),
    (0x1C, "Enter"),
    (0x1D, "LCtrl"),
    (0x1E, "A"),
    (0x1F, "S"),
    (0x20, "D"),
    (0x21, "F"),
    (0x22, "G"),
    (0x23, "H"),
    (0x24, "J"),
    (0x25, "K"),
    (0x26, "L"),
    (0x2A, "LShift"),
    (0x2C, "Z"),
    (0x2D, "X"),
    (0x2E, "C"),
    (0x2F, "V"),
    (0x30, "B"),
    (0x31, "N"),
    (0x32, "M"),
    (0x38, "LAlt"),
    (0x39, "Space"),
    (0x3A, "CapsLock"),
    (0x3B, "F1"),
    (0x3C, "F2"),
    (0x3D, "F3"),
    (0x3E, "F4"),
    (0x3F, "F5"),
    (0x40, "F6"),
    (0x41, "F7"),
    (0x42, "F8"),
    (0x43, "F9"),
    (0x44, "F10"),
];

/// Human-readable name of a scancode, for logs.
pub fn scancode_name(scancode: u16) -> Option<&'static str> {
    NAMES
        .binary_search_by_key(&scancode, |&(code, _)| code)
        .ok()
        .map(|i| NAMES[i].1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_table_is_sorted() {
        assert!(NAMES.windows(2).all(|pair| pair[0].0 < pair[1].0));
    }

    #[test]
    fn test_joystick_keys_have_names() {
        assert_eq!(scancode_name(SC_W), Some("W"));
        assert_eq!(scancode_name(SC_A), Some("A"));
        assert_eq!(scancode_name(SC_S), Some("S"));
        assert_eq!(scancode_name(SC_D), Some("D"));
    }

    #[test]
    fn test_unknown_scancode_has_no_name() {
        assert_eq!(scancode_name(0x7F), None);
    }
}
