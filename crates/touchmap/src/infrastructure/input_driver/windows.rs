//! Windows input driver via the SendInput API.
//!
//! Keys are injected as hardware scancodes (`KEYEVENTF_SCANCODE`) so games
//! that read raw input see them.  Scancodes in the `0xE0xx` range carry the
//! extended-key flag.  Absolute moves use `MOUSEEVENTF_VIRTUALDESK` so the
//! `[0, 65535]` range spans every monitor.

#![cfg(target_os = "windows")]

use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, KEYEVENTF_SCANCODE, MOUSEEVENTF_ABSOLUTE,
    MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP,
    MOUSEEVENTF_MOVE, MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, MOUSEEVENTF_VIRTUALDESK,
    MOUSEINPUT, MOUSE_EVENT_FLAGS, VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetSystemMetrics, SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN,
    SM_YVIRTUALSCREEN,
};

use touchmap_core::{ButtonFlag, KeyDirection};

use super::{DriverError, InputDriver, VirtualDesktop};

/// [`InputDriver`] backed by `SendInput`.
#[derive(Debug, Default)]
pub struct WindowsInputDriver;

impl WindowsInputDriver {
    pub fn new() -> Self {
        Self
    }
}

impl InputDriver for WindowsInputDriver {
    fn emit_key(&self, scancode: u16, direction: KeyDirection) -> Result<(), DriverError> {
        let mut flags: KEYBD_EVENT_FLAGS = KEYEVENTF_SCANCODE;
        if direction == KeyDirection::Up {
            flags |= KEYEVENTF_KEYUP;
        }
        if scancode & 0xFF00 == 0xE000 {
            flags |= KEYEVENTF_EXTENDEDKEY;
        }
        send(INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(0),
                    wScan: scancode & 0x00FF,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        })
    }

    fn emit_move_relative(&self, dx: i32, dy: i32) -> Result<(), DriverError> {
        send(mouse_input(dx, dy, MOUSEEVENTF_MOVE))
    }

    fn emit_move_absolute(&self, nx: i32, ny: i32) -> Result<(), DriverError> {
        send(mouse_input(
            nx,
            ny,
            MOUSEEVENTF_MOVE | MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_VIRTUALDESK,
        ))
    }

    fn emit_button(&self, flag: ButtonFlag) -> Result<(), DriverError> {
        let flags = match flag {
            ButtonFlag::LeftDown => MOUSEEVENTF_LEFTDOWN,
            ButtonFlag::LeftUp => MOUSEEVENTF_LEFTUP,
            ButtonFlag::RightDown => MOUSEEVENTF_RIGHTDOWN,
            ButtonFlag::RightUp => MOUSEEVENTF_RIGHTUP,
            ButtonFlag::MiddleDown => MOUSEEVENTF_MIDDLEDOWN,
            ButtonFlag::MiddleUp => MOUSEEVENTF_MIDDLEUP,
        };
        send(mouse_input(0, 0, flags))
    }

    fn virtual_desktop(&self) -> VirtualDesktop {
        // SAFETY: GetSystemMetrics has no preconditions.
        unsafe {
            VirtualDesktop {
                left: GetSystemMetrics(SM_XVIRTUALSCREEN),
                top: GetSystemMetrics(SM_YVIRTUALSCREEN),
                width: GetSystemMetrics(SM_CXVIRTUALSCREEN),
                height: GetSystemMetrics(SM_CYVIRTUALSCREEN),
            }
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn mouse_input(dx: i32, dy: i32, flags: MOUSE_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx,
                dy,
                mouseData: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn send(input: INPUT) -> Result<(), DriverError> {
    // SAFETY: `input` is a fully initialised INPUT structure on the stack and
    // the size argument matches its type.
    let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
    if sent == 1 {
        Ok(())
    } else {
        Err(DriverError::Platform(format!(
            "SendInput rejected the event: {}",
            windows::core::Error::from_win32()
        )))
    }
}
