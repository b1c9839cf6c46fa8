//! Win32 window queries.
//!
//! `EnumWindows` walks every top-level window; the callback keeps the ones
//! whose class name matches and that are visible and not minimised.  The
//! client rectangle is translated to desktop coordinates with
//! `ClientToScreen` so it lines up with absolute mouse positions.

#![cfg(target_os = "windows")]

use windows::Win32::Foundation::{BOOL, HWND, LPARAM, POINT, RECT};
use windows::Win32::Graphics::Gdi::ClientToScreen;
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetClassNameW, GetClientRect, GetCursorInfo, GetForegroundWindow, IsIconic,
    IsWindowVisible, CURSORINFO, CURSOR_SHOWING,
};

use touchmap_core::WindowInfo;

use super::{WindowProbe, WindowProbeError};

#[derive(Debug, Default)]
pub struct WindowsWindowProbe;

impl WindowsWindowProbe {
    pub fn new() -> Self {
        Self
    }
}

struct Search {
    class: Vec<u16>,
    found: Vec<HWND>,
}

unsafe extern "system" fn collect_matching(hwnd: HWND, l_param: LPARAM) -> BOOL {
    // SAFETY: l_param is the `&mut Search` passed to EnumWindows below and
    // outlives the enumeration.
    let search = &mut *(l_param.0 as *mut Search);
    let mut name = [0u16; 256];
    let len = GetClassNameW(hwnd, &mut name);
    if len > 0 && name[..len as usize] == search.class[..] {
        search.found.push(hwnd);
    }
    BOOL(1)
}

fn client_rect(hwnd: HWND) -> Option<WindowInfo> {
    // SAFETY: hwnd came from EnumWindows; a window destroyed in the meantime
    // makes these calls fail, which we treat as "not found".
    unsafe {
        if !IsWindowVisible(hwnd).as_bool() || IsIconic(hwnd).as_bool() {
            return None;
        }
        let mut rect = RECT::default();
        GetClientRect(hwnd, &mut rect).ok()?;
        let mut origin = POINT { x: 0, y: 0 };
        if !ClientToScreen(hwnd, &mut origin).as_bool() {
            return None;
        }
        Some(WindowInfo {
            handle: hwnd.0 as usize as u64,
            left: origin.x,
            top: origin.y,
            width: rect.right - rect.left,
            height: rect.bottom - rect.top,
        })
    }
}

impl WindowProbe for WindowsWindowProbe {
    fn find_windows(&self, class: &str) -> Result<Vec<WindowInfo>, WindowProbeError> {
        let mut search = Search {
            class: class.encode_utf16().collect(),
            found: Vec::new(),
        };
        // SAFETY: the callback only touches `search`, which lives on this
        // stack frame for the whole call.
        unsafe {
            EnumWindows(
                Some(collect_matching),
                LPARAM(&mut search as *mut Search as isize),
            )
        }
        .map_err(|e| WindowProbeError::Platform(e.to_string()))?;

        Ok(search.found.into_iter().filter_map(client_rect).collect())
    }

    fn cursor_visible(&self) -> Result<bool, WindowProbeError> {
        let mut info = CURSORINFO {
            cbSize: std::mem::size_of::<CURSORINFO>() as u32,
            ..Default::default()
        };
        // SAFETY: info is a properly sized CURSORINFO.
        unsafe { GetCursorInfo(&mut info) }.map_err(|e| WindowProbeError::Platform(e.to_string()))?;
        Ok(info.flags.0 & CURSOR_SHOWING.0 != 0)
    }

    fn foreground_window(&self) -> Option<u64> {
        // SAFETY: no preconditions.
        let hwnd = unsafe { GetForegroundWindow() };
        (!hwnd.is_invalid()).then(|| hwnd.0 as usize as u64)
    }
}
