//! Host game window geometry.

/// Client rectangle of the tracked game window in desktop pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowInfo {
    /// Opaque OS handle, only used for identity comparisons.
    pub handle: u64,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl WindowInfo {
    /// Length of the client-area diagonal, used to pick the largest window.
    pub fn diagonal(&self) -> f64 {
        let (w, h) = (self.width as f64, self.height as f64);
        (w * w + h * h).sqrt()
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Maps a device pixel to an absolute desktop pixel inside this window.
    ///
    /// The HUD covers the whole device screen and the game fills the whole
    /// client area, so the mapping is a plain proportional scale.
    pub fn device_to_game_abs(&self, x: i32, y: i32, device_res: (u32, u32)) -> (i32, i32) {
        let (dw, dh) = device_res;
        if dw == 0 || dh == 0 || self.is_empty() {
            return (0, 0);
        }
        let gx = self.left as i64 + x as i64 * self.width as i64 / dw as i64;
        let gy = self.top as i64 + y as i64 * self.height as i64 / dh as i64;
        (gx as i32, gy as i32)
    }
}
