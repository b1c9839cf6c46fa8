//! HUD layout snapshot: the zone map loaded from the layout JSON file.
//!
//! The layout file is a JSON list exported by the HUD authoring tool:
//!
//! ```json
//! [
//!   { "name": "jump", "scancode": "0x39", "type": "CIRCLE",
//!     "cx": 2100, "cy": 800, "val1": 90 },
//!   { "name": "map", "scancode": "0x32", "type": "RECT",
//!     "val1": 40, "val2": 30, "val3": 160, "val4": 110 },
//!   { "name": "wheel", "scancode": "MOUSE_WHEEL", "type": "CIRCLE",
//!     "cx": 300, "cy": 800, "val1": 80 },
//!   { "name": "sprint", "scancode": "SPRINT_DISTANCE", "type": "CIRCLE",
//!     "cx": 300, "cy": 450, "val1": 40 }
//! ]
//! ```
//!
//! Coordinates are device pixels.  For circles `val1` is the radius; for
//! rectangles `val1..val4` are `x1, y1, x2, y2`.  Items that fail validation
//! are skipped with a warning; the file as a whole only fails when it is not
//! a JSON list or when a joystick marker is missing.
//!
//! A [`LayoutSnapshot`] is immutable.  Reloading builds a new one and swaps
//! the pointer, so a reader holding an `Arc<LayoutSnapshot>` never sees a
//! half-updated zone map.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use super::zone::{Zone, ZoneKey, ZoneShape};

/// Errors produced while loading a layout.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// The layout file could not be read.
    #[error("I/O error reading layout at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON.
    #[error("failed to parse layout JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// The top-level JSON value is not a list.
    #[error("layout must be a JSON list of zone items")]
    NotAList,

    /// A required joystick marker is absent.
    #[error("layout is missing the {0} marker")]
    MissingMarker(&'static str),

    /// A joystick marker has an unusable shape or size.
    #[error("layout marker {0} is invalid: {1}")]
    InvalidMarker(&'static str, &'static str),

    /// The configured device resolution cannot be used for normalisation.
    #[error("device resolution {0}x{1} is invalid")]
    InvalidDeviceRes(u32, u32),
}

/// One raw item from the layout file.
#[derive(Debug, Clone, Deserialize)]
struct LayoutItem {
    #[serde(default)]
    name: String,
    scancode: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    cx: f64,
    #[serde(default)]
    cy: f64,
    #[serde(default)]
    val1: f64,
    #[serde(default)]
    val2: f64,
    #[serde(default)]
    val3: f64,
    #[serde(default)]
    val4: f64,
}

/// Immutable zone map plus the joystick radii derived from the markers.
#[derive(Debug, Clone)]
pub struct LayoutSnapshot {
    zones: Vec<Zone>,
    index: HashMap<ZoneKey, usize>,
    device_res: (u32, u32),
    inner_radius_px: f64,
    outer_radius_px: f64,
}

impl LayoutSnapshot {
    /// Parses a layout document and normalises it against `device_res`.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError`] when the JSON is malformed, not a list, or
    /// when either joystick marker is missing or degenerate.
    pub fn from_json(text: &str, device_res: (u32, u32)) -> Result<Self, LayoutError> {
        let (w, h) = device_res;
        if w == 0 || h == 0 {
            return Err(LayoutError::InvalidDeviceRes(w, h));
        }

        let value: serde_json::Value = serde_json::from_str(text)?;
        let items = value.as_array().ok_or(LayoutError::NotAList)?;

        let mut zones: Vec<Zone> = Vec::with_capacity(items.len());
        let mut index = HashMap::with_capacity(items.len());

        for (pos, raw) in items.iter().enumerate() {
            let item: LayoutItem = match serde_json::from_value(raw.clone()) {
                Ok(item) => item,
                Err(e) => {
                    warn!("layout item #{pos} skipped: {e}");
                    continue;
                }
            };
            let zone = match normalise_item(&item, w as f64, h as f64) {
                Ok(zone) => zone,
                Err(reason) => {
                    warn!("layout item #{pos} ({}) skipped: {reason}", item.name);
                    continue;
                }
            };
            if let Some(&existing) = index.get(&zone.key) {
                warn!("layout key {} defined twice; keeping the later item", zone.key);
                zones[existing] = zone;
            } else {
                index.insert(zone.key, zones.len());
                zones.push(zone);
            }
        }

        let wheel = index
            .get(&ZoneKey::MouseWheel)
            .map(|&i| &zones[i])
            .ok_or(LayoutError::MissingMarker(ZoneKey::MOUSE_WHEEL))?;
        let sprint = index
            .get(&ZoneKey::SprintDistance)
            .map(|&i| &zones[i])
            .ok_or(LayoutError::MissingMarker(ZoneKey::SPRINT_DISTANCE))?;

        let (wheel_cy, wheel_r) = match wheel.shape {
            ZoneShape::Circle { cy, r, .. } => (cy, r),
            ZoneShape::Rect { .. } => {
                return Err(LayoutError::InvalidMarker(ZoneKey::MOUSE_WHEEL, "must be a circle"))
            }
        };
        let sprint_cy = match sprint.shape {
            ZoneShape::Circle { cy, .. } => cy,
            ZoneShape::Rect { y1, y2, .. } => (y1 + y2) / 2.0,
        };

        let inner_radius_px = wheel_r * w as f64;
        let outer_radius_px = (sprint_cy - wheel_cy).abs() * h as f64;
        if outer_radius_px <= 0.0 {
            return Err(LayoutError::InvalidMarker(
                ZoneKey::SPRINT_DISTANCE,
                "must sit above or below the wheel centre",
            ));
        }
        if outer_radius_px < inner_radius_px {
            warn!(
                "sprint distance {outer_radius_px:.0}px is shorter than the wheel radius {inner_radius_px:.0}px"
            );
        }

        Ok(Self {
            zones,
            index,
            device_res,
            inner_radius_px,
            outer_radius_px,
        })
    }

    /// Returns the zone registered under `key`.
    pub fn get(&self, key: ZoneKey) -> Option<&Zone> {
        self.index.get(&key).map(|&i| &self.zones[i])
    }

    /// Iterates all zones in file order, markers included.
    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter()
    }

    /// Iterates the scancodes of every button zone.
    pub fn scancodes(&self) -> impl Iterator<Item = u16> + '_ {
        self.zones.iter().filter_map(|z| z.key.scancode())
    }

    /// Finds the first button zone (markers excluded) under a device pixel.
    pub fn button_at(&self, x: i32, y: i32) -> Option<&Zone> {
        let (w, h) = (self.device_res.0 as f64, self.device_res.1 as f64);
        let (nx, ny) = (x as f64 / w, y as f64 / h);
        let aspect = h / w;
        self.zones
            .iter()
            .filter(|z| !z.key.is_marker())
            .find(|z| z.contains(nx, ny, aspect))
    }

    /// Device resolution the zones were normalised against.
    pub fn device_res(&self) -> (u32, u32) {
        self.device_res
    }

    /// Joystick deadzone base radius in device pixels.
    pub fn inner_radius_px(&self) -> f64 {
        self.inner_radius_px
    }

    /// Joystick leash length in device pixels.
    pub fn outer_radius_px(&self) -> f64 {
        self.outer_radius_px
    }

    /// Number of zones, markers included.
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    /// Returns `true` when the layout holds no zones.
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

fn normalise_item(item: &LayoutItem, w: f64, h: f64) -> Result<Zone, &'static str> {
    let key = ZoneKey::parse(&item.scancode).ok_or("unrecognised scancode")?;
    let values = [item.cx, item.cy, item.val1, item.val2, item.val3, item.val4];
    if values.iter().any(|v| !v.is_finite()) {
        return Err("non-finite coordinate");
    }

    let shape = match item.kind.to_ascii_uppercase().as_str() {
        "CIRCLE" => {
            if item.val1 <= 0.0 {
                return Err("circle radius must be positive");
            }
            ZoneShape::Circle {
                cx: item.cx / w,
                cy: item.cy / h,
                r: item.val1 / w,
            }
        }
        "RECT" => {
            let (x1, x2) = min_max(item.val1 / w, item.val3 / w);
            let (y1, y2) = min_max(item.val2 / h, item.val4 / h);
            if x1 == x2 || y1 == y2 {
                return Err("rectangle has zero area");
            }
            ZoneShape::Rect { x1, y1, x2, y2 }
        }
        _ => return Err("type must be CIRCLE or RECT"),
    };

    Ok(Zone {
        key,
        name: item.name.clone(),
        shape,
    })
}

fn min_max(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RES: (u32, u32) = (2400, 1080);

    fn markers() -> &'static str {
        r#"
        { "name": "wheel", "scancode": "MOUSE_WHEEL", "type": "CIRCLE", "cx": 200, "cy": 900, "val1": 80 },
        { "name": "sprint", "scancode": "SPRINT_DISTANCE", "type": "CIRCLE", "cx": 200, "cy": 550, "val1": 30 }
        "#
    }

    fn layout_with(extra: &str) -> String {
        if extra.is_empty() {
            format!("[{}]", markers())
        } else {
            format!("[{}, {}]", extra, markers())
        }
    }

    #[test]
    fn test_derives_joystick_radii_from_markers() {
        // Arrange
        let text = layout_with("");

        // Act
        let layout = LayoutSnapshot::from_json(&text, RES).expect("valid layout");

        // Assert
        assert!((layout.inner_radius_px() - 80.0).abs() < 1e-9);
        assert!((layout.outer_radius_px() - 350.0).abs() < 1e-9);
    }

    #[test]
    fn test_circle_is_normalised_against_device_res() {
        let text = layout_with(
            r#"{ "name": "jump", "scancode": "0x39", "type": "CIRCLE", "cx": 1200, "cy": 540, "val1": 120 }"#,
        );
        let layout = LayoutSnapshot::from_json(&text, RES).expect("valid layout");

        let zone = layout.get(ZoneKey::Scancode(0x39)).expect("jump zone");
        assert_eq!(
            zone.shape,
            ZoneShape::Circle { cx: 0.5, cy: 0.5, r: 0.05 }
        );
    }

    #[test]
    fn test_rect_corners_are_sorted() {
        let text = layout_with(
            r#"{ "name": "map", "scancode": "0x32", "type": "RECT", "val1": 480, "val2": 216, "val3": 240, "val4": 108 }"#,
        );
        let layout = LayoutSnapshot::from_json(&text, RES).expect("valid layout");

        let zone = layout.get(ZoneKey::Scancode(0x32)).expect("map zone");
        assert_eq!(
            zone.shape,
            ZoneShape::Rect { x1: 0.1, y1: 0.1, x2: 0.2, y2: 0.2 }
        );
    }

    #[test]
    fn test_invalid_items_are_skipped_not_fatal() {
        let text = layout_with(
            r#"{ "name": "bad", "scancode": "nope", "type": "CIRCLE", "cx": 1, "cy": 1, "val1": 1 },
               { "name": "bad2", "scancode": "0x10", "type": "TRIANGLE" },
               { "name": "bad3", "type": "CIRCLE" },
               { "name": "ok", "scancode": "0x10", "type": "CIRCLE", "cx": 10, "cy": 10, "val1": 5 }"#,
        );
        let layout = LayoutSnapshot::from_json(&text, RES).expect("valid layout");

        assert_eq!(layout.len(), 3);
        assert!(layout.get(ZoneKey::Scancode(0x10)).is_some());
    }

    #[test]
    fn test_missing_marker_is_an_error() {
        let text = r#"[{ "name": "wheel", "scancode": "MOUSE_WHEEL", "type": "CIRCLE", "cx": 200, "cy": 900, "val1": 80 }]"#;
        let err = LayoutSnapshot::from_json(text, RES).unwrap_err();
        assert!(matches!(err, LayoutError::MissingMarker("SPRINT_DISTANCE")));
    }

    #[test]
    fn test_non_list_document_is_rejected() {
        let err = LayoutSnapshot::from_json(r#"{"zones": []}"#, RES).unwrap_err();
        assert!(matches!(err, LayoutError::NotAList));
    }

    #[test]
    fn test_malformed_json_is_a_parse_error() {
        let err = LayoutSnapshot::from_json("[{", RES).unwrap_err();
        assert!(matches!(err, LayoutError::Parse(_)));
    }

    #[test]
    fn test_rect_wheel_marker_is_rejected() {
        let text = r#"[
            { "name": "wheel", "scancode": "MOUSE_WHEEL", "type": "RECT", "val1": 0, "val2": 0, "val3": 10, "val4": 10 },
            { "name": "sprint", "scancode": "SPRINT_DISTANCE", "type": "CIRCLE", "cx": 200, "cy": 550, "val1": 30 }
        ]"#;
        let err = LayoutSnapshot::from_json(text, RES).unwrap_err();
        assert!(matches!(err, LayoutError::InvalidMarker("MOUSE_WHEEL", _)));
    }

    #[test]
    fn test_button_at_ignores_markers() {
        let text = layout_with(
            r#"{ "name": "jump", "scancode": "0x39", "type": "CIRCLE", "cx": 2100, "cy": 800, "val1": 90 }"#,
        );
        let layout = LayoutSnapshot::from_json(&text, RES).expect("valid layout");

        assert_eq!(
            layout.button_at(2120, 820).map(|z| z.key),
            Some(ZoneKey::Scancode(0x39))
        );
        // Inside the wheel marker only.
        assert!(layout.button_at(200, 900).is_none());
    }

    #[test]
    fn test_duplicate_keys_keep_the_later_item() {
        let text = layout_with(
            r#"{ "name": "a", "scancode": "0x39", "type": "CIRCLE", "cx": 100, "cy": 100, "val1": 10 },
               { "name": "b", "scancode": "0x39", "type": "CIRCLE", "cx": 900, "cy": 100, "val1": 10 }"#,
        );
        let layout = LayoutSnapshot::from_json(&text, RES).expect("valid layout");

        assert_eq!(layout.get(ZoneKey::Scancode(0x39)).map(|z| z.name.as_str()), Some("b"));
        assert_eq!(layout.scancodes().count(), 1);
    }

    #[test]
    fn test_zero_device_res_is_rejected() {
        let err = LayoutSnapshot::from_json("[]", (0, 1080)).unwrap_err();
        assert!(matches!(err, LayoutError::InvalidDeviceRes(0, 1080)));
    }
}
