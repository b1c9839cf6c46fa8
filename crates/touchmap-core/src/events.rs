//! Events carried by the dispatcher.

/// Lifecycle phase of a finger as seen by the mappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TouchAction {
    Down,
    Pressed,
    Up,
}

/// Snapshot of one slot at a `SYN_REPORT`, in the rotated device frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchEvent {
    pub slot: usize,
    pub tracking_id: i32,
    pub x: i32,
    pub y: i32,
    /// Where the finger first landed.
    pub sx: i32,
    pub sy: i32,
    /// This finger currently drives the camera.
    pub is_mouse: bool,
    /// This finger currently drives the joystick.
    pub is_wasd: bool,
}

/// Named broadcast channels.  Touch events bypass these and use the
/// dispatcher's direct path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    ConfigReload,
    LayoutReload,
    WasdBlock,
    MenuModeToggle,
    NetworkLag,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::ConfigReload,
        Channel::LayoutReload,
        Channel::WasdBlock,
        Channel::MenuModeToggle,
        Channel::NetworkLag,
    ];
}

/// Everything that flows through the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MapperEvent {
    Touch { action: TouchAction, touch: TouchEvent },
    Config,
    Layout,
    /// The host cursor became visible (`true`) or hidden (`false`).
    MenuMode { visible: bool },
    /// A HUD button under the joystick finger raised or lifted the block.
    WasdBlock { blocked: bool },
    /// The input bridge is overloaded: `n` rejected commands so far and the
    /// mean time, in seconds, a rejected enqueue spent blocked.
    Network { n: u64, avg_dt: f64 },
}

impl MapperEvent {
    /// Broadcast channel for this event; `None` for touch events.
    pub fn channel(&self) -> Option<Channel> {
        match self {
            Self::Touch { .. } => None,
            Self::Config => Some(Channel::ConfigReload),
            Self::Layout => Some(Channel::LayoutReload),
            Self::MenuMode { .. } => Some(Channel::MenuModeToggle),
            Self::WasdBlock { .. } => Some(Channel::WasdBlock),
            Self::Network { .. } => Some(Channel::NetworkLag),
        }
    }
}
