//! Touch input: `getevent` tokenizer, rotation, and the slot state machine.

pub mod rotation;
pub mod token;
pub mod tracker;

pub use token::{parse_line, EventToken};
pub use tracker::{SlotState, TouchSlot, TrackerConfig};
