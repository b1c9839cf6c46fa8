//! In-memory [`CommandSink`] for tests and dry runs.
//!
//! Every submitted command is pushed into a `Mutex<Vec<_>>` so assertions
//! can inspect exactly what a mapper asked for, in order.  Setting
//! `fail_with` makes every submit return that error instead.

use std::sync::Mutex;

use touchmap_core::{CommandSink, InjectCommand, SinkError};

#[derive(Default)]
pub struct RecordingSink {
    pub commands: Mutex<Vec<InjectCommand>>,
    pub fail_with: Mutex<Option<SinkError>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns and clears everything recorded so far.
    pub fn take(&self) -> Vec<InjectCommand> {
        std::mem::take(&mut *self.commands.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn snapshot(&self) -> Vec<InjectCommand> {
        self.commands.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl CommandSink for RecordingSink {
    fn submit(&self, command: InjectCommand) -> Result<(), SinkError> {
        if let Some(err) = *self.fail_with.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(err);
        }
        self.commands
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(command);
        Ok(())
    }
}
