//! Scripted device streams for tests.
//!
//! [`ScriptedLauncher`] hands out one pre-recorded session per launch.  Each
//! session yields its lines and then either ends cleanly or fails.  Once the
//! scripts run out, further launches return a stream that never produces a
//! line, which parks the reader until shutdown.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use touchmap_core::Rotation;

use super::{DeviceError, EventStream, RotationProbe, StreamLauncher};

/// How a scripted session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Eof,
    Error,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub lines: Vec<String>,
    pub end: SessionEnd,
}

impl Session {
    pub fn new<I, S>(lines: I, end: SessionEnd) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            end,
        }
    }
}

#[derive(Debug, Default)]
pub struct ScriptedLauncher {
    sessions: Mutex<VecDeque<Session>>,
    launches: AtomicUsize,
    /// When `true`, every launch fails before producing a stream.
    pub should_fail: bool,
}

impl ScriptedLauncher {
    pub fn new(sessions: impl IntoIterator<Item = Session>) -> Self {
        Self {
            sessions: Mutex::new(sessions.into_iter().collect()),
            launches: AtomicUsize::new(0),
            should_fail: false,
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamLauncher for ScriptedLauncher {
    async fn launch(&self) -> Result<Box<dyn EventStream>, DeviceError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(DeviceError::NoDevice);
        }
        let next = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        Ok(match next {
            Some(session) => Box::new(ScriptedStream {
                lines: session.lines.into(),
                end: session.end,
            }),
            None => Box::new(SilentStream),
        })
    }
}

struct ScriptedStream {
    lines: VecDeque<String>,
    end: SessionEnd,
}

#[async_trait]
impl EventStream for ScriptedStream {
    async fn next_line(&mut self) -> Result<Option<String>, DeviceError> {
        match self.lines.pop_front() {
            Some(line) => Ok(Some(line)),
            None => match self.end {
                SessionEnd::Eof => Ok(None),
                SessionEnd::Error => Err(DeviceError::Read(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "device disconnected",
                ))),
            },
        }
    }
}

struct SilentStream;

#[async_trait]
impl EventStream for SilentStream {
    async fn next_line(&mut self) -> Result<Option<String>, DeviceError> {
        std::future::pending().await
    }
}

/// Rotation probe that always reports the same value.
#[derive(Debug, Clone, Copy)]
pub struct FixedRotation(pub Rotation);

#[async_trait]
impl RotationProbe for FixedRotation {
    async fn rotation(&self) -> Result<Rotation, DeviceError> {
        Ok(self.0)
    }
}
