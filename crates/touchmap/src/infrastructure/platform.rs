//! Scheduling priority for the latency-sensitive parts of the process.
//!
//! On Windows the process is raised to `HIGH_PRIORITY_CLASS` at startup and
//! the input bridge worker to `THREAD_PRIORITY_TIME_CRITICAL`.  Elsewhere
//! both calls are no-ops.  Failure is logged and never fatal.

use tracing::debug;

/// Raises the whole process's priority class.
pub fn raise_process_priority() {
    #[cfg(target_os = "windows")]
    {
        use windows::Win32::System::Threading::{
            GetCurrentProcess, SetPriorityClass, HIGH_PRIORITY_CLASS,
        };
        // SAFETY: GetCurrentProcess returns a pseudo-handle that is always
        // valid for the calling process.
        match unsafe { SetPriorityClass(GetCurrentProcess(), HIGH_PRIORITY_CLASS) } {
            Ok(()) => debug!("process priority raised to HIGH"),
            Err(e) => tracing::warn!("could not raise process priority: {e}"),
        }
    }
    #[cfg(not(target_os = "windows"))]
    debug!("process priority left unchanged on this platform");
}

/// Raises the calling thread's priority.
pub fn raise_current_thread_priority() {
    #[cfg(target_os = "windows")]
    {
        use windows::Win32::System::Threading::{
            GetCurrentThread, SetThreadPriority, THREAD_PRIORITY_TIME_CRITICAL,
        };
        // SAFETY: GetCurrentThread returns a pseudo-handle for the calling
        // thread.
        if let Err(e) = unsafe { SetThreadPriority(GetCurrentThread(), THREAD_PRIORITY_TIME_CRITICAL) } {
            tracing::warn!("could not raise thread priority: {e}");
        }
    }
    #[cfg(not(target_os = "windows"))]
    debug!("thread priority left unchanged on this platform");
}
