//! Low-level keyboard hook for Esc and F5.
//!
//! `WH_KEYBOARD_LL` sees keys regardless of which window has focus.  The
//! hook lives on its own thread with a Win32 message loop; the hook callback
//! only maps the key and forwards it on a channel, then always passes the
//! event on with `CallNextHookEx`.  Keys injected by software (including our
//! own input bridge) carry `LLKHF_INJECTED` and are skipped.

#![cfg(target_os = "windows")]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use tracing::{debug, warn};
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PostThreadMessageW, SetWindowsHookExW,
    UnhookWindowsHookEx, HC_ACTION, HHOOK, KBDLLHOOKSTRUCT, KBDLLHOOKSTRUCT_FLAGS, LLKHF_INJECTED,
    MSG, WH_KEYBOARD_LL, WM_KEYDOWN, WM_QUIT, WM_SYSKEYDOWN,
};

use super::{hotkey_for_vk, Hotkey, HotkeyError, HotkeySource};

/// Where the hook callback sends hotkeys.  Cleared on stop so the receiver
/// disconnects.
static HOTKEY_SENDER: Mutex<Option<Sender<Hotkey>>> = Mutex::new(None);

#[derive(Debug, Default)]
pub struct WindowsHotkeys {
    started: AtomicBool,
    hook_thread: AtomicU32,
}

impl WindowsHotkeys {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HotkeySource for WindowsHotkeys {
    fn start(&self) -> Result<Receiver<Hotkey>, HotkeyError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(HotkeyError::AlreadyStarted);
        }
        let (tx, rx) = unbounded();
        *HOTKEY_SENDER.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);

        let (ready_tx, ready_rx) = bounded::<Result<u32, String>>(1);
        thread::Builder::new()
            .name("hotkey-hook".to_string())
            .spawn(move || run_hook_message_loop(ready_tx))
            .map_err(|e| HotkeyError::HookInstallFailed(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(thread_id)) => {
                self.hook_thread.store(thread_id, Ordering::Release);
                debug!("keyboard hook installed");
                Ok(rx)
            }
            Ok(Err(reason)) => Err(HotkeyError::HookInstallFailed(reason)),
            Err(_) => Err(HotkeyError::HookInstallFailed("hook thread exited".into())),
        }
    }

    fn stop(&self) {
        HOTKEY_SENDER.lock().unwrap_or_else(PoisonError::into_inner).take();
        let thread_id = self.hook_thread.swap(0, Ordering::AcqRel);
        if thread_id != 0 {
            // SAFETY: posting to a thread id has no memory-safety
            // preconditions; a stale id just makes the call fail.
            if let Err(e) = unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
                warn!("could not stop keyboard hook thread: {e}");
            }
        }
    }
}

/// Entry point for the `hotkey-hook` thread.
fn run_hook_message_loop(ready: Sender<Result<u32, String>>) {
    // SAFETY: SetWindowsHookExW requires the calling thread to pump
    // messages, which the loop below does.
    let hook: HHOOK = match unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0) } {
        Ok(hook) => hook,
        Err(e) => {
            let _ = ready.send(Err(e.to_string()));
            return;
        }
    };
    // SAFETY: no preconditions.
    let _ = ready.send(Ok(unsafe { GetCurrentThreadId() }));

    let mut msg = MSG::default();
    // SAFETY: standard GetMessage/DispatchMessage loop; exits on WM_QUIT.
    unsafe {
        while GetMessageW(&mut msg, None, 0, 0).as_bool() {
            DispatchMessageW(&msg);
        }
        UnhookWindowsHookEx(hook).ok();
    }
    debug!("keyboard hook removed");
}

/// # Safety
///
/// Called by Windows on the hook thread.  For `HC_ACTION`, `l_param` points
/// to a valid `KBDLLHOOKSTRUCT`.
unsafe extern "system" fn keyboard_hook_proc(n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    if n_code != HC_ACTION as i32 {
        return CallNextHookEx(None, n_code, w_param, l_param);
    }

    let message = w_param.0 as u32;
    if message == WM_KEYDOWN || message == WM_SYSKEYDOWN {
        let kbs = &*(l_param.0 as *const KBDLLHOOKSTRUCT);
        let injected = (kbs.flags & LLKHF_INJECTED) != KBDLLHOOKSTRUCT_FLAGS(0);
        if !injected {
            if let Some(hotkey) = hotkey_for_vk(kbs.vkCode) {
                if let Some(tx) = HOTKEY_SENDER.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
                    let _ = tx.send(hotkey);
                }
            }
        }
    }

    CallNextHookEx(None, n_code, w_param, l_param)
}
