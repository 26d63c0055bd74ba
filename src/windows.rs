//! Windows implementation using `RegisterHotKey` and the thread message queue.

use crate::event::Notification;
use crate::hotkey::{Hotkey, Modifiers};
use crate::platform::Platform;
use crate::registry::HotKeyId;
use anyhow::{Context, Result};
use std::marker::PhantomData;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    RegisterHotKey, UnregisterHotKey, HOT_KEY_MODIFIERS, MOD_ALT, MOD_CONTROL, MOD_SHIFT, MOD_WIN,
};
use windows::Win32::UI::WindowsAndMessaging::{PeekMessageW, MSG, PM_REMOVE, WM_HOTKEY};

/// Convert our modifier set to `RegisterHotKey` flags.
fn to_win32_modifiers(modifiers: Modifiers) -> HOT_KEY_MODIFIERS {
    let mut flags = 0;
    if modifiers.alt {
        flags |= MOD_ALT.0;
    }
    if modifiers.ctrl {
        flags |= MOD_CONTROL.0;
    }
    if modifiers.shift {
        flags |= MOD_SHIFT.0;
    }
    if modifiers.meta {
        flags |= MOD_WIN.0;
    }
    HOT_KEY_MODIFIERS(flags)
}

/// Hotkeys registered without a window.
///
/// `WM_HOTKEY` is posted to the queue of the thread that called
/// `RegisterHotKey`, so the value must stay on the thread that created it.
pub struct Win32Platform {
    _thread_bound: PhantomData<*const ()>,
}

impl Win32Platform {
    pub fn new() -> Self {
        Self {
            _thread_bound: PhantomData,
        }
    }
}

impl Default for Win32Platform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for Win32Platform {
    fn poll_notification(&mut self) -> Option<Notification> {
        let mut msg = MSG::default();
        let found = unsafe { PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE) };
        if !found.as_bool() {
            return None;
        }

        if msg.message == WM_HOTKEY {
            Some(Notification::HotKey(HotKeyId::from_raw(msg.wParam.0 as i32)))
        } else {
            Some(Notification::Other(msg.message))
        }
    }

    fn install_hotkey(&mut self, id: HotKeyId, hotkey: &Hotkey) -> Result<()> {
        unsafe {
            RegisterHotKey(
                None,
                id.as_raw(),
                to_win32_modifiers(hotkey.modifiers),
                hotkey.key.code(),
            )
        }
        .with_context(|| format!("RegisterHotKey failed for {}", hotkey))
    }

    fn remove_hotkey(&mut self, id: HotKeyId) -> Result<()> {
        unsafe { UnregisterHotKey(None, id.as_raw()) }
            .with_context(|| format!("UnregisterHotKey failed for {}", id))
    }
}
