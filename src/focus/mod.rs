//! Focus-or-restore action: bring a program's main window to the front.
//!
//! This is the action bound by the `focus-hotkeys` binary. A program is
//! looked up by executable name, its main window is the first visible,
//! unowned, non-tool top-level window, and a minimized window is restored
//! before it is made the foreground window.

#[cfg(windows)]
mod win32;

use anyhow::Result;
use log::{debug, info, warn};

/// `WS_EX_TOOLWINDOW` extended window style.
pub(crate) const WS_EX_TOOLWINDOW: u32 = 0x0000_0080;

#[cfg_attr(not(windows), allow(dead_code))]
const SW_SHOWMINIMIZED: u32 = 2;
#[cfg_attr(not(windows), allow(dead_code))]
const SW_MINIMIZE: u32 = 6;

/// What [`focus_program`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusOutcome {
    ProcessNotFound,
    NoMainWindow { pid: u32 },
    AlreadyForeground { pid: u32, title: String },
    Focused { pid: u32, title: String },
}

/// Decode a NUL-terminated UTF-16 buffer.
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn decode_wide(buffer: &[u16]) -> String {
    let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
    String::from_utf16_lossy(&buffer[..len])
}

/// Compare a process image name with the requested program name.
pub fn exe_name_matches(exe_file: &str, name: &str) -> bool {
    exe_file.eq_ignore_ascii_case(name.trim())
}

/// A main window is visible, has no owner and is not a tool window.
pub fn is_main_window(ex_style: u32, visible: bool, has_owner: bool) -> bool {
    ex_style & WS_EX_TOOLWINDOW == 0 && visible && !has_owner
}

/// Whether a `WINDOWPLACEMENT::showCmd` describes a minimized window.
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn is_minimized(show_cmd: u32) -> bool {
    show_cmd == SW_SHOWMINIMIZED || show_cmd == SW_MINIMIZE
}

/// Bring the main window of the first process named `exe_name` to the
/// foreground, restoring it if it is minimized.
#[cfg(windows)]
pub fn focus_program(exe_name: &str) -> Result<FocusOutcome> {
    win32::focus_program(exe_name)
}

/// Focusing windows (unsupported platform stub).
#[cfg(not(windows))]
pub fn focus_program(_exe_name: &str) -> Result<FocusOutcome> {
    anyhow::bail!("Window focusing is not supported on this platform")
}

/// A hotkey callback that focuses `program` and logs the outcome.
pub fn focus_action(program: impl Into<String>) -> impl Fn() + Send + Sync + 'static {
    let program = program.into();
    move || {
        info!("Hotkey pressed, focusing {}", program);
        match focus_program(&program) {
            Ok(FocusOutcome::ProcessNotFound) => info!("No running process named {}", program),
            Ok(FocusOutcome::NoMainWindow { pid }) => {
                info!("{} (pid {}) has no main window", program, pid)
            }
            Ok(FocusOutcome::AlreadyForeground { title, .. }) => {
                debug!("\"{}\" is already in the foreground", title)
            }
            Ok(FocusOutcome::Focused { pid, title }) => {
                info!("Focused \"{}\" ({} pid {})", title, program, pid)
            }
            Err(e) => warn!("Failed to focus {}: {:#}", program, e),
        }
    }
}
