use super::{decode_wide, exe_name_matches, is_main_window, is_minimized, FocusOutcome};
use anyhow::{bail, Context, Result};
use log::debug;
use std::mem::size_of;
use windows::core::BOOL;
use windows::Win32::Foundation::{CloseHandle, HANDLE, HWND, LPARAM};
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
    TH32CS_SNAPPROCESS,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetForegroundWindow, GetWindow, GetWindowLongW, GetWindowPlacement,
    GetWindowTextW, GetWindowThreadProcessId, IsWindowVisible, SetForegroundWindow, ShowWindow,
    GWL_EXSTYLE, GW_OWNER, SW_RESTORE, WINDOWPLACEMENT,
};

pub(super) fn focus_program(exe_name: &str) -> Result<FocusOutcome> {
    let Some(pid) = find_process(exe_name)? else {
        return Ok(FocusOutcome::ProcessNotFound);
    };
    debug!("Found process {} for {}", pid, exe_name);

    let Some(hwnd) = main_window(pid) else {
        return Ok(FocusOutcome::NoMainWindow { pid });
    };
    let title = window_title(hwnd);
    debug!("Main window of {}: \"{}\"", pid, title);

    if unsafe { GetForegroundWindow() } == hwnd {
        return Ok(FocusOutcome::AlreadyForeground { pid, title });
    }

    restore_and_focus(hwnd)?;
    Ok(FocusOutcome::Focused { pid, title })
}

/// Closes the Toolhelp snapshot on drop.
struct Snapshot(HANDLE);

impl Drop for Snapshot {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

fn find_process(exe_name: &str) -> Result<Option<u32>> {
    let snapshot = Snapshot(
        unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) }
            .context("Failed to snapshot running processes")?,
    );

    let mut entry = PROCESSENTRY32W {
        dwSize: size_of::<PROCESSENTRY32W>() as u32,
        ..Default::default()
    };

    let mut more = unsafe { Process32FirstW(snapshot.0, &mut entry) }.is_ok();
    while more {
        if exe_name_matches(&decode_wide(&entry.szExeFile), exe_name) {
            return Ok(Some(entry.th32ProcessID));
        }
        more = unsafe { Process32NextW(snapshot.0, &mut entry) }.is_ok();
    }

    Ok(None)
}

struct WindowSearch {
    pid: u32,
    found: Option<HWND>,
}

fn main_window(pid: u32) -> Option<HWND> {
    let mut search = WindowSearch { pid, found: None };
    // Returns an error when the callback stops the enumeration early.
    let _ = unsafe {
        EnumWindows(
            Some(enum_windows_proc),
            LPARAM(&mut search as *mut WindowSearch as isize),
        )
    };
    search.found
}

unsafe extern "system" fn enum_windows_proc(hwnd: HWND, lparam: LPARAM) -> BOOL {
    unsafe {
        let search = &mut *(lparam.0 as *mut WindowSearch);

        let mut pid = 0u32;
        GetWindowThreadProcessId(hwnd, Some(&mut pid as *mut u32));
        if pid != search.pid {
            return BOOL::from(true);
        }

        let ex_style = GetWindowLongW(hwnd, GWL_EXSTYLE) as u32;
        let visible = IsWindowVisible(hwnd).as_bool();
        let has_owner = GetWindow(hwnd, GW_OWNER).is_ok_and(|owner| !owner.is_invalid());
        if !is_main_window(ex_style, visible, has_owner) {
            return BOOL::from(true);
        }

        search.found = Some(hwnd);
        BOOL::from(false)
    }
}

fn window_title(hwnd: HWND) -> String {
    let mut buffer = [0u16; 256];
    let len = unsafe { GetWindowTextW(hwnd, &mut buffer) };
    decode_wide(&buffer[..len.max(0) as usize])
}

fn restore_and_focus(hwnd: HWND) -> Result<()> {
    let mut placement = WINDOWPLACEMENT {
        length: size_of::<WINDOWPLACEMENT>() as u32,
        ..Default::default()
    };
    unsafe { GetWindowPlacement(hwnd, &mut placement) }
        .context("Failed to read window placement")?;

    if is_minimized(placement.showCmd) {
        debug!("Restoring minimized window");
        let _ = unsafe { ShowWindow(hwnd, SW_RESTORE) };
    }

    if !unsafe { SetForegroundWindow(hwnd) }.as_bool() {
        bail!("SetForegroundWindow was refused");
    }
    Ok(())
}
