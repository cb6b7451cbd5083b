//! Run at login through `HKCU\Software\Microsoft\Windows\CurrentVersion\Run`.
//!
//! `RunKey` implements `BooleanSource`. The value named `MultiTooner` holds the
//! quoted command line; its presence is the enabled state.

use std::ffi::c_void;
use std::ptr;

use windows_sys::Win32::Foundation::{ERROR_ACCESS_DENIED, ERROR_FILE_NOT_FOUND, ERROR_SUCCESS};
use windows_sys::Win32::System::Registry::{
    RegDeleteKeyValueW, RegGetValueW, RegSetKeyValueW, HKEY_CURRENT_USER, REG_SZ, RRF_RT_REG_SZ,
};

use crate::platform::{LoginCommand, PlatformError};
use crate::toggle::BooleanSource;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const RUN_SUBKEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Run";

const VALUE_NAME: &str = "MultiTooner";

/// NUL-terminated UTF-16 for the W-suffixed registry functions.
fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// The program quoted, arguments after it. Windows paths cannot contain `"`.
fn command_line(command: &LoginCommand) -> String {
    let mut line = format!("\"{}\"", command.program.display());
    for arg in &command.args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

fn registry_error(call: &str, code: u32) -> PlatformError {
    match code {
        ERROR_ACCESS_DENIED => PlatformError::PermissionDenied(format!("{call} on HKCU\\{RUN_SUBKEY}")),
        _ => PlatformError::Other(format!("{call} failed with code {code}")),
    }
}

// ---------------------------------------------------------------------------
// Public struct
// ---------------------------------------------------------------------------

pub struct RunKey {
    command: LoginCommand,
}

impl RunKey {
    pub fn new(command: LoginCommand) -> Self {
        RunKey { command }
    }
}

// ---------------------------------------------------------------------------
// BooleanSource trait impl
// ---------------------------------------------------------------------------

impl BooleanSource for RunKey {
    type Error = PlatformError;

    fn is_enabled(&self) -> Result<bool, PlatformError> {
        let subkey = wide(RUN_SUBKEY);
        let name = wide(VALUE_NAME);
        let mut size: u32 = 0;

        // Size query only: a null data pointer returns the length.
        let status = unsafe {
            RegGetValueW(
                HKEY_CURRENT_USER,
                subkey.as_ptr(),
                name.as_ptr(),
                RRF_RT_REG_SZ,
                ptr::null_mut(),
                ptr::null_mut(),
                &mut size,
            )
        };

        match status {
            ERROR_SUCCESS => Ok(true),
            ERROR_FILE_NOT_FOUND => Ok(false),
            code => Err(registry_error("RegGetValueW", code)),
        }
    }

    fn enable(&mut self) -> Result<(), PlatformError> {
        let subkey = wide(RUN_SUBKEY);
        let name = wide(VALUE_NAME);
        let data = wide(&command_line(&self.command));
        let bytes = u32::try_from(data.len() * std::mem::size_of::<u16>())
            .map_err(|_| PlatformError::Other("command line too long".into()))?;

        let status = unsafe {
            RegSetKeyValueW(
                HKEY_CURRENT_USER,
                subkey.as_ptr(),
                name.as_ptr(),
                REG_SZ,
                data.as_ptr().cast::<c_void>(),
                bytes,
            )
        };
        if status != ERROR_SUCCESS {
            return Err(registry_error("RegSetKeyValueW", status));
        }
        log::info!("login: set HKCU\\{RUN_SUBKEY}\\{VALUE_NAME}");
        Ok(())
    }

    fn disable(&mut self) -> Result<(), PlatformError> {
        let subkey = wide(RUN_SUBKEY);
        let name = wide(VALUE_NAME);

        let status =
            unsafe { RegDeleteKeyValueW(HKEY_CURRENT_USER, subkey.as_ptr(), name.as_ptr()) };
        match status {
            ERROR_SUCCESS => {
                log::info!("login: deleted HKCU\\{RUN_SUBKEY}\\{VALUE_NAME}");
                Ok(())
            }
            ERROR_FILE_NOT_FOUND => Ok(()),
            code => Err(registry_error("RegDeleteKeyValueW", code)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
