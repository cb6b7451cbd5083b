//! Notification Center banners through AppleScript.

use std::process::Command;

use crate::platform::{NotificationSink, PlatformError};

/// Runs `osascript -e 'display notification ...'` for each notification.
pub struct OsascriptSink;

impl NotificationSink for OsascriptSink {
    fn notify(&self, title: &str, message: &str) -> Result<(), PlatformError> {
        let script = format!(
            "display notification \"{}\" with title \"{}\"",
            escape(message),
            escape(title)
        );

        let output = Command::new("osascript").args(["-e", &script]).output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(PlatformError::Other(format!(
                "osascript failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

/// Escapes a string for use inside an AppleScript string literal.
fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
