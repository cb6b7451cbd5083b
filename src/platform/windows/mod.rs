//! Windows platform backend: HKCU Run key for run at login, toast notifications.
//!
//! Toasts go out under the PowerShell AppUserModelID, since a portable
//! executable has no Start menu shortcut to register its own.

mod run_key;

use run_key::RunKey;

use crate::platform::desktop::DesktopSink;
use crate::platform::{LoginCommand, LoginItem, NotificationSink, PlatformError};

/// Returns a `RunKey` value named after the app.
pub fn create_login_item(command: LoginCommand) -> Result<LoginItem, PlatformError> {
    Ok(Box::new(RunKey::new(command)))
}

/// Returns the toast sink.
pub fn create_notification_sink() -> Box<dyn NotificationSink> {
    Box::new(DesktopSink)
}
