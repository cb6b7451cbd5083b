//! Linux platform backend.
//!
//! Run at login: XDG autostart entry via `DesktopAutostart`.
//! Notifications: the freedesktop notification service via `DesktopSink`.
//!
//! Sink selection at startup:
//! 1. `WAYLAND_DISPLAY` or `DISPLAY` set → graphical session, use `DesktopSink`
//! 2. Neither variable set               → headless, notifications go to the log

mod autostart;

use std::env;

use autostart::DesktopAutostart;

use crate::platform::desktop::DesktopSink;
use crate::platform::{LogSink, LoginCommand, LoginItem, NotificationSink, PlatformError};

/// Variables a session manager sets for graphical sessions. A login item
/// started from a bare TTY or over SSH has neither.
const DISPLAY_VARS: [&str; 2] = ["WAYLAND_DISPLAY", "DISPLAY"];

// ---------------------------------------------------------------------------
// Factory: login item
// ---------------------------------------------------------------------------

/// Returns the autostart entry under `$XDG_CONFIG_HOME/autostart`.
pub fn create_login_item(command: LoginCommand) -> Result<LoginItem, PlatformError> {
    let dir = dirs::config_dir()
        .ok_or_else(|| PlatformError::Unavailable("no XDG config directory".into()))?
        .join("autostart");
    let item = DesktopAutostart::new(dir, command);
    log::debug!("platform: autostart entry at {}", item.path().display());
    Ok(Box::new(item))
}

// ---------------------------------------------------------------------------
// Factory: notification sink
// ---------------------------------------------------------------------------

/// Returns the appropriate `NotificationSink` for the current session.
pub fn create_notification_sink() -> Box<dyn NotificationSink> {
    let graphical = DISPLAY_VARS
        .iter()
        .any(|var| env::var_os(var).is_some_and(|v| !v.is_empty()));
    if graphical {
        log::debug!("platform: graphical session, using desktop notifications");
        Box::new(DesktopSink)
    } else {
        log::debug!("platform: no display server, notifications go to the log");
        Box::new(LogSink)
    }
}
