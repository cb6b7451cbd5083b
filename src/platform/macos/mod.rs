//! macOS platform backend.
//!
//! Run at login: a per-user LaunchAgent via `LaunchAgent`.
//! Notifications: `display notification` through `osascript` via `OsascriptSink`.
//!
//! Neither backend needs extra permissions. The first notification may make
//! macOS ask whether Script Editor is allowed to post notifications; the user
//! can change that later in
//!   System Settings > Notifications > Script Editor

mod launch_agent;
mod notify;

use launch_agent::LaunchAgent;
use notify::OsascriptSink;

use crate::platform::{LoginCommand, LoginItem, NotificationSink, PlatformError};

// ---------------------------------------------------------------------------
// Factory: login item
// ---------------------------------------------------------------------------

/// Returns the LaunchAgent under `~/Library/LaunchAgents`.
pub fn create_login_item(command: LoginCommand) -> Result<LoginItem, PlatformError> {
    let dir = dirs::home_dir()
        .ok_or_else(|| PlatformError::Unavailable("no home directory".into()))?
        .join("Library")
        .join("LaunchAgents");
    let item = LaunchAgent::new(dir, command);
    log::debug!("platform: launch agent at {}", item.path().display());
    Ok(Box::new(item))
}

// ---------------------------------------------------------------------------
// Factory: notification sink
// ---------------------------------------------------------------------------

/// Returns the osascript-backed notification sink.
pub fn create_notification_sink() -> Box<dyn NotificationSink> {
    Box::new(OsascriptSink)
}
