//! Desktop notifications through `notify-rust`: the freedesktop notification
//! service over D-Bus on Linux, toast notifications on Windows.

use notify_rust::Notification;

use crate::platform::{NotificationSink, PlatformError};

/// Application name shown with each notification.
const APP_NAME: &str = "MultiTooner";

pub struct DesktopSink;

impl NotificationSink for DesktopSink {
    fn notify(&self, title: &str, message: &str) -> Result<(), PlatformError> {
        build(title, message)
            .show()
            .map(|_| ())
            .map_err(|e| PlatformError::Unavailable(format!("desktop notification failed: {e}")))
    }
}

fn build(title: &str, message: &str) -> Notification {
    let mut notification = Notification::new();
    notification.appname(APP_NAME).summary(title).body(message);
    notification
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_carries_title_and_message() {
        let notification = build("Cog Invasion", "Flunky invasion in Gulp Gulch!");
        assert_eq!(notification.appname, APP_NAME);
        assert_eq!(notification.summary, "Cog Invasion");
        assert_eq!(notification.body, "Flunky invasion in Gulp Gulch!");
    }
}
