//! Platform abstraction layer.
//!
//! Defines the OS collaborators used by the rest of the app: the login item
//! behind the "Run at Login" toggle and the notification sink used by the
//! invasion notifier. Platform-specific implementations live in child modules
//! and are selected by the factory functions below.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(any(target_os = "linux", target_os = "windows"))]
mod desktop;

#[cfg(target_os = "linux")]
use linux as imp;
#[cfg(target_os = "macos")]
use macos as imp;
#[cfg(target_os = "windows")]
use windows as imp;

use std::path::PathBuf;

use crate::toggle::BooleanSource;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// The OS setting that starts the app when the user logs in.
pub type LoginItem = Box<dyn BooleanSource<Error = PlatformError>>;

/// Presents a user-visible notification.
pub trait NotificationSink {
    fn notify(&self, title: &str, message: &str) -> Result<(), PlatformError>;
}

/// Writes notifications to the log. Used outside graphical sessions and on
/// platforms without a desktop backend.
#[cfg_attr(any(target_os = "macos", target_os = "windows"), allow(dead_code))]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, title: &str, message: &str) -> Result<(), PlatformError> {
        log::info!("notify: {title}: {message}");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Login command
// ---------------------------------------------------------------------------

/// Subcommand the login item runs.
pub const LOGIN_SUBCOMMAND: &str = "watch";

/// The command line a login item starts: this executable in watch mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl LoginCommand {
    pub fn current() -> Result<Self, PlatformError> {
        let program = std::env::current_exe()?;
        Ok(LoginCommand {
            program,
            args: vec![LOGIN_SUBCOMMAND.to_string()],
        })
    }
}

// ---------------------------------------------------------------------------
// Factories
// ---------------------------------------------------------------------------

/// Returns the login item for the current platform.
pub fn create_login_item() -> Result<LoginItem, PlatformError> {
    #[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
    {
        imp::create_login_item(LoginCommand::current()?)
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        Err(PlatformError::Unavailable(
            "run at login is not supported on this platform".into(),
        ))
    }
}

/// Returns the notification sink for the current platform.
pub fn create_notification_sink() -> Box<dyn NotificationSink> {
    #[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
    {
        imp::create_notification_sink()
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        Box::new(LogSink)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
