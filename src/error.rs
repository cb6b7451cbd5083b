//! Top-level error type for the command front end.

use crate::config::ConfigError;
use crate::invasions::FetchError;
use crate::launcher::LaunchError;
use crate::platform::PlatformError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("platform: {0}")]
    Platform(#[from] PlatformError),

    #[error("invasions: {0}")]
    Fetch(#[from] FetchError),

    #[error("launch: {0}")]
    Launch(#[from] LaunchError),

    #[error("cannot read from the terminal: {0}")]
    Prompt(#[from] std::io::Error),

    #[error("{0} account(s) failed to launch")]
    LaunchAll(usize),

    #[error("no accounts configured")]
    NoAccounts,
}

pub type Result<T> = std::result::Result<T, Error>;
