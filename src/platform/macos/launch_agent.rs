//! Run at login through a per-user LaunchAgent.
//!
//! `LaunchAgent` implements `BooleanSource`. Enabling writes
//! `~/Library/LaunchAgents/<LABEL>.plist` with `RunAtLoad`, so launchd starts
//! `multitooner watch` at the next login; disabling deletes the file. launchd
//! itself is not asked to load or unload anything, the plist on disk is the
//! whole state.
//!
//! A plist that exists but does not parse, or that belongs to another label,
//! makes `is_enabled` fail: the toggle goes Disabled instead of overwriting a
//! file we do not understand.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::platform::{LoginCommand, PlatformError};
use crate::toggle::BooleanSource;

/// launchd job label; also the plist file stem.
const LABEL: &str = "com.multitooner.watch";

// ---------------------------------------------------------------------------
// Property list
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
struct AgentPlist {
    label: String,
    program_arguments: Vec<String>,
    #[serde(default)]
    run_at_load: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    disabled: bool,
}

// ---------------------------------------------------------------------------
// Public struct
// ---------------------------------------------------------------------------

pub struct LaunchAgent {
    path: PathBuf,
    command: LoginCommand,
}

impl LaunchAgent {
    pub fn new(dir: PathBuf, command: LoginCommand) -> Self {
        LaunchAgent {
            path: dir.join(format!("{LABEL}.plist")),
            command,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn plist(&self) -> AgentPlist {
        let mut program_arguments = vec![self.command.program.display().to_string()];
        program_arguments.extend(self.command.args.iter().cloned());
        AgentPlist {
            label: LABEL.to_string(),
            program_arguments,
            run_at_load: true,
            disabled: false,
        }
    }
}

// ---------------------------------------------------------------------------
// BooleanSource trait impl
// ---------------------------------------------------------------------------

impl BooleanSource for LaunchAgent {
    type Error = PlatformError;

    fn is_enabled(&self) -> Result<bool, PlatformError> {
        match fs::metadata(&self.path) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(PlatformError::Io(e)),
        }

        let agent: AgentPlist = plist::from_file(&self.path)
            .map_err(|e| PlatformError::Other(format!("unreadable LaunchAgent: {e}")))?;
        if agent.label != LABEL {
            return Err(PlatformError::Other(format!(
                "{} belongs to job '{}'",
                self.path.display(),
                agent.label
            )));
        }
        Ok(agent.run_at_load && !agent.disabled)
    }

    fn enable(&mut self) -> Result<(), PlatformError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        plist::to_file_xml(&self.path, &self.plist())
            .map_err(|e| PlatformError::Other(format!("cannot write LaunchAgent: {e}")))?;
        log::info!("login: wrote {}", self.path.display());
        Ok(())
    }

    fn disable(&mut self) -> Result<(), PlatformError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                log::info!("login: removed {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PlatformError::Io(e)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(dir: &Path) -> LaunchAgent {
        LaunchAgent::new(
            dir.to_path_buf(),
            LoginCommand {
                program: PathBuf::from("/Applications/MultiTooner.app/Contents/MacOS/multitooner"),
                args: vec!["watch".into()],
            },
        )
    }

    #[test]
    fn enable_writes_run_at_load_plist() {
        let dir = tempfile::tempdir().unwrap();
        let mut item = agent(dir.path());
        assert!(!item.is_enabled().unwrap());

        item.enable().unwrap();
        assert!(item.is_enabled().unwrap());

        let written: AgentPlist = plist::from_file(item.path()).unwrap();
        assert_eq!(written.label, LABEL);
        assert_eq!(written.program_arguments.last().map(String::as_str), Some("watch"));
        assert!(written.run_at_load);

        item.disable().unwrap();
        assert!(!item.is_enabled().unwrap());
    }

    #[test]
    fn corrupt_plist_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let item = agent(dir.path());
        fs::write(item.path(), "definitely not a plist").unwrap();
        assert!(item.is_enabled().is_err());
    }
}
