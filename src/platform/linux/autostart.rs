//! Run at login through an XDG autostart desktop entry.
//!
//! The entry lives at `<config>/autostart/multitooner.desktop`. It counts as
//! enabled when the file exists and is not switched off with `Hidden=true` or
//! `X-GNOME-Autostart-enabled=false`. A file without a `[Desktop Entry]`
//! group cannot be interpreted, and the login item reports itself unavailable
//! rather than guessing.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::platform::{LoginCommand, PlatformError};
use crate::toggle::BooleanSource;

/// File name of the autostart entry.
const ENTRY_FILE: &str = "multitooner.desktop";

const DESKTOP_ENTRY_GROUP: &str = "[Desktop Entry]";

// ---------------------------------------------------------------------------
// Public struct
// ---------------------------------------------------------------------------

pub struct DesktopAutostart {
    path: PathBuf,
    command: LoginCommand,
}

impl DesktopAutostart {
    pub fn new(dir: PathBuf, command: LoginCommand) -> Self {
        DesktopAutostart {
            path: dir.join(ENTRY_FILE),
            command,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn render(&self) -> String {
        format!(
            "{DESKTOP_ENTRY_GROUP}\n\
             Type=Application\n\
             Name=MultiTooner\n\
             Comment=Cog invasion notifications\n\
             Exec={}\n\
             Terminal=false\n\
             X-GNOME-Autostart-enabled=true\n",
            exec_line(&self.command)
        )
    }
}

/// Builds the `Exec` value. Every argument is quoted; inside the quotes `"`,
/// `` ` `` and `$` get a backslash, a literal backslash becomes four (quoting
/// rule, then the string-value escape) and `%` is doubled so it is not read
/// as a field code.
fn exec_line(command: &LoginCommand) -> String {
    let program = command.program.to_string_lossy();
    std::iter::once(program.as_ref())
        .chain(command.args.iter().map(String::as_str))
        .map(quote_exec_arg)
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote_exec_arg(arg: &str) -> String {
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for c in arg.chars() {
        match c {
            '"' | '`' | '$' => {
                quoted.push('\\');
                quoted.push(c);
            }
            '\\' => quoted.push_str(r"\\\\"),
            '%' => quoted.push_str("%%"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

// ---------------------------------------------------------------------------
// BooleanSource trait impl
// ---------------------------------------------------------------------------

impl BooleanSource for DesktopAutostart {
    type Error = PlatformError;

    fn is_enabled(&self) -> Result<bool, PlatformError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => entry_is_enabled(&text),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(PlatformError::Io(e)),
        }
    }

    fn enable(&mut self) -> Result<(), PlatformError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, self.render())?;
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

/// Interprets the contents of an autostart entry.
fn entry_is_enabled(text: &str) -> Result<bool, PlatformError> {
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'));

    if lines.next() != Some(DESKTOP_ENTRY_GROUP) {
        return Err(PlatformError::Other(
            "autostart entry has no [Desktop Entry] group".into(),
        ));
    }

    for line in lines {
        if line.starts_with('[') {
            break;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match (key.trim(), value.trim()) {
            ("Hidden", "true") | ("X-GNOME-Autostart-enabled", "false") => return Ok(false),
            _ => {}
        }
    }
    Ok(true)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
