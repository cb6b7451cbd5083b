//! Config file: global settings plus one section per account.
//!
//! ```toml
//! [DEFAULT]
//! poll_interval_secs = 60
//! notifications = true
//!
//! [main]
//! username = "flippy"
//! password = "hunter2"
//! ```
//!
//! `[DEFAULT]` is reserved for `Settings`; every other section is an account,
//! kept in file order. The file is rewritten after every mutation. A missing
//! file behaves like an empty one.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::account::{check_new_account, Account, AccountError, RESERVED_NAME};
use crate::toggle::BooleanSource;

/// Directory under the platform config dir (Application Support on macOS).
const APP_DIR: &str = "MultiTooner";

const CONFIG_FILE: &str = "config.toml";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no config directory for this user")]
    NoConfigDir,

    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("section [{section}] is invalid: {source}")]
    Section {
        section: String,
        source: toml::de::Error,
    },

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Account(#[from] AccountError),
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Contents of the `[DEFAULT]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds between invasion polls.
    pub poll_interval_secs: u64,
    /// Whether the poll loop posts notifications.
    pub notifications: bool,
    /// Game install directory; the platform default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_directory: Option<PathBuf>,
}

impl Settings {
    pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
    pub const MIN_POLL_INTERVAL_SECS: u64 = 10;
    pub const MAX_POLL_INTERVAL_SECS: u64 = 3600;

    /// Clamps values to their valid ranges.
    fn validate(mut self) -> Self {
        self.poll_interval_secs = self
            .poll_interval_secs
            .clamp(Self::MIN_POLL_INTERVAL_SECS, Self::MAX_POLL_INTERVAL_SECS);
        self
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            poll_interval_secs: Self::DEFAULT_POLL_INTERVAL_SECS,
            notifications: true,
            game_directory: None,
        }
    }
}

/// Contents of an account section.
#[derive(Serialize, Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct ConfigStore {
    path: PathBuf,
    settings: Settings,
    accounts: Vec<Account>,
}

impl ConfigStore {
    /// `<config dir>/MultiTooner/config.toml`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let mut path = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        path.push(APP_DIR);
        path.push(CONFIG_FILE);
        Ok(path)
    }

    /// Reads the config at `path`; a missing file yields defaults.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let (settings, accounts) = read_file(&path)?;
        log::debug!(
            "config: loaded {} account(s) from {}",
            accounts.len(),
            path.display()
        );
        Ok(ConfigStore {
            path,
            settings,
            accounts,
        })
    }

    /// Re-reads the file, dropping in-memory state.
    pub fn reload(&mut self) -> Result<(), ConfigError> {
        let (settings, accounts) = read_file(&self.path)?;
        self.settings = settings;
        self.accounts = accounts;
        Ok(())
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let mut table = toml::Table::new();
        table.insert(
            RESERVED_NAME.to_string(),
            toml::Value::try_from(&self.settings)?,
        );
        for account in &self.accounts {
            let credentials = Credentials {
                username: account.username.clone(),
                password: account.password.clone(),
            };
            table.insert(account.name.clone(), toml::Value::try_from(credentials)?);
        }
        let contents = toml::to_string_pretty(&table)?;

        let io_err = |source: std::io::Error| ConfigError::Io {
            path: self.path.clone(),
            source,
        };
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(io_err)?;

        // The temp file is created owner-only, then renamed over the config so
        // a reader never sees a partial file.
        let mut file = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        file.write_all(contents.as_bytes()).map_err(io_err)?;
        file.as_file().sync_all().map_err(io_err)?;
        file.persist(&self.path).map_err(|e| io_err(e.error))?;
        log::debug!("config: saved {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn account_names(&self) -> Vec<&str> {
        self.accounts.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn account(&self, name: &str) -> Result<&Account, ConfigError> {
        self.accounts
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| AccountError::NotFound(name.to_string()).into())
    }

    /// Appends an account and saves. Reserved or duplicate names and empty or
    /// multi-line fields are refused here as well as at the prompt. Nothing
    /// changes if the save fails.
    pub fn add_account(&mut self, account: Account) -> Result<(), ConfigError> {
        check_new_account(&account, &self.account_names())?;
        log::info!("config: adding account '{}'", account.name);
        self.accounts.push(account);
        if let Err(e) = self.save() {
            self.accounts.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Removes an account and saves.
    pub fn remove_account(&mut self, name: &str) -> Result<Account, ConfigError> {
        if name == RESERVED_NAME {
            return Err(AccountError::ReservedName.into());
        }
        let index = self
            .accounts
            .iter()
            .position(|a| a.name == name)
            .ok_or_else(|| AccountError::NotFound(name.to_string()))?;
        let removed = self.accounts.remove(index);
        if let Err(e) = self.save() {
            self.accounts.insert(index, removed);
            return Err(e);
        }
        log::info!("config: removed account '{}'", removed.name);
        Ok(removed)
    }

    fn set_notifications(&mut self, enabled: bool) -> Result<(), ConfigError> {
        self.reload()?;
        self.settings.notifications = enabled;
        self.save()
    }
}

// ---------------------------------------------------------------------------
// BooleanSource trait impl
// ---------------------------------------------------------------------------

/// The `notifications` setting. Reads go to the file so that edits made by
/// another process are seen.
impl BooleanSource for ConfigStore {
    type Error = ConfigError;

    fn is_enabled(&self) -> Result<bool, ConfigError> {
        read_file(&self.path).map(|(settings, _)| settings.notifications)
    }

    fn enable(&mut self) -> Result<(), ConfigError> {
        self.set_notifications(true)
    }

    fn disable(&mut self) -> Result<(), ConfigError> {
        self.set_notifications(false)
    }
}

// ---------------------------------------------------------------------------
// File access
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<(Settings, Vec<Account>), ConfigError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Ok((Settings::default(), Vec::new()));
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    parse(&text).map_err(|e| match e {
        ParseFailure::Document(source) => ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        },
        ParseFailure::Section(section, source) => ConfigError::Section { section, source },
    })
}

enum ParseFailure {
    Document(toml::de::Error),
    Section(String, toml::de::Error),
}

fn parse(text: &str) -> Result<(Settings, Vec<Account>), ParseFailure> {
    let table: toml::Table = toml::from_str(text).map_err(ParseFailure::Document)?;

    let mut settings = Settings::default();
    let mut accounts = Vec::new();
    for (name, value) in table {
        if name == RESERVED_NAME {
            settings = value
                .try_into::<Settings>()
                .map_err(|e| ParseFailure::Section(name, e))?
                .validate();
        } else {
            let credentials = value
                .try_into::<Credentials>()
                .map_err(|e| ParseFailure::Section(name.clone(), e))?;
            accounts.push(Account::new(
                name,
                credentials.username,
                credentials.password,
            ));
        }
    }
    Ok((settings, accounts))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> ConfigStore {
        ConfigStore::load(dir.path().join("MultiTooner").join(CONFIG_FILE)).unwrap()
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.settings(), &Settings::default());
        assert!(store.accounts().is_empty());
    }

    #[test]
    fn accounts_round_trip_in_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.add_account(Account::new("zeta", "z", "pz")).unwrap();
        store.add_account(Account::new("alpha", "a", "pa")).unwrap();
        store
            .add_account(Account::new("my alt", "alt", "p\"q"))
            .unwrap();

        let reloaded = ConfigStore::load(store.path()).unwrap();
        assert_eq!(reloaded.account_names(), vec!["zeta", "alpha", "my alt"]);
        assert_eq!(reloaded.account("my alt").unwrap().password, "p\"q");
    }

    #[test]
    fn add_refuses_reserved_and_duplicate_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.add_account(Account::new("main", "u", "p")).unwrap();

        assert!(matches!(
            store.add_account(Account::new("main", "u2", "p2")),
            Err(ConfigError::Account(AccountError::Duplicate(_)))
        ));
        assert!(matches!(
            store.add_account(Account::new("DEFAULT", "u", "p")),
            Err(ConfigError::Account(AccountError::ReservedName))
        ));
        assert_eq!(ConfigStore::load(store.path()).unwrap().accounts().len(), 1);
    }

    #[test]
    fn add_refuses_empty_and_multiline_fields() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);

        assert!(matches!(
            store.add_account(Account::new("", "", "")),
            Err(ConfigError::Account(AccountError::InvalidField("name")))
        ));
        assert!(matches!(
            store.add_account(Account::new("main", "flippy\n[alt]", "p")),
            Err(ConfigError::Account(AccountError::InvalidField("username")))
        ));
        assert!(store.accounts().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn remove_saves_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.add_account(Account::new("main", "u", "p")).unwrap();
        store.add_account(Account::new("alt", "u", "p")).unwrap();

        let removed = store.remove_account("main").unwrap();
        assert_eq!(removed.name, "main");
        assert_eq!(
            ConfigStore::load(store.path()).unwrap().account_names(),
            vec!["alt"]
        );
        assert!(matches!(
            store.remove_account("main"),
            Err(ConfigError::Account(AccountError::NotFound(_)))
        ));
    }

    #[test]
    fn save_replaces_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.add_account(Account::new("main", "u", "p")).unwrap();
        store.add_account(Account::new("alt", "u", "p")).unwrap();

        let config_dir = store.path().parent().unwrap();
        let entries: Vec<_> = fs::read_dir(config_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from(CONFIG_FILE)]);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(store.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn settings_are_parsed_and_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            "[DEFAULT]\npoll_interval_secs = 1\nnotifications = false\n\n[main]\nusername = \"u\"\npassword = \"p\"\n",
        )
        .unwrap();

        let store = ConfigStore::load(&path).unwrap();
        assert_eq!(
            store.settings().poll_interval_secs,
            Settings::MIN_POLL_INTERVAL_SECS
        );
        assert!(!store.settings().notifications);
        assert_eq!(store.account_names(), vec!["main"]);
    }

    #[test]
    fn incomplete_account_section_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[main]\nusername = \"u\"\n").unwrap();

        match ConfigStore::load(&path) {
            Err(ConfigError::Section { section, .. }) => assert_eq!(section, "main"),
            other => panic!("unexpected result: {:?}", other.err()),
        }
    }

    #[test]
    fn notifications_flag_reads_through_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.add_account(Account::new("main", "u", "p")).unwrap();
        assert!(store.is_enabled().unwrap());

        // Another process turns it off.
        let mut other = ConfigStore::load(store.path()).unwrap();
        other.disable().unwrap();
        assert!(!store.is_enabled().unwrap());

        store.enable().unwrap();
        let reloaded = ConfigStore::load(store.path()).unwrap();
        assert!(reloaded.settings().notifications);
        assert_eq!(reloaded.account_names(), vec!["main"]);
    }

    #[test]
    fn malformed_file_makes_flag_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "[DEFAULT\n").unwrap();
        assert!(store.is_enabled().is_err());
    }
}
