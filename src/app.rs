//! Application model: the menu and the callbacks behind it.
//!
//! Holds the config store, the login item and the two preference toggles.
//! Front ends render `menu()` and route clicks to the `click_*` methods;
//! every mutation is followed by `refresh()` so disabled items and toggle
//! marks stay current.

use std::fmt;

use crate::account::Account;
use crate::config::{ConfigError, ConfigStore};
use crate::platform::{LoginItem, PlatformError};
use crate::toggle::{BooleanSource, ClickOutcome, Toggle, ToggleState};

pub const LAUNCH_ALL: &str = "Launch All";
pub const PREFERENCES: &str = "Preferences";
pub const ADD_ACCOUNT: &str = "Add Account";
pub const REMOVE_ACCOUNT: &str = "Remove Account";
pub const RUN_AT_LOGIN: &str = "Run at Login";
pub const NOTIFICATIONS: &str = "Invasion Notifications";

// ---------------------------------------------------------------------------
// Menu model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuItem {
    Action { label: String, enabled: bool },
    Toggle { label: String, state: ToggleState },
    Submenu { label: String, items: Vec<MenuItem> },
    Separator,
}

impl MenuItem {
    fn action(label: impl Into<String>, enabled: bool) -> Self {
        MenuItem::Action {
            label: label.into(),
            enabled,
        }
    }

    fn toggle(toggle: &Toggle) -> Self {
        MenuItem::Toggle {
            label: toggle.label().to_string(),
            state: toggle.state(),
        }
    }

    /// Whether clicking the item does anything.
    pub fn is_enabled(&self) -> bool {
        match self {
            MenuItem::Action { enabled, .. } => *enabled,
            MenuItem::Toggle { state, .. } => *state != ToggleState::Disabled,
            MenuItem::Submenu { .. } => true,
            MenuItem::Separator => false,
        }
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        match self {
            MenuItem::Action { label, enabled } => {
                if *enabled {
                    writeln!(f, "{indent}{label}")
                } else {
                    writeln!(f, "{indent}{label} (disabled)")
                }
            }
            MenuItem::Toggle { label, state } => writeln!(f, "{indent}{} {label}", state.mark()),
            MenuItem::Submenu { label, items } => {
                writeln!(f, "{indent}{label}")?;
                for item in items {
                    item.write_indented(f, depth + 1)?;
                }
                Ok(())
            }
            MenuItem::Separator => writeln!(f, "{indent}---"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Menu {
    pub items: Vec<MenuItem>,
}

impl Menu {
    /// Looks up an item by label, searching submenus too.
    pub fn find(&self, label: &str) -> Option<&MenuItem> {
        fn search<'a>(items: &'a [MenuItem], label: &str) -> Option<&'a MenuItem> {
            items.iter().find_map(|item| match item {
                MenuItem::Action { label: l, .. } | MenuItem::Toggle { label: l, .. }
                    if l == label =>
                {
                    Some(item)
                }
                MenuItem::Submenu { label: l, items } => {
                    if l == label {
                        Some(item)
                    } else {
                        search(items, label)
                    }
                }
                _ => None,
            })
        }
        search(&self.items, label)
    }
}

impl fmt::Display for Menu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in &self.items {
            item.write_indented(f, 0)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unavailable login item
// ---------------------------------------------------------------------------

/// Stands in for a login item that could not be created. Every query fails,
/// so the toggle shows as Disabled.
struct UnavailableLoginItem(String);

impl BooleanSource for UnavailableLoginItem {
    type Error = PlatformError;

    fn is_enabled(&self) -> Result<bool, PlatformError> {
        Err(PlatformError::Unavailable(self.0.clone()))
    }

    fn enable(&mut self) -> Result<(), PlatformError> {
        Err(PlatformError::Unavailable(self.0.clone()))
    }

    fn disable(&mut self) -> Result<(), PlatformError> {
        Err(PlatformError::Unavailable(self.0.clone()))
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct App {
    store: ConfigStore,
    login_item: LoginItem,
    run_at_login: Toggle,
    notifications: Toggle,
}

impl App {
    /// Builds the app and reconciles both toggles.
    pub fn new(store: ConfigStore, login_item: Result<LoginItem, PlatformError>) -> Self {
        let login_item: LoginItem = match login_item {
            Ok(item) => item,
            Err(e) => {
                log::warn!("app: run at login unavailable: {e}");
                Box::new(UnavailableLoginItem(e.to_string()))
            }
        };
        let mut app = App {
            store,
            login_item,
            run_at_login: Toggle::new(RUN_AT_LOGIN),
            notifications: Toggle::new(NOTIFICATIONS),
        };
        app.refresh();
        app
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn accounts(&self) -> &[Account] {
        self.store.accounts()
    }

    pub fn run_at_login(&self) -> &Toggle {
        &self.run_at_login
    }

    pub fn notifications(&self) -> &Toggle {
        &self.notifications
    }

    /// Re-reads both toggle sources.
    pub fn refresh(&mut self) {
        self.run_at_login.reconcile(&self.login_item);
        self.notifications.reconcile(&self.store);
    }

    /// Whether the menu item labelled `label` currently accepts clicks.
    pub fn is_enabled(&self, label: &str) -> bool {
        self.menu().find(label).is_some_and(MenuItem::is_enabled)
    }

    pub fn menu(&self) -> Menu {
        let has_accounts = !self.store.accounts().is_empty();

        let mut items = vec![MenuItem::action(LAUNCH_ALL, has_accounts), MenuItem::Separator];
        items.extend(
            self.store
                .accounts()
                .iter()
                .map(|account| MenuItem::action(account.name.as_str(), true)),
        );
        items.push(MenuItem::Separator);
        items.push(MenuItem::Submenu {
            label: PREFERENCES.to_string(),
            items: vec![
                MenuItem::action(ADD_ACCOUNT, true),
                MenuItem::action(REMOVE_ACCOUNT, has_accounts),
                MenuItem::Separator,
                MenuItem::toggle(&self.run_at_login),
                MenuItem::toggle(&self.notifications),
            ],
        });
        Menu { items }
    }

    pub fn add_account(&mut self, account: Account) -> Result<(), ConfigError> {
        let result = self.store.add_account(account);
        self.refresh();
        result
    }

    pub fn remove_account(&mut self, name: &str) -> Result<Account, ConfigError> {
        let result = self.store.remove_account(name);
        self.refresh();
        result
    }

    /// Clicks "Run at Login". `seen` is the state shown before the click;
    /// `None` uses the state from the last refresh.
    pub fn click_run_at_login(
        &mut self,
        seen: Option<ToggleState>,
    ) -> Result<ClickOutcome, PlatformError> {
        if let Some(seen) = seen {
            self.run_at_login.set_seen(seen);
        }
        self.run_at_login.handle_click(&mut self.login_item)
    }

    /// Clicks "Invasion Notifications".
    pub fn click_notifications(
        &mut self,
        seen: Option<ToggleState>,
    ) -> Result<ClickOutcome, ConfigError> {
        if let Some(seen) = seen {
            self.notifications.set_seen(seen);
        }
        self.notifications.handle_click(&mut self.store)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
