//! Game accounts and validation of user-entered account details.
//!
//! Account details are entered as a block of lines (name, username, password
//! for adding; just the name for removing). Blank lines are ignored. Invalid
//! input is rejected with a message meant to be shown above the next prompt.

use std::fmt;

/// Name of the config section reserved for global settings.
pub const RESERVED_NAME: &str = "DEFAULT";

/// Prompt shown when adding an account.
pub const ADD_PROMPT: &str = "Enter your login information: the name of the account, \
the username and the password, each on its own line.";

/// Prompt shown when removing an account.
pub const REMOVE_PROMPT: &str = "Enter the account's exact name.";

/// Prompt shown when the login server asks for a ToonGuard code.
pub const TOONGUARD_PROMPT: &str = "Enter your ToonGuard validation code";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    #[error("Invalid account name. Please try again.")]
    ReservedName,

    #[error("Please try again. Expected {expected} non-empty line(s), got {got}.")]
    FieldCount { expected: usize, got: usize },

    #[error("Please try again. The {0} must be a single non-empty line.")]
    InvalidField(&'static str),

    #[error("An account named '{0}' already exists.")]
    Duplicate(String),

    #[error("No account named '{0}'.")]
    NotFound(String),
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// One set of login credentials, stored under a user-chosen name.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    pub name: String,
    pub username: String,
    pub password: String,
}

impl Account {
    pub fn new(
        name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Account {
            name: name.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

// Keep passwords out of logs.
impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("name", &self.name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Checks that `name` can be used for a new account.
fn check_new_name<S: AsRef<str>>(name: &str, existing: &[S]) -> Result<(), AccountError> {
    if name == RESERVED_NAME {
        return Err(AccountError::ReservedName);
    }
    if existing.iter().any(|n| n.as_ref() == name) {
        return Err(AccountError::Duplicate(name.to_string()));
    }
    Ok(())
}

/// Checks a complete account before it is stored: the name must be usable
/// and every field a single non-blank line.
pub fn check_new_account<S: AsRef<str>>(
    account: &Account,
    existing: &[S],
) -> Result<(), AccountError> {
    check_new_name(&account.name, existing)?;
    let fields = [
        ("name", &account.name),
        ("username", &account.username),
        ("password", &account.password),
    ];
    for (field, value) in fields {
        if value.trim().is_empty() || value.contains(['\n', '\r']) {
            return Err(AccountError::InvalidField(field));
        }
    }
    Ok(())
}

/// Non-blank lines, kept verbatim so passwords may contain edge spaces.
fn fields(text: &str) -> Vec<&str> {
    text.lines().filter(|l| !l.trim().is_empty()).collect()
}

/// Parses the "add account" block: name, username, password.
pub fn parse_add_input<S: AsRef<str>>(text: &str, existing: &[S]) -> Result<Account, AccountError> {
    let fields = fields(text);
    if fields.first() == Some(&RESERVED_NAME) {
        return Err(AccountError::ReservedName);
    }
    let &[name, username, password] = fields.as_slice() else {
        return Err(AccountError::FieldCount {
            expected: 3,
            got: fields.len(),
        });
    };
    let account = Account::new(name, username, password);
    check_new_account(&account, existing)?;
    Ok(account)
}

/// Parses the "remove account" block: a single existing name.
pub fn parse_remove_input<S: AsRef<str>>(text: &str, existing: &[S]) -> Result<String, AccountError> {
    let fields = fields(text);
    if fields.first() == Some(&RESERVED_NAME) {
        return Err(AccountError::ReservedName);
    }
    let &[name] = fields.as_slice() else {
        return Err(AccountError::FieldCount {
            expected: 1,
            got: fields.len(),
        });
    };
    if !existing.iter().any(|n| n.as_ref() == name) {
        return Err(AccountError::NotFound(name.to_string()));
    }
    Ok(name.to_string())
}

/// ToonGuard codes are six digits.
pub fn is_valid_toonguard_code(text: &str) -> bool {
    let text = text.trim();
    text.len() == 6 && text.bytes().all(|b| b.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
