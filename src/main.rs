//! MultiTooner -- multi-account launcher and invasion notifier for Toontown
//! Rewritten.
//!
//! Entry point: command-line parsing, logging setup, runtime construction and
//! dispatch to the app model, the launcher and the poll loop.

mod account;
mod app;
mod config;
mod daemon;
mod error;
mod invasions;
mod launcher;
mod notifier;
mod platform;
mod prompt;
mod toggle;

use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::account::{parse_add_input, parse_remove_input, Account, ADD_PROMPT, REMOVE_PROMPT};
use crate::app::{App, LAUNCH_ALL, REMOVE_ACCOUNT};
use crate::config::ConfigStore;
use crate::daemon::Watcher;
use crate::error::{Error, Result};
use crate::invasions::InvasionClient;
use crate::launcher::Launcher;
use crate::notifier::Notifier;
use crate::prompt::{Prompter, TerminalPrompt};
use crate::toggle::{ClickOutcome, ToggleState};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "multitooner", version, about)]
struct Cli {
    /// Config file to use instead of the per-user default.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the menu: accounts and preferences.
    Status,
    /// Log in and start the game for one account.
    Launch { name: String },
    /// Launch every configured account.
    LaunchAll,
    /// Manage stored accounts.
    #[command(subcommand)]
    Account(AccountCommand),
    /// Flip a preference.
    Toggle {
        #[arg(value_enum)]
        preference: Preference,
        /// State shown before the click; the click is dropped if it is out of date.
        #[arg(long, value_enum)]
        seen: Option<Seen>,
    },
    /// Poll for cog invasions and post notifications.
    Watch {
        /// Poll once and exit.
        #[arg(long)]
        once: bool,
    },
}

#[derive(Subcommand)]
enum AccountCommand {
    /// List account names in config order.
    List,
    /// Add an account. Prompts when the details are omitted.
    Add {
        #[arg(requires_all = ["username", "password"])]
        name: Option<String>,
        username: Option<String>,
        password: Option<String>,
    },
    /// Remove an account. Prompts when the name is omitted.
    Remove { name: Option<String> },
}

#[derive(Clone, Copy, ValueEnum)]
enum Preference {
    RunAtLogin,
    Notifications,
}

#[derive(Clone, Copy, ValueEnum)]
enum Seen {
    Checked,
    Unchecked,
}

impl From<Seen> for ToggleState {
    fn from(seen: Seen) -> Self {
        match seen {
            Seen::Checked => ToggleState::Checked,
            Seen::Unchecked => ToggleState::Unchecked,
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("failed to build tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cli)) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

/// Default level is info; `RUST_LOG` overrides it and `--verbose` forces debug.
fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

async fn run(cli: Cli) -> Result<()> {
    let path = match cli.config {
        Some(path) => path,
        None => ConfigStore::default_path()?,
    };
    let store = ConfigStore::load(path)?;

    match cli.command {
        Command::Status => {
            let app = App::new(store, platform::create_login_item());
            log::debug!("config: {}", app.store().path().display());
            print!("{}", app.menu());
        }
        Command::Launch { name } => {
            let account = store.account(&name)?;
            let launcher = Launcher::new(store.settings().game_directory.clone())?;
            let pid = launcher.launch(account, &TerminalPrompt).await?;
            println!("Launched {name} (pid {pid})");
        }
        Command::LaunchAll => {
            let app = App::new(store, platform::create_login_item());
            if !app.is_enabled(LAUNCH_ALL) {
                return Err(Error::NoAccounts);
            }
            let launcher = Launcher::new(app.store().settings().game_directory.clone())?;
            let failures = launcher.launch_all(app.accounts(), &TerminalPrompt).await;
            for (name, e) in &failures {
                eprintln!("{name}: {e}");
            }
            if !failures.is_empty() {
                return Err(Error::LaunchAll(failures.len()));
            }
        }
        Command::Account(command) => run_account(command, store)?,
        Command::Toggle { preference, seen } => {
            let mut app = App::new(store, platform::create_login_item());
            let seen = seen.map(ToggleState::from);
            let (label, outcome) = match preference {
                Preference::RunAtLogin => {
                    let outcome = app.click_run_at_login(seen)?;
                    (app.run_at_login().label(), outcome)
                }
                Preference::Notifications => {
                    let outcome = app.click_notifications(seen)?;
                    (app.notifications().label(), outcome)
                }
            };
            println!("{}", describe_click(label, outcome));
        }
        Command::Watch { once } => {
            let client = InvasionClient::new()?;
            let notifier = Notifier::new(client, platform::create_notification_sink());
            Watcher::new(store, notifier).run(once).await?;
        }
    }
    Ok(())
}

fn run_account(command: AccountCommand, store: ConfigStore) -> Result<()> {
    match command {
        AccountCommand::List => {
            for name in store.account_names() {
                println!("{name}");
            }
        }
        AccountCommand::Add {
            name,
            username,
            password,
        } => {
            let mut app = App::new(store, platform::create_login_item());
            let account = match (name, username, password) {
                (Some(name), Some(username), Some(password)) => {
                    Account::new(name, username, password)
                }
                _ => {
                    let names = app.store().account_names();
                    let mut prompter = Prompter::new(io::stdin().lock(), io::stdout());
                    match prompter.ask_until(ADD_PROMPT, 3, |text| parse_add_input(text, &names))? {
                        Some(account) => account,
                        None => {
                            println!("Cancelled.");
                            return Ok(());
                        }
                    }
                }
            };
            let name = account.name.clone();
            app.add_account(account)?;
            println!("Added {name}");
        }
        AccountCommand::Remove { name } => {
            let mut app = App::new(store, platform::create_login_item());
            if !app.is_enabled(REMOVE_ACCOUNT) {
                return Err(Error::NoAccounts);
            }
            let name = match name {
                Some(name) => name,
                None => {
                    let names = app.store().account_names();
                    let mut prompter = Prompter::new(io::stdin().lock(), io::stdout());
                    match prompter
                        .ask_until(REMOVE_PROMPT, 1, |text| parse_remove_input(text, &names))?
                    {
                        Some(name) => name,
                        None => {
                            println!("Cancelled.");
                            return Ok(());
                        }
                    }
                }
            };
            app.remove_account(&name)?;
            println!("Removed {name}");
        }
    }
    Ok(())
}

fn describe_click(label: &str, outcome: ClickOutcome) -> String {
    match outcome {
        ClickOutcome::Applied(true) => format!("{label}: on"),
        ClickOutcome::Applied(false) => format!("{label}: off"),
        ClickOutcome::Stale { seen, actual } => format!(
            "{label}: shown as {seen} but is {actual}; nothing changed, click again to toggle"
        ),
        ClickOutcome::Disabled | ClickOutcome::Detached => {
            format!("{label}: unavailable, nothing changed")
        }
    }
}
