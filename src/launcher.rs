//! Game launcher for Toontown Rewritten accounts.
//!
//! Launching is two steps. The login API trades credentials for a game server
//! address and a play cookie, possibly after a queue wait or a ToonGuard
//! challenge. The engine is then started in the game directory with both
//! values in its environment and left running on its own.
//!
//! Login API responses, keyed on the `success` string:
//!   "true"    → `gameserver` + `cookie`, ready to play
//!   "delayed" → wait, then resubmit `queueToken`
//!   "partial" → ToonGuard: resubmit `appToken` (the code) + `authToken`
//!   "false"   → rejected, `banner` explains why

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use serde::Deserialize;

use crate::account::Account;
use crate::invasions::USER_AGENT;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const LOGIN_URL: &str = "https://www.toontownrewritten.com/api/login?format=json";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay between queue resubmissions.
const QUEUE_WAIT: Duration = Duration::from_secs(3);

/// Resubmissions before giving up on the login queue.
const MAX_QUEUE_POLLS: u32 = 60;

#[cfg(target_os = "macos")]
const ENGINE_NAME: &str = "Toontown Rewritten";
#[cfg(target_os = "windows")]
const ENGINE_NAME: &str = "TTREngine64.exe";
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const ENGINE_NAME: &str = "TTREngine";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("login API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected login response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("login rejected: {0}")]
    Rejected(String),

    #[error("ToonGuard code was not entered")]
    ToonGuardCancelled,

    #[error("still queued after {0} attempts")]
    QueueTimeout(u32),

    #[error("no game directory; set game_directory in the config")]
    NoGameDirectory,

    #[error("game engine not found at {0}")]
    EngineMissing(PathBuf),

    #[error("cannot start the game engine: {0}")]
    Spawn(#[source] std::io::Error),
}

// ---------------------------------------------------------------------------
// Login API
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "success")]
enum LoginResponse {
    #[serde(rename = "true")]
    Ready { gameserver: String, cookie: String },

    #[serde(rename = "delayed")]
    Delayed {
        #[serde(rename = "queueToken")]
        queue_token: String,
        #[serde(default)]
        position: Option<serde_json::Value>,
    },

    #[serde(rename = "partial")]
    ToonGuard {
        #[serde(rename = "responseToken")]
        response_token: String,
        #[serde(default)]
        banner: String,
    },

    #[serde(rename = "false")]
    Rejected {
        #[serde(default)]
        banner: String,
    },
}

/// What the engine needs to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayToken {
    pub gameserver: String,
    pub cookie: String,
}

/// Asks the user for a ToonGuard code. `None` means they gave up.
pub trait CodePrompt {
    fn toonguard_code(&self, account: &str, banner: &str) -> Option<String>;
}

// ---------------------------------------------------------------------------
// Login client
// ---------------------------------------------------------------------------

/// One round trip to the login API.
trait LoginApi {
    fn submit(
        &self,
        form: &[(&str, &str)],
    ) -> impl Future<Output = Result<LoginResponse, LaunchError>>;
}

struct LoginClient {
    http: reqwest::Client,
    url: String,
}

impl LoginClient {
    fn new(url: impl Into<String>) -> Result<Self, LaunchError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

impl LoginApi for LoginClient {
    async fn submit(&self, form: &[(&str, &str)]) -> Result<LoginResponse, LaunchError> {
        let resp = self.http.post(&self.url).form(form).send().await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LaunchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Runs the login exchange until the server hands out a play token or gives
/// a final answer. Queue resubmissions wait `queue_wait` each.
async fn login<A: LoginApi>(
    api: &A,
    account: &Account,
    prompt: &dyn CodePrompt,
    queue_wait: Duration,
) -> Result<PlayToken, LaunchError> {
    log::debug!("launcher: logging in '{}'", account.name);
    let mut resp = api
        .submit(&[
            ("username", account.username.as_str()),
            ("password", account.password.as_str()),
        ])
        .await?;
    let mut queue_polls = 0;

    loop {
        match resp {
            LoginResponse::Ready { gameserver, cookie } => {
                return Ok(PlayToken { gameserver, cookie });
            }
            LoginResponse::Rejected { banner } => {
                return Err(LaunchError::Rejected(banner));
            }
            LoginResponse::ToonGuard {
                response_token,
                banner,
            } => {
                let code = prompt
                    .toonguard_code(&account.name, &banner)
                    .ok_or(LaunchError::ToonGuardCancelled)?;
                resp = api
                    .submit(&[
                        ("appToken", code.trim()),
                        ("authToken", response_token.as_str()),
                    ])
                    .await?;
            }
            LoginResponse::Delayed {
                queue_token,
                position,
            } => {
                queue_polls += 1;
                if queue_polls > MAX_QUEUE_POLLS {
                    return Err(LaunchError::QueueTimeout(MAX_QUEUE_POLLS));
                }
                log::info!(
                    "launcher: '{}' queued (position {})",
                    account.name,
                    match position {
                        Some(serde_json::Value::String(p)) => p,
                        Some(p) => p.to_string(),
                        None => "?".to_string(),
                    }
                );
                tokio::time::sleep(queue_wait).await;
                resp = api.submit(&[("queueToken", queue_token.as_str())]).await?;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Launcher
// ---------------------------------------------------------------------------

pub struct Launcher {
    api: LoginClient,
    game_dir: PathBuf,
}

impl Launcher {
    /// Uses `game_dir` if given, the platform default otherwise.
    pub fn new(game_dir: Option<PathBuf>) -> Result<Self, LaunchError> {
        let game_dir = game_dir
            .or_else(default_game_dir)
            .ok_or(LaunchError::NoGameDirectory)?;
        let api = LoginClient::new(LOGIN_URL)?;
        log::debug!("launcher: game directory {}", game_dir.display());
        Ok(Self { api, game_dir })
    }

    pub fn engine_path(&self) -> PathBuf {
        self.game_dir.join(ENGINE_NAME)
    }

    /// Logs `account` in and starts a game engine for it. Returns the engine pid.
    pub async fn launch(
        &self,
        account: &Account,
        prompt: &dyn CodePrompt,
    ) -> Result<u32, LaunchError> {
        // Fail before talking to the server if there is nothing to run.
        let engine = self.engine_path();
        if !engine.is_file() {
            return Err(LaunchError::EngineMissing(engine));
        }

        let token = login(&self.api, account, prompt, QUEUE_WAIT).await?;
        let pid = self.spawn_engine(&engine, &token)?;
        log::info!("launcher: started '{}' (pid {pid})", account.name);
        Ok(pid)
    }

    /// Launches every account in order. A failure does not stop the rest;
    /// failures are returned with the account name.
    pub async fn launch_all(
        &self,
        accounts: &[Account],
        prompt: &dyn CodePrompt,
    ) -> Vec<(String, LaunchError)> {
        let mut failures = Vec::new();
        for account in accounts {
            if let Err(e) = self.launch(account, prompt).await {
                log::error!("launcher: '{}' failed: {e}", account.name);
                failures.push((account.name.clone(), e));
            }
        }
        failures
    }

    fn spawn_engine(&self, engine: &Path, token: &PlayToken) -> Result<u32, LaunchError> {
        let child = Command::new(engine)
            .current_dir(&self.game_dir)
            .env("TTR_GAMESERVER", &token.gameserver)
            .env("TTR_PLAYCOOKIE", &token.cookie)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(LaunchError::Spawn)?;
        // Dropping the handle leaves the engine running.
        Ok(child.id())
    }
}

/// Where the official launcher installs the game.
pub fn default_game_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        Some(PathBuf::from(r"C:\Program Files (x86)\Toontown Rewritten"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        dirs::data_dir().map(|dir| dir.join("Toontown Rewritten"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::*;

    struct NoPrompt;

    impl CodePrompt for NoPrompt {
        fn toonguard_code(&self, _account: &str, _banner: &str) -> Option<String> {
            None
        }
    }

    /// Answers every ToonGuard challenge the same way and records what it
    /// was asked.
    struct RecordingPrompt {
        answer: Option<String>,
        asked: RefCell<Vec<(String, String)>>,
    }

    impl RecordingPrompt {
        fn answering(answer: Option<&str>) -> Self {
            RecordingPrompt {
                answer: answer.map(str::to_string),
                asked: RefCell::default(),
            }
        }
    }

    impl CodePrompt for RecordingPrompt {
        fn toonguard_code(&self, account: &str, banner: &str) -> Option<String> {
            self.asked
                .borrow_mut()
                .push((account.to_string(), banner.to_string()));
            self.answer.clone()
        }
    }

    /// Replies with queued responses in order and records every form sent.
    #[derive(Default)]
    struct ScriptedApi {
        responses: RefCell<VecDeque<LoginResponse>>,
        forms: RefCell<Vec<Vec<(String, String)>>>,
    }

    impl ScriptedApi {
        fn new(responses: Vec<LoginResponse>) -> Self {
            ScriptedApi {
                responses: RefCell::new(responses.into()),
                ..Default::default()
            }
        }

        fn forms(&self) -> Vec<Vec<(String, String)>> {
            self.forms.borrow().clone()
        }
    }

    impl LoginApi for ScriptedApi {
        async fn submit(&self, form: &[(&str, &str)]) -> Result<LoginResponse, LaunchError> {
            self.forms.borrow_mut().push(
                form.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            );
            self.responses
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| LaunchError::Status {
                    status: 500,
                    body: "no more responses".into(),
                })
        }
    }

    fn form(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn delayed(token: &str) -> LoginResponse {
        LoginResponse::Delayed {
            queue_token: token.into(),
            position: None,
        }
    }

    fn ready() -> LoginResponse {
        LoginResponse::Ready {
            gameserver: "gs.example:7198".into(),
            cookie: "abc".into(),
        }
    }

    fn account() -> Account {
        Account::new("main", "flippy", "hunter2")
    }

    #[test]
    fn parses_each_login_response() {
        let ready: LoginResponse = serde_json::from_str(
            r#"{"success": "true", "gameserver": "gs.example:7198", "cookie": "abc"}"#,
        )
        .unwrap();
        assert_eq!(
            ready,
            LoginResponse::Ready {
                gameserver: "gs.example:7198".into(),
                cookie: "abc".into()
            }
        );

        let delayed: LoginResponse = serde_json::from_str(
            r#"{"success": "delayed", "queueToken": "q1", "position": "4", "eta": "2"}"#,
        )
        .unwrap();
        assert!(matches!(delayed, LoginResponse::Delayed { queue_token, .. } if queue_token == "q1"));

        let partial: LoginResponse = serde_json::from_str(
            r#"{"success": "partial", "responseToken": "r1", "banner": "Enter your ToonGuard code"}"#,
        )
        .unwrap();
        assert!(matches!(partial, LoginResponse::ToonGuard { response_token, .. } if response_token == "r1"));

        let rejected: LoginResponse =
            serde_json::from_str(r#"{"success": "false", "banner": "Incorrect password"}"#)
                .unwrap();
        assert_eq!(
            rejected,
            LoginResponse::Rejected {
                banner: "Incorrect password".into()
            }
        );
    }

    #[test]
    fn unknown_success_value_is_an_error() {
        assert!(serde_json::from_str::<LoginResponse>(r#"{"success": "maybe"}"#).is_err());
    }

    #[test]
    fn engine_lives_in_game_dir() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = Launcher::new(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(launcher.engine_path(), dir.path().join(ENGINE_NAME));
    }

    #[tokio::test]
    async fn missing_engine_fails_before_login() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = Launcher::new(Some(dir.path().to_path_buf())).unwrap();
        let account = Account::new("main", "flippy", "hunter2");

        let result = launcher.launch(&account, &NoPrompt).await;
        assert!(matches!(result, Err(LaunchError::EngineMissing(_))));

        let failures = launcher.launch_all(&[account], &NoPrompt).await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "main");
    }

    #[tokio::test]
    async fn queued_login_resubmits_queue_token() {
        let api = ScriptedApi::new(vec![
            LoginResponse::Delayed {
                queue_token: "q1".into(),
                position: Some(serde_json::Value::String("2".into())),
            },
            delayed("q2"),
            ready(),
        ]);

        let token = login(&api, &account(), &NoPrompt, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(
            token,
            PlayToken {
                gameserver: "gs.example:7198".into(),
                cookie: "abc".into()
            }
        );
        assert_eq!(
            api.forms(),
            vec![
                form(&[("username", "flippy"), ("password", "hunter2")]),
                form(&[("queueToken", "q1")]),
                form(&[("queueToken", "q2")]),
            ]
        );
    }

    #[tokio::test]
    async fn toonguard_code_is_sent_with_auth_token() {
        let api = ScriptedApi::new(vec![
            LoginResponse::ToonGuard {
                response_token: "r1".into(),
                banner: "Enter your ToonGuard code".into(),
            },
            ready(),
        ]);
        let prompt = RecordingPrompt::answering(Some(" 123456\n"));

        login(&api, &account(), &prompt, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(
            *prompt.asked.borrow(),
            vec![("main".to_string(), "Enter your ToonGuard code".to_string())]
        );
        assert_eq!(
            api.forms()[1],
            form(&[("appToken", "123456"), ("authToken", "r1")])
        );
    }

    #[tokio::test]
    async fn cancelled_toonguard_stops_login() {
        let api = ScriptedApi::new(vec![
            LoginResponse::ToonGuard {
                response_token: "r1".into(),
                banner: String::new(),
            },
            ready(),
        ]);
        let prompt = RecordingPrompt::answering(None);

        let result = login(&api, &account(), &prompt, Duration::ZERO).await;
        assert!(matches!(result, Err(LaunchError::ToonGuardCancelled)));
        assert_eq!(prompt.asked.borrow().len(), 1);
        assert_eq!(api.forms().len(), 1);
    }

    #[tokio::test]
    async fn endless_queue_times_out() {
        let responses = (0..=MAX_QUEUE_POLLS).map(|i| delayed(&format!("q{i}"))).collect();
        let api = ScriptedApi::new(responses);

        let result = login(&api, &account(), &NoPrompt, Duration::ZERO).await;
        assert!(matches!(result, Err(LaunchError::QueueTimeout(n)) if n == MAX_QUEUE_POLLS));
        // The first submission plus one resubmission per allowed poll.
        assert_eq!(api.forms().len(), MAX_QUEUE_POLLS as usize + 1);
    }

    #[tokio::test]
    async fn rejected_login_returns_banner() {
        let api = ScriptedApi::new(vec![LoginResponse::Rejected {
            banner: "Incorrect password".into(),
        }]);

        let result = login(&api, &account(), &NoPrompt, Duration::ZERO).await;
        assert!(matches!(result, Err(LaunchError::Rejected(b)) if b == "Incorrect password"));
    }

    #[tokio::test]
    async fn server_error_mid_exchange_is_returned() {
        let api = ScriptedApi::new(vec![delayed("q1")]);

        let result = login(&api, &account(), &NoPrompt, Duration::ZERO).await;
        assert!(matches!(result, Err(LaunchError::Status { status: 500, .. })));
        assert_eq!(api.forms().len(), 2);
    }
}
