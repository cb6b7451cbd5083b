//! Toontown Rewritten invasion API client.
//!
//! Async HTTP client using `reqwest`. `GET /api/invasions` answers with every
//! district currently under invasion:
//!
//! ```json
//! {"error": null, "invasions": {"Boingbury": {"type": "Flunky", "progress": "12/4000"}}}
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::notifier::{Snapshot, SnapshotSource};

const DEFAULT_URL: &str = "https://www.toontownrewritten.com/api/invasions";

/// Identifies this app to the TTR web services, as their API terms ask.
pub const USER_AGENT: &str = concat!("MultiTooner/", env!("CARGO_PKG_VERSION"));

/// A fetch that takes longer than this counts as failed.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors from the invasion API.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invasion API reported an error: {0}")]
    Api(String),
}

#[derive(Deserialize)]
struct InvasionsResponse {
    #[serde(default)]
    error: Option<String>,
    invasions: BTreeMap<String, InvasionEntry>,
}

#[derive(Deserialize)]
struct InvasionEntry {
    #[serde(rename = "type")]
    cog: String,
}

/// Invasion API client.
pub struct InvasionClient {
    http: reqwest::Client,
    url: String,
}

impl InvasionClient {
    pub fn new() -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            url: DEFAULT_URL.to_string(),
        })
    }

    /// Fetches the current invasions.
    pub async fn invasions(&self) -> Result<Snapshot, FetchError> {
        let resp = self.http.get(&self.url).send().await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.bytes().await?;
        parse_snapshot(&body)
    }
}

impl SnapshotSource for InvasionClient {
    type Error = FetchError;

    async fn fetch(&self) -> Result<Snapshot, FetchError> {
        self.invasions().await
    }
}

/// Parses an `/api/invasions` body into a snapshot.
pub fn parse_snapshot(body: &[u8]) -> Result<Snapshot, FetchError> {
    let resp: InvasionsResponse = serde_json::from_slice(body)?;
    if let Some(error) = resp.error {
        return Err(FetchError::Api(error));
    }
    Ok(resp
        .invasions
        .into_iter()
        .map(|(district, entry)| (district, clean_cog_name(&entry.cog)))
        .collect())
}

/// Cog names sometimes carry control characters (e.g. `\u0003`) used by the
/// game's text renderer.
fn clean_cog_name(name: &str) -> String {
    name.chars().filter(|c| !c.is_control()).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
