//! Change-detection notifier for cog invasions.
//!
//! Each poll fetches a full `Snapshot` (district -> cog type) and reports the
//! pairs that were not present in the previous one. Pairs are compared whole,
//! so a district whose cog type changes yields a single new invasion for the
//! new cog; the replaced pair is dropped silently. Nothing distinguishes a
//! changed district from a new one.
//!
//! The very first poll starts from an empty snapshot and therefore reports
//! every invasion in progress. That initial flood is expected.

use std::collections::BTreeMap;
use std::future::Future;

use crate::platform::NotificationSink;

/// Notification title for every invasion.
pub const NOTIFICATION_TITLE: &str = "Cog Invasion";

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One fetch worth of invasions, keyed by district.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot(BTreeMap<String, String>);

impl Snapshot {
    pub fn new() -> Self {
        Snapshot::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, district: &str) -> Option<&str> {
        self.0.get(district).map(String::as_str)
    }

    /// Pairs of `self` that do not appear, with the same value, in `previous`.
    pub fn new_since(&self, previous: &Snapshot) -> Vec<Invasion> {
        self.0
            .iter()
            .filter(|(district, cog)| previous.0.get(*district) != Some(*cog))
            .map(|(district, cog)| Invasion {
                district: district.clone(),
                cog: cog.clone(),
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Snapshot(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A district/cog pair that showed up since the last poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invasion {
    pub district: String,
    pub cog: String,
}

impl Invasion {
    pub fn message(&self) -> String {
        format!("{} invasion in {}!", self.cog, self.district)
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Produces snapshots. Failures must surface as `Err`, never as an empty
/// snapshot: an empty one would make every active invasion look new again on
/// the following poll.
pub trait SnapshotSource {
    type Error: std::error::Error;

    fn fetch(&self) -> impl Future<Output = Result<Snapshot, Self::Error>>;
}

/// Fetches a fresh snapshot and diffs it against `previous`.
///
/// The caller keeps the returned snapshot for the next call. On error it keeps
/// `previous` instead.
pub async fn poll<S: SnapshotSource>(
    source: &S,
    previous: &Snapshot,
) -> Result<(Vec<Invasion>, Snapshot), S::Error> {
    let current = source.fetch().await?;
    let events = current.new_since(previous);
    Ok((events, current))
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Owns the previous snapshot for the poll loop and forwards new invasions to
/// a notification sink.
pub struct Notifier<S> {
    source: S,
    sink: Box<dyn NotificationSink>,
    previous: Snapshot,
}

impl<S: SnapshotSource> Notifier<S> {
    pub fn new(source: S, sink: Box<dyn NotificationSink>) -> Self {
        Notifier {
            source,
            sink,
            previous: Snapshot::new(),
        }
    }

    pub fn previous(&self) -> &Snapshot {
        &self.previous
    }

    /// Forgets the previous snapshot. The next tick reports everything again.
    pub fn reset(&mut self) {
        self.previous = Snapshot::new();
    }

    /// Polls once and notifies every new invasion.
    ///
    /// Returns the number of invasions reported. On fetch failure the previous
    /// snapshot is left untouched. A failing sink is logged and skipped.
    pub async fn tick(&mut self) -> Result<usize, S::Error> {
        let (events, current) = poll(&self.source, &self.previous).await?;
        log::debug!(
            "notifier: {} active invasion(s), {} new",
            current.len(),
            events.len()
        );

        for invasion in &events {
            log::info!("notifier: {} in {}", invasion.cog, invasion.district);
            if let Err(e) = self.sink.notify(NOTIFICATION_TITLE, &invasion.message()) {
                log::warn!("notifier: failed to deliver notification: {e}");
            }
        }

        self.previous = current;
        Ok(events.len())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
