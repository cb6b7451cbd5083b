//! Invasion poll loop.
//!
//! Runs on the current-thread runtime built in `main`. Settings are re-read
//! from the config file on every tick so the interval and the notifications
//! flag can be changed while the loop runs. Turning notifications off clears
//! the previous snapshot; turning them back on starts with a fresh flood.

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::config::ConfigStore;
use crate::notifier::{Notifier, SnapshotSource};

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Polled; this many new invasions were reported.
    Notified(usize),
    /// Notifications are off, nothing was fetched.
    Paused,
}

pub struct Watcher<S> {
    store: ConfigStore,
    notifier: Notifier<S>,
    paused: bool,
}

impl<S: SnapshotSource> Watcher<S> {
    pub fn new(store: ConfigStore, notifier: Notifier<S>) -> Self {
        Watcher {
            store,
            notifier,
            paused: false,
        }
    }

    /// Seconds until the next tick, as currently configured.
    pub fn period(&self) -> Duration {
        self.store.settings().poll_interval()
    }

    /// Re-reads the settings, then polls unless notifications are off.
    ///
    /// A fetch error is returned as is; the previous snapshot is kept.
    pub async fn tick(&mut self) -> Result<TickOutcome, S::Error> {
        if let Err(e) = self.store.reload() {
            log::warn!("daemon: keeping previous settings: {e}");
        }

        if !self.store.settings().notifications {
            if !self.paused {
                log::info!(
                    "daemon: notifications disabled, pausing and forgetting {} invasion(s)",
                    self.notifier.previous().len()
                );
                self.notifier.reset();
                self.paused = true;
            }
            return Ok(TickOutcome::Paused);
        }
        if self.paused {
            log::info!("daemon: notifications enabled, resuming");
            self.paused = false;
        }

        self.notifier.tick().await.map(TickOutcome::Notified)
    }

    /// Ticks, logging a fetch failure instead of returning it.
    async fn tick_or_warn(&mut self) {
        if let Err(e) = self.tick().await {
            log::warn!("daemon: invasion fetch failed, retrying next tick: {e}");
        }
    }

    /// Polls immediately, then every period until Ctrl-C.
    ///
    /// With `once` it returns after the first poll and reports a fetch failure
    /// as an error. The long-running loop only logs failures and keeps going.
    pub async fn run(mut self, once: bool) -> Result<(), S::Error> {
        let mut period = self.period();
        if once {
            self.tick().await?;
            return Ok(());
        }

        log::info!("daemon: polling every {}s", period.as_secs());
        self.tick_or_warn().await;

        let mut interval = delayed_interval(period);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = &mut shutdown => {
                    if let Err(e) = result {
                        log::error!("daemon: cannot listen for Ctrl-C: {e}");
                    }
                    log::info!("daemon: stopping");
                    break;
                }
                _ = interval.tick() => {
                    self.tick_or_warn().await;
                    let next = self.period();
                    if next != period {
                        log::info!("daemon: poll interval changed to {}s", next.as_secs());
                        period = next;
                        interval = delayed_interval(period);
                    }
                }
            }
        }
        Ok(())
    }
}

/// First tick one period from now. Late ticks push the schedule back instead
/// of bursting.
fn delayed_interval(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::notifier::Snapshot;
    use crate::platform::{NotificationSink, PlatformError};
    use crate::toggle::BooleanSource;

    #[derive(Debug, thiserror::Error)]
    #[error("fetch failed")]
    struct FetchFailed;

    /// Serves a fixed snapshot and counts fetches.
    struct CountingSource {
        snapshot: Snapshot,
        fetches: Rc<Cell<usize>>,
        fail: Rc<Cell<bool>>,
    }

    impl SnapshotSource for CountingSource {
        type Error = FetchFailed;

        async fn fetch(&self) -> Result<Snapshot, FetchFailed> {
            self.fetches.set(self.fetches.get() + 1);
            if self.fail.get() {
                return Err(FetchFailed);
            }
            Ok(self.snapshot.clone())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink(Rc<RefCell<Vec<String>>>);

    impl NotificationSink for RecordingSink {
        fn notify(&self, _title: &str, message: &str) -> Result<(), PlatformError> {
            self.0.borrow_mut().push(message.to_string());
            Ok(())
        }
    }

    struct Harness {
        watcher: Watcher<CountingSource>,
        config: ConfigStore,
        fetches: Rc<Cell<usize>>,
        fail: Rc<Cell<bool>>,
        sent: Rc<RefCell<Vec<String>>>,
    }

    fn harness(dir: &tempfile::TempDir) -> Harness {
        let path = dir.path().join("config.toml");
        let fetches = Rc::new(Cell::new(0));
        let fail = Rc::new(Cell::new(false));
        let source = CountingSource {
            snapshot: [("Boingbury", "Flunky")].into_iter().collect(),
            fetches: fetches.clone(),
            fail: fail.clone(),
        };
        let sink = RecordingSink::default();
        let sent = sink.0.clone();
        let notifier = Notifier::new(source, Box::new(sink));
        Harness {
            watcher: Watcher::new(ConfigStore::load(&path).unwrap(), notifier),
            config: ConfigStore::load(&path).unwrap(),
            fetches,
            fail,
            sent,
        }
    }

    #[tokio::test]
    async fn first_tick_floods_then_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = harness(&dir);

        assert_eq!(h.watcher.tick().await.unwrap(), TickOutcome::Notified(1));
        assert_eq!(h.watcher.tick().await.unwrap(), TickOutcome::Notified(0));
        assert_eq!(*h.sent.borrow(), vec!["Flunky invasion in Boingbury!"]);
    }

    #[tokio::test]
    async fn disabled_notifications_skip_fetch_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = harness(&dir);
        assert_eq!(h.watcher.tick().await.unwrap(), TickOutcome::Notified(1));

        h.config.disable().unwrap();
        assert_eq!(h.watcher.tick().await.unwrap(), TickOutcome::Paused);
        assert_eq!(h.fetches.get(), 1);

        // Re-enabled: the snapshot was cleared, so the invasion is new again.
        h.config.enable().unwrap();
        assert_eq!(h.watcher.tick().await.unwrap(), TickOutcome::Notified(1));
        assert_eq!(h.sent.borrow().len(), 2);
    }

    #[tokio::test]
    async fn fetch_failure_keeps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = harness(&dir);
        assert_eq!(h.watcher.tick().await.unwrap(), TickOutcome::Notified(1));

        h.fail.set(true);
        assert!(h.watcher.tick().await.is_err());

        h.fail.set(false);
        assert_eq!(h.watcher.tick().await.unwrap(), TickOutcome::Notified(0));
    }

    #[tokio::test]
    async fn period_follows_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = harness(&dir);
        assert_eq!(h.watcher.period(), Duration::from_secs(60));

        std::fs::write(
            h.config.path(),
            "[DEFAULT]\npoll_interval_secs = 120\nnotifications = true\n",
        )
        .unwrap();
        h.watcher.tick().await.unwrap();
        assert_eq!(h.watcher.period(), Duration::from_secs(120));
    }

    #[tokio::test]
    async fn run_once_polls_a_single_time() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness(&dir);
        let fetches = h.fetches.clone();

        h.watcher.run(true).await.unwrap();
        assert_eq!(fetches.get(), 1);
    }

    #[tokio::test]
    async fn run_once_reports_fetch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness(&dir);
        let fetches = h.fetches.clone();
        h.fail.set(true);

        assert!(h.watcher.run(true).await.is_err());
        assert_eq!(fetches.get(), 1);
        assert!(h.sent.borrow().is_empty());
    }

    #[tokio::test]
    async fn run_once_with_notifications_off_skips_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = harness(&dir);
        h.config.disable().unwrap();
        h.fail.set(true);

        h.watcher.run(true).await.unwrap();
        assert_eq!(h.fetches.get(), 0);
    }
}
