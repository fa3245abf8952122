// Copyright 2025 Skyscan Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Periodic fetch-normalize-filter driver.
//!
//! The poller runs one background task that re-fetches on a fixed interval
//! and immediately on filter changes (resetting the interval). Results are
//! published into a shared snapshot the UI reads each frame.
//!
//! Responses may resolve out of request order; every fetch carries a
//! sequence number and only the latest issued fetch is allowed to commit, so
//! a slow response can never overwrite a newer one. After cancellation no
//! response commits at all.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::filter::{self, FilterState};
use crate::provider::{FetchError, FlightSource, REQUEST_TIMEOUT};
use crate::record::FlightRecord;

/// Default re-fetch period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Poll cycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// No fetch issued yet.
    Idle,
    /// A fetch is in flight.
    Fetching,
    /// The last completed cycle succeeded.
    Success,
    /// The last completed cycle failed; the flight set is empty.
    Failed,
}

/// Rolling counters for the status pane.
#[derive(Debug, Clone, Default)]
pub struct PollStats {
    /// Completed fetch cycles (success or failure).
    pub cycles: u64,
    /// Records in the last successful response, before filtering.
    pub fetched: usize,
    /// Records surviving the filter in the last successful cycle.
    pub visible: usize,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
}

/// The poller's published output, replaced wholesale each cycle.
#[derive(Debug, Clone)]
pub struct PollSnapshot {
    pub state: PollState,
    pub flights: Vec<FlightRecord>,
    pub error: Option<String>,
    pub stats: PollStats,
}

impl Default for PollSnapshot {
    fn default() -> Self {
        Self {
            state: PollState::Idle,
            flights: Vec::new(),
            error: None,
            stats: PollStats::default(),
        }
    }
}

/// Poller configuration.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Re-fetch period; also the reset target when a filter change forces an
    /// immediate fetch.
    pub interval: Duration,
    /// Filter in effect for the initial fetch.
    pub initial_filter: FilterState,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            initial_filter: FilterState::default(),
        }
    }
}

/// Handle to a running poller task.
///
/// Dropping the handle does not stop the task; call [`Poller::shutdown`].
#[derive(Debug)]
pub struct Poller {
    snapshot: Arc<Mutex<PollSnapshot>>,
    filter_tx: watch::Sender<FilterState>,
    cancel: CancellationToken,
}

impl Poller {
    /// Spawn the poll task on the current tokio runtime.
    ///
    /// The initial fetch is issued immediately.
    #[must_use]
    pub fn spawn<S>(source: S, config: PollerConfig) -> Self
    where
        S: FlightSource + Send + Sync + 'static,
    {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self::spawn_with_client(source, client, config)
    }

    /// Spawn with an externally built HTTP client.
    #[must_use]
    pub fn spawn_with_client<S>(source: S, client: reqwest::Client, config: PollerConfig) -> Self
    where
        S: FlightSource + Send + Sync + 'static,
    {
        let snapshot = Arc::new(Mutex::new(PollSnapshot::default()));
        let (filter_tx, filter_rx) = watch::channel(config.initial_filter);
        let cancel = CancellationToken::new();

        tokio::spawn(run(
            Arc::new(source),
            client,
            config.interval,
            Arc::clone(&snapshot),
            filter_rx,
            cancel.clone(),
        ));

        Self {
            snapshot,
            filter_tx,
            cancel,
        }
    }

    /// Clone the current snapshot. Cheap enough to call once per frame.
    #[must_use]
    pub fn snapshot(&self) -> PollSnapshot {
        self.snapshot
            .lock()
            .expect("poll snapshot lock poisoned")
            .clone()
    }

    /// The filter currently in effect.
    #[must_use]
    pub fn filter(&self) -> FilterState {
        *self.filter_tx.borrow()
    }

    /// Publish a new filter state. An actual change triggers one immediate
    /// fetch and resets the interval; sending an identical value is a no-op.
    pub fn set_filter(&self, new_filter: FilterState) {
        self.filter_tx.send_if_modified(|current| {
            if *current == new_filter {
                false
            } else {
                *current = new_filter;
                true
            }
        });
    }

    /// Stop the poll task. In-flight responses are discarded.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

async fn run<S>(
    source: Arc<S>,
    client: reqwest::Client,
    period: Duration,
    snapshot: Arc<Mutex<PollSnapshot>>,
    mut filter_rx: watch::Receiver<FilterState>,
    cancel: CancellationToken,
) where
    S: FlightSource + Send + Sync + 'static,
{
    let latest_seq = Arc::new(AtomicU64::new(0));
    let mut issued: u64 = 0;

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                info!("poller cancelled");
                return;
            }

            // First tick fires immediately: the initial fetch on spawn.
            _ = interval.tick() => {
                issued += 1;
                let current = *filter_rx.borrow();
                issue_fetch(&source, &client, &snapshot, current, &cancel, &latest_seq, issued);
            }

            changed = filter_rx.changed() => {
                if changed.is_err() {
                    info!("filter channel closed, stopping poller");
                    return;
                }
                // One immediate fetch per change; the periodic timer starts
                // over so changes do not stack extra cycles.
                interval.reset();
                issued += 1;
                let current = *filter_rx.borrow_and_update();
                issue_fetch(&source, &client, &snapshot, current, &cancel, &latest_seq, issued);
            }
        }
    }
}

#[allow(clippy::too_many_arguments, reason = "internal fan-out of the task context")]
fn issue_fetch<S>(
    source: &Arc<S>,
    client: &reqwest::Client,
    snapshot: &Arc<Mutex<PollSnapshot>>,
    current_filter: FilterState,
    cancel: &CancellationToken,
    latest_seq: &Arc<AtomicU64>,
    seq: u64,
) where
    S: FlightSource + Send + Sync + 'static,
{
    latest_seq.store(seq, Ordering::SeqCst);
    snapshot
        .lock()
        .expect("poll snapshot lock poisoned")
        .state = PollState::Fetching;

    debug!("issuing fetch #{seq} (region: {})", current_filter.region.name);

    let source = Arc::clone(source);
    let client = client.clone();
    let snapshot = Arc::clone(snapshot);
    let cancel = cancel.clone();
    let latest_seq = Arc::clone(latest_seq);

    tokio::spawn(async move {
        let result = source.fetch(&client, current_filter.region.bounds).await;

        // Liveness guard: after teardown nothing may touch the snapshot.
        if cancel.is_cancelled() {
            return;
        }
        // Stale-response guard: a response that is not the latest issued
        // fetch lost the race and is discarded, whatever order it resolved in.
        if latest_seq.load(Ordering::SeqCst) != seq {
            debug!("discarding stale response for fetch #{seq}");
            return;
        }

        commit(&snapshot, result, &current_filter);
    });
}

fn commit(
    snapshot: &Arc<Mutex<PollSnapshot>>,
    result: Result<Vec<FlightRecord>, FetchError>,
    current_filter: &FilterState,
) {
    let mut snap = snapshot.lock().expect("poll snapshot lock poisoned");
    snap.stats.cycles += 1;

    match result {
        Ok(records) => {
            let visible = filter::apply(&records, current_filter);
            info!(
                "poll cycle ok: {} fetched, {} visible",
                records.len(),
                visible.len()
            );
            snap.stats.fetched = records.len();
            snap.stats.visible = visible.len();
            snap.stats.last_success = Some(Utc::now());
            snap.flights = visible;
            snap.error = None;
            snap.state = PollState::Success;
        }
        Err(err) => {
            warn!("poll cycle failed: {err}");
            // The flight set is cleared rather than left stale next to an
            // error banner.
            snap.flights.clear();
            snap.stats.fetched = 0;
            snap.stats.visible = 0;
            snap.stats.last_failure = Some(Utc::now());
            snap.error = Some(err.to_string());
            snap.state = PollState::Failed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{AltitudeBand, Region};
    use crate::provider::ProviderKind;
    use std::sync::atomic::AtomicUsize;

    fn record(id: &str, altitude_m: Option<f64>) -> FlightRecord {
        FlightRecord {
            provider: ProviderKind::OpenSky,
            id: id.to_string(),
            callsign: None,
            latitude: 48.0,
            longitude: 9.0,
            track: None,
            altitude_m,
            ground_speed_kmh: None,
            vertical_rate_ms: None,
            origin: None,
            destination: None,
            aircraft_type: None,
            eta: None,
            on_ground: false,
            last_contact: None,
        }
    }

    /// Test double: each call returns the scripted step, with an optional
    /// per-step delay to model slow responses.
    struct ScriptedSource {
        steps: Vec<(Duration, Result<Vec<FlightRecord>, &'static str>)>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new(steps: Vec<(Duration, Result<Vec<FlightRecord>, &'static str>)>) -> Self {
            Self {
                steps,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn call_counter(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.calls)
        }
    }

    impl FlightSource for ScriptedSource {
        fn kind(&self) -> ProviderKind {
            ProviderKind::OpenSky
        }

        async fn fetch(
            &self,
            _client: &reqwest::Client,
            _bounds: Option<crate::filter::BoundingBox>,
        ) -> Result<Vec<FlightRecord>, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.steps.get(call).or_else(|| self.steps.last());
            let (delay, result) = step.expect("scripted source called with no steps");
            if !delay.is_zero() {
                tokio::time::sleep(*delay).await;
            }
            match result {
                Ok(records) => Ok(records.clone()),
                Err(msg) => Err(FetchError::Network((*msg).to_string())),
            }
        }
    }

    /// Always times out.
    struct TimeoutSource;

    impl FlightSource for TimeoutSource {
        fn kind(&self) -> ProviderKind {
            ProviderKind::OpenSky
        }

        async fn fetch(
            &self,
            _client: &reqwest::Client,
            _bounds: Option<crate::filter::BoundingBox>,
        ) -> Result<Vec<FlightRecord>, FetchError> {
            Err(FetchError::Timeout)
        }
    }

    async fn wait_for<F>(poller: &Poller, predicate: F) -> PollSnapshot
    where
        F: Fn(&PollSnapshot) -> bool,
    {
        for _ in 0..200 {
            let snap = poller.snapshot();
            if predicate(&snap) {
                return snap;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached; last snapshot: {:?}", poller.snapshot());
    }

    fn long_interval_config() -> PollerConfig {
        PollerConfig {
            interval: Duration::from_secs(3600),
            initial_filter: FilterState::default(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_fetch_on_spawn() {
        let source = ScriptedSource::new(vec![(
            Duration::ZERO,
            Ok(vec![record("a", Some(1000.0)), record("b", None)]),
        )]);
        let poller = Poller::spawn_with_client(
            source,
            reqwest::Client::new(),
            long_interval_config(),
        );

        let snap = wait_for(&poller, |s| s.state == PollState::Success).await;
        assert_eq!(snap.flights.len(), 2);
        assert_eq!(snap.stats.fetched, 2);
        assert_eq!(snap.stats.cycles, 1);
        assert!(snap.error.is_none());
        poller.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_clears_flights_and_sets_error() {
        let source = ScriptedSource::new(vec![
            (Duration::ZERO, Ok(vec![record("a", Some(1000.0))])),
            (Duration::ZERO, Err("connection reset")),
        ]);
        let poller = Poller::spawn_with_client(
            source,
            reqwest::Client::new(),
            long_interval_config(),
        );

        wait_for(&poller, |s| s.state == PollState::Success).await;

        // Force a second cycle via a filter change.
        let filter = FilterState {
            region: Region::by_name("Europe").unwrap(),
            ..FilterState::default()
        };
        poller.set_filter(filter);

        let snap = wait_for(&poller, |s| s.state == PollState::Failed).await;
        assert!(snap.flights.is_empty());
        assert!(snap.error.as_deref().unwrap().contains("connection reset"));
        assert!(snap.stats.last_failure.is_some());
        poller.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_failed_with_empty_snapshot() {
        let poller = Poller::spawn_with_client(
            TimeoutSource,
            reqwest::Client::new(),
            long_interval_config(),
        );

        let snap = wait_for(&poller, |s| s.state == PollState::Failed).await;
        assert!(snap.flights.is_empty());
        assert_eq!(snap.error.as_deref(), Some("request timed out"));
        poller.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_applies_altitude_filter() {
        let source = ScriptedSource::new(vec![(
            Duration::ZERO,
            Ok(vec![
                record("low", Some(500.0)),
                record("mid", Some(1500.0)),
                record("high", Some(2500.0)),
            ]),
        )]);
        let config = PollerConfig {
            interval: Duration::from_secs(3600),
            initial_filter: FilterState {
                region: Region::world(),
                altitude: AltitudeBand {
                    name: "test",
                    min_m: Some(1000.0),
                    max_m: Some(2000.0),
                },
            },
        };
        let poller = Poller::spawn_with_client(source, reqwest::Client::new(), config);

        let snap = wait_for(&poller, |s| s.state == PollState::Success).await;
        assert_eq!(snap.stats.fetched, 3);
        assert_eq!(snap.stats.visible, 1);
        assert_eq!(snap.flights[0].id, "mid");
        poller.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_filter_change_triggers_exactly_one_fetch() {
        let source = ScriptedSource::new(vec![(
            Duration::ZERO,
            Ok(vec![record("a", Some(1000.0))]),
        )]);
        let calls = source.call_counter();
        let poller = Poller::spawn_with_client(
            source,
            reqwest::Client::new(),
            long_interval_config(),
        );

        wait_for(&poller, |s| s.state == PollState::Success).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let filter = FilterState {
            region: Region::by_name("Asia").unwrap(),
            ..FilterState::default()
        };
        poller.set_filter(filter);
        wait_for(&poller, |s| s.stats.cycles == 2).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // The interval was reset by the change: well within the new period,
        // no additional cycles appear.
        tokio::time::sleep(Duration::from_secs(1800)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Re-sending the identical filter is a no-op.
        poller.set_filter(filter);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        poller.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_mutation_after_shutdown() {
        let source = ScriptedSource::new(vec![(
            Duration::from_secs(5),
            Ok(vec![record("late", Some(1000.0))]),
        )]);
        let poller = Poller::spawn_with_client(
            source,
            reqwest::Client::new(),
            long_interval_config(),
        );

        // Let the initial fetch get issued, then tear down mid-request.
        let snap = wait_for(&poller, |s| s.state == PollState::Fetching).await;
        assert!(snap.flights.is_empty());
        poller.shutdown();

        // The slow response resolves well after teardown; nothing commits.
        tokio::time::sleep(Duration::from_secs(30)).await;
        let snap = poller.snapshot();
        assert_eq!(snap.state, PollState::Fetching);
        assert!(snap.flights.is_empty());
        assert_eq!(snap.stats.cycles, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_discarded() {
        // Fetch #1 is slow and returns "stale"; fetch #2 is immediate and
        // returns "fresh". #1 resolves last but must not win.
        let source = ScriptedSource::new(vec![
            (Duration::from_secs(10), Ok(vec![record("stale", Some(100.0))])),
            (Duration::ZERO, Ok(vec![record("fresh", Some(200.0))])),
        ]);
        let calls = source.call_counter();
        let poller = Poller::spawn_with_client(
            source,
            reqwest::Client::new(),
            long_interval_config(),
        );

        // Initial (slow) fetch is in flight; force a second fetch.
        wait_for(&poller, |s| s.state == PollState::Fetching).await;
        let filter = FilterState {
            region: Region::by_name("Africa").unwrap(),
            ..FilterState::default()
        };
        poller.set_filter(filter);

        let snap = wait_for(&poller, |s| s.state == PollState::Success).await;
        assert_eq!(snap.flights[0].id, "fresh");
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Let the slow response resolve; the snapshot must be unchanged.
        tokio::time::sleep(Duration::from_secs(30)).await;
        let snap = poller.snapshot();
        assert_eq!(snap.flights[0].id, "fresh");
        assert_eq!(snap.stats.cycles, 1);
        poller.shutdown();
    }
}
