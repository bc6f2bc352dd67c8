/*!
# Cycle Scheduler

Drives periodic collection over every configured address.

## Cycle

1. A cycle-scoped child [`CancellationToken`] is derived from the caller's token.
2. One worker task per address is spawned into a [`JoinSet`]; a [`Semaphore`]
   bounds how many run at once.
3. Workers report through an mpsc channel sized to the address count, so a
   send never blocks.
4. The coordinator drains every report, publishing each fresh snapshot.
5. Once all workers have reported, the fleet summary is recomputed from the
   whole store and published together with the per-validator gauges.

A failing address never affects the others: it is logged, counted, and its
previous snapshot stays in the store.

## Shutdown

When the token fires mid-cycle, workers still in flight get the configured
grace period to report. Whatever is still running afterwards is aborted, the
cancelled cycle skips aggregation and returns to [`SchedulerState::Idle`].
[`Scheduler::run`] then moves to [`SchedulerState::Terminated`] without
starting another cycle.
*/

mod error;
mod worker;

pub use error::CollectError;
pub use worker::collect_address;

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregate::summarize;
use crate::config::{AddressConfig, SchedulerSettings};
use crate::derive::AddressSnapshot;
use crate::metrics::MetricsSink;
use crate::store::AddressStore;
use crate::upstream::UpstreamClient;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Scheduler timing and pool size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub grace_period: Duration,
    pub max_concurrency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&SchedulerSettings::default())
    }
}

impl From<&SchedulerSettings> for SchedulerConfig {
    fn from(settings: &SchedulerSettings) -> Self {
        Self {
            interval: Duration::from_secs(settings.interval_secs),
            grace_period: Duration::from_secs(settings.grace_period_secs),
            max_concurrency: settings.max_concurrency,
        }
    }
}

/// Lifecycle of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    Idle,
    Collecting,
    Terminated,
}

/// Outcome of one collection cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    /// Workers spawned, one per address
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Workers that never reported, or reported only their cancellation
    pub abandoned: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

type WorkerReport = (AddressConfig, Result<AddressSnapshot, CollectError>);

/// Periodic collector over a fixed address list
pub struct Scheduler {
    client: Arc<dyn UpstreamClient>,
    store: Arc<AddressStore>,
    sink: Arc<dyn MetricsSink>,
    addresses: Arc<[AddressConfig]>,
    config: SchedulerConfig,
    state: watch::Sender<SchedulerState>,
    cycles: AtomicU64,
}

impl Scheduler {
    pub fn new(
        client: Arc<dyn UpstreamClient>,
        store: Arc<AddressStore>,
        sink: Arc<dyn MetricsSink>,
        addresses: Vec<AddressConfig>,
        config: SchedulerConfig,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            client,
            store,
            sink,
            addresses: addresses.into(),
            config,
            state,
            cycles: AtomicU64::new(0),
        }
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Number of cycles started so far
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn store(&self) -> &Arc<AddressStore> {
        &self.store
    }

    /// Run cycles until `cancel` fires.
    ///
    /// The first cycle starts immediately. Returns once the scheduler is
    /// [`SchedulerState::Terminated`].
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.interval.max(MIN_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            addresses = self.addresses.len(),
            interval_secs = self.config.interval.as_secs(),
            "scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if self.run_cycle(&cancel).await.cancelled {
                break;
            }
        }

        self.state.send_replace(SchedulerState::Terminated);
        info!(cycles = self.cycles(), "scheduler terminated");
    }

    /// Run a single cycle over every address
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleReport {
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let started = Instant::now();
        self.state.send_replace(SchedulerState::Collecting);

        let token = cancel.child_token();
        let total = self.addresses.len();
        let permits = Arc::new(Semaphore::new(total.min(self.config.max_concurrency).max(1)));
        let (tx, mut rx) = mpsc::channel::<WorkerReport>(total.max(1));
        let mut workers = JoinSet::new();

        debug!(cycle, addresses = total, "cycle started");

        for address in self.addresses.iter().cloned() {
            let client = Arc::clone(&self.client);
            let store = Arc::clone(&self.store);
            let permits = Arc::clone(&permits);
            let token = token.clone();
            let tx = tx.clone();

            workers.spawn(async move {
                let outcome = tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(CollectError::Cancelled),
                    permit = permits.acquire_owned() => match permit {
                        Ok(_permit) => {
                            collect_address(client.as_ref(), &store, &address, &token).await
                        }
                        Err(_) => Err(CollectError::Cancelled),
                    },
                };
                let _ = tx.send((address, outcome)).await;
            });
        }
        drop(tx);

        let mut report = CycleReport {
            cycle,
            dispatched: total,
            ..CycleReport::default()
        };
        let mut deadline: Option<Instant> = None;

        loop {
            let received = match deadline {
                None => tokio::select! {
                    biased;
                    received = rx.recv() => received,
                    _ = token.cancelled() => {
                        report.cancelled = true;
                        deadline = Some(Instant::now() + self.config.grace_period);
                        debug!(
                            cycle,
                            grace_ms = self.config.grace_period.as_millis() as u64,
                            "cycle cancelled, draining"
                        );
                        continue;
                    }
                },
                Some(deadline) => match tokio::time::timeout_at(deadline, rx.recv()).await {
                    Ok(received) => received,
                    Err(_) => break,
                },
            };
            let Some((address, outcome)) = received else {
                break;
            };
            self.handle_report(cycle, &address, outcome, &mut report);
        }

        workers.shutdown().await;
        report.abandoned = report.dispatched - report.succeeded - report.failed;
        report.elapsed = started.elapsed();

        if report.cancelled {
            warn!(
                cycle,
                succeeded = report.succeeded,
                failed = report.failed,
                abandoned = report.abandoned,
                "cycle cancelled, skipping aggregation"
            );
            self.state.send_replace(SchedulerState::Idle);
            return report;
        }

        self.publish_fleet();
        self.sink.record_cycle(&report);
        self.state.send_replace(SchedulerState::Idle);

        info!(
            cycle,
            succeeded = report.succeeded,
            failed = report.failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "cycle completed"
        );
        report
    }

    fn handle_report(
        &self,
        cycle: u64,
        address: &AddressConfig,
        outcome: Result<AddressSnapshot, CollectError>,
        report: &mut CycleReport,
    ) {
        match outcome {
            Ok(snapshot) => {
                report.succeeded += 1;
                self.sink.publish_address(&snapshot);
            }
            Err(error) if error.is_cancelled() => {
                debug!(cycle, address = %address.address, "address collection cancelled");
            }
            Err(error) => {
                report.failed += 1;
                warn!(
                    cycle,
                    address = %address.address,
                    label = %address.label,
                    transient = error.is_transient(),
                    error = %error,
                    "failed to update address"
                );
                self.sink.record_failure(address);
            }
        }
    }

    /// Recompute the summary from the whole store and publish it
    fn publish_fleet(&self) {
        let snapshots = self.store.list();
        let summary = summarize(&snapshots);
        self.sink.publish_summary(&summary);

        for snapshot in snapshots.iter().filter(|s| s.has_validator()) {
            self.sink.publish_validator(snapshot);
        }

        debug!(
            addresses = summary.address_count,
            validators = summary.validator_count,
            active = summary.active_validator_count,
            "fleet summary published"
        );
    }
}
