use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;
use tracing::info;

use super::{MetricsSink, MetricsUtils};
use crate::aggregate::{status_bucket, FleetSummary};
use crate::config::AddressConfig;
use crate::derive::AddressSnapshot;
use crate::scheduler::CycleReport;
use crate::Result;

static DESCRIBED: Lazy<()> = Lazy::new(describe_metrics);

/// Install the global Prometheus recorder and its HTTP listener.
///
/// Must run inside a tokio runtime; the listener task is spawned onto it.
pub fn install_exporter(listen: SocketAddr) -> Result<()> {
    PrometheusBuilder::new().with_http_listener(listen).install()?;
    info!(%listen, "metrics exporter listening");
    Ok(())
}

fn describe_metrics() {
    describe_gauge!("account_balance", "Current account balance in DILL");
    describe_gauge!("staking_balance", "Current staking balance in DILL");
    describe_gauge!("staked_amount", "Total staked amount in DILL");
    describe_gauge!("reward_amount", "Current reward amount in DILL");
    describe_gauge!("daily_reward_amount", "Daily reward amount in DILL");
    describe_gauge!("latest_income_amount", "Latest income amount in DILL");
    describe_gauge!("last_epoch", "Last epoch number");
    describe_gauge!("last_reward_time", "Last reward time as unix timestamp");
    describe_gauge!("pool_created_count", "Number of pools created");
    describe_gauge!("pool_participated_count", "Number of pools participated in");

    describe_gauge!("validator_reward", "Validator reward amount in DILL");
    describe_gauge!("validator_status", "Validator status (1 for active, 0 for inactive)");
    describe_gauge!("validator_last_epoch", "Validator's last processed epoch");
    describe_gauge!("validator_last_reward_time", "Validator's last reward time as unix timestamp");
    describe_gauge!("validator_balance", "Validator's balance in DILL");
    describe_gauge!("validator_status_info", "Validator status information");

    describe_gauge!("total_address_count", "Total number of addresses being monitored");
    describe_gauge!("total_balance", "Total balance across all addresses in DILL");
    describe_gauge!("total_reward", "Total rewards across all addresses in DILL");
    describe_gauge!("total_staked_amount", "Total staked amount across all addresses in DILL");
    describe_gauge!("total_validator_count", "Total number of validators");
    describe_gauge!("active_validator_count", "Total number of active validators");
    describe_gauge!("validator_status_count", "Number of validators in each status");

    describe_counter!("dill_cycles_total", "Completed collection cycles");
    describe_counter!("dill_address_failures_total", "Per-address collection failures");
    describe_gauge!("dill_cycle_duration_seconds", "Duration of the last collection cycle");
    describe_gauge!("dill_last_cycle_succeeded", "Addresses updated in the last cycle");
    describe_gauge!("dill_last_cycle_failed", "Addresses that failed in the last cycle");
}

/// [`MetricsSink`] backed by the global `metrics` recorder
#[derive(Debug, Default)]
pub struct PrometheusSink {
    /// Status buckets written by the previous summary
    published_statuses: Mutex<BTreeSet<String>>,
    /// Last status label written per validator index
    validator_statuses: Mutex<HashMap<String, String>>,
}

impl PrometheusSink {
    pub fn new() -> Self {
        Lazy::force(&DESCRIBED);
        Self::default()
    }
}

fn address_labels(snapshot: &AddressSnapshot) -> [(&'static str, String); 2] {
    [
        ("address", snapshot.address.clone()),
        ("label", snapshot.label.clone()),
    ]
}

fn validator_labels(snapshot: &AddressSnapshot) -> [(&'static str, String); 2] {
    [
        ("validator_idx", snapshot.validator_index.clone()),
        ("label", snapshot.label.clone()),
    ]
}

fn reward_timestamp(snapshot: &AddressSnapshot) -> f64 {
    snapshot
        .last_reward_timestamp()
        .unwrap_or_else(|| Utc::now().timestamp()) as f64
}

impl MetricsSink for PrometheusSink {
    fn publish_address(&self, snapshot: &AddressSnapshot) {
        let labels = address_labels(snapshot);

        gauge!("account_balance", MetricsUtils::gauge_value(&snapshot.balance), &labels);
        gauge!("staked_amount", MetricsUtils::gauge_value(&snapshot.staked_amount), &labels);
        gauge!("reward_amount", MetricsUtils::gauge_value(&snapshot.reward), &labels);
        gauge!("last_reward_time", reward_timestamp(snapshot), &labels);
        gauge!("pool_created_count", snapshot.pool_created_count as f64, &labels);
        gauge!("pool_participated_count", snapshot.pool_participated_count as f64, &labels);

        // Only validator-bound addresses get these series
        if snapshot.has_validator() {
            let staking_balance = MetricsUtils::gauge_value(&snapshot.staking_balance);
            let daily_reward = MetricsUtils::gauge_value(&snapshot.daily_reward);
            let latest_income = MetricsUtils::gauge_value(&snapshot.latest_income);
            gauge!("staking_balance", staking_balance, &labels);
            gauge!("daily_reward_amount", daily_reward, &labels);
            gauge!("latest_income_amount", latest_income, &labels);
            gauge!("last_epoch", MetricsUtils::gauge_value(&snapshot.last_epoch), &labels);
        }
    }

    fn publish_validator(&self, snapshot: &AddressSnapshot) {
        if !snapshot.has_validator() {
            return;
        }
        let labels = validator_labels(snapshot);
        let active = if snapshot.is_active_at(Utc::now()) { 1.0 } else { 0.0 };

        gauge!("validator_reward", MetricsUtils::gauge_value(&snapshot.latest_income), &labels);
        gauge!("validator_balance", MetricsUtils::gauge_value(&snapshot.staking_balance), &labels);
        gauge!("validator_status", active, &labels);
        gauge!("validator_last_epoch", MetricsUtils::gauge_value(&snapshot.last_epoch), &labels);
        gauge!("validator_last_reward_time", reward_timestamp(snapshot), &labels);

        let status = status_bucket(&snapshot.status).to_string();
        let previous = self
            .validator_statuses
            .lock()
            .insert(snapshot.validator_index.clone(), status.clone());
        if let Some(previous) = previous.filter(|previous| *previous != status) {
            gauge!("validator_status_info", 0.0,
                "validator_idx" => snapshot.validator_index.clone(),
                "label" => snapshot.label.clone(),
                "status" => previous
            );
        }
        gauge!("validator_status_info", 1.0,
            "validator_idx" => snapshot.validator_index.clone(),
            "label" => snapshot.label.clone(),
            "status" => status
        );
    }

    fn publish_summary(&self, summary: &FleetSummary) {
        gauge!("total_address_count", summary.address_count as f64);
        gauge!("total_validator_count", summary.validator_count as f64);
        gauge!("active_validator_count", summary.active_validator_count as f64);
        gauge!("total_balance", summary.total_balance_f64());
        gauge!("total_reward", summary.total_reward_f64());
        gauge!("total_staked_amount", summary.total_staked_amount_f64());

        let mut published = self.published_statuses.lock();
        let stale_statuses = published
            .iter()
            .filter(|status| !summary.status_histogram.contains_key(*status));
        for stale in stale_statuses {
            gauge!("validator_status_count", 0.0, "status" => stale.clone());
        }
        for (status, count) in &summary.status_histogram {
            gauge!("validator_status_count", *count as f64, "status" => status.clone());
        }
        *published = summary.status_histogram.keys().cloned().collect();
    }

    fn record_failure(&self, address: &AddressConfig) {
        counter!("dill_address_failures_total", 1,
            "address" => address.address.clone(),
            "label" => address.label.clone()
        );
    }

    fn record_cycle(&self, report: &CycleReport) {
        counter!("dill_cycles_total", 1);
        gauge!("dill_cycle_duration_seconds", report.elapsed.as_secs_f64());
        gauge!("dill_last_cycle_succeeded", report.succeeded as f64);
        gauge!("dill_last_cycle_failed", report.failed as f64);
    }
}
