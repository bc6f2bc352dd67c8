use dill_monitor::aggregate::FleetSummary;
use dill_monitor::metrics::{MetricsSink, MetricsUtils, PrometheusSink};
use dill_monitor::scheduler::CycleReport;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;

use crate::common::{test_address, test_snapshot};

/// The recorder is process-global, so every test shares one handle
fn handle() -> &'static PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    HANDLE.get_or_init(|| PrometheusBuilder::new().install_recorder().unwrap())
}

/// Value of the first `name` sample whose labels contain every fragment
fn sample(name: &str, fragments: &[&str]) -> Option<f64> {
    handle()
        .render()
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter(|line| {
            line.starts_with(&format!("{name}{{")) || line.starts_with(&format!("{name} "))
        })
        .find(|line| fragments.iter().all(|fragment| line.contains(fragment)))
        .and_then(|line| line.rsplit(' ').next())
        .and_then(|value| value.parse().ok())
}

fn assert_close(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("sample not rendered");
    assert!((actual - expected).abs() < 1e-9, "{actual} != {expected}");
}

#[test]
fn test_gauge_value_parsing() {
    assert_close(Some(MetricsUtils::gauge_value("2.6395060217 DILL")), 2.6395060217);
    assert_eq!(MetricsUtils::gauge_value("3600.000"), 3600.0);
    assert_eq!(MetricsUtils::gauge_value("n/a"), 0.0);
}

#[test]
fn test_publish_address_gauges() {
    handle();
    let sink = PrometheusSink::new();

    let mut snapshot = test_snapshot("0xsink01", "", "");
    snapshot.balance = "2.5000000000 DILL".into();
    snapshot.staked_amount = "3600.0000".into();
    sink.publish_address(&snapshot);

    let address = r#"address="0xsink01""#;
    assert_close(sample("account_balance", &[address]), 2.5);
    assert_close(sample("staked_amount", &[address]), 3600.0);
    assert!(sample("pool_created_count", &[address]).is_some());
    // No validator bound, so no validator-only series
    assert_eq!(sample("staking_balance", &[address]), None);
    assert_eq!(sample("daily_reward_amount", &[address]), None);
}

#[test]
fn test_publish_validator_gauges() {
    handle();
    let sink = PrometheusSink::new();

    let mut snapshot = test_snapshot("0xsink02", "9001", "pending_queued");
    snapshot.staking_balance = "32.000".into();
    snapshot.latest_income = "0.0025".into();
    snapshot.last_epoch = "902".into();
    sink.publish_address(&snapshot);
    sink.publish_validator(&snapshot);

    let validator = r#"validator_idx="9001""#;
    assert_close(sample("staking_balance", &[r#"address="0xsink02""#]), 32.0);
    assert_close(sample("validator_balance", &[validator]), 32.0);
    assert_close(sample("validator_reward", &[validator]), 0.0025);
    assert_close(sample("validator_last_epoch", &[validator]), 902.0);
    assert_close(sample("validator_status", &[validator]), 0.0);
    assert_close(sample("validator_status_info", &[validator, r#"status="pending_queued""#]), 1.0);

    snapshot.status = "active_ongoing".into();
    sink.publish_validator(&snapshot);

    assert_close(sample("validator_status", &[validator]), 1.0);
    assert_close(sample("validator_status_info", &[validator, r#"status="pending_queued""#]), 0.0);
    assert_close(sample("validator_status_info", &[validator, r#"status="active_ongoing""#]), 1.0);
}

#[test]
fn test_summary_zeroes_stale_status_buckets() {
    handle();
    let sink = PrometheusSink::new();

    let mut first = FleetSummary {
        address_count: 3,
        validator_count: 3,
        active_validator_count: 2,
        total_balance: Decimal::new(375, 2),
        ..FleetSummary::default()
    };
    first.status_histogram =
        BTreeMap::from([("sink_active".to_string(), 2), ("sink_exited".to_string(), 1)]);
    sink.publish_summary(&first);

    assert_close(sample("validator_status_count", &[r#"status="sink_exited""#]), 1.0);
    assert_close(sample("total_balance", &[]), 3.75);

    let second = FleetSummary {
        status_histogram: BTreeMap::from([("sink_active".to_string(), 3)]),
        ..first
    };
    sink.publish_summary(&second);

    assert_close(sample("validator_status_count", &[r#"status="sink_active""#]), 3.0);
    assert_close(sample("validator_status_count", &[r#"status="sink_exited""#]), 0.0);
}

#[test]
fn test_failure_and_cycle_counters() {
    handle();
    let sink = PrometheusSink::new();

    sink.record_failure(&test_address("flaky", "0xsink03"));
    sink.record_failure(&test_address("flaky", "0xsink03"));
    sink.record_cycle(&CycleReport {
        cycle: 1,
        dispatched: 3,
        succeeded: 2,
        failed: 1,
        elapsed: Duration::from_millis(1500),
        ..CycleReport::default()
    });

    assert_close(sample("dill_address_failures_total", &[r#"address="0xsink03""#]), 2.0);
    assert!(sample("dill_cycles_total", &[]).unwrap_or_default() >= 1.0);
}
