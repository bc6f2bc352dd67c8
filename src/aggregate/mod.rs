//! Fleet-wide summary statistics.
//!
//! [`summarize`] is always run over the full store contents, never applied
//! incrementally, so a partially failed cycle cannot leave drifted totals.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::derive::units::numeric_portion;
use crate::derive::AddressSnapshot;

/// Histogram bucket for validators reporting an empty status
pub const UNKNOWN_STATUS: &str = "unknown";

/// Aggregate view over every stored snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetSummary {
    pub address_count: usize,
    pub validator_count: usize,
    pub active_validator_count: usize,
    pub total_balance: Decimal,
    pub total_reward: Decimal,
    pub total_staked_amount: Decimal,
    /// Validators per trimmed status
    pub status_histogram: BTreeMap<String, usize>,
}

impl FleetSummary {
    pub fn total_balance_f64(&self) -> f64 {
        self.total_balance.to_f64().unwrap_or_default()
    }

    pub fn total_reward_f64(&self) -> f64 {
        self.total_reward.to_f64().unwrap_or_default()
    }

    pub fn total_staked_amount_f64(&self) -> f64 {
        self.total_staked_amount.to_f64().unwrap_or_default()
    }
}

/// Reduce `snapshots` into a [`FleetSummary`].
///
/// Numeric fields that fail to parse contribute zero.
pub fn summarize(snapshots: &[AddressSnapshot]) -> FleetSummary {
    let mut summary = FleetSummary {
        address_count: snapshots.len(),
        ..FleetSummary::default()
    };

    for snapshot in snapshots {
        accumulate(&mut summary.total_balance, &snapshot.balance);
        accumulate(&mut summary.total_reward, &snapshot.reward);
        accumulate(&mut summary.total_staked_amount, &snapshot.staked_amount);

        if !snapshot.has_validator() {
            continue;
        }
        summary.validator_count += 1;
        if snapshot.is_active() {
            summary.active_validator_count += 1;
        }
        *summary
            .status_histogram
            .entry(status_bucket(&snapshot.status).to_string())
            .or_insert(0) += 1;
    }

    summary
}

/// Histogram bucket for a raw validator status
pub fn status_bucket(status: &str) -> &str {
    let status = status.trim();
    if status.is_empty() {
        UNKNOWN_STATUS
    } else {
        status
    }
}

fn accumulate(total: &mut Decimal, rendered: &str) {
    if let Some(sum) = numeric_portion(rendered).and_then(|value| total.checked_add(value)) {
        *total = sum;
    }
}
