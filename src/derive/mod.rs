/*!
# Derivation Engine

Turns the raw upstream records for one address into an [`AddressSnapshot`],
the unit stored per address and exported as metrics.

[`derive_snapshot`] is a pure function of its inputs, including the
timestamp, so deriving twice from the same records yields identical snapshots.

## Rules

- Wallet balance, staked amount, reward and pool counts are always populated.
- Without a validator, validator fields keep their `"0"` / empty defaults.
- Staking balance is the validator balance in gwei, 3 decimals.
- Last epoch and latest income come from the tail of the detail series.
- The daily reward estimate is taken from the first applicable source:
  1. the sum of the first two daily income totals,
  2. twice the only daily total,
  3. the last per-epoch income times [`EPOCHS_PER_DAY`],
  4. the latest income, else `"0"`.

All amounts are exact decimals rounded half-to-even at their display precision.
*/

pub mod units;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::AddressConfig;
use crate::upstream::{RawStakerInfo, RawValidatorDetail, RawValidatorInfo, RawWalletBalance};
use units::{
    format_fixed, from_gwei, parse_decimal, scale_down, DILL_SUFFIX, GWEI_EXPONENT, WEI_EXPONENT,
};

/// Approximate number of epochs per day, used to extrapolate a single income sample
pub const EPOCHS_PER_DAY: i64 = 225;

/// Rendered value of every unset numeric field
pub const ZERO: &str = "0";

const WALLET_DP: u32 = 10;
const STAKING_BALANCE_DP: u32 = 3;
const AMOUNT_DP: u32 = 4;

/// Last derived metric set for one address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSnapshot {
    pub label: String,
    pub address: String,
    pub validator_address: String,
    pub validator_index: String,
    pub status: String,
    /// Wallet balance, e.g. `"2.6395060217 DILL"`
    pub balance: String,
    pub staking_balance: String,
    pub staked_amount: String,
    pub reward: String,
    pub pool_created_count: i64,
    pub pool_participated_count: i64,
    pub last_epoch: String,
    /// RFC 3339 timestamp of the derivation
    pub last_reward_time: String,
    pub latest_income: String,
    pub daily_reward: String,
}

impl AddressSnapshot {
    /// Whether a validator index was resolved for this address
    pub fn has_validator(&self) -> bool {
        !self.validator_index.trim().is_empty()
    }

    /// Whether the validator status marks it as active
    pub fn is_active(&self) -> bool {
        self.status.to_lowercase().contains("active")
    }

    /// Activity flag exported per validator.
    ///
    /// A reported status decides on its own. Without one, a validator counts
    /// as active while its last reward time is under a day old.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        if !self.status.trim().is_empty() {
            return self.is_active();
        }
        match DateTime::parse_from_rfc3339(&self.last_reward_time) {
            Ok(time) => now.signed_duration_since(time) <= chrono::Duration::hours(24),
            Err(_) => !self.last_reward_time.is_empty(),
        }
    }

    /// `last_reward_time` as unix seconds
    pub fn last_reward_timestamp(&self) -> Option<i64> {
        DateTime::parse_from_rfc3339(&self.last_reward_time)
            .ok()
            .map(|time| time.timestamp())
    }
}

/// Derive the snapshot for `address` from its raw upstream records
pub fn derive_snapshot(
    address: &AddressConfig,
    wallet: &RawWalletBalance,
    staker: &RawStakerInfo,
    validator: Option<&RawValidatorInfo>,
    detail: Option<&RawValidatorDetail>,
    now: DateTime<Utc>,
) -> AddressSnapshot {
    let mut snapshot = AddressSnapshot {
        label: address.label.clone(),
        address: address.address.clone(),
        validator_address: address.validator_address.clone(),
        validator_index: String::new(),
        status: String::new(),
        balance: wallet_balance(wallet),
        staking_balance: ZERO.into(),
        staked_amount: format_fixed(from_gwei(staker.staked_amount.into()), AMOUNT_DP),
        reward: format_fixed(from_gwei(staker.reward.into()), AMOUNT_DP),
        pool_created_count: staker.pool_created_count,
        pool_participated_count: staker.pool_participated_count,
        last_epoch: ZERO.into(),
        last_reward_time: now.to_rfc3339_opts(SecondsFormat::Secs, true),
        latest_income: ZERO.into(),
        daily_reward: ZERO.into(),
    };

    if let Some(validator) = validator {
        snapshot.validator_index = validator.index.clone();
        snapshot.status = validator.status.clone();
        snapshot.staking_balance = staking_balance(&validator.balance);
    }

    if let Some(detail) = detail {
        if let Some(epoch) = detail.epoch_idx.last() {
            snapshot.last_epoch = epoch.clone();
        }
        let latest = detail.income_gwei.last();
        if let Some(income) = latest.and_then(|raw| gwei_string(raw, AMOUNT_DP)) {
            snapshot.latest_income = income;
        }
        snapshot.daily_reward =
            estimate_daily_reward(detail, &snapshot.latest_income, &snapshot.validator_index);
    }

    snapshot
}

fn wallet_balance(wallet: &RawWalletBalance) -> String {
    let amount = scale_down(wallet.amount, WEI_EXPONENT).unwrap_or(Decimal::ZERO);
    format!("{}{}", format_fixed(amount, WALLET_DP), DILL_SUFFIX)
}

fn staking_balance(raw: &str) -> String {
    gwei_string(raw, STAKING_BALANCE_DP).unwrap_or_else(|| ZERO.into())
}

/// Render a gwei decimal string in whole units
fn gwei_string(raw: &str, dp: u32) -> Option<String> {
    parse_decimal(raw)
        .and_then(|value| scale_down(value, GWEI_EXPONENT))
        .map(|value| format_fixed(value, dp))
}

/// Daily reward estimate in strict source priority
pub fn estimate_daily_reward(
    detail: &RawValidatorDetail,
    latest_income: &str,
    validator_index: &str,
) -> String {
    match detail.income_gwei_day_sum.as_slice() {
        [first, second, ..] => {
            format_fixed(from_gwei(i128::from(*first) + i128::from(*second)), AMOUNT_DP)
        }
        [only] => format_fixed(from_gwei(i128::from(*only) * 2), AMOUNT_DP),
        [] => match detail.income_gwei.last() {
            Some(last) => parse_decimal(last)
                .and_then(|income| income.checked_mul(Decimal::from(EPOCHS_PER_DAY)))
                .and_then(|daily| scale_down(daily, GWEI_EXPONENT))
                .map(|daily| format_fixed(daily, AMOUNT_DP))
                .unwrap_or_else(|| latest_income.to_string()),
            None => {
                warn!(validator_idx = validator_index, "no income data to estimate daily reward");
                ZERO.into()
            }
        },
    }
}
