//! Typed upstream records and their decoders.
//!
//! Every tRPC endpoint wraps its payload as `{"result":{"data":{"json":<payload>}}}`.
//! The envelope is required; a body missing it is a [`UpstreamError::Decode`].
//! Fields inside the payload default when absent, matching what the APIs
//! actually omit in practice.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Endpoint, UpstreamError};
use crate::derive::units::parse_decimal;

/// Maximum number of body characters quoted in an invalid-JSON error
const SNIPPET_LEN: usize = 100;

/// Wallet balance in base units (scaled by 10^18)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawWalletBalance {
    pub amount: Decimal,
}

/// Staker service summary, amounts in gwei
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawStakerInfo {
    pub staked_amount: i64,
    pub reward: i64,
    pub pool_created_count: i64,
    pub pool_participated_count: i64,
}

/// Validator listing entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawValidatorInfo {
    pub index: String,
    pub status: String,
    /// Effective balance in gwei, as a decimal string
    pub balance: String,
}

/// Validator income series over the requested window
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawValidatorDetail {
    pub validator_idx: String,
    pub validator_public_key: String,
    pub epoch_idx: Vec<String>,
    pub agg_epoch_idx: Vec<Vec<String>>,
    #[serde(rename = "incomeGWei")]
    pub income_gwei: Vec<String>,
    #[serde(alias = "incomeGWeiDaySum")]
    pub income_gwei_day_sum: Vec<i64>,
    #[serde(alias = "incomeGWeiDaySumDate")]
    pub income_gwei_day_sum_date: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TrpcEnvelope<T> {
    result: TrpcResult<T>,
}

#[derive(Debug, Deserialize)]
struct TrpcResult<T> {
    data: TrpcData<T>,
}

#[derive(Debug, Deserialize)]
struct TrpcData<T> {
    json: T,
}

#[derive(Debug, Deserialize)]
struct BalancePayload {
    balance: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ValidatorListPayload {
    data: Vec<RawValidatorInfo>,
}

fn decode_envelope<T: serde::de::DeserializeOwned>(
    endpoint: Endpoint,
    body: &[u8],
) -> Result<T, UpstreamError> {
    serde_json::from_slice::<TrpcEnvelope<T>>(body)
        .map(|envelope| envelope.result.data.json)
        .map_err(|e| UpstreamError::Decode {
            endpoint,
            reason: e.to_string(),
        })
}

/// Decode `stats.getBalance`
pub fn decode_wallet_balance(body: &[u8]) -> Result<RawWalletBalance, UpstreamError> {
    let payload: BalancePayload = decode_envelope(Endpoint::WalletBalance, body)?;
    let raw = payload.balance.ok_or_else(|| UpstreamError::Decode {
        endpoint: Endpoint::WalletBalance,
        reason: "missing field `balance`".into(),
    })?;
    let amount = parse_decimal(&raw).ok_or(UpstreamError::InvalidNumber {
        field: "balance",
        value: raw,
    })?;
    Ok(RawWalletBalance { amount })
}

/// Decode the staker service `GetUserInfo` response
pub fn decode_staker_info(body: &[u8]) -> Result<RawStakerInfo, UpstreamError> {
    serde_json::from_slice(body).map_err(|e| UpstreamError::Decode {
        endpoint: Endpoint::StakerInfo,
        reason: e.to_string(),
    })
}

/// Decode `stats.getAllValidators`; the first match wins
pub fn decode_validator_info(body: &[u8]) -> Result<Option<RawValidatorInfo>, UpstreamError> {
    let payload: ValidatorListPayload = decode_envelope(Endpoint::ValidatorList, body)?;
    Ok(payload.data.into_iter().next())
}

/// Decode `stats.getValidatorDetailByKeyOrIdx`.
///
/// Checks run in order and each failure has its own variant: empty body,
/// syntactically invalid JSON, then shape mismatch.
pub fn decode_validator_detail(body: &[u8]) -> Result<RawValidatorDetail, UpstreamError> {
    let endpoint = Endpoint::ValidatorDetail;
    if body.is_empty() {
        return Err(UpstreamError::EmptyBody { endpoint });
    }
    if serde_json::from_slice::<serde::de::IgnoredAny>(body).is_err() {
        return Err(UpstreamError::InvalidJson {
            endpoint,
            snippet: snippet(body),
        });
    }
    decode_envelope(endpoint, body)
}

fn snippet(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let mut out: String = text.chars().take(SNIPPET_LEN).collect();
    if text.chars().count() > SNIPPET_LEN {
        out.push_str("...");
    }
    out
}
