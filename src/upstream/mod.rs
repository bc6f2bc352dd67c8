/*!
# Upstream Client

Read-only access to the two remote services the monitor depends on:

- the tRPC stats API (wallet balance, validator listing, validator detail),
- the staker service (staked amount, rewards, pool counts).

[`UpstreamClient`] is the seam the collector works against; [`HttpUpstreamClient`]
is the production implementation over `reqwest`. Each call takes the cycle's
cancellation token and returns [`UpstreamError::Cancelled`] as soon as it fires.

Error policy differs per call and is part of the contract:

| call | malformed / failed response |
|---|---|
| `fetch_wallet_balance` | error |
| `fetch_staker_info` | zero record, never an error |
| `fetch_validator_info` | error; zero matches is `Ok(None)` |
| `fetch_validator_detail` | error |
*/

pub mod client;
pub mod error;
pub mod types;

pub use client::HttpUpstreamClient;
pub use error::UpstreamError;
pub use types::{
    decode_staker_info, decode_validator_detail, decode_validator_info, decode_wallet_balance,
    RawStakerInfo, RawValidatorDetail, RawValidatorInfo, RawWalletBalance,
};

use async_trait::async_trait;
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Remote endpoint identifier, used in errors and metric labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    WalletBalance,
    StakerInfo,
    ValidatorList,
    ValidatorDetail,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::WalletBalance => "wallet_balance",
            Endpoint::StakerInfo => "staker_info",
            Endpoint::ValidatorList => "validator_list",
            Endpoint::ValidatorDetail => "validator_detail",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of raw per-address data
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Wallet balance for `address`
    async fn fetch_wallet_balance(
        &self,
        address: &str,
        cancel: &CancellationToken,
    ) -> Result<RawWalletBalance, UpstreamError>;

    /// Staker summary for `address`; zero-valued on any failure
    async fn fetch_staker_info(&self, address: &str, cancel: &CancellationToken) -> RawStakerInfo;

    /// Validator bound to `validator_address`, `None` when the listing is empty
    async fn fetch_validator_info(
        &self,
        validator_address: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<RawValidatorInfo>, UpstreamError>;

    /// Income series for `validator_index` over the last 24 hours
    async fn fetch_validator_detail(
        &self,
        validator_index: &str,
        cancel: &CancellationToken,
    ) -> Result<RawValidatorDetail, UpstreamError>;
}
