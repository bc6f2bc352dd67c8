use thiserror::Error;

use crate::upstream::UpstreamError;

/// Per-address collection failures.
///
/// Any of these skips the address for the current cycle; its previous
/// snapshot stays in the store.
#[derive(Error, Debug)]
pub enum CollectError {
    /// Wallet balance could not be fetched or decoded
    #[error("Wallet balance error: {0}")]
    WalletBalance(#[source] UpstreamError),

    /// Validator listing failed
    #[error("Validator lookup error: {0}")]
    ValidatorLookup(#[source] UpstreamError),

    /// A validator key is configured but the listing has no match
    #[error("Validator not found for key {0}")]
    ValidatorNotFound(String),

    /// Validator detail could not be fetched or decoded
    #[error("Validator detail error for index {index}: {source}")]
    ValidatorDetail {
        index: String,
        #[source]
        source: UpstreamError,
    },

    /// The cycle was cancelled before the address completed
    #[error("Collection cancelled")]
    Cancelled,
}

impl CollectError {
    /// Whether the underlying failure may clear up by the next cycle
    pub fn is_transient(&self) -> bool {
        match self {
            CollectError::WalletBalance(e) | CollectError::ValidatorLookup(e) => e.is_transient(),
            CollectError::ValidatorDetail { source, .. } => source.is_transient(),
            CollectError::ValidatorNotFound(_) | CollectError::Cancelled => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CollectError::Cancelled)
    }

    /// Wrap an upstream error for one step, keeping cancellation distinct
    pub(crate) fn from_step(
        error: UpstreamError,
        wrap: impl FnOnce(UpstreamError) -> CollectError,
    ) -> Self {
        match error {
            UpstreamError::Cancelled => CollectError::Cancelled,
            other => wrap(other),
        }
    }
}
