use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::CollectError;
use crate::config::AddressConfig;
use crate::derive::{derive_snapshot, AddressSnapshot};
use crate::store::AddressStore;
use crate::upstream::UpstreamClient;

/// Collect, derive and store the snapshot for one address.
///
/// Steps run in order: wallet balance, staker info, then validator lookup and
/// detail when a validator key is configured. The store is written only when
/// every step succeeded.
pub async fn collect_address(
    client: &dyn UpstreamClient,
    store: &AddressStore,
    address: &AddressConfig,
    cancel: &CancellationToken,
) -> Result<AddressSnapshot, CollectError> {
    let wallet = client
        .fetch_wallet_balance(&address.address, cancel)
        .await
        .map_err(|e| CollectError::from_step(e, CollectError::WalletBalance))?;

    let staker = client.fetch_staker_info(&address.address, cancel).await;
    if cancel.is_cancelled() {
        return Err(CollectError::Cancelled);
    }

    let mut validator = None;
    let mut detail = None;
    if let Some(validator_key) = address.validator_address() {
        let info = client
            .fetch_validator_info(validator_key, cancel)
            .await
            .map_err(|e| CollectError::from_step(e, CollectError::ValidatorLookup))?
            .ok_or_else(|| CollectError::ValidatorNotFound(validator_key.to_string()))?;

        if !info.index.trim().is_empty() {
            let fetched = client
                .fetch_validator_detail(&info.index, cancel)
                .await
                .map_err(|e| {
                    CollectError::from_step(e, |source| CollectError::ValidatorDetail {
                        index: info.index.clone(),
                        source,
                    })
                })?;
            detail = Some(fetched);
        }
        validator = Some(info);
    }

    let snapshot = derive_snapshot(
        address,
        &wallet,
        &staker,
        validator.as_ref(),
        detail.as_ref(),
        Utc::now(),
    );
    store.put(snapshot.clone());
    debug!(address = %address.address, label = %address.label, "snapshot stored");

    Ok(snapshot)
}
