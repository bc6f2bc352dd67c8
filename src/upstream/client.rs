use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use metrics::{counter, histogram};
use serde_json::json;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{
    decode_staker_info, decode_validator_detail, decode_validator_info, decode_wallet_balance,
    Endpoint, RawStakerInfo, RawValidatorDetail, RawValidatorInfo, RawWalletBalance, UpstreamClient,
    UpstreamError,
};
use crate::config::UpstreamConfig;
use crate::{Error, Result};

/// Placeholder the detail endpoint insists on
const DETAIL_ITEM: &str = "only to meet the parameter requirements of tRPC";

/// Width of the validator detail window
const DETAIL_WINDOW_HOURS: i64 = 24;

/// `reqwest` implementation of [`UpstreamClient`]
#[derive(Debug, Clone)]
pub struct HttpUpstreamClient {
    http: reqwest::Client,
    config: UpstreamConfig,
}

impl HttpUpstreamClient {
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Client(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    fn trpc_url(&self, procedure: &str) -> String {
        format!("{}/{}", self.config.api_base_url.trim_end_matches('/'), procedure)
    }

    /// Send `request`, racing it against `cancel`, and record request metrics
    async fn execute(
        &self,
        endpoint: Endpoint,
        request: reqwest::RequestBuilder,
        cancel: &CancellationToken,
    ) -> std::result::Result<Vec<u8>, UpstreamError> {
        let started = Instant::now();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(UpstreamError::Cancelled),
            outcome = send(endpoint, request) => outcome,
        };

        histogram!(
            "dill_upstream_request_duration_seconds",
            started.elapsed().as_secs_f64(),
            "endpoint" => endpoint.as_str()
        );
        match &outcome {
            Ok(_) => {
                counter!("dill_upstream_requests_total", 1,
                    "endpoint" => endpoint.as_str(),
                    "status" => "ok"
                );
            }
            Err(e) => {
                counter!("dill_upstream_requests_total", 1,
                    "endpoint" => endpoint.as_str(),
                    "status" => "error"
                );
                counter!("dill_upstream_request_errors_total", 1,
                    "endpoint" => endpoint.as_str(),
                    "error_type" => e.kind()
                );
            }
        }
        outcome
    }
}

async fn send(
    endpoint: Endpoint,
    request: reqwest::RequestBuilder,
) -> std::result::Result<Vec<u8>, UpstreamError> {
    let response = request.send().await.map_err(|e| transport_error(endpoint, e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(UpstreamError::Status {
            endpoint,
            status: status.as_u16(),
        });
    }
    let body = response.bytes().await.map_err(|e| transport_error(endpoint, e))?;
    Ok(body.to_vec())
}

fn transport_error(endpoint: Endpoint, err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout { endpoint }
    } else {
        UpstreamError::Network {
            endpoint,
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    async fn fetch_wallet_balance(
        &self,
        address: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<RawWalletBalance, UpstreamError> {
        let input = json!({ "json": { "address": address } }).to_string();
        let request = self
            .http
            .get(self.trpc_url("stats.getBalance"))
            .query(&[("input", input)]);
        let body = self.execute(Endpoint::WalletBalance, request, cancel).await?;
        decode_wallet_balance(&body)
    }

    async fn fetch_staker_info(&self, address: &str, cancel: &CancellationToken) -> RawStakerInfo {
        let request = self
            .http
            .post(&self.config.staker_url)
            .query(&[("Action", "GetUserInfo")])
            .json(&json!({ "Action": "GetUserInfo", "Address": address }));

        let outcome = self
            .execute(Endpoint::StakerInfo, request, cancel)
            .await
            .and_then(|body| decode_staker_info(&body));
        match outcome {
            Ok(info) => info,
            Err(UpstreamError::Cancelled) => {
                debug!(address, "staker info request cancelled");
                RawStakerInfo::default()
            }
            Err(e) => {
                warn!(address, error = %e, "staker info unavailable, using zero values");
                RawStakerInfo::default()
            }
        }
    }

    async fn fetch_validator_info(
        &self,
        validator_address: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<Option<RawValidatorInfo>, UpstreamError> {
        let input = json!({
            "json": { "page": 1, "limit": 25, "pubkey": validator_address }
        })
        .to_string();
        let request = self
            .http
            .get(self.trpc_url("stats.getAllValidators"))
            .query(&[("input", input)]);
        let body = self.execute(Endpoint::ValidatorList, request, cancel).await?;
        decode_validator_info(&body)
    }

    async fn fetch_validator_detail(
        &self,
        validator_index: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<RawValidatorDetail, UpstreamError> {
        let now = Utc::now();
        let start = now - ChronoDuration::hours(DETAIL_WINDOW_HOURS);
        let input = json!({
            "json": {
                "item": DETAIL_ITEM,
                "validatorKey": validator_index,
                "validatorIdx": validator_index,
                "validatorIsStr": false,
                "startTime": start.timestamp_millis(),
                "endTime": now.timestamp_millis(),
            }
        })
        .to_string();
        let request = self
            .http
            .get(self.trpc_url("stats.getValidatorDetailByKeyOrIdx"))
            .query(&[("input", input)]);
        let body = self.execute(Endpoint::ValidatorDetail, request, cancel).await?;
        decode_validator_detail(&body)
    }
}
