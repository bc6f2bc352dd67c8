use dill_monitor::config::UpstreamConfig;
use dill_monitor::upstream::{
    Endpoint, HttpUpstreamClient, RawStakerInfo, UpstreamClient, UpstreamError,
};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use serde_json::json;
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::trpc_body;

fn client_for(server: &MockServer, timeout_secs: u64) -> HttpUpstreamClient {
    HttpUpstreamClient::new(UpstreamConfig {
        api_base_url: format!("{}/api/trpc", server.uri()),
        staker_url: format!("{}/staker", server.uri()),
        request_timeout_secs: timeout_secs,
    })
    .unwrap()
}

#[tokio::test]
async fn test_wallet_balance() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/trpc/stats.getBalance"))
        .and(query_param("input", r#"{"json":{"address":"0xFEFC"}}"#))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(trpc_body(json!({ "balance": "2639506021700000000" }))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let wallet = client_for(&server, 5)
        .fetch_wallet_balance("0xFEFC", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(wallet.amount, Decimal::from_str("2639506021700000000").unwrap());
}

#[tokio::test]
async fn test_non_success_status() {
    let server = MockServer::start().await;
    Mock::given(path("/api/trpc/stats.getBalance"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let error = client_for(&server, 5)
        .fetch_wallet_balance("0xFEFC", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        UpstreamError::Status {
            endpoint: Endpoint::WalletBalance,
            status: 503
        }
    ));
    assert!(error.is_transient());
}

#[tokio::test]
async fn test_staker_info() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/staker"))
        .and(query_param("Action", "GetUserInfo"))
        .and(body_json(json!({ "Action": "GetUserInfo", "Address": "0xFEFC" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stakedAmount": 3_600_000_000_000i64,
            "reward": 1_500_000_000i64,
            "poolCreatedCount": 1,
            "poolParticipatedCount": 4
        })))
        .mount(&server)
        .await;

    let info = client_for(&server, 5)
        .fetch_staker_info("0xFEFC", &CancellationToken::new())
        .await;

    assert_eq!(info.staked_amount, 3_600_000_000_000);
    assert_eq!(info.pool_participated_count, 4);
}

#[tokio::test]
async fn test_staker_info_defaults_on_failure() {
    let server = MockServer::start().await;
    Mock::given(path("/staker"))
        .and(body_json(json!({ "Action": "GetUserInfo", "Address": "0xbroken" })))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;
    Mock::given(path("/staker"))
        .and(body_json(json!({ "Action": "GetUserInfo", "Address": "0xdown" })))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server, 5);
    let cancel = CancellationToken::new();

    assert_eq!(client.fetch_staker_info("0xbroken", &cancel).await, RawStakerInfo::default());
    assert_eq!(client.fetch_staker_info("0xdown", &cancel).await, RawStakerInfo::default());
}

#[tokio::test]
async fn test_validator_lookup() {
    let server = MockServer::start().await;
    Mock::given(path("/api/trpc/stats.getAllValidators"))
        .and(query_param("input", r#"{"json":{"limit":25,"page":1,"pubkey":"0x8e7b"}}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(trpc_body(json!({
            "data": [{ "index": "42", "status": "active_ongoing", "balance": "3600000000000" }]
        }))))
        .mount(&server)
        .await;
    Mock::given(path("/api/trpc/stats.getAllValidators"))
        .and(query_param("input", r#"{"json":{"limit":25,"page":1,"pubkey":"0xnone"}}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(trpc_body(json!({ "data": [] }))))
        .mount(&server)
        .await;

    let client = client_for(&server, 5);
    let cancel = CancellationToken::new();

    let found = client.fetch_validator_info("0x8e7b", &cancel).await.unwrap();
    assert_eq!(found.map(|v| v.index), Some("42".to_string()));

    let missing = client.fetch_validator_info("0xnone", &cancel).await.unwrap();
    assert_eq!(missing, None);
}

#[tokio::test]
async fn test_validator_detail_errors() {
    let server = MockServer::start().await;
    Mock::given(path("/api/trpc/stats.getValidatorDetailByKeyOrIdx"))
        .respond_with(ResponseTemplate::new(200))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(path("/api/trpc/stats.getValidatorDetailByKeyOrIdx"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"result\": "))
        .mount(&server)
        .await;

    let client = client_for(&server, 5);
    let cancel = CancellationToken::new();

    let empty = client.fetch_validator_detail("42", &cancel).await.unwrap_err();
    assert!(matches!(empty, UpstreamError::EmptyBody { .. }));

    let invalid = client.fetch_validator_detail("42", &cancel).await.unwrap_err();
    assert!(matches!(invalid, UpstreamError::InvalidJson { .. }));
}

#[tokio::test]
async fn test_validator_detail() {
    let server = MockServer::start().await;
    Mock::given(path("/api/trpc/stats.getValidatorDetailByKeyOrIdx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(trpc_body(json!({
            "validatorIdx": "42",
            "epochIdx": ["900", "901"],
            "incomeGWei": ["1000000", "2000000"],
            "incomeGWeiDaySum": [1000000000i64]
        }))))
        .mount(&server)
        .await;

    let detail = client_for(&server, 5)
        .fetch_validator_detail("42", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(detail.epoch_idx.last().map(String::as_str), Some("901"));
    assert_eq!(detail.income_gwei_day_sum, vec![1_000_000_000]);

    let requests = server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap_or_default().to_string();
    assert!(query.contains("validatorIdx"));
    assert!(query.contains("startTime"));
}

#[tokio::test]
async fn test_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(path("/api/trpc/stats.getBalance"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let error = client_for(&server, 1)
        .fetch_wallet_balance("0xFEFC", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(error, UpstreamError::Timeout { .. }));
}

#[tokio::test]
async fn test_cancellation_interrupts_request() {
    let server = MockServer::start().await;
    Mock::given(path("/api/trpc/stats.getBalance"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let client = client_for(&server, 10);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let error = client.fetch_wallet_balance("0xFEFC", &cancel).await.unwrap_err();

    assert!(matches!(error, UpstreamError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(2));
}
