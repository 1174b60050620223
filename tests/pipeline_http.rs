use hibob_mcp::config::Config;
use hibob_mcp::http::{ApiError, Pipeline};
use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;

fn test_config(base_url: String) -> Config {
    Config {
        token: "test-token".into(),
        api_url: base_url,
        user_agent: "hibob-mcp-tests".into(),
        timeout_secs: 5,
        cache_ttl_secs: 86_400,
    }
}

#[tokio::test]
async fn cache_hit_skips_network_and_round_trips() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/people")
                .query_param("limit", "10")
                .header("authorization", "Bearer test-token");
            then.status(200).json_body(json!({
                "data": [{"id": "1", "displayName": "Avery Quinn"}],
                "page": {"cursor": "abc"}
            }));
        })
        .await;

    let pipeline = Pipeline::new(test_config(server.base_url())).unwrap();
    let params = [("limit", Some("10".to_string())), ("cursor", None)];
    let first = pipeline.get_json("/people", &params).await.unwrap();
    let second = pipeline.get_json("/people", &params).await.unwrap();

    mock.assert_hits_async(1).await;
    assert_eq!(first, second);
    assert_eq!(first.page.as_ref().unwrap().cursor.as_deref(), Some("abc"));
}

#[tokio::test]
async fn rate_limited_responses_retry_then_succeed() {
    let server = MockServer::start_async().await;
    let mut limited = server
        .mock_async(|when, then| {
            when.method(GET).path("/timeoff/requests");
            then.status(429).header("Retry-After", "1");
        })
        .await;

    let pipeline = Pipeline::new(test_config(server.base_url())).unwrap();
    let handle = tokio::spawn(async move { pipeline.get_json("/timeoff/requests", &[]).await });

    // Let the first two attempts be served with 429, then swap in a 200
    // during the second backoff sleep.
    for _ in 0..200 {
        if limited.hits_async().await >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    limited.assert_hits_async(2).await;
    limited.delete_async().await;

    let ok = server
        .mock_async(|when, then| {
            when.method(GET).path("/timeoff/requests");
            then.status(200).json_body(json!({"data": []}));
        })
        .await;

    let envelope = handle.await.unwrap().unwrap();
    ok.assert_hits_async(1).await;
    assert!(envelope.data.as_array().is_some_and(|a| a.is_empty()));
}

#[tokio::test]
async fn server_errors_exhaust_attempts() {
    let server = MockServer::start_async().await;
    let broken = server
        .mock_async(|when, then| {
            when.method(GET).path("/people");
            then.status(500).body("upstream exploded");
        })
        .await;

    let pipeline = Pipeline::new(test_config(server.base_url())).unwrap();
    let err = pipeline.get_json("/people", &[]).await.unwrap_err();

    broken.assert_hits_async(3).await;
    match err {
        ApiError::Upstream { status, message } => {
            assert_eq!(status.as_u16(), 500);
            assert!(message.contains("upstream exploded"));
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn forbidden_fails_immediately_with_scope_hint() {
    let server = MockServer::start_async().await;
    let forbidden = server
        .mock_async(|when, then| {
            when.method(GET).path("/payroll/employees/7/payslips");
            then.status(403).json_body(json!({"message": "insufficient scope"}));
        })
        .await;

    let pipeline = Pipeline::new(test_config(server.base_url())).unwrap();
    let err = pipeline
        .get_json("/payroll/employees/7/payslips", &[])
        .await
        .unwrap_err();

    forbidden.assert_hits_async(1).await;
    let text = err.to_string();
    assert!(text.contains("insufficient scope"));
    assert!(text.contains("missing a permission scope"));
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let server = MockServer::start_async().await;
    let missing = server
        .mock_async(|when, then| {
            when.method(GET).path("/people/nobody");
            then.status(404)
                .json_body(json!({"errors": ["employee missing"]}));
        })
        .await;

    let pipeline = Pipeline::new(test_config(server.base_url())).unwrap();
    let err = pipeline.get_json("/people/nobody", &[]).await.unwrap_err();

    missing.assert_hits_async(1).await;
    match err {
        ApiError::Upstream { status, message } => {
            assert_eq!(status.as_u16(), 404);
            assert!(message.contains("employee missing"));
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn invalid_json_surfaces_decode_error_without_retry() {
    let server = MockServer::start_async().await;
    let garbled = server
        .mock_async(|when, then| {
            when.method(GET).path("/tasks");
            then.status(200)
                .header("content-type", "application/json")
                .body("not json{");
        })
        .await;

    let pipeline = Pipeline::new(test_config(server.base_url())).unwrap();
    let err = pipeline.get_json("/tasks", &[]).await.unwrap_err();

    garbled.assert_hits_async(1).await;
    assert!(matches!(err, ApiError::Decode(_)));
}
