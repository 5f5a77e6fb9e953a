//! Dispatcher outcomes against a mock HTTP server.

mod support;

use batch_fetch::dispatch::{Dispatcher, ItemToParams, NoParams, ParamMapping, RequestSpec};
use batch_fetch::resilience::{RateLimiter, RateLimiterConfig, RetryPolicy};
use batch_fetch::transport::{HttpMethod, HttpTransport, TransportConfig};
use batch_fetch::types::{FailureKind, Item, Payload};
use batch_fetch::utils::Template;
use mockito::Matcher;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use support::{closed_port_url, MockServerFixture};

fn dispatcher(method: HttpMethod, url: &str, params: Arc<dyn ItemToParams>) -> Dispatcher {
    let transport =
        HttpTransport::new(&TransportConfig::default().with_timeout(Duration::from_secs(5))).unwrap();
    let limiter = Arc::new(RateLimiter::new(RateLimiterConfig::per_second(100)));
    let spec = RequestSpec::new(method, Template::parse(url).unwrap());
    Dispatcher::new(transport, limiter, spec, params)
}

#[tokio::test]
async fn test_json_success_record() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture.mock_json("GET", "/item/7", r#"{"ok": true}"#).await;

    let d = dispatcher(HttpMethod::Get, &fixture.url("/item/{id}"), Arc::new(NoParams));
    let record = d.dispatch(&Item::new().with("id", "7")).await;

    mock.assert_async().await;
    assert_eq!(record.url, fixture.url("/item/7"));
    assert_eq!(record.response, Payload::Json(json!({"ok": true})));
    assert!(record.is_success());
}

#[tokio::test]
async fn test_non_200_records_status_only() {
    let mut fixture = MockServerFixture::new().await;
    let _mock = fixture.mock_status("GET", "/item/7", 404).await;

    let d = dispatcher(HttpMethod::Get, &fixture.url("/item/{id}"), Arc::new(NoParams));
    let record = d.dispatch(&Item::new().with("id", "7")).await;

    assert_eq!(record.url, fixture.url("/item/7"));
    assert_eq!(record.response, Payload::Status(404));
    assert_eq!(
        serde_json::to_value(&record).unwrap(),
        json!({"url": fixture.url("/item/7"), "response": 404})
    );
}

#[tokio::test]
async fn test_non_json_body_is_kept_as_text() {
    let mut fixture = MockServerFixture::new().await;
    let _mock = fixture
        .server
        .mock("GET", "/item/1")
        .with_status(200)
        .with_header("content-type", "text/plain; charset=utf-8")
        .with_body("plain body")
        .create_async()
        .await;

    let d = dispatcher(HttpMethod::Get, &fixture.url("/item/{id}"), Arc::new(NoParams));
    let record = d.dispatch(&Item::new().with("id", 1)).await;

    assert_eq!(record.response, Payload::Text("plain body".into()));
    assert!(!record.is_success());
}

#[tokio::test]
async fn test_malformed_json_is_a_decode_failure() {
    let mut fixture = MockServerFixture::new().await;
    let _mock = fixture.mock_json("GET", "/item/1", r#"{"ok": tru"#).await;

    let d = dispatcher(HttpMethod::Get, &fixture.url("/item/{id}"), Arc::new(NoParams));
    let record = d.dispatch(&Item::new().with("id", "1")).await;

    assert_eq!(record.url, fixture.url("/item/1"));
    assert_eq!(record.failure_kind(), Some(FailureKind::Decode));
}

#[tokio::test]
async fn test_get_params_go_to_query_string() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("GET", "/search")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), "fee f1".into()),
            Matcher::UrlEncoded("limit".into(), "10".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"total": 1}"#)
        .create_async()
        .await;

    let params = ParamMapping::new().fixed("limit", "10").field("q", "query");
    let d = dispatcher(HttpMethod::Get, &fixture.url("/search"), Arc::new(params));
    let record = d.dispatch(&Item::new().with("query", "fee f1")).await;

    mock.assert_async().await;
    assert!(record.is_success());
    assert!(record.url.starts_with(&fixture.url("/search?")));
    assert!(record.url.contains("limit=10"));
}

#[tokio::test]
async fn test_post_params_go_to_form_body_with_headers() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("POST", "/users/u1/fees/f1")
        .match_header("authorization", "apikey k")
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("op".into(), "waive".into()),
            Matcher::UrlEncoded("amount".into(), "12.5".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "f1", "status": "CLOSED"}"#)
        .create_async()
        .await;

    let waive = |item: &Item| {
        vec![
            ("op".to_string(), "waive".to_string()),
            ("amount".to_string(), item.get_text("amount").unwrap_or_default()),
        ]
    };
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_static("apikey k"));

    let transport = HttpTransport::new(&TransportConfig::default()).unwrap();
    let limiter = Arc::new(RateLimiter::new(RateLimiterConfig::per_second(10)));
    let spec = RequestSpec::new(
        HttpMethod::Post,
        Template::parse(fixture.url("/users/{user_id}/fees/{fee_id}")).unwrap(),
    )
    .with_headers(headers);
    let d = Dispatcher::new(transport, limiter, spec, Arc::new(waive));

    let item = Item::new()
        .with("fee_id", "f1")
        .with("amount", 12.5)
        .with("user_id", "u1");
    let record = d.dispatch(&item).await;

    mock.assert_async().await;
    assert_eq!(record.url, fixture.url("/users/u1/fees/f1"));
    assert_eq!(
        record.response,
        Payload::Json(json!({"id": "f1", "status": "CLOSED"}))
    );
}

#[tokio::test]
async fn test_transport_failure_is_recorded() {
    let base = closed_port_url();
    let d = dispatcher(HttpMethod::Get, &format!("{}/item/{{id}}", base), Arc::new(NoParams));
    let record = d.dispatch(&Item::new().with("id", "9")).await;

    assert_eq!(record.url, format!("{}/item/9", base));
    assert_eq!(record.failure_kind(), Some(FailureKind::Transport));
    let encoded = serde_json::to_value(&record).unwrap();
    assert_eq!(encoded["response"]["error"], "transport");
    assert!(encoded["response"]["detail"].as_str().is_some());
}

#[tokio::test]
async fn test_template_failure_does_not_send() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let d = dispatcher(HttpMethod::Get, &fixture.url("/item/{id}"), Arc::new(NoParams));
    let record = d.dispatch(&Item::new().with("name", "x")).await;

    mock.assert_async().await;
    assert_eq!(record.failure_kind(), Some(FailureKind::Template));
}

#[tokio::test]
async fn test_null_path_field_is_a_template_failure() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let d = dispatcher(
        HttpMethod::Post,
        &fixture.url("/users/{user_id}/fees/{fee_id}"),
        Arc::new(NoParams),
    );
    let item = Item::new()
        .with("fee_id", "f1")
        .with("user_id", serde_json::Value::Null);
    let record = d.dispatch(&item).await;

    mock.assert_async().await;
    assert_eq!(record.url, fixture.url("/users/{user_id}/fees/{fee_id}"));
    assert_eq!(record.failure_kind(), Some(FailureKind::Template));
    assert!(!record.is_success());
}

#[tokio::test]
async fn test_default_policy_sends_exactly_once() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("GET", "/item/1")
        .with_status(503)
        .expect(1)
        .create_async()
        .await;

    let d = dispatcher(HttpMethod::Get, &fixture.url("/item/{id}"), Arc::new(NoParams));
    let record = d.dispatch(&Item::new().with("id", "1")).await;

    mock.assert_async().await;
    assert_eq!(record.status(), Some(503));
}

#[tokio::test]
async fn test_retry_policy_retries_listed_statuses() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("GET", "/item/1")
        .with_status(503)
        .expect(3)
        .create_async()
        .await;

    let policy = RetryPolicy::none()
        .with_max_retries(2)
        .with_delays(Duration::from_millis(5), Duration::from_millis(20))
        .with_retry_on_status(vec![503]);
    let d = dispatcher(HttpMethod::Get, &fixture.url("/item/{id}"), Arc::new(NoParams))
        .with_retry(policy);
    let record = d.dispatch(&Item::new().with("id", "1")).await;

    mock.assert_async().await;
    assert_eq!(record.status(), Some(503));
}
