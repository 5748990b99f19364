//! HTTP behaviour of the quote client against a mock server.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;
use todo_sync_quote::{
    QuoteAction, QuoteClient, QuoteConfig, QuoteEnvironment, QuoteError, QuoteFeature,
    QuoteReducer, QuoteState,
};
use todo_sync_runtime::Store;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn server_with(response: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quotes/random"))
        .respond_with(response)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn fetches_random_quote() {
    let server = server_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "id": 42,
        "quote": "Talk is cheap. Show me the code.",
        "author": "Linus Torvalds"
    })))
    .await;

    let quote = QuoteClient::new(server.uri()).random_quote().await.unwrap();

    assert_eq!(quote.id, Some(42));
    assert_eq!(quote.author, "Linus Torvalds");
}

#[tokio::test]
async fn non_success_status_is_api_error() {
    let server = server_with(ResponseTemplate::new(503).set_body_string("maintenance")).await;

    let err = QuoteClient::new(server.uri()).random_quote().await.unwrap_err();

    assert_eq!(
        err,
        QuoteError::Api {
            status: 503,
            message: "maintenance".to_string()
        }
    );
}

#[tokio::test]
async fn malformed_body_is_parse_error() {
    let server = server_with(ResponseTemplate::new(200).set_body_string("not json")).await;

    let err = QuoteClient::new(server.uri()).random_quote().await.unwrap_err();

    assert!(matches!(err, QuoteError::ResponseParseFailed(_)));
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = server_with(
        ResponseTemplate::new(200)
            .set_body_json(serde_json::json!({ "quote": "late", "author": "nobody" }))
            .set_delay(Duration::from_millis(500)),
    )
    .await;

    let config = QuoteConfig::new(server.uri()).with_timeout(Duration::from_millis(50));
    let err = QuoteClient::from_config(&config)
        .unwrap()
        .random_quote()
        .await
        .unwrap_err();

    assert!(matches!(err, QuoteError::RequestFailed(_)));
}

#[tokio::test]
async fn store_moves_from_loading_to_success_then_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quotes/random"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": 1,
            "quote": "First",
            "author": "A"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/quotes/random"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let env = QuoteEnvironment::new(Arc::new(QuoteClient::new(server.uri())));
    let store = Store::new(QuoteFeature::default(), QuoteReducer::new(), env);

    let mut handle = store.send(QuoteAction::Fetch).await.unwrap();
    handle.wait().await;
    let view = store.state(|s| s.view.clone()).await;
    assert_eq!(view.quote().map(|q| q.quote.as_str()), Some("First"));

    let mut handle = store.send(QuoteAction::Fetch).await.unwrap();
    handle.wait().await;
    let view = store.state(|s| s.view.clone()).await;
    assert!(matches!(view, QuoteState::Error(ref message) if message.contains("500")));
}
