use std::time::Duration;

use cep_core::{
    ErrorKind, FetchError,
    http::{RetryPolicy, fetch_with_retry, fetch_with_timeout},
};
use reqwest::Client;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn response_status_is_returned_uninterpreted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/teapot"))
        .respond_with(ResponseTemplate::new(418))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/teapot", server.uri());
    let res = fetch_with_retry(&Client::new(), &url, Duration::from_secs(2), RetryPolicy::default())
        .await
        .expect("a response is not a failure");

    assert_eq!(res.status().as_u16(), 418);
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let url = format!("{}/slow", server.uri());
    let err = fetch_with_timeout(&Client::new(), &url, Duration::from_millis(100))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::Timeout));
    assert!(matches!(err, FetchError::Classified(_)));
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let err = fetch_with_timeout(&Client::new(), "http://127.0.0.1:9/", Duration::from_secs(2))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Transport(_)));
    assert_eq!(err.kind(), None);
    assert_eq!(cep_core::describe(&err), cep_core::error::MSG_CONNECTIVITY);
}

#[tokio::test]
async fn retries_stop_after_policy_is_exhausted() {
    let policy = RetryPolicy::new(2, Duration::from_millis(5));
    let err = fetch_with_retry(
        &Client::new(),
        "http://127.0.0.1:9/",
        Duration::from_secs(2),
        policy,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, FetchError::Transport(_)));
}
