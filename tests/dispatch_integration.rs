//! Dispatcher integration tests: redirect policy, timeout resolution and
//! proxy failure classification.

use std::time::Duration;

use husky::{HttpError, Proxy, RequestOption, Session};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Opt-in dispatch tracing via `RUST_LOG` while debugging these tests.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Mounts `/chain/N` → `/chain/N-1` … `/chain/0`, which serves the body.
async fn mount_redirect_chain(server: &MockServer, length: u32) {
    for hop in 1..=length {
        Mock::given(method("GET"))
            .and(path(format!("/chain/{hop}")))
            .respond_with(
                ResponseTemplate::new(302).insert_header("Location", format!("/chain/{}", hop - 1)),
            )
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/chain/0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("landed"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_redirect_chain_within_limit_succeeds() {
    init_tracing();
    let server = MockServer::start().await;
    mount_redirect_chain(&server, 2).await;

    let session = Session::new();
    let resp = session
        .get(
            &format!("{}/chain/2", server.uri()),
            [RequestOption::RedirectNum(2)],
        )
        .await
        .unwrap();
    assert_eq!(resp.text(), "landed");
    assert!(resp.url().ends_with("/chain/0"));
}

#[tokio::test]
async fn test_redirect_chain_beyond_limit_fails() {
    let server = MockServer::start().await;
    mount_redirect_chain(&server, 2).await;

    let session = Session::new();
    let result = session
        .get(
            &format!("{}/chain/2", server.uri()),
            [RequestOption::RedirectNum(1)],
        )
        .await;

    match result {
        Err(HttpError::Redirect { limit }) => assert_eq!(limit, 1),
        other => panic!("expected redirect error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_default_redirect_limit_is_five() {
    let server = MockServer::start().await;
    mount_redirect_chain(&server, 6).await;

    let session = Session::new();
    let result = session.get(&format!("{}/chain/6", server.uri()), []).await;
    match result {
        Err(HttpError::Redirect { limit }) => assert_eq!(limit, 5),
        other => panic!("expected redirect error, got: {other:?}"),
    }

    // Five hops exactly is still within the default.
    let resp = session
        .get(&format!("{}/chain/5", server.uri()), [])
        .await
        .unwrap();
    assert_eq!(resp.text(), "landed");
}

#[tokio::test]
async fn test_session_redirect_default_applies_when_request_unset() {
    let server = MockServer::start().await;
    mount_redirect_chain(&server, 6).await;

    let mut session = Session::new();
    session.redirect_num = 10;
    let resp = session
        .get(&format!("{}/chain/6", server.uri()), [])
        .await
        .unwrap();
    assert_eq!(resp.text(), "landed");
}

#[tokio::test]
async fn test_banned_redirects_return_origin_content() {
    let server = MockServer::start().await;
    mount_redirect_chain(&server, 1).await;

    let session = Session::new();
    // No redirect needed at the origin path: content comes back untouched.
    let resp = session
        .get(
            &format!("{}/chain/0", server.uri()),
            [RequestOption::RedirectNum(-1)],
        )
        .await
        .unwrap();
    assert_eq!(resp.text(), "landed");
}

#[tokio::test]
async fn test_banned_redirects_return_redirect_reply_as_is() {
    let server = MockServer::start().await;
    mount_redirect_chain(&server, 1).await;

    let session = Session::new();
    let resp = session
        .get(
            &format!("{}/chain/1", server.uri()),
            [RequestOption::RedirectNum(-1)],
        )
        .await
        .unwrap();
    assert_eq!(resp.status_code(), 302);
    assert_eq!(resp.headers().get("Location").unwrap(), "/chain/0");
}

#[tokio::test]
async fn test_post_redirect_downgrades_to_get() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/submit"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/done"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/done"))
        .respond_with(ResponseTemplate::new(200).set_body_string("passed"))
        .expect(1)
        .mount(&server)
        .await;

    let session = Session::new();
    let resp = session
        .post(
            &format!("{}/submit", server.uri()),
            [RequestOption::body("key=value")],
        )
        .await
        .unwrap();
    assert_eq!(resp.text(), "passed");
}

#[tokio::test]
async fn test_cookies_set_mid_chain_reach_the_final_hop() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "/home")
                .insert_header("Set-Cookie", "sid=hop; Path=/"),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/home"))
        .and(wiremock::matchers::header("Cookie", "sid=hop"))
        .respond_with(ResponseTemplate::new(200).set_body_string("passed"))
        .expect(1)
        .mount(&server)
        .await;

    let session = Session::new();
    let resp = session
        .get(&format!("{}/login", server.uri()), [])
        .await
        .unwrap();
    assert_eq!(resp.text(), "passed");
}

#[tokio::test]
async fn test_request_timeout_overrides_and_classifies() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("timeout")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let session = Session::new();
    let url = format!("{}/slow", server.uri());

    let result = session.get(&url, [RequestOption::Timeout(1)]).await;
    match result {
        Err(error) => assert!(error.is_timeout(), "got: {error:?}"),
        Ok(_) => panic!("expected a timeout"),
    }

    let resp = session.get(&url, [RequestOption::Timeout(3)]).await.unwrap();
    assert_eq!(resp.text(), "timeout");
}

#[tokio::test]
async fn test_session_timeout_applies_when_request_unset() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("done")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let mut session = Session::new();
    session.timeout = 1;
    let result = session.get(&format!("{}/slow", server.uri()), []).await;
    assert!(matches!(result, Err(HttpError::Timeout { .. })));

    // A negative request timeout means unlimited and beats the session value.
    let resp = session
        .get(
            &format!("{}/slow", server.uri()),
            [RequestOption::Timeout(-1)],
        )
        .await
        .unwrap();
    assert_eq!(resp.text(), "done");
}

#[tokio::test]
async fn test_deadline_spans_the_whole_redirect_chain() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/chain/2"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "/chain/1")
                .set_delay(Duration::from_millis(700)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chain/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("landed")
                .set_delay(Duration::from_millis(700)),
        )
        .mount(&server)
        .await;

    let session = Session::new();
    // Each hop is under a second, but the chain as a whole is not.
    let result = session
        .get(
            &format!("{}/chain/2", server.uri()),
            [RequestOption::Timeout(1)],
        )
        .await;
    assert!(matches!(result, Err(HttpError::Timeout { .. })));
}

#[tokio::test]
async fn test_malformed_proxy_fails_before_io() {
    let session = Session::new();
    let result = session
        .get(
            "http://127.0.0.1:1/never-reached",
            [Proxy::new("http://[::invalid", "").into()],
        )
        .await;
    assert!(matches!(result, Err(HttpError::ProxyUrl { .. })));
}

#[tokio::test]
async fn test_session_proxy_used_when_request_has_none() {
    let mut session = Session::new();
    session.proxy = Some(Proxy::new("http://[::invalid", ""));
    let result = session.get("http://127.0.0.1:1/never-reached", []).await;
    assert!(matches!(result, Err(HttpError::ProxyUrl { .. })));
}

#[tokio::test]
async fn test_unroutable_host_is_a_transport_error() {
    let session = Session::new();
    let result = session.get("http://127.0.0.1:1/refused", []).await;
    match result {
        Err(HttpError::Transport { url, .. }) => assert!(url.contains("127.0.0.1")),
        other => panic!("expected transport error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_request_url_is_rejected_before_io() {
    let session = Session::new();
    let result = session.get("not a url", []).await;
    assert!(matches!(result, Err(HttpError::InvalidUrl { .. })));
}
