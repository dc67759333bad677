//! Fetch session behavior against a live HTTP server

use crate::common::create_test_config;
use jeolloga_sync::crawler::{Fetcher, HttpSessionFactory, SessionFactory};
use jeolloga_sync::FetchError;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_fetch_returns_body_and_sends_user_agent() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), temp_dir.path());

    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header(
            "user-agent",
            config.user_agent.header_value().as_str(),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let factory = HttpSessionFactory::new(config.user_agent.clone(), Duration::from_secs(5));
    let mut session = factory.open().unwrap();
    let page = session
        .fetch(&format!("{}/page", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(page.status, 200);
    assert_eq!(page.body, "<html>ok</html>");
}

#[tokio::test]
async fn test_non_success_status_is_http_error() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), temp_dir.path());

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let factory = HttpSessionFactory::new(config.user_agent, Duration::from_secs(5));
    let mut session = factory.open().unwrap();
    let result = session.fetch(&format!("{}/gone", mock_server.uri())).await;

    assert!(matches!(
        result,
        Err(FetchError::HttpStatus { code: 404, .. })
    ));
}

#[tokio::test]
async fn test_slow_response_is_timeout() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), temp_dir.path());

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let factory = HttpSessionFactory::new(config.user_agent, Duration::from_millis(300));
    let mut session = factory.open().unwrap();
    let result = session.fetch(&format!("{}/slow", mock_server.uri())).await;

    assert!(matches!(result, Err(FetchError::Timeout { .. })));
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config("http://127.0.0.1:9", temp_dir.path());

    let factory = HttpSessionFactory::new(config.user_agent, Duration::from_secs(2));
    let mut session = factory.open().unwrap();
    let result = session.fetch("http://127.0.0.1:9/").await;

    assert!(matches!(result, Err(FetchError::Network { .. })));
}
