//! HTTP status probe tests against a local mock server

use stack_installer::config::ReadinessConfig;
use stack_installer::services::{HttpsStatusProbe, StatusProbe};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn probe_for(server: &MockServer) -> HttpsStatusProbe {
    HttpsStatusProbe::new(&ReadinessConfig::default())
        .unwrap()
        .with_endpoint("http", Some(server.address().port()))
}

#[tokio::test]
async fn test_probe_returns_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let probe = probe_for(&server).await;
    assert_eq!(probe.status("127.0.0.1").await.unwrap(), 200);
}

#[tokio::test]
async fn test_probe_does_not_follow_redirects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("Location", "https://127.0.0.1:1/elsewhere"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let probe = probe_for(&server).await;
    assert_eq!(probe.status("127.0.0.1").await.unwrap(), 301);
}

#[tokio::test]
async fn test_probe_reports_error_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let probe = probe_for(&server).await;
    assert_eq!(probe.status("127.0.0.1").await.unwrap(), 404);
}

#[tokio::test]
async fn test_probe_connection_refused_is_network_error() {
    let probe = HttpsStatusProbe::new(&ReadinessConfig::default())
        .unwrap()
        .with_endpoint("http", Some(1));

    let err = probe.status("127.0.0.1").await.unwrap_err();
    assert!(!err.is_fatal());
}
