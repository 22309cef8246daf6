//! End-to-end tests for the scan orchestrator

mod common;

use common::{
    expired_certificate, expiring_certificate, healthy_certificate, scanner_with_tls, test_config,
    SECURE_HEADERS,
};
use std::time::Duration;
use vulnvision::core::models::HeaderStatus;
use vulnvision::{FetchFailure, JsonRenderer, RiskLevel, ScanConfig, ScanError, TextRenderer};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn page(headers: &[(&str, &str)]) -> ResponseTemplate {
    headers.iter().fold(
        ResponseTemplate::new(200).set_body_raw("<html><body><h1>Home</h1></body></html>", "text/html"),
        |template, (name, value)| template.insert_header(*name, *value),
    )
}

async fn serve_home(server: &MockServer, headers: &[(&str, &str)]) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page(headers))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_clean_target_is_low_with_canned_reason() {
    let mock_server = MockServer::start().await;
    serve_home(&mock_server, SECURE_HEADERS).await;

    let scanner = scanner_with_tls(test_config(), Some(healthy_certificate()));
    let result = scanner.scan(&mock_server.uri()).await.expect("Scan failed");

    assert_eq!(result.risk.level, RiskLevel::Low);
    assert_eq!(result.risk.reasons, vec!["No significant issues detected".to_string()]);
    assert_eq!(result.status_code, 200);
    assert!(result.security_headers.iter().all(|h| h.is_secure()));
    assert!(result.exposures.is_empty());
    assert!(result.tls.is_some());
    assert_eq!(
        result.response_headers.get("content-type").map(String::as_str),
        Some("text/html")
    );
    assert!(result.response_headers.contains_key("strict-transport-security"));
}

#[tokio::test]
async fn test_missing_csp_and_expiring_certificate_is_medium() {
    let mock_server = MockServer::start().await;
    let without_csp: Vec<(&str, &str)> = SECURE_HEADERS
        .iter()
        .copied()
        .filter(|(name, _)| *name != "Content-Security-Policy")
        .collect();
    serve_home(&mock_server, &without_csp).await;

    let scanner = scanner_with_tls(test_config(), Some(expiring_certificate()));
    let result = scanner.scan(&mock_server.uri()).await.expect("Scan failed");

    assert_eq!(result.risk.level, RiskLevel::Medium);
    assert_eq!(
        result.risk.reasons,
        vec![
            "Missing security header: Content-Security-Policy".to_string(),
            "Certificate expires within 60 days".to_string(),
        ]
    );
    let csp = result
        .security_headers
        .iter()
        .find(|h| h.header == "Content-Security-Policy")
        .unwrap();
    assert_eq!(csp.status, HeaderStatus::Missing);
}

#[tokio::test]
async fn test_expired_certificate_is_high() {
    let mock_server = MockServer::start().await;
    serve_home(&mock_server, SECURE_HEADERS).await;

    let scanner = scanner_with_tls(test_config(), Some(expired_certificate()));
    let result = scanner.scan(&mock_server.uri()).await.unwrap();

    assert_eq!(result.risk.level, RiskLevel::High);
    assert_eq!(result.risk.reasons, vec!["Certificate has expired".to_string()]);
}

#[tokio::test]
async fn test_high_exposure_is_high_even_without_tls() {
    let mock_server = MockServer::start().await;
    serve_home(&mock_server, SECURE_HEADERS).await;
    Mock::given(method("GET"))
        .and(path("/.git/config"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[core]\n\tbare = false\n"))
        .mount(&mock_server)
        .await;

    let scanner = scanner_with_tls(test_config(), None);
    let result = scanner.scan(&mock_server.uri()).await.unwrap();

    assert!(result.tls.is_none());
    assert_eq!(result.risk.level, RiskLevel::High);
    assert_eq!(
        result.risk.reasons,
        vec!["Exposure: Git repository config exposed (/.git/config)".to_string()]
    );
}

#[tokio::test]
async fn test_reachable_host_with_slow_odd_paths_still_scans() {
    let mock_server = MockServer::start().await;
    serve_home(&mock_server, SECURE_HEADERS).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/.+"))
        .respond_with(ResponseTemplate::new(404).set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let config = ScanConfig { exposure_timeout_seconds: 1, ..test_config() };
    let scanner = scanner_with_tls(config, Some(healthy_certificate()));
    let result = scanner.scan(&mock_server.uri()).await.expect("reachable host must scan");

    assert_eq!(result.status_code, 200);
    assert!(result.exposures.is_empty());
    assert_eq!(result.risk.level, RiskLevel::Low);
}

#[tokio::test]
async fn test_repeat_scan_is_served_from_cache() {
    let mock_server = MockServer::start().await;
    serve_home(&mock_server, SECURE_HEADERS).await;

    let scanner = scanner_with_tls(test_config(), Some(healthy_certificate()));
    let first = scanner.scan(&mock_server.uri()).await.unwrap();
    let requests_after_first = mock_server.received_requests().await.unwrap().len();

    // Different spelling, same normalized target.
    let second = scanner
        .scan(&format!("  {}/  ", mock_server.uri().to_uppercase()))
        .await
        .unwrap();
    let requests_after_second = mock_server.received_requests().await.unwrap().len();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert_eq!(requests_after_first, requests_after_second, "cache hit must not touch the network");
    assert_eq!(scanner.cache().len(), 1);
}

#[tokio::test]
async fn test_rate_limit_applies_to_cache_misses_only() {
    let mock_server = MockServer::start().await;
    let config = ScanConfig { rate_limit_per_minute: 2, ..test_config() };
    let scanner = scanner_with_tls(config, None);
    let uri = mock_server.uri();

    scanner.scan(&format!("{uri}/a")).await.expect("first scan admitted");
    scanner.scan(&format!("{uri}/a")).await.expect("cache hit is not counted");
    scanner.scan(&format!("{uri}/b")).await.expect("second scan admitted");

    let err = scanner.scan(&format!("{uri}/c")).await.unwrap_err();
    assert!(matches!(err, ScanError::RateLimited { retry_after_secs } if retry_after_secs > 0));
    assert_eq!(err.code(), "rate_limited");

    // Cached targets stay available while the limiter is saturated.
    assert!(scanner.scan(&format!("{uri}/b")).await.is_ok());
}

#[tokio::test]
async fn test_unresolvable_host_is_fetch_error_and_not_cached() {
    let scanner = scanner_with_tls(test_config(), None);
    let err = scanner.scan("http://nonexistent.invalid").await.unwrap_err();

    assert_eq!(err.code(), "fetch_error");
    assert_eq!(err.fetch_reason(), Some(FetchFailure::Dns));
    assert_eq!(err.to_body().code, "fetch_error");
    assert!(scanner.cache().is_empty());
}

#[tokio::test]
async fn test_invalid_target_is_validation_error() {
    let scanner = scanner_with_tls(test_config(), None);
    for raw in ["", "ftp://example.com", "https://"] {
        let err = scanner.scan(raw).await.unwrap_err();
        assert_eq!(err.code(), "validation_error", "input {raw:?}");
        assert!(err.is_user_error());
    }
}

#[tokio::test]
async fn test_deadline_exceeded_is_scan_timeout() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page(SECURE_HEADERS).set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let config = ScanConfig { scan_deadline_seconds: 1, ..test_config() };
    let scanner = scanner_with_tls(config, None);
    let err = scanner.scan(&mock_server.uri()).await.unwrap_err();

    assert!(matches!(err, ScanError::Timeout { seconds: 1 }), "unexpected error: {err:?}");
    assert_eq!(err.code(), "scan_timeout");
    assert!(scanner.cache().is_empty());
}

#[tokio::test]
async fn test_report_renders_the_scanned_result() {
    let mock_server = MockServer::start().await;
    serve_home(&mock_server, &[("Server", "nginx/1.25.3")]).await;

    let scanner = scanner_with_tls(test_config(), Some(healthy_certificate()));
    let json = scanner.report(&mock_server.uri(), &JsonRenderer).await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["risk"]["level"], "Medium");
    assert_eq!(value["techStack"][0]["name"], "Nginx");
    assert_eq!(value["tls"]["daysRemaining"], 200);

    // Second report comes from the cache and renders the same data as text.
    let text = scanner.report(&mock_server.uri(), &TextRenderer).await.unwrap();
    assert!(text.contains("Risk:     Medium"));
    assert!(text.contains("Nginx 1.25.3"));
    assert_eq!(scanner.cache().len(), 1);
}
