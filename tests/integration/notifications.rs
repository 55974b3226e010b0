//! Alert log and mail delivery tests
//!
//! The HTTP mail API is mocked with wiremock, the alert log goes to a
//! temporary directory.

use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use host_monitoring::{
    actors::monitor::HostMonitorHandle,
    alerts::{AlertContext, AlertManager, Notify},
    config::HttpApiConfig,
    error::NotifyError,
    mail::{HttpApiMailer, Mailer},
    monitors::state::{AlertReason, AlertTransition},
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

fn context() -> AlertContext {
    AlertContext {
        target: "127.0.0.1".to_string(),
        max_rtt: Duration::from_millis(100),
        max_retries: 2,
    }
}

fn api_mailer(server: &MockServer) -> Box<dyn Mailer> {
    let config = HttpApiConfig {
        url: format!("{}/v1/send", server.uri()),
        api_key: Some("test-key".to_string()),
        from: "monitor@example.org".to_string(),
        to: vec!["ops@example.org".to_string()],
    };
    Box::new(HttpApiMailer::new(&config, Duration::from_secs(5)).unwrap())
}

fn raised() -> AlertTransition {
    AlertTransition::Raised {
        reason: AlertReason::NoResponse,
        occurred_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
    }
}

fn cleared() -> AlertTransition {
    AlertTransition::Cleared {
        occurred_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 35, 0).unwrap(),
    }
}

#[tokio::test]
async fn test_http_api_receives_rendered_mail() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/send"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "from": "monitor@example.org",
            "to": ["ops@example.org"],
            "subject": "[hostwatch] 127.0.0.1: Host is unresponsive."
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&mock_server)
        .await;

    let manager = AlertManager::new(context(), None, Some(api_mailer(&mock_server)));
    manager.notify(&raised()).await.unwrap();
}

#[tokio::test]
async fn test_log_lines_are_appended() {
    let dir = tempfile::tempdir().unwrap();
    let log_file = dir.path().join("alerts.log");

    let manager = AlertManager::new(context(), Some(log_file.clone()), None);
    manager.notify(&raised()).await.unwrap();
    manager.notify(&cleared()).await.unwrap();

    let content = std::fs::read_to_string(&log_file).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(
        lines,
        vec![
            "2024-05-01T12:30:00Z RAISED 127.0.0.1 no_response Host is unresponsive.",
            "2024-05-01T12:35:00Z CLEARED 127.0.0.1 - Host has recovered.",
        ]
    );
}

#[tokio::test]
async fn test_api_error_is_reported_but_logged() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/send"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let log_file = dir.path().join("alerts.log");

    let manager = AlertManager::new(
        context(),
        Some(log_file.clone()),
        Some(api_mailer(&mock_server)),
    );
    let result = manager.notify(&raised()).await;

    assert_matches!(result, Err(NotifyError::Delivery(_)));
    let content = std::fs::read_to_string(&log_file).unwrap();
    assert_eq!(content.lines().count(), 1);
}

#[tokio::test]
async fn test_unwritable_log_still_delivers_mail() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/send"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    // a directory cannot be opened for appending
    let manager = AlertManager::new(
        context(),
        Some(dir.path().to_path_buf()),
        Some(api_mailer(&mock_server)),
    );

    let result = manager.notify(&raised()).await;
    assert_matches!(result, Err(NotifyError::LogFile(_)));
}

#[tokio::test]
async fn test_monitor_mails_raise_and_clear() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/send"))
        .and(body_partial_json(json!({
            "subject": "[hostwatch] 127.0.0.1: Host is unresponsive."
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/send"))
        .and(body_partial_json(json!({
            "subject": "[hostwatch] 127.0.0.1: Host has recovered."
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let log_file = dir.path().join("alerts.log");
    let config = create_test_monitor_config(1, 100);
    let manager = AlertManager::new(
        AlertContext::from(&config),
        Some(log_file.clone()),
        Some(api_mailer(&mock_server)),
    );

    let probe = ScriptedProbe::new([Step::Lost, Step::Lost, Step::Lost, Step::Reply(3)]);
    let (handle, task) = HostMonitorHandle::spawn(config, probe, manager);

    for _ in 0..4 {
        handle.probe_now().await.unwrap();
    }

    handle.shutdown().await;
    task.await.unwrap();

    let content = std::fs::read_to_string(&log_file).unwrap();
    assert_eq!(content.lines().count(), 2);
}
