//! Azure DevOps client against a mock HTTP server

mod common;

use common::make_record;
use mockito::{Matcher, Server};
use std::time::Duration;
use workitem_batch::config::ApiSettings;
use workitem_batch::remote::{AzureDevOpsClient, RemoteClient};
use workitem_batch::types::{FailureKind, Record};

const AUTH: &str = "Basic ZGV2QGNvbnRvc28uY29tOnBhdA==";
const CREATE_PATH: &str = "/contoso/web/_apis/wit/workitems/$Task";

fn client_for(base_url: &str) -> AzureDevOpsClient {
    let api = ApiSettings {
        base_url: base_url.to_string(),
        ..ApiSettings::default()
    };
    AzureDevOpsClient::new(&api, Duration::from_secs(5)).unwrap()
}

fn record() -> Record {
    make_record("Write docs")
}

#[tokio::test]
async fn test_submit_sends_json_patch_and_returns_id() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", CREATE_PATH)
        .match_query(Matcher::UrlEncoded("api-version".into(), "7.1".into()))
        .match_header("authorization", AUTH)
        .match_header("content-type", "application/json-patch+json")
        .match_body(Matcher::Regex(
            r#"\{"op":"add","path":"/fields/System\.Title","value":"Write docs"\}"#.to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 42, "rev": 1}"#)
        .create_async()
        .await;

    let id = client_for(&server.url()).submit(&record()).await.unwrap();

    assert_eq!(id, "42");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_success_without_id_is_rejected() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", CREATE_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html>sign in</html>")
        .create_async()
        .await;

    let cause = client_for(&server.url())
        .submit(&record())
        .await
        .unwrap_err();

    assert_eq!(cause.kind, FailureKind::Rejected);
    assert_eq!(cause.status, None);
    assert!(!cause.is_retryable());
}

#[tokio::test]
async fn test_status_codes_are_classified() {
    let cases = [
        (429, FailureKind::RateLimited, true),
        (503, FailureKind::Unavailable, true),
        (401, FailureKind::Auth, false),
        (403, FailureKind::Auth, false),
        (400, FailureKind::Rejected, false),
        (500, FailureKind::Rejected, false),
    ];

    for (status, kind, retryable) in cases {
        let mut server = Server::new_async().await;
        server
            .mock("POST", CREATE_PATH)
            .match_query(Matcher::Any)
            .with_status(status)
            .with_body(format!("error {status}"))
            .create_async()
            .await;

        let cause = client_for(&server.url())
            .submit(&record())
            .await
            .unwrap_err();

        assert_eq!(cause.kind, kind, "status {status}");
        assert_eq!(cause.status, Some(u16::try_from(status).unwrap()));
        assert_eq!(cause.is_retryable(), retryable, "status {status}");
        assert_eq!(cause.detail, format!("error {status}"));
    }
}

#[tokio::test]
async fn test_long_error_body_is_truncated() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", CREATE_PATH)
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body("x".repeat(5000))
        .create_async()
        .await;

    let cause = client_for(&server.url())
        .submit(&record())
        .await
        .unwrap_err();

    assert!(cause.detail.chars().count() <= 513);
    assert!(cause.detail.ends_with('…'));
}

#[tokio::test]
async fn test_connection_failure_is_transport() {
    let cause = client_for("http://127.0.0.1:1")
        .submit(&record())
        .await
        .unwrap_err();

    assert_eq!(cause.kind, FailureKind::Transport);
    assert!(cause.is_retryable());
}

#[tokio::test]
async fn test_delete_targets_parent_id() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("DELETE", "/contoso/web/_apis/wit/workitems/100")
        .match_query(Matcher::UrlEncoded("api-version".into(), "7.1".into()))
        .match_header("authorization", AUTH)
        .with_status(200)
        .with_body(r#"{"id": 100}"#)
        .create_async()
        .await;

    client_for(&server.url()).delete(&record()).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_delete_of_missing_item_is_rejected() {
    let mut server = Server::new_async().await;
    server
        .mock("DELETE", "/contoso/web/_apis/wit/workitems/100")
        .match_query(Matcher::Any)
        .with_status(404)
        .create_async()
        .await;

    let cause = client_for(&server.url())
        .delete(&record())
        .await
        .unwrap_err();

    assert_eq!(cause.kind, FailureKind::Rejected);
    assert_eq!(cause.status, Some(404));
}
