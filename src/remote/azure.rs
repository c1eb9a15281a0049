//! Azure DevOps work item service implementation

use crate::config::ApiSettings;
use crate::error::Result;
use crate::remote::payload::build_create_payload;
use crate::remote::{RemoteClient, RemoteResult};
use crate::types::{FailureCause, FailureKind, Record};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const JSON_PATCH: &str = "application/json-patch+json";

/// Azure DevOps service using reqwest
///
/// Holds one HTTP client for the lifetime of a batch.
pub struct AzureDevOpsClient {
    client: Client,
    base_url: String,
    api_version: String,
    work_item_type: String,
}

impl AzureDevOpsClient {
    /// Create a client with the given request timeout
    pub fn new(api: &ApiSettings, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("wib/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            api_version: api.version.clone(),
            work_item_type: api.work_item_type.clone(),
        })
    }

    fn project_url(&self, record: &Record) -> String {
        format!(
            "{}/{}/{}/_apis/wit/workitems",
            self.base_url,
            urlencoding::encode(&record.organization),
            urlencoding::encode(&record.project)
        )
    }

    /// Create endpoint for `record`
    pub fn create_url(&self, record: &Record) -> String {
        format!(
            "{}/${}",
            self.project_url(record),
            urlencoding::encode(&self.work_item_type)
        )
    }

    /// Endpoint of an existing work item
    pub fn item_url(&self, record: &Record, id: &str) -> String {
        format!("{}/{}", self.project_url(record), urlencoding::encode(id))
    }

    /// Browser link to a work item
    pub fn work_item_url(&self, record: &Record, id: &str) -> String {
        format!(
            "{}/{}/{}/_workitems/edit/{id}",
            self.base_url,
            urlencoding::encode(&record.organization),
            urlencoding::encode(&record.project)
        )
    }

    fn authorize(&self, request: RequestBuilder, record: &Record) -> RequestBuilder {
        let token = STANDARD.encode(format!("{}:{}", record.principal, record.credential));
        request
            .header(AUTHORIZATION, format!("Basic {token}"))
            .query(&[("api-version", self.api_version.as_str())])
    }
}

#[async_trait]
impl RemoteClient for AzureDevOpsClient {
    async fn submit(&self, record: &Record) -> RemoteResult<String> {
        let url = self.create_url(record);
        let body = build_create_payload(record, &self.base_url);
        debug!(row = record.row, %url, "Creating work item");

        let request = self
            .authorize(self.client.post(&url), record)
            .header(CONTENT_TYPE, JSON_PATCH)
            .body(body.to_string());
        let response = send(request).await?;
        let text = response
            .text()
            .await
            .map_err(|e| FailureCause::new(FailureKind::Transport, e.to_string()))?;

        extract_id(&text).ok_or_else(|| {
            FailureCause::new(
                FailureKind::Rejected,
                format!("response did not contain a work item id: {text}"),
            )
        })
    }

    async fn delete(&self, record: &Record) -> RemoteResult<()> {
        let url = self.item_url(record, &record.parent);
        debug!(row = record.row, %url, "Deleting work item");

        send(self.authorize(self.client.delete(&url), record)).await?;
        Ok(())
    }
}

/// Send a request and turn anything but a 2xx response into a failure
async fn send(request: RequestBuilder) -> RemoteResult<Response> {
    let response = request.send().await.map_err(transport_failure)?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(FailureCause::from_response(status.as_u16(), body))
}

fn transport_failure(e: reqwest::Error) -> FailureCause {
    let what = if e.is_timeout() {
        "request timed out"
    } else if e.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    FailureCause::new(FailureKind::Transport, format!("{what}: {e}"))
}

fn extract_id(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("id")? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
