use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use super::RemoteSource;
use crate::error::SourceError;

pub struct HttpTicketSource {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpTicketSource {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
            client,
        })
    }

    async fn get_json(&self, path: &str) -> Result<Value, SourceError> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "GET");

        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl RemoteSource for HttpTicketSource {
    fn name(&self) -> &str {
        "ticket service"
    }

    async fn fetch_tickets(&self) -> Result<Value, SourceError> {
        self.get_json("/tickets").await
    }

    async fn fetch_ticket_by_id(&self, id: &str) -> Result<Value, SourceError> {
        let path = format!("/tickets/{}", urlencoding::encode(id));
        match self.get_json(&path).await {
            Err(SourceError::Status(code)) if code == StatusCode::NOT_FOUND.as_u16() => {
                Err(SourceError::NotFound(id.to_string()))
            }
            other => other,
        }
    }
}
