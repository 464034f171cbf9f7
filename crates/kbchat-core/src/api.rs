use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::state::{ChatReply, HealthStatus};

/// The remote side of the chat widget.
///
/// An `Err` from either method is a transport failure: the request never
/// produced a readable body. Application-level failures come back as `Ok`
/// values and are interpreted by the widget.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn health(&self) -> Result<HealthStatus>;

    async fn chat(&self, message: &str) -> Result<ChatReply>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(Clone)]
pub struct ChatApiClient {
    client: Client,
    base_url: String,
}

impl ChatApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Read a response body as JSON. The HTTP status is deliberately not
    /// checked: the backend reports request errors as JSON bodies with 4xx/5xx.
    async fn read_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::debug!(%status, "backend answered with non-success status");
        }

        let value: Value = serde_json::from_str(&body)
            .with_context(|| format!("Backend returned a non-JSON body (status {})", status))?;

        if value.is_null() {
            return Err(anyhow!("Backend returned an empty JSON body (status {})", status));
        }

        Ok(value)
    }
}

#[async_trait]
impl ChatBackend for ChatApiClient {
    async fn health(&self) -> Result<HealthStatus> {
        let url = format!("{}/api/health", self.base_url);

        let response = self.client.get(&url).send().await?;
        let value = Self::read_json(response).await?;

        Ok(parse_health(&value))
    }

    async fn chat(&self, message: &str) -> Result<ChatReply> {
        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest { message })
            .send()
            .await?;
        let value = Self::read_json(response).await?;

        Ok(parse_chat_reply(&value))
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn parse_health(value: &Value) -> HealthStatus {
    HealthStatus {
        status: string_field(value, "status"),
        database: string_field(value, "database"),
        model: string_field(value, "model"),
    }
}

fn parse_chat_reply(value: &Value) -> ChatReply {
    let sources = value
        .get("sources")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| match item.as_str() {
                    Some(label) => label.to_string(),
                    None => item.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    ChatReply {
        response: string_field(value, "response"),
        sources,
        error: string_field(value, "error"),
    }
}
