//! HTTP client for the regflow server.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;

/// Log row as returned by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct LogRow {
    pub application_step: String,
    pub user_name: String,
    pub application_status: String,
    pub application_decision: Option<String>,
    pub application_remarks: Option<String>,
    pub start_date: DateTime<Utc>,
    pub accomplished_date: Option<DateTime<Utc>>,
    pub del_index: i64,
    pub del_previous: i64,
    pub del_thread: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransitionResult {
    pub main_db_id: i64,
    pub entries: Vec<LogRow>,
}

/// Body of `POST /application-logs/main-db/{id}/transition`.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionBody {
    pub stage: String,
    pub actor: String,
    pub decision: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub assignees: BTreeMap<String, String>,
}

pub struct RegflowClient {
    client: Client,
    base_url: String,
}

impl RegflowClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        tracing::debug!(%url, "GET");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to reach regflow server at {}", self.base_url))?;
        decode(response).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path);
        tracing::debug!(%url, "POST");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to reach regflow server at {}", self.base_url))?;
        decode(response).await
    }
}

/// Turn a non-2xx response into an error carrying the server's message.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response.json().await.context("Failed to decode server response");
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|body| body.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or(text);
    Err(anyhow!("Server returned {}: {}", status, message))
}
