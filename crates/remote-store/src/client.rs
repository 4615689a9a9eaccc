//! HTTP client for the hosted record store.
//!
//! The backend speaks the PostgREST dialect: one REST resource per table
//! under `/rest/v1/`, filters as query parameters, upserts as `POST` with a
//! `Prefer: resolution=merge-duplicates` header keyed on the row id. The
//! same client serves all four entity tables through the generic
//! [`RemoteRecordStore`] implementation.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;

use stockroom_core::errors::Result as CoreResult;
use stockroom_core::sync::{RemoteRecordStore, SyncRecord};

use crate::error::{RemoteStoreError, Result};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

/// PostgREST error payload.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Client for the hosted record store API.
///
/// Holds the project base URL and the API key; rows travel as plain JSON,
/// so any type implementing [`SyncRecord`] round-trips through it.
#[derive(Debug, Clone)]
pub struct RemoteStoreClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RemoteStoreClient {
    /// Create a new remote store client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the backend project (e.g., "https://xyz.supabase.co")
    /// * `api_key` - The project API key sent with every request
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Create headers for an API request.
    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let key_value = HeaderValue::from_str(&self.api_key)
            .map_err(|_| RemoteStoreError::auth("Invalid API key format"))?;
        headers.insert("apikey", key_value);

        let auth_value = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| RemoteStoreError::auth("Invalid API key format"))?;
        headers.insert(AUTHORIZATION, auth_value);

        Ok(headers)
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    fn api_error_from_body(status: reqwest::StatusCode, body: String) -> RemoteStoreError {
        if let Ok(error) = serde_json::from_str::<ApiErrorBody>(&body) {
            RemoteStoreError::api(
                status.as_u16(),
                format!("{}: {}", error.code, error.message),
            )
        } else {
            RemoteStoreError::api(status.as_u16(), format!("Request failed: {}", body))
        }
    }

    /// Parse a JSON response body.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            return Err(Self::api_error_from_body(status, body));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::error!(
                "Failed to deserialize response. Body: {}, Error: {}",
                body,
                e
            );
            RemoteStoreError::api(status.as_u16(), format!("Failed to parse response: {}", e))
        })
    }

    /// Check a response where no body is expected back.
    async fn check_response(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await?;
        Self::log_response(status, &body);
        Err(Self::api_error_from_body(status, body))
    }

    /// Upsert one row, keyed on its id. Replays merge into the existing row.
    ///
    /// POST /rest/v1/{table}?on_conflict=id
    async fn upsert_row<T: SyncRecord>(&self, record: &T) -> Result<()> {
        let table = T::KIND.remote_table();
        let url = format!("{}?on_conflict=id", self.table_url(table));
        debug!("[RemoteStore] upsert {} id={}", table, record.id());

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(std::slice::from_ref(record))
            .send()
            .await?;

        Self::check_response(response).await
    }

    /// Rows changed strictly after `since`, oldest first.
    ///
    /// GET /rest/v1/{table}?select=*&{ts}=gt.{since}&order={ts}.asc
    async fn select_rows_since<T: SyncRecord>(&self, since: DateTime<Utc>) -> Result<Vec<T>> {
        let table = T::KIND.remote_table();
        let ts_field = T::KIND.timestamp_field();
        let cutoff = since.to_rfc3339_opts(SecondsFormat::Micros, true);
        debug!("[RemoteStore] select {} where {} > {}", table, ts_field, cutoff);

        let filter = format!("gt.{}", cutoff);
        let order = format!("{}.asc", ts_field);
        let response = self
            .client
            .get(self.table_url(table))
            .headers(self.headers()?)
            .query(&[
                ("select", "*"),
                (ts_field, filter.as_str()),
                ("order", order.as_str()),
            ])
            .send()
            .await?;

        Self::parse_response(response).await
    }
}

#[async_trait]
impl<T: SyncRecord> RemoteRecordStore<T> for RemoteStoreClient {
    async fn upsert(&self, record: &T) -> CoreResult<()> {
        Ok(self.upsert_row(record).await?)
    }

    async fn select_since(&self, since: DateTime<Utc>) -> CoreResult<Vec<T>> {
        Ok(self.select_rows_since(since).await?)
    }
}
