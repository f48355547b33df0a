//! Spreadsheet-backed DC store reached over HTTP.
//!
//! Protocol:
//! - `GET  <endpoint>?action=list` → `{success, message, data: [row, ...]}`
//! - `POST <endpoint>` `{"action": "append" | "update", "data": row}`
//! - `POST <endpoint>` `{"action": "delete", "id": "..."}`
//!
//! No retries: a failed call surfaces as [`StoreError::Transport`].

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{from_row, to_row, DcStore, StoreError, StoreResult};
use crate::config::CoreConfig;
use crate::models::SavedDc;

/// Response envelope returned by the spreadsheet endpoint.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl Envelope {
    /// The payload of a successful response, or a transport error carrying the message.
    pub fn into_data(self) -> StoreResult<Option<Value>> {
        if self.success {
            Ok(self.data)
        } else {
            Err(StoreError::Transport(self.message))
        }
    }

    /// Whether a failed response reports a missing record.
    pub fn is_not_found(&self) -> bool {
        !self.success && self.message.to_lowercase().contains("not found")
    }
}

/// Remote DC store.
pub struct HttpDcStore {
    endpoint: String,
    client: Client,
}

impl HttpDcStore {
    /// Create a store for `endpoint`. A missing or blank endpoint is a configuration error.
    pub fn new(endpoint: Option<&str>, timeout: Duration) -> StoreResult<Self> {
        let endpoint = endpoint
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| StoreError::Configuration("DC store URL is not set".into()))?;

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
        })
    }

    pub fn from_config(config: &CoreConfig) -> StoreResult<Self> {
        Self::new(config.store_url(), config.http_timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn post(&self, body: &Value) -> StoreResult<Envelope> {
        let response = self.client.post(&self.endpoint).json(body).send()?;
        read_envelope(response)
    }
}

fn read_envelope(response: reqwest::blocking::Response) -> StoreResult<Envelope> {
    let status = response.status();
    if !status.is_success() {
        return Err(StoreError::Transport(format!(
            "DC store responded with HTTP {}",
            status
        )));
    }
    response
        .json::<Envelope>()
        .map_err(|e| StoreError::Transport(format!("Malformed DC store response: {}", e)))
}

/// Decode the `data` array of a list response, skipping rows that don't decode.
pub fn decode_rows(data: Option<Value>) -> Vec<SavedDc> {
    let rows = match data {
        Some(Value::Array(rows)) => rows,
        Some(Value::Null) | None => return Vec::new(),
        Some(other) => {
            tracing::warn!(value = %other, "DC list payload is not an array");
            return Vec::new();
        }
    };

    rows.iter()
        .enumerate()
        .filter_map(|(idx, row)| match from_row(row) {
            Ok(dc) => Some(dc),
            Err(e) => {
                tracing::warn!(row = idx, error = %e, "skipping undecodable DC row");
                None
            }
        })
        .collect()
}

impl DcStore for HttpDcStore {
    fn list_all(&self) -> StoreResult<Vec<SavedDc>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("action", "list")])
            .send()?;
        let data = read_envelope(response)?.into_data()?;
        let dcs = decode_rows(data);
        tracing::debug!(count = dcs.len(), "listed DCs from remote store");
        Ok(dcs)
    }

    fn append(&self, dc: &SavedDc) -> StoreResult<()> {
        let body = json!({ "action": "append", "data": to_row(dc)? });
        self.post(&body)?.into_data()?;
        Ok(())
    }

    fn update(&self, dc: &SavedDc) -> StoreResult<bool> {
        let body = json!({ "action": "update", "data": to_row(dc)? });
        let envelope = self.post(&body)?;
        if envelope.is_not_found() {
            return Ok(false);
        }
        envelope.into_data()?;
        Ok(true)
    }

    fn delete(&self, id: &str) -> StoreResult<bool> {
        let body = json!({ "action": "delete", "id": id });
        let envelope = self.post(&body)?;
        if envelope.is_not_found() {
            return Ok(false);
        }
        envelope.into_data()?;
        Ok(true)
    }
}
