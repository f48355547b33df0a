//! Catalog feed: the procedure sheet published as CSV.

use std::time::Duration;

use reqwest::blocking::Client;

use super::parse_catalog_row;
use crate::config::CoreConfig;
use crate::models::Procedure;
use crate::store::{StoreError, StoreResult};

/// Decode the CSV export of the catalog sheet.
///
/// The header row is discarded and rows with a blank procedure name are
/// dropped. A record the CSV reader rejects is skipped with a warning.
pub fn parse_catalog_csv(text: &str) -> Vec<Procedure> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut procedures = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(row = idx + 1, error = %e, "skipping malformed catalog row");
                continue;
            }
        };

        let cells: Vec<&str> = record.iter().collect();
        let procedure = parse_catalog_row(&cells);
        if procedure.name.is_empty() {
            continue;
        }
        procedures.push(procedure);
    }

    tracing::debug!(count = procedures.len(), "decoded catalog feed");
    procedures
}

/// Client for the published catalog sheet.
pub struct CatalogFeed {
    url: String,
    client: Client,
}

impl CatalogFeed {
    /// Create a feed for `url`. A missing or blank URL is a configuration error.
    pub fn new(url: Option<&str>, timeout: Duration) -> StoreResult<Self> {
        let url = url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| StoreError::Configuration("catalog feed URL is not set".into()))?;

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    pub fn from_config(config: &CoreConfig) -> StoreResult<Self> {
        Self::new(config.catalog_url(), config.http_timeout())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Raw CSV text of the sheet.
    pub fn fetch_text(&self) -> StoreResult<String> {
        let response = self.client.get(&self.url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Transport(format!(
                "catalog feed responded with HTTP {}",
                status
            )));
        }
        Ok(response.text()?)
    }

    /// Fetch and decode the catalog.
    pub fn fetch(&self) -> StoreResult<Vec<Procedure>> {
        let text = self.fetch_text()?;
        let procedures = parse_catalog_csv(&text);
        tracing::info!(count = procedures.len(), url = %self.url, "loaded catalog feed");
        Ok(procedures)
    }
}
