//! Import summaries posted to an external webhook for logging.
//!
//! Delivery is best effort: a failed post becomes a [`ServiceNotice`] for the
//! caller to show, never an import failure.

use chrono::{DateTime, Utc};
use models::{ImportBatch, ImportSource, WebhookSettings};
use reqwest::blocking::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::ServiceNotice;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientImportSummary {
    pub client_id: String,
    pub client_name: String,
    pub records_added: usize,
    pub creatives_added: usize,
}

/// Payload sent after an import has been committed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub file_name: String,
    pub source: ImportSource,
    pub timestamp: DateTime<Utc>,
    pub clients: Vec<ClientImportSummary>,
    pub total_records_added: usize,
    pub skipped_accounts: Vec<String>,
}

impl ImportSummary {
    /// Builds the payload from the history entries written by one commit.
    /// Returns `None` for an empty commit.
    pub fn from_batches(batches: &[ImportBatch], skipped_accounts: &[String]) -> Option<Self> {
        let first = batches.first()?;
        let clients: Vec<ClientImportSummary> = batches
            .iter()
            .map(|b| ClientImportSummary {
                client_id: b.undo_data.client_id.clone(),
                client_name: b.client_name.clone(),
                records_added: b.undo_data.record_keys.len(),
                creatives_added: b.undo_data.creative_ad_names.len(),
            })
            .collect();

        Some(Self {
            file_name: first.file_name.clone(),
            source: first.source,
            timestamp: first.timestamp,
            total_records_added: clients.iter().map(|c| c.records_added).sum(),
            clients,
            skipped_accounts: skipped_accounts.to_vec(),
        })
    }
}

/// Posts [`ImportSummary`] payloads as JSON.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    http: Client,
    url: String,
}

impl WebhookClient {
    pub fn new(url: impl Into<String>) -> Result<Self, WebhookError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    /// `None` when the webhook is absent, disabled or has no URL.
    pub fn from_settings(settings: Option<&WebhookSettings>) -> Option<Result<Self, WebhookError>> {
        let settings = settings.filter(|s| s.enabled && !s.url.trim().is_empty())?;
        Some(Self::new(settings.url.trim()))
    }

    pub fn send(&self, summary: &ImportSummary) -> Result<(), WebhookError> {
        let response = self.http.post(&self.url).json(summary).send()?;
        if !response.status().is_success() {
            return Err(WebhookError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }

    /// Sends `summary`, turning a failure into a notice.
    pub fn notify(&self, summary: &ImportSummary) -> Option<ServiceNotice> {
        match self.send(summary) {
            Ok(()) => {
                info!(url = %self.url, file = %summary.file_name, "import summary delivered");
                None
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "import summary delivery failed");
                Some(ServiceNotice::new("webhook", e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::UndoData;

    fn batch(client: &str, keys: usize) -> ImportBatch {
        ImportBatch {
            id: format!("b-{client}"),
            timestamp: Utc::now(),
            source: ImportSource::Meta,
            file_name: "julio.csv".into(),
            file_hash: "abc".into(),
            client_name: client.to_uppercase(),
            description: String::new(),
            undo_data: UndoData {
                client_id: client.into(),
                record_keys: (0..keys).map(|i| format!("k{i}")).collect(),
                creative_ad_names: vec![],
            },
        }
    }

    #[test]
    fn test_summary_from_batches() {
        let summary =
            ImportSummary::from_batches(&[batch("a", 3), batch("b", 0)], &["Ghost".to_string()])
                .unwrap();
        assert_eq!(summary.file_name, "julio.csv");
        assert_eq!(summary.total_records_added, 3);
        assert_eq!(summary.clients[1].client_name, "B");

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["totalRecordsAdded"], 3);
        assert_eq!(json["skippedAccounts"][0], "Ghost");
        assert_eq!(json["clients"][0]["recordsAdded"], 3);

        assert!(ImportSummary::from_batches(&[], &[]).is_none());
    }

    #[test]
    fn test_from_settings_respects_enabled() {
        assert!(WebhookClient::from_settings(None).is_none());

        let disabled = WebhookSettings {
            url: "http://127.0.0.1:9/hook".into(),
            enabled: false,
        };
        assert!(WebhookClient::from_settings(Some(&disabled)).is_none());

        let enabled = WebhookSettings {
            enabled: true,
            ..disabled
        };
        let client = WebhookClient::from_settings(Some(&enabled)).unwrap().unwrap();
        assert_eq!(client.url, "http://127.0.0.1:9/hook");
    }

    #[test]
    fn test_unreachable_webhook_is_a_notice() {
        // Nothing listens on the discard port locally
        let client = WebhookClient::new("http://127.0.0.1:9/hook").unwrap();
        let summary = ImportSummary::from_batches(&[batch("a", 1)], &[]).unwrap();
        let notice = client.notify(&summary).unwrap();
        assert_eq!(notice.service, "webhook");
        assert!(notice.message.contains("HTTP request failed"));
    }
}
