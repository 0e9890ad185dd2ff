use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

pub type ClientId = String;

/// Performance rows per client, as stored in the `performance_data` table.
pub type RecordsByClient = BTreeMap<ClientId, Vec<PerformanceRecord>>;

/// Creative links per client, keyed by exact ad name.
pub type LookerDataByClient = BTreeMap<ClientId, BTreeMap<String, LookerCreativeData>>;

/// File content hashes already imported, per client.
pub type ProcessedHashes = BTreeMap<ClientId, BTreeSet<String>>;

// Settings models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_currency")]
    pub default_currency: String,
    #[serde(default)]
    pub log: LogSettings,
    #[serde(default)]
    pub webhook: Option<WebhookSettings>,
    #[serde(default)]
    pub analysis: Option<AnalysisSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            default_currency: default_currency(),
            log: LogSettings::default(),
            webhook: None,
            analysis: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_currency() -> String {
    "EUR".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSettings {
    pub url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSettings {
    pub base_url: String,
    #[serde(default = "default_analysis_model")]
    pub model: String,
}

fn default_true() -> bool {
    true
}

fn default_analysis_model() -> String {
    "llama3.2".to_string()
}

// Stored entities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    pub currency: String,
    pub logo: Option<String>,
    pub meta_account_name: Option<String>,
    pub user_id: String,
}

impl Client {
    /// Name used to match account names found in exports.
    pub fn account_label(&self) -> &str {
        self.meta_account_name
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&self.name)
    }
}

/// One row of ad performance for one ad on one day, optionally split by a
/// demographic segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceRecord {
    pub unique_id: String,
    pub account_name: String,
    pub campaign_name: String,
    pub ad_set_name: String,
    pub ad_name: String,
    pub day: String,
    pub age: String,
    pub gender: String,
    pub currency: Option<String>,

    pub ad_delivery: String,
    pub ad_set_delivery: String,
    pub campaign_delivery: String,

    pub spend: f64,
    pub impressions: f64,
    pub reach: f64,
    pub frequency: f64,
    pub clicks_all: f64,
    pub link_clicks: f64,
    pub purchases: f64,
    pub purchase_value: f64,
    pub landing_page_views: f64,
    pub thru_plays: f64,
    pub video_average_play_time: f64,
    pub adds_to_cart: f64,
    pub checkouts_initiated: f64,
    pub post_interactions: f64,
    pub post_reactions: f64,
    pub post_comments: f64,
    pub post_shares: f64,
    pub page_likes: f64,
    pub attention: f64,
    pub interest: f64,
    pub desire: f64,

    pub included_custom_audiences: String,
    pub excluded_custom_audiences: String,
    pub video_file_name: Option<String>,
}

impl PerformanceRecord {
    /// True when ad, ad set and campaign all report an "active" delivery.
    pub fn is_fully_active(&self) -> bool {
        [&self.ad_delivery, &self.ad_set_delivery, &self.campaign_delivery]
            .iter()
            .all(|s| s.trim().eq_ignore_ascii_case("active"))
    }

    pub fn has_video_file(&self) -> bool {
        self.video_file_name
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportSource {
    Meta,
    Looker,
    Txt,
}

impl ImportSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportSource::Meta => "meta",
            ImportSource::Looker => "looker",
            ImportSource::Txt => "txt",
        }
    }
}

/// Enough information to reverse one import for one client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UndoData {
    pub client_id: ClientId,
    pub record_keys: Vec<String>,
    pub creative_ad_names: Vec<String>,
}

/// Audit-log entry for one file imported into one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBatch {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub source: ImportSource,
    pub file_name: String,
    pub file_hash: String,
    pub client_name: String,
    pub description: String,
    pub undo_data: UndoData,
}

/// Creative asset linked to an ad name by a Looker export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LookerCreativeData {
    pub ad_name: String,
    pub ad_id: String,
    pub image_url: Option<String>,
    pub ad_preview_link: Option<String>,
    pub creative_description: Option<String>,
    pub analysis_result: Option<String>,
}

impl LookerCreativeData {
    pub fn has_image(&self) -> bool {
        self.image_url
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }
}

// Derived views (never persisted)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreativeType {
    Image,
    Video,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedAdPerformance {
    pub ad_id: String,
    pub ad_name: String,
    pub campaign_names: Vec<String>,
    pub ad_set_names: Vec<String>,
    pub creative_type: Option<CreativeType>,
    pub video_file_name: Option<String>,
    pub image_url: Option<String>,
    pub ad_preview_link: Option<String>,
    pub creative_description: Option<String>,
    pub analysis_result: Option<String>,
    pub in_looker: bool,
    pub included_custom_audiences: Vec<String>,
    pub excluded_custom_audiences: Vec<String>,
    pub first_day: Option<String>,
    pub last_day: Option<String>,
    pub record_count: usize,
    pub active_days: usize,

    pub spend: f64,
    pub purchases: f64,
    pub purchase_value: f64,
    pub impressions: f64,
    pub reach: f64,
    pub clicks_all: f64,
    pub link_clicks: f64,
    pub thru_plays: f64,
    pub landing_page_views: f64,
    pub adds_to_cart: f64,
    pub checkouts_initiated: f64,
    pub post_interactions: f64,
    pub post_reactions: f64,
    pub post_comments: f64,
    pub post_shares: f64,
    pub page_likes: f64,
    pub attention: f64,
    pub interest: f64,
    pub desire: f64,

    pub frequency: f64,
    pub video_average_play_time: f64,

    pub roas: f64,
    pub cpa: f64,
    pub cpm: f64,
    pub ctr: f64,
    pub ctr_link: f64,
    #[serde(rename = "ticketPromedio")]
    pub average_order_value: f64,
    pub cpc: f64,
    #[serde(rename = "tasaVisitaLP")]
    pub landing_page_view_rate: f64,
    #[serde(rename = "tasaCompra")]
    pub purchase_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemographicSegment {
    pub gender: String,
    pub age: String,
    pub spend: f64,
    pub purchases: f64,
    pub purchase_value: f64,
    pub link_clicks: f64,
    pub impressions: f64,
    pub roas: f64,
    pub cpa: f64,
    pub ctr_link: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarySource {
    Records,
    Warehouse,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSummary {
    pub client_id: ClientId,
    pub client_name: String,
    pub currency: String,
    #[serde(rename = "gastoTotal")]
    pub total_spend: f64,
    pub roas: f64,
    pub total_ads: usize,
    pub matched_count: usize,
    pub source: SummarySource,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_defaults_missing_fields() {
        let rec: PerformanceRecord = serde_json::from_value(json!({
            "uniqueId": "R-1",
            "adName": "Ad",
            "day": "2025-07-01",
            "spend": 12.5
        }))
        .unwrap();

        assert_eq!(rec.unique_id, "R-1");
        assert_eq!(rec.spend, 12.5);
        assert_eq!(rec.impressions, 0.0);
        assert!(rec.video_file_name.is_none());
    }

    #[test]
    fn test_is_fully_active_is_case_insensitive() {
        let mut rec = PerformanceRecord {
            ad_delivery: "ACTIVE".into(),
            ad_set_delivery: "active".into(),
            campaign_delivery: "Active".into(),
            ..Default::default()
        };
        assert!(rec.is_fully_active());

        rec.campaign_delivery = "inactive".into();
        assert!(!rec.is_fully_active());
    }

    #[test]
    fn test_client_account_label_prefers_meta_name() {
        let mut client = Client {
            id: "c1".into(),
            name: "Acme".into(),
            ..Default::default()
        };
        assert_eq!(client.account_label(), "Acme");

        client.meta_account_name = Some("Acme Store ES".into());
        assert_eq!(client.account_label(), "Acme Store ES");

        client.meta_account_name = Some("  ".into());
        assert_eq!(client.account_label(), "Acme");
    }

    #[test]
    fn test_settings_defaults() {
        let settings: Settings = serde_json::from_value(json!({})).unwrap();
        assert_eq!(settings.data_dir, PathBuf::from("data"));
        assert_eq!(settings.default_currency, "EUR");
        assert_eq!(settings.log.level, "info");
        assert!(settings.webhook.is_none());
    }
}
