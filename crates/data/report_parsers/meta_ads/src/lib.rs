use anyhow::{anyhow, Context, Result};
use general_parser::{read_table, Table};
use models::PerformanceRecord;
use std::collections::BTreeSet;
use std::fs;
use tracing::debug;
use utils::{field, make_record_id, to_date_iso, to_number_es, to_seconds, RawValue, RecordKey};

/// One parsed export row with the account it was reported under.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaRow {
    pub account_name: Option<String>,
    pub record: PerformanceRecord,
}

#[derive(Debug, Clone, Default)]
pub struct MetaReport {
    pub rows: Vec<MetaRow>,
    /// Rows dropped because no usable date was found.
    pub skipped_rows: usize,
    pub has_account_column: bool,
}

/// Reads Meta Ads Manager performance exports (Spanish or English headers,
/// CSV or XLSX) into [`PerformanceRecord`]s.
#[derive(Debug, Default)]
pub struct MetaAdsParser;

impl MetaAdsParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_file(&self, path: &str) -> Result<MetaReport> {
        let bytes = fs::read(path).with_context(|| format!("Cannot read {}", path))?;
        self.parse_bytes(&bytes)
            .with_context(|| format!("Failed parsing {}", path))
    }

    /// Only the distinct account names, without coercing metric cells.
    pub fn account_names(&self, bytes: &[u8]) -> Result<Vec<String>> {
        let table = read_table(bytes, &[field::AD_NAME])?;
        let mut seen = BTreeSet::new();
        Ok(table
            .rows
            .iter()
            .filter_map(|row| table.text(row, field::ACCOUNT_NAME))
            .filter(|name| seen.insert(utils::normalize_name(name)))
            .collect())
    }

    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<MetaReport> {
        let table = read_table(bytes, &[field::AD_NAME])?;

        if !table.has(field::AD_NAME) {
            return Err(anyhow!("Missing column: ad name"));
        }
        if !table.has(field::DATE) && !table.has(field::REPORT_START) {
            return Err(anyhow!("Missing column: day or reporting start"));
        }

        let mut report = MetaReport {
            has_account_column: table.has(field::ACCOUNT_NAME),
            ..Default::default()
        };

        for row in &table.rows {
            match self.parse_row(&table, row) {
                Some(parsed) => report.rows.push(parsed),
                None => report.skipped_rows += 1,
            }
        }

        debug!(
            rows = report.rows.len(),
            skipped = report.skipped_rows,
            "meta export parsed"
        );
        Ok(report)
    }

    fn parse_row(&self, table: &Table, row: &[RawValue]) -> Option<MetaRow> {
        let day = to_date_iso(table.cell(row, field::DATE))
            .or_else(|| to_date_iso(table.cell(row, field::REPORT_START)))?;

        let text = |key: &str| table.text(row, key).unwrap_or_default();
        let metric = |key: &str| non_negative(to_number_es(table.cell(row, key)));

        let campaign_name = text(field::CAMPAIGN_NAME);
        let ad_set_name = text(field::ADSET_NAME);
        let ad_name = text(field::AD_NAME);
        let age = text(field::AGE);
        let gender = text(field::GENDER);

        let unique_id = make_record_id(RecordKey {
            day: &day,
            campaign_name: &campaign_name,
            ad_set_name: &ad_set_name,
            ad_name: &ad_name,
            age: &age,
            gender: &gender,
        });

        let account_name = table.text(row, field::ACCOUNT_NAME);
        let currency = table.text(row, field::CURRENCY).map(|c| c.to_uppercase());

        let record = PerformanceRecord {
            unique_id,
            account_name: account_name.clone().unwrap_or_default(),
            campaign_name,
            ad_set_name,
            ad_name,
            day,
            age,
            gender,
            currency,

            ad_delivery: text(field::AD_DELIVERY),
            ad_set_delivery: text(field::ADSET_DELIVERY),
            campaign_delivery: text(field::CAMPAIGN_DELIVERY),

            spend: metric(field::SPEND),
            impressions: metric(field::IMPRESSIONS),
            reach: metric(field::REACH),
            frequency: metric(field::FREQUENCY),
            clicks_all: metric(field::CLICKS_ALL),
            link_clicks: metric(field::LINK_CLICKS),
            purchases: metric(field::PURCHASES),
            purchase_value: metric(field::PURCHASE_VALUE),
            landing_page_views: metric(field::LANDING_PAGE_VIEWS),
            thru_plays: metric(field::THRUPLAYS),
            video_average_play_time: non_negative(to_seconds(
                table.cell(row, field::VIDEO_AVG_PLAY_TIME),
            )),
            adds_to_cart: metric(field::ADDS_TO_CART),
            checkouts_initiated: metric(field::CHECKOUTS_INITIATED),
            post_interactions: metric(field::POST_INTERACTIONS),
            post_reactions: metric(field::POST_REACTIONS),
            post_comments: metric(field::POST_COMMENTS),
            post_shares: metric(field::POST_SHARES),
            page_likes: metric(field::PAGE_LIKES),
            attention: metric(field::ATTENTION),
            interest: metric(field::INTEREST),
            desire: metric(field::DESIRE),

            included_custom_audiences: text(field::INCLUDED_AUDIENCES),
            excluded_custom_audiences: text(field::EXCLUDED_AUDIENCES),
            video_file_name: table.text(row, field::VIDEO_FILE_NAME),
        };

        Some(MetaRow {
            account_name,
            record,
        })
    }
}

/// Unparseable cells count as zero; metrics are never negative.
fn non_negative(v: Option<f64>) -> f64 {
    v.unwrap_or(0.0).max(0.0)
}
