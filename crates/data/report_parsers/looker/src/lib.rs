use anyhow::{anyhow, Context, Result};
use general_parser::read_table;
use models::LookerCreativeData;
use std::fs;
use tracing::debug;
use utils::{ad_id_from_name, field};

#[derive(Debug, Clone, PartialEq)]
pub struct LookerRow {
    pub account_name: Option<String>,
    pub creative: LookerCreativeData,
}

#[derive(Debug, Clone, Default)]
pub struct LookerReport {
    pub rows: Vec<LookerRow>,
    pub has_account_column: bool,
}

/// Reads Looker Studio creative exports: one row per ad name with links
/// to the creative image and preview.
#[derive(Default)]
pub struct LookerParser;

impl LookerParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_file(&self, path: &str) -> Result<LookerReport> {
        let bytes = fs::read(path).with_context(|| format!("Cannot read {}", path))?;
        self.parse_bytes(&bytes)
            .with_context(|| format!("Failed parsing {}", path))
    }

    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<LookerReport> {
        let table = read_table(bytes, &[field::AD_NAME])?;

        if !table.has(field::AD_NAME) {
            return Err(anyhow!("Missing column: ad name"));
        }
        let creative_columns = [field::IMAGE_URL, field::AD_PREVIEW_LINK, field::CREATIVE_DESCRIPTION];
        if !creative_columns.iter().any(|k| table.has(k)) {
            return Err(anyhow!("No creative columns (image URL, preview link or description)"));
        }

        let mut report = LookerReport {
            has_account_column: table.has(field::ACCOUNT_NAME),
            ..Default::default()
        };

        for row in &table.rows {
            let Some(ad_name) = table.text(row, field::AD_NAME) else {
                continue;
            };

            report.rows.push(LookerRow {
                account_name: table.text(row, field::ACCOUNT_NAME),
                creative: LookerCreativeData {
                    ad_id: ad_id_from_name(&ad_name),
                    ad_name,
                    image_url: table.text(row, field::IMAGE_URL),
                    ad_preview_link: table.text(row, field::AD_PREVIEW_LINK),
                    creative_description: table.text(row, field::CREATIVE_DESCRIPTION),
                    analysis_result: None,
                },
            });
        }

        debug!(rows = report.rows.len(), "looker export parsed");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_looker_export() {
        let csv = "Account name,Ad name,Image URL,Ad preview shareable link\n\
                   Acme,Ad Uno,https://cdn/x.png,https://fb.me/p1\n\
                   Acme,,https://cdn/y.png,\n\
                   Acme,Ad Dos,,https://fb.me/p2\n";
        let report = LookerParser::new().parse_bytes(csv.as_bytes()).unwrap();

        assert!(report.has_account_column);
        assert_eq!(report.rows.len(), 2);

        let first = &report.rows[0].creative;
        assert_eq!(first.ad_name, "Ad Uno");
        assert_eq!(first.ad_id, ad_id_from_name("ad uno"));
        assert!(first.has_image());
        assert_eq!(first.ad_preview_link.as_deref(), Some("https://fb.me/p1"));

        let second = &report.rows[1].creative;
        assert!(!second.has_image());
        assert!(second.analysis_result.is_none());
    }

    #[test]
    fn test_requires_creative_columns() {
        let csv = "Ad name;Spend\nAd Uno;1\n";
        assert!(LookerParser::new().parse_bytes(csv.as_bytes()).is_err());
    }
}
