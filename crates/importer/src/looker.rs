use indexmap::IndexMap;
use looker_parser::LookerParser;
use models::{Client, ClientId, LookerCreativeData, LookerDataByClient, ProcessedHashes, RecordsByClient};
use std::collections::HashMap;
use tracing::{info, warn};
use utils::{ad_id_from_name, MergeStats};

use crate::error::{ImportError, Result};
use crate::{already_processed, find_client, resolve_target, ImportFile, ImportOutcome, Target};

/// Inputs for [`process_looker_data`]. Nothing here is modified.
#[derive(Debug, Clone, Copy)]
pub struct LookerImport<'a> {
    pub file: &'a ImportFile,
    pub clients: &'a [Client],
    pub existing_looker: &'a LookerDataByClient,
    /// Used to align creative ad names with the spelling already present in
    /// performance rows.
    pub existing_records: &'a RecordsByClient,
    pub processed_hashes: &'a ProcessedHashes,
    pub fallback_client_id: Option<&'a str>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LookerProcessResult {
    pub client_id: ClientId,
    pub client_name: String,
    pub file_hash: String,
    /// Links to write, keyed by their final ad name. Existing analysis
    /// results are carried over.
    pub creatives: Vec<LookerCreativeData>,
    /// Ad names that had no creative link before this file.
    pub new_ad_names: Vec<String>,
    pub new_creatives_count: usize,
    pub updated_count: usize,
    pub stats: MergeStats,
}

/// Parses a Looker creative export and returns, per matched client, the
/// creative links that are new or changed.
pub fn process_looker_data(req: LookerImport<'_>) -> Result<ImportOutcome<LookerProcessResult>> {
    let file_name = req.file.name.as_str();
    let file_hash = req.file.hash();
    let fallback = find_client(req.clients, req.fallback_client_id)?;

    let report = LookerParser::new()
        .parse_bytes(&req.file.bytes)
        .map_err(|e| ImportError::parse(file_name, e))?;

    let mut grouped: IndexMap<ClientId, (&Client, Vec<LookerCreativeData>)> = IndexMap::new();
    let mut unmatched: Vec<String> = Vec::new();

    for row in report.rows {
        if row.account_name.is_none() && report.has_account_column && fallback.is_none() {
            continue;
        }
        match resolve_target(req.clients, row.account_name.as_deref(), fallback, file_name)? {
            Target::Client(client) => grouped
                .entry(client.id.clone())
                .or_insert_with(|| (client, Vec::new()))
                .1
                .push(row.creative),
            Target::Unmatched(name) => {
                if !unmatched.iter().any(|n| utils::normalize_name(n) == utils::normalize_name(&name)) {
                    unmatched.push(name);
                }
            }
        }
    }

    if !req.dry_run {
        let targets = grouped.values().map(|(c, _)| *c);
        let done = already_processed(req.processed_hashes, &file_hash, targets, file_name)?;
        grouped.retain(|client_id, _| !done.contains(client_id));
    }

    if req.dry_run && !unmatched.is_empty() {
        return Ok(ImportOutcome::NewAccounts(unmatched));
    }

    let empty_links = Default::default();
    let empty_records = Vec::new();
    let mut results = Vec::with_capacity(grouped.len());

    for (client_id, (client, rows)) in grouped {
        let existing = req.existing_looker.get(&client_id).unwrap_or(&empty_links);
        let records = req.existing_records.get(&client_id).unwrap_or(&empty_records);

        // ad id -> spelling used by the performance rows (first seen wins)
        let mut canonical: HashMap<String, &str> = HashMap::new();
        for r in records {
            canonical.entry(ad_id_from_name(&r.ad_name)).or_insert(r.ad_name.as_str());
        }
        let existing_by_id: HashMap<&str, &LookerCreativeData> =
            existing.values().map(|c| (c.ad_id.as_str(), c)).collect();

        let mut stats = MergeStats {
            total: rows.len(),
            ..Default::default()
        };
        let mut creatives: Vec<LookerCreativeData> = Vec::new();
        let mut new_ad_names = Vec::new();
        let mut updated_count = 0;

        for mut creative in rows {
            if let Some(name) = canonical.get(&creative.ad_id) {
                creative.ad_name = name.to_string();
            }
            if creatives.iter().any(|c| c.ad_id == creative.ad_id) {
                stats.skipped += 1;
                continue;
            }

            let prior = existing
                .get(&creative.ad_name)
                .or_else(|| existing_by_id.get(creative.ad_id.as_str()).copied());

            match prior {
                None => {
                    new_ad_names.push(creative.ad_name.clone());
                    stats.added += 1;
                    creatives.push(creative);
                }
                Some(prior) => {
                    creative.analysis_result = prior.analysis_result.clone();
                    if same_links(prior, &creative) && prior.ad_name == creative.ad_name {
                        stats.skipped += 1;
                    } else {
                        updated_count += 1;
                        creatives.push(creative);
                    }
                }
            }
        }

        info!(
            file = file_name,
            client_id = %client_id,
            added = stats.added,
            updated = updated_count,
            skipped = stats.skipped,
            "creative links processed"
        );

        results.push(LookerProcessResult {
            client_id,
            client_name: client.name.clone(),
            file_hash: file_hash.clone(),
            new_creatives_count: new_ad_names.len(),
            new_ad_names,
            updated_count,
            creatives,
            stats,
        });
    }

    if !unmatched.is_empty() {
        warn!(file = file_name, accounts = ?unmatched, "creatives of unknown accounts skipped");
    }

    Ok(ImportOutcome::Processed {
        results,
        skipped_accounts: unmatched,
    })
}

fn same_links(a: &LookerCreativeData, b: &LookerCreativeData) -> bool {
    a.image_url == b.image_url
        && a.ad_preview_link == b.ad_preview_link
        && a.creative_description == b.creative_description
}
