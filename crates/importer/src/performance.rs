use indexmap::IndexMap;
use meta_ads_parser::MetaAdsParser;
use models::{Client, ClientId, PerformanceRecord, ProcessedHashes, RecordsByClient};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};
use utils::{filter_new_records, MergeStats};

use crate::error::{ImportError, Result};
use crate::{already_processed, find_client, resolve_target, ImportFile, ImportOutcome, Target};

/// Inputs for [`process_performance_data`]. Nothing here is modified.
#[derive(Debug, Clone, Copy)]
pub struct PerformanceImport<'a> {
    pub file: &'a ImportFile,
    pub clients: &'a [Client],
    pub existing: &'a RecordsByClient,
    pub processed_hashes: &'a ProcessedHashes,
    /// Client receiving every row when the export has no account column.
    pub fallback_client_id: Option<&'a str>,
    pub dry_run: bool,
}

/// The increment one file brings to one client.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessResult {
    pub client_id: ClientId,
    pub client_name: String,
    pub file_hash: String,
    /// Rows not yet present in the client's record set, in file order.
    pub records: Vec<PerformanceRecord>,
    pub new_records_count: usize,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
    pub days_detected: usize,
    pub stats: MergeStats,
}

/// Parses a Meta performance export and returns, per matched client, the
/// rows not already present in `existing`.
///
/// Order of checks: the file hash is compared against every target client
/// before any row is coerced (skipped in dry runs). Clients that already hold
/// it are left out and the file is rejected only when all of them do. Unknown
/// accounts then either short-circuit into [`ImportOutcome::NewAccounts`] (dry run) or have
/// their rows left out and reported in `skipped_accounts`.
pub fn process_performance_data(req: PerformanceImport<'_>) -> Result<ImportOutcome<ProcessResult>> {
    let file_name = req.file.name.as_str();
    let file_hash = req.file.hash();
    let fallback = find_client(req.clients, req.fallback_client_id)?;
    let parser = MetaAdsParser::new();

    let account_names = parser
        .account_names(&req.file.bytes)
        .map_err(|e| ImportError::parse(file_name, e))?;

    let mut targets: Vec<&Client> = Vec::new();
    let mut unmatched: Vec<String> = Vec::new();
    if account_names.is_empty() {
        if let Target::Client(c) = resolve_target(req.clients, None, fallback, file_name)? {
            targets.push(c);
        }
    }
    for name in &account_names {
        match resolve_target(req.clients, Some(name), fallback, file_name)? {
            Target::Client(c) => {
                if !targets.iter().any(|t| t.id == c.id) {
                    targets.push(c);
                }
            }
            Target::Unmatched(n) => unmatched.push(n),
        }
    }

    let done = if req.dry_run {
        BTreeSet::new()
    } else {
        already_processed(req.processed_hashes, &file_hash, targets.iter().copied(), file_name)?
    };
    if !done.is_empty() {
        debug!(file = file_name, clients = ?done, "file already imported for some clients");
    }

    if req.dry_run && !unmatched.is_empty() {
        debug!(file = file_name, accounts = ?unmatched, "unknown accounts in dry run");
        return Ok(ImportOutcome::NewAccounts(unmatched));
    }

    let report = parser
        .parse_bytes(&req.file.bytes)
        .map_err(|e| ImportError::parse(file_name, e))?;

    let mut grouped: IndexMap<ClientId, (&Client, Vec<PerformanceRecord>)> = IndexMap::new();
    for row in report.rows {
        // Blank account cell in an export that has the column (totals rows)
        if row.account_name.is_none() && report.has_account_column && fallback.is_none() {
            continue;
        }
        let client = match resolve_target(req.clients, row.account_name.as_deref(), fallback, file_name)? {
            Target::Client(c) => c,
            Target::Unmatched(_) => continue,
        };
        if done.contains(&client.id) {
            continue;
        }
        let mut record = row.record;
        if record.currency.is_none() && !client.currency.is_empty() {
            record.currency = Some(client.currency.clone());
        }
        grouped
            .entry(client.id.clone())
            .or_insert_with(|| (client, Vec::new()))
            .1
            .push(record);
    }

    let empty: Vec<PerformanceRecord> = Vec::new();
    let mut results = Vec::with_capacity(grouped.len());

    for (client_id, (client, rows)) in grouped {
        let existing = req.existing.get(&client_id).unwrap_or(&empty);
        let (fresh, stats) = filter_new_records(existing, &rows);

        let days: BTreeSet<&str> = fresh.iter().map(|r| r.day.as_str()).collect();
        let period_start = days.first().map(|d| d.to_string());
        let period_end = days.last().map(|d| d.to_string());

        info!(
            file = file_name,
            client_id = %client_id,
            added = stats.added,
            skipped = stats.skipped,
            "performance rows processed"
        );

        results.push(ProcessResult {
            client_id,
            client_name: client.name.clone(),
            file_hash: file_hash.clone(),
            new_records_count: fresh.len(),
            days_detected: days.len(),
            period_start,
            period_end,
            records: fresh,
            stats,
        });
    }

    if !unmatched.is_empty() {
        warn!(file = file_name, accounts = ?unmatched, "rows of unknown accounts skipped");
    }

    Ok(ImportOutcome::Processed {
        results,
        skipped_accounts: unmatched,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{roster, META_CSV};
    use std::collections::BTreeSet;

    fn request<'a>(
        file: &'a ImportFile,
        clients: &'a [Client],
        existing: &'a RecordsByClient,
        hashes: &'a ProcessedHashes,
        dry_run: bool,
    ) -> PerformanceImport<'a> {
        PerformanceImport {
            file,
            clients,
            existing,
            processed_hashes: hashes,
            fallback_client_id: None,
            dry_run,
        }
    }

    #[test]
    fn test_groups_rows_per_client() {
        let file = ImportFile::new("meta.csv", META_CSV);
        let clients = roster();
        let existing = RecordsByClient::new();
        let hashes = ProcessedHashes::new();

        let outcome = process_performance_data(request(&file, &clients, &existing, &hashes, false)).unwrap();
        let ImportOutcome::Processed { results, skipped_accounts } = outcome else {
            panic!("expected processed outcome");
        };

        assert!(skipped_accounts.is_empty());
        assert_eq!(results.len(), 2);

        let acme = &results[0];
        assert_eq!(acme.client_id, "c-acme");
        assert_eq!(acme.new_records_count, 3);
        assert_eq!(acme.days_detected, 2);
        assert_eq!(acme.period_start.as_deref(), Some("2025-07-31"));
        assert_eq!(acme.period_end.as_deref(), Some("2025-08-01"));
        assert_eq!(acme.records[0].currency.as_deref(), Some("EUR"));
        assert_eq!(acme.file_hash, file.hash());

        let beta = &results[1];
        assert_eq!(beta.client_id, "c-beta");
        assert_eq!(beta.new_records_count, 1);
    }

    #[test]
    fn test_reimport_adds_nothing_and_duplicate_is_rejected() {
        let file = ImportFile::new("meta.csv", META_CSV);
        let clients = roster();
        let hashes = ProcessedHashes::new();

        let first = process_performance_data(request(&file, &clients, &RecordsByClient::new(), &hashes, false)).unwrap();
        let mut existing = RecordsByClient::new();
        for r in first.results() {
            existing.insert(r.client_id.clone(), r.records.clone());
        }

        // Same rows, different bytes: nothing new.
        let reordered = ImportFile::new("meta-copy.csv", format!("{}\n", META_CSV));
        let second = process_performance_data(request(&reordered, &clients, &existing, &hashes, false)).unwrap();
        assert!(second.results().iter().all(|r| r.new_records_count == 0));
        assert!(second.results().iter().all(|r| r.period_start.is_none()));
        assert_eq!(second.results()[0].stats.skipped, 3);

        // Same bytes recorded for every client: rejected before parsing.
        let mut recorded = ProcessedHashes::new();
        recorded.insert("c-acme".into(), BTreeSet::from([file.hash()]));
        recorded.insert("c-beta".into(), BTreeSet::from([file.hash()]));
        let err = process_performance_data(request(&file, &clients, &existing, &recorded, false)).unwrap_err();
        match err {
            ImportError::DuplicateFile { file_name, client_name } => {
                assert_eq!(file_name, "meta.csv");
                assert_eq!(client_name, "Acme Tienda");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_reimport_after_adding_account() {
        let file = ImportFile::new("meta.csv", META_CSV);
        let acme_only = vec![roster().remove(0)];
        let first = process_performance_data(request(
            &file,
            &acme_only,
            &RecordsByClient::new(),
            &ProcessedHashes::new(),
            false,
        ))
        .unwrap();
        let mut existing = RecordsByClient::new();
        let mut hashes = ProcessedHashes::new();
        for r in first.results() {
            existing.insert(r.client_id.clone(), r.records.clone());
            hashes.insert(r.client_id.clone(), BTreeSet::from([r.file_hash.clone()]));
        }

        // Beta now exists; Acme already has the file and is left out.
        let clients = roster();
        let second = process_performance_data(request(&file, &clients, &existing, &hashes, false)).unwrap();
        let ImportOutcome::Processed { results, skipped_accounts } = second else {
            panic!("expected processed outcome");
        };
        assert!(skipped_accounts.is_empty());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].client_id, "c-beta");
        assert_eq!(results[0].new_records_count, 1);

        // A dry run still previews every client.
        let dry = process_performance_data(request(&file, &clients, &existing, &hashes, true)).unwrap();
        assert_eq!(dry.results().len(), 2);
    }

    #[test]
    fn test_unknown_accounts() {
        let file = ImportFile::new("meta.csv", META_CSV);
        let clients = vec![roster().remove(0)];
        let existing = RecordsByClient::new();
        let hashes = ProcessedHashes::new();

        let dry = process_performance_data(request(&file, &clients, &existing, &hashes, true)).unwrap();
        assert_eq!(dry, ImportOutcome::NewAccounts(vec!["Beta Shop".to_string()]));

        let real = process_performance_data(request(&file, &clients, &existing, &hashes, false)).unwrap();
        let ImportOutcome::Processed { results, skipped_accounts } = real else {
            panic!("expected processed outcome");
        };
        assert_eq!(skipped_accounts, vec!["Beta Shop"]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].new_records_count, 3);
    }

    #[test]
    fn test_export_without_account_column() {
        let csv = "Día;Nombre del anuncio;Importe gastado\n31/07/2025;Ad Uno;1\n";
        let file = ImportFile::new("plain.csv", csv);
        let clients = roster();
        let existing = RecordsByClient::new();
        let hashes = ProcessedHashes::new();

        let mut req = request(&file, &clients, &existing, &hashes, false);
        assert!(matches!(process_performance_data(req), Err(ImportError::Parse { .. })));

        req.fallback_client_id = Some("c-beta");
        let outcome = process_performance_data(req).unwrap();
        assert_eq!(outcome.results()[0].client_id, "c-beta");

        req.fallback_client_id = Some("nope");
        assert!(matches!(process_performance_data(req), Err(ImportError::UnknownClient(_))));
    }

    #[test]
    fn test_malformed_file_names_the_file() {
        let file = ImportFile::new("broken.xlsx", b"PK\x03\x04garbage".to_vec());
        let clients = roster();
        let err = process_performance_data(request(
            &file,
            &clients,
            &RecordsByClient::new(),
            &ProcessedHashes::new(),
            false,
        ))
        .unwrap_err();
        assert!(err.to_string().contains("broken.xlsx"));
    }
}
