use bitacora_parser::BitacoraReport;
use chrono::Utc;
use models::{
    Client, ClientId, ImportBatch, ImportSource, LookerDataByClient, ProcessedHashes, RecordsByClient, UndoData,
};
use std::collections::BTreeSet;
use tracing::info;
use utils::store::{
    TABLE_CLIENTS, TABLE_IMPORT_HISTORY, TABLE_LOOKER_DATA, TABLE_PERFORMANCE_DATA, TABLE_PROCESSED_HASHES,
};
use utils::{merge_records_with_deduplication, remove_records_by_ids, Store, StoreBackend};
use uuid::Uuid;

use crate::error::{ImportError, Result};
use crate::looker::LookerProcessResult;
use crate::performance::ProcessResult;
use crate::{already_processed, ImportFile};

/// Everything the importer keeps, as loaded from the store.
#[derive(Debug, Clone, Default)]
pub struct DataSet {
    pub clients: Vec<Client>,
    pub records: RecordsByClient,
    pub looker: LookerDataByClient,
    pub hashes: ProcessedHashes,
    pub history: Vec<ImportBatch>,
}

pub fn load_dataset<B: StoreBackend>(store: &Store<B>) -> Result<DataSet> {
    Ok(DataSet {
        clients: store.get_or_default(TABLE_CLIENTS)?,
        records: store.get_or_default(TABLE_PERFORMANCE_DATA)?,
        looker: store.get_or_default(TABLE_LOOKER_DATA)?,
        hashes: store.get_or_default(TABLE_PROCESSED_HASHES)?,
        history: store.get_or_default(TABLE_IMPORT_HISTORY)?,
    })
}

fn new_batch(
    source: ImportSource,
    file_name: &str,
    file_hash: &str,
    client_name: &str,
    description: String,
    undo_data: UndoData,
) -> ImportBatch {
    ImportBatch {
        id: Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        source,
        file_name: file_name.to_string(),
        file_hash: file_hash.to_string(),
        client_name: client_name.to_string(),
        description,
        undo_data,
    }
}

/// Ids of clients whose result hash is already recorded. Those results are
/// skipped; the commit fails only when every result is such a repeat.
fn already_committed<'a, I>(
    hashes: &ProcessedHashes,
    file_name: &str,
    results: I,
) -> Result<BTreeSet<ClientId>>
where
    I: IntoIterator<Item = (&'a str, &'a str, &'a str)>,
{
    let mut done = BTreeSet::new();
    let mut first_done = None;
    let mut pending = 0;
    for (client_id, client_name, hash) in results {
        if hashes.get(client_id).is_some_and(|set| set.contains(hash)) {
            first_done.get_or_insert(client_name);
            done.insert(client_id.to_string());
        } else {
            pending += 1;
        }
    }

    match first_done {
        Some(client_name) if pending == 0 => Err(ImportError::DuplicateFile {
            file_name: file_name.to_string(),
            client_name: client_name.to_string(),
        }),
        _ => Ok(done),
    }
}

/// Appends processed rows to each client's record set, records the file
/// hash per client and writes one history entry per client.
pub fn commit_performance_import<B: StoreBackend>(
    store: &Store<B>,
    file_name: &str,
    results: &[ProcessResult],
) -> Result<Vec<ImportBatch>> {
    let mut records: RecordsByClient = store.get_or_default(TABLE_PERFORMANCE_DATA)?;
    let mut hashes: ProcessedHashes = store.get_or_default(TABLE_PROCESSED_HASHES)?;
    let mut history: Vec<ImportBatch> = store.get_or_default(TABLE_IMPORT_HISTORY)?;

    let done = already_committed(
        &hashes,
        file_name,
        results
            .iter()
            .map(|r| (r.client_id.as_str(), r.client_name.as_str(), r.file_hash.as_str())),
    )?;

    let mut batches = Vec::with_capacity(results.len());

    for result in results.iter().filter(|r| !done.contains(&r.client_id)) {
        let existing = records.remove(&result.client_id).unwrap_or_default();
        let before = existing.len();
        let (merged, stats) = merge_records_with_deduplication(existing, &result.records);
        let added_ids: Vec<String> = merged[before..].iter().map(|r| r.unique_id.clone()).collect();
        records.insert(result.client_id.clone(), merged);

        hashes
            .entry(result.client_id.clone())
            .or_default()
            .insert(result.file_hash.clone());

        let description = match (&result.period_start, &result.period_end) {
            (Some(start), Some(end)) => format!(
                "{} new performance rows, {} to {} ({} days)",
                stats.added, start, end, result.days_detected
            ),
            _ => format!("{} new performance rows", stats.added),
        };

        let batch = new_batch(
            ImportSource::Meta,
            file_name,
            &result.file_hash,
            &result.client_name,
            description,
            UndoData {
                client_id: result.client_id.clone(),
                record_keys: added_ids,
                creative_ad_names: Vec::new(),
            },
        );
        info!(
            file = file_name,
            client_id = %result.client_id,
            added = stats.added,
            skipped = stats.skipped,
            batch = %batch.id,
            "performance import committed"
        );
        history.push(batch.clone());
        batches.push(batch);
    }

    store.set(TABLE_PERFORMANCE_DATA, &records)?;
    store.set(TABLE_PROCESSED_HASHES, &hashes)?;
    store.set(TABLE_IMPORT_HISTORY, &history)?;

    Ok(batches)
}

/// Upserts creative links per client. A link whose ad name was realigned to
/// the performance spelling replaces the entry stored under the old name.
pub fn commit_looker_import<B: StoreBackend>(
    store: &Store<B>,
    file_name: &str,
    results: &[LookerProcessResult],
) -> Result<Vec<ImportBatch>> {
    let mut looker: LookerDataByClient = store.get_or_default(TABLE_LOOKER_DATA)?;
    let mut hashes: ProcessedHashes = store.get_or_default(TABLE_PROCESSED_HASHES)?;
    let mut history: Vec<ImportBatch> = store.get_or_default(TABLE_IMPORT_HISTORY)?;

    let done = already_committed(
        &hashes,
        file_name,
        results
            .iter()
            .map(|r| (r.client_id.as_str(), r.client_name.as_str(), r.file_hash.as_str())),
    )?;

    let mut batches = Vec::with_capacity(results.len());

    for result in results.iter().filter(|r| !done.contains(&r.client_id)) {
        let links = looker.entry(result.client_id.clone()).or_default();
        for creative in &result.creatives {
            links.retain(|name, c| c.ad_id != creative.ad_id || *name == creative.ad_name);
            links.insert(creative.ad_name.clone(), creative.clone());
        }

        hashes
            .entry(result.client_id.clone())
            .or_default()
            .insert(result.file_hash.clone());

        let batch = new_batch(
            ImportSource::Looker,
            file_name,
            &result.file_hash,
            &result.client_name,
            format!(
                "{} new creative links, {} updated",
                result.new_creatives_count, result.updated_count
            ),
            UndoData {
                client_id: result.client_id.clone(),
                record_keys: Vec::new(),
                creative_ad_names: result.new_ad_names.clone(),
            },
        );
        info!(
            file = file_name,
            client_id = %result.client_id,
            added = result.new_creatives_count,
            updated = result.updated_count,
            batch = %batch.id,
            "creative import committed"
        );
        history.push(batch.clone());
        batches.push(batch);
    }

    store.set(TABLE_LOOKER_DATA, &looker)?;
    store.set(TABLE_PROCESSED_HASHES, &hashes)?;
    store.set(TABLE_IMPORT_HISTORY, &history)?;

    Ok(batches)
}

/// Records a Bitácora text report in the import history of `client`.
pub fn commit_bitacora_import<B: StoreBackend>(
    store: &Store<B>,
    file: &ImportFile,
    client: &Client,
    report: &BitacoraReport,
) -> Result<ImportBatch> {
    let mut hashes: ProcessedHashes = store.get_or_default(TABLE_PROCESSED_HASHES)?;
    let mut history: Vec<ImportBatch> = store.get_or_default(TABLE_IMPORT_HISTORY)?;

    let file_hash = file.hash();
    already_processed(&hashes, &file_hash, [client], &file.name)?;

    let period = match (&report.period_start, &report.period_end) {
        (Some(start), Some(end)) => format!(", {} to {}", start, end),
        _ => String::new(),
    };
    let batch = new_batch(
        ImportSource::Txt,
        &file.name,
        &file_hash,
        &client.name,
        format!(
            "Bitácora report: {} metrics, {} sections{}",
            report.metrics.len(),
            report.sections.len(),
            period
        ),
        UndoData {
            client_id: client.id.clone(),
            ..Default::default()
        },
    );

    hashes.entry(client.id.clone()).or_default().insert(file_hash);
    history.push(batch.clone());

    store.set(TABLE_PROCESSED_HASHES, &hashes)?;
    store.set(TABLE_IMPORT_HISTORY, &history)?;

    info!(file = %file.name, client_id = %client.id, batch = %batch.id, "bitacora import committed");
    Ok(batch)
}

#[derive(Debug, Clone, PartialEq)]
pub struct UndoReport {
    pub batch: ImportBatch,
    pub removed_records: usize,
    pub removed_creatives: usize,
}

/// Reverses one import: removes the rows and creative links it created,
/// forgets its file hash and drops the history entry. Links the batch only
/// updated keep their new values.
pub fn undo_import<B: StoreBackend>(store: &Store<B>, batch_id: &str) -> Result<UndoReport> {
    let mut history: Vec<ImportBatch> = store.get_or_default(TABLE_IMPORT_HISTORY)?;
    let pos = history
        .iter()
        .position(|b| b.id == batch_id)
        .ok_or_else(|| ImportError::BatchNotFound(batch_id.to_string()))?;
    let batch = history.remove(pos);
    let undo = &batch.undo_data;

    let mut records: RecordsByClient = store.get_or_default(TABLE_PERFORMANCE_DATA)?;
    let mut looker: LookerDataByClient = store.get_or_default(TABLE_LOOKER_DATA)?;
    let mut hashes: ProcessedHashes = store.get_or_default(TABLE_PROCESSED_HASHES)?;

    let removed_records = records
        .get_mut(&undo.client_id)
        .map(|set| remove_records_by_ids(set, &undo.record_keys))
        .unwrap_or(0);

    let removed_creatives = looker
        .get_mut(&undo.client_id)
        .map(|links| {
            undo.creative_ad_names
                .iter()
                .filter(|name| links.remove(name.as_str()).is_some())
                .count()
        })
        .unwrap_or(0);

    // Another batch of the same file for the same client keeps the hash.
    let hash_still_used = history
        .iter()
        .any(|b| b.file_hash == batch.file_hash && b.undo_data.client_id == undo.client_id);
    if !hash_still_used {
        if let Some(set) = hashes.get_mut(&undo.client_id) {
            set.remove(&batch.file_hash);
        }
    }

    store.set(TABLE_PERFORMANCE_DATA, &records)?;
    store.set(TABLE_LOOKER_DATA, &looker)?;
    store.set(TABLE_PROCESSED_HASHES, &hashes)?;
    store.set(TABLE_IMPORT_HISTORY, &history)?;

    info!(
        batch = %batch.id,
        client_id = %undo.client_id,
        removed_records,
        removed_creatives,
        "import undone"
    );

    Ok(UndoReport {
        batch,
        removed_records,
        removed_creatives,
    })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClearReport {
    pub records: usize,
    pub creatives: usize,
    pub hashes: usize,
    pub batches: usize,
}

/// Bulk-clears one client's records, creative links, file hashes and import
/// history. The client itself stays in the roster.
pub fn clear_client_data<B: StoreBackend>(store: &Store<B>, client_id: &str) -> Result<ClearReport> {
    let mut records: RecordsByClient = store.get_or_default(TABLE_PERFORMANCE_DATA)?;
    let mut looker: LookerDataByClient = store.get_or_default(TABLE_LOOKER_DATA)?;
    let mut hashes: ProcessedHashes = store.get_or_default(TABLE_PROCESSED_HASHES)?;
    let mut history: Vec<ImportBatch> = store.get_or_default(TABLE_IMPORT_HISTORY)?;

    let history_before = history.len();
    history.retain(|b| b.undo_data.client_id != client_id);

    let report = ClearReport {
        records: records.remove(client_id).map_or(0, |v| v.len()),
        creatives: looker.remove(client_id).map_or(0, |m| m.len()),
        hashes: hashes.remove(client_id).map_or(0, |s| s.len()),
        batches: history_before - history.len(),
    };

    store.set(TABLE_PERFORMANCE_DATA, &records)?;
    store.set(TABLE_LOOKER_DATA, &looker)?;
    store.set(TABLE_PROCESSED_HASHES, &hashes)?;
    store.set(TABLE_IMPORT_HISTORY, &history)?;

    info!(client_id, records = report.records, batches = report.batches, "client data cleared");
    Ok(report)
}
