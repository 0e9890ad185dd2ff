use looker_parser::LookerParser;
use meta_ads_parser::MetaAdsParser;
use models::{Client, ImportSource};
use tracing::info;
use utils::store::TABLE_CLIENTS;
use utils::{merge_clients_with_deduplication, unknown_account_names, MergeStats, Store, StoreBackend};
use uuid::Uuid;

use crate::error::{ImportError, Result};
use crate::ImportFile;

/// Account names in `file` that match none of `clients`, so the caller can
/// offer to create them before importing.
pub fn check_for_new_accounts(
    file: &ImportFile,
    clients: &[Client],
    source: ImportSource,
) -> Result<Vec<String>> {
    let names: Vec<String> = match source {
        ImportSource::Meta => MetaAdsParser::new()
            .account_names(&file.bytes)
            .map_err(|e| ImportError::parse(&file.name, e))?,
        ImportSource::Looker => LookerParser::new()
            .parse_bytes(&file.bytes)
            .map_err(|e| ImportError::parse(&file.name, e))?
            .rows
            .into_iter()
            .filter_map(|r| r.account_name)
            .collect(),
        ImportSource::Txt => bitacora_parser::parse_bitacora_bytes(&file.bytes)
            .client_name
            .into_iter()
            .collect(),
    };

    Ok(unknown_account_names(clients, names.iter().map(String::as_str)))
}

/// New clients for account names found by [`check_for_new_accounts`].
pub fn create_clients_for_accounts(names: &[String], currency: &str, user_id: &str) -> Vec<Client> {
    names
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(|name| Client {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            currency: currency.trim().to_uppercase(),
            logo: None,
            meta_account_name: Some(name.to_string()),
            user_id: user_id.to_string(),
        })
        .collect()
}

/// Adds clients to the stored roster, skipping ones already present.
pub fn register_clients<B: StoreBackend>(store: &Store<B>, new_clients: Vec<Client>) -> Result<MergeStats> {
    let roster: Vec<Client> = store.get_or_default(TABLE_CLIENTS)?;
    let (merged, stats) = merge_clients_with_deduplication(roster, new_clients);
    store.set(TABLE_CLIENTS, &merged)?;
    info!(added = stats.added, skipped = stats.skipped, "clients registered");
    Ok(stats)
}
