//! Turns uploaded report files into deduplicated increments of a client's
//! performance records or creative links, and persists them with an audit
//! trail that can be undone.

pub mod accounts;
pub mod commit;
pub mod error;
pub mod looker;
pub mod performance;

use anyhow::{Context, Result as AnyResult};
use models::{Client, ClientId, ProcessedHashes};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use utils::match_client;

pub use crate::accounts::{check_for_new_accounts, create_clients_for_accounts, register_clients};
pub use crate::commit::{
    clear_client_data, commit_bitacora_import, commit_looker_import, commit_performance_import,
    load_dataset, undo_import, ClearReport, DataSet, UndoReport,
};
pub use crate::error::{ImportError, Result};
pub use crate::looker::{process_looker_data, LookerImport, LookerProcessResult};
pub use crate::performance::{process_performance_data, PerformanceImport, ProcessResult};

/// An uploaded file: its display name and full content.
#[derive(Debug, Clone)]
pub struct ImportFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ImportFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn read<P: AsRef<Path>>(path: P) -> AnyResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Cannot read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, bytes })
    }

    pub fn hash(&self) -> String {
        utils::file_hash(&self.bytes)
    }
}

/// Result of a processing call. Unknown accounts in a dry run are a request
/// for more input rather than an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome<T> {
    NewAccounts(Vec<String>),
    Processed {
        results: Vec<T>,
        /// Account names whose rows were left out because no client matches.
        skipped_accounts: Vec<String>,
    },
}

impl<T> ImportOutcome<T> {
    pub fn results(&self) -> &[T] {
        match self {
            ImportOutcome::NewAccounts(_) => &[],
            ImportOutcome::Processed { results, .. } => results,
        }
    }
}

/// Where rows of one account name end up.
pub(crate) enum Target<'a> {
    Client(&'a Client),
    Unmatched(String),
}

/// Resolves an optional account name to a client, falling back to
/// `fallback_client_id` for exports without an account column.
pub(crate) fn resolve_target<'a>(
    clients: &'a [Client],
    account_name: Option<&str>,
    fallback: Option<&'a Client>,
    file_name: &str,
) -> Result<Target<'a>> {
    match account_name {
        Some(name) => Ok(match match_client(clients, name) {
            Some(client) => Target::Client(client),
            None => Target::Unmatched(name.to_string()),
        }),
        None => fallback.map(Target::Client).ok_or_else(|| {
            ImportError::parse(file_name, "no account name column and no target client given")
        }),
    }
}

pub(crate) fn find_client<'a>(clients: &'a [Client], id: Option<&str>) -> Result<Option<&'a Client>> {
    match id {
        None => Ok(None),
        Some(id) => clients
            .iter()
            .find(|c| c.id == id)
            .map(Some)
            .ok_or_else(|| ImportError::UnknownClient(id.to_string())),
    }
}

/// Ids of the `targets` that already hold `hash`. Those clients are left
/// out of the import; it fails only when every target already has the file.
pub(crate) fn already_processed<'a, I>(
    hashes: &ProcessedHashes,
    hash: &str,
    targets: I,
    file_name: &str,
) -> Result<BTreeSet<ClientId>>
where
    I: IntoIterator<Item = &'a Client>,
{
    let mut done = BTreeSet::new();
    let mut first_done: Option<&Client> = None;
    let mut pending = 0;
    for client in targets {
        if hashes.get(&client.id).is_some_and(|set| set.contains(hash)) {
            first_done.get_or_insert(client);
            done.insert(client.id.clone());
        } else {
            pending += 1;
        }
    }

    match first_done {
        Some(client) if pending == 0 => Err(ImportError::DuplicateFile {
            file_name: file_name.to_string(),
            client_name: client.name.clone(),
        }),
        _ => Ok(done),
    }
}
