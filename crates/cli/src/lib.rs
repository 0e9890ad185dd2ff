//! Shared setup and import orchestration for the command-line tools.

use anyhow::Result as AnyResult;
use importer::{
    ImportError, ImportFile, ImportOutcome, LookerImport, PerformanceImport, Result,
    check_for_new_accounts, commit_bitacora_import, commit_looker_import,
    commit_performance_import, create_clients_for_accounts, load_dataset, process_looker_data,
    process_performance_data, register_clients,
};
use models::{ImportBatch, ImportSource, Settings};
use notifier::{ImportSummary, NotificationPublisher, ServiceNotice, WebhookClient};
use std::path::PathBuf;
use tracing::info;
use utils::{JsonDirBackend, Store, StoreBackend, match_client};

/// Settings plus the store they point at.
pub struct Runtime {
    pub settings: Settings,
    pub store: Store<JsonDirBackend>,
}

/// Loads settings (file, `.env`, environment), starts logging and opens the
/// JSON store.
pub fn bootstrap(settings_path: Option<&PathBuf>) -> AnyResult<Runtime> {
    let settings = settings_loader::load_runtime_settings(settings_path)?;
    logger::init(&settings.log);
    let store = Store::new(JsonDirBackend::new(&settings.data_dir));
    info!(data_dir = %settings.data_dir.display(), "store opened");
    Ok(Runtime { settings, store })
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Client receiving rows from exports without an account column.
    pub client_id: Option<String>,
    pub dry_run: bool,
    /// Create clients for unknown account names instead of skipping them.
    pub create_accounts: bool,
    pub currency: String,
    pub user_id: String,
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileReport {
    /// Unknown accounts found; nothing was written.
    NewAccounts(Vec<String>),
    Preview {
        lines: Vec<String>,
        skipped_accounts: Vec<String>,
    },
    Committed {
        lines: Vec<String>,
        batches: Vec<ImportBatch>,
        skipped_accounts: Vec<String>,
    },
}

/// Runs one file through account detection, processing and commit.
pub fn import_file<B: StoreBackend>(
    store: &Store<B>,
    file: &ImportFile,
    source: ImportSource,
    opts: &ImportOptions,
    publisher: &NotificationPublisher,
) -> Result<FileReport> {
    let mut data = load_dataset(store)?;

    if opts.create_accounts {
        let names = check_for_new_accounts(file, &data.clients, source)?;
        if !names.is_empty() {
            if opts.dry_run {
                return Ok(FileReport::NewAccounts(names));
            }
            let created = create_clients_for_accounts(&names, &opts.currency, &opts.user_id);
            let stats = register_clients(store, created)?;
            publisher.info(format!("Created {} client(s): {}", stats.added, names.join(", ")));
            data = load_dataset(store)?;
        }
    }

    let fallback = opts.client_id.as_deref();
    match source {
        ImportSource::Meta => {
            let outcome = process_performance_data(PerformanceImport {
                file,
                clients: &data.clients,
                existing: &data.records,
                processed_hashes: &data.hashes,
                fallback_client_id: fallback,
                dry_run: opts.dry_run,
            })?;
            let (results, skipped_accounts) = match outcome {
                ImportOutcome::NewAccounts(names) => return Ok(FileReport::NewAccounts(names)),
                ImportOutcome::Processed {
                    results,
                    skipped_accounts,
                } => (results, skipped_accounts),
            };
            let lines = results
                .iter()
                .map(|r| {
                    let period = match (&r.period_start, &r.period_end) {
                        (Some(s), Some(e)) => format!("{s} → {e}"),
                        _ => "no new days".to_string(),
                    };
                    format!(
                        "{}: {} new of {} rows, {} days ({})",
                        r.client_name, r.new_records_count, r.stats.total, r.days_detected, period
                    )
                })
                .collect();
            if opts.dry_run {
                return Ok(FileReport::Preview {
                    lines,
                    skipped_accounts,
                });
            }
            let batches = commit_performance_import(store, &file.name, &results)?;
            Ok(FileReport::Committed {
                lines,
                batches,
                skipped_accounts,
            })
        }
        ImportSource::Looker => {
            let outcome = process_looker_data(LookerImport {
                file,
                clients: &data.clients,
                existing_looker: &data.looker,
                existing_records: &data.records,
                processed_hashes: &data.hashes,
                fallback_client_id: fallback,
                dry_run: opts.dry_run,
            })?;
            let (results, skipped_accounts) = match outcome {
                ImportOutcome::NewAccounts(names) => return Ok(FileReport::NewAccounts(names)),
                ImportOutcome::Processed {
                    results,
                    skipped_accounts,
                } => (results, skipped_accounts),
            };
            let lines = results
                .iter()
                .map(|r| {
                    format!(
                        "{}: {} new creative links, {} updated",
                        r.client_name, r.new_creatives_count, r.updated_count
                    )
                })
                .collect();
            if opts.dry_run {
                return Ok(FileReport::Preview {
                    lines,
                    skipped_accounts,
                });
            }
            let batches = commit_looker_import(store, &file.name, &results)?;
            Ok(FileReport::Committed {
                lines,
                batches,
                skipped_accounts,
            })
        }
        ImportSource::Txt => {
            let report = bitacora_parser::parse_bitacora_bytes(&file.bytes);
            let client = match fallback {
                Some(id) => data.clients.iter().find(|c| c.id == id),
                None => report
                    .client_name
                    .as_deref()
                    .and_then(|name| match_client(&data.clients, name)),
            };
            let Some(client) = client else {
                return match (fallback, report.client_name) {
                    (Some(id), _) => Err(ImportError::UnknownClient(id.to_string())),
                    (None, Some(name)) => Ok(FileReport::NewAccounts(vec![name])),
                    (None, None) => Err(ImportError::Parse {
                        file_name: file.name.clone(),
                        reason: "report names no client and no target client given".to_string(),
                    }),
                };
            };
            let lines = vec![format!(
                "{}: {} metrics, {} sections",
                client.name,
                report.metrics.len(),
                report.sections.len()
            )];
            if opts.dry_run {
                return Ok(FileReport::Preview {
                    lines,
                    skipped_accounts: vec![],
                });
            }
            let batch = commit_bitacora_import(store, file, client, &report)?;
            Ok(FileReport::Committed {
                lines,
                batches: vec![batch],
                skipped_accounts: vec![],
            })
        }
    }
}

/// Posts the import summary if a webhook is configured. Failures are
/// published as warnings and returned.
pub fn notify_webhook(
    settings: &Settings,
    batches: &[ImportBatch],
    skipped_accounts: &[String],
    publisher: &NotificationPublisher,
) -> Option<ServiceNotice> {
    let summary = ImportSummary::from_batches(batches, skipped_accounts)?;
    let notice = match WebhookClient::from_settings(settings.webhook.as_ref())? {
        Ok(client) => client.notify(&summary),
        Err(e) => Some(ServiceNotice::new("webhook", e.to_string())),
    };
    if let Some(notice) = &notice {
        notice.publish(publisher);
    }
    notice
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::{Client, RecordsByClient};
    use notifier::{NotificationChannel, NotificationLevel};
    use utils::MemoryBackend;
    use utils::store::{TABLE_CLIENTS, TABLE_PERFORMANCE_DATA};

    const CSV: &str = "\
Nombre de la cuenta;Nombre del anuncio;Día;Importe gastado (EUR);Impresiones
Acme Tienda;Ad Uno;01/08/2025;10;100
Nueva Marca;Ad Dos;01/08/2025;5;50
";

    fn store_with_acme() -> Store<MemoryBackend> {
        let store = Store::new(MemoryBackend::new());
        let clients = vec![Client {
            id: "c-acme".into(),
            name: "Acme Tienda".into(),
            currency: "EUR".into(),
            ..Default::default()
        }];
        store.set(TABLE_CLIENTS, &clients).unwrap();
        store
    }

    fn opts() -> ImportOptions {
        ImportOptions {
            currency: "EUR".into(),
            user_id: "u1".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_dry_run_reports_new_accounts() {
        let store = store_with_acme();
        let (publisher, _sub) = NotificationChannel::open();
        let file = ImportFile::new("julio.csv", CSV);
        let opts = ImportOptions {
            dry_run: true,
            ..opts()
        };

        let report = import_file(&store, &file, ImportSource::Meta, &opts, &publisher).unwrap();
        assert_eq!(report, FileReport::NewAccounts(vec!["Nueva Marca".to_string()]));

        let records: RecordsByClient = store.get_or_default(TABLE_PERFORMANCE_DATA).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_commit_skips_unknown_accounts() {
        let store = store_with_acme();
        let (publisher, _sub) = NotificationChannel::open();
        let file = ImportFile::new("julio.csv", CSV);

        let report = import_file(&store, &file, ImportSource::Meta, &opts(), &publisher).unwrap();
        let FileReport::Committed {
            batches,
            skipped_accounts,
            ..
        } = report
        else {
            panic!("expected a commit");
        };
        assert_eq!(batches.len(), 1);
        assert_eq!(skipped_accounts, vec!["Nueva Marca"]);

        let again = import_file(&store, &file, ImportSource::Meta, &opts(), &publisher);
        assert!(matches!(again, Err(ImportError::DuplicateFile { .. })));
    }

    #[test]
    fn test_create_accounts_then_commit() {
        let store = store_with_acme();
        let (publisher, sub) = NotificationChannel::open();
        let file = ImportFile::new("julio.csv", CSV);
        let opts = ImportOptions {
            create_accounts: true,
            ..opts()
        };

        let report = import_file(&store, &file, ImportSource::Meta, &opts, &publisher).unwrap();
        let FileReport::Committed { batches, .. } = report else {
            panic!("expected a commit");
        };
        assert_eq!(batches.len(), 2);

        let clients: Vec<Client> = store.get_or_default(TABLE_CLIENTS).unwrap();
        assert_eq!(clients.len(), 2);
        let notes = sub.drain();
        assert_eq!(notes[0].level, NotificationLevel::Info);
        assert!(notes[0].message.contains("Nueva Marca"));
    }

    #[test]
    fn test_reimport_reaches_account_created_later() {
        let store = store_with_acme();
        let (publisher, _sub) = NotificationChannel::open();
        let file = ImportFile::new("julio.csv", CSV);
        import_file(&store, &file, ImportSource::Meta, &opts(), &publisher).unwrap();

        let opts = ImportOptions {
            create_accounts: true,
            ..opts()
        };
        let report = import_file(&store, &file, ImportSource::Meta, &opts, &publisher).unwrap();
        let FileReport::Committed { batches, .. } = report else {
            panic!("expected a commit");
        };
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].client_name, "Nueva Marca");

        let records: RecordsByClient = store.get_or_default(TABLE_PERFORMANCE_DATA).unwrap();
        assert_eq!(records["c-acme"].len(), 1);
        assert_eq!(records.values().map(Vec::len).sum::<usize>(), 2);
    }

    #[test]
    fn test_bitacora_matches_client_by_name() {
        let store = store_with_acme();
        let (publisher, _sub) = NotificationChannel::open();
        let file = ImportFile::new("bitacora.txt", "Cliente: Acme Tienda\nGasto: 120\n");

        let report = import_file(&store, &file, ImportSource::Txt, &opts(), &publisher).unwrap();
        let FileReport::Committed { batches, .. } = report else {
            panic!("expected a commit");
        };
        assert_eq!(batches[0].client_name, "Acme Tienda");

        let unknown = ImportFile::new("otra.txt", "Cliente: Nadie\n");
        let report = import_file(&store, &unknown, ImportSource::Txt, &opts(), &publisher).unwrap();
        assert_eq!(report, FileReport::NewAccounts(vec!["Nadie".to_string()]));
    }

    #[test]
    fn test_notify_webhook_without_config_is_silent() {
        let (publisher, sub) = NotificationChannel::open();
        let settings = Settings::default();
        assert!(notify_webhook(&settings, &[], &[], &publisher).is_none());
        assert!(sub.drain().is_empty());
    }
}
