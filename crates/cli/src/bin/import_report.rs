use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use cli::{FileReport, ImportOptions, bootstrap, import_file, notify_webhook};
use importer::{ImportError, ImportFile};
use models::ImportSource;
use notifier::NotificationChannel;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Source {
    Meta,
    Looker,
    Txt,
}

impl From<Source> for ImportSource {
    fn from(s: Source) -> Self {
        match s {
            Source::Meta => ImportSource::Meta,
            Source::Looker => ImportSource::Looker,
            Source::Txt => ImportSource::Txt,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "import-report", about = "Import Meta, Looker or Bitácora report files into the client store.")]
struct Args {
    /// Report files (CSV, XLSX or TXT)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Kind of report
    #[arg(short, long, value_enum, default_value_t = Source::Meta)]
    source: Source,

    /// Client id for exports without an account column
    #[arg(short, long)]
    client: Option<String>,

    /// Parse and compare without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Create clients for account names that match none
    #[arg(long)]
    create_accounts: bool,

    /// Currency for created clients (defaults to the configured one)
    #[arg(long)]
    currency: Option<String>,

    /// Owner of created clients
    #[arg(long, default_value = "local")]
    user: String,

    /// Path to settings.json
    #[arg(long)]
    settings: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let rt = bootstrap(args.settings.as_ref())?;
    let (publisher, subscriber) = NotificationChannel::open();

    let opts = ImportOptions {
        client_id: args.client.clone(),
        dry_run: args.dry_run,
        create_accounts: args.create_accounts,
        currency: args
            .currency
            .clone()
            .unwrap_or_else(|| rt.settings.default_currency.clone()),
        user_id: args.user.clone(),
    };

    let mut failures = 0;
    for path in &args.files {
        let file = ImportFile::read(path)?;
        println!("📄 {}", file.name);

        match import_file(&rt.store, &file, args.source.into(), &opts, &publisher) {
            Ok(FileReport::NewAccounts(names)) => {
                println!("  🆕 Unknown accounts: {}", names.join(", "));
                println!("  Re-run with --create-accounts to add them.");
            }
            Ok(FileReport::Preview {
                lines,
                skipped_accounts,
            }) => {
                for line in lines {
                    println!("  🔎 {line}");
                }
                if !skipped_accounts.is_empty() {
                    println!("  ⏭️  Would skip: {}", skipped_accounts.join(", "));
                }
            }
            Ok(FileReport::Committed {
                lines,
                batches,
                skipped_accounts,
            }) => {
                for line in lines {
                    println!("  ✅ {line}");
                }
                if !skipped_accounts.is_empty() {
                    println!("  ⏭️  Skipped accounts: {}", skipped_accounts.join(", "));
                }
                for batch in &batches {
                    println!("  🧾 batch {} ({})", batch.id, batch.client_name);
                }
                notify_webhook(&rt.settings, &batches, &skipped_accounts, &publisher);
            }
            Err(err @ ImportError::DuplicateFile { .. }) => {
                println!("  ⚠️  {err}");
                failures += 1;
            }
            Err(err) => {
                println!("  ❌ {err}");
                failures += 1;
            }
        }
    }

    drop(publisher);
    for note in subscriber.drain() {
        println!("{} {}", note.level.icon(), note.message);
    }

    if failures > 0 {
        bail!("{failures} of {} file(s) were not imported", args.files.len());
    }
    Ok(())
}
