use anyhow::{Result, bail};
use clap::Parser;
use cli::bootstrap;
use importer::{clear_client_data, load_dataset, undo_import};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "undo-import", about = "List, undo or clear imports.")]
struct Args {
    /// Batch id to undo; without it the import history is listed
    batch: Option<String>,

    /// Remove every record, creative link and file hash of a client
    #[arg(long, conflicts_with = "batch")]
    clear_client: Option<String>,

    /// Confirm --clear-client
    #[arg(long)]
    yes: bool,

    /// Path to settings.json
    #[arg(long)]
    settings: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let rt = bootstrap(args.settings.as_ref())?;

    if let Some(client_id) = &args.clear_client {
        if !args.yes {
            bail!("Clearing deletes all data of client '{client_id}'; pass --yes to confirm");
        }
        let report = clear_client_data(&rt.store, client_id)?;
        println!(
            "🧹 Cleared client {client_id}: {} records, {} creative links, {} file hashes, {} history entries",
            report.records, report.creatives, report.hashes, report.batches
        );
        return Ok(());
    }

    let Some(batch_id) = &args.batch else {
        let data = load_dataset(&rt.store)?;
        if data.history.is_empty() {
            println!("No imports recorded.");
        }
        for b in data.history.iter().rev() {
            println!(
                "{}  {}  {:<6}  {:<20}  {}  ({})",
                b.id,
                b.timestamp.format("%Y-%m-%d %H:%M"),
                b.source.as_str(),
                b.client_name,
                b.file_name,
                b.description
            );
        }
        return Ok(());
    };

    let report = undo_import(&rt.store, batch_id)?;
    println!(
        "↩️  Undid {} ({}, {}): removed {} records and {} creative links",
        report.batch.id,
        report.batch.file_name,
        report.batch.client_name,
        report.removed_records,
        report.removed_creatives
    );
    Ok(())
}
