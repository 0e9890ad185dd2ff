use anyhow::{Context, Result, anyhow};
use bitacora_parser::parse_bitacora_file;
use clap::Parser;
use cli::bootstrap;
use importer::{ImportFile, commit_bitacora_import, load_dataset};
use std::path::PathBuf;
use utils::match_client;

#[derive(Parser, Debug)]
#[command(name = "bitacora", about = "Parse a Bitácora text report and optionally record it for a client.")]
struct Args {
    /// Report file
    file: PathBuf,

    /// Record the report in the import history
    #[arg(long)]
    commit: bool,

    /// Client id; defaults to the client named in the report
    #[arg(short, long)]
    client: Option<String>,

    /// Path to settings.json
    #[arg(long)]
    settings: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let path = args.file.to_string_lossy().into_owned();
    let report = parse_bitacora_file(&path)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !args.commit {
        return Ok(());
    }

    let rt = bootstrap(args.settings.as_ref())?;
    let data = load_dataset(&rt.store)?;
    let client = match (&args.client, &report.client_name) {
        (Some(id), _) => data.clients.iter().find(|c| &c.id == id),
        (None, Some(name)) => match_client(&data.clients, name),
        (None, None) => None,
    }
    .ok_or_else(|| anyhow!("No client found for this report; pass --client"))?;

    let file = ImportFile::read(&args.file)?;
    let batch = commit_bitacora_import(&rt.store, &file, client, &report)
        .with_context(|| format!("recording {}", file.name))?;
    println!("✅ Recorded as batch {} for {}", batch.id, client.name);
    Ok(())
}
