use anyhow::Result;
use clap::Parser;
use cli::bootstrap;
use dashboard_engine::summarize_clients;
use models::{Client, LookerDataByClient, RecordsByClient};
use std::path::PathBuf;
use utils::store::{TABLE_CLIENTS, TABLE_LOOKER_DATA, TABLE_PERFORMANCE_DATA};

#[derive(Parser, Debug)]
#[command(name = "client-summary", about = "Spend, ROAS and creative coverage per client.")]
struct Args {
    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Path to settings.json
    #[arg(long)]
    settings: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let rt = bootstrap(args.settings.as_ref())?;

    let clients: Vec<Client> = rt.store.get_or_default(TABLE_CLIENTS)?;
    let records: RecordsByClient = rt.store.get_or_default(TABLE_PERFORMANCE_DATA)?;
    let looker: LookerDataByClient = rt.store.get_or_default(TABLE_LOOKER_DATA)?;
    let summaries = summarize_clients(&clients, &records, &looker, None);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No clients yet. Import a report with --create-accounts to add some.");
    }
    for s in &summaries {
        println!(
            "👤 {:<30} {:<12} spend {:>12.2} {}  roas {:>5.2}  ads {:>4}  with creative {:>4}",
            s.client_name, s.client_id, s.total_spend, s.currency, s.roas, s.total_ads, s.matched_count
        );
    }
    Ok(())
}
