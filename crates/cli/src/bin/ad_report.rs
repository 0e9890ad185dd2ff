use ai_client::{AnalysisClient, AnalysisClientConfig, run_bulk_analysis};
use anyhow::{Result, anyhow};
use clap::{Parser, ValueEnum};
use cli::bootstrap;
use dashboard_engine::{CreativeFilter, aggregate_ads, demographics_for_ad};
use models::{LookerDataByClient, RecordsByClient};
use notifier::{NotificationChannel, ServiceNotice};
use std::collections::BTreeMap;
use std::path::PathBuf;
use utils::store::{TABLE_CLIENTS, TABLE_LOOKER_DATA, TABLE_PERFORMANCE_DATA};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    All,
    Image,
    Video,
}

impl From<Kind> for CreativeFilter {
    fn from(k: Kind) -> Self {
        match k {
            Kind::All => CreativeFilter::All,
            Kind::Image => CreativeFilter::Image,
            Kind::Video => CreativeFilter::Video,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "ad-report", about = "Per-ad performance of one client, best ROAS first.")]
struct Args {
    /// Client id
    #[arg(short, long)]
    client: String,

    /// Creative type to keep
    #[arg(short = 't', long = "type", value_enum, default_value_t = Kind::All)]
    kind: Kind,

    /// Show the gender/age breakdown of one ad
    #[arg(long)]
    ad: Option<String>,

    /// Run the creative analysis for linked images first
    #[arg(long)]
    analyze: bool,

    /// Context passed to the analysis
    #[arg(long, default_value = "")]
    context: String,

    /// Re-analyse ads that already have a result
    #[arg(long)]
    overwrite: bool,

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

    let clients: Vec<models::Client> = rt.store.get_or_default(TABLE_CLIENTS)?;
    let client = clients
        .iter()
        .find(|c| c.id == args.client)
        .ok_or_else(|| anyhow!("Unknown client: {}", args.client))?;
    let records: RecordsByClient = rt.store.get_or_default(TABLE_PERFORMANCE_DATA)?;
    let mut looker: LookerDataByClient = rt.store.get_or_default(TABLE_LOOKER_DATA)?;
    let rows = records.get(&client.id).map(Vec::as_slice).unwrap_or_default();

    if let Some(ad_name) = &args.ad {
        let segments = demographics_for_ad(rows, ad_name);
        if args.json {
            println!("{}", serde_json::to_string_pretty(&segments)?);
            return Ok(());
        }
        println!("👥 {ad_name} ({})", client.name);
        for s in &segments {
            println!(
                "  {:<8} {:<8} spend {:>10.2} {}  roas {:>5.2}  cpa {:>8.2}  ctr {:>5.2}%",
                s.gender, s.age, s.spend, client.currency, s.roas, s.cpa, s.ctr_link
            );
        }
        return Ok(());
    }

    if args.analyze {
        let settings = rt
            .settings
            .analysis
            .as_ref()
            .ok_or_else(|| anyhow!("No analysis endpoint configured"))?;
        let analyzer = AnalysisClient::new(AnalysisClientConfig::from_settings(settings))?;
        let (publisher, subscriber) = NotificationChannel::open();

        let links = looker.entry(client.id.clone()).or_default();
        let names: Vec<String> = links.keys().cloned().collect();
        let report = run_bulk_analysis(&analyzer, links, &names, &args.context, args.overwrite);
        for failure in &report.failed {
            ServiceNotice::new("analysis", format!("{}: {}", failure.ad_name, failure.error))
                .publish(&publisher);
        }
        rt.store.set(TABLE_LOOKER_DATA, &looker)?;

        println!(
            "🤖 Analysed {}, skipped {}, failed {}",
            report.analyzed.len(),
            report.skipped.len(),
            report.failed.len()
        );
        drop(publisher);
        for note in subscriber.drain() {
            println!("{} {}", note.level.icon(), note.message);
        }
    }

    let empty = BTreeMap::new();
    let links = looker.get(&client.id).unwrap_or(&empty);
    let ads = aggregate_ads(rows, links, args.kind.into());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&ads)?);
        return Ok(());
    }

    println!("📊 {} ({} ads)", client.name, ads.len());
    for ad in &ads {
        let kind = match ad.creative_type {
            Some(models::CreativeType::Video) => "🎬",
            Some(models::CreativeType::Image) => "🖼️",
            None => "  ",
        };
        println!(
            "  {kind} {:<40} spend {:>10.2} {}  roas {:>5.2}  cpa {:>8.2}  ctr {:>5.2}%  {} days",
            ad.ad_name, ad.spend, client.currency, ad.roas, ad.cpa, ad.ctr_link, ad.active_days
        );
    }
    Ok(())
}
