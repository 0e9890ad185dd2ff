use anyhow::{bail, Context, Result};
use dashboard_engine::{generate_dashboard, write_dashboard_json, CreativeFilter};
use std::env;
use std::path::PathBuf;

fn arg(name: &str) -> Option<String> {
    env::args()
        .position(|a| a == name)
        .and_then(|i| env::args().nth(i + 1))
}

fn main() -> Result<()> {
    let data = arg("--data").unwrap_or("data".to_string());
    let out = arg("--out").unwrap_or("dashboard/dashboard.json".to_string());
    let filter = match arg("--type").as_deref() {
        None | Some("all") => CreativeFilter::All,
        Some("image") => CreativeFilter::Image,
        Some("video") => CreativeFilter::Video,
        Some(other) => bail!("Unknown creative type '{other}' (expected all, image or video)"),
    };

    let data_dir = PathBuf::from(&data);
    let out_path = PathBuf::from(&out);

    println!(
        "📊 Generating dashboard...\n  data   : {}\n  output : {}\n  type   : {:?}",
        data_dir.display(),
        out_path.display(),
        filter
    );

    let dashboard = generate_dashboard(&data_dir, filter).context("generate dashboard")?;
    write_dashboard_json(&dashboard, &out_path).context("write dashboard.json")?;

    println!(
        "✅ Done. {} clients, {} records. Generated at {}",
        dashboard.metadata.clients_count,
        dashboard.metadata.records_count,
        dashboard.metadata.generated_at
    );
    Ok(())
}
