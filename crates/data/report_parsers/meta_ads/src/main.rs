use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::{env, fs};

use meta_ads_parser::MetaAdsParser;

fn main() -> Result<()> {
    // Usage:
    //   meta_ads_parser export.csv other.xlsx ...
    //
    // If no files are provided, it will try to parse files matching "meta*.csv|xlsx" in cwd.
    // Nothing is written; use `import-report` to merge into the data directory.

    let mut paths: Vec<String> = env::args().skip(1).collect();

    if paths.is_empty() {
        for entry in fs::read_dir(".").context("Cannot read current directory")? {
            let path = entry?.path();
            if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                let low = name.to_lowercase();
                if low.starts_with("meta") && (low.ends_with(".csv") || low.ends_with(".xlsx")) {
                    paths.push(name.to_string());
                }
            }
        }
        paths.sort();
    }

    if paths.is_empty() {
        println!("❌ No input files found (expected meta*.csv / meta*.xlsx or explicit paths).");
        return Ok(());
    }

    let parser = MetaAdsParser::new();

    for p in &paths {
        println!("📖 Parsing {}", p);
        let report = parser.parse_file(p)?;

        if report.rows.is_empty() {
            println!("  ❌ No dated rows found.");
            continue;
        }

        let mut per_account: BTreeMap<String, (usize, f64)> = BTreeMap::new();
        for row in &report.rows {
            let key = row
                .account_name
                .clone()
                .unwrap_or_else(|| "(no account column)".to_string());
            let entry = per_account.entry(key).or_default();
            entry.0 += 1;
            entry.1 += row.record.spend;
        }

        let first = report.rows.iter().map(|r| r.record.day.as_str()).min().unwrap_or("-");
        let last = report.rows.iter().map(|r| r.record.day.as_str()).max().unwrap_or("-");

        println!("\n📊 Summary:");
        println!("✓ Rows parsed: {} ({} skipped without date)", report.rows.len(), report.skipped_rows);
        println!("✓ Period: {} → {}", first, last);
        for (account, (rows, spend)) in &per_account {
            println!("  • {}: {} rows, spend {:.2}", account, rows, spend);
        }
    }

    Ok(())
}
