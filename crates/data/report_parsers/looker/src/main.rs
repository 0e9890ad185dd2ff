use anyhow::Result;
use std::env;

use looker_parser::LookerParser;

fn main() -> Result<()> {
    // Usage:
    //   looker_parser creatives.xlsx [more.csv ...]

    let paths: Vec<String> = env::args().skip(1).collect();
    if paths.is_empty() {
        println!("❌ Usage: looker_parser <file> [file ...]");
        return Ok(());
    }

    let parser = LookerParser::new();

    for p in &paths {
        println!("📖 Parsing {}", p);
        let report = parser.parse_file(p)?;

        let with_image = report.rows.iter().filter(|r| r.creative.has_image()).count();
        println!("✓ Creatives: {} ({} with image)", report.rows.len(), with_image);
        for row in &report.rows {
            println!(
                "  • {} [{}] {}",
                row.creative.ad_name,
                row.creative.ad_id,
                row.creative.image_url.as_deref().unwrap_or("-")
            );
        }
    }

    Ok(())
}
