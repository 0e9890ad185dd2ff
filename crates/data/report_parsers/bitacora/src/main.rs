use anyhow::Result;
use std::env;

use bitacora_parser::parse_bitacora_file;

fn main() -> Result<()> {
    // Usage:
    //   bitacora_parser bitacora.txt
    //
    // Prints the parsed report as JSON.

    let Some(path) = env::args().nth(1) else {
        println!("❌ Usage: bitacora_parser <file.txt>");
        return Ok(());
    };

    let report = parse_bitacora_file(&path)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.unparsed_lines.is_empty() {
        eprintln!("⚠️  {} line(s) not recognised", report.unparsed_lines.len());
    }

    Ok(())
}
