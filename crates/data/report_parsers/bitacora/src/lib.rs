//! Parser for the plain-text "Bitácora" weekly report.
//!
//! Layout, one item per line:
//!
//! ```text
//! BITÁCORA SEMANAL
//! Cliente: Acme Tienda
//! Periodo: 01/07/2025 - 07/07/2025
//! Gasto: 1.234,56 €
//! ROAS: 3,2
//!
//! ## Acciones realizadas
//! - Pausado el anuncio "Ad Uno"
//! ## Próximos pasos
//! - Probar nuevo público
//! ```
//!
//! `Key: value` lines outside a section become metrics when the value is a
//! number and fields otherwise. Lines that fit nowhere are kept verbatim in
//! `unparsed_lines`.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::sync::LazyLock;
use utils::{normalize_name, to_date_iso, to_number_es, RawValue};

static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^bit[aá]cora\b").expect("valid regex"));
static SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,3}\s*(.+?)\s*:?$").expect("valid regex"));
static ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-*•]|\d+[.)])\s+(.+)$").expect("valid regex"));
static KEY_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^:]{1,60}):\s*(.*)$").expect("valid regex"));
static PERIOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\S+)\s*(?:-|–|al|a|to)\s*(\S+)$").expect("valid regex")
});

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BitacoraSection {
    pub title: String,
    pub entries: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BitacoraReport {
    pub title: Option<String>,
    pub client_name: Option<String>,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
    pub metrics: BTreeMap<String, f64>,
    pub fields: BTreeMap<String, String>,
    pub sections: Vec<BitacoraSection>,
    pub unparsed_lines: Vec<String>,
}

pub fn parse_bitacora_file(path: &str) -> Result<BitacoraReport> {
    let bytes = fs::read(path).with_context(|| format!("Cannot read {}", path))?;
    Ok(parse_bitacora_bytes(&bytes))
}

/// Decodes UTF-8 or Windows-1252 text, then parses it.
pub fn parse_bitacora_bytes(bytes: &[u8]) -> BitacoraReport {
    parse_bitacora_report(&general_parser::decode_text(bytes))
}

/// Single pass over the lines of a Bitácora report. Never fails: anything
/// not recognised ends up in `unparsed_lines`.
pub fn parse_bitacora_report(text: &str) -> BitacoraReport {
    let mut report = BitacoraReport::default();
    let mut current: Option<BitacoraSection> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(caps) = SECTION.captures(line) {
            if let Some(done) = current.take() {
                report.sections.push(done);
            }
            current = Some(BitacoraSection {
                title: caps[1].to_string(),
                entries: Vec::new(),
            });
            continue;
        }

        if let Some(section) = current.as_mut() {
            let entry = ENTRY
                .captures(line)
                .map(|c| c[1].trim().to_string())
                .unwrap_or_else(|| line.to_string());
            section.entries.push(entry);
            continue;
        }

        if report.title.is_none() && TITLE.is_match(line) {
            report.title = Some(line.to_string());
            continue;
        }

        if let Some(caps) = KEY_VALUE.captures(line) {
            let key = caps[1].trim();
            let value = caps[2].trim();
            apply_header_line(&mut report, key, value, line);
            continue;
        }

        report.unparsed_lines.push(line.to_string());
    }

    if let Some(done) = current.take() {
        report.sections.push(done);
    }

    report
}

fn apply_header_line(report: &mut BitacoraReport, key: &str, value: &str, line: &str) {
    match normalize_name(key).as_str() {
        "cliente" | "client" | "cuenta" => {
            if !value.is_empty() {
                report.client_name = Some(value.to_string());
            }
        }
        "periodo" | "period" | "semana" => {
            let parsed = PERIOD.captures(value).and_then(|c| {
                let start = to_date_iso(&RawValue::from(&c[1]))?;
                let end = to_date_iso(&RawValue::from(&c[2]))?;
                Some((start, end))
            });
            match parsed {
                Some((start, end)) => {
                    report.period_start = Some(start);
                    report.period_end = Some(end);
                }
                None => report.unparsed_lines.push(line.to_string()),
            }
        }
        _ => {
            if value.is_empty() {
                report.unparsed_lines.push(line.to_string());
            } else if let Some(n) = to_number_es(&RawValue::from(value)) {
                report.metrics.insert(key.to_string(), n);
            } else {
                report.fields.insert(key.to_string(), value.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
BITÁCORA SEMANAL
Cliente: Acme Tienda
Periodo: 01/07/2025 - 07/07/2025
Gasto: 1.234,56 €
ROAS: 3,2
Responsable: Laura

## Acciones realizadas
- Pausado el anuncio \"Ad Uno\"
* Subido presupuesto 20%
Nota libre dentro de la sección
## Próximos pasos:
1. Probar nuevo público
texto suelto
";

    #[test]
    fn test_parse_full_report() {
        let report = parse_bitacora_report(SAMPLE);

        assert_eq!(report.title.as_deref(), Some("BITÁCORA SEMANAL"));
        assert_eq!(report.client_name.as_deref(), Some("Acme Tienda"));
        assert_eq!(report.period_start.as_deref(), Some("2025-07-01"));
        assert_eq!(report.period_end.as_deref(), Some("2025-07-07"));
        assert!((report.metrics["Gasto"] - 1234.56).abs() < 1e-9);
        assert!((report.metrics["ROAS"] - 3.2).abs() < 1e-9);
        assert_eq!(report.fields["Responsable"], "Laura");

        assert_eq!(report.sections.len(), 2);
        assert_eq!(report.sections[0].title, "Acciones realizadas");
        assert_eq!(
            report.sections[0].entries,
            vec![
                "Pausado el anuncio \"Ad Uno\"",
                "Subido presupuesto 20%",
                "Nota libre dentro de la sección"
            ]
        );
        assert_eq!(report.sections[1].title, "Próximos pasos");
        assert_eq!(report.sections[1].entries, vec!["Probar nuevo público", "texto suelto"]);
        assert!(report.unparsed_lines.is_empty());
    }

    #[test]
    fn test_unrecognised_lines_are_kept() {
        let report = parse_bitacora_report("hola\nPeriodo: la semana pasada\nObservaciones:\n");
        assert_eq!(
            report.unparsed_lines,
            vec!["hola", "Periodo: la semana pasada", "Observaciones:"]
        );
        assert!(report.period_start.is_none());
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse_bitacora_report(""), BitacoraReport::default());
    }
}
