//! Reads spreadsheet exports (CSV, XLSX, XLS, ODS) from raw bytes into a
//! header row of canonical field keys plus typed data rows.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use encoding_rs::WINDOWS_1252;
use std::collections::HashMap;
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;
use utils::{excel_serial_to_date, header_index, map_headers, RawValue};

/// Header rows are searched for within this many leading rows.
const HEADER_SCAN_ROWS: usize = 20;

static EMPTY: RawValue = RawValue::Empty;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("file is empty")]
    Empty,

    #[error("cannot read workbook: {0}")]
    Workbook(String),

    #[error("cannot read delimited text: {0}")]
    Csv(#[from] csv::Error),

    #[error("no header row found")]
    NoHeader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Delimited,
    Workbook,
}

/// A parsed sheet: original header text, mapped keys, and data rows.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub sheet: Option<String>,
    pub raw_headers: Vec<String>,
    pub keys: Vec<String>,
    pub rows: Vec<Vec<RawValue>>,
    index: HashMap<String, usize>,
}

impl Table {
    fn new(sheet: Option<String>, raw_headers: Vec<String>, rows: Vec<Vec<RawValue>>) -> Self {
        let keys = map_headers(&raw_headers);
        let index = header_index(&keys);
        Self {
            sheet,
            raw_headers,
            keys,
            rows,
            index,
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn column(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Cell under `key` in `row`, or an empty cell if either is missing.
    pub fn cell<'a>(&self, row: &'a [RawValue], key: &str) -> &'a RawValue {
        self.column(key)
            .and_then(|idx| row.get(idx))
            .unwrap_or(&EMPTY)
    }

    /// Trimmed text under `key`, `None` when blank.
    pub fn text(&self, row: &[RawValue], key: &str) -> Option<String> {
        self.cell(row, key).as_text()
    }
}

pub fn detect_format(bytes: &[u8]) -> SourceFormat {
    const ZIP: &[u8] = b"PK\x03\x04";
    const OLE: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];
    if bytes.starts_with(ZIP) || bytes.starts_with(OLE) {
        SourceFormat::Workbook
    } else {
        SourceFormat::Delimited
    }
}

/// Reads the first sheet (or the delimited text) whose header row maps to
/// every key in `required`. Falls back to the first non-empty row when no
/// row satisfies `required`.
pub fn read_table(bytes: &[u8], required: &[&str]) -> Result<Table, TableError> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(TableError::Empty);
    }

    match detect_format(bytes) {
        SourceFormat::Workbook => read_workbook(bytes, required),
        SourceFormat::Delimited => read_delimited(bytes, required),
    }
}

fn read_workbook(bytes: &[u8], required: &[&str]) -> Result<Table, TableError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| TableError::Workbook(e.to_string()))?;

    let mut fallback: Option<Table> = None;

    for sheet_name in workbook.sheet_names().to_vec() {
        let range = match workbook.worksheet_range(&sheet_name) {
            Ok(r) => r,
            Err(e) => {
                debug!(sheet = %sheet_name, error = %e, "skipping unreadable sheet");
                continue;
            }
        };

        let rows: Vec<Vec<RawValue>> = range
            .rows()
            .map(|row| row.iter().map(cell_value).collect())
            .collect();

        if let Some(table) = split_header(Some(sheet_name.clone()), rows, required) {
            if required.iter().all(|k| table.has(k)) {
                return Ok(table);
            }
            fallback.get_or_insert(table);
        }
    }

    fallback.ok_or(TableError::NoHeader)
}

fn cell_value(cell: &Data) -> RawValue {
    match cell {
        Data::Empty | Data::Error(_) => RawValue::Empty,
        Data::Int(i) => RawValue::Number(*i as f64),
        Data::Float(f) => RawValue::Number(*f),
        Data::Bool(b) => RawValue::Bool(*b),
        Data::String(s) => RawValue::Text(s.clone()),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(RawValue::Date)
            .unwrap_or(RawValue::Empty),
        Data::DateTimeIso(s) | Data::DurationIso(s) => RawValue::Text(s.clone()),
    }
}

fn read_delimited(bytes: &[u8], required: &[&str]) -> Result<Table, TableError> {
    let text = decode_text(bytes);
    let delimiter = sniff_delimiter(&text);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.trim().is_empty() {
                        RawValue::Empty
                    } else {
                        RawValue::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }

    let table = split_header(None, rows, required).ok_or(TableError::NoHeader)?;
    Ok(table)
}

/// UTF-8 (BOM stripped) when valid, otherwise Windows-1252, which is what
/// spreadsheet tools emit for Spanish-locale CSV.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Picks `;`, `,` or tab by frequency on the first non-empty line.
fn sniff_delimiter(text: &str) -> u8 {
    let first = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let candidates = [b';', b',', b'\t'];
    candidates
        .iter()
        .copied()
        .max_by_key(|d| first.bytes().filter(|b| b == d).count())
        .filter(|d| first.as_bytes().contains(d))
        .unwrap_or(b',')
}

fn split_header(
    sheet: Option<String>,
    mut rows: Vec<Vec<RawValue>>,
    required: &[&str],
) -> Option<Table> {
    rows.retain(|r| r.iter().any(|c| !c.is_empty()));
    if rows.is_empty() {
        return None;
    }

    let header_texts = |row: &[RawValue]| -> Vec<String> {
        row.iter().map(|c| c.as_text().unwrap_or_default()).collect()
    };

    let header_idx = rows
        .iter()
        .take(HEADER_SCAN_ROWS)
        .position(|row| {
            let keys = map_headers(&header_texts(row));
            required.iter().all(|k| keys.iter().any(|key| key == k))
        })
        .unwrap_or(0);

    let raw_headers = header_texts(&rows[header_idx]);
    let data = rows.split_off(header_idx + 1);
    debug!(
        header_row = header_idx,
        columns = raw_headers.len(),
        rows = data.len(),
        "table header located"
    );

    Some(Table::new(sheet, raw_headers, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use utils::field;

    #[test]
    fn test_semicolon_csv_with_preamble() {
        let csv = "Informe de anuncios;;\n\
                   Día;Nombre del anuncio;Importe gastado (EUR)\n\
                   31/07/2025;Ad Uno;1.234,56\n\
                   ;;\n\
                   01/08/2025;Ad Dos;10\n";
        let table = read_table(csv.as_bytes(), &[field::DATE, field::AD_NAME]).unwrap();

        assert_eq!(table.keys, vec!["date", "ad_name", "spend"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.text(&table.rows[0], field::AD_NAME).as_deref(), Some("Ad Uno"));
        assert_eq!(table.cell(&table.rows[0], field::SPEND), &RawValue::Text("1.234,56".into()));
        assert_eq!(table.cell(&table.rows[0], "missing"), &RawValue::Empty);
    }

    #[test]
    fn test_comma_csv_with_bom_and_quotes() {
        let csv = "\u{feff}Ad name,Account name,Image URL\n\"Ad, with comma\",Acme,https://x/img.png\n";
        let table = read_table(csv.as_bytes(), &[field::AD_NAME]).unwrap();
        assert_eq!(table.keys, vec!["ad_name", "account_name", "image_url"]);
        assert_eq!(table.text(&table.rows[0], field::AD_NAME).as_deref(), Some("Ad, with comma"));
    }

    #[test]
    fn test_windows_1252_fallback() {
        // "Día;Campaña" in Windows-1252
        let bytes = b"D\xeda;Campa\xf1a\n01/07/2025;x\n";
        assert_eq!(decode_text(bytes).lines().next(), Some("Día;Campaña"));
        let table = read_table(bytes, &[field::DATE]).unwrap();
        assert_eq!(table.keys[0], "date");
        assert_eq!(table.keys[1], "campaign_name");
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(read_table(b"", &[]), Err(TableError::Empty)));
        assert!(matches!(read_table(b"  \n ", &[]), Err(TableError::Empty)));
    }

    #[test]
    fn test_garbage_workbook_is_error() {
        let bytes = b"PK\x03\x04not really a zip";
        assert!(matches!(read_table(bytes, &[]), Err(TableError::Workbook(_))));
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(b"PK\x03\x04...."), SourceFormat::Workbook);
        assert_eq!(detect_format(b"a;b;c"), SourceFormat::Delimited);
    }
}
