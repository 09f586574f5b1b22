//! Output formats of the list endpoint

use crate::record::Record;
use std::collections::BTreeSet;

/// Rendering selected by the `format` query parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFormat {
    /// Records inside the usual status envelope
    Json,
    /// One JSON document per line, no envelope
    JsonFlat,
    /// Bare JSON array
    JsonArray,
    Csv { skip_header: bool },
}

impl ListFormat {
    /// `None` for an unknown format name
    pub fn parse(name: &str, skip_header: bool) -> Option<Self> {
        let format = match name.trim().to_ascii_lowercase().as_str() {
            "" | "json" => ListFormat::Json,
            "jsonflat" => ListFormat::JsonFlat,
            "jsonarray" | "jsonarr" | "jsonlist" => ListFormat::JsonArray,
            "csv" => ListFormat::Csv { skip_header },
            "csvheadless" => ListFormat::Csv { skip_header: true },
            _ => return None,
        };
        Some(format)
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ListFormat::Csv { .. } => "text/csv",
            _ => "application/json",
        }
    }

    /// Render `records`; `columns` picks and orders the CSV columns
    pub fn render(&self, records: &[Record], columns: &[String]) -> Result<Vec<u8>, serde_json::Error> {
        let body = match self {
            ListFormat::Json => {
                let mut out = b"{\"status\":\"OK\",\"result\":".to_vec();
                serde_json::to_writer(&mut out, records)?;
                out.push(b'}');
                out
            }
            ListFormat::JsonFlat => {
                let mut out = Vec::new();
                for record in records {
                    serde_json::to_writer(&mut out, record)?;
                    out.push(b'\n');
                }
                out
            }
            ListFormat::JsonArray => serde_json::to_vec(records)?,
            ListFormat::Csv { skip_header } => csv(records, columns, *skip_header).into_bytes(),
        };
        Ok(body)
    }
}

fn csv(records: &[Record], columns: &[String], skip_header: bool) -> String {
    // Without explicit columns, every field seen in any record, sorted
    let columns: Vec<String> = if columns.is_empty() {
        records
            .iter()
            .flat_map(Record::fields)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    } else {
        columns.to_vec()
    };

    let mut out = String::new();
    if !skip_header {
        write_row(&mut out, columns.iter().cloned());
    }
    for record in records {
        write_row(&mut out, columns.iter().map(|column| record.text(column)));
    }
    out
}

fn write_row(out: &mut String, cells: impl Iterator<Item = String>) {
    for (i, cell) in cells.enumerate() {
        if i > 0 {
            out.push(',');
        }
        if needs_quotes(&cell) {
            out.push('"');
            out.push_str(&cell.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(&cell);
        }
    }
    out.push('\n');
}

fn needs_quotes(cell: &str) -> bool {
    cell.starts_with([' ', '\t']) || cell.contains([',', '"', '\r', '\n'])
}
