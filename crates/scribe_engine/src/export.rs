use std::path::{Path, PathBuf};

use base64::Engine as _;
use serde_json::Value;

use crate::persist::{AtomicFileWriter, PersistError};
use crate::TfidfRow;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("nothing to export")]
    NoRows,
    #[error("chart is not valid base64: {0}")]
    Chart(#[from] base64::DecodeError),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

/// `tfidf_results_{date}.csv`, `date` formatted `YYYY-MM-DD` by the caller.
pub fn tfidf_export_filename(date: &str) -> String {
    format!("tfidf_results_{date}.csv")
}

/// Renders rows as CSV. Columns come from the first row, in its key order.
pub fn rows_to_csv(rows: &[TfidfRow]) -> String {
    let Some(first) = rows.first() else {
        return String::new();
    };
    let headers: Vec<&String> = first.keys().collect();

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(
        headers
            .iter()
            .map(|header| escape_field(header))
            .collect::<Vec<_>>()
            .join(","),
    );
    for row in rows {
        let line = headers
            .iter()
            .map(|header| row.get(header.as_str()).map(cell_text).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(",");
        lines.push(line);
    }
    lines.join("\n")
}

pub fn export_tfidf_csv(dir: &Path, rows: &[TfidfRow], date: &str) -> Result<PathBuf, ExportError> {
    if rows.is_empty() {
        return Err(ExportError::NoRows);
    }
    let writer = AtomicFileWriter::new(dir.to_path_buf());
    Ok(writer.write(&tfidf_export_filename(date), rows_to_csv(rows))?)
}

/// Decodes a base64 PNG chart from the server and writes it to `dir/filename`.
pub fn save_chart_png(dir: &Path, filename: &str, chart_b64: &str) -> Result<PathBuf, ExportError> {
    let png = base64::engine::general_purpose::STANDARD.decode(chart_b64.trim())?;
    let writer = AtomicFileWriter::new(dir.to_path_buf());
    Ok(writer.write(filename, png)?)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => escape_field(text),
        other => other.to_string(),
    }
}

fn escape_field(field: &str) -> String {
    if field.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
