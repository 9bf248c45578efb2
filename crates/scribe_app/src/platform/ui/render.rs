use scribe_core::{JobView, Phase, TerminalEvent, TerminalOutcome};
use scribe_engine::{
    ArtifactEntry, HealthReport, MetricsReport, SentimentReport, TfidfMetadata, TfidfRow,
};
use serde_json::Value;

use super::constants::*;
use crate::platform::persistence::HistoryEntry;

/// One line for the job panel: a bar while there is progress to show, the
/// status text otherwise.
pub fn progress_line(view: &JobView) -> String {
    if !view.show_progress {
        return view.status_line.clone();
    }
    let percent = usize::from(view.progress_percent.min(100));
    let filled = percent * PROGRESS_BAR_WIDTH / 100;
    let mut line = format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        "-".repeat(PROGRESS_BAR_WIDTH - filled),
        percent
    );
    if !view.status_line.is_empty() {
        line.push(' ');
        line.push_str(&view.status_line);
    }
    if view.phase == Phase::Processing {
        line.push_str(&format!(" ({}s)", view.elapsed_secs));
    }
    line
}

pub fn terminal_summary(event: &TerminalEvent) -> String {
    let job = event
        .job_id
        .as_ref()
        .map(|id| format!("job {id}"))
        .unwrap_or_else(|| "upload".to_string());
    match &event.outcome {
        TerminalOutcome::Completed(result) => match &result.saved_as {
            Some(saved_as) => format!("Transcription of {job} completed (server file {saved_as})"),
            None => format!("Transcription of {job} completed"),
        },
        TerminalOutcome::Failed(message) => format!("Transcription of {job} failed: {message}"),
        TerminalOutcome::TimedOut(message) => format!("{job}: {message}"),
        TerminalOutcome::Cancelled => format!("Transcription of {job} cancelled"),
    }
}

/// TF-IDF matrix with one `Op.N` row per answer and weights to 3 decimals.
/// Columns follow the first row.
pub fn tfidf_table(rows: &[TfidfRow]) -> String {
    let Some(first) = rows.first() else {
        return "No data to show".to_string();
    };
    let mut header = vec!["Opinion".to_string()];
    header.extend(first.keys().cloned());

    let body: Vec<Vec<String>> = rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let mut cells = vec![format!("Op.{}", index + 1)];
            cells.extend(first.keys().map(|key| weight_cell(row.get(key))));
            cells
        })
        .collect();

    let widths: Vec<usize> = (0..header.len())
        .map(|col| {
            body.iter()
                .map(|cells| cells[col].chars().count())
                .chain(std::iter::once(header[col].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut lines = Vec::with_capacity(body.len() + 2);
    lines.push(table_row(&header, &widths));
    lines.push(
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    lines.extend(body.iter().map(|cells| table_row(cells, &widths)));
    lines.join("\n")
}

pub fn tfidf_metadata(metadata: &TfidfMetadata) -> String {
    format!(
        "Rows processed: {}\nTF-IDF features: {}\nValid texts: {}\nSaved on server: {}",
        metadata.rows, metadata.features, metadata.texts_processed, metadata.saved_path
    )
}

pub fn sentiment_summary(report: &SentimentReport) -> String {
    format!(
        "Rows analyzed: {}\nPositive: {}{}\nNegative: {}{}\nNeutral: {}{}\nSaved on server: {}",
        report.rows,
        report.positive,
        share(report.positive, report.rows),
        report.negative,
        share(report.negative, report.rows),
        report.neutral,
        share(report.neutral, report.rows),
        report.saved_path
    )
}

pub fn metrics_summary(report: &MetricsReport) -> String {
    let mut lines = vec![
        format!("Samples: {}", report.samples),
        format!("Accuracy:  {:.3}", report.accuracy),
        format!("Precision: {:.3}", report.precision),
        format!("Recall:    {:.3}", report.recall),
        format!("F1:        {:.3}", report.f1),
        "Confusion matrix (rows true, columns predicted):".to_string(),
    ];
    let width = report
        .confusion_matrix
        .iter()
        .flatten()
        .map(|count| count.to_string().len())
        .max()
        .unwrap_or(1);
    for row in &report.confusion_matrix {
        let cells: Vec<String> = row.iter().map(|count| format!("{count:>width$}")).collect();
        lines.push(format!("  {}", cells.join(" ")));
    }
    lines.join("\n")
}

pub fn health_summary(report: &HealthReport) -> String {
    format!(
        "Server: {}\nspaCy: {}\nWhisper: {}\nActive jobs: {}",
        if report.is_operational() { "operational" } else { "error" },
        if report.spacy_loaded { "loaded" } else { "not available" },
        if report.whisper_ready() { "available" } else { "not configured" },
        report.active_jobs
    )
}

pub fn artifact_listing(entries: &[ArtifactEntry]) -> String {
    if entries.is_empty() {
        return "No files on the server".to_string();
    }
    entries
        .iter()
        .map(|entry| {
            format!(
                "{}  {}  {}",
                entry.name,
                format_file_size(entry.size_bytes),
                entry.modified
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn history_listing(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No transcripts saved yet".to_string();
    }
    entries
        .iter()
        .map(|entry| {
            format!(
                "{}  {}  {} -> {}",
                entry.completed_at, entry.job_id, entry.source, entry.local_file
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `0 Bytes`, `512 Bytes`, `1.5 KB`, `2 MB`: two decimals at most, trailing
/// zeros dropped.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut unit = 0;
    let mut scaled = bytes as f64;
    while scaled >= 1024.0 && unit < UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }
    let rounded = (scaled * 100.0).round() / 100.0;
    let text = format!("{rounded:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{text} {}", UNITS[unit])
}

fn weight_cell(value: Option<&Value>) -> String {
    let number = match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(weight) => format!("{weight:.prec$}", prec = TABLE_DECIMALS),
        None => "-".to_string(),
    }
}

fn table_row(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_string()
}

fn share(part: u64, total: u64) -> String {
    if total == 0 {
        return String::new();
    }
    format!(" ({:.1}%)", part as f64 * 100.0 / total as f64)
}
