use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::{Local, Utc};
use scribe_core::{JobView, TerminalEvent, TerminalOutcome};
use scribe_engine::{
    export_tfidf_csv, sanitize_filename, save_chart_png, ArtifactKind, AtomicFileWriter,
    EventReceivers, FailureKind, HttpClient, JobClient, Upload, WatchObserver,
};
use scribe_logging::{scribe_info, scribe_warn};

use super::cli::{self, Command, USAGE};
use super::config::AppConfig;
use super::logging;
use super::persistence::{append_history, load_history, save_transcript, HistoryEntry};
use super::ui::constants::{CHART_METRICS, CHART_SENTIMENT, RENDER_INTERVAL_MS};
use super::ui::render;

const EXIT_INTERRUPTED: u8 = 130;

pub async fn run_app() -> anyhow::Result<ExitCode> {
    let command = cli::parse_args(std::env::args().skip(1))
        .map_err(|err| anyhow::anyhow!("{err}\n\n{USAGE}"))?;
    if command == Command::Help {
        println!("{USAGE}");
        return Ok(ExitCode::SUCCESS);
    }

    let config = AppConfig::load()?;
    logging::initialize(config.log_destination);
    scribe_info!("Running {:?} against {}", command, config.server_url);

    let api = HttpClient::new(config.api_settings())?;
    match command {
        Command::Transcribe { path } => transcribe(&config, api, &path).await,
        Command::Tfidf { path, export } => tfidf(&config, &api, &path, export).await,
        Command::Sentiment { path } => sentiment(&config, &api, &path).await,
        Command::Metrics { path } => metrics(&config, &api, &path).await,
        Command::Files => list(&api, ArtifactKind::Transcript).await,
        Command::SentimentFiles => list(&api, ArtifactKind::Sentiment).await,
        Command::Download { name } => download(&config, &api, ArtifactKind::Transcript, &name).await,
        Command::DownloadSentiment { name } => {
            download(&config, &api, ArtifactKind::Sentiment, &name).await
        }
        Command::Health => health(&api).await,
        Command::History => {
            println!("{}", render::history_listing(&load_history(&config.output_dir)));
            Ok(ExitCode::SUCCESS)
        }
        Command::Help => {
            println!("{USAGE}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn transcribe(config: &AppConfig, api: HttpClient, path: &Path) -> anyhow::Result<ExitCode> {
    let upload = Upload::from_path(path).await?;
    let source = upload.file_name().to_string();
    let (observer, events) = WatchObserver::new();
    let client = JobClient::new(Arc::new(api), Arc::new(observer), config.poll_policy());

    println!("Uploading {source}...");
    let submitted = tokio::select! {
        submitted = client.submit(upload) => submitted,
        _ = tokio::signal::ctrl_c() => {
            client.cancel();
            println!("Cancelled");
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
    };
    let handle = match submitted {
        Ok(handle) => handle,
        Err(err) if err.kind == FailureKind::Superseded => {
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
        Err(err) => bail!("upload of {source} failed: {}", err.message),
    };
    scribe_info!("Waiting for job {}", handle.job_id());

    let event = follow_job(&client, events).await?;
    println!();
    println!("{}", render::terminal_summary(&event));

    match event.outcome {
        TerminalOutcome::Completed(result) => {
            let job_id = handle.job_id();
            match save_transcript(&config.output_dir, job_id, &result) {
                Ok(saved) => {
                    let local_file = saved
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    append_history(
                        &config.output_dir,
                        HistoryEntry {
                            job_id: job_id.to_string(),
                            source,
                            saved_as: result.saved_as.clone(),
                            local_file,
                            completed_at: Utc::now().to_rfc3339(),
                        },
                    );
                    println!("Saved to {}", saved.display());
                }
                Err(err) => scribe_warn!("Could not save transcript locally: {}", err),
            }
            println!();
            println!("{}", result.text);
            Ok(ExitCode::SUCCESS)
        }
        TerminalOutcome::Cancelled => Ok(ExitCode::from(EXIT_INTERRUPTED)),
        TerminalOutcome::Failed(_) | TerminalOutcome::TimedOut(_) => Ok(ExitCode::FAILURE),
    }
}

/// Redraws the progress line on a fixed tick until the job ends. Ctrl-C
/// cancels the job; the loop then ends on the cancellation event.
async fn follow_job(client: &JobClient, mut events: EventReceivers) -> anyhow::Result<TerminalEvent> {
    let mut ticker = tokio::time::interval(Duration::from_millis(RENDER_INTERVAL_MS));
    draw(&client.view());

    let event = loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(view) = client.take_view_if_dirty() {
                    draw(&view);
                }
            }
            changed = events.terminal.changed() => {
                changed.context("job events stopped")?;
                let latest = events.terminal.borrow_and_update().clone();
                if let Some(event) = latest {
                    break event;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                scribe_warn!("Interrupted; cancelling job");
                client.cancel();
            }
        }
    };

    draw(&client.view());
    Ok(event)
}

fn draw(view: &JobView) {
    let mut stdout = std::io::stdout().lock();
    let _ = write!(stdout, "\r{:<100}", render::progress_line(view));
    let _ = stdout.flush();
}

async fn tfidf(
    config: &AppConfig,
    api: &HttpClient,
    path: &Path,
    export: bool,
) -> anyhow::Result<ExitCode> {
    let upload = Upload::from_path(path).await?;
    let report = api.process_tfidf(&upload).await?;
    println!("{}", render::tfidf_table(&report.data));
    if let Some(metadata) = &report.metadata {
        println!();
        println!("{}", render::tfidf_metadata(metadata));
    }
    if export {
        let date = Local::now().format("%Y-%m-%d").to_string();
        let exported = export_tfidf_csv(&config.output_dir, &report.data, &date)?;
        println!("Exported {}", exported.display());
    }
    Ok(ExitCode::SUCCESS)
}

async fn sentiment(config: &AppConfig, api: &HttpClient, path: &Path) -> anyhow::Result<ExitCode> {
    let upload = Upload::from_path(path).await?;
    let report = api.analyze_sentiment(&upload).await?;
    println!("{}", render::sentiment_summary(&report));
    if let Some(chart) = &report.chart_png_b64 {
        let saved = save_chart_png(&config.output_dir, CHART_SENTIMENT, chart)?;
        println!("Chart saved to {}", saved.display());
    }
    Ok(ExitCode::SUCCESS)
}

async fn metrics(config: &AppConfig, api: &HttpClient, path: &Path) -> anyhow::Result<ExitCode> {
    let upload = Upload::from_path(path).await?;
    let report = api.evaluate_metrics(&upload).await?;
    println!("{}", render::metrics_summary(&report));
    if let Some(chart) = &report.chart_png_b64 {
        let saved = save_chart_png(&config.output_dir, CHART_METRICS, chart)?;
        println!("Chart saved to {}", saved.display());
    }
    Ok(ExitCode::SUCCESS)
}

async fn list(api: &HttpClient, kind: ArtifactKind) -> anyhow::Result<ExitCode> {
    let entries = api.list_artifacts(kind).await?;
    println!("{}", render::artifact_listing(&entries));
    Ok(ExitCode::SUCCESS)
}

async fn download(
    config: &AppConfig,
    api: &HttpClient,
    kind: ArtifactKind,
    name: &str,
) -> anyhow::Result<ExitCode> {
    let bytes = api.download_artifact(kind, name).await?;
    let local_name = sanitize_filename(name, "download");
    let saved = AtomicFileWriter::new(config.output_dir.clone())
        .write(&local_name, bytes)
        .with_context(|| format!("saving {local_name}"))?;
    println!("Downloaded {} to {}", name, saved.display());
    Ok(ExitCode::SUCCESS)
}

async fn health(api: &HttpClient) -> anyhow::Result<ExitCode> {
    let report = api.health().await?;
    println!("{}", render::health_summary(&report));
    if report.is_operational() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
