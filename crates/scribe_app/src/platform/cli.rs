use std::path::PathBuf;

use anyhow::{anyhow, bail};

pub const USAGE: &str = "\
Usage: scribe <command> [args]

Commands:
  transcribe <audio>           upload audio and wait for the transcript
  tfidf <csv> [--export]       TF-IDF matrix of the answers column
  sentiment <csv>              sentiment counts and chart
  metrics <csv>                train on labelled answers and report metrics
  files                        list transcripts stored on the server
  sentiment-files              list sentiment results stored on the server
  download <name>              download a transcript
  download-sentiment <name>    download a sentiment result
  health                       server status
  history                      transcripts saved by this client
  help                         this text";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Transcribe { path: PathBuf },
    Tfidf { path: PathBuf, export: bool },
    Sentiment { path: PathBuf },
    Metrics { path: PathBuf },
    Files,
    SentimentFiles,
    Download { name: String },
    DownloadSentiment { name: String },
    Health,
    History,
    Help,
}

/// Parses the arguments after the program name.
pub fn parse_args<I>(args: I) -> anyhow::Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let Some(name) = args.next() else {
        return Ok(Command::Help);
    };
    let rest: Vec<String> = args.collect();

    let command = match name.as_str() {
        "transcribe" => Command::Transcribe {
            path: single_path(&name, &rest)?,
        },
        "tfidf" => {
            let export = rest.iter().any(|arg| arg == "--export");
            let positional: Vec<String> = rest.into_iter().filter(|arg| arg != "--export").collect();
            Command::Tfidf {
                path: single_path(&name, &positional)?,
                export,
            }
        }
        "sentiment" => Command::Sentiment {
            path: single_path(&name, &rest)?,
        },
        "metrics" => Command::Metrics {
            path: single_path(&name, &rest)?,
        },
        "files" => no_args(&name, &rest, Command::Files)?,
        "sentiment-files" => no_args(&name, &rest, Command::SentimentFiles)?,
        "download" => Command::Download {
            name: single(&name, &rest)?,
        },
        "download-sentiment" => Command::DownloadSentiment {
            name: single(&name, &rest)?,
        },
        "health" => no_args(&name, &rest, Command::Health)?,
        "history" => no_args(&name, &rest, Command::History)?,
        "help" | "-h" | "--help" => Command::Help,
        other => bail!("unknown command `{other}`"),
    };
    Ok(command)
}

fn single(command: &str, rest: &[String]) -> anyhow::Result<String> {
    match rest {
        [value] if !value.starts_with("--") => Ok(value.clone()),
        [] => Err(anyhow!("`{command}` needs one argument")),
        _ => Err(anyhow!("`{command}` takes exactly one argument")),
    }
}

fn single_path(command: &str, rest: &[String]) -> anyhow::Result<PathBuf> {
    single(command, rest).map(PathBuf::from)
}

fn no_args(command: &str, rest: &[String], parsed: Command) -> anyhow::Result<Command> {
    if rest.is_empty() {
        Ok(parsed)
    } else {
        bail!("`{command}` takes no arguments")
    }
}
