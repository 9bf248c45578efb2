//! Scribe engine: remote API, job client driver and local output.
mod analysis;
mod api;
mod artifacts;
mod client;
mod clock;
mod export;
mod filename;
mod observer;
mod persist;
mod types;
mod wire;

pub use analysis::{MetricsReport, SentimentReport, TfidfMetadata, TfidfReport, TfidfRow};
pub use api::{ApiSettings, HttpClient, JobApi};
pub use artifacts::{ArtifactEntry, ArtifactKind, HealthReport};
pub use client::{JobClient, JobHandle};
pub use clock::{Clock, TokioClock};
pub use export::{
    export_tfidf_csv, rows_to_csv, save_chart_png, tfidf_export_filename, ExportError,
};
pub use filename::{sanitize_filename, transcript_filename};
pub use observer::{EventReceivers, JobObserver, WatchObserver};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use types::{
    ApiError, FailureKind, PollError, SubmitError, Upload, MAX_UPLOAD_BYTES,
    SUPPORTED_AUDIO_EXTENSIONS,
};
