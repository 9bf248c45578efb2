//! Synchronous CSV analysis calls: one upload, one JSON report.
use serde::Deserialize;

use crate::{ApiError, HttpClient, Upload};

/// One TF-IDF row, feature name to weight, in the server's column order.
pub type TfidfRow = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TfidfReport {
    #[serde(default)]
    pub data: Vec<TfidfRow>,
    #[serde(default)]
    pub metadata: Option<TfidfMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TfidfMetadata {
    #[serde(rename = "filas")]
    pub rows: u64,
    #[serde(rename = "columnas")]
    pub features: u64,
    #[serde(rename = "textos_procesados")]
    pub texts_processed: u64,
    #[serde(rename = "archivo_guardado")]
    pub saved_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SentimentReport {
    #[serde(rename = "archivo_guardado")]
    pub saved_path: String,
    /// Bar chart of the label counts, PNG, base64.
    #[serde(rename = "grafica_b64", default)]
    pub chart_png_b64: Option<String>,
    #[serde(rename = "filas")]
    pub rows: u64,
    #[serde(rename = "positivos")]
    pub positive: u64,
    #[serde(rename = "negativos")]
    pub negative: u64,
    #[serde(rename = "neutros")]
    pub neutral: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetricsReport {
    /// Rows are true labels, columns predictions: negative, neutral, positive.
    #[serde(rename = "matriz_confusion")]
    pub confusion_matrix: Vec<Vec<u64>>,
    #[serde(rename = "grafica_b64", default)]
    pub chart_png_b64: Option<String>,
    pub accuracy: f64,
    pub recall: f64,
    pub precision: f64,
    pub f1: f64,
    /// Per-class breakdown as produced by the server.
    #[serde(default)]
    pub report: serde_json::Value,
    #[serde(rename = "n_muestras")]
    pub samples: u64,
}

impl HttpClient {
    /// Runs TF-IDF extraction over the second column of a CSV.
    pub async fn process_tfidf(&self, csv: &Upload) -> Result<TfidfReport, ApiError> {
        self.post_file(&["procesar"], "file", csv).await
    }

    /// Scores the `Respuesta` column of a CSV as positive, neutral or negative.
    pub async fn analyze_sentiment(&self, csv: &Upload) -> Result<SentimentReport, ApiError> {
        self.post_file(&["sentimientos"], "file", csv).await
    }

    /// Trains a classifier on labelled answers and reports its metrics.
    pub async fn evaluate_metrics(&self, csv: &Upload) -> Result<MetricsReport, ApiError> {
        self.post_file(&["evaluar_metricas_entrenando"], "file", csv)
            .await
    }
}
