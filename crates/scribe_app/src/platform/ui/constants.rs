pub const PROGRESS_BAR_WIDTH: usize = 30;
pub const TABLE_DECIMALS: usize = 3;
pub const RENDER_INTERVAL_MS: u64 = 250;
pub const CHART_SENTIMENT: &str = "sentiment_chart.png";
pub const CHART_METRICS: &str = "metrics_chart.png";
