use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use scribe_core::PollPolicy;
use scribe_engine::ApiSettings;
use serde::Deserialize;

use super::logging::LogDestination;

pub const CONFIG_FILENAME: &str = "scribe.ron";
pub const CONFIG_ENV_VAR: &str = "SCRIBE_CONFIG";
pub const SERVER_URL_ENV_VAR: &str = "SCRIBE_SERVER_URL";
pub const OUTPUT_DIR_ENV_VAR: &str = "SCRIBE_OUTPUT_DIR";
/// Largest accepted `max_upload_mb`; anything above is a typo, not a file.
pub const MAX_UPLOAD_MB_LIMIT: u64 = 4096;

/// Settings read from `scribe.ron`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server_url: String,
    pub poll_interval_ms: u64,
    pub max_duration_ms: u64,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub max_upload_mb: u64,
    pub output_dir: PathBuf,
    pub log_destination: LogDestination,
}

impl Default for AppConfig {
    fn default() -> Self {
        let api = ApiSettings::default();
        let policy = PollPolicy::default();
        Self {
            server_url: api.base_url,
            poll_interval_ms: millis(policy.interval()),
            max_duration_ms: millis(policy.max_duration()),
            connect_timeout_ms: millis(api.connect_timeout),
            request_timeout_ms: millis(api.request_timeout),
            max_upload_mb: api.max_upload_bytes / (1024 * 1024),
            output_dir: PathBuf::from("output"),
            log_destination: LogDestination::File,
        }
    }
}

impl AppConfig {
    /// Loads `$SCRIBE_CONFIG`, or `./scribe.ron` when it exists, then applies
    /// environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let explicit = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
        let path = explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILENAME));

        let mut config = match fs::read_to_string(&path) {
            Ok(text) => {
                Self::parse(&text).with_context(|| format!("invalid config {}", path.display()))?
            }
            Err(err) if err.kind() == ErrorKind::NotFound && explicit.is_none() => Self::default(),
            Err(err) => {
                return Err(err).with_context(|| format!("cannot read config {}", path.display()))
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(SERVER_URL_ENV_VAR).filter(|v| !v.trim().is_empty()) {
            self.server_url = url;
        }
        if let Some(dir) = lookup(OUTPUT_DIR_ENV_VAR).filter(|v| !v.trim().is_empty()) {
            self.output_dir = PathBuf::from(dir);
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be greater than zero");
        }
        if self.max_upload_mb == 0 || self.max_upload_mb > MAX_UPLOAD_MB_LIMIT {
            bail!("max_upload_mb must be between 1 and {MAX_UPLOAD_MB_LIMIT}");
        }
        Ok(())
    }

    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            base_url: self.server_url.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            max_upload_bytes: self.max_upload_mb.saturating_mul(1024 * 1024),
            ..ApiSettings::default()
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::default()
            .with_interval(Duration::from_millis(self.poll_interval_ms))
            .with_max_duration(Duration::from_millis(self.max_duration_ms))
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_match_library_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.poll_interval_ms, 2_000);
        assert_eq!(config.max_duration_ms, 900_000);
        assert_eq!(config.max_upload_mb, 45);
        assert_eq!(config.poll_policy(), PollPolicy::default());
        assert_eq!(
            config.api_settings().max_upload_bytes,
            scribe_engine::MAX_UPLOAD_BYTES
        );
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = AppConfig::parse(
            r#"(
                server_url: "http://transcribe.local:8080",
                poll_interval_ms: 500,
                log_destination: Both,
            )"#,
        )
        .unwrap();
        assert_eq!(config.server_url, "http://transcribe.local:8080");
        assert_eq!(config.poll_policy().interval(), Duration::from_millis(500));
        assert_eq!(config.log_destination, LogDestination::Both);
        assert_eq!(config.max_duration_ms, 900_000);
        assert_eq!(config.output_dir, PathBuf::from("output"));
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(AppConfig::parse("(poll_interval_ms: 0)").is_err());
        assert!(AppConfig::parse("(server_url: 5)").is_err());
    }

    #[test]
    fn upload_limit_is_bounded() {
        assert!(AppConfig::parse("(max_upload_mb: 0)").is_err());
        assert!(AppConfig::parse("(max_upload_mb: 18446744073709551615)").is_err());
        let config = AppConfig::parse("(max_upload_mb: 4096)").unwrap();
        assert_eq!(config.api_settings().max_upload_bytes, 4096 * 1024 * 1024);
    }

    #[test]
    fn environment_overrides_win() {
        let env: HashMap<&str, &str> = HashMap::from([
            (SERVER_URL_ENV_VAR, "http://10.0.0.2:5000"),
            (OUTPUT_DIR_ENV_VAR, "  "),
        ]);
        let mut config = AppConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.server_url, "http://10.0.0.2:5000");
        assert_eq!(config.output_dir, PathBuf::from("output"));
    }
}
