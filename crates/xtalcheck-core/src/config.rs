//! Run configuration, loaded from a single JSON document.

use crate::domain::CheckError;
use crate::matcher::MatcherConfig;
use crate::sink::StreamSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Run mode, one per CLI subcommand. Each mode streams to its own
/// pre-provisioned channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunMode {
    Crosscheck,
    Canonicals,
    Groupmembers,
    Spacegroups,
}

impl RunMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Crosscheck => "crosscheck",
            Self::Canonicals => "canonicals",
            Self::Groupmembers => "groupmembers",
            Self::Spacegroups => "spacegroups",
        }
    }
}

/// Streaming section of the run configuration. Channel ids are provisioned
/// on the external service and pasted in here; a missing channel id simply
/// disables the stream for that mode.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConfig {
    pub base_url: String,
    #[serde(default)]
    pub crosscheck_channel: Option<String>,
    #[serde(default)]
    pub canonicals_channel: Option<String>,
    #[serde(default)]
    pub groupmembers_channel: Option<String>,
    #[serde(default)]
    pub spacegroups_channel: Option<String>,
    #[serde(default = "default_min_write_interval_ms")]
    pub min_write_interval_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_min_write_interval_ms() -> u64 {
    80
}

fn default_timeout_secs() -> u64 {
    30
}

impl StreamConfig {
    /// Sink settings for one mode, or `None` when that mode has no channel.
    pub fn settings_for(&self, mode: RunMode) -> Option<StreamSettings> {
        let channel_id = match mode {
            RunMode::Crosscheck => self.crosscheck_channel.as_ref(),
            RunMode::Canonicals => self.canonicals_channel.as_ref(),
            RunMode::Groupmembers => self.groupmembers_channel.as_ref(),
            RunMode::Spacegroups => self.spacegroups_channel.as_ref(),
        }?;
        Some(StreamSettings {
            base_url: self.base_url.clone(),
            channel_id: channel_id.clone(),
            min_write_interval_ms: self.min_write_interval_ms,
            timeout_secs: self.timeout_secs,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    pub store_root: PathBuf,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub scan_limit: Option<usize>,
    #[serde(default)]
    pub cache_missing: bool,
    #[serde(default)]
    pub stream: Option<StreamConfig>,
}

impl RunConfig {
    pub fn from_path(path: &Path) -> Result<Self, CheckError> {
        let raw = std::fs::read_to_string(path).map_err(|error| {
            CheckError::input_validation(
                "CONFIG.READ",
                format!("cannot read config {}: {error}", path.display()),
            )
        })?;
        serde_json::from_str(&raw).map_err(|error| {
            CheckError::input_validation(
                "CONFIG.PARSE",
                format!("cannot parse config {}: {error}", path.display()),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{RunConfig, RunMode};
    use std::io::Write;

    #[test]
    fn minimal_config_fills_defaults() {
        let config: RunConfig = serde_json::from_str(r#"{ "storeRoot": "/var/lib/xtalcheck" }"#)
            .expect("minimal config should parse");

        assert_eq!(config.store_root.to_str(), Some("/var/lib/xtalcheck"));
        assert_eq!(config.matcher.ltol, 0.2);
        assert_eq!(config.matcher.stol, 0.3);
        assert_eq!(config.scan_limit, None);
        assert!(!config.cache_missing);
        assert!(config.stream.is_none());
    }

    #[test]
    fn stream_section_resolves_per_mode_channels() {
        let config: RunConfig = serde_json::from_str(
            r#"{
                "storeRoot": "/data",
                "stream": {
                    "baseUrl": "https://plots.example.net/api",
                    "crosscheckChannel": "xc-7781",
                    "spacegroupsChannel": "sg-7783"
                }
            }"#,
        )
        .expect("config with stream section should parse");

        let stream = config.stream.expect("stream section should be present");
        let crosscheck = stream
            .settings_for(RunMode::Crosscheck)
            .expect("crosscheck channel should resolve");
        assert_eq!(crosscheck.channel_id, "xc-7781");
        assert_eq!(crosscheck.min_write_interval_ms, 80);
        assert_eq!(crosscheck.timeout_secs, 30);
        assert!(stream.settings_for(RunMode::Canonicals).is_none());
        assert!(stream.settings_for(RunMode::Spacegroups).is_some());
    }

    #[test]
    fn config_file_errors_carry_a_usage_code() {
        let missing = RunConfig::from_path(std::path::Path::new("/nonexistent/xtalcheck.json"))
            .expect_err("missing file should fail");
        assert_eq!(missing.code(), "CONFIG.READ");
        assert_eq!(missing.exit_code(), 2);

        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("xtalcheck.json");
        let mut file = std::fs::File::create(&path).expect("config file should be created");
        file.write_all(b"{ not json")
            .expect("config file should be writable");
        let malformed = RunConfig::from_path(&path).expect_err("malformed file should fail");
        assert_eq!(malformed.code(), "CONFIG.PARSE");
        assert_eq!(malformed.exit_code(), 2);
    }
}
