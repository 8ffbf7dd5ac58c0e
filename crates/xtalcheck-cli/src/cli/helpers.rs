use super::CliError;
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use xtalcheck_core::config::{RunConfig, RunMode};
use xtalcheck_core::domain::CheckError;
use xtalcheck_core::sink::{LogSink, PacedSink, StreamSink, TeeSink, VerdictSink};
use xtalcheck_core::store::JsonStore;

pub(super) fn load_config(path: &Path) -> Result<RunConfig, CliError> {
    RunConfig::from_path(path).map_err(CliError::from)
}

pub(super) fn open_store(config: &RunConfig, store_override: Option<PathBuf>) -> JsonStore {
    let root = store_override.unwrap_or_else(|| config.store_root.clone());
    debug!(root = %root.display(), "opening record store");
    JsonStore::open(root)
}

/// Builds the sink stack for one run: always the log sink, plus a paced
/// stream sink when this mode has a configured channel. A stream that cannot
/// be set up is fatal here, before any work starts; once a run is in flight
/// stream failures only degrade to warnings.
pub(super) fn build_sink(
    config: &RunConfig,
    mode: RunMode,
    no_stream: bool,
) -> Result<Box<dyn VerdictSink>, CliError> {
    if no_stream {
        return Ok(Box::new(LogSink::new()));
    }
    let Some(settings) = config
        .stream
        .as_ref()
        .and_then(|stream| stream.settings_for(mode))
    else {
        return Ok(Box::new(LogSink::new()));
    };

    let stream = StreamSink::connect(&settings).map_err(|error| {
        CliError::Check(CheckError::sink(
            "SINK.CONNECT",
            format!("cannot set up '{}' stream: {error}", mode.as_str()),
        ))
    })?;
    let paced = PacedSink::new(stream, settings.min_write_interval());
    Ok(Box::new(TeeSink::new(LogSink::new(), paced)))
}

pub(super) fn write_report(
    path: &Path,
    mode: RunMode,
    counts: serde_json::Value,
) -> Result<(), CliError> {
    #[derive(serde::Serialize)]
    #[serde(rename_all = "camelCase")]
    struct RunReport<'a> {
        mode: &'a str,
        #[serde(flatten)]
        counts: serde_json::Value,
    }

    let report = RunReport {
        mode: mode.as_str(),
        counts,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating report directory for {}", path.display()))?;
    }
    let rendered = serde_json::to_string_pretty(&report)
        .context("serializing run report")?;
    fs::write(path, rendered)
        .with_context(|| format!("writing report {}", path.display()))?;
    Ok(())
}
