use super::{HeatmapCell, SinkError, StateGate, StreamPoint, VerdictSink};
use crate::domain::MatchVerdict;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Streaming endpoint settings. Channel ids are provisioned out of band and
/// configured, never computed by the engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSettings {
    pub base_url: String,
    pub channel_id: String,
    #[serde(default = "default_min_write_interval_ms")]
    pub min_write_interval_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl StreamSettings {
    pub fn min_write_interval(&self) -> Duration {
        Duration::from_millis(self.min_write_interval_ms)
    }
}

fn default_min_write_interval_ms() -> u64 {
    80
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
enum StreamFrame<'a> {
    Point(&'a StreamPoint),
    Cell(&'a HeatmapCell),
    KeepAlive,
}

/// HTTP client for the live-updating chart: JSON frames posted to one
/// pre-provisioned channel. Transport failures surface as
/// [`SinkError::Stream`]; callers treat the channel as best effort.
pub struct StreamSink {
    gate: StateGate,
    client: reqwest::blocking::Client,
    url: String,
}

impl StreamSink {
    pub fn connect(settings: &StreamSettings) -> Result<Self, SinkError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|error| SinkError::Stream(error.to_string()))?;
        let url = format!(
            "{}/streams/{}",
            settings.base_url.trim_end_matches('/'),
            settings.channel_id
        );
        Ok(Self {
            gate: StateGate::new(),
            client,
            url,
        })
    }

    fn post(&self, frame: &StreamFrame<'_>) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.url)
            .json(frame)
            .send()
            .map_err(|error| SinkError::Stream(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Stream(format!(
                "channel rejected frame with status {status}"
            )));
        }
        Ok(())
    }
}

impl VerdictSink for StreamSink {
    fn open(&mut self) -> Result<(), SinkError> {
        self.gate.open()?;
        debug!(url = %self.url, "stream channel opened");
        Ok(())
    }

    fn write_verdict(&mut self, verdict: &MatchVerdict) -> Result<(), SinkError> {
        self.write_point(&StreamPoint::from_verdict(verdict))
    }

    fn write_point(&mut self, point: &StreamPoint) -> Result<(), SinkError> {
        self.gate.writable()?;
        self.post(&StreamFrame::Point(point))
    }

    fn write_cell(&mut self, cell: &HeatmapCell) -> Result<(), SinkError> {
        self.gate.writable()?;
        self.post(&StreamFrame::Cell(cell))
    }

    fn keep_alive(&mut self) -> Result<(), SinkError> {
        self.gate.writable()?;
        self.post(&StreamFrame::KeepAlive)
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.gate.close()?;
        debug!(url = %self.url, "stream channel closed");
        Ok(())
    }
}
