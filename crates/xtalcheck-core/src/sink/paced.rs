use super::{HeatmapCell, SinkError, StreamPoint, VerdictSink};
use crate::domain::MatchVerdict;
use std::time::{Duration, Instant};
use tracing::trace;

/// Enforces a minimum delay between consecutive writes to the wrapped sink.
///
/// The external streaming service enforces a per-channel write-rate quota and
/// drops channels that exceed it, so pacing is proactive: every write waits
/// out the remainder of the interval since the previous write before it is
/// forwarded. Open and close are not paced.
pub struct PacedSink<S: VerdictSink> {
    inner: S,
    min_interval: Duration,
    last_write: Option<Instant>,
}

impl<S: VerdictSink> PacedSink<S> {
    pub fn new(inner: S, min_interval: Duration) -> Self {
        Self {
            inner,
            min_interval,
            last_write: None,
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn pace(&mut self) {
        if let Some(last) = self.last_write {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                trace!(wait_ms = wait.as_millis() as u64, "pacing stream write");
                std::thread::sleep(wait);
            }
        }
        self.last_write = Some(Instant::now());
    }
}

impl<S: VerdictSink> VerdictSink for PacedSink<S> {
    fn open(&mut self) -> Result<(), SinkError> {
        self.inner.open()
    }

    fn write_verdict(&mut self, verdict: &MatchVerdict) -> Result<(), SinkError> {
        self.pace();
        self.inner.write_verdict(verdict)
    }

    fn write_point(&mut self, point: &StreamPoint) -> Result<(), SinkError> {
        self.pace();
        self.inner.write_point(point)
    }

    fn write_cell(&mut self, cell: &HeatmapCell) -> Result<(), SinkError> {
        self.pace();
        self.inner.write_cell(cell)
    }

    fn keep_alive(&mut self) -> Result<(), SinkError> {
        self.pace();
        self.inner.keep_alive()
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.inner.close()
    }
}
