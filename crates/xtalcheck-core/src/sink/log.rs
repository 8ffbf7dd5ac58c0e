use super::{HeatmapCell, SinkError, StateGate, StreamPoint, VerdictSink};
use crate::domain::MatchVerdict;
use tracing::{debug, info, trace};

/// Structured-log sink: one info line per verdict in the operator-facing
/// `primary:key, secondary:key = verdict` format.
pub struct LogSink {
    gate: StateGate,
    writes: usize,
}

impl LogSink {
    pub fn new() -> Self {
        Self {
            gate: StateGate::new(),
            writes: 0,
        }
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl VerdictSink for LogSink {
    fn open(&mut self) -> Result<(), SinkError> {
        self.gate.open()?;
        debug!("log sink opened");
        Ok(())
    }

    fn write_verdict(&mut self, verdict: &MatchVerdict) -> Result<(), SinkError> {
        self.gate.writable()?;
        self.writes += 1;
        info!("{}", verdict.log_line());
        Ok(())
    }

    fn write_point(&mut self, point: &StreamPoint) -> Result<(), SinkError> {
        self.gate.writable()?;
        self.writes += 1;
        info!(x = point.x, y = point.y, "{}", point.text);
        Ok(())
    }

    fn write_cell(&mut self, cell: &HeatmapCell) -> Result<(), SinkError> {
        self.gate.writable()?;
        self.writes += 1;
        info!(
            row = cell.row,
            column = cell.column,
            value = cell.value,
            "heatmap cell update"
        );
        Ok(())
    }

    fn keep_alive(&mut self) -> Result<(), SinkError> {
        self.gate.writable()?;
        trace!("keep-alive");
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.gate.close()?;
        debug!(writes = self.writes, "log sink closed");
        Ok(())
    }
}
