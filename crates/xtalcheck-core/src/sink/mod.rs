//! Verdict and progress sinks.
//!
//! A sink is opened once at the start of a run, written to while the run is
//! in flight, and closed once at the end; there is no path back from closed.
//! The live stream variant must pace its writes, the external service drops
//! channels that exceed their write-rate quota.

mod log;
mod paced;
mod stream;

pub use log::LogSink;
pub use paced::PacedSink;
pub use stream::{StreamSettings, StreamSink};

use crate::domain::{MatchVerdict, VerdictKind};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One scatter point on the live monitoring chart. The fractional offset on
/// both axes spreads points of one batch apart so an operator can count them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamPoint {
    pub x: f64,
    pub y: f64,
    pub text: String,
}

impl StreamPoint {
    pub fn from_verdict(verdict: &MatchVerdict) -> Self {
        Self {
            x: verdict.primary.0 as f64,
            y: match verdict.kind {
                VerdictKind::Match => 1.0,
                VerdictKind::NoMatch | VerdictKind::Incomparable => 0.0,
            },
            text: verdict.log_line(),
        }
    }
}

/// One cell update on the audit heatmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapCell {
    pub row: usize,
    pub column: usize,
    pub value: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Idle,
    Open,
    Closed,
}

#[derive(Debug)]
pub enum SinkError {
    /// Write attempted before `open` or after `close`.
    NotOpen,
    /// `open` called twice; a new run requires a fresh sink.
    AlreadyOpen,
    /// `close` called on a sink that is not open.
    NotClosable,
    /// Transport failure on the streaming channel. Best-effort: callers log
    /// and continue, the stream is a monitoring channel, not a source of
    /// truth.
    Stream(String),
}

impl Display for SinkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotOpen => write!(f, "sink is not open"),
            Self::AlreadyOpen => write!(f, "sink is already open"),
            Self::NotClosable => write!(f, "sink is not open, cannot close"),
            Self::Stream(message) => write!(f, "stream write failed: {message}"),
        }
    }
}

impl Error for SinkError {}

pub trait VerdictSink {
    fn open(&mut self) -> Result<(), SinkError>;

    fn write_verdict(&mut self, verdict: &MatchVerdict) -> Result<(), SinkError>;

    fn write_point(&mut self, point: &StreamPoint) -> Result<(), SinkError>;

    fn write_cell(&mut self, cell: &HeatmapCell) -> Result<(), SinkError>;

    /// Heartbeat for long stretches without data, so the external service
    /// does not close an idle channel.
    fn keep_alive(&mut self) -> Result<(), SinkError>;

    fn close(&mut self) -> Result<(), SinkError>;
}

/// Shared open/close bookkeeping for sink implementations.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StateGate {
    state: SinkState,
}

impl StateGate {
    pub(crate) fn new() -> Self {
        Self {
            state: SinkState::Idle,
        }
    }

    pub(crate) fn state(&self) -> SinkState {
        self.state
    }

    pub(crate) fn open(&mut self) -> Result<(), SinkError> {
        match self.state {
            SinkState::Idle => {
                self.state = SinkState::Open;
                Ok(())
            }
            SinkState::Open | SinkState::Closed => Err(SinkError::AlreadyOpen),
        }
    }

    pub(crate) fn writable(&self) -> Result<(), SinkError> {
        match self.state {
            SinkState::Open => Ok(()),
            SinkState::Idle | SinkState::Closed => Err(SinkError::NotOpen),
        }
    }

    pub(crate) fn close(&mut self) -> Result<(), SinkError> {
        match self.state {
            SinkState::Open => {
                self.state = SinkState::Closed;
                Ok(())
            }
            SinkState::Idle | SinkState::Closed => Err(SinkError::NotClosable),
        }
    }
}

/// Fan-out to two sinks, log first so the durable record is written before
/// the best-effort stream.
pub struct TeeSink<A: VerdictSink, B: VerdictSink> {
    first: A,
    second: B,
}

impl<A: VerdictSink, B: VerdictSink> TeeSink<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: VerdictSink, B: VerdictSink> VerdictSink for TeeSink<A, B> {
    fn open(&mut self) -> Result<(), SinkError> {
        self.first.open()?;
        self.second.open()
    }

    fn write_verdict(&mut self, verdict: &MatchVerdict) -> Result<(), SinkError> {
        self.first.write_verdict(verdict)?;
        self.second.write_verdict(verdict)
    }

    fn write_point(&mut self, point: &StreamPoint) -> Result<(), SinkError> {
        self.first.write_point(point)?;
        self.second.write_point(point)
    }

    fn write_cell(&mut self, cell: &HeatmapCell) -> Result<(), SinkError> {
        self.first.write_cell(cell)?;
        self.second.write_cell(cell)
    }

    fn keep_alive(&mut self) -> Result<(), SinkError> {
        self.first.keep_alive()?;
        self.second.keep_alive()
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.first.close()?;
        self.second.close()
    }
}
