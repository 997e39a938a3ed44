//! Error taxonomy for the ingestion pipeline.
//!
//! Decoding, writing and reading the input each fail with their own type so
//! the ingest loop can apply its error policy per kind. [`IngestError`] is
//! what a run returns when it stops early.

use std::fmt;
use std::num::ParseIntError;

use thiserror::Error;

/// Cause reported by the storage driver.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Longest slice of an offending line kept in a [`DecodeError`] message.
const LINE_SAMPLE_LEN: usize = 200;

/// One input line could not be turned into a record.
#[derive(Debug, Error)]
#[error("cannot decode line {sample:?}")]
pub struct DecodeError {
    /// The offending line, lossily converted to UTF-8.
    pub line: String,
    sample: String,
    #[source]
    pub kind: DecodeErrorKind,
}

impl DecodeError {
    pub fn new(line: &[u8], kind: DecodeErrorKind) -> Self {
        let line = String::from_utf8_lossy(line).into_owned();
        let sample = line.chars().take(LINE_SAMPLE_LEN).collect();
        Self { line, sample, kind }
    }
}

#[derive(Debug, Error)]
pub enum DecodeErrorKind {
    #[error("invalid json")]
    Json(#[from] serde_json::Error),

    #[error("logLines is missing")]
    MissingLogLines,

    #[error("logLines {value:?} is not an integer")]
    LogLineCount {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("required field `{0}` is empty")]
    MissingKey(&'static str),
}

/// The two denormalized views every record is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    /// Keyed by event id; authoritative for existence.
    Primary,
    /// Keyed by account id, ordered by creation time; rebuildable from the primary view.
    Secondary,
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::Primary => f.write_str("primary view"),
            View::Secondary => f.write_str("secondary view"),
        }
    }
}

/// The store rejected a write or never acknowledged it.
#[derive(Debug, Error)]
#[error("{view} write failed for event {event_id}")]
pub struct WriteError {
    pub view: View,
    pub event_id: String,
    #[source]
    pub source: BoxError,
}

/// Reason an ingestion run stopped before the input was exhausted.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("line {line_no}: decode failed")]
    Decode {
        line_no: u64,
        #[source]
        source: DecodeError,
    },

    #[error("line {line_no}: write failed")]
    Write {
        line_no: u64,
        #[source]
        source: WriteError,
    },

    #[error("reading input failed after line {line_no}")]
    Source {
        line_no: u64,
        #[source]
        source: std::io::Error,
    },
}

impl IngestError {
    /// 1-based number of the line the run stopped on.
    pub fn line_no(&self) -> u64 {
        match self {
            IngestError::Decode { line_no, .. }
            | IngestError::Write { line_no, .. }
            | IngestError::Source { line_no, .. } => *line_no,
        }
    }
}
