//! Ingestion loop: drains NDJSON input one line at a time through
//! decode, map and dual write.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::columns::{Clock, SystemClock, ViewRows};
use crate::coordinator::DualWriter;
use crate::decode::{decode, is_blank};
use crate::error::IngestError;
use crate::store::ViewStore;

/// What to do with a line that fails to decode or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum ErrorPolicy {
    /// Stop the run on the first failed line. Whitespace-only lines are
    /// skipped under either policy and never count as failures.
    #[default]
    Abort,
    /// Log the failure, count it and move on. Input read errors still stop the run.
    Skip,
}

impl FromStr for ErrorPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            other => anyhow::bail!("unknown error policy {other:?} (expected abort or skip)"),
        }
    }
}

impl TryFrom<String> for ErrorPolicy {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => f.write_str("abort"),
            Self::Skip => f.write_str("skip"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Lines read, blank ones included.
    pub lines: u64,
    /// Records written to both views.
    pub written: u64,
    /// Lines dropped under [`ErrorPolicy::Skip`].
    pub skipped: u64,
    pub blank: u64,
    pub elapsed: Duration,
}

impl IngestStats {
    pub fn records_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.written as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

pub struct Ingestor<S, C = SystemClock> {
    writer: DualWriter<S>,
    clock: C,
    policy: ErrorPolicy,
}

impl<S: ViewStore> Ingestor<S, SystemClock> {
    pub fn new(store: S, policy: ErrorPolicy) -> Self {
        Self::with_clock(store, SystemClock, policy)
    }
}

impl<S: ViewStore, C: Clock> Ingestor<S, C> {
    pub fn with_clock(store: S, clock: C, policy: ErrorPolicy) -> Self {
        Self {
            writer: DualWriter::new(store),
            clock,
            policy,
        }
    }

    pub fn store(&self) -> &S {
        self.writer.store()
    }

    /// Drain `reader` until EOF or until a line fails under [`ErrorPolicy::Abort`].
    ///
    /// Records written before a failure stay written.
    pub async fn run<R: AsyncBufRead + Unpin>(&self, mut reader: R) -> Result<IngestStats, IngestError> {
        let started = Instant::now();
        let mut stats = IngestStats::default();
        let mut buf = Vec::with_capacity(4096);

        info!(
            policy = %self.policy,
            consistency = %self.writer.consistency(),
            "ingest: starting"
        );

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .await
                .map_err(|source| IngestError::Source {
                    line_no: stats.lines,
                    source,
                })?;
            if read == 0 {
                break;
            }
            stats.lines += 1;
            let line_no = stats.lines;

            if is_blank(&buf) {
                stats.blank += 1;
                continue;
            }

            match self.ingest_line(line_no, &buf).await {
                Ok(()) => stats.written += 1,
                Err(err) if self.policy == ErrorPolicy::Skip => {
                    warn!(line_no, "ingest: skipping line: {:#}", anyhow::Error::new(err));
                    stats.skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }

        stats.elapsed = started.elapsed();
        info!(
            lines = stats.lines,
            written = stats.written,
            skipped = stats.skipped,
            blank = stats.blank,
            "ingest: input exhausted, {:.2} records/s",
            stats.records_per_second()
        );
        Ok(stats)
    }

    /// Decode, stamp, map and write one line. The clock is read once so both
    /// views share the same `created_at`.
    pub async fn ingest_line(&self, line_no: u64, line: &[u8]) -> Result<(), IngestError> {
        let record = decode(line).map_err(|source| IngestError::Decode { line_no, source })?;
        let created_at = self.clock.now_epoch_secs();
        let rows = ViewRows::from_record(&record, created_at);
        self.writer
            .write(&rows)
            .await
            .map_err(|source| IngestError::Write { line_no, source })
    }
}

/// Open the configured input; `-` reads stdin.
pub async fn open_input(path: &Path) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    if path == Path::new("-") {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(path)
        .await
        .with_context(|| format!("opening input {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}
