//! Storage seam for the two event views.
//!
//! [`ScyllaStore`] talks CQL through one long-lived session with prepared
//! inserts. [`MemoryStore`] keeps every attempted write in memory and can be
//! told to reject writes for given events.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use async_trait::async_trait;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::statement::prepared::PreparedStatement;
use scylla::statement::Consistency;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::columns::{PrimaryRow, SecondaryRow};
use crate::config::Config;
use crate::error::{BoxError, View};

/// Column order of the events-by-id insert.
pub const PRIMARY_COLUMNS: [&str; 14] = [
    "id",
    "created_at",
    "account_id",
    "data",
    "function_arn",
    "is_cold_start",
    "is_empty",
    "is_error",
    "is_retry",
    "log_group_name",
    "log_lines",
    "log_stream_name",
    "s3bucket",
    "s3key",
];

/// Column order of the events-by-account insert.
pub const SECONDARY_COLUMNS: [&str; 14] = [
    "account_id",
    "event_id",
    "created_at",
    "data",
    "function_arn",
    "is_cold_start",
    "is_empty",
    "is_error",
    "is_retry",
    "log_group_name",
    "log_lines",
    "log_stream_name",
    "s3bucket",
    "s3key",
];

/// Replica acknowledgement required before a write counts as done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum ConsistencyLevel {
    One,
    Two,
    Three,
    #[default]
    Quorum,
    All,
    LocalQuorum,
    EachQuorum,
    LocalOne,
}

impl FromStr for ConsistencyLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let level = match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "ONE" => Self::One,
            "TWO" => Self::Two,
            "THREE" => Self::Three,
            "QUORUM" => Self::Quorum,
            "ALL" => Self::All,
            "LOCAL_QUORUM" => Self::LocalQuorum,
            "EACH_QUORUM" => Self::EachQuorum,
            "LOCAL_ONE" => Self::LocalOne,
            other => anyhow::bail!("unknown consistency level {other:?}"),
        };
        Ok(level)
    }
}

impl TryFrom<String> for ConsistencyLevel {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::One => "ONE",
            Self::Two => "TWO",
            Self::Three => "THREE",
            Self::Quorum => "QUORUM",
            Self::All => "ALL",
            Self::LocalQuorum => "LOCAL_QUORUM",
            Self::EachQuorum => "EACH_QUORUM",
            Self::LocalOne => "LOCAL_ONE",
        };
        f.write_str(name)
    }
}

impl From<ConsistencyLevel> for Consistency {
    fn from(level: ConsistencyLevel) -> Self {
        match level {
            ConsistencyLevel::One => Consistency::One,
            ConsistencyLevel::Two => Consistency::Two,
            ConsistencyLevel::Three => Consistency::Three,
            ConsistencyLevel::Quorum => Consistency::Quorum,
            ConsistencyLevel::All => Consistency::All,
            ConsistencyLevel::LocalQuorum => Consistency::LocalQuorum,
            ConsistencyLevel::EachQuorum => Consistency::EachQuorum,
            ConsistencyLevel::LocalOne => Consistency::LocalOne,
        }
    }
}

/// Writes rows into the two views. One implementation serves a whole run at a
/// single consistency level.
#[async_trait]
pub trait ViewStore: Send + Sync {
    fn consistency(&self) -> ConsistencyLevel;

    async fn write_primary(&self, row: &PrimaryRow) -> Result<(), BoxError>;

    async fn write_secondary(&self, row: &SecondaryRow) -> Result<(), BoxError>;
}

#[async_trait]
impl<T: ViewStore + ?Sized> ViewStore for Arc<T> {
    fn consistency(&self) -> ConsistencyLevel {
        (**self).consistency()
    }

    async fn write_primary(&self, row: &PrimaryRow) -> Result<(), BoxError> {
        (**self).write_primary(row).await
    }

    async fn write_secondary(&self, row: &SecondaryRow) -> Result<(), BoxError> {
        (**self).write_secondary(row).await
    }
}

pub fn primary_insert_cql(keyspace: &str, table: &str) -> String {
    insert_cql(keyspace, table, &PRIMARY_COLUMNS)
}

pub fn secondary_insert_cql(keyspace: &str, table: &str) -> String {
    insert_cql(keyspace, table, &SECONDARY_COLUMNS)
}

fn insert_cql(keyspace: &str, table: &str, columns: &[&str]) -> String {
    let markers = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {keyspace}.{table} ({}) VALUES ({markers})",
        columns.join(", ")
    )
}

/// Open the cluster session used for the whole run.
pub async fn connect(cfg: &Config) -> Result<Session> {
    let mut builder = SessionBuilder::new()
        .known_nodes(&cfg.nodes)
        .connection_timeout(cfg.connect_timeout());
    if let Some(user) = cfg.username.as_deref() {
        builder = builder.user(user, cfg.password.as_deref().unwrap_or_default());
    }
    let session = builder
        .build()
        .await
        .with_context(|| format!("connecting to {}", cfg.nodes.join(",")))?;
    info!(nodes = %cfg.nodes.join(","), "cluster session opened");
    Ok(session)
}

pub struct ScyllaStore {
    session: Session,
    primary_insert: PreparedStatement,
    secondary_insert: PreparedStatement,
    consistency: ConsistencyLevel,
}

impl ScyllaStore {
    /// Prepare both inserts at the configured consistency. Takes ownership of
    /// the session; dropping the store closes it.
    pub async fn new(session: Session, cfg: &Config) -> Result<Self> {
        let mut primary_insert = session
            .prepare(primary_insert_cql(&cfg.keyspace, &cfg.primary_table))
            .await
            .context("preparing primary view insert")?;
        let mut secondary_insert = session
            .prepare(secondary_insert_cql(&cfg.keyspace, &cfg.secondary_table))
            .await
            .context("preparing secondary view insert")?;
        primary_insert.set_consistency(cfg.consistency.into());
        secondary_insert.set_consistency(cfg.consistency.into());
        debug!(consistency = %cfg.consistency, "prepared view inserts");

        Ok(Self {
            session,
            primary_insert,
            secondary_insert,
            consistency: cfg.consistency,
        })
    }
}

#[async_trait]
impl ViewStore for ScyllaStore {
    fn consistency(&self) -> ConsistencyLevel {
        self.consistency
    }

    async fn write_primary(&self, row: &PrimaryRow) -> Result<(), BoxError> {
        self.session
            .execute_unpaged(&self.primary_insert, row)
            .await
            .map_err(|err| Box::new(err) as BoxError)?;
        Ok(())
    }

    async fn write_secondary(&self, row: &SecondaryRow) -> Result<(), BoxError> {
        self.session
            .execute_unpaged(&self.secondary_insert, row)
            .await
            .map_err(|err| Box::new(err) as BoxError)?;
        Ok(())
    }
}

/// A row handed to a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredRow {
    Primary(PrimaryRow),
    Secondary(SecondaryRow),
}

/// One attempted write, in the order it was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOp {
    pub row: StoredRow,
    pub consistency: ConsistencyLevel,
    pub accepted: bool,
}

impl WriteOp {
    pub fn view(&self) -> View {
        match self.row {
            StoredRow::Primary(_) => View::Primary,
            StoredRow::Secondary(_) => View::Secondary,
        }
    }

    pub fn event_id(&self) -> &str {
        match &self.row {
            StoredRow::Primary(row) => &row.id,
            StoredRow::Secondary(row) => &row.event_id,
        }
    }

    pub fn account_id(&self) -> &str {
        match &self.row {
            StoredRow::Primary(row) => &row.account_id,
            StoredRow::Secondary(row) => &row.account_id,
        }
    }

    pub fn created_at(&self) -> i64 {
        match &self.row {
            StoredRow::Primary(row) => row.created_at,
            StoredRow::Secondary(row) => row.created_at,
        }
    }
}

#[derive(Debug, Error)]
#[error("{view} rejected write for event {event_id}")]
pub struct RejectedWrite {
    pub view: View,
    pub event_id: String,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    consistency: ConsistencyLevel,
    writes: Mutex<Vec<WriteOp>>,
    rejects: Mutex<HashSet<(View, String)>>,
}

impl MemoryStore {
    pub fn new(consistency: ConsistencyLevel) -> Self {
        Self {
            consistency,
            ..Self::default()
        }
    }

    /// Make every write of `event_id` into `view` fail.
    pub fn reject(&self, view: View, event_id: impl Into<String>) {
        self.rejects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((view, event_id.into()));
    }

    /// All attempted writes, rejected ones included.
    pub fn writes(&self) -> Vec<WriteOp> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn accepted(&self, view: View) -> Vec<WriteOp> {
        self.writes()
            .into_iter()
            .filter(|op| op.accepted && op.view() == view)
            .collect()
    }

    fn record(&self, row: StoredRow) -> Result<(), BoxError> {
        let mut op = WriteOp {
            row,
            consistency: self.consistency,
            accepted: true,
        };
        let rejected = self
            .rejects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(op.view(), op.event_id().to_string()));
        op.accepted = !rejected;
        let err = rejected.then(|| RejectedWrite {
            view: op.view(),
            event_id: op.event_id().to_string(),
        });
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(op);
        match err {
            Some(err) => Err(Box::new(err)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ViewStore for MemoryStore {
    fn consistency(&self) -> ConsistencyLevel {
        self.consistency
    }

    async fn write_primary(&self, row: &PrimaryRow) -> Result<(), BoxError> {
        self.record(StoredRow::Primary(row.clone()))
    }

    async fn write_secondary(&self, row: &SecondaryRow) -> Result<(), BoxError> {
        self.record(StoredRow::Secondary(row.clone()))
    }
}
