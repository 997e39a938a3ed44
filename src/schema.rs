//! Idempotent keyspace, user type and table creation.

use anyhow::{Context, Result};
use scylla::client::session::Session;
use tracing::info;

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct SchemaPlan {
    pub keyspace: String,
    pub primary_table: String,
    pub secondary_table: String,
    pub replication_factor: u32,
}

impl SchemaPlan {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            keyspace: cfg.keyspace.to_string(),
            primary_table: cfg.primary_table.to_string(),
            secondary_table: cfg.secondary_table.to_string(),
            replication_factor: cfg.replication_factor,
        }
    }

    /// DDL in execution order. Every statement is `IF NOT EXISTS`.
    pub fn statements(&self) -> Vec<String> {
        let ks = &self.keyspace;
        vec![
            format!(
                "CREATE KEYSPACE IF NOT EXISTS {ks} WITH replication = \
                 {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
                self.replication_factor
            ),
            format!(
                "CREATE TYPE IF NOT EXISTS {ks}.parsed_data (\
                 version text, request_id text, duration text, billed_duration text, \
                 memory_size text, max_memory_used text)"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {ks}.{} (\
                 id text PRIMARY KEY, created_at bigint, account_id text, \
                 {})",
                self.primary_table,
                shared_columns()
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {ks}.{} (\
                 account_id text, event_id text, created_at bigint, \
                 {}, \
                 PRIMARY KEY ((account_id), created_at, event_id)) \
                 WITH CLUSTERING ORDER BY (created_at DESC, event_id ASC)",
                self.secondary_table,
                shared_columns()
            ),
        ]
    }
}

fn shared_columns() -> &'static str {
    "data frozen<parsed_data>, function_arn text, is_cold_start boolean, \
     is_empty boolean, is_error boolean, is_retry boolean, log_group_name text, \
     log_lines int, log_stream_name text, s3bucket text, s3key text"
}

pub async fn ensure_schema(session: &Session, plan: &SchemaPlan) -> Result<()> {
    for stmt in plan.statements() {
        session
            .query_unpaged(stmt.as_str(), ())
            .await
            .with_context(|| format!("executing schema statement: {stmt}"))?;
    }
    info!(
        keyspace = %plan.keyspace,
        primary = %plan.primary_table,
        secondary = %plan.secondary_table,
        "schema ensured"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> SchemaPlan {
        SchemaPlan {
            keyspace: "events".into(),
            primary_table: "events".into(),
            secondary_table: "events_by_account_id".into(),
            replication_factor: 3,
        }
    }

    #[test]
    fn keyspace_first_then_type_then_tables() {
        let stmts = plan().statements();
        assert_eq!(stmts.len(), 4);
        assert!(stmts[0].starts_with("CREATE KEYSPACE IF NOT EXISTS events "));
        assert!(stmts[0].contains("'replication_factor': 3}"));
        assert!(stmts[1].starts_with("CREATE TYPE IF NOT EXISTS events.parsed_data"));
        assert!(stmts[2].starts_with("CREATE TABLE IF NOT EXISTS events.events ("));
        assert!(stmts[3].starts_with("CREATE TABLE IF NOT EXISTS events.events_by_account_id ("));
    }

    #[test]
    fn account_view_clusters_by_time() {
        let stmts = plan().statements();
        assert!(stmts[3].contains("PRIMARY KEY ((account_id), created_at, event_id)"));
        assert!(stmts[3].contains("CLUSTERING ORDER BY (created_at DESC"));
        assert!(stmts[2].contains("id text PRIMARY KEY"));
    }
}
