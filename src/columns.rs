//! Column mapping from a decoded [`Record`] to the two view rows.
//!
//! Field names match the CQL column names so the rows bind to the prepared
//! inserts by name.

use chrono::Utc;
use scylla::SerializeRow;

use crate::types::{ParsedData, Record};

/// Source of the `created_at` stamp. Read once per record.
pub trait Clock: Send + Sync {
    fn now_epoch_secs(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Row of the events-by-id view.
#[derive(Debug, Clone, PartialEq, Eq, SerializeRow)]
pub struct PrimaryRow {
    pub id: String,
    pub created_at: i64,
    pub account_id: String,
    pub data: ParsedData,
    pub function_arn: String,
    pub is_cold_start: bool,
    pub is_empty: bool,
    pub is_error: bool,
    pub is_retry: bool,
    pub log_group_name: String,
    pub log_lines: i32,
    pub log_stream_name: String,
    pub s3bucket: String,
    pub s3key: String,
}

/// Row of the events-by-account view, clustered by `created_at` then `event_id`.
#[derive(Debug, Clone, PartialEq, Eq, SerializeRow)]
pub struct SecondaryRow {
    pub account_id: String,
    pub event_id: String,
    pub created_at: i64,
    pub data: ParsedData,
    pub function_arn: String,
    pub is_cold_start: bool,
    pub is_empty: bool,
    pub is_error: bool,
    pub is_retry: bool,
    pub log_group_name: String,
    pub log_lines: i32,
    pub log_stream_name: String,
    pub s3bucket: String,
    pub s3key: String,
}

impl PrimaryRow {
    pub fn new(record: &Record, created_at: i64) -> Self {
        Self {
            id: record.id.clone(),
            created_at,
            account_id: record.account_id.clone(),
            data: record.parsed_data.clone(),
            function_arn: record.function_arn.clone(),
            is_cold_start: record.is_cold_start,
            is_empty: record.is_empty,
            is_error: record.is_error,
            is_retry: record.is_retry,
            log_group_name: record.log_group_name.clone(),
            log_lines: record.log_line_count,
            log_stream_name: record.log_stream_name.clone(),
            s3bucket: record.s3_bucket.clone(),
            s3key: record.s3_key.clone(),
        }
    }
}

impl SecondaryRow {
    pub fn new(record: &Record, created_at: i64) -> Self {
        Self {
            account_id: record.account_id.clone(),
            event_id: record.id.clone(),
            created_at,
            data: record.parsed_data.clone(),
            function_arn: record.function_arn.clone(),
            is_cold_start: record.is_cold_start,
            is_empty: record.is_empty,
            is_error: record.is_error,
            is_retry: record.is_retry,
            log_group_name: record.log_group_name.clone(),
            log_lines: record.log_line_count,
            log_stream_name: record.log_stream_name.clone(),
            s3bucket: record.s3_bucket.clone(),
            s3key: record.s3_key.clone(),
        }
    }
}

/// Both rows for one record, sharing a single `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRows {
    pub primary: PrimaryRow,
    pub secondary: SecondaryRow,
}

impl ViewRows {
    pub fn from_record(record: &Record, created_at: i64) -> Self {
        Self {
            primary: PrimaryRow::new(record, created_at),
            secondary: SecondaryRow::new(record, created_at),
        }
    }

    pub fn event_id(&self) -> &str {
        &self.primary.id
    }
}
