//! Feeder - fans serverless invocation log records out into event and
//! per-account views of a CQL cluster.

pub mod columns;
pub mod config;
pub mod coordinator;
pub mod decode;
pub mod error;
pub mod ingest;
pub mod schema;
pub mod store;
pub mod types;
