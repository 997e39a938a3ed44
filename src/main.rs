use std::path::PathBuf;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use feeder::config::Config;
use feeder::ingest::{open_input, Ingestor};
use feeder::schema::{ensure_schema, SchemaPlan};
use feeder::store::{self, ScyllaStore};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _ = dotenv();
    init_tracing();

    let cfg_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = Config::load(cfg_path)?;
    info!(
        nodes = %cfg.nodes.join(","),
        keyspace = %cfg.keyspace,
        consistency = %cfg.consistency,
        policy = %cfg.error_policy,
        input = %cfg.input_path.display(),
        "starting feeder"
    );

    let session = store::connect(&cfg).await?;
    if cfg.create_schema {
        ensure_schema(&session, &SchemaPlan::from_config(&cfg)).await?;
    }
    let store = ScyllaStore::new(session, &cfg).await?;

    let input = open_input(&cfg.input_path).await?;
    let ingestor = Ingestor::new(store, cfg.error_policy);
    let stats = ingestor
        .run(input)
        .await
        .with_context(|| format!("ingesting {}", cfg.input_path.display()))?;

    info!(
        written = stats.written,
        skipped = stats.skipped,
        elapsed_ms = stats.elapsed.as_millis() as u64,
        "feeder finished"
    );
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::DEBUG)
        .init();
}
