use std::sync::Arc;
use std::{env, fs, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;

use crate::ingest::ErrorPolicy;
use crate::store::ConsistencyLevel;

pub const DEFAULT_NODE: &str = "127.0.0.1:9042";
pub const DEFAULT_KEYSPACE: &str = "events";
pub const DEFAULT_PRIMARY_TABLE: &str = "events";
pub const DEFAULT_SECONDARY_TABLE: &str = "events_by_account_id";
pub const DEFAULT_INPUT_PATH: &str = "data.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub nodes: Vec<Arc<str>>,
    pub keyspace: Arc<str>,
    pub primary_table: Arc<str>,
    pub secondary_table: Arc<str>,
    pub consistency: ConsistencyLevel,
    pub username: Option<Arc<str>>,
    pub password: Option<Arc<str>>,
    pub input_path: PathBuf,
    pub error_policy: ErrorPolicy,
    pub create_schema: bool,
    pub replication_factor: u32,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawConfig {
    nodes: Vec<String>,
    keyspace: String,
    primary_table: String,
    secondary_table: String,
    consistency: ConsistencyLevel,
    username: Option<String>,
    password: Option<String>,
    input_path: PathBuf,
    error_policy: ErrorPolicy,
    create_schema: bool,
    replication_factor: u32,
    connect_timeout_secs: u64,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            nodes: vec![DEFAULT_NODE.to_string()],
            keyspace: DEFAULT_KEYSPACE.into(),
            primary_table: DEFAULT_PRIMARY_TABLE.into(),
            secondary_table: DEFAULT_SECONDARY_TABLE.into(),
            consistency: ConsistencyLevel::Quorum,
            username: None,
            password: None,
            input_path: PathBuf::from(DEFAULT_INPUT_PATH),
            error_policy: ErrorPolicy::Abort,
            create_schema: false,
            replication_factor: 3,
            connect_timeout_secs: 10,
        }
    }
}

impl From<RawConfig> for Config {
    fn from(raw: RawConfig) -> Self {
        Self {
            nodes: collect_nodes(raw.nodes),
            keyspace: raw.keyspace.into(),
            primary_table: raw.primary_table.into(),
            secondary_table: raw.secondary_table.into(),
            consistency: raw.consistency,
            username: non_empty(raw.username),
            password: non_empty(raw.password),
            input_path: raw.input_path,
            error_policy: raw.error_policy,
            create_schema: raw.create_schema,
            replication_factor: raw.replication_factor,
            connect_timeout_secs: raw.connect_timeout_secs,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::from(RawConfig::default())
    }
}

impl Config {
    /// Load from `path`, else the per-user config file, else defaults; then
    /// apply environment overrides and validate.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut cfg = if let Some(path) = path {
            Self::from_file(&path)?
        } else {
            let default_path = default_config_path();
            if default_path.exists() {
                Self::from_file(&default_path)?
            } else {
                Self::default()
            }
        };

        cfg.apply_env()?;
        validate_required(&cfg)?;
        Ok(cfg)
    }

    fn from_file(path: &std::path::Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let raw: RawConfig =
            toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
        Ok(Config::from(raw))
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(nodes) = env::var("SCYLLA_NODES") {
            let parsed = parse_nodes(&nodes);
            if !parsed.is_empty() {
                self.nodes = parsed;
            }
        }
        maybe_env_str(&mut self.keyspace, "SCYLLA_KEYSPACE");
        maybe_env_str(&mut self.primary_table, "PRIMARY_TABLE");
        maybe_env_str(&mut self.secondary_table, "SECONDARY_TABLE");
        if let Ok(v) = env::var("SCYLLA_USER") {
            self.username = non_empty(Some(v));
        }
        if let Ok(v) = env::var("SCYLLA_PASS") {
            self.password = non_empty(Some(v));
        }
        if let Ok(v) = env::var("SCYLLA_CONSISTENCY") {
            self.consistency = v.parse().context("SCYLLA_CONSISTENCY")?;
        }
        if let Ok(v) = env::var("ERROR_POLICY") {
            self.error_policy = v.parse().context("ERROR_POLICY")?;
        }
        if let Ok(p) = env::var("INPUT_PATH") {
            self.input_path = PathBuf::from(p);
        }
        if let Ok(v) = env::var("CREATE_SCHEMA") {
            self.create_schema = parse_flag(&v);
        }
        maybe_env_u32(&mut self.replication_factor, "REPLICATION_FACTOR");
        maybe_env_u64(&mut self.connect_timeout_secs, "CONNECT_TIMEOUT_SECS");
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn default_config_path() -> PathBuf {
    ProjectDirs::from("com", "feeder", "feeder")
        .map(|p| p.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from(".feeder/config.toml"))
}

fn validate_required(cfg: &Config) -> Result<()> {
    if cfg.nodes.is_empty() {
        anyhow::bail!("SCYLLA_NODES is required (set via env or config)");
    }
    for (name, ident) in [
        ("keyspace", &cfg.keyspace),
        ("primary_table", &cfg.primary_table),
        ("secondary_table", &cfg.secondary_table),
    ] {
        if !is_cql_identifier(ident) {
            anyhow::bail!("{name} {ident:?} is not a valid CQL identifier");
        }
    }
    if cfg.primary_table == cfg.secondary_table {
        anyhow::bail!("primary_table and secondary_table must differ");
    }
    if cfg.input_path.as_os_str().is_empty() {
        anyhow::bail!("INPUT_PATH is required (set via env or config)");
    }
    if cfg.replication_factor == 0 {
        anyhow::bail!("replication_factor must be at least 1");
    }
    Ok(())
}

/// Unquoted CQL identifier: a letter followed by letters, digits or `_`, at
/// most 48 characters.
pub fn is_cql_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && s.len() <= 48
}

fn maybe_env_str(val: &mut Arc<str>, key: &str) {
    if let Ok(v) = env::var(key) {
        let v = v.trim();
        if !v.is_empty() {
            *val = Arc::from(v);
        }
    }
}

/// `1`, `true`, `yes` or `on`, in any case.
pub fn parse_flag(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn maybe_env_u32(val: &mut u32, key: &str) {
    if let Ok(v) = env::var(key) {
        if let Ok(n) = v.parse::<u32>() {
            *val = n;
        }
    }
}

fn maybe_env_u64(val: &mut u64, key: &str) {
    if let Ok(v) = env::var(key) {
        if let Ok(n) = v.parse::<u64>() {
            *val = n;
        }
    }
}

fn non_empty(v: Option<String>) -> Option<Arc<str>> {
    v.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(Arc::from)
}

fn collect_nodes(nodes: Vec<String>) -> Vec<Arc<str>> {
    nodes
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .map(Arc::from)
        .collect()
}

pub fn parse_nodes(raw: &str) -> Vec<Arc<str>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Arc::from)
        .collect()
}
