//! Tests for the ingestion loop.

use std::fs;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use feeder::columns::Clock;
use feeder::error::{IngestError, View};
use feeder::ingest::{open_input, ErrorPolicy, Ingestor};
use feeder::store::{ConsistencyLevel, MemoryStore};
use tempfile::tempdir;

/// Advances one second on every read.
#[derive(Default)]
struct StepClock {
    now: AtomicI64,
}

impl Clock for StepClock {
    fn now_epoch_secs(&self) -> i64 {
        self.now.fetch_add(1, Ordering::SeqCst)
    }
}

fn line(id: &str, account: &str) -> String {
    format!(r#"{{"_id":"{id}","client":"{account}","logLines":"1","logStreamName":"s-{id}"}}"#)
}

fn ingestor(store: &Arc<MemoryStore>, policy: ErrorPolicy) -> Ingestor<Arc<MemoryStore>, StepClock> {
    Ingestor::with_clock(store.clone(), StepClock::default(), policy)
}

#[tokio::test]
async fn test_one_line_produces_one_write_pair() {
    let store = Arc::new(MemoryStore::default());
    let input = format!("{}\n", line("e1", "a1"));

    let stats = ingestor(&store, ErrorPolicy::Abort)
        .run(input.as_bytes())
        .await
        .unwrap();

    assert_eq!(stats.lines, 1);
    assert_eq!(stats.written, 1);
    let writes = store.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].view(), View::Primary);
    assert_eq!(writes[1].view(), View::Secondary);
    assert!(writes.iter().all(|op| op.event_id() == "e1" && op.account_id() == "a1"));
}

#[tokio::test]
async fn test_clock_read_once_per_record() {
    let store = Arc::new(MemoryStore::default());
    let input = format!("{}\n{}\n", line("e1", "a1"), line("e2", "a1"));

    ingestor(&store, ErrorPolicy::Abort)
        .run(input.as_bytes())
        .await
        .unwrap();

    let stamps: Vec<i64> = store.writes().iter().map(|op| op.created_at()).collect();
    assert_eq!(stamps, vec![0, 0, 1, 1]);
}

#[tokio::test]
async fn test_reingesting_same_line_is_two_independent_writes() {
    let store = Arc::new(MemoryStore::default());
    let input = format!("{}\n{}\n", line("e1", "a1"), line("e1", "a1"));

    let stats = ingestor(&store, ErrorPolicy::Abort)
        .run(input.as_bytes())
        .await
        .unwrap();

    assert_eq!(stats.written, 2);
    let primaries = store.accepted(View::Primary);
    assert_eq!(primaries.len(), 2);
    assert_eq!(primaries[0].event_id(), primaries[1].event_id());
    assert_ne!(primaries[0].created_at(), primaries[1].created_at());
}

#[tokio::test]
async fn test_malformed_line_stops_run() {
    let store = Arc::new(MemoryStore::default());
    let input = format!("{}\n{{not json\n{}\n", line("e1", "a1"), line("e3", "a3"));

    let err = ingestor(&store, ErrorPolicy::Abort)
        .run(input.as_bytes())
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Decode { line_no: 2, .. }));
    assert_eq!(err.line_no(), 2);
    let writes = store.writes();
    assert_eq!(writes.len(), 2);
    assert!(writes.iter().all(|op| op.event_id() == "e1"));
}

#[tokio::test]
async fn test_write_failure_stops_run() {
    let store = Arc::new(MemoryStore::default());
    store.reject(View::Primary, "e2");
    let input = format!("{}\n{}\n{}\n", line("e1", "a1"), line("e2", "a2"), line("e3", "a3"));

    let err = ingestor(&store, ErrorPolicy::Abort)
        .run(input.as_bytes())
        .await
        .unwrap_err();

    match err {
        IngestError::Write { line_no, source } => {
            assert_eq!(line_no, 2);
            assert_eq!(source.view, View::Primary);
        }
        other => panic!("unexpected error {other:?}"),
    }
    let writes = store.writes();
    assert_eq!(writes.len(), 3);
    assert!(!writes.iter().any(|op| op.event_id() == "e3"));
    assert!(!writes
        .iter()
        .any(|op| op.event_id() == "e2" && op.view() == View::Secondary));
}

#[tokio::test]
async fn test_skip_policy_continues_past_bad_lines() {
    let store = Arc::new(MemoryStore::default());
    store.reject(View::Secondary, "e4");
    let input = format!(
        "{}\n{{not json\n{}\n{}\n",
        line("e1", "a1"),
        line("e3", "a3"),
        line("e4", "a4")
    );

    let stats = ingestor(&store, ErrorPolicy::Skip)
        .run(input.as_bytes())
        .await
        .unwrap();

    assert_eq!(stats.lines, 4);
    assert_eq!(stats.written, 2);
    assert_eq!(stats.skipped, 2);
    assert_eq!(store.accepted(View::Secondary).len(), 2);
    // e4 stays in the primary view only.
    assert_eq!(store.accepted(View::Primary).len(), 3);
}

#[tokio::test]
async fn test_blank_lines_are_ignored() {
    let store = Arc::new(MemoryStore::default());
    let input = format!("\n{}\n   \n\r\n", line("e1", "a1"));

    let stats = ingestor(&store, ErrorPolicy::Abort)
        .run(input.as_bytes())
        .await
        .unwrap();

    assert_eq!(stats.lines, 4);
    assert_eq!(stats.blank, 3);
    assert_eq!(stats.written, 1);
}

#[tokio::test]
async fn test_last_line_without_newline() {
    let store = Arc::new(MemoryStore::default());
    let input = format!("{}\n{}", line("e1", "a1"), line("e2", "a2"));

    let stats = ingestor(&store, ErrorPolicy::Abort)
        .run(input.as_bytes())
        .await
        .unwrap();

    assert_eq!(stats.written, 2);
}

#[tokio::test]
async fn test_empty_input_succeeds() {
    let store = Arc::new(MemoryStore::default());
    let stats = ingestor(&store, ErrorPolicy::Abort)
        .run(&b""[..])
        .await
        .unwrap();

    assert_eq!(stats.lines, 0);
    assert!(store.writes().is_empty());
    assert_eq!(stats.records_per_second(), 0.0);
}

#[tokio::test]
async fn test_all_writes_use_one_consistency() {
    let store = Arc::new(MemoryStore::new(ConsistencyLevel::All));
    let input = format!("{}\n{}\n{}\n", line("e1", "a1"), line("e2", "a2"), line("e3", "a1"));

    ingestor(&store, ErrorPolicy::Abort)
        .run(input.as_bytes())
        .await
        .unwrap();

    let writes = store.writes();
    assert_eq!(writes.len(), 6);
    assert!(writes.iter().all(|op| op.consistency == ConsistencyLevel::All));
}

#[tokio::test]
async fn test_run_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.json");
    fs::write(&path, format!("{}\n{}\n", line("e1", "a1"), line("e2", "a2"))).unwrap();

    let store = Arc::new(MemoryStore::default());
    let input = open_input(&path).await.unwrap();
    let stats = ingestor(&store, ErrorPolicy::Abort).run(input).await.unwrap();

    assert_eq!(stats.written, 2);
    assert_eq!(store.accepted(View::Secondary)[1].event_id(), "e2");
}

#[tokio::test]
async fn test_open_missing_input_fails() {
    let dir = tempdir().unwrap();
    let err = open_input(&dir.path().join("missing.json")).await.err().unwrap();
    assert!(err.to_string().contains("opening input"));
}

#[test]
fn test_error_policy_parse() {
    assert_eq!("abort".parse::<ErrorPolicy>().unwrap(), ErrorPolicy::Abort);
    assert_eq!(" Skip ".parse::<ErrorPolicy>().unwrap(), ErrorPolicy::Skip);
    assert!("retry".parse::<ErrorPolicy>().is_err());
    assert_eq!(ErrorPolicy::default(), ErrorPolicy::Abort);
}
