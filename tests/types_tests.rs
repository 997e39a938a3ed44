//! Tests for core types.

use feeder::types::{ParsedData, Record};

#[test]
fn test_parsed_data_uses_camel_case() {
    let data: ParsedData = serde_json::from_str(
        r#"{"version":"1","requestId":"r","duration":"1.5","billedDuration":"2","memorySize":"128","maxMemoryUsed":"60"}"#,
    )
    .unwrap();
    assert_eq!(data.request_id, "r");
    assert_eq!(data.billed_duration, "2");
    assert_eq!(data.memory_size, "128");
    assert_eq!(data.max_memory_used, "60");

    let json = serde_json::to_string(&data).unwrap();
    assert!(json.contains("\"requestId\""));
    assert!(json.contains("\"maxMemoryUsed\""));
}

#[test]
fn test_parsed_data_missing_fields_default() {
    let data: ParsedData = serde_json::from_str(r#"{"version":"2"}"#).unwrap();
    assert_eq!(data.version, "2");
    assert_eq!(data.duration, "");
}

#[test]
fn test_record_serializes_keys() {
    let record = Record {
        id: "e".to_string(),
        account_id: "a".to_string(),
        function_arn: String::new(),
        log_group_name: String::new(),
        log_stream_name: String::new(),
        s3_bucket: String::new(),
        s3_key: String::new(),
        is_cold_start: false,
        is_empty: true,
        is_error: false,
        is_retry: false,
        log_line_count: 0,
        parsed_data: ParsedData::default(),
    };
    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["id"], "e");
    assert_eq!(value["account_id"], "a");
    assert_eq!(value["is_empty"], true);
}
