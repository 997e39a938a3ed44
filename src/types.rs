use scylla::SerializeValue;
use serde::{Deserialize, Deserializer, Serialize};

/// Read an optional JSON value, mapping `null` to the type's default.
pub(crate) fn null_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

/// Runtime report attached to an invocation. Every figure arrives as a
/// string and is stored untouched in the `parsed_data` user type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, SerializeValue)]
#[serde(rename_all = "camelCase", default)]
pub struct ParsedData {
    #[serde(deserialize_with = "null_default")]
    pub version: String,
    #[serde(deserialize_with = "null_default")]
    pub request_id: String,
    #[serde(deserialize_with = "null_default")]
    pub duration: String,
    #[serde(deserialize_with = "null_default")]
    pub billed_duration: String,
    #[serde(deserialize_with = "null_default")]
    pub memory_size: String,
    #[serde(deserialize_with = "null_default")]
    pub max_memory_used: String,
}

/// One decoded function-invocation log event.
///
/// Both keys are guaranteed non-empty; [`crate::decode::decode`] is the only
/// way the pipeline builds one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub id: String,
    pub account_id: String,
    pub function_arn: String,
    pub log_group_name: String,
    pub log_stream_name: String,
    pub s3_bucket: String,
    pub s3_key: String,
    pub is_cold_start: bool,
    pub is_empty: bool,
    pub is_error: bool,
    pub is_retry: bool,
    pub log_line_count: i32,
    pub parsed_data: ParsedData,
}
