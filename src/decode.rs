//! Line decoder: one NDJSON line in, one validated [`Record`] out.

use serde::Deserialize;

use crate::error::{DecodeError, DecodeErrorKind};
use crate::types::{null_default, ParsedData, Record};

/// Wire shape of an input line. Built fresh for every line, so a field absent
/// from one line never inherits the previous line's value. `null` reads as
/// the field's default.
///
/// `id`, `accountId` and `isColdStart` are separate fallback fields rather
/// than serde aliases, so a line carrying both spellings still decodes.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRecord {
    #[serde(rename = "_id", deserialize_with = "null_default")]
    id: String,
    #[serde(rename = "id", deserialize_with = "null_default")]
    fallback_id: String,
    #[serde(rename = "client", deserialize_with = "null_default")]
    account_id: String,
    #[serde(rename = "accountId", deserialize_with = "null_default")]
    fallback_account_id: String,
    #[serde(rename = "functionArn", deserialize_with = "null_default")]
    function_arn: String,
    #[serde(rename = "logGroupName", deserialize_with = "null_default")]
    log_group_name: String,
    #[serde(rename = "logStreamName", deserialize_with = "null_default")]
    log_stream_name: String,
    #[serde(rename = "s3bucket", deserialize_with = "null_default")]
    s3_bucket: String,
    #[serde(rename = "s3key", deserialize_with = "null_default")]
    s3_key: String,
    #[serde(rename = "isColdstart")]
    is_cold_start: Option<bool>,
    #[serde(rename = "isColdStart")]
    fallback_is_cold_start: Option<bool>,
    #[serde(rename = "isEmpty", deserialize_with = "null_default")]
    is_empty: bool,
    #[serde(rename = "isError", deserialize_with = "null_default")]
    is_error: bool,
    #[serde(rename = "isRetry", deserialize_with = "null_default")]
    is_retry: bool,
    #[serde(rename = "logLines")]
    log_lines: Option<String>,
    #[serde(rename = "parsedData", deserialize_with = "null_default")]
    parsed_data: ParsedData,
}

/// Decode one input line.
///
/// A trailing `\r` or `\n` is ignored. Unknown fields are ignored. Fails when
/// the line is not a JSON object of the expected shape, when `logLines` is
/// absent or not an integer, or when either key is empty.
pub fn decode(line: &[u8]) -> Result<Record, DecodeError> {
    let line = trim_line_ending(line);
    let raw: RawRecord = serde_json::from_slice(line)
        .map_err(|err| DecodeError::new(line, DecodeErrorKind::Json(err)))?;
    raw.into_record().map_err(|kind| DecodeError::new(line, kind))
}

impl RawRecord {
    fn into_record(self) -> Result<Record, DecodeErrorKind> {
        let id = first_non_blank(self.id, self.fallback_id)
            .ok_or(DecodeErrorKind::MissingKey("_id"))?;
        let account_id = first_non_blank(self.account_id, self.fallback_account_id)
            .ok_or(DecodeErrorKind::MissingKey("client"))?;
        let value = self.log_lines.ok_or(DecodeErrorKind::MissingLogLines)?;
        let log_line_count = value
            .parse::<i32>()
            .map_err(|source| DecodeErrorKind::LogLineCount {
                value: value.clone(),
                source,
            })?;

        Ok(Record {
            id,
            account_id,
            function_arn: self.function_arn,
            log_group_name: self.log_group_name,
            log_stream_name: self.log_stream_name,
            s3_bucket: self.s3_bucket,
            s3_key: self.s3_key,
            is_cold_start: self
                .is_cold_start
                .or(self.fallback_is_cold_start)
                .unwrap_or_default(),
            is_empty: self.is_empty,
            is_error: self.is_error,
            is_retry: self.is_retry,
            log_line_count,
            parsed_data: self.parsed_data,
        })
    }
}

fn first_non_blank(canonical: String, fallback: String) -> Option<String> {
    [canonical, fallback]
        .into_iter()
        .find(|s| !s.trim().is_empty())
}

fn trim_line_ending(mut line: &[u8]) -> &[u8] {
    while let [rest @ .., b'\n' | b'\r'] = line {
        line = rest;
    }
    line
}

/// True when the line holds nothing but whitespace.
pub fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_crlf() {
        assert_eq!(trim_line_ending(b"{}\r\n"), b"{}");
        assert_eq!(trim_line_ending(b"{}\n"), b"{}");
        assert_eq!(trim_line_ending(b"{}"), b"{}");
        assert_eq!(trim_line_ending(b"\r\n"), b"");
    }

    #[test]
    fn blank_lines() {
        assert!(is_blank(b""));
        assert!(is_blank(b"  \t\r\n"));
        assert!(!is_blank(b" {} "));
    }
}
