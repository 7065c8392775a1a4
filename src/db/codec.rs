//! Storage-edge conversions: id lists, JSON-valued columns, nullable scalars.

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::AppError;

/// Trim, drop blanks, dedupe. First occurrence wins the position.
pub fn sanitize_id_list<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut output = Vec::new();
    for item in items {
        let value = item.as_ref().trim();
        if value.is_empty() || !seen.insert(value.to_string()) {
            continue;
        }
        output.push(value.to_string());
    }
    output
}

pub fn encode_id_list(items: &[String]) -> Result<String, AppError> {
    Ok(serde_json::to_string(&sanitize_id_list(items))?)
}

pub fn decode_id_list(raw: &str) -> Result<Vec<String>, serde_json::Error> {
    let source = raw.trim();
    if source.is_empty() || source == "null" {
        return Ok(Vec::new());
    }
    let items: Vec<String> = serde_json::from_str(source)?;
    Ok(sanitize_id_list(items))
}

pub fn encode_json<T: Serialize>(value: &T) -> Result<String, AppError> {
    Ok(serde_json::to_string(value)?)
}

/// Decode a JSON text column. Empty, `NULL` and `null` all yield `T::default()`;
/// malformed text fails with a conversion error naming the column.
pub fn json_column<T>(row: &Row, column: &str) -> rusqlite::Result<T>
where
    T: DeserializeOwned + Default,
{
    let raw: Option<String> = row.get(column)?;
    let source = raw.as_deref().map(str::trim).unwrap_or("");
    if source.is_empty() || source == "null" {
        return Ok(T::default());
    }
    serde_json::from_str(source).map_err(|e| conversion_error(row, column, e))
}

/// Like [`json_column`] but keeps absence: `NULL`, empty and `null` map to `None`.
pub fn optional_json_column<T>(row: &Row, column: &str) -> rusqlite::Result<Option<T>>
where
    T: DeserializeOwned,
{
    let raw: Option<String> = row.get(column)?;
    let source = raw.as_deref().map(str::trim).unwrap_or("");
    if source.is_empty() || source == "null" {
        return Ok(None);
    }
    serde_json::from_str(source)
        .map(Some)
        .map_err(|e| conversion_error(row, column, e))
}

pub fn id_list_column(row: &Row, column: &str) -> rusqlite::Result<Vec<String>> {
    let raw: Option<String> = row.get(column)?;
    decode_id_list(raw.as_deref().unwrap_or("")).map_err(|e| conversion_error(row, column, e))
}

/// `NULL` and whitespace-only text both read as `None`; present values are trimmed.
pub fn optional_text_column(row: &Row, column: &str) -> rusqlite::Result<Option<String>> {
    let raw: Option<String> = row.get(column)?;
    Ok(non_blank(raw.as_deref()))
}

/// Integer flags: only `1` is true.
pub fn bool_column(row: &Row, column: &str) -> rusqlite::Result<bool> {
    let raw: Option<i64> = row.get(column)?;
    Ok(raw == Some(1))
}

pub fn optional_bool_column(row: &Row, column: &str) -> rusqlite::Result<Option<bool>> {
    let raw: Option<i64> = row.get(column)?;
    Ok(raw.map(|v| v == 1))
}

pub fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn now_rfc3339() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Fills a blank timestamp with the current time, otherwise trims it.
pub fn timestamp_or_now(raw: &str) -> String {
    let value = raw.trim();
    if value.is_empty() {
        now_rfc3339()
    } else {
        value.to_string()
    }
}

fn conversion_error(row: &Row, column: &str, err: serde_json::Error) -> rusqlite::Error {
    let idx = row.as_ref().column_index(column).unwrap_or(0);
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}
