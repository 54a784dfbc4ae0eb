//! Conversions between SQLite column values and domain types.

use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::Row;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use keystone_storage::StorageError;

/// Map a rusqlite error to a `StorageError`, unwrapping decode failures that
/// were raised by the helpers below.
pub(crate) fn sql_err(e: rusqlite::Error) -> StorageError {
    match e {
        rusqlite::Error::FromSqlConversionFailure(_, _, inner) => {
            match inner.downcast::<StorageError>() {
                Ok(storage) => *storage,
                Err(other) => StorageError::Backend(other.to_string()),
            }
        }
        other => StorageError::Backend(other.to_string()),
    }
}

fn invalid(idx: usize, field: &'static str, value: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(StorageError::InvalidValue { field, value }),
    )
}

pub(crate) fn encode_date(date: Date) -> Result<String, StorageError> {
    date.format(format_description!("[year]-[month]-[day]"))
        .map_err(|e| StorageError::Backend(format!("date format: {e}")))
}

pub(crate) fn encode_opt_date(date: Option<Date>) -> Result<Option<String>, StorageError> {
    date.map(encode_date).transpose()
}

pub(crate) fn encode_timestamp(ts: OffsetDateTime) -> Result<String, StorageError> {
    ts.format(&Rfc3339)
        .map_err(|e| StorageError::Backend(format!("timestamp format: {e}")))
}

pub(crate) fn date_col(row: &Row<'_>, idx: usize, field: &'static str) -> rusqlite::Result<Date> {
    let raw: String = row.get(idx)?;
    Date::parse(&raw, format_description!("[year]-[month]-[day]"))
        .map_err(|_| invalid(idx, field, raw))
}

pub(crate) fn opt_date_col(
    row: &Row<'_>,
    idx: usize,
    field: &'static str,
) -> rusqlite::Result<Option<Date>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(None),
        Some(raw) => Date::parse(&raw, format_description!("[year]-[month]-[day]"))
            .map(Some)
            .map_err(|_| invalid(idx, field, raw)),
    }
}

pub(crate) fn timestamp_col(
    row: &Row<'_>,
    idx: usize,
    field: &'static str,
) -> rusqlite::Result<OffsetDateTime> {
    let raw: String = row.get(idx)?;
    OffsetDateTime::parse(&raw, &Rfc3339).map_err(|_| invalid(idx, field, raw))
}

/// Decode a closed enum stored as its `as_str` spelling.
pub(crate) fn enum_col<T: FromStr>(
    row: &Row<'_>,
    idx: usize,
    field: &'static str,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|_| invalid(idx, field, raw))
}
