//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQL and column encodings from service orchestration.
//!
//! # Invariants
//! - Write paths validate their input model before any SQL mutation.
//! - Read paths reject malformed persisted rows instead of masking them.
//! - Timestamps are stored as `YYYY-MM-DD HH:MM:SS` text, dates as `YYYY-MM-DD`.

use crate::db::DbError;
use crate::model::call::CallValidationError;
use crate::model::picklist::PicklistValidationError;
use crate::model::user::UserValidationError;
use chrono::{NaiveDate, NaiveDateTime};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod call_repo;
pub mod picklist_repo;
pub mod settings_repo;
pub mod user_repo;

pub type RepoResult<T> = Result<T, RepoError>;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TIMESTAMP_FORMAT_NO_SECONDS: &str = "%Y-%m-%d %H:%M";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Shared repository error for every table family.
#[derive(Debug)]
pub enum RepoError {
    CallValidation(CallValidationError),
    UserValidation(UserValidationError),
    PicklistValidation(PicklistValidationError),
    Db(DbError),
    NotFound { entity: &'static str, id: i64 },
    /// A unique constraint rejected the write; carries the conflicting value.
    Duplicate(String),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CallValidation(err) => write!(f, "{err}"),
            Self::UserValidation(err) => write!(f, "{err}"),
            Self::PicklistValidation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Duplicate(value) => write!(f, "`{value}` already exists"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CallValidation(err) => Some(err),
            Self::UserValidation(err) => Some(err),
            Self::PicklistValidation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound { .. } | Self::Duplicate(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<CallValidationError> for RepoError {
    fn from(value: CallValidationError) -> Self {
        Self::CallValidation(value)
    }
}

impl From<UserValidationError> for RepoError {
    fn from(value: UserValidationError) -> Self {
        Self::UserValidation(value)
    }
}

impl From<PicklistValidationError> for RepoError {
    fn from(value: PicklistValidationError) -> Self {
        Self::PicklistValidation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// True for `UNIQUE`/`PRIMARY KEY` constraint failures.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => matches!(
            failure.extended_code,
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        ),
        _ => false,
    }
}

pub(crate) fn format_timestamp(value: NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_timestamp(value: &str, column: &str) -> RepoResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT_NO_SECONDS))
        .map_err(|_| RepoError::InvalidData(format!("invalid timestamp `{value}` in {column}")))
}

pub(crate) fn parse_optional_timestamp(
    value: Option<String>,
    column: &str,
) -> RepoResult<Option<NaiveDateTime>> {
    value
        .filter(|text| !text.trim().is_empty())
        .map(|text| parse_timestamp(&text, column))
        .transpose()
}

pub(crate) fn format_date(value: NaiveDate) -> String {
    value.format(DATE_FORMAT).to_string()
}

pub(crate) fn parse_optional_date(
    value: Option<String>,
    column: &str,
) -> RepoResult<Option<NaiveDate>> {
    value
        .filter(|text| !text.trim().is_empty())
        .map(|text| {
            NaiveDate::parse_from_str(&text, DATE_FORMAT)
                .map_err(|_| RepoError::InvalidData(format!("invalid date `{text}` in {column}")))
        })
        .transpose()
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn int_to_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean `{other}` in {column}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::{format_timestamp, int_to_bool, parse_optional_date, parse_timestamp};
    use chrono::NaiveDate;

    #[test]
    fn timestamps_accept_minute_precision_rows() {
        let parsed = parse_timestamp("2024-01-05 10:00", "calls.dispatched").unwrap();
        assert_eq!(format_timestamp(parsed), "2024-01-05 10:00:00");
        assert!(parse_timestamp("05/01/2024", "calls.dispatched").is_err());
    }

    #[test]
    fn blank_dates_read_as_none() {
        assert_eq!(parse_optional_date(Some(" ".into()), "users.joined_date").unwrap(), None);
        assert_eq!(
            parse_optional_date(Some("2020-06-01".into()), "users.joined_date").unwrap(),
            NaiveDate::from_ymd_opt(2020, 6, 1)
        );
    }

    #[test]
    fn booleans_outside_zero_one_are_invalid() {
        assert!(int_to_bool(2, "users.active").is_err());
        assert!(int_to_bool(1, "users.active").unwrap());
    }
}
