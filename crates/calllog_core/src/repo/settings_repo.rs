//! Key/value application settings stored in the `settings` table.

use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection};

pub const EDIT_TIME_LIMIT_MINUTES: &str = "edit_time_limit_minutes";
pub const ADMIN_CAN_ALWAYS_EDIT: &str = "admin_can_always_edit";
pub const DEFAULT_DATE_RANGE_DAYS: &str = "default_date_range_days";
pub const REPORT_DIR: &str = "report_dir";
pub const AUTO_PRINT_AFTER_SAVE: &str = "auto_print_after_save";

const DEFAULT_EDIT_TIME_LIMIT_MINUTES: i64 = 30;

/// Who may change a stored call, and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditPolicy {
    pub edit_time_limit_minutes: i64,
    pub admin_can_always_edit: bool,
}

impl Default for EditPolicy {
    fn default() -> Self {
        Self {
            edit_time_limit_minutes: DEFAULT_EDIT_TIME_LIMIT_MINUTES,
            admin_can_always_edit: true,
        }
    }
}

pub trait SettingsRepository {
    fn get_setting(&self, key: &str) -> RepoResult<Option<String>>;
    fn set_setting(&self, key: &str, value: &str) -> RepoResult<()>;
    /// All settings sorted by key.
    fn list_settings(&self) -> RepoResult<Vec<(String, String)>>;

    /// Missing keys fall back to defaults; unparsable values are an error.
    fn edit_policy(&self) -> RepoResult<EditPolicy> {
        let defaults = EditPolicy::default();
        let edit_time_limit_minutes = match self.get_setting(EDIT_TIME_LIMIT_MINUTES)? {
            Some(value) => value.trim().parse::<i64>().map_err(|_| {
                RepoError::InvalidData(format!(
                    "invalid `{value}` in settings.{EDIT_TIME_LIMIT_MINUTES}"
                ))
            })?,
            None => defaults.edit_time_limit_minutes,
        };
        let admin_can_always_edit = match self.get_setting(ADMIN_CAN_ALWAYS_EDIT)? {
            Some(value) => parse_flag(&value).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid `{value}` in settings.{ADMIN_CAN_ALWAYS_EDIT}"
                ))
            })?,
            None => defaults.admin_can_always_edit,
        };
        Ok(EditPolicy {
            edit_time_limit_minutes,
            admin_can_always_edit,
        })
    }
}

pub struct SqliteSettingsRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSettingsRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SettingsRepository for SqliteSettingsRepository<'_> {
    fn get_setting(&self, key: &str) -> RepoResult<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM settings WHERE key = ?1;")?;
        let mut rows = stmt.query([key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    fn set_setting(&self, key: &str, value: &str) -> RepoResult<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(RepoError::InvalidData("setting key cannot be empty".to_string()));
        }
        self.conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
            params![key, value],
        )?;
        Ok(())
    }

    fn list_settings(&self) -> RepoResult<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM settings ORDER BY key ASC;")?;
        let settings = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(settings)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
