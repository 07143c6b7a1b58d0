//! Picklist repository.
//!
//! # Invariants
//! - `(category, value)` stays unique; conflicts surface as `RepoError::Duplicate`.
//! - Items are deactivated, never deleted.

use crate::model::picklist::{normalize_value, PicklistCategory, PicklistItem, PicklistItemId};
use crate::repo::{bool_to_int, int_to_bool, is_unique_violation, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const PICKLIST_SELECT_SQL: &str = "SELECT id, category, value, sort_order, active FROM picklists";

pub trait PicklistRepository {
    fn list_items(
        &self,
        category: PicklistCategory,
        include_inactive: bool,
    ) -> RepoResult<Vec<PicklistItem>>;
    /// Categories that currently hold at least one item.
    fn list_categories(&self) -> RepoResult<Vec<PicklistCategory>>;
    fn get_item(&self, id: PicklistItemId) -> RepoResult<Option<PicklistItem>>;
    fn create_item(
        &self,
        category: PicklistCategory,
        value: &str,
        sort_order: i64,
    ) -> RepoResult<PicklistItemId>;
    fn update_item(
        &self,
        id: PicklistItemId,
        value: &str,
        sort_order: i64,
        active: bool,
    ) -> RepoResult<()>;
    fn deactivate_item(&self, id: PicklistItemId) -> RepoResult<()>;
}

pub struct SqlitePicklistRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePicklistRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl PicklistRepository for SqlitePicklistRepository<'_> {
    fn list_items(
        &self,
        category: PicklistCategory,
        include_inactive: bool,
    ) -> RepoResult<Vec<PicklistItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PICKLIST_SELECT_SQL}
             WHERE category = ?1
               AND (?2 = 1 OR active = 1)
             ORDER BY sort_order ASC, value ASC;"
        ))?;
        let mut rows = stmt.query(params![category.as_str(), bool_to_int(include_inactive)])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }

    fn list_categories(&self) -> RepoResult<Vec<PicklistCategory>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT category FROM picklists ORDER BY category ASC;")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        names
            .iter()
            .map(|name| {
                PicklistCategory::parse(name).map_err(|err| RepoError::InvalidData(err.to_string()))
            })
            .collect()
    }

    fn get_item(&self, id: PicklistItemId) -> RepoResult<Option<PicklistItem>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PICKLIST_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_item_row(row)?)),
            None => Ok(None),
        }
    }

    fn create_item(
        &self,
        category: PicklistCategory,
        value: &str,
        sort_order: i64,
    ) -> RepoResult<PicklistItemId> {
        let value = normalize_value(value)?;
        let inserted = self.conn.execute(
            "INSERT INTO picklists (category, value, sort_order, active)
             VALUES (?1, ?2, ?3, 1);",
            params![category.as_str(), value.as_str(), sort_order],
        );
        match inserted {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(err) if is_unique_violation(&err) => Err(RepoError::Duplicate(value)),
            Err(err) => Err(err.into()),
        }
    }

    fn update_item(
        &self,
        id: PicklistItemId,
        value: &str,
        sort_order: i64,
        active: bool,
    ) -> RepoResult<()> {
        let value = normalize_value(value)?;
        let updated = self.conn.execute(
            "UPDATE picklists SET value = ?1, sort_order = ?2, active = ?3 WHERE id = ?4;",
            params![value.as_str(), sort_order, bool_to_int(active), id],
        );
        match updated {
            Ok(0) => Err(RepoError::NotFound {
                entity: "picklist item",
                id,
            }),
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(RepoError::Duplicate(value)),
            Err(err) => Err(err.into()),
        }
    }

    fn deactivate_item(&self, id: PicklistItemId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("UPDATE picklists SET active = 0 WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "picklist item",
                id,
            });
        }
        Ok(())
    }
}

pub(crate) fn parse_item_row(row: &Row<'_>) -> RepoResult<PicklistItem> {
    let category: String = row.get("category")?;
    Ok(PicklistItem {
        id: row.get("id")?,
        category: PicklistCategory::parse(&category).map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid category `{category}` in picklists.category"
            ))
        })?,
        value: row.get("value")?,
        sort_order: row.get("sort_order")?,
        active: int_to_bool(row.get("active")?, "picklists.active")?,
    })
}
