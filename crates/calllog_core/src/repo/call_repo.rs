//! Call repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist call rows together with apparatus, responder and agency links.
//! - Serve the list, search, year and statistics reads of the call log.
//!
//! # Invariants
//! - Writes call `CallDraft::validate()` before SQL mutations.
//! - A call and its association rows are written in one transaction.
//! - Incident numbers are never reserved; the unique index settles races and
//!   surfaces as `RepoError::Duplicate`.

use crate::model::call::{
    Call, CallDetail, CallDraft, CallId, CallResponder, MutualAid, ResponderAssignment, Timeline,
};
use crate::model::picklist::{PicklistItem, PicklistItemId};
use crate::repo::picklist_repo::parse_item_row;
use crate::repo::{
    format_timestamp, is_unique_violation, parse_optional_timestamp,
    parse_timestamp, RepoError, RepoResult,
};
use chrono::{Days, NaiveDate};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction};
use std::collections::BTreeSet;

const CALL_SELECT_SQL: &str = "SELECT
    id,
    incident_number,
    call_type,
    mutual_aid,
    address,
    town,
    location_notes,
    dispatched,
    enroute,
    on_scene,
    clear,
    narrative,
    created_by,
    created_at,
    updated_at
FROM calls";

pub const SEARCH_DEFAULT_LIMIT: u32 = 100;
const SEARCH_LIMIT_MAX: u32 = 500;

/// Filters for [`CallRepository::search_calls`]. Empty strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallSearchQuery {
    /// Matched case-insensitively against incident number, address, town,
    /// call type and narrative.
    pub text: Option<String>,
    pub call_type: Option<String>,
    pub town: Option<String>,
    /// Inclusive lower bound on the dispatched date.
    pub dispatched_from: Option<NaiveDate>,
    /// Inclusive upper bound on the dispatched date.
    pub dispatched_to: Option<NaiveDate>,
    /// Defaults to 100, clamped to 500.
    pub limit: Option<u32>,
}

/// Aggregate counts for one calendar year of dispatches.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct YearStatistics {
    pub year: i32,
    pub total: i64,
    pub mutual_aid_given: i64,
    pub mutual_aid_received: i64,
    /// Ties resolve to the alphabetically first call type.
    pub most_common_call_type: Option<String>,
}

pub trait CallRepository {
    /// Next unused `YYYY-NNN` for `year`. Does not reserve it.
    fn next_incident_number(&self, year: i32) -> RepoResult<String>;
    fn create_call(&self, draft: &CallDraft, incident_number: &str) -> RepoResult<CallId>;
    /// Replaces editable columns and all association rows. Incident number and
    /// creator are kept.
    fn update_call(&self, id: CallId, draft: &CallDraft) -> RepoResult<()>;
    fn get_call(&self, id: CallId) -> RepoResult<Option<CallDetail>>;
    fn list_calls_by_year(&self, year: i32) -> RepoResult<Vec<Call>>;
    fn list_call_years(&self) -> RepoResult<Vec<i32>>;
    fn list_recent_calls(&self, limit: u32, offset: u32) -> RepoResult<Vec<Call>>;
    fn search_calls(&self, query: &CallSearchQuery) -> RepoResult<Vec<Call>>;
    fn year_statistics(&self, year: i32) -> RepoResult<YearStatistics>;
}

/// SQLite-backed call repository.
pub struct SqliteCallRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCallRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CallRepository for SqliteCallRepository<'_> {
    fn next_incident_number(&self, year: i32) -> RepoResult<String> {
        let prefix = format_year(year)?;
        let highest: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(CAST(SUBSTR(incident_number, 6) AS INTEGER)), 0)
             FROM calls
             WHERE incident_number GLOB ?1;",
            [format!("{prefix}-[0-9][0-9][0-9]*")],
            |row| row.get(0),
        )?;
        Ok(format!("{prefix}-{:03}", highest + 1))
    }

    fn create_call(&self, draft: &CallDraft, incident_number: &str) -> RepoResult<CallId> {
        draft.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        let inserted = tx.execute(
            "INSERT INTO calls (
                incident_number,
                call_type,
                mutual_aid,
                address,
                town,
                location_notes,
                dispatched,
                enroute,
                on_scene,
                clear,
                narrative,
                created_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
            params![
                incident_number,
                draft.call_type.trim(),
                draft.mutual_aid.as_str(),
                draft.address.trim(),
                draft.town.trim(),
                draft.location_notes.trim(),
                format_timestamp(draft.timeline.dispatched),
                draft.timeline.enroute.map(format_timestamp),
                draft.timeline.on_scene.map(format_timestamp),
                draft.timeline.clear.map(format_timestamp),
                draft.narrative.trim(),
                draft.created_by,
            ],
        );
        if let Err(err) = inserted {
            if is_unique_violation(&err) {
                return Err(RepoError::Duplicate(incident_number.to_string()));
            }
            return Err(err.into());
        }

        let call_id = tx.last_insert_rowid();
        write_associations(&tx, call_id, draft)?;
        tx.commit()?;
        Ok(call_id)
    }

    fn update_call(&self, id: CallId, draft: &CallDraft) -> RepoResult<()> {
        draft.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE calls
             SET
                call_type = ?1,
                mutual_aid = ?2,
                address = ?3,
                town = ?4,
                location_notes = ?5,
                dispatched = ?6,
                enroute = ?7,
                on_scene = ?8,
                clear = ?9,
                narrative = ?10,
                updated_at = CURRENT_TIMESTAMP
             WHERE id = ?11;",
            params![
                draft.call_type.trim(),
                draft.mutual_aid.as_str(),
                draft.address.trim(),
                draft.town.trim(),
                draft.location_notes.trim(),
                format_timestamp(draft.timeline.dispatched),
                draft.timeline.enroute.map(format_timestamp),
                draft.timeline.on_scene.map(format_timestamp),
                draft.timeline.clear.map(format_timestamp),
                draft.narrative.trim(),
                id,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "call", id });
        }

        for table in [
            "call_apparatus",
            "call_responders",
            "call_mutual_aid_agencies",
        ] {
            tx.execute(&format!("DELETE FROM {table} WHERE call_id = ?1;"), [id])?;
        }
        write_associations(&tx, id, draft)?;
        tx.commit()?;
        Ok(())
    }

    fn get_call(&self, id: CallId) -> RepoResult<Option<CallDetail>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CALL_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let call = parse_call_row(self.conn, row)?;

        Ok(Some(CallDetail {
            apparatus: load_apparatus(self.conn, id)?,
            responders: load_responders(self.conn, id)?,
            call,
        }))
    }

    fn list_calls_by_year(&self, year: i32) -> RepoResult<Vec<Call>> {
        let prefix = format_year(year)?;
        self.query_calls(
            &format!(
                "{CALL_SELECT_SQL}
                 WHERE SUBSTR(dispatched, 1, 4) = ?
                 ORDER BY dispatched DESC, id DESC"
            ),
            vec![Value::Text(prefix)],
        )
    }

    fn list_call_years(&self) -> RepoResult<Vec<i32>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT CAST(SUBSTR(dispatched, 1, 4) AS INTEGER) AS year
             FROM calls
             ORDER BY year DESC;",
        )?;
        let years = stmt
            .query_map([], |row| row.get::<_, i32>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(years)
    }

    fn list_recent_calls(&self, limit: u32, offset: u32) -> RepoResult<Vec<Call>> {
        self.query_calls(
            &format!(
                "{CALL_SELECT_SQL}
                 ORDER BY created_at DESC, id DESC
                 LIMIT ? OFFSET ?"
            ),
            vec![
                Value::Integer(i64::from(limit)),
                Value::Integer(i64::from(offset)),
            ],
        )
    }

    fn search_calls(&self, query: &CallSearchQuery) -> RepoResult<Vec<Call>> {
        let mut sql = format!("{CALL_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(text) = non_blank(query.text.as_deref()) {
            let pattern = format!("%{}%", escape_like(text));
            sql.push_str(
                " AND (
                    incident_number LIKE ? ESCAPE '\\'
                    OR address LIKE ? ESCAPE '\\'
                    OR town LIKE ? ESCAPE '\\'
                    OR call_type LIKE ? ESCAPE '\\'
                    OR narrative LIKE ? ESCAPE '\\'
                )",
            );
            for _ in 0..5 {
                bind_values.push(Value::Text(pattern.clone()));
            }
        }

        if let Some(call_type) = non_blank(query.call_type.as_deref()) {
            sql.push_str(" AND call_type = ? COLLATE NOCASE");
            bind_values.push(Value::Text(call_type.to_string()));
        }

        if let Some(town) = non_blank(query.town.as_deref()) {
            sql.push_str(" AND town = ? COLLATE NOCASE");
            bind_values.push(Value::Text(town.to_string()));
        }

        if let Some(from) = query.dispatched_from {
            sql.push_str(" AND dispatched >= ?");
            bind_values.push(Value::Text(format_timestamp(from.and_time(chrono::NaiveTime::MIN))));
        }

        if let Some(to) = query.dispatched_to {
            let Some(next_day) = to.checked_add_days(Days::new(1)) else {
                return Err(RepoError::InvalidData(format!("date out of range: {to}")));
            };
            sql.push_str(" AND dispatched < ?");
            bind_values.push(Value::Text(format_timestamp(
                next_day.and_time(chrono::NaiveTime::MIN),
            )));
        }

        sql.push_str(" ORDER BY dispatched DESC, id DESC LIMIT ?");
        bind_values.push(Value::Integer(i64::from(normalize_search_limit(query.limit))));

        self.query_calls(&sql, bind_values)
    }

    fn year_statistics(&self, year: i32) -> RepoResult<YearStatistics> {
        let prefix = format_year(year)?;
        let (total, mutual_aid_given, mutual_aid_received) = self.conn.query_row(
            "SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN mutual_aid = 'Yes' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN mutual_aid = 'Received' THEN 1 ELSE 0 END), 0)
             FROM calls
             WHERE SUBSTR(dispatched, 1, 4) = ?1;",
            [prefix.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT call_type, COUNT(*) AS uses
             FROM calls
             WHERE SUBSTR(dispatched, 1, 4) = ?1
             GROUP BY call_type
             ORDER BY uses DESC, call_type ASC
             LIMIT 1;",
        )?;
        let mut rows = stmt.query([prefix.as_str()])?;
        let most_common_call_type = match rows.next()? {
            Some(row) => Some(row.get::<_, String>(0)?),
            None => None,
        };

        Ok(YearStatistics {
            year,
            total,
            mutual_aid_given,
            mutual_aid_received,
            most_common_call_type,
        })
    }
}

impl SqliteCallRepository<'_> {
    fn query_calls(&self, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Call>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut calls = Vec::new();
        while let Some(row) = rows.next()? {
            calls.push(parse_call_row(self.conn, row)?);
        }
        Ok(calls)
    }
}

fn write_associations(tx: &Transaction<'_>, call_id: CallId, draft: &CallDraft) -> RepoResult<()> {
    let mut seen_agencies = BTreeSet::new();
    let agencies = draft
        .mutual_aid_agencies
        .iter()
        .map(|agency| agency.trim())
        .filter(|agency| !agency.is_empty() && seen_agencies.insert(agency.to_lowercase()));
    for (position, agency) in agencies.enumerate() {
        tx.execute(
            "INSERT INTO call_mutual_aid_agencies (call_id, position, agency)
             VALUES (?1, ?2, ?3);",
            params![call_id, position as i64, agency],
        )?;
    }

    let apparatus_ids: BTreeSet<PicklistItemId> = draft.apparatus_ids.iter().copied().collect();
    for apparatus_id in apparatus_ids {
        tx.execute(
            "INSERT INTO call_apparatus (call_id, apparatus_id) VALUES (?1, ?2);",
            params![call_id, apparatus_id],
        )?;
    }

    let mut seen_responders = BTreeSet::new();
    for ResponderAssignment { user_id, role } in &draft.responders {
        if !seen_responders.insert(*user_id) {
            continue;
        }
        let role = role.as_deref().map(str::trim).filter(|role| !role.is_empty());
        tx.execute(
            "INSERT INTO call_responders (call_id, responder_id, responder_role)
             VALUES (?1, ?2, ?3);",
            params![call_id, user_id, role],
        )?;
    }

    Ok(())
}

fn parse_call_row(conn: &Connection, row: &Row<'_>) -> RepoResult<Call> {
    let id: CallId = row.get("id")?;

    let mutual_aid_text: String = row.get("mutual_aid")?;
    let mutual_aid = MutualAid::parse(&mutual_aid_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid mutual aid `{mutual_aid_text}` in calls.mutual_aid"
        ))
    })?;

    let dispatched: String = row.get("dispatched")?;
    let timeline = Timeline {
        dispatched: parse_timestamp(&dispatched, "calls.dispatched")?,
        enroute: parse_optional_timestamp(row.get("enroute")?, "calls.enroute")?,
        on_scene: parse_optional_timestamp(row.get("on_scene")?, "calls.on_scene")?,
        clear: parse_optional_timestamp(row.get("clear")?, "calls.clear")?,
    };

    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Call {
        id,
        incident_number: row.get("incident_number")?,
        call_type: row.get("call_type")?,
        mutual_aid,
        mutual_aid_agencies: load_agencies(conn, id)?,
        address: row.get("address")?,
        town: row.get("town")?,
        location_notes: row.get("location_notes")?,
        timeline,
        narrative: row.get("narrative")?,
        created_by: row.get("created_by")?,
        created_at: parse_timestamp(&created_at, "calls.created_at")?,
        updated_at: parse_timestamp(&updated_at, "calls.updated_at")?,
    })
}

fn load_agencies(conn: &Connection, call_id: CallId) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT agency
         FROM call_mutual_aid_agencies
         WHERE call_id = ?1
         ORDER BY position ASC;",
    )?;
    let agencies = stmt
        .query_map([call_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(agencies)
}

fn load_apparatus(conn: &Connection, call_id: CallId) -> RepoResult<Vec<PicklistItem>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.category, p.value, p.sort_order, p.active
         FROM call_apparatus ca
         INNER JOIN picklists p ON p.id = ca.apparatus_id
         WHERE ca.call_id = ?1
         ORDER BY p.sort_order ASC, p.value ASC;",
    )?;
    let mut rows = stmt.query([call_id])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_item_row(row)?);
    }
    Ok(items)
}

fn load_responders(conn: &Connection, call_id: CallId) -> RepoResult<Vec<CallResponder>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.first_name, u.last_name, cr.responder_role
         FROM call_responders cr
         INNER JOIN users u ON u.id = cr.responder_id
         WHERE cr.call_id = ?1
         ORDER BY u.last_name ASC, u.first_name ASC;",
    )?;
    let responders = stmt
        .query_map([call_id], |row| {
            Ok(CallResponder {
                user_id: row.get(0)?,
                first_name: row.get(1)?,
                last_name: row.get(2)?,
                role: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(responders)
}

fn format_year(year: i32) -> RepoResult<String> {
    if !(1..=9999).contains(&year) {
        return Err(RepoError::InvalidData(format!("year out of range: {year}")));
    }
    Ok(format!("{year:04}"))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn normalize_search_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => SEARCH_DEFAULT_LIMIT,
        Some(value) => value.min(SEARCH_LIMIT_MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::{escape_like, format_year, normalize_search_limit};

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn search_limit_defaults_and_clamps() {
        assert_eq!(normalize_search_limit(None), 100);
        assert_eq!(normalize_search_limit(Some(0)), 100);
        assert_eq!(normalize_search_limit(Some(20)), 20);
        assert_eq!(normalize_search_limit(Some(10_000)), 500);
    }

    #[test]
    fn years_are_zero_padded_and_bounded() {
        assert_eq!(format_year(987).unwrap(), "0987");
        assert!(format_year(0).is_err());
        assert!(format_year(10_000).is_err());
    }
}
