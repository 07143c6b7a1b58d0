//! CSV rendering of fetched call lists.
//!
//! # Invariants
//! - Output is a string; callers decide where it is written.
//! - Cells starting with `=`, `+`, `-` or `@` are prefixed with `'`.
//! - Cells holding separators, quotes or newlines are quoted.

use crate::model::call::Call;
use crate::model::user::UserId;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;

pub const CSV_COLUMNS: [&str; 14] = [
    "Date",
    "Incident #",
    "Call Type",
    "Mutual Aid",
    "Mutual Aid Agencies",
    "Address",
    "Town",
    "Location Notes",
    "Dispatched",
    "Enroute",
    "On Scene",
    "Clear",
    "Narrative",
    "Created By",
];

const DATE_FORMAT: &str = "%m/%d/%Y";
const TIME_FORMAT: &str = "%H:%M";
const AGENCY_SEPARATOR: &str = "; ";

/// Renders `calls` with a header row. `creator_names` maps user ids to the
/// name shown in `Created By`; unknown ids render blank.
pub fn calls_to_csv(calls: &[Call], creator_names: &HashMap<UserId, String>) -> String {
    let mut out = String::new();
    push_row(&mut out, CSV_COLUMNS.iter().map(|column| column.to_string()));

    for call in calls {
        let timeline = &call.timeline;
        push_row(
            &mut out,
            [
                timeline.dispatched.format(DATE_FORMAT).to_string(),
                call.incident_number.clone(),
                call.call_type.clone(),
                call.mutual_aid.to_string(),
                call.mutual_aid_agencies.join(AGENCY_SEPARATOR),
                call.address.clone(),
                call.town.clone(),
                call.location_notes.clone(),
                format_time(Some(timeline.dispatched)),
                format_time(timeline.enroute),
                format_time(timeline.on_scene),
                format_time(timeline.clear),
                call.narrative.clone(),
                creator_names
                    .get(&call.created_by)
                    .cloned()
                    .unwrap_or_default(),
            ],
        );
    }
    out
}

/// `calls-export-YYYY-MM-DD.csv` for the given local date.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("calls-export-{}.csv", date.format("%Y-%m-%d"))
}

fn push_row(out: &mut String, cells: impl IntoIterator<Item = String>) {
    let line = cells
        .into_iter()
        .map(|cell| csv_escape(&cell))
        .collect::<Vec<_>>()
        .join(",");
    out.push_str(&line);
    out.push('\n');
}

fn format_time(value: Option<NaiveDateTime>) -> String {
    value
        .map(|at| at.format(TIME_FORMAT).to_string())
        .unwrap_or_default()
}

fn should_neutralize(value: &str) -> bool {
    let trimmed = value.trim_start();
    matches!(trimmed.chars().next(), Some('=' | '+' | '-' | '@'))
}

fn csv_escape(value: &str) -> String {
    let safe = if should_neutralize(value) {
        format!("'{value}")
    } else {
        value.to_string()
    };
    if safe.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", safe.replace('"', "\"\""))
    } else {
        safe
    }
}

#[cfg(test)]
mod tests {
    use super::{csv_escape, export_file_name};
    use chrono::NaiveDate;

    #[test]
    fn formulas_are_neutralized_before_quoting() {
        assert_eq!(csv_escape("=SUM(A1:A2)"), "'=SUM(A1:A2)");
        assert_eq!(csv_escape("-5, north"), "\"'-5, north\"");
        assert_eq!(csv_escape("  @cmd"), "'  @cmd");
    }

    #[test]
    fn quotes_and_newlines_force_quoting() {
        assert_eq!(csv_escape("said \"hi\""), "\"said \"\"hi\"\"\"");
        assert_eq!(csv_escape("line1\nline2"), "\"line1\nline2\"");
        assert_eq!(csv_escape("plain"), "plain");
    }

    #[test]
    fn file_name_uses_iso_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(export_file_name(date), "calls-export-2024-03-09.csv");
    }
}
