//! Picklist categories and items.
//!
//! Picklists back every selectable value in the call wizard and the roster
//! forms. Items are soft-deleted through `active` so stored calls keep
//! resolving their apparatus references.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type PicklistItemId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PicklistCategory {
    CallType,
    MutualAid,
    MutualAidAgencies,
    Town,
    Apparatus,
    ResponderRole,
    Position,
    EmsLevel,
}

impl PicklistCategory {
    pub const ALL: [PicklistCategory; 8] = [
        Self::CallType,
        Self::MutualAid,
        Self::MutualAidAgencies,
        Self::Town,
        Self::Apparatus,
        Self::ResponderRole,
        Self::Position,
        Self::EmsLevel,
    ];

    /// Storage key, also used by the UI.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CallType => "call_type",
            Self::MutualAid => "mutual_aid",
            Self::MutualAidAgencies => "mutual_aid_agencies",
            Self::Town => "town",
            Self::Apparatus => "apparatus",
            Self::ResponderRole => "responder_role",
            Self::Position => "position",
            Self::EmsLevel => "ems_level",
        }
    }

    pub fn parse(value: &str) -> Result<Self, PicklistValidationError> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == value.trim())
            .ok_or_else(|| PicklistValidationError::UnknownCategory(value.to_string()))
    }
}

impl Display for PicklistCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PicklistItem {
    pub id: PicklistItemId,
    pub category: PicklistCategory,
    pub value: String,
    pub sort_order: i64,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PicklistValidationError {
    EmptyValue,
    UnknownCategory(String),
}

impl Display for PicklistValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyValue => write!(f, "picklist value cannot be empty"),
            Self::UnknownCategory(value) => write!(f, "unknown picklist category `{value}`"),
        }
    }
}

impl Error for PicklistValidationError {}

/// Trims `value` and rejects blanks.
pub fn normalize_value(value: &str) -> Result<String, PicklistValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PicklistValidationError::EmptyValue);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::{normalize_value, PicklistCategory, PicklistValidationError};

    #[test]
    fn every_category_parses_from_its_storage_key() {
        for category in PicklistCategory::ALL {
            assert_eq!(PicklistCategory::parse(category.as_str()), Ok(category));
        }
        assert!(matches!(
            PicklistCategory::parse("colors"),
            Err(PicklistValidationError::UnknownCategory(_))
        ));
    }

    #[test]
    fn blank_values_are_rejected() {
        assert_eq!(normalize_value("  "), Err(PicklistValidationError::EmptyValue));
        assert_eq!(normalize_value(" Engine 3 ").unwrap(), "Engine 3");
    }
}
