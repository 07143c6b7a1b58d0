//! Call record model and timeline rules.
//!
//! # Invariants
//! - `dispatched` is always present; `enroute`, `on_scene`, `clear` are optional.
//! - Present timestamps never go backwards along
//!   dispatched -> enroute -> on scene -> clear.
//! - Mutual-aid agencies are only kept when mutual aid is `Yes`.

use crate::model::picklist::{PicklistItem, PicklistItemId};
use crate::model::user::UserId;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CallId = i64;

/// Whether the department gave or received assistance on a call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutualAid {
    #[default]
    No,
    /// Assistance given to another agency.
    Yes,
    /// Assistance received from another agency.
    Received,
}

impl MutualAid {
    pub const ALL: [MutualAid; 3] = [Self::No, Self::Yes, Self::Received];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::No => "No",
            Self::Yes => "Yes",
            Self::Received => "Received",
        }
    }

    /// Parses the picklist spelling; matching ignores case and surrounding spaces.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str().eq_ignore_ascii_case(trimmed))
    }
}

impl Display for MutualAid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the four timeline checkpoints of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimelineField {
    Dispatched,
    Enroute,
    OnScene,
    Clear,
}

impl TimelineField {
    pub const ALL: [TimelineField; 4] = [
        Self::Dispatched,
        Self::Enroute,
        Self::OnScene,
        Self::Clear,
    ];

    /// Label used at the start of a sentence.
    pub fn label(self) -> &'static str {
        match self {
            Self::Dispatched => "Dispatched",
            Self::Enroute => "Enroute",
            Self::OnScene => "On scene",
            Self::Clear => "Clear",
        }
    }

    fn label_lower(self) -> &'static str {
        match self {
            Self::Dispatched => "dispatched",
            Self::Enroute => "enroute",
            Self::OnScene => "on scene",
            Self::Clear => "clear",
        }
    }
}

/// The four timestamps of a call, in local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    pub dispatched: NaiveDateTime,
    pub enroute: Option<NaiveDateTime>,
    pub on_scene: Option<NaiveDateTime>,
    pub clear: Option<NaiveDateTime>,
}

impl Timeline {
    pub fn get(&self, field: TimelineField) -> Option<NaiveDateTime> {
        match field {
            TimelineField::Dispatched => Some(self.dispatched),
            TimelineField::Enroute => self.enroute,
            TimelineField::OnScene => self.on_scene,
            TimelineField::Clear => self.clear,
        }
    }

    /// Checks every ordered pair where both ends are present.
    pub fn validate(&self) -> Result<(), CallValidationError> {
        self.first_violation(|_| true)
    }

    /// Checks only the pairs that involve `field`.
    pub fn validate_field(&self, field: TimelineField) -> Result<(), CallValidationError> {
        self.first_violation(|pair| pair.0 == field || pair.1 == field)
    }

    fn first_violation(
        &self,
        include: impl Fn((TimelineField, TimelineField)) -> bool,
    ) -> Result<(), CallValidationError> {
        for (index, later) in TimelineField::ALL.iter().copied().enumerate() {
            let Some(later_at) = self.get(later) else {
                continue;
            };
            for earlier in TimelineField::ALL[..index].iter().copied() {
                if !include((later, earlier)) {
                    continue;
                }
                if let Some(earlier_at) = self.get(earlier) {
                    if later_at < earlier_at {
                        return Err(CallValidationError::OutOfOrder { later, earlier });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Validation failures for call drafts and stored calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallValidationError {
    /// A required text field is blank; carries the field label.
    MissingField(&'static str),
    /// `later` happened before `earlier`.
    OutOfOrder {
        later: TimelineField,
        earlier: TimelineField,
    },
    /// Timestamp lies after the validation clock.
    InFuture(TimelineField),
    /// Agencies were listed although mutual aid is not `Yes`.
    AgenciesWithoutMutualAid,
}

impl Display for CallValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(label) => write!(f, "{label} is required"),
            Self::OutOfOrder { later, earlier } => write!(
                f,
                "{} time cannot be before {} time",
                later.label(),
                earlier.label_lower()
            ),
            Self::InFuture(field) => write!(f, "{} time cannot be in the future", field.label()),
            Self::AgenciesWithoutMutualAid => {
                write!(f, "mutual aid agencies require mutual aid `Yes`")
            }
        }
    }
}

impl Error for CallValidationError {}

/// A responder attached to a call, with an optional role such as `Driver`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponderAssignment {
    pub user_id: UserId,
    pub role: Option<String>,
}

/// Everything needed to store a new call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallDraft {
    /// `None` lets the call service allocate the next number for the year.
    pub incident_number: Option<String>,
    pub call_type: String,
    pub mutual_aid: MutualAid,
    pub mutual_aid_agencies: Vec<String>,
    pub address: String,
    pub town: String,
    pub location_notes: String,
    pub timeline: Timeline,
    pub narrative: String,
    pub created_by: UserId,
    pub apparatus_ids: Vec<PicklistItemId>,
    pub responders: Vec<ResponderAssignment>,
}

impl CallDraft {
    /// Presence and ordering checks shared by create and update paths.
    pub fn validate(&self) -> Result<(), CallValidationError> {
        if self.call_type.trim().is_empty() {
            return Err(CallValidationError::MissingField("Call Type"));
        }
        if self.address.trim().is_empty() {
            return Err(CallValidationError::MissingField("Address"));
        }
        if self.narrative.trim().is_empty() {
            return Err(CallValidationError::MissingField("Narrative"));
        }
        if self.mutual_aid != MutualAid::Yes && !self.mutual_aid_agencies.is_empty() {
            return Err(CallValidationError::AgenciesWithoutMutualAid);
        }
        self.timeline.validate()
    }
}

/// Stored call row. `created_at`/`updated_at` are UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub id: CallId,
    pub incident_number: String,
    pub call_type: String,
    pub mutual_aid: MutualAid,
    pub mutual_aid_agencies: Vec<String>,
    pub address: String,
    pub town: String,
    pub location_notes: String,
    pub timeline: Timeline,
    pub narrative: String,
    pub created_by: UserId,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Responder row joined with the user's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallResponder {
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub role: Option<String>,
}

/// A call with its apparatus and responder associations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallDetail {
    pub call: Call,
    pub apparatus: Vec<PicklistItem>,
    pub responders: Vec<CallResponder>,
}

#[cfg(test)]
mod tests {
    use super::{CallValidationError, MutualAid, Timeline, TimelineField};
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn mutual_aid_parses_case_insensitively() {
        assert_eq!(MutualAid::parse(" yes "), Some(MutualAid::Yes));
        assert_eq!(MutualAid::parse("RECEIVED"), Some(MutualAid::Received));
        assert_eq!(MutualAid::parse("maybe"), None);
    }

    #[test]
    fn enroute_before_dispatched_is_rejected() {
        let timeline = Timeline {
            dispatched: at(10, 0),
            enroute: Some(at(9, 30)),
            on_scene: None,
            clear: None,
        };
        let err = timeline.validate().unwrap_err();
        assert_eq!(
            err,
            CallValidationError::OutOfOrder {
                later: TimelineField::Enroute,
                earlier: TimelineField::Dispatched,
            }
        );
        assert_eq!(err.to_string(), "Enroute time cannot be before dispatched time");
    }

    #[test]
    fn gaps_in_the_timeline_still_compare_present_ends() {
        let timeline = Timeline {
            dispatched: at(10, 0),
            enroute: None,
            on_scene: Some(at(10, 30)),
            clear: Some(at(10, 15)),
        };
        let err = timeline.validate().unwrap_err();
        assert_eq!(err.to_string(), "Clear time cannot be before on scene time");
    }

    #[test]
    fn validate_field_ignores_unrelated_pairs() {
        let timeline = Timeline {
            dispatched: at(10, 0),
            enroute: Some(at(10, 5)),
            on_scene: Some(at(10, 20)),
            clear: Some(at(10, 10)),
        };
        assert!(timeline.validate_field(TimelineField::Enroute).is_ok());
        assert!(timeline.validate_field(TimelineField::Clear).is_err());
    }

    #[test]
    fn equal_timestamps_are_allowed() {
        let timeline = Timeline {
            dispatched: at(10, 0),
            enroute: Some(at(10, 0)),
            on_scene: Some(at(10, 0)),
            clear: Some(at(10, 0)),
        };
        assert!(timeline.validate().is_ok());
    }
}
