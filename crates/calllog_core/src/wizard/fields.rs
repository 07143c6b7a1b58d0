//! Transient wizard field values.
//!
//! # Invariants
//! - Agencies are non-blank, unique ignoring case, and only held while
//!   mutual aid is `Yes`.
//! - Times carry minute precision.

use crate::model::call::{MutualAid, ResponderAssignment, TimelineField};
use crate::model::picklist::PicklistItemId;
use crate::wizard::WizardError;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

const DATE_INPUT_FORMAT: &str = "%Y-%m-%d";
const TIME_INPUT_FORMAT: &str = "%H:%M";

/// The logical field behind each wizard step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    Dispatched,
    CallType,
    MutualAid,
    MutualAidAgencies,
    Address,
    Town,
    LocationNotes,
    Apparatus,
    Responders,
    Enroute,
    OnScene,
    Clear,
    Narrative,
}

impl FieldKey {
    pub const ALL: [FieldKey; 13] = [
        Self::Dispatched,
        Self::CallType,
        Self::MutualAid,
        Self::MutualAidAgencies,
        Self::Address,
        Self::Town,
        Self::LocationNotes,
        Self::Apparatus,
        Self::Responders,
        Self::Enroute,
        Self::OnScene,
        Self::Clear,
        Self::Narrative,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dispatched => "dispatched",
            Self::CallType => "call_type",
            Self::MutualAid => "mutual_aid",
            Self::MutualAidAgencies => "mutual_aid_agencies",
            Self::Address => "address",
            Self::Town => "town",
            Self::LocationNotes => "location_notes",
            Self::Apparatus => "apparatus",
            Self::Responders => "responders",
            Self::Enroute => "enroute",
            Self::OnScene => "on_scene",
            Self::Clear => "clear",
            Self::Narrative => "narrative",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == value.trim())
    }

    /// The timeline checkpoint this field feeds, if any.
    pub fn timeline_field(self) -> Option<TimelineField> {
        match self {
            Self::Dispatched => Some(TimelineField::Dispatched),
            Self::Enroute => Some(TimelineField::Enroute),
            Self::OnScene => Some(TimelineField::OnScene),
            Self::Clear => Some(TimelineField::Clear),
            _ => None,
        }
    }
}

/// Separate date and time sub-inputs, combined on advance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateTimeInput {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
}

impl DateTimeInput {
    pub fn new(date: Option<NaiveDate>, time: Option<NaiveTime>) -> Self {
        Self {
            date,
            time: time.map(truncate_to_minute),
        }
    }

    /// Parses `YYYY-MM-DD` and `HH:MM`; blank strings mean "not entered".
    pub fn parse(date: &str, time: &str) -> Result<Self, WizardError> {
        let date = match date.trim() {
            "" => None,
            text => Some(NaiveDate::parse_from_str(text, DATE_INPUT_FORMAT).map_err(|_| {
                WizardError::InvalidInput(format!("invalid date `{text}`, expected YYYY-MM-DD"))
            })?),
        };
        let time = match time.trim() {
            "" => None,
            text => Some(NaiveTime::parse_from_str(text, TIME_INPUT_FORMAT).map_err(|_| {
                WizardError::InvalidInput(format!("invalid time `{text}`, expected HH:MM"))
            })?),
        };
        Ok(Self::new(date, time))
    }

    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.time.is_none()
    }

    pub fn combined(&self) -> Option<NaiveDateTime> {
        Some(self.date?.and_time(self.time?))
    }
}

/// A value handed to [`crate::wizard::WizardController::set_field`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    DateTime(DateTimeInput),
    MutualAid(MutualAid),
    Agencies(Vec<String>),
    Apparatus(Vec<PicklistItemId>),
    Responders(Vec<ResponderAssignment>),
}

/// All values captured by one call-entry session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardFields {
    pub dispatched: DateTimeInput,
    pub call_type: String,
    pub mutual_aid: MutualAid,
    pub mutual_aid_agencies: Vec<String>,
    pub address: String,
    pub town: String,
    pub location_notes: String,
    pub apparatus_ids: Vec<PicklistItemId>,
    pub responders: Vec<ResponderAssignment>,
    pub enroute: DateTimeInput,
    pub on_scene: DateTimeInput,
    pub clear: DateTimeInput,
    pub narrative: String,
}

impl WizardFields {
    /// Empty fields with dispatched preset to `now`.
    pub fn initial(now: NaiveDateTime) -> Self {
        Self {
            dispatched: DateTimeInput::new(Some(now.date()), Some(now.time())),
            call_type: String::new(),
            mutual_aid: MutualAid::No,
            mutual_aid_agencies: Vec::new(),
            address: String::new(),
            town: String::new(),
            location_notes: String::new(),
            apparatus_ids: Vec::new(),
            responders: Vec::new(),
            enroute: DateTimeInput::default(),
            on_scene: DateTimeInput::default(),
            clear: DateTimeInput::default(),
            narrative: String::new(),
        }
    }

    pub fn agencies_visible(&self) -> bool {
        self.mutual_aid == MutualAid::Yes
    }

    pub fn date_time(&self, field: TimelineField) -> &DateTimeInput {
        match field {
            TimelineField::Dispatched => &self.dispatched,
            TimelineField::Enroute => &self.enroute,
            TimelineField::OnScene => &self.on_scene,
            TimelineField::Clear => &self.clear,
        }
    }

    pub fn date_time_mut(&mut self, field: TimelineField) -> &mut DateTimeInput {
        match field {
            TimelineField::Dispatched => &mut self.dispatched,
            TimelineField::Enroute => &mut self.enroute,
            TimelineField::OnScene => &mut self.on_scene,
            TimelineField::Clear => &mut self.clear,
        }
    }

    /// True when the field holds something a dispatcher typed or picked.
    pub fn is_filled(&self, key: FieldKey) -> bool {
        match key {
            FieldKey::CallType => !self.call_type.trim().is_empty(),
            FieldKey::Address => !self.address.trim().is_empty(),
            FieldKey::Town => !self.town.trim().is_empty(),
            FieldKey::LocationNotes => !self.location_notes.trim().is_empty(),
            FieldKey::Narrative => !self.narrative.trim().is_empty(),
            FieldKey::MutualAid => true,
            FieldKey::MutualAidAgencies => !self.mutual_aid_agencies.is_empty(),
            FieldKey::Apparatus => !self.apparatus_ids.is_empty(),
            FieldKey::Responders => !self.responders.is_empty(),
            FieldKey::Dispatched | FieldKey::Enroute | FieldKey::OnScene | FieldKey::Clear => key
                .timeline_field()
                .is_some_and(|field| self.date_time(field).combined().is_some()),
        }
    }

    /// Writes `value` into `key`, rejecting mismatched value kinds.
    ///
    /// Setting mutual aid to anything but `Yes` drops the agency list.
    pub(crate) fn apply(&mut self, key: FieldKey, value: FieldValue) -> Result<(), WizardError> {
        match (key, value) {
            (FieldKey::CallType, FieldValue::Text(text)) => self.call_type = text,
            (FieldKey::Address, FieldValue::Text(text)) => self.address = text,
            (FieldKey::Town, FieldValue::Text(text)) => self.town = text,
            (FieldKey::LocationNotes, FieldValue::Text(text)) => self.location_notes = text,
            (FieldKey::Narrative, FieldValue::Text(text)) => self.narrative = text,
            (FieldKey::MutualAid, FieldValue::MutualAid(value)) => self.set_mutual_aid(value),
            (FieldKey::MutualAid, FieldValue::Text(text)) => {
                let value = MutualAid::parse(&text).ok_or_else(|| {
                    WizardError::InvalidInput(format!("unknown mutual aid value `{text}`"))
                })?;
                self.set_mutual_aid(value);
            }
            (FieldKey::MutualAidAgencies, FieldValue::Agencies(agencies)) => {
                if !self.agencies_visible() && !agencies.is_empty() {
                    return Err(WizardError::AgenciesNotAllowed);
                }
                let mut normalized: Vec<String> = Vec::with_capacity(agencies.len());
                for agency in &agencies {
                    push_agency(&mut normalized, agency)?;
                }
                self.mutual_aid_agencies = normalized;
            }
            (FieldKey::Apparatus, FieldValue::Apparatus(ids)) => self.apparatus_ids = ids,
            (FieldKey::Responders, FieldValue::Responders(responders)) => {
                self.responders = responders
            }
            (
                FieldKey::Dispatched | FieldKey::Enroute | FieldKey::OnScene | FieldKey::Clear,
                FieldValue::DateTime(input),
            ) => {
                if let Some(field) = key.timeline_field() {
                    *self.date_time_mut(field) = DateTimeInput::new(input.date, input.time);
                }
            }
            (key, _) => return Err(WizardError::FieldTypeMismatch(key)),
        }
        Ok(())
    }

    pub(crate) fn add_agency(&mut self, agency: &str) -> Result<(), WizardError> {
        if !self.agencies_visible() {
            return Err(WizardError::AgenciesNotAllowed);
        }
        push_agency(&mut self.mutual_aid_agencies, agency)
    }

    /// Removes `agency` (case-insensitive). Returns whether anything was removed.
    pub(crate) fn remove_agency(&mut self, agency: &str) -> bool {
        let before = self.mutual_aid_agencies.len();
        let target = agency.trim();
        self.mutual_aid_agencies
            .retain(|existing| !existing.eq_ignore_ascii_case(target));
        self.mutual_aid_agencies.len() != before
    }

    fn set_mutual_aid(&mut self, value: MutualAid) {
        self.mutual_aid = value;
        if value != MutualAid::Yes {
            self.mutual_aid_agencies.clear();
        }
    }
}

fn push_agency(agencies: &mut Vec<String>, agency: &str) -> Result<(), WizardError> {
    let trimmed = agency.trim();
    if trimmed.is_empty() {
        return Err(WizardError::BlankAgency);
    }
    if agencies
        .iter()
        .any(|existing| existing.eq_ignore_ascii_case(trimmed))
    {
        return Err(WizardError::DuplicateAgency(trimmed.to_string()));
    }
    agencies.push(trimmed.to_string());
    Ok(())
}

pub(crate) fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    time.with_second(0)
        .and_then(|time| time.with_nanosecond(0))
        .unwrap_or(time)
}

#[cfg(test)]
mod tests {
    use super::{DateTimeInput, FieldKey, FieldValue, WizardFields};
    use crate::model::call::MutualAid;
    use crate::wizard::WizardError;
    use chrono::{NaiveDate, NaiveTime};

    fn fields() -> WizardFields {
        WizardFields::initial(
            NaiveDate::from_ymd_opt(2024, 1, 5)
                .unwrap()
                .and_hms_opt(10, 42, 37)
                .unwrap(),
        )
    }

    #[test]
    fn initial_dispatched_time_drops_seconds() {
        let fields = fields();
        assert_eq!(
            fields.dispatched.time,
            NaiveTime::from_hms_opt(10, 42, 0)
        );
        assert!(fields.enroute.is_empty());
    }

    #[test]
    fn parse_accepts_blank_sub_inputs() {
        let input = DateTimeInput::parse("2024-01-05", "").unwrap();
        assert_eq!(input.date, NaiveDate::from_ymd_opt(2024, 1, 5));
        assert_eq!(input.time, None);
        assert_eq!(input.combined(), None);
        assert!(matches!(
            DateTimeInput::parse("01/05/2024", "10:00"),
            Err(WizardError::InvalidInput(_))
        ));
    }

    #[test]
    fn mismatched_value_kind_is_rejected() {
        let mut fields = fields();
        let err = fields
            .apply(FieldKey::Address, FieldValue::Apparatus(vec![1]))
            .unwrap_err();
        assert!(matches!(err, WizardError::FieldTypeMismatch(FieldKey::Address)));
    }

    #[test]
    fn leaving_yes_clears_agencies() {
        let mut fields = fields();
        fields
            .apply(FieldKey::MutualAid, FieldValue::Text("Yes".into()))
            .unwrap();
        fields.add_agency("Readsboro Fire Dept").unwrap();
        fields
            .apply(FieldKey::MutualAid, FieldValue::MutualAid(MutualAid::Received))
            .unwrap();
        assert!(fields.mutual_aid_agencies.is_empty());
        assert!(matches!(
            fields.add_agency("Pownal Fire Dept"),
            Err(WizardError::AgenciesNotAllowed)
        ));
    }

    #[test]
    fn agencies_reject_blank_and_duplicate_names() {
        let mut fields = fields();
        fields
            .apply(FieldKey::MutualAid, FieldValue::MutualAid(MutualAid::Yes))
            .unwrap();
        fields.add_agency(" Pownal Fire Dept ").unwrap();
        assert!(matches!(fields.add_agency("   "), Err(WizardError::BlankAgency)));
        assert!(matches!(
            fields.add_agency("pownal fire dept"),
            Err(WizardError::DuplicateAgency(_))
        ));
        assert!(fields.remove_agency("POWNAL FIRE DEPT"));
        assert!(fields.mutual_aid_agencies.is_empty());
    }

    #[test]
    fn field_keys_round_trip_through_storage_names() {
        assert_eq!(FieldKey::parse("on_scene"), Some(FieldKey::OnScene));
        assert_eq!(FieldKey::parse("unknown"), None);
    }
}
