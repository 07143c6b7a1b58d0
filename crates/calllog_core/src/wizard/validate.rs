//! Pure validation rules for wizard steps and save.
//!
//! Nothing here mutates state; the controller applies a rule and only moves
//! on when it returns `Ok`.

use crate::model::call::{CallValidationError, Timeline, TimelineField};
use crate::wizard::fields::WizardFields;
use crate::wizard::step::StepDescriptor;
use chrono::NaiveDateTime;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Labels checked by save, in the order they are reported.
const SAVE_REQUIRED: [(&str, SaveCheck); 4] = [
    ("Call Type", SaveCheck::CallType),
    ("Address", SaveCheck::Address),
    ("Dispatched Time", SaveCheck::Dispatched),
    ("Narrative", SaveCheck::Narrative),
];

#[derive(Clone, Copy)]
enum SaveCheck {
    CallType,
    Address,
    Dispatched,
    Narrative,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardValidationError {
    /// The current step's field is required and empty.
    Required(&'static str),
    /// Only one of the date/time sub-inputs was entered.
    IncompleteDateTime(TimelineField),
    Timeline(CallValidationError),
    /// Save found these required fields empty.
    MissingForSave(Vec<&'static str>),
}

impl Display for WizardValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Required(_) => write!(f, "This field is required"),
            Self::IncompleteDateTime(_) => write!(f, "Please enter both date and time"),
            Self::Timeline(err) => write!(f, "{err}"),
            Self::MissingForSave(labels) => write!(
                f,
                "Please fill in all required fields. Missing: {}",
                labels.join(", ")
            ),
        }
    }
}

impl Error for WizardValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Timeline(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CallValidationError> for WizardValidationError {
    fn from(value: CallValidationError) -> Self {
        Self::Timeline(value)
    }
}

/// Combines one date/time pair. Both blank is `None`; one blank is an error.
/// Dispatched always needs both.
pub fn combine_date_time(
    fields: &WizardFields,
    field: TimelineField,
) -> Result<Option<NaiveDateTime>, WizardValidationError> {
    let input = fields.date_time(field);
    if input.is_empty() && field != TimelineField::Dispatched {
        return Ok(None);
    }
    input
        .combined()
        .map(Some)
        .ok_or(WizardValidationError::IncompleteDateTime(field))
}

pub fn check_not_future(
    field: TimelineField,
    at: NaiveDateTime,
    now: NaiveDateTime,
) -> Result<(), WizardValidationError> {
    if at > now {
        return Err(CallValidationError::InFuture(field).into());
    }
    Ok(())
}

/// Timeline built from whatever is complete; incomplete inputs count as absent.
/// `None` when dispatched itself is incomplete.
pub fn partial_timeline(fields: &WizardFields) -> Option<Timeline> {
    Some(Timeline {
        dispatched: fields.dispatched.combined()?,
        enroute: fields.enroute.combined(),
        on_scene: fields.on_scene.combined(),
        clear: fields.clear.combined(),
    })
}

/// Rules applied when advancing past `step`.
pub fn validate_step(
    step: &StepDescriptor,
    fields: &WizardFields,
    now: NaiveDateTime,
) -> Result<(), WizardValidationError> {
    if let Some(field) = step.field.timeline_field() {
        let Some(at) = combine_date_time(fields, field)? else {
            return Ok(());
        };
        check_not_future(field, at, now)?;
        if let Some(timeline) = partial_timeline(fields) {
            timeline.validate_field(field)?;
        }
        return Ok(());
    }

    if step.required && !fields.is_filled(step.field) {
        return Err(WizardValidationError::Required(step.label));
    }
    Ok(())
}

/// Labels of required fields that save would reject, in report order.
pub fn missing_for_save(fields: &WizardFields) -> Vec<&'static str> {
    SAVE_REQUIRED
        .iter()
        .filter(|(_, check)| match check {
            SaveCheck::CallType => fields.call_type.trim().is_empty(),
            SaveCheck::Address => fields.address.trim().is_empty(),
            SaveCheck::Dispatched => fields.dispatched.combined().is_none(),
            SaveCheck::Narrative => fields.narrative.trim().is_empty(),
        })
        .map(|(label, _)| *label)
        .collect()
}

/// Full check run by save: presence, completeness, clock and ordering.
pub fn validate_for_save(
    fields: &WizardFields,
    now: NaiveDateTime,
) -> Result<Timeline, WizardValidationError> {
    let missing = missing_for_save(fields);
    if !missing.is_empty() {
        return Err(WizardValidationError::MissingForSave(missing));
    }

    let mut combined = [None; 4];
    for (slot, field) in combined.iter_mut().zip(TimelineField::ALL) {
        *slot = combine_date_time(fields, field)?;
        if let Some(at) = *slot {
            check_not_future(field, at, now)?;
        }
    }

    let [Some(dispatched), enroute, on_scene, clear] = combined else {
        return Err(WizardValidationError::MissingForSave(vec!["Dispatched Time"]));
    };
    let timeline = Timeline {
        dispatched,
        enroute,
        on_scene,
        clear,
    };
    timeline.validate()?;
    Ok(timeline)
}
