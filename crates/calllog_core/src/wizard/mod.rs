//! Call-entry wizard.
//!
//! # Responsibility
//! - Walk the dispatcher through the ordered call steps, including the
//!   conditional mutual-aid agencies step.
//! - Validate each step before advancing and the whole call before save.
//!
//! # Invariants
//! - A rejected action leaves the wizard state unchanged.
//! - The summary is recomputed from state after every change.

use crate::service::call_service::CallServiceError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod clock;
mod controller;
pub mod fields;
pub mod step;
pub mod validate;

pub use clock::{Clock, FixedClock, SystemClock};
pub use controller::{
    CallGateway, DayPreset, WizardController, WizardState, WizardSummary,
    INCIDENT_NUMBER_PLACEHOLDER,
};
pub use fields::{DateTimeInput, FieldKey, FieldValue, WizardFields};
pub use step::{StepDescriptor, StepId};
pub use validate::WizardValidationError;

#[derive(Debug)]
pub enum WizardError {
    Validation(WizardValidationError),
    /// The value kind does not fit the field, e.g. text for apparatus.
    FieldTypeMismatch(FieldKey),
    /// A sub-input could not be parsed.
    InvalidInput(String),
    BlankAgency,
    DuplicateAgency(String),
    /// Agencies can only be entered while mutual aid is `Yes`.
    AgenciesNotAllowed,
    Service(CallServiceError),
}

impl Display for WizardError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::FieldTypeMismatch(key) => {
                write!(f, "value does not fit field `{}`", key.as_str())
            }
            Self::InvalidInput(message) => write!(f, "{message}"),
            Self::BlankAgency => write!(f, "Please enter an agency name"),
            Self::DuplicateAgency(name) => write!(f, "`{name}` is already listed"),
            Self::AgenciesNotAllowed => {
                write!(f, "Agencies can only be added when mutual aid is Yes")
            }
            Self::Service(err) => write!(f, "{err}"),
        }
    }
}

impl Error for WizardError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Service(err) => Some(err),
            _ => None,
        }
    }
}

impl From<WizardValidationError> for WizardError {
    fn from(value: WizardValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<CallServiceError> for WizardError {
    fn from(value: CallServiceError) -> Self {
        Self::Service(value)
    }
}
