//! Wizard state machine.
//!
//! # Invariants
//! - `state.step` always names a step that was visible when it was entered.
//! - Failed `set_field`/`next`/`save` calls leave `state` untouched.
//! - The incident number shown is a proposal; it is only fixed at save.

use crate::model::call::{CallDetail, CallDraft, TimelineField};
use crate::model::user::UserId;
use crate::repo::call_repo::CallRepository;
use crate::repo::settings_repo::SettingsRepository;
use crate::service::call_service::{CallService, CallServiceError};
use crate::wizard::clock::Clock;
use crate::wizard::fields::{DateTimeInput, FieldKey, FieldValue, WizardFields};
use crate::wizard::step::{
    descriptor, next_visible, previous_visible, visible_position, StepDescriptor, StepId,
    FIRST_STEP,
};
use crate::wizard::validate::{validate_for_save, validate_step};
use crate::wizard::WizardError;
use chrono::{Datelike, Days};
use log::{info, warn};
use serde::{Deserialize, Serialize};

pub const INCIDENT_NUMBER_PLACEHOLDER: &str = "Enter date first";

/// The two call-service operations the wizard depends on.
pub trait CallGateway {
    fn next_incident_number(&self, year: i32) -> Result<String, CallServiceError>;
    fn create_call(&self, draft: &CallDraft) -> Result<CallDetail, CallServiceError>;
}

impl<G: CallGateway + ?Sized> CallGateway for &G {
    fn next_incident_number(&self, year: i32) -> Result<String, CallServiceError> {
        (**self).next_incident_number(year)
    }

    fn create_call(&self, draft: &CallDraft) -> Result<CallDetail, CallServiceError> {
        (**self).create_call(draft)
    }
}

impl<R: CallRepository, S: SettingsRepository> CallGateway for CallService<R, S> {
    fn next_incident_number(&self, year: i32) -> Result<String, CallServiceError> {
        CallService::next_incident_number(self, year)
    }

    fn create_call(&self, draft: &CallDraft) -> Result<CallDetail, CallServiceError> {
        CallService::create_call(self, draft)
    }
}

/// Dispatched-date shortcuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayPreset {
    Today,
    Yesterday,
}

/// Display-ready facts derived from step and fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardSummary {
    pub step_number: String,
    pub step_label: String,
    /// 1-based among visible steps.
    pub position: usize,
    pub visible_steps: usize,
    pub is_first_step: bool,
    pub is_last_step: bool,
    pub agencies_visible: bool,
    /// Proposed number for the dispatched year, when one was fetched.
    pub incident_number: Option<String>,
    /// The proposed number, or the placeholder.
    pub incident_display: String,
    pub header_visible: bool,
}

impl WizardSummary {
    fn derive(step: StepId, fields: &WizardFields, incident_number: Option<String>) -> Self {
        let current = descriptor(step);
        let (position, visible_steps) = visible_position(step, fields);
        Self {
            step_number: current.number.to_string(),
            step_label: current.label.to_string(),
            position,
            visible_steps,
            is_first_step: previous_visible(step, fields).is_none(),
            is_last_step: next_visible(step, fields).is_none(),
            agencies_visible: fields.agencies_visible(),
            incident_display: incident_number
                .clone()
                .unwrap_or_else(|| INCIDENT_NUMBER_PLACEHOLDER.to_string()),
            header_visible: incident_number.is_some(),
            incident_number,
        }
    }
}

/// Plain-data wizard state; safe to keep between FFI calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardState {
    pub step: StepId,
    pub fields: WizardFields,
    pub summary: WizardSummary,
}

impl WizardState {
    pub fn initial(now: chrono::NaiveDateTime) -> Self {
        let fields = WizardFields::initial(now);
        let summary = WizardSummary::derive(FIRST_STEP, &fields, None);
        Self {
            step: FIRST_STEP,
            fields,
            summary,
        }
    }
}

pub struct WizardController<G: CallGateway, C: Clock> {
    gateway: G,
    clock: C,
    state: WizardState,
}

impl<G: CallGateway, C: Clock> WizardController<G, C> {
    /// Starts a new call and requests the number for the default dispatched date.
    pub fn new(gateway: G, clock: C) -> Self {
        let state = WizardState::initial(clock.now());
        let mut controller = Self {
            gateway,
            clock,
            state,
        };
        controller.refresh_incident_number();
        controller.refresh_summary();
        controller
    }

    /// Re-attaches saved state to fresh collaborators.
    pub fn resume(gateway: G, clock: C, state: WizardState) -> Self {
        let mut controller = Self {
            gateway,
            clock,
            state,
        };
        controller.refresh_summary();
        controller
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn into_state(self) -> WizardState {
        self.state
    }

    pub fn current_step(&self) -> &'static StepDescriptor {
        descriptor(self.state.step)
    }

    pub fn set_field(&mut self, key: FieldKey, value: FieldValue) -> Result<&WizardState, WizardError> {
        let mut fields = self.state.fields.clone();
        fields.apply(key, value)?;
        self.commit_fields(fields, key == FieldKey::Dispatched);
        Ok(&self.state)
    }

    pub fn add_agency(&mut self, agency: &str) -> Result<&WizardState, WizardError> {
        let mut fields = self.state.fields.clone();
        fields.add_agency(agency)?;
        self.commit_fields(fields, false);
        Ok(&self.state)
    }

    pub fn remove_agency(&mut self, agency: &str) -> &WizardState {
        let mut fields = self.state.fields.clone();
        if fields.remove_agency(agency) {
            self.commit_fields(fields, false);
        }
        &self.state
    }

    /// Sets the dispatched date to today or yesterday; an empty time becomes now.
    pub fn apply_dispatched_preset(&mut self, preset: DayPreset) -> &WizardState {
        let now = self.clock.now();
        let date = match preset {
            DayPreset::Today => Some(now.date()),
            DayPreset::Yesterday => now.date().checked_sub_days(Days::new(1)),
        };

        let mut fields = self.state.fields.clone();
        fields.dispatched.date = date;
        if fields.dispatched.time.is_none() {
            fields.dispatched = DateTimeInput::new(date, Some(now.time()));
        }
        self.commit_fields(fields, true);
        &self.state
    }

    /// Validates the current step, then moves to the next visible one.
    /// Leaving the dispatched step re-requests the incident number.
    /// On the last step a successful validation keeps the step.
    pub fn next(&mut self) -> Result<&WizardState, WizardError> {
        let current = descriptor(self.state.step);
        validate_step(current, &self.state.fields, self.clock.now())?;

        if self.state.step == StepId::Dispatched {
            self.refresh_incident_number();
        }

        if let Some(next) = next_visible(self.state.step, &self.state.fields) {
            self.enter(next);
        }
        Ok(&self.state)
    }

    pub fn previous(&mut self) -> &WizardState {
        if let Some(previous) = previous_visible(self.state.step, &self.state.fields) {
            self.enter(previous);
        }
        &self.state
    }

    /// Validates everything, stores the call through the gateway and resets.
    pub fn save(&mut self, created_by: UserId) -> Result<CallDetail, WizardError> {
        let timeline = validate_for_save(&self.state.fields, self.clock.now())?;
        let fields = &self.state.fields;
        let year_prefix = format!("{:04}-", timeline.dispatched.year());
        let incident_number = self
            .state
            .summary
            .incident_number
            .clone()
            .filter(|number| number.starts_with(&year_prefix));

        let draft = CallDraft {
            incident_number,
            call_type: fields.call_type.trim().to_string(),
            mutual_aid: fields.mutual_aid,
            mutual_aid_agencies: fields.mutual_aid_agencies.clone(),
            address: fields.address.trim().to_string(),
            town: fields.town.trim().to_string(),
            location_notes: fields.location_notes.trim().to_string(),
            timeline,
            narrative: fields.narrative.trim().to_string(),
            created_by,
            apparatus_ids: fields.apparatus_ids.clone(),
            responders: fields.responders.clone(),
        };

        match self.gateway.create_call(&draft) {
            Ok(detail) => {
                info!(
                    "event=wizard_save module=wizard status=ok call_id={} incident_number={}",
                    detail.call.id, detail.call.incident_number
                );
                self.clear();
                Ok(detail)
            }
            Err(err) => {
                warn!(
                    "event=wizard_save module=wizard status=error error={}",
                    crate::logging::sanitize_message(&err.to_string(), 160)
                );
                Err(err.into())
            }
        }
    }

    /// Back to step 1 with fresh defaults and the placeholder incident number.
    /// A number is requested again once the dispatched step is left.
    pub fn clear(&mut self) -> &WizardState {
        self.state = WizardState::initial(self.clock.now());
        &self.state
    }

    fn enter(&mut self, step: StepId) {
        self.state.step = step;
        prefill_time_step(&mut self.state.fields, step);
        self.refresh_summary();
    }

    /// Stores `fields`. The incident number is re-requested when the dispatched
    /// date changed, or when `touched_dispatched` and no number is shown yet.
    /// A step hidden by the new fields falls back to the previous visible one.
    fn commit_fields(&mut self, fields: WizardFields, touched_dispatched: bool) {
        let date_changed = fields.dispatched.date != self.state.fields.dispatched.date;
        let missing_number = self.state.summary.incident_number.is_none();
        self.state.fields = fields;
        if date_changed || (touched_dispatched && missing_number) {
            self.refresh_incident_number();
        }
        if !descriptor(self.state.step).is_visible(&self.state.fields) {
            if let Some(previous) = previous_visible(self.state.step, &self.state.fields) {
                self.state.step = previous;
            }
        }
        self.refresh_summary();
    }

    fn refresh_incident_number(&mut self) {
        let Some(date) = self.state.fields.dispatched.date else {
            self.state.summary.incident_number = None;
            return;
        };
        self.state.summary.incident_number =
            match self.gateway.next_incident_number(date.year()) {
                Ok(number) => Some(number),
                Err(err) => {
                    warn!(
                        "event=incident_number module=wizard status=error year={} error={}",
                        date.year(),
                        crate::logging::sanitize_message(&err.to_string(), 160)
                    );
                    None
                }
            };
    }

    fn refresh_summary(&mut self) {
        let incident_number = self.state.summary.incident_number.take();
        self.state.summary =
            WizardSummary::derive(self.state.step, &self.state.fields, incident_number);
    }
}

/// Fills empty sub-inputs of a time step from the earlier checkpoints.
/// Only a complete earlier timestamp supplies a time.
fn prefill_time_step(fields: &mut WizardFields, step: StepId) {
    let source = match step {
        StepId::Enroute => fields.dispatched.combined(),
        StepId::OnScene => fields.enroute.combined(),
        StepId::Clear => fields.on_scene.combined(),
        _ => return,
    };
    let field = match step {
        StepId::Enroute => TimelineField::Enroute,
        StepId::OnScene => TimelineField::OnScene,
        _ => TimelineField::Clear,
    };
    let dispatched_date = fields.dispatched.date;
    let input = fields.date_time_mut(field);
    if input.date.is_none() {
        input.date = dispatched_date;
    }
    if input.time.is_none() {
        input.time = source.map(|at| at.time());
    }
}
