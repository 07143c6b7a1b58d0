//! Ordered step descriptors and visibility-aware navigation.
//!
//! # Invariants
//! - [`STEPS`] lists every step once, in entry order.
//! - Navigation only ever lands on steps whose predicate holds.

use crate::wizard::fields::{FieldKey, WizardFields};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
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

pub struct StepDescriptor {
    pub id: StepId,
    /// Number shown to the dispatcher, e.g. `3.5`.
    pub number: &'static str,
    pub field: FieldKey,
    pub label: &'static str,
    pub required: bool,
    pub visible: fn(&WizardFields) -> bool,
}

impl StepDescriptor {
    pub fn is_visible(&self, fields: &WizardFields) -> bool {
        (self.visible)(fields)
    }
}

fn always(_: &WizardFields) -> bool {
    true
}

const fn step(
    id: StepId,
    number: &'static str,
    field: FieldKey,
    label: &'static str,
    required: bool,
) -> StepDescriptor {
    StepDescriptor {
        id,
        number,
        field,
        label,
        required,
        visible: always,
    }
}

pub static STEPS: [StepDescriptor; 13] = [
    step(StepId::Dispatched, "1", FieldKey::Dispatched, "Dispatched", true),
    step(StepId::CallType, "2", FieldKey::CallType, "Call Type", true),
    step(StepId::MutualAid, "3", FieldKey::MutualAid, "Mutual Aid", false),
    StepDescriptor {
        id: StepId::MutualAidAgencies,
        number: "3.5",
        field: FieldKey::MutualAidAgencies,
        label: "Mutual Aid Agencies",
        required: false,
        visible: WizardFields::agencies_visible,
    },
    step(StepId::Address, "4", FieldKey::Address, "Address", true),
    step(StepId::Town, "5", FieldKey::Town, "Town", false),
    step(StepId::LocationNotes, "6", FieldKey::LocationNotes, "Location Notes", false),
    step(StepId::Apparatus, "7", FieldKey::Apparatus, "Apparatus", false),
    step(StepId::Responders, "8", FieldKey::Responders, "Responders", false),
    step(StepId::Enroute, "9", FieldKey::Enroute, "Enroute", false),
    step(StepId::OnScene, "10", FieldKey::OnScene, "On Scene", false),
    step(StepId::Clear, "11", FieldKey::Clear, "Clear", false),
    step(StepId::Narrative, "12", FieldKey::Narrative, "Narrative", true),
];

pub const FIRST_STEP: StepId = StepId::Dispatched;

fn index_of(id: StepId) -> usize {
    STEPS
        .iter()
        .position(|descriptor| descriptor.id == id)
        .unwrap_or(0)
}

pub fn descriptor(id: StepId) -> &'static StepDescriptor {
    &STEPS[index_of(id)]
}

/// First visible step after `from`, or `None` at the end.
pub fn next_visible(from: StepId, fields: &WizardFields) -> Option<StepId> {
    STEPS[index_of(from) + 1..]
        .iter()
        .find(|descriptor| descriptor.is_visible(fields))
        .map(|descriptor| descriptor.id)
}

/// Last visible step before `from`, or `None` at the start.
pub fn previous_visible(from: StepId, fields: &WizardFields) -> Option<StepId> {
    STEPS[..index_of(from)]
        .iter()
        .rev()
        .find(|descriptor| descriptor.is_visible(fields))
        .map(|descriptor| descriptor.id)
}

/// 1-based position of `id` among visible steps, and the visible count.
pub fn visible_position(id: StepId, fields: &WizardFields) -> (usize, usize) {
    let visible: Vec<StepId> = STEPS
        .iter()
        .filter(|descriptor| descriptor.is_visible(fields))
        .map(|descriptor| descriptor.id)
        .collect();
    let position = visible
        .iter()
        .position(|candidate| *candidate == id)
        .map_or(0, |index| index + 1);
    (position, visible.len())
}
