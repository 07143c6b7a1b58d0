//! FFI use-case API for the desktop call-log UI.
//!
//! # Responsibility
//! - Expose stable, use-case-level functions to Dart via FRB.
//! - Flatten core errors into display-ready messages.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Session and wizard state live behind one process-wide mutex.
//! - Every DB-backed call opens its own connection from `CALLLOG_DB_PATH`.

use crate::runtime::Runtime;
use calllog_core::wizard::step::descriptor;
use calllog_core::wizard::{SystemClock, WizardState};
use calllog_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, open_db,
    ping as ping_inner, AppConfig, Call, CallDetail, CallResponder, PicklistItem,
    ResponderAssignment, User, YearStatistics,
};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use std::sync::{Mutex, OnceLock, PoisonError};

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

static CONFIG: OnceLock<AppConfig> = OnceLock::new();
static RUNTIME: OnceLock<Mutex<Runtime<SystemClock>>> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Reconfiguration attempts with different level or directory return error.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Roster member as shown by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDto {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    /// `First Last`, the login name.
    pub display_name: String,
    pub position: String,
    pub ems_level: Option<String>,
    pub is_admin: bool,
    pub active: bool,
    /// `YYYY-MM-DD`.
    pub joined_date: Option<String>,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            display_name: user.display_name(),
            position: user.position.clone(),
            ems_level: user.ems_level.clone(),
            is_admin: user.is_admin,
            active: user.active,
            joined_date: user
                .joined_date
                .map(|date| date.format(DATE_FORMAT).to_string()),
        }
    }
}

/// Login outcome. Failures carry admin names as a contact hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse {
    pub ok: bool,
    pub user: Option<UserDto>,
    pub message: String,
    pub admin_contacts: Vec<String>,
}

impl LoginResponse {
    pub(crate) fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            user: None,
            message: message.into(),
            admin_contacts: Vec::new(),
        }
    }
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub ok: bool,
    /// ID of the created or touched record, when there is one.
    pub id: Option<i64>,
    pub message: String,
}

impl ActionResponse {
    pub(crate) fn success(message: impl Into<String>, id: Option<i64>) -> Self {
        Self {
            ok: true,
            id,
            message: message.into(),
        }
    }

    pub(crate) fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserListResponse {
    pub ok: bool,
    pub items: Vec<UserDto>,
    pub message: String,
}

impl UserListResponse {
    pub(crate) fn from_users(users: &[User]) -> Self {
        Self {
            ok: true,
            items: users.iter().map(UserDto::from).collect(),
            message: String::new(),
        }
    }

    pub(crate) fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            items: Vec::new(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PicklistItemDto {
    pub id: i64,
    pub category: String,
    pub value: String,
    pub sort_order: i64,
    pub active: bool,
}

impl From<&PicklistItem> for PicklistItemDto {
    fn from(item: &PicklistItem) -> Self {
        Self {
            id: item.id,
            category: item.category.as_str().to_string(),
            value: item.value.clone(),
            sort_order: item.sort_order,
            active: item.active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PicklistResponse {
    pub ok: bool,
    pub items: Vec<PicklistItemDto>,
    pub message: String,
}

impl PicklistResponse {
    pub(crate) fn from_items(items: &[PicklistItem]) -> Self {
        Self {
            ok: true,
            items: items.iter().map(PicklistItemDto::from).collect(),
            message: String::new(),
        }
    }

    pub(crate) fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            items: Vec::new(),
            message: message.into(),
        }
    }
}

/// Responder picked in the wizard or an edit form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponderDto {
    pub user_id: i64,
    pub role: Option<String>,
}

impl From<&ResponderAssignment> for ResponderDto {
    fn from(value: &ResponderAssignment) -> Self {
        Self {
            user_id: value.user_id,
            role: value.role.clone(),
        }
    }
}

impl From<ResponderDto> for ResponderAssignment {
    fn from(value: ResponderDto) -> Self {
        Self {
            user_id: value.user_id,
            role: value.role,
        }
    }
}

/// Wizard field values as the form widgets hold them.
///
/// Dates are `YYYY-MM-DD`, times `HH:MM`; blank means not entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardFieldsDto {
    pub dispatched_date: String,
    pub dispatched_time: String,
    pub call_type: String,
    pub mutual_aid: String,
    pub mutual_aid_agencies: Vec<String>,
    pub address: String,
    pub town: String,
    pub location_notes: String,
    pub apparatus_ids: Vec<i64>,
    pub responders: Vec<ResponderDto>,
    pub enroute_date: String,
    pub enroute_time: String,
    pub on_scene_date: String,
    pub on_scene_time: String,
    pub clear_date: String,
    pub clear_time: String,
    pub narrative: String,
}

/// Render-ready wizard snapshot returned by every wizard call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardView {
    /// False when the requested action was rejected; state is then unchanged.
    pub ok: bool,
    pub message: String,
    /// Field key of the current step, e.g. `mutual_aid_agencies`.
    pub step_field: String,
    /// Displayed step number, e.g. `3.5`.
    pub step_number: String,
    pub step_label: String,
    pub step_required: bool,
    pub position: u32,
    pub visible_steps: u32,
    pub is_first_step: bool,
    pub is_last_step: bool,
    pub agencies_visible: bool,
    pub incident_display: String,
    pub header_visible: bool,
    pub fields: WizardFieldsDto,
}

impl WizardView {
    pub(crate) fn from_state(state: &WizardState, error: Option<String>) -> Self {
        let fields = &state.fields;
        let summary = &state.summary;
        let current = descriptor(state.step);
        let date = |value: Option<NaiveDate>| {
            value
                .map(|date| date.format(DATE_FORMAT).to_string())
                .unwrap_or_default()
        };
        let time = |value: Option<chrono::NaiveTime>| {
            value
                .map(|time| time.format("%H:%M").to_string())
                .unwrap_or_default()
        };

        Self {
            ok: error.is_none(),
            message: error.unwrap_or_default(),
            step_field: current.field.as_str().to_string(),
            step_number: summary.step_number.clone(),
            step_label: summary.step_label.clone(),
            step_required: current.required,
            position: u32::try_from(summary.position).unwrap_or(u32::MAX),
            visible_steps: u32::try_from(summary.visible_steps).unwrap_or(u32::MAX),
            is_first_step: summary.is_first_step,
            is_last_step: summary.is_last_step,
            agencies_visible: summary.agencies_visible,
            incident_display: summary.incident_display.clone(),
            header_visible: summary.header_visible,
            fields: WizardFieldsDto {
                dispatched_date: date(fields.dispatched.date),
                dispatched_time: time(fields.dispatched.time),
                call_type: fields.call_type.clone(),
                mutual_aid: fields.mutual_aid.as_str().to_string(),
                mutual_aid_agencies: fields.mutual_aid_agencies.clone(),
                address: fields.address.clone(),
                town: fields.town.clone(),
                location_notes: fields.location_notes.clone(),
                apparatus_ids: fields.apparatus_ids.clone(),
                responders: fields.responders.iter().map(ResponderDto::from).collect(),
                enroute_date: date(fields.enroute.date),
                enroute_time: time(fields.enroute.time),
                on_scene_date: date(fields.on_scene.date),
                on_scene_time: time(fields.on_scene.time),
                clear_date: date(fields.clear.date),
                clear_time: time(fields.clear.time),
                narrative: fields.narrative.clone(),
            },
        }
    }

    /// View used when no wizard state could be loaded at all.
    pub(crate) fn unavailable(message: impl Into<String>) -> Self {
        let mut view = Self::from_state(
            &WizardState::initial(NaiveDateTime::default()),
            Some(message.into()),
        );
        view.fields.dispatched_date.clear();
        view.fields.dispatched_time.clear();
        view
    }
}

/// Result of `wizard_save`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSaveResponse {
    pub ok: bool,
    pub call_id: Option<i64>,
    pub incident_number: Option<String>,
    pub message: String,
    /// Reset wizard on success, unchanged wizard on failure.
    pub view: WizardView,
}

/// Stored call as listed and exported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallDto {
    pub id: i64,
    pub incident_number: String,
    pub call_type: String,
    pub mutual_aid: String,
    pub mutual_aid_agencies: Vec<String>,
    pub address: String,
    pub town: String,
    pub location_notes: String,
    /// `YYYY-MM-DD HH:MM`, local wall-clock.
    pub dispatched: String,
    pub enroute: Option<String>,
    pub on_scene: Option<String>,
    pub clear: Option<String>,
    pub narrative: String,
    pub created_by: i64,
    /// `YYYY-MM-DD HH:MM`, UTC.
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Call> for CallDto {
    fn from(call: &Call) -> Self {
        let format = |at: NaiveDateTime| at.format(DATE_TIME_FORMAT).to_string();
        Self {
            id: call.id,
            incident_number: call.incident_number.clone(),
            call_type: call.call_type.clone(),
            mutual_aid: call.mutual_aid.as_str().to_string(),
            mutual_aid_agencies: call.mutual_aid_agencies.clone(),
            address: call.address.clone(),
            town: call.town.clone(),
            location_notes: call.location_notes.clone(),
            dispatched: format(call.timeline.dispatched),
            enroute: call.timeline.enroute.map(format),
            on_scene: call.timeline.on_scene.map(format),
            clear: call.timeline.clear.map(format),
            narrative: call.narrative.clone(),
            created_by: call.created_by,
            created_at: format(call.created_at),
            updated_at: format(call.updated_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResponderDto {
    pub user_id: i64,
    pub name: String,
    pub role: Option<String>,
}

impl From<&CallResponder> for CallResponderDto {
    fn from(value: &CallResponder) -> Self {
        Self {
            user_id: value.user_id,
            name: format!("{} {}", value.first_name, value.last_name),
            role: value.role.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallDetailDto {
    pub call: CallDto,
    pub apparatus: Vec<PicklistItemDto>,
    pub responders: Vec<CallResponderDto>,
}

impl From<&CallDetail> for CallDetailDto {
    fn from(detail: &CallDetail) -> Self {
        Self {
            call: CallDto::from(&detail.call),
            apparatus: detail.apparatus.iter().map(PicklistItemDto::from).collect(),
            responders: detail
                .responders
                .iter()
                .map(CallResponderDto::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallListResponse {
    pub ok: bool,
    pub items: Vec<CallDto>,
    pub message: String,
}

impl CallListResponse {
    pub(crate) fn from_calls(calls: &[Call]) -> Self {
        let message = if calls.is_empty() {
            "No calls found.".to_string()
        } else {
            format!("Found {} call(s).", calls.len())
        };
        Self {
            ok: true,
            items: calls.iter().map(CallDto::from).collect(),
            message,
        }
    }

    pub(crate) fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            items: Vec::new(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallDetailResponse {
    pub ok: bool,
    pub detail: Option<CallDetailDto>,
    /// Whether the logged-in user may edit this call right now.
    pub can_edit: bool,
    pub message: String,
}

impl CallDetailResponse {
    pub(crate) fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: None,
            can_edit: false,
            message: message.into(),
        }
    }
}

/// Edit form payload for `call_update`. Timestamps are `YYYY-MM-DD HH:MM`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallInputDto {
    pub call_type: String,
    pub mutual_aid: String,
    pub mutual_aid_agencies: Vec<String>,
    pub address: String,
    pub town: String,
    pub location_notes: String,
    pub dispatched: String,
    pub enroute: Option<String>,
    pub on_scene: Option<String>,
    pub clear: Option<String>,
    pub narrative: String,
    pub apparatus_ids: Vec<i64>,
    pub responders: Vec<ResponderDto>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearListResponse {
    pub ok: bool,
    pub years: Vec<i32>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticsDto {
    pub year: i32,
    pub total: i64,
    pub mutual_aid_given: i64,
    pub mutual_aid_received: i64,
    pub most_common_call_type: Option<String>,
}

impl From<YearStatistics> for StatisticsDto {
    fn from(stats: YearStatistics) -> Self {
        Self {
            year: stats.year,
            total: stats.total,
            mutual_aid_given: stats.mutual_aid_given,
            mutual_aid_received: stats.mutual_aid_received,
            most_common_call_type: stats.most_common_call_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticsResponse {
    pub ok: bool,
    pub stats: Option<StatisticsDto>,
    pub message: String,
}

/// CSV export returned to the UI, which picks the save location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResponse {
    pub ok: bool,
    /// Suggested `calls-export-YYYY-MM-DD.csv`.
    pub file_name: String,
    pub csv: String,
    pub row_count: u32,
    pub message: String,
}

impl ExportResponse {
    pub(crate) fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            file_name: String::new(),
            csv: String::new(),
            row_count: 0,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingDto {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsResponse {
    pub ok: bool,
    pub items: Vec<SettingDto>,
    pub message: String,
}

// Authentication

/// Logs in by `First Last` name and 4-digit PIN.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - Failures carry active admin names for the contact hint.
#[flutter_rust_bridge::frb(sync)]
pub fn login(name: String, pin: String) -> LoginResponse {
    with_runtime(|runtime, conn| runtime.login(conn, &name, &pin))
        .unwrap_or_else(LoginResponse::failure)
}

#[flutter_rust_bridge::frb(sync)]
pub fn logout() -> ActionResponse {
    with_runtime(|runtime, _| runtime.logout()).unwrap_or_else(ActionResponse::failure)
}

/// Logged-in user, if any.
#[flutter_rust_bridge::frb(sync)]
pub fn current_user() -> Option<UserDto> {
    lock_runtime().current_user()
}

#[flutter_rust_bridge::frb(sync)]
pub fn change_pin(old_pin: String, new_pin: String, confirm_pin: String) -> ActionResponse {
    with_runtime(|runtime, conn| runtime.change_pin(conn, &old_pin, &new_pin, &confirm_pin))
        .unwrap_or_else(ActionResponse::failure)
}

#[flutter_rust_bridge::frb(sync)]
pub fn admin_contacts() -> Vec<String> {
    with_runtime(|runtime, conn| runtime.admin_contacts(conn)).unwrap_or_default()
}

// Roster

#[flutter_rust_bridge::frb(sync)]
pub fn users_list_active() -> UserListResponse {
    with_runtime(|runtime, conn| runtime.list_active_users(conn))
        .unwrap_or_else(UserListResponse::failure)
}

#[flutter_rust_bridge::frb(sync)]
pub fn users_list_admins() -> UserListResponse {
    with_runtime(|runtime, conn| runtime.list_admin_users(conn))
        .unwrap_or_else(UserListResponse::failure)
}

/// Every user including inactive ones. Admin only.
#[flutter_rust_bridge::frb(sync)]
pub fn users_list_all() -> UserListResponse {
    with_runtime(|runtime, conn| runtime.list_all_users(conn))
        .unwrap_or_else(UserListResponse::failure)
}

#[flutter_rust_bridge::frb(sync)]
pub fn users_create(
    first_name: String,
    last_name: String,
    position: String,
    ems_level: Option<String>,
    pin: String,
    confirm_pin: String,
    is_admin: bool,
) -> ActionResponse {
    let request = calllog_core::CreateUserRequest {
        first_name,
        last_name,
        position,
        ems_level,
        pin,
        confirm_pin,
        is_admin,
    };
    with_runtime(|runtime, conn| runtime.create_user(conn, &request))
        .unwrap_or_else(ActionResponse::failure)
}

#[flutter_rust_bridge::frb(sync)]
pub fn users_update(
    user_id: i64,
    first_name: String,
    last_name: String,
    position: String,
    ems_level: Option<String>,
    is_admin: bool,
    active: bool,
) -> ActionResponse {
    let update = calllog_core::UserUpdate {
        id: user_id,
        first_name,
        last_name,
        position,
        ems_level,
        is_admin,
        active,
    };
    with_runtime(|runtime, conn| runtime.update_user(conn, &update))
        .unwrap_or_else(ActionResponse::failure)
}

#[flutter_rust_bridge::frb(sync)]
pub fn users_deactivate(user_id: i64) -> ActionResponse {
    with_runtime(|runtime, conn| runtime.deactivate_user(conn, user_id))
        .unwrap_or_else(ActionResponse::failure)
}

#[flutter_rust_bridge::frb(sync)]
pub fn users_reset_pin(user_id: i64, new_pin: String, confirm_pin: String) -> ActionResponse {
    with_runtime(|runtime, conn| runtime.reset_user_pin(conn, user_id, &new_pin, &confirm_pin))
        .unwrap_or_else(ActionResponse::failure)
}

/// `joined_date` is `YYYY-MM-DD`; blank clears it.
#[flutter_rust_bridge::frb(sync)]
pub fn users_set_joined_date(user_id: i64, joined_date: String) -> ActionResponse {
    with_runtime(|runtime, conn| runtime.set_joined_date(conn, user_id, &joined_date))
        .unwrap_or_else(ActionResponse::failure)
}

// Picklists

/// Category keys in display order.
#[flutter_rust_bridge::frb(sync)]
pub fn picklist_categories() -> Vec<String> {
    with_runtime(|runtime, conn| runtime.picklist_categories(conn)).unwrap_or_default()
}

/// Active values of `category`, e.g. `call_type` or `apparatus`.
#[flutter_rust_bridge::frb(sync)]
pub fn picklist_get(category: String) -> PicklistResponse {
    with_runtime(|runtime, conn| runtime.picklist(conn, &category))
        .unwrap_or_else(PicklistResponse::failure)
}

/// Active and inactive items of `category`. Admin only.
#[flutter_rust_bridge::frb(sync)]
pub fn picklist_list_all(category: String) -> PicklistResponse {
    with_runtime(|runtime, conn| runtime.picklist_all(conn, &category))
        .unwrap_or_else(PicklistResponse::failure)
}

#[flutter_rust_bridge::frb(sync)]
pub fn picklist_create(category: String, value: String, sort_order: i64) -> ActionResponse {
    with_runtime(|runtime, conn| runtime.create_picklist_item(conn, &category, &value, sort_order))
        .unwrap_or_else(ActionResponse::failure)
}

#[flutter_rust_bridge::frb(sync)]
pub fn picklist_update(item_id: i64, value: String, sort_order: i64, active: bool) -> ActionResponse {
    with_runtime(|runtime, conn| {
        runtime.update_picklist_item(conn, item_id, &value, sort_order, active)
    })
    .unwrap_or_else(ActionResponse::failure)
}

#[flutter_rust_bridge::frb(sync)]
pub fn picklist_deactivate(item_id: i64) -> ActionResponse {
    with_runtime(|runtime, conn| runtime.deactivate_picklist_item(conn, item_id))
        .unwrap_or_else(ActionResponse::failure)
}

// Call wizard

/// Current wizard view; starts a fresh wizard when none is in progress.
#[flutter_rust_bridge::frb(sync)]
pub fn wizard_start() -> WizardView {
    with_runtime(|runtime, conn| runtime.wizard_view(conn)).unwrap_or_else(WizardView::unavailable)
}

/// Sets a text-valued field (`call_type`, `address`, `town`, `location_notes`,
/// `narrative`, or `mutual_aid` with `No|Yes|Received`).
#[flutter_rust_bridge::frb(sync)]
pub fn wizard_set_text(field: String, value: String) -> WizardView {
    with_runtime(|runtime, conn| runtime.wizard_set_text(conn, &field, value))
        .unwrap_or_else(WizardView::unavailable)
}

/// Sets `dispatched`, `enroute`, `on_scene` or `clear` from its two sub-inputs.
#[flutter_rust_bridge::frb(sync)]
pub fn wizard_set_date_time(field: String, date: String, time: String) -> WizardView {
    with_runtime(|runtime, conn| runtime.wizard_set_date_time(conn, &field, &date, &time))
        .unwrap_or_else(WizardView::unavailable)
}

#[flutter_rust_bridge::frb(sync)]
pub fn wizard_set_apparatus(apparatus_ids: Vec<i64>) -> WizardView {
    with_runtime(|runtime, conn| runtime.wizard_set_apparatus(conn, apparatus_ids))
        .unwrap_or_else(WizardView::unavailable)
}

#[flutter_rust_bridge::frb(sync)]
pub fn wizard_set_responders(responders: Vec<ResponderDto>) -> WizardView {
    with_runtime(|runtime, conn| runtime.wizard_set_responders(conn, responders))
        .unwrap_or_else(WizardView::unavailable)
}

#[flutter_rust_bridge::frb(sync)]
pub fn wizard_add_agency(agency: String) -> WizardView {
    with_runtime(|runtime, conn| runtime.wizard_add_agency(conn, &agency))
        .unwrap_or_else(WizardView::unavailable)
}

#[flutter_rust_bridge::frb(sync)]
pub fn wizard_remove_agency(agency: String) -> WizardView {
    with_runtime(|runtime, conn| runtime.wizard_remove_agency(conn, &agency))
        .unwrap_or_else(WizardView::unavailable)
}

/// `preset` is `today` or `yesterday`.
#[flutter_rust_bridge::frb(sync)]
pub fn wizard_apply_preset(preset: String) -> WizardView {
    with_runtime(|runtime, conn| runtime.wizard_apply_preset(conn, &preset))
        .unwrap_or_else(WizardView::unavailable)
}

#[flutter_rust_bridge::frb(sync)]
pub fn wizard_next() -> WizardView {
    with_runtime(|runtime, conn| runtime.wizard_next(conn)).unwrap_or_else(WizardView::unavailable)
}

#[flutter_rust_bridge::frb(sync)]
pub fn wizard_previous() -> WizardView {
    with_runtime(|runtime, conn| runtime.wizard_previous(conn))
        .unwrap_or_else(WizardView::unavailable)
}

/// Saves the wizard as a new call for the logged-in user.
#[flutter_rust_bridge::frb(sync)]
pub fn wizard_save() -> CallSaveResponse {
    with_runtime(|runtime, conn| runtime.wizard_save(conn)).unwrap_or_else(|message| {
        CallSaveResponse {
            ok: false,
            call_id: None,
            incident_number: None,
            view: WizardView::unavailable(message.clone()),
            message,
        }
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn wizard_clear() -> WizardView {
    with_runtime(|runtime, conn| runtime.wizard_clear(conn)).unwrap_or_else(WizardView::unavailable)
}

// Call list, search and edit

/// Years with calls, newest first; the current year when there are none.
#[flutter_rust_bridge::frb(sync)]
pub fn calls_years() -> YearListResponse {
    with_runtime(|runtime, conn| runtime.call_years(conn)).unwrap_or_else(|message| {
        YearListResponse {
            ok: false,
            years: Vec::new(),
            message,
        }
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn calls_by_year(year: i32) -> CallListResponse {
    with_runtime(|runtime, conn| runtime.calls_by_year(conn, year))
        .unwrap_or_else(CallListResponse::failure)
}

/// Most recently created calls, newest first.
#[flutter_rust_bridge::frb(sync)]
pub fn calls_recent(limit: u32, offset: u32) -> CallListResponse {
    with_runtime(|runtime, conn| runtime.recent_calls(conn, limit, offset))
        .unwrap_or_else(CallListResponse::failure)
}

/// Searches calls. Blank filters are ignored; dates are `YYYY-MM-DD`.
#[flutter_rust_bridge::frb(sync)]
pub fn calls_search(
    text: String,
    call_type: String,
    town: String,
    dispatched_from: String,
    dispatched_to: String,
    limit: Option<u32>,
) -> CallListResponse {
    with_runtime(|runtime, conn| {
        runtime.search_calls(
            conn,
            &text,
            &call_type,
            &town,
            &dispatched_from,
            &dispatched_to,
            limit,
        )
    })
    .unwrap_or_else(CallListResponse::failure)
}

#[flutter_rust_bridge::frb(sync)]
pub fn call_detail(call_id: i64) -> CallDetailResponse {
    with_runtime(|runtime, conn| runtime.call_detail(conn, call_id))
        .unwrap_or_else(CallDetailResponse::failure)
}

/// Replaces a call when the logged-in user is still allowed to edit it.
#[flutter_rust_bridge::frb(sync)]
pub fn call_update(call_id: i64, input: CallInputDto) -> ActionResponse {
    with_runtime(|runtime, conn| runtime.update_call(conn, call_id, input))
        .unwrap_or_else(ActionResponse::failure)
}

#[flutter_rust_bridge::frb(sync)]
pub fn calls_statistics(year: i32) -> StatisticsResponse {
    with_runtime(|runtime, conn| runtime.year_statistics(conn, year)).unwrap_or_else(|message| {
        StatisticsResponse {
            ok: false,
            stats: None,
            message,
        }
    })
}

/// CSV for all calls dispatched in `year`.
#[flutter_rust_bridge::frb(sync)]
pub fn calls_export_csv(year: i32) -> ExportResponse {
    with_runtime(|runtime, conn| runtime.export_csv(conn, year))
        .unwrap_or_else(ExportResponse::failure)
}

// Settings

#[flutter_rust_bridge::frb(sync)]
pub fn settings_list() -> SettingsResponse {
    with_runtime(|runtime, conn| runtime.list_settings(conn)).unwrap_or_else(|message| {
        SettingsResponse {
            ok: false,
            items: Vec::new(),
            message,
        }
    })
}

/// Admin only.
#[flutter_rust_bridge::frb(sync)]
pub fn settings_update(key: String, value: String) -> ActionResponse {
    with_runtime(|runtime, conn| runtime.update_setting(conn, &key, &value))
        .unwrap_or_else(ActionResponse::failure)
}

fn config() -> &'static AppConfig {
    CONFIG.get_or_init(AppConfig::from_env)
}

fn lock_runtime() -> std::sync::MutexGuard<'static, Runtime<SystemClock>> {
    RUNTIME
        .get_or_init(|| Mutex::new(Runtime::new(SystemClock)))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

fn with_runtime<T>(
    action: impl FnOnce(&mut Runtime<SystemClock>, &Connection) -> T,
) -> Result<T, String> {
    let conn = open_db(&config().db_path).map_err(|err| format!("database open failed: {err}"))?;
    let mut runtime = lock_runtime();
    Ok(action(&mut runtime, &conn))
}

#[cfg(test)]
mod tests {
    use super::{core_version, init_logging, ping, CallDto, UserDto, WizardView};
    use calllog_core::wizard::WizardState;
    use calllog_core::{Call, MutualAid, Timeline, User};
    use chrono::NaiveDate;

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "/tmp/calllog-logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn user_dto_formats_joined_date() {
        let created = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let user = User {
            id: 7,
            first_name: "Dana".to_string(),
            last_name: "Reyes".to_string(),
            position: "Captain".to_string(),
            ems_level: Some("EMT".to_string()),
            is_admin: false,
            active: true,
            joined_date: NaiveDate::from_ymd_opt(2019, 4, 1),
            created,
        };

        let dto = UserDto::from(&user);
        assert_eq!(dto.display_name, "Dana Reyes");
        assert_eq!(dto.joined_date.as_deref(), Some("2019-04-01"));
    }

    #[test]
    fn call_dto_uses_minute_precision_strings() {
        let at = NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let call = Call {
            id: 1,
            incident_number: "2024-001".to_string(),
            call_type: "Rescue".to_string(),
            mutual_aid: MutualAid::Received,
            mutual_aid_agencies: Vec::new(),
            address: "1 Main St".to_string(),
            town: String::new(),
            location_notes: String::new(),
            timeline: Timeline {
                dispatched: at,
                enroute: None,
                on_scene: None,
                clear: None,
            },
            narrative: "ok".to_string(),
            created_by: 1,
            created_at: at,
            updated_at: at,
        };

        let dto = CallDto::from(&call);
        assert_eq!(dto.dispatched, "2024-01-05 10:00");
        assert_eq!(dto.mutual_aid, "Received");
        assert_eq!(dto.enroute, None);
    }

    #[test]
    fn wizard_view_reports_rejection_message() {
        let now = NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(9, 7, 0)
            .unwrap();
        let state = WizardState::initial(now);

        let view = WizardView::from_state(&state, Some("This field is required".to_string()));
        assert!(!view.ok);
        assert_eq!(view.step_field, "dispatched");
        assert_eq!(view.step_number, "1");
        assert_eq!(view.fields.dispatched_date, "2024-01-05");
        assert_eq!(view.fields.dispatched_time, "09:07");
        assert_eq!(view.fields.mutual_aid, "No");
    }
}
