//! Per-process UI state behind the FFI functions.
//!
//! The exported functions in [`crate::api`] lock one [`Runtime`] and hand it a
//! fresh connection. Everything here takes the connection explicitly so the
//! same code runs against in-memory databases in tests.

use crate::api::{
    ActionResponse, CallDetailDto, CallInputDto, CallListResponse, CallSaveResponse,
    CallDetailResponse, ExportResponse, LoginResponse, PicklistResponse, SettingDto,
    SettingsResponse, StatisticsDto, StatisticsResponse, UserDto, UserListResponse, WizardView,
    YearListResponse, DATE_FORMAT, DATE_TIME_FORMAT,
};
use calllog_core::export::csv::{calls_to_csv, export_file_name};
use calllog_core::wizard::{
    Clock, DateTimeInput, DayPreset, FieldKey, FieldValue, WizardController, WizardError,
    WizardState,
};
use calllog_core::{
    CallDraft, CallSearchQuery, CallService, CreateUserRequest, MutualAid, PicklistCategory,
    PicklistService, Session, SettingsRepository, SqliteCallRepository, SqlitePicklistRepository,
    SqliteSettingsRepository, SqliteUserRepository, Timeline, UserService, UserUpdate,
};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Utc};
use log::{info, warn};
use rusqlite::Connection;
use std::collections::HashMap;

type Calls<'conn> = CallService<SqliteCallRepository<'conn>, SqliteSettingsRepository<'conn>>;
type Wizard<'s, 'conn, C> = WizardController<&'s Calls<'conn>, &'s C>;

fn calls(conn: &Connection) -> Calls<'_> {
    CallService::new(
        SqliteCallRepository::new(conn),
        SqliteSettingsRepository::new(conn),
    )
}

fn users(conn: &Connection) -> UserService<SqliteUserRepository<'_>> {
    UserService::new(SqliteUserRepository::new(conn))
}

fn picklists(conn: &Connection) -> PicklistService<SqlitePicklistRepository<'_>> {
    PicklistService::new(SqlitePicklistRepository::new(conn))
}

pub(crate) struct Runtime<C: Clock> {
    clock: C,
    session: Session,
    wizard: Option<WizardState>,
}

impl<C: Clock> Runtime<C> {
    pub(crate) fn new(clock: C) -> Self {
        Self {
            clock,
            session: Session::new(),
            wizard: None,
        }
    }

    pub(crate) fn current_user(&self) -> Option<UserDto> {
        self.session.current_user().map(UserDto::from)
    }

    pub(crate) fn login(&mut self, conn: &Connection, name: &str, pin: &str) -> LoginResponse {
        let users = users(conn);
        match users.login(&mut self.session, name, pin) {
            Ok(user) => {
                self.wizard = None;
                LoginResponse {
                    ok: true,
                    user: Some(UserDto::from(&user)),
                    message: format!("Welcome, {}.", user.first_name),
                    admin_contacts: Vec::new(),
                }
            }
            Err(err) => LoginResponse {
                admin_contacts: users.admin_contact_names().unwrap_or_default(),
                ..LoginResponse::failure(err.to_string())
            },
        }
    }

    pub(crate) fn logout(&mut self) -> ActionResponse {
        if let Some(user) = self.session.current_user() {
            info!("event=logout module=ffi status=ok user_id={}", user.id);
        }
        self.session.logout();
        self.wizard = None;
        ActionResponse::success("Logged out.", None)
    }

    pub(crate) fn change_pin(
        &mut self,
        conn: &Connection,
        old_pin: &str,
        new_pin: &str,
        confirm_pin: &str,
    ) -> ActionResponse {
        action(
            users(conn).change_pin(&self.session, old_pin, new_pin, confirm_pin),
            "PIN changed.",
        )
    }

    pub(crate) fn admin_contacts(&self, conn: &Connection) -> Vec<String> {
        users(conn).admin_contact_names().unwrap_or_default()
    }

    pub(crate) fn list_active_users(&self, conn: &Connection) -> UserListResponse {
        match users(conn).list_active_users() {
            Ok(users) => UserListResponse::from_users(&users),
            Err(err) => UserListResponse::failure(err.to_string()),
        }
    }

    pub(crate) fn list_admin_users(&self, conn: &Connection) -> UserListResponse {
        match users(conn).list_admin_users() {
            Ok(users) => UserListResponse::from_users(&users),
            Err(err) => UserListResponse::failure(err.to_string()),
        }
    }

    pub(crate) fn list_all_users(&self, conn: &Connection) -> UserListResponse {
        match users(conn).list_all_users(&self.session) {
            Ok(users) => UserListResponse::from_users(&users),
            Err(err) => UserListResponse::failure(err.to_string()),
        }
    }

    pub(crate) fn create_user(
        &self,
        conn: &Connection,
        request: &CreateUserRequest,
    ) -> ActionResponse {
        match users(conn).create_user(&self.session, request) {
            Ok(user) => ActionResponse::success("User created.", Some(user.id)),
            Err(err) => ActionResponse::failure(err.to_string()),
        }
    }

    pub(crate) fn update_user(&mut self, conn: &Connection, update: &UserUpdate) -> ActionResponse {
        match users(conn).update_user(&mut self.session, update) {
            Ok(user) => ActionResponse::success("User updated.", Some(user.id)),
            Err(err) => ActionResponse::failure(err.to_string()),
        }
    }

    pub(crate) fn deactivate_user(&self, conn: &Connection, user_id: i64) -> ActionResponse {
        action(
            users(conn).deactivate_user(&self.session, user_id),
            "User deactivated.",
        )
    }

    pub(crate) fn reset_user_pin(
        &self,
        conn: &Connection,
        user_id: i64,
        new_pin: &str,
        confirm_pin: &str,
    ) -> ActionResponse {
        action(
            users(conn).reset_user_pin(&self.session, user_id, new_pin, confirm_pin),
            "PIN reset.",
        )
    }

    pub(crate) fn set_joined_date(
        &self,
        conn: &Connection,
        user_id: i64,
        joined_date: &str,
    ) -> ActionResponse {
        let joined = match parse_optional_date(joined_date) {
            Ok(joined) => joined,
            Err(message) => return ActionResponse::failure(message),
        };
        action(
            users(conn).update_user_joined_date(&self.session, user_id, joined),
            "Join date updated.",
        )
    }

    pub(crate) fn picklist_categories(&self, conn: &Connection) -> Vec<String> {
        picklists(conn)
            .list_categories()
            .map(|categories| {
                categories
                    .into_iter()
                    .map(|category| category.as_str().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn picklist(&self, conn: &Connection, category: &str) -> PicklistResponse {
        let category = match PicklistCategory::parse(category) {
            Ok(category) => category,
            Err(err) => return PicklistResponse::failure(err.to_string()),
        };
        match picklists(conn).get_picklist(category) {
            Ok(items) => PicklistResponse::from_items(&items),
            Err(err) => PicklistResponse::failure(err.to_string()),
        }
    }

    pub(crate) fn picklist_all(&self, conn: &Connection, category: &str) -> PicklistResponse {
        let category = match PicklistCategory::parse(category) {
            Ok(category) => category,
            Err(err) => return PicklistResponse::failure(err.to_string()),
        };
        match picklists(conn).list_all_items(&self.session, category) {
            Ok(items) => PicklistResponse::from_items(&items),
            Err(err) => PicklistResponse::failure(err.to_string()),
        }
    }

    pub(crate) fn create_picklist_item(
        &self,
        conn: &Connection,
        category: &str,
        value: &str,
        sort_order: i64,
    ) -> ActionResponse {
        let category = match PicklistCategory::parse(category) {
            Ok(category) => category,
            Err(err) => return ActionResponse::failure(err.to_string()),
        };
        match picklists(conn).create_item(&self.session, category, value, sort_order) {
            Ok(item) => ActionResponse::success("Item added.", Some(item.id)),
            Err(err) => ActionResponse::failure(err.to_string()),
        }
    }

    pub(crate) fn update_picklist_item(
        &self,
        conn: &Connection,
        item_id: i64,
        value: &str,
        sort_order: i64,
        active: bool,
    ) -> ActionResponse {
        match picklists(conn).update_item(&self.session, item_id, value, sort_order, active) {
            Ok(item) => ActionResponse::success("Item updated.", Some(item.id)),
            Err(err) => ActionResponse::failure(err.to_string()),
        }
    }

    pub(crate) fn deactivate_picklist_item(&self, conn: &Connection, item_id: i64) -> ActionResponse {
        action(
            picklists(conn).deactivate_item(&self.session, item_id),
            "Item removed.",
        )
    }

    pub(crate) fn wizard_view(&mut self, conn: &Connection) -> WizardView {
        self.wizard_action(conn, |_| Ok(()))
    }

    pub(crate) fn wizard_set_text(
        &mut self,
        conn: &Connection,
        field: &str,
        value: String,
    ) -> WizardView {
        self.wizard_action(conn, |wizard| {
            let key = parse_field(field)?;
            wizard.set_field(key, FieldValue::Text(value))?;
            Ok(())
        })
    }

    pub(crate) fn wizard_set_date_time(
        &mut self,
        conn: &Connection,
        field: &str,
        date: &str,
        time: &str,
    ) -> WizardView {
        self.wizard_action(conn, |wizard| {
            let key = parse_field(field)?;
            let input = DateTimeInput::parse(date, time)?;
            wizard.set_field(key, FieldValue::DateTime(input))?;
            Ok(())
        })
    }

    pub(crate) fn wizard_set_apparatus(
        &mut self,
        conn: &Connection,
        apparatus_ids: Vec<i64>,
    ) -> WizardView {
        self.wizard_action(conn, |wizard| {
            wizard.set_field(FieldKey::Apparatus, FieldValue::Apparatus(apparatus_ids))?;
            Ok(())
        })
    }

    pub(crate) fn wizard_set_responders(
        &mut self,
        conn: &Connection,
        responders: Vec<crate::api::ResponderDto>,
    ) -> WizardView {
        self.wizard_action(conn, |wizard| {
            let responders = responders.into_iter().map(Into::into).collect();
            wizard.set_field(FieldKey::Responders, FieldValue::Responders(responders))?;
            Ok(())
        })
    }

    pub(crate) fn wizard_add_agency(&mut self, conn: &Connection, agency: &str) -> WizardView {
        self.wizard_action(conn, |wizard| {
            wizard.add_agency(agency)?;
            Ok(())
        })
    }

    pub(crate) fn wizard_remove_agency(&mut self, conn: &Connection, agency: &str) -> WizardView {
        self.wizard_action(conn, |wizard| {
            wizard.remove_agency(agency);
            Ok(())
        })
    }

    pub(crate) fn wizard_apply_preset(&mut self, conn: &Connection, preset: &str) -> WizardView {
        self.wizard_action(conn, |wizard| {
            let preset = match preset.trim().to_ascii_lowercase().as_str() {
                "today" => DayPreset::Today,
                "yesterday" => DayPreset::Yesterday,
                other => {
                    return Err(WizardError::InvalidInput(format!(
                        "unknown date preset `{other}`"
                    )))
                }
            };
            wizard.apply_dispatched_preset(preset);
            Ok(())
        })
    }

    pub(crate) fn wizard_next(&mut self, conn: &Connection) -> WizardView {
        self.wizard_action(conn, |wizard| {
            wizard.next()?;
            Ok(())
        })
    }

    pub(crate) fn wizard_previous(&mut self, conn: &Connection) -> WizardView {
        self.wizard_action(conn, |wizard| {
            wizard.previous();
            Ok(())
        })
    }

    pub(crate) fn wizard_clear(&mut self, conn: &Connection) -> WizardView {
        self.wizard_action(conn, |wizard| {
            wizard.clear();
            Ok(())
        })
    }

    pub(crate) fn wizard_save(&mut self, conn: &Connection) -> CallSaveResponse {
        let user_id = match self.session.require_user().map(|user| user.id) {
            Ok(user_id) => user_id,
            Err(err) => {
                let view = self.wizard_view(conn);
                return CallSaveResponse {
                    ok: false,
                    call_id: None,
                    incident_number: None,
                    message: err.to_string(),
                    view,
                };
            }
        };

        let mut saved = None;
        let view = self.wizard_action(conn, |wizard| {
            saved = Some(wizard.save(user_id)?);
            Ok(())
        });
        match saved {
            Some(detail) => CallSaveResponse {
                ok: true,
                call_id: Some(detail.call.id),
                message: format!("Call {} saved.", detail.call.incident_number),
                incident_number: Some(detail.call.incident_number),
                view,
            },
            None => CallSaveResponse {
                ok: false,
                call_id: None,
                incident_number: None,
                message: view.message.clone(),
                view,
            },
        }
    }

    pub(crate) fn call_years(&self, conn: &Connection) -> YearListResponse {
        match calls(conn).list_call_years(self.clock.now().year()) {
            Ok(years) => YearListResponse {
                ok: true,
                years,
                message: String::new(),
            },
            Err(err) => YearListResponse {
                ok: false,
                years: Vec::new(),
                message: err.to_string(),
            },
        }
    }

    pub(crate) fn calls_by_year(&self, conn: &Connection, year: i32) -> CallListResponse {
        match calls(conn).list_calls_by_year(year) {
            Ok(calls) => CallListResponse::from_calls(&calls),
            Err(err) => CallListResponse::failure(err.to_string()),
        }
    }

    pub(crate) fn recent_calls(&self, conn: &Connection, limit: u32, offset: u32) -> CallListResponse {
        match calls(conn).list_recent_calls(limit, offset) {
            Ok(calls) => CallListResponse::from_calls(&calls),
            Err(err) => CallListResponse::failure(err.to_string()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn search_calls(
        &self,
        conn: &Connection,
        text: &str,
        call_type: &str,
        town: &str,
        dispatched_from: &str,
        dispatched_to: &str,
        limit: Option<u32>,
    ) -> CallListResponse {
        let (dispatched_from, dispatched_to) = match (
            parse_optional_date(dispatched_from),
            parse_optional_date(dispatched_to),
        ) {
            (Ok(from), Ok(to)) => (from, to),
            (Err(message), _) | (_, Err(message)) => return CallListResponse::failure(message),
        };
        let query = CallSearchQuery {
            text: Some(text.to_string()),
            call_type: Some(call_type.to_string()),
            town: Some(town.to_string()),
            dispatched_from,
            dispatched_to,
            limit,
        };
        match calls(conn).search_calls(&query) {
            Ok(calls) => CallListResponse::from_calls(&calls),
            Err(err) => CallListResponse::failure(err.to_string()),
        }
    }

    pub(crate) fn call_detail(&self, conn: &Connection, call_id: i64) -> CallDetailResponse {
        let calls = calls(conn);
        let detail = match calls.get_call(call_id) {
            Ok(detail) => detail,
            Err(err) => return CallDetailResponse::failure(err.to_string()),
        };
        let can_edit = match self.session.current_user() {
            Some(user) => calls
                .can_user_edit_call(call_id, user, Utc::now().naive_utc())
                .unwrap_or_else(|err| {
                    warn!(
                        "event=call_edit_check module=ffi status=error call_id={} error={}",
                        call_id, err
                    );
                    false
                }),
            None => false,
        };
        CallDetailResponse {
            ok: true,
            detail: Some(CallDetailDto::from(&detail)),
            can_edit,
            message: String::new(),
        }
    }

    pub(crate) fn update_call(
        &self,
        conn: &Connection,
        call_id: i64,
        input: CallInputDto,
    ) -> ActionResponse {
        let created_by = match self.session.require_user().map(|user| user.id) {
            Ok(user_id) => user_id,
            Err(err) => return ActionResponse::failure(err.to_string()),
        };
        let draft = match draft_from_input(input, created_by) {
            Ok(draft) => draft,
            Err(message) => return ActionResponse::failure(message),
        };
        match calls(conn).update_call(&self.session, call_id, &draft, Utc::now().naive_utc()) {
            Ok(detail) => ActionResponse::success("Call updated.", Some(detail.call.id)),
            Err(err) => ActionResponse::failure(err.to_string()),
        }
    }

    pub(crate) fn year_statistics(&self, conn: &Connection, year: i32) -> StatisticsResponse {
        match calls(conn).year_statistics(year) {
            Ok(stats) => StatisticsResponse {
                ok: true,
                stats: Some(StatisticsDto::from(stats)),
                message: String::new(),
            },
            Err(err) => StatisticsResponse {
                ok: false,
                stats: None,
                message: err.to_string(),
            },
        }
    }

    pub(crate) fn export_csv(&self, conn: &Connection, year: i32) -> ExportResponse {
        let calls = match calls(conn).list_calls_by_year(year) {
            Ok(calls) => calls,
            Err(err) => return ExportResponse::failure(err.to_string()),
        };
        let names = match creator_names(conn) {
            Ok(names) => names,
            Err(message) => return ExportResponse::failure(message),
        };
        ExportResponse {
            ok: true,
            file_name: export_file_name(self.clock.now().date()),
            csv: calls_to_csv(&calls, &names),
            row_count: u32::try_from(calls.len()).unwrap_or(u32::MAX),
            message: format!("Exported {} call(s).", calls.len()),
        }
    }

    pub(crate) fn list_settings(&self, conn: &Connection) -> SettingsResponse {
        match SqliteSettingsRepository::new(conn).list_settings() {
            Ok(items) => SettingsResponse {
                ok: true,
                items: items
                    .into_iter()
                    .map(|(key, value)| SettingDto { key, value })
                    .collect(),
                message: String::new(),
            },
            Err(err) => SettingsResponse {
                ok: false,
                items: Vec::new(),
                message: err.to_string(),
            },
        }
    }

    pub(crate) fn update_setting(&self, conn: &Connection, key: &str, value: &str) -> ActionResponse {
        if let Err(err) = self.session.require_admin() {
            return ActionResponse::failure(err.to_string());
        }
        match SqliteSettingsRepository::new(conn).set_setting(key, value) {
            Ok(()) => ActionResponse::success("Setting saved.", None),
            Err(err) => ActionResponse::failure(err.to_string()),
        }
    }

    /// Resumes the wizard, or starts a new call, runs `step` and keeps the
    /// resulting state.
    /// A rejected step leaves the stored state as it was.
    fn wizard_action(
        &mut self,
        conn: &Connection,
        step: impl FnOnce(&mut Wizard<'_, '_, C>) -> Result<(), WizardError>,
    ) -> WizardView {
        let calls = calls(conn);
        let mut wizard = match self.wizard.take() {
            Some(state) => WizardController::resume(&calls, &self.clock, state),
            None => WizardController::new(&calls, &self.clock),
        };
        let outcome = step(&mut wizard);
        let view = WizardView::from_state(wizard.state(), outcome.err().map(|err| err.to_string()));
        self.wizard = Some(wizard.into_state());
        view
    }
}

fn action<E: std::fmt::Display>(result: Result<(), E>, message: &str) -> ActionResponse {
    match result {
        Ok(()) => ActionResponse::success(message, None),
        Err(err) => ActionResponse::failure(err.to_string()),
    }
}

fn parse_field(field: &str) -> Result<FieldKey, WizardError> {
    FieldKey::parse(field)
        .ok_or_else(|| WizardError::InvalidInput(format!("unknown wizard field `{field}`")))
}

fn parse_optional_date(value: &str) -> Result<Option<NaiveDate>, String> {
    match value.trim() {
        "" => Ok(None),
        text => NaiveDate::parse_from_str(text, DATE_FORMAT)
            .map(Some)
            .map_err(|_| format!("invalid date `{text}`, expected YYYY-MM-DD")),
    }
}

fn parse_optional_date_time(value: Option<&str>) -> Result<Option<NaiveDateTime>, String> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => NaiveDateTime::parse_from_str(text, DATE_TIME_FORMAT)
            .map(Some)
            .map_err(|_| format!("invalid date and time `{text}`, expected YYYY-MM-DD HH:MM")),
    }
}

fn draft_from_input(input: CallInputDto, created_by: i64) -> Result<CallDraft, String> {
    let mutual_aid = MutualAid::parse(&input.mutual_aid)
        .ok_or_else(|| format!("unknown mutual aid value `{}`", input.mutual_aid))?;
    let dispatched = parse_optional_date_time(Some(&input.dispatched))?
        .ok_or_else(|| "Dispatched time is required".to_string())?;
    Ok(CallDraft {
        incident_number: None,
        call_type: input.call_type,
        mutual_aid,
        mutual_aid_agencies: input.mutual_aid_agencies,
        address: input.address,
        town: input.town,
        location_notes: input.location_notes,
        timeline: Timeline {
            dispatched,
            enroute: parse_optional_date_time(input.enroute.as_deref())?,
            on_scene: parse_optional_date_time(input.on_scene.as_deref())?,
            clear: parse_optional_date_time(input.clear.as_deref())?,
        },
        narrative: input.narrative,
        created_by,
        apparatus_ids: input.apparatus_ids,
        responders: input.responders.into_iter().map(Into::into).collect(),
    })
}

fn creator_names(conn: &Connection) -> Result<HashMap<i64, String>, String> {
    use calllog_core::{UserFilter, UserRepository};

    let users = SqliteUserRepository::new(conn)
        .list_users(UserFilter::All)
        .map_err(|err| err.to_string())?;
    Ok(users
        .iter()
        .map(|user| (user.id, user.display_name()))
        .collect())
}
