use calllog_core::db::open_db_in_memory;
use calllog_core::repo::call_repo::SEARCH_DEFAULT_LIMIT;
use calllog_core::repo::settings_repo::{ADMIN_CAN_ALWAYS_EDIT, EDIT_TIME_LIMIT_MINUTES};
use calllog_core::service::call_service::MAX_CREATE_ATTEMPTS;
use calllog_core::{
    Call, CallDetail, CallDraft, CallId, CallRepository, CallSearchQuery, CallService,
    CallServiceError, CallValidationError, MutualAid, RepoError, RepoResult,
    ResponderAssignment, Session, SettingsRepository, SqliteCallRepository,
    SqliteSettingsRepository, SqliteUserRepository, Timeline, User, UserFilter, UserRepository,
    YearStatistics,
};
use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use rusqlite::Connection;
use std::cell::Cell;
use std::rc::Rc;

#[test]
fn first_call_of_a_year_gets_001() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCallRepository::new(&conn);

    assert_eq!(repo.next_incident_number(2024).unwrap(), "2024-001");
}

#[test]
fn incident_numbers_follow_the_highest_suffix_of_the_same_year() {
    let conn = open_db_in_memory().unwrap();
    let admin = admin_id(&conn);
    let service = call_service(&conn);

    let first = service.create_call(&draft(admin, at(2024, 3, 1, 9, 0))).unwrap();
    let second = service.create_call(&draft(admin, at(2024, 3, 2, 9, 0))).unwrap();
    let other_year = service.create_call(&draft(admin, at(2023, 12, 31, 23, 0))).unwrap();

    assert_eq!(first.call.incident_number, "2024-001");
    assert_eq!(second.call.incident_number, "2024-002");
    assert_eq!(other_year.call.incident_number, "2023-001");
    assert_eq!(service.next_incident_number(2024).unwrap(), "2024-003");
}

#[test]
fn incident_numbers_grow_past_three_digits() {
    let conn = open_db_in_memory().unwrap();
    let admin = admin_id(&conn);
    let repo = SqliteCallRepository::new(&conn);

    let mut proposed = draft(admin, at(2024, 6, 1, 8, 0));
    proposed.incident_number = Some("2024-999".to_string());
    call_service(&conn).create_call(&proposed).unwrap();

    assert_eq!(repo.next_incident_number(2024).unwrap(), "2024-1000");
}

#[test]
fn malformed_incident_numbers_are_ignored_when_allocating() {
    let conn = open_db_in_memory().unwrap();
    let admin = admin_id(&conn);
    let repo = SqliteCallRepository::new(&conn);

    repo.create_call(&draft(admin, at(2024, 1, 1, 1, 0)), "2024-7").unwrap();
    repo.create_call(&draft(admin, at(2024, 1, 1, 2, 0)), "legacy-44").unwrap();

    assert_eq!(repo.next_incident_number(2024).unwrap(), "2024-001");
}

#[test]
fn create_and_get_round_trip_associations() {
    let conn = open_db_in_memory().unwrap();
    let admin = admin_id(&conn);
    let engine = picklist_id(&conn, "apparatus", "Engine 1");
    let rescue = picklist_id(&conn, "apparatus", "Rescue 1");
    let service = call_service(&conn);

    let mut input = draft(admin, at(2024, 4, 10, 14, 5));
    input.mutual_aid = MutualAid::Yes;
    input.mutual_aid_agencies = vec![
        "Pownal Fire Dept".to_string(),
        "Readsboro Fire Dept".to_string(),
        "pownal fire dept".to_string(),
    ];
    input.apparatus_ids = vec![rescue, engine, rescue];
    input.responders = vec![
        ResponderAssignment {
            user_id: admin,
            role: Some("Driver".to_string()),
        },
    ];
    input.timeline.enroute = Some(at(2024, 4, 10, 14, 8));
    input.timeline.on_scene = Some(at(2024, 4, 10, 14, 15));
    input.timeline.clear = Some(at(2024, 4, 10, 15, 0));

    let created = service.create_call(&input).unwrap();
    let loaded = service.get_call(created.call.id).unwrap();

    assert_eq!(created, loaded);
    assert_eq!(loaded.call.incident_number, "2024-001");
    assert_eq!(
        loaded.call.mutual_aid_agencies,
        ["Pownal Fire Dept", "Readsboro Fire Dept"]
    );
    let apparatus: Vec<&str> = loaded.apparatus.iter().map(|item| item.value.as_str()).collect();
    assert_eq!(apparatus, ["Engine 1", "Rescue 1"]);
    assert_eq!(loaded.responders.len(), 1);
    assert_eq!(loaded.responders[0].role.as_deref(), Some("Driver"));
    assert_eq!(loaded.responders[0].first_name, "Admin");
    assert_eq!(loaded.call.timeline, input.timeline);
}

#[test]
fn create_rejects_invalid_drafts_before_writing() {
    let conn = open_db_in_memory().unwrap();
    let admin = admin_id(&conn);
    let service = call_service(&conn);

    let mut blank_address = draft(admin, at(2024, 4, 10, 14, 5));
    blank_address.address = "   ".to_string();
    assert!(matches!(
        service.create_call(&blank_address),
        Err(CallServiceError::Validation(CallValidationError::MissingField("Address")))
    ));

    let mut out_of_order = draft(admin, at(2024, 4, 10, 14, 5));
    out_of_order.timeline.enroute = Some(at(2024, 4, 10, 14, 0));
    let err = service.create_call(&out_of_order).unwrap_err();
    assert_eq!(err.to_string(), "Enroute time cannot be before dispatched time");

    let mut stray_agencies = draft(admin, at(2024, 4, 10, 14, 5));
    stray_agencies.mutual_aid_agencies = vec!["Pownal Fire Dept".to_string()];
    assert!(matches!(
        service.create_call(&stray_agencies),
        Err(CallServiceError::Validation(
            CallValidationError::AgenciesWithoutMutualAid
        ))
    ));

    assert_eq!(count_calls(&conn), 0);
}

#[test]
fn taken_proposal_is_replaced_by_next_free_number() {
    let conn = open_db_in_memory().unwrap();
    let admin = admin_id(&conn);
    let service = call_service(&conn);

    let first = service.create_call(&draft(admin, at(2024, 5, 1, 7, 0))).unwrap();
    let mut stale = draft(admin, at(2024, 5, 1, 7, 30));
    stale.incident_number = Some(first.call.incident_number.clone());

    let second = service.create_call(&stale).unwrap();
    assert_eq!(second.call.incident_number, "2024-002");
    assert_eq!(count_calls(&conn), 2);
}

#[test]
fn create_gives_up_after_repeated_conflicts() {
    let conn = open_db_in_memory().unwrap();
    let admin = admin_id(&conn);
    let attempts = Rc::new(Cell::new(0));
    let repo = AlwaysTakenRepository {
        inner: SqliteCallRepository::new(&conn),
        attempts: Rc::clone(&attempts),
    };
    let service = CallService::new(repo, SqliteSettingsRepository::new(&conn));

    let err = service.create_call(&draft(admin, at(2024, 5, 1, 7, 0))).unwrap_err();
    assert!(matches!(
        err,
        CallServiceError::IncidentNumberConflict { attempts, .. } if attempts == MAX_CREATE_ATTEMPTS
    ));
    assert_eq!(attempts.get(), MAX_CREATE_ATTEMPTS);
    assert_eq!(count_calls(&conn), 0);
}

#[test]
fn duplicate_incident_number_is_reported_by_repository() {
    let conn = open_db_in_memory().unwrap();
    let admin = admin_id(&conn);
    let repo = SqliteCallRepository::new(&conn);

    repo.create_call(&draft(admin, at(2024, 1, 1, 1, 0)), "2024-001").unwrap();
    let err = repo
        .create_call(&draft(admin, at(2024, 1, 1, 2, 0)), "2024-001")
        .unwrap_err();
    assert!(matches!(err, RepoError::Duplicate(number) if number == "2024-001"));
}

#[test]
fn calls_by_year_are_newest_first_and_year_scoped() {
    let conn = open_db_in_memory().unwrap();
    let admin = admin_id(&conn);
    let service = call_service(&conn);

    service.create_call(&draft(admin, at(2024, 1, 5, 10, 0))).unwrap();
    service.create_call(&draft(admin, at(2024, 7, 4, 21, 0))).unwrap();
    service.create_call(&draft(admin, at(2023, 7, 4, 21, 0))).unwrap();

    let calls = service.list_calls_by_year(2024).unwrap();
    let dispatched: Vec<NaiveDateTime> = calls.iter().map(|call| call.timeline.dispatched).collect();
    assert_eq!(dispatched, [at(2024, 7, 4, 21, 0), at(2024, 1, 5, 10, 0)]);

    assert!(service.list_calls_by_year(2022).unwrap().is_empty());
}

#[test]
fn call_years_fall_back_to_current_year() {
    let conn = open_db_in_memory().unwrap();
    let admin = admin_id(&conn);
    let service = call_service(&conn);

    assert_eq!(service.list_call_years(2025).unwrap(), [2025]);

    service.create_call(&draft(admin, at(2022, 2, 2, 2, 0))).unwrap();
    service.create_call(&draft(admin, at(2024, 2, 2, 2, 0))).unwrap();
    service.create_call(&draft(admin, at(2024, 3, 3, 3, 0))).unwrap();
    assert_eq!(service.list_call_years(2025).unwrap(), [2024, 2022]);
}

#[test]
fn recent_calls_page_through_dispatch_order() {
    let conn = open_db_in_memory().unwrap();
    let admin = admin_id(&conn);
    let service = call_service(&conn);

    for day in 1..=5 {
        service.create_call(&draft(admin, at(2024, 8, day, 12, 0))).unwrap();
    }

    let page = service.list_recent_calls(2, 1).unwrap();
    let days: Vec<NaiveDate> = page.iter().map(|call| call.timeline.dispatched.date()).collect();
    assert_eq!(
        days,
        [
            NaiveDate::from_ymd_opt(2024, 8, 4).unwrap(),
            NaiveDate::from_ymd_opt(2024, 8, 3).unwrap(),
        ]
    );
}

#[test]
fn search_matches_text_filters_and_date_range() {
    let conn = open_db_in_memory().unwrap();
    let admin = admin_id(&conn);
    let service = call_service(&conn);

    let mut fire = draft(admin, at(2024, 9, 1, 10, 0));
    fire.call_type = "Structure Fire".to_string();
    fire.address = "12 Mill Rd".to_string();
    fire.town = "Readsboro".to_string();
    service.create_call(&fire).unwrap();

    let mut medical = draft(admin, at(2024, 9, 3, 10, 0));
    medical.call_type = "Medical Emergency".to_string();
    medical.narrative = "Patient 100% alert".to_string();
    service.create_call(&medical).unwrap();

    let by_text = service
        .search_calls(&CallSearchQuery {
            text: Some("mill".to_string()),
            ..CallSearchQuery::default()
        })
        .unwrap();
    assert_eq!(call_types(&by_text), ["Structure Fire"]);

    let by_town = service
        .search_calls(&CallSearchQuery {
            town: Some("readsboro".to_string()),
            ..CallSearchQuery::default()
        })
        .unwrap();
    assert_eq!(call_types(&by_town), ["Structure Fire"]);

    let literal_percent = service
        .search_calls(&CallSearchQuery {
            text: Some("100%".to_string()),
            ..CallSearchQuery::default()
        })
        .unwrap();
    assert_eq!(call_types(&literal_percent), ["Medical Emergency"]);

    let ranged = service
        .search_calls(&CallSearchQuery {
            dispatched_from: NaiveDate::from_ymd_opt(2024, 9, 2),
            dispatched_to: NaiveDate::from_ymd_opt(2024, 9, 3),
            ..CallSearchQuery::default()
        })
        .unwrap();
    assert_eq!(call_types(&ranged), ["Medical Emergency"]);

    let everything = service.search_calls(&CallSearchQuery::default()).unwrap();
    assert_eq!(everything.len(), 2);
    assert!(everything.len() <= SEARCH_DEFAULT_LIMIT as usize);
}

#[test]
fn year_statistics_count_mutual_aid_and_break_ties_alphabetically() {
    let conn = open_db_in_memory().unwrap();
    let admin = admin_id(&conn);
    let service = call_service(&conn);

    for (call_type, mutual_aid) in [
        ("Vehicle Fire", MutualAid::Yes),
        ("Vehicle Fire", MutualAid::No),
        ("Alarm Investigation", MutualAid::Received),
        ("Alarm Investigation", MutualAid::No),
    ] {
        let mut input = draft(admin, at(2024, 10, 1, 10, 0));
        input.call_type = call_type.to_string();
        input.mutual_aid = mutual_aid;
        service.create_call(&input).unwrap();
    }
    service.create_call(&draft(admin, at(2023, 10, 1, 10, 0))).unwrap();

    assert_eq!(
        service.year_statistics(2024).unwrap(),
        YearStatistics {
            year: 2024,
            total: 4,
            mutual_aid_given: 1,
            mutual_aid_received: 1,
            most_common_call_type: Some("Alarm Investigation".to_string()),
        }
    );
    assert_eq!(service.year_statistics(2021).unwrap().most_common_call_type, None);
}

#[test]
fn creator_can_edit_inside_window_only() {
    let conn = open_db_in_memory().unwrap();
    let member = create_member(&conn, "Dana", "Reyes");
    let service = call_service(&conn);
    let created = service.create_call(&draft(member.id, at(2024, 2, 1, 9, 0))).unwrap();
    let created_at = created.call.created_at;

    assert!(service
        .can_user_edit_call(created.call.id, &member, created_at + Duration::minutes(30))
        .unwrap());
    assert!(!service
        .can_user_edit_call(created.call.id, &member, created_at + Duration::minutes(31))
        .unwrap());

    let other = create_member(&conn, "Sam", "Ortiz");
    assert!(!service
        .can_user_edit_call(created.call.id, &other, created_at)
        .unwrap());
}

#[test]
fn admin_override_follows_setting() {
    let conn = open_db_in_memory().unwrap();
    let member = create_member(&conn, "Dana", "Reyes");
    let admin = admin_user(&conn);
    let service = call_service(&conn);
    let created = service.create_call(&draft(member.id, at(2024, 2, 1, 9, 0))).unwrap();
    let much_later = created.call.created_at + Duration::days(90);

    assert!(service.can_user_edit_call(created.call.id, &admin, much_later).unwrap());

    let settings = SqliteSettingsRepository::new(&conn);
    settings.set_setting(ADMIN_CAN_ALWAYS_EDIT, "false").unwrap();
    assert!(!service.can_user_edit_call(created.call.id, &admin, much_later).unwrap());

    settings.set_setting(EDIT_TIME_LIMIT_MINUTES, "not-a-number").unwrap();
    assert!(matches!(
        service.can_user_edit_call(created.call.id, &member, much_later),
        Err(CallServiceError::Repo(RepoError::InvalidData(_)))
    ));
}

#[test]
fn update_replaces_fields_and_associations() {
    let conn = open_db_in_memory().unwrap();
    let member = create_member(&conn, "Dana", "Reyes");
    let engine = picklist_id(&conn, "apparatus", "Engine 1");
    let service = call_service(&conn);

    let mut original = draft(member.id, at(2024, 2, 1, 9, 0));
    original.apparatus_ids = vec![engine];
    let created = service.create_call(&original).unwrap();

    let mut session = Session::new();
    session.login(member.clone());

    let mut edited = original.clone();
    edited.address = "99 River St".to_string();
    edited.apparatus_ids = Vec::new();
    edited.mutual_aid = MutualAid::Yes;
    edited.mutual_aid_agencies = vec!["Searsburg Fire Dept".to_string()];
    let updated = service
        .update_call(&session, created.call.id, &edited, Utc::now().naive_utc())
        .unwrap();

    assert_eq!(updated.call.address, "99 River St");
    assert_eq!(updated.call.incident_number, created.call.incident_number);
    assert!(updated.apparatus.is_empty());
    assert_eq!(updated.call.mutual_aid_agencies, ["Searsburg Fire Dept"]);
}

#[test]
fn update_is_denied_outside_window_and_without_login() {
    let conn = open_db_in_memory().unwrap();
    let member = create_member(&conn, "Dana", "Reyes");
    let service = call_service(&conn);
    let input = draft(member.id, at(2024, 2, 1, 9, 0));
    let created = service.create_call(&input).unwrap();

    let anonymous = Session::new();
    assert!(matches!(
        service.update_call(&anonymous, created.call.id, &input, Utc::now().naive_utc()),
        Err(CallServiceError::Session(_))
    ));

    let mut session = Session::new();
    session.login(member);
    let late = created.call.created_at + Duration::hours(2);
    assert!(matches!(
        service.update_call(&session, created.call.id, &input, late),
        Err(CallServiceError::EditNotAllowed(id)) if id == created.call.id
    ));

    assert!(matches!(
        service.update_call(&session, 4242, &input, Utc::now().naive_utc()),
        Err(CallServiceError::CallNotFound(4242))
    ));
}

struct AlwaysTakenRepository<'conn> {
    inner: SqliteCallRepository<'conn>,
    attempts: Rc<Cell<usize>>,
}

impl CallRepository for AlwaysTakenRepository<'_> {
    fn next_incident_number(&self, year: i32) -> RepoResult<String> {
        self.inner.next_incident_number(year)
    }

    fn create_call(&self, _draft: &CallDraft, incident_number: &str) -> RepoResult<CallId> {
        self.attempts.set(self.attempts.get() + 1);
        Err(RepoError::Duplicate(incident_number.to_string()))
    }

    fn update_call(&self, id: CallId, draft: &CallDraft) -> RepoResult<()> {
        self.inner.update_call(id, draft)
    }

    fn get_call(&self, id: CallId) -> RepoResult<Option<CallDetail>> {
        self.inner.get_call(id)
    }

    fn list_calls_by_year(&self, year: i32) -> RepoResult<Vec<Call>> {
        self.inner.list_calls_by_year(year)
    }

    fn list_call_years(&self) -> RepoResult<Vec<i32>> {
        self.inner.list_call_years()
    }

    fn list_recent_calls(&self, limit: u32, offset: u32) -> RepoResult<Vec<Call>> {
        self.inner.list_recent_calls(limit, offset)
    }

    fn search_calls(&self, query: &CallSearchQuery) -> RepoResult<Vec<Call>> {
        self.inner.search_calls(query)
    }

    fn year_statistics(&self, year: i32) -> RepoResult<YearStatistics> {
        self.inner.year_statistics(year)
    }
}

fn call_service(
    conn: &Connection,
) -> CallService<SqliteCallRepository<'_>, SqliteSettingsRepository<'_>> {
    CallService::new(
        SqliteCallRepository::new(conn),
        SqliteSettingsRepository::new(conn),
    )
}

fn draft(created_by: i64, dispatched: NaiveDateTime) -> CallDraft {
    CallDraft {
        incident_number: None,
        call_type: "Medical Emergency".to_string(),
        mutual_aid: MutualAid::No,
        mutual_aid_agencies: Vec::new(),
        address: "1 Main St".to_string(),
        town: "Stamford".to_string(),
        location_notes: String::new(),
        timeline: Timeline {
            dispatched,
            enroute: None,
            on_scene: None,
            clear: None,
        },
        narrative: "Transported to hospital".to_string(),
        created_by,
        apparatus_ids: Vec::new(),
        responders: Vec::new(),
    }
}

fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

fn call_types(calls: &[Call]) -> Vec<&str> {
    calls.iter().map(|call| call.call_type.as_str()).collect()
}

fn admin_user(conn: &Connection) -> User {
    SqliteUserRepository::new(conn)
        .list_users(UserFilter::ActiveAdmins)
        .unwrap()
        .remove(0)
}

fn admin_id(conn: &Connection) -> i64 {
    admin_user(conn).id
}

fn create_member(conn: &Connection, first_name: &str, last_name: &str) -> User {
    let repo = SqliteUserRepository::new(conn);
    let id = repo
        .create_user(&calllog_core::model::user::NewUser {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            position: "Member".to_string(),
            ems_level: None,
            pin: calllog_core::Pin::parse("4321").unwrap(),
            is_admin: false,
        })
        .unwrap();
    repo.get_user(id).unwrap().unwrap()
}

fn picklist_id(conn: &Connection, category: &str, value: &str) -> i64 {
    conn.query_row(
        "SELECT id FROM picklists WHERE category = ?1 AND value = ?2;",
        [category, value],
        |row| row.get(0),
    )
    .unwrap()
}

fn count_calls(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM calls;", [], |row| row.get(0))
        .unwrap()
}
