use calllog_core::db::{open_db_in_memory, DEFAULT_ADMIN_PIN};
use calllog_core::model::picklist::PicklistValidationError;
use calllog_core::{
    PicklistCategory, PicklistService, PicklistServiceError, Session, SessionError,
    SqlitePicklistRepository, SqliteUserRepository, UserService,
};
use rusqlite::Connection;

#[test]
fn seeded_picklists_are_returned_in_sort_order() {
    let conn = open_db_in_memory().unwrap();
    let service = picklist_service(&conn);

    assert_eq!(
        service.values(PicklistCategory::MutualAid).unwrap(),
        ["No", "Yes", "Received"]
    );
    let apparatus = service.get_picklist(PicklistCategory::Apparatus).unwrap();
    assert_eq!(apparatus.first().map(|item| item.value.as_str()), Some("Engine 1"));
    assert!(apparatus.iter().all(|item| item.active));
}

#[test]
fn every_seeded_category_is_listed() {
    let conn = open_db_in_memory().unwrap();
    let service = picklist_service(&conn);

    let mut categories = service.list_categories().unwrap();
    categories.sort_by_key(|category| category.as_str());
    let mut expected = PicklistCategory::ALL.to_vec();
    expected.sort_by_key(|category| category.as_str());
    assert_eq!(categories, expected);
}

#[test]
fn admin_adds_trimmed_item_and_rejects_duplicates() {
    let conn = open_db_in_memory().unwrap();
    let service = picklist_service(&conn);
    let session = admin_session(&conn);

    let item = service
        .create_item(&session, PicklistCategory::Town, "  Searsburg ", 4)
        .unwrap();
    assert_eq!(item.value, "Searsburg");
    assert_eq!(item.category, PicklistCategory::Town);
    assert_eq!(
        service.values(PicklistCategory::Town).unwrap(),
        ["Stamford", "Readsboro", "Whitingham", "Searsburg"]
    );

    assert!(matches!(
        service.create_item(&session, PicklistCategory::Town, "Searsburg", 9),
        Err(PicklistServiceError::DuplicateValue(value)) if value == "Searsburg"
    ));
    assert!(matches!(
        service.create_item(&session, PicklistCategory::Town, "   ", 9),
        Err(PicklistServiceError::Validation(PicklistValidationError::EmptyValue))
    ));
}

#[test]
fn same_value_may_exist_in_different_categories() {
    let conn = open_db_in_memory().unwrap();
    let service = picklist_service(&conn);
    let session = admin_session(&conn);

    service
        .create_item(&session, PicklistCategory::Apparatus, "EMT", 20)
        .unwrap();
    assert!(service
        .values(PicklistCategory::ResponderRole)
        .unwrap()
        .contains(&"EMT".to_string()));
}

#[test]
fn deactivated_items_leave_active_lists_but_stay_for_admins() {
    let conn = open_db_in_memory().unwrap();
    let service = picklist_service(&conn);
    let session = admin_session(&conn);
    let chief = service
        .get_picklist(PicklistCategory::Apparatus)
        .unwrap()
        .into_iter()
        .find(|item| item.value == "Chief")
        .unwrap();

    service.deactivate_item(&session, chief.id).unwrap();

    assert!(!service
        .values(PicklistCategory::Apparatus)
        .unwrap()
        .contains(&"Chief".to_string()));
    let all = service
        .list_all_items(&session, PicklistCategory::Apparatus)
        .unwrap();
    assert!(all.iter().any(|item| item.id == chief.id && !item.active));

    let restored = service
        .update_item(&session, chief.id, "Chief 1", chief.sort_order, true)
        .unwrap();
    assert_eq!(restored.value, "Chief 1");
    assert!(restored.active);
}

#[test]
fn picklist_changes_require_an_admin() {
    let conn = open_db_in_memory().unwrap();
    let service = picklist_service(&conn);

    assert!(matches!(
        service.create_item(&Session::new(), PicklistCategory::Town, "Halifax", 5),
        Err(PicklistServiceError::Session(SessionError::NotLoggedIn))
    ));
    assert!(matches!(
        service.list_all_items(&Session::new(), PicklistCategory::Town),
        Err(PicklistServiceError::Session(SessionError::NotLoggedIn))
    ));
}

#[test]
fn missing_items_are_reported() {
    let conn = open_db_in_memory().unwrap();
    let service = picklist_service(&conn);
    let session = admin_session(&conn);

    assert!(matches!(
        service.deactivate_item(&session, 9999),
        Err(PicklistServiceError::ItemNotFound(9999))
    ));
    assert!(matches!(
        service.update_item(&session, 9999, "Ghost", 1, true),
        Err(PicklistServiceError::ItemNotFound(9999))
    ));
}

fn picklist_service(conn: &Connection) -> PicklistService<SqlitePicklistRepository<'_>> {
    PicklistService::new(SqlitePicklistRepository::new(conn))
}

fn admin_session(conn: &Connection) -> Session {
    let users = UserService::new(SqliteUserRepository::new(conn));
    let mut session = Session::new();
    users
        .login(&mut session, "Admin User", DEFAULT_ADMIN_PIN)
        .unwrap();
    session
}
