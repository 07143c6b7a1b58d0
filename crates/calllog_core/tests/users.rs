use calllog_core::db::{open_db_in_memory, DEFAULT_ADMIN_PIN};
use calllog_core::model::user::UserValidationError;
use calllog_core::{
    CreateUserRequest, Session, SessionError, SqliteUserRepository, UserRepository, UserService,
    UserServiceError, UserUpdate,
};
use chrono::NaiveDate;
use rusqlite::Connection;

#[test]
fn default_admin_can_log_in_case_insensitively() {
    let conn = open_db_in_memory().unwrap();
    let service = user_service(&conn);
    let mut session = Session::new();

    let user = service
        .login(&mut session, "  admin   user ", DEFAULT_ADMIN_PIN)
        .unwrap();

    assert!(user.is_admin);
    assert_eq!(session.current_user(), Some(&user));
}

#[test]
fn wrong_pin_and_unknown_name_fail_the_same_way() {
    let conn = open_db_in_memory().unwrap();
    let service = user_service(&conn);
    let mut session = Session::new();

    let wrong_pin = service.login(&mut session, "Admin User", "9999").unwrap_err();
    let unknown = service.login(&mut session, "Nobody Here", "1234").unwrap_err();

    assert!(matches!(wrong_pin, UserServiceError::InvalidCredentials));
    assert!(matches!(unknown, UserServiceError::InvalidCredentials));
    assert_eq!(wrong_pin.to_string(), unknown.to_string());
    assert!(!session.is_logged_in());
}

#[test]
fn admin_creates_member_who_can_then_log_in() {
    let conn = open_db_in_memory().unwrap();
    let service = user_service(&conn);
    let admin_session = admin_session(&service);

    let member = service
        .create_user(&admin_session, &member_request("Dana", "Reyes", "2468"))
        .unwrap();
    assert!(!member.is_admin);
    assert!(member.active);
    assert_eq!(member.display_name(), "Dana Reyes");

    let mut session = Session::new();
    let logged_in = service.login(&mut session, "Dana Reyes", "2468").unwrap();
    assert_eq!(logged_in.id, member.id);
}

#[test]
fn create_user_validates_pin_and_names() {
    let conn = open_db_in_memory().unwrap();
    let service = user_service(&conn);
    let admin_session = admin_session(&service);

    let mut short_pin = member_request("Dana", "Reyes", "12");
    short_pin.confirm_pin = "12".to_string();
    assert!(matches!(
        service.create_user(&admin_session, &short_pin),
        Err(UserServiceError::Validation(UserValidationError::InvalidPin))
    ));

    let mut mismatch = member_request("Dana", "Reyes", "2468");
    mismatch.confirm_pin = "2469".to_string();
    assert!(matches!(
        service.create_user(&admin_session, &mismatch),
        Err(UserServiceError::Validation(UserValidationError::PinMismatch))
    ));

    let blank_name = member_request(" ", "Reyes", "2468");
    assert!(matches!(
        service.create_user(&admin_session, &blank_name),
        Err(UserServiceError::Validation(UserValidationError::MissingName))
    ));
}

#[test]
fn roster_administration_requires_an_admin() {
    let conn = open_db_in_memory().unwrap();
    let service = user_service(&conn);
    let admin_session = admin_session(&service);
    let member = service
        .create_user(&admin_session, &member_request("Dana", "Reyes", "2468"))
        .unwrap();

    let anonymous = Session::new();
    assert!(matches!(
        service.list_all_users(&anonymous),
        Err(UserServiceError::Session(SessionError::NotLoggedIn))
    ));

    let mut member_session = Session::new();
    service.login(&mut member_session, "Dana Reyes", "2468").unwrap();
    assert!(matches!(
        service.create_user(&member_session, &member_request("Sam", "Ortiz", "1357")),
        Err(UserServiceError::Session(SessionError::AdminRequired))
    ));
    assert!(matches!(
        service.reset_user_pin(&member_session, member.id, "0000", "0000"),
        Err(UserServiceError::Session(SessionError::AdminRequired))
    ));
}

#[test]
fn change_pin_requires_the_current_pin() {
    let conn = open_db_in_memory().unwrap();
    let service = user_service(&conn);
    let mut session = admin_session(&service);

    assert!(matches!(
        service.change_pin(&session, "0000", "5678", "5678"),
        Err(UserServiceError::WrongPin)
    ));
    service
        .change_pin(&session, DEFAULT_ADMIN_PIN, "5678", "5678")
        .unwrap();

    service.logout(&mut session);
    assert!(!session.is_logged_in());
    assert!(service.login(&mut session, "Admin User", DEFAULT_ADMIN_PIN).is_err());
    service.login(&mut session, "Admin User", "5678").unwrap();
}

#[test]
fn deactivated_users_cannot_log_in_or_appear_as_active() {
    let conn = open_db_in_memory().unwrap();
    let service = user_service(&conn);
    let admin_session = admin_session(&service);
    let member = service
        .create_user(&admin_session, &member_request("Dana", "Reyes", "2468"))
        .unwrap();

    service.deactivate_user(&admin_session, member.id).unwrap();

    let mut session = Session::new();
    assert!(matches!(
        service.login(&mut session, "Dana Reyes", "2468"),
        Err(UserServiceError::InvalidCredentials)
    ));
    assert!(service
        .list_active_users()
        .unwrap()
        .iter()
        .all(|user| user.id != member.id));
    assert!(service
        .list_all_users(&admin_session)
        .unwrap()
        .iter()
        .any(|user| user.id == member.id && !user.active));
}

#[test]
fn admin_profile_updates_are_persisted() {
    let conn = open_db_in_memory().unwrap();
    let service = user_service(&conn);
    let mut admin_session = admin_session(&service);
    let member = service
        .create_user(&admin_session, &member_request("Dana", "Reyes", "2468"))
        .unwrap();

    service
        .update_user_position(&admin_session, member.id, "Captain", Some("EMT"))
        .unwrap();
    service
        .update_user_admin_status(&admin_session, member.id, true)
        .unwrap();
    let joined = NaiveDate::from_ymd_opt(2019, 4, 1).unwrap();
    service
        .update_user_joined_date(&admin_session, member.id, Some(joined))
        .unwrap();

    let reloaded = service.get_user(member.id).unwrap();
    assert_eq!(reloaded.position, "Captain");
    assert_eq!(reloaded.ems_level.as_deref(), Some("EMT"));
    assert!(reloaded.is_admin);
    assert_eq!(reloaded.joined_date, Some(joined));

    let renamed = service
        .update_user(
            &mut admin_session,
            &UserUpdate {
                id: member.id,
                first_name: "Danielle".to_string(),
                last_name: "Reyes".to_string(),
                position: "Captain".to_string(),
                ems_level: Some("EMT".to_string()),
                is_admin: true,
                active: true,
            },
        )
        .unwrap();
    assert_eq!(renamed.display_name(), "Danielle Reyes");

    let mut names = service.admin_contact_names().unwrap();
    names.sort();
    assert_eq!(names, ["Admin User", "Danielle Reyes"]);
}

#[test]
fn updates_to_missing_users_are_reported() {
    let conn = open_db_in_memory().unwrap();
    let service = user_service(&conn);
    let admin_session = admin_session(&service);

    assert!(matches!(
        service.deactivate_user(&admin_session, 4242),
        Err(UserServiceError::UserNotFound(4242))
    ));
    assert!(matches!(
        service.get_user(4242),
        Err(UserServiceError::UserNotFound(4242))
    ));
}

#[test]
fn admin_pin_reset_replaces_stored_digest() {
    let conn = open_db_in_memory().unwrap();
    let service = user_service(&conn);
    let admin_session = admin_session(&service);
    let member = service
        .create_user(&admin_session, &member_request("Dana", "Reyes", "2468"))
        .unwrap();
    let repo = SqliteUserRepository::new(&conn);
    let before = repo.get_pin_digest(member.id).unwrap().unwrap();

    service
        .reset_user_pin(&admin_session, member.id, "1111", "1111")
        .unwrap();

    let after = repo.get_pin_digest(member.id).unwrap().unwrap();
    assert_ne!(before.salt(), after.salt());
    assert!(after.verify("1111"));
    assert!(!after.verify("2468"));
}

fn user_service(conn: &Connection) -> UserService<SqliteUserRepository<'_>> {
    UserService::new(SqliteUserRepository::new(conn))
}

fn admin_session(service: &UserService<SqliteUserRepository<'_>>) -> Session {
    let mut session = Session::new();
    service
        .login(&mut session, "Admin User", DEFAULT_ADMIN_PIN)
        .unwrap();
    session
}

fn member_request(first_name: &str, last_name: &str, pin: &str) -> CreateUserRequest {
    CreateUserRequest {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        position: "Member".to_string(),
        ems_level: None,
        pin: pin.to_string(),
        confirm_pin: pin.to_string(),
        is_admin: false,
    }
}
