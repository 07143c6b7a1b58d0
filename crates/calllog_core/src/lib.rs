//! Core domain logic for the fire/EMS call log.
//! This crate is the single source of truth for business invariants.

pub mod config;
pub mod db;
pub mod export;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod session;
pub mod wizard;

pub use config::AppConfig;
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::call::{
    Call, CallDetail, CallDraft, CallId, CallResponder, CallValidationError, MutualAid,
    ResponderAssignment, Timeline, TimelineField,
};
pub use model::picklist::{PicklistCategory, PicklistItem, PicklistItemId};
pub use model::user::{Pin, User, UserId, UserUpdate};
pub use repo::call_repo::{CallRepository, CallSearchQuery, SqliteCallRepository, YearStatistics};
pub use repo::picklist_repo::{PicklistRepository, SqlitePicklistRepository};
pub use repo::settings_repo::{EditPolicy, SettingsRepository, SqliteSettingsRepository};
pub use repo::user_repo::{SqliteUserRepository, UserFilter, UserRepository};
pub use repo::{RepoError, RepoResult};
pub use service::call_service::{CallService, CallServiceError};
pub use service::picklist_service::{PicklistService, PicklistServiceError};
pub use service::user_service::{CreateUserRequest, UserService, UserServiceError};
pub use session::{Session, SessionError};
pub use wizard::{WizardController, WizardError, WizardState};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
