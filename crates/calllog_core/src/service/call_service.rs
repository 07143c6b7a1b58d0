//! Call use-case service.
//!
//! # Responsibility
//! - Allocate incident numbers and create calls, retrying on number conflicts.
//! - Serve list, search, detail and statistics reads.
//! - Enforce the edit-window policy before updates.
//!
//! # Invariants
//! - At most [`MAX_CREATE_ATTEMPTS`] inserts are tried per create.
//! - `created_at` and the `now` passed to edit checks are both UTC.

use crate::model::call::{Call, CallDetail, CallDraft, CallId, CallValidationError};
use crate::model::user::User;
use crate::repo::call_repo::{CallRepository, CallSearchQuery, YearStatistics};
use crate::repo::settings_repo::SettingsRepository;
use crate::repo::RepoError;
use crate::session::{Session, SessionError};
use chrono::{Datelike, Duration, NaiveDateTime};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const MAX_CREATE_ATTEMPTS: usize = 3;

#[derive(Debug)]
pub enum CallServiceError {
    Validation(CallValidationError),
    CallNotFound(CallId),
    /// Every attempt hit an incident number that was already taken.
    IncidentNumberConflict { attempts: usize, last_tried: String },
    EditNotAllowed(CallId),
    Session(SessionError),
    Repo(RepoError),
    /// A write succeeded but the read-back did not find the row.
    InconsistentState(&'static str),
}

impl Display for CallServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::CallNotFound(id) => write!(f, "call not found: {id}"),
            Self::IncidentNumberConflict {
                attempts,
                last_tried,
            } => write!(
                f,
                "could not allocate a free incident number after {attempts} attempts (last tried {last_tried})"
            ),
            Self::EditNotAllowed(_) => write!(
                f,
                "you can no longer edit this call; the edit window has passed"
            ),
            Self::Session(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent call state: {details}"),
        }
    }
}

impl Error for CallServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Session(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CallServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::CallValidation(err) => Self::Validation(err),
            RepoError::NotFound { entity: "call", id } => Self::CallNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<CallValidationError> for CallServiceError {
    fn from(value: CallValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<SessionError> for CallServiceError {
    fn from(value: SessionError) -> Self {
        Self::Session(value)
    }
}

pub type CallServiceResult<T> = Result<T, CallServiceError>;

/// Call service facade over call and settings repositories.
pub struct CallService<R: CallRepository, S: SettingsRepository> {
    repo: R,
    settings: S,
}

impl<R: CallRepository, S: SettingsRepository> CallService<R, S> {
    pub fn new(repo: R, settings: S) -> Self {
        Self { repo, settings }
    }

    /// Next unused number for `year`, for display only.
    pub fn next_incident_number(&self, year: i32) -> CallServiceResult<String> {
        Ok(self.repo.next_incident_number(year)?)
    }

    /// Stores `draft` and returns the stored call.
    ///
    /// A proposed `draft.incident_number` is tried first. When the unique index
    /// rejects a number, the next free number for the dispatched year is
    /// allocated and the insert retried.
    pub fn create_call(&self, draft: &CallDraft) -> CallServiceResult<CallDetail> {
        draft.validate()?;
        let year = draft.timeline.dispatched.year();

        let mut candidate = match draft.incident_number.as_deref().map(str::trim) {
            Some(number) if !number.is_empty() => number.to_string(),
            _ => self.repo.next_incident_number(year)?,
        };

        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            match self.repo.create_call(draft, &candidate) {
                Ok(call_id) => {
                    info!(
                        "event=call_create module=service status=ok call_id={} incident_number={} attempt={}",
                        call_id, candidate, attempt
                    );
                    return self
                        .repo
                        .get_call(call_id)?
                        .ok_or(CallServiceError::InconsistentState(
                            "created call not found in read-back",
                        ));
                }
                Err(RepoError::Duplicate(_)) => {
                    warn!(
                        "event=call_create module=service status=conflict incident_number={} attempt={}",
                        candidate, attempt
                    );
                    if attempt == MAX_CREATE_ATTEMPTS {
                        break;
                    }
                    candidate = self.repo.next_incident_number(year)?;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(CallServiceError::IncidentNumberConflict {
            attempts: MAX_CREATE_ATTEMPTS,
            last_tried: candidate,
        })
    }

    pub fn get_call(&self, id: CallId) -> CallServiceResult<CallDetail> {
        self.repo
            .get_call(id)?
            .ok_or(CallServiceError::CallNotFound(id))
    }

    pub fn list_calls_by_year(&self, year: i32) -> CallServiceResult<Vec<Call>> {
        Ok(self.repo.list_calls_by_year(year)?)
    }

    /// Years holding calls, newest first, or `[current_year]` when empty.
    pub fn list_call_years(&self, current_year: i32) -> CallServiceResult<Vec<i32>> {
        let years = self.repo.list_call_years()?;
        if years.is_empty() {
            return Ok(vec![current_year]);
        }
        Ok(years)
    }

    pub fn list_recent_calls(&self, limit: u32, offset: u32) -> CallServiceResult<Vec<Call>> {
        Ok(self.repo.list_recent_calls(limit, offset)?)
    }

    pub fn search_calls(&self, query: &CallSearchQuery) -> CallServiceResult<Vec<Call>> {
        Ok(self.repo.search_calls(query)?)
    }

    pub fn year_statistics(&self, year: i32) -> CallServiceResult<YearStatistics> {
        Ok(self.repo.year_statistics(year)?)
    }

    /// Admins may always edit when the setting allows it; creators may edit
    /// within `edit_time_limit_minutes` of creation. `now_utc` must be UTC.
    pub fn can_user_edit_call(
        &self,
        call_id: CallId,
        user: &User,
        now_utc: NaiveDateTime,
    ) -> CallServiceResult<bool> {
        let detail = self.get_call(call_id)?;
        let policy = self.settings.edit_policy()?;

        if user.is_admin && policy.admin_can_always_edit {
            return Ok(true);
        }
        if detail.call.created_by != user.id {
            return Ok(false);
        }
        let window = Duration::minutes(policy.edit_time_limit_minutes.max(0));
        Ok(now_utc - detail.call.created_at <= window)
    }

    /// Replaces a stored call after checking the session user may edit it.
    pub fn update_call(
        &self,
        session: &Session,
        call_id: CallId,
        draft: &CallDraft,
        now_utc: NaiveDateTime,
    ) -> CallServiceResult<CallDetail> {
        let user = session.require_user()?;
        draft.validate()?;
        if !self.can_user_edit_call(call_id, user, now_utc)? {
            warn!(
                "event=call_update module=service status=denied call_id={} user_id={}",
                call_id, user.id
            );
            return Err(CallServiceError::EditNotAllowed(call_id));
        }

        self.repo.update_call(call_id, draft)?;
        info!(
            "event=call_update module=service status=ok call_id={} user_id={}",
            call_id, user.id
        );
        self.repo
            .get_call(call_id)?
            .ok_or(CallServiceError::InconsistentState(
                "updated call not found in read-back",
            ))
    }
}
