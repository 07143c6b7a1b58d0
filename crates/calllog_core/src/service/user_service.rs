//! User and authentication use-case service.
//!
//! # Responsibility
//! - Log users in and out of a [`Session`] and manage their own PIN.
//! - Gate roster administration on the session user being an admin.
//!
//! # Invariants
//! - Only active users can log in.
//! - Failed logins never reveal whether the name or the PIN was wrong.
//! - PINs are never logged.

use crate::model::user::{NewUser, Pin, User, UserId, UserUpdate, UserValidationError};
use crate::repo::user_repo::{UserFilter, UserRepository};
use crate::repo::RepoError;
use crate::session::{Session, SessionError};
use chrono::NaiveDate;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum UserServiceError {
    InvalidCredentials,
    /// The old PIN given to a PIN change did not match.
    WrongPin,
    Validation(UserValidationError),
    UserNotFound(UserId),
    Session(SessionError),
    Repo(RepoError),
}

impl Display for UserServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCredentials => write!(f, "invalid name or PIN"),
            Self::WrongPin => write!(f, "current PIN is incorrect"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::Session(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for UserServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Session(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for UserServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::UserValidation(err) => Self::Validation(err),
            RepoError::NotFound { entity: "user", id } => Self::UserNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<UserValidationError> for UserServiceError {
    fn from(value: UserValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<SessionError> for UserServiceError {
    fn from(value: SessionError) -> Self {
        Self::Session(value)
    }
}

pub type UserServiceResult<T> = Result<T, UserServiceError>;

/// Roster fields accepted by [`UserService::create_user`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateUserRequest {
    pub first_name: String,
    pub last_name: String,
    pub position: String,
    pub ems_level: Option<String>,
    pub pin: String,
    pub confirm_pin: String,
    pub is_admin: bool,
}

pub struct UserService<R: UserRepository> {
    repo: R,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Verifies `display_name` (`First Last`) and `pin`, then logs the user in.
    pub fn login(
        &self,
        session: &mut Session,
        display_name: &str,
        pin: &str,
    ) -> UserServiceResult<User> {
        let Some(credentials) = self.repo.find_credentials(display_name)? else {
            warn!("event=login module=service status=denied reason=unknown_user");
            return Err(UserServiceError::InvalidCredentials);
        };
        if !credentials.digest.verify(pin) {
            warn!(
                "event=login module=service status=denied user_id={} reason=bad_pin",
                credentials.user.id
            );
            return Err(UserServiceError::InvalidCredentials);
        }

        info!(
            "event=login module=service status=ok user_id={} admin={}",
            credentials.user.id, credentials.user.is_admin
        );
        session.login(credentials.user.clone());
        Ok(credentials.user)
    }

    pub fn logout(&self, session: &mut Session) {
        if let Some(user) = session.current_user() {
            info!("event=logout module=service status=ok user_id={}", user.id);
        }
        session.logout();
    }

    /// Changes the logged-in user's own PIN.
    pub fn change_pin(
        &self,
        session: &Session,
        old_pin: &str,
        new_pin: &str,
        confirm_pin: &str,
    ) -> UserServiceResult<()> {
        let user = session.require_user()?;
        let digest = self
            .repo
            .get_pin_digest(user.id)?
            .ok_or(UserServiceError::UserNotFound(user.id))?;
        if !digest.verify(old_pin) {
            return Err(UserServiceError::WrongPin);
        }
        let pin = Pin::parse_confirmed(new_pin, confirm_pin)?;
        self.repo.set_pin(user.id, &pin)?;
        info!(
            "event=pin_change module=service status=ok user_id={}",
            user.id
        );
        Ok(())
    }

    /// Names of active admins, shown as a contact hint after a failed login.
    pub fn admin_contact_names(&self) -> UserServiceResult<Vec<String>> {
        Ok(self
            .repo
            .list_users(UserFilter::ActiveAdmins)?
            .iter()
            .map(User::display_name)
            .collect())
    }

    pub fn list_active_users(&self) -> UserServiceResult<Vec<User>> {
        Ok(self.repo.list_users(UserFilter::Active)?)
    }

    pub fn list_admin_users(&self) -> UserServiceResult<Vec<User>> {
        Ok(self.repo.list_users(UserFilter::ActiveAdmins)?)
    }

    pub fn list_all_users(&self, session: &Session) -> UserServiceResult<Vec<User>> {
        session.require_admin()?;
        Ok(self.repo.list_users(UserFilter::All)?)
    }

    pub fn get_user(&self, id: UserId) -> UserServiceResult<User> {
        self.repo
            .get_user(id)?
            .ok_or(UserServiceError::UserNotFound(id))
    }

    pub fn create_user(
        &self,
        session: &Session,
        request: &CreateUserRequest,
    ) -> UserServiceResult<User> {
        let admin = session.require_admin()?;
        let new_user = NewUser {
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            position: request.position.clone(),
            ems_level: request.ems_level.clone(),
            pin: Pin::parse_confirmed(&request.pin, &request.confirm_pin)?,
            is_admin: request.is_admin,
        };
        let id = self.repo.create_user(&new_user)?;
        info!(
            "event=user_create module=service status=ok user_id={} by={} admin={}",
            id, admin.id, request.is_admin
        );
        self.get_user(id)
    }

    pub fn update_user(
        &self,
        session: &mut Session,
        update: &UserUpdate,
    ) -> UserServiceResult<User> {
        session.require_admin()?;
        self.repo.update_user(update)?;
        let user = self.get_user(update.id)?;
        session.refresh(user.clone());
        Ok(user)
    }

    pub fn deactivate_user(&self, session: &Session, id: UserId) -> UserServiceResult<()> {
        let admin = session.require_admin()?;
        self.repo.set_active(id, false)?;
        info!(
            "event=user_deactivate module=service status=ok user_id={} by={}",
            id, admin.id
        );
        Ok(())
    }

    /// Admin reset of another user's PIN; no old PIN needed.
    pub fn reset_user_pin(
        &self,
        session: &Session,
        id: UserId,
        new_pin: &str,
        confirm_pin: &str,
    ) -> UserServiceResult<()> {
        let admin = session.require_admin()?;
        let pin = Pin::parse_confirmed(new_pin, confirm_pin)?;
        self.repo.set_pin(id, &pin)?;
        info!(
            "event=pin_reset module=service status=ok user_id={} by={}",
            id, admin.id
        );
        Ok(())
    }

    pub fn update_user_position(
        &self,
        session: &Session,
        id: UserId,
        position: &str,
        ems_level: Option<&str>,
    ) -> UserServiceResult<()> {
        session.require_admin()?;
        Ok(self.repo.set_position(id, position, ems_level)?)
    }

    pub fn update_user_admin_status(
        &self,
        session: &Session,
        id: UserId,
        is_admin: bool,
    ) -> UserServiceResult<()> {
        session.require_admin()?;
        Ok(self.repo.set_admin(id, is_admin)?)
    }

    pub fn update_user_joined_date(
        &self,
        session: &Session,
        id: UserId,
        joined: Option<NaiveDate>,
    ) -> UserServiceResult<()> {
        session.require_admin()?;
        Ok(self.repo.set_joined_date(id, joined)?)
    }
}
