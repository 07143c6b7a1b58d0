//! Logged-in user context.
//!
//! # Invariants
//! - At most one user is logged in per session.
//! - Admin-only operations check [`Session::require_admin`] before touching storage.

use crate::model::user::User;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    current_user: Option<User>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    NotLoggedIn,
    AdminRequired,
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotLoggedIn => write!(f, "no user is logged in"),
            Self::AdminRequired => write!(f, "administrator access required"),
        }
    }
}

impl Error for SessionError {}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn login(&mut self, user: User) {
        self.current_user = Some(user);
    }

    pub fn logout(&mut self) {
        self.current_user = None;
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.current_user.is_some()
    }

    pub fn require_user(&self) -> Result<&User, SessionError> {
        self.current_user.as_ref().ok_or(SessionError::NotLoggedIn)
    }

    pub fn require_admin(&self) -> Result<&User, SessionError> {
        let user = self.require_user()?;
        if !user.is_admin {
            return Err(SessionError::AdminRequired);
        }
        Ok(user)
    }

    /// Swaps in a fresher copy of the logged-in user, e.g. after a profile edit.
    pub fn refresh(&mut self, user: User) {
        if self
            .current_user
            .as_ref()
            .is_some_and(|current| current.id == user.id)
        {
            self.current_user = Some(user);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Session, SessionError};
    use crate::model::user::User;
    use chrono::NaiveDate;

    fn user(is_admin: bool) -> User {
        User {
            id: 7,
            first_name: "Dana".into(),
            last_name: "Reyes".into(),
            position: "Captain".into(),
            ems_level: None,
            is_admin,
            active: true,
            joined_date: None,
            created: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn admin_gate_requires_login_then_flag() {
        let mut session = Session::new();
        assert_eq!(session.require_admin(), Err(SessionError::NotLoggedIn));

        session.login(user(false));
        assert_eq!(session.require_admin(), Err(SessionError::AdminRequired));

        session.login(user(true));
        assert!(session.require_admin().is_ok());

        session.logout();
        assert!(!session.is_logged_in());
    }

    #[test]
    fn refresh_ignores_other_users() {
        let mut session = Session::new();
        session.login(user(false));
        let mut other = user(true);
        other.id = 99;
        session.refresh(other);
        assert!(!session.require_user().unwrap().is_admin);
    }
}
