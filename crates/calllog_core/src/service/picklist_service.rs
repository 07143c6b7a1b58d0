//! Picklist use-case service.
//!
//! Reads are open to any caller; create/update/deactivate require an admin
//! session.

use crate::model::picklist::{
    PicklistCategory, PicklistItem, PicklistItemId, PicklistValidationError,
};
use crate::repo::picklist_repo::PicklistRepository;
use crate::repo::RepoError;
use crate::session::{Session, SessionError};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum PicklistServiceError {
    Validation(PicklistValidationError),
    DuplicateValue(String),
    ItemNotFound(PicklistItemId),
    Session(SessionError),
    Repo(RepoError),
}

impl Display for PicklistServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::DuplicateValue(value) => {
                write!(f, "`{value}` already exists in this picklist")
            }
            Self::ItemNotFound(id) => write!(f, "picklist item not found: {id}"),
            Self::Session(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PicklistServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Session(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for PicklistServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::PicklistValidation(err) => Self::Validation(err),
            RepoError::Duplicate(value) => Self::DuplicateValue(value),
            RepoError::NotFound { id, .. } => Self::ItemNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<PicklistValidationError> for PicklistServiceError {
    fn from(value: PicklistValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<SessionError> for PicklistServiceError {
    fn from(value: SessionError) -> Self {
        Self::Session(value)
    }
}

pub type PicklistServiceResult<T> = Result<T, PicklistServiceError>;

pub struct PicklistService<R: PicklistRepository> {
    repo: R,
}

impl<R: PicklistRepository> PicklistService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Active items of `category`, by sort order.
    pub fn get_picklist(&self, category: PicklistCategory) -> PicklistServiceResult<Vec<PicklistItem>> {
        Ok(self.repo.list_items(category, false)?)
    }

    /// Values of active items, for callers that only need labels.
    pub fn values(&self, category: PicklistCategory) -> PicklistServiceResult<Vec<String>> {
        Ok(self
            .get_picklist(category)?
            .into_iter()
            .map(|item| item.value)
            .collect())
    }

    pub fn list_categories(&self) -> PicklistServiceResult<Vec<PicklistCategory>> {
        Ok(self.repo.list_categories()?)
    }

    pub fn list_all_items(
        &self,
        session: &Session,
        category: PicklistCategory,
    ) -> PicklistServiceResult<Vec<PicklistItem>> {
        session.require_admin()?;
        Ok(self.repo.list_items(category, true)?)
    }

    pub fn create_item(
        &self,
        session: &Session,
        category: PicklistCategory,
        value: &str,
        sort_order: i64,
    ) -> PicklistServiceResult<PicklistItem> {
        session.require_admin()?;
        let id = self.repo.create_item(category, value, sort_order)?;
        info!(
            "event=picklist_create module=service status=ok category={} item_id={}",
            category, id
        );
        self.repo
            .get_item(id)?
            .ok_or(PicklistServiceError::ItemNotFound(id))
    }

    pub fn update_item(
        &self,
        session: &Session,
        id: PicklistItemId,
        value: &str,
        sort_order: i64,
        active: bool,
    ) -> PicklistServiceResult<PicklistItem> {
        session.require_admin()?;
        self.repo.update_item(id, value, sort_order, active)?;
        self.repo
            .get_item(id)?
            .ok_or(PicklistServiceError::ItemNotFound(id))
    }

    pub fn deactivate_item(&self, session: &Session, id: PicklistItemId) -> PicklistServiceResult<()> {
        session.require_admin()?;
        self.repo.deactivate_item(id)?;
        info!(
            "event=picklist_deactivate module=service status=ok item_id={}",
            id
        );
        Ok(())
    }
}
