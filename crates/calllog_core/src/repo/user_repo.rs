//! User roster repository.
//!
//! # Invariants
//! - PIN salt/digest columns are only read through [`UserRepository::find_credentials`]
//!   and [`UserRepository::get_pin_digest`]; [`User`] rows never carry them.
//! - Users are deactivated, never deleted, so call history keeps its creators.

use crate::model::user::{NewUser, Pin, PinDigest, User, UserId, UserUpdate};
use crate::repo::{
    bool_to_int, format_date, int_to_bool, parse_optional_date, parse_timestamp, RepoError,
    RepoResult,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

const USER_SELECT_SQL: &str = "SELECT
    id,
    first_name,
    last_name,
    position,
    ems_level,
    is_admin,
    active,
    joined_date,
    created
FROM users";

/// Which roster slice to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserFilter {
    Active,
    ActiveAdmins,
    All,
}

/// A login candidate with its stored digest.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub digest: PinDigest,
}

pub trait UserRepository {
    fn create_user(&self, user: &NewUser) -> RepoResult<UserId>;
    fn update_user(&self, update: &UserUpdate) -> RepoResult<()>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    fn list_users(&self, filter: UserFilter) -> RepoResult<Vec<User>>;
    /// Active user whose `First Last` matches `display_name`, ignoring case.
    fn find_credentials(&self, display_name: &str) -> RepoResult<Option<UserCredentials>>;
    fn get_pin_digest(&self, id: UserId) -> RepoResult<Option<PinDigest>>;
    fn set_pin(&self, id: UserId, pin: &Pin) -> RepoResult<()>;
    fn set_active(&self, id: UserId, active: bool) -> RepoResult<()>;
    fn set_position(&self, id: UserId, position: &str, ems_level: Option<&str>) -> RepoResult<()>;
    fn set_admin(&self, id: UserId, is_admin: bool) -> RepoResult<()>;
    fn set_joined_date(&self, id: UserId, joined: Option<NaiveDate>) -> RepoResult<()>;
}

pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn expect_changed(changed: usize, id: UserId) -> RepoResult<()> {
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "user", id });
        }
        Ok(())
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &NewUser) -> RepoResult<UserId> {
        user.validate()?;
        let digest = PinDigest::new(&user.pin);

        self.conn.execute(
            "INSERT INTO users (
                first_name,
                last_name,
                position,
                ems_level,
                is_admin,
                pin_salt,
                pin_digest,
                active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1);",
            params![
                user.first_name.trim(),
                user.last_name.trim(),
                user.position.trim(),
                normalize_optional(user.ems_level.as_deref()),
                bool_to_int(user.is_admin),
                digest.salt(),
                digest.digest(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_user(&self, update: &UserUpdate) -> RepoResult<()> {
        update.validate()?;
        let changed = self.conn.execute(
            "UPDATE users
             SET
                first_name = ?1,
                last_name = ?2,
                position = ?3,
                ems_level = ?4,
                is_admin = ?5,
                active = ?6
             WHERE id = ?7;",
            params![
                update.first_name.trim(),
                update.last_name.trim(),
                update.position.trim(),
                normalize_optional(update.ems_level.as_deref()),
                bool_to_int(update.is_admin),
                bool_to_int(update.active),
                update.id,
            ],
        )?;
        Self::expect_changed(changed, update.id)
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_user_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_users(&self, filter: UserFilter) -> RepoResult<Vec<User>> {
        let condition = match filter {
            UserFilter::Active => " WHERE active = 1",
            UserFilter::ActiveAdmins => " WHERE active = 1 AND is_admin = 1",
            UserFilter::All => "",
        };
        let mut stmt = self.conn.prepare(&format!(
            "{USER_SELECT_SQL}{condition} ORDER BY last_name ASC, first_name ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }

    fn find_credentials(&self, display_name: &str) -> RepoResult<Option<UserCredentials>> {
        let normalized = display_name.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut stmt = self.conn.prepare(&format!(
            "{USER_SELECT_SQL}
             WHERE active = 1
               AND (first_name || ' ' || last_name) = ?1 COLLATE NOCASE
             ORDER BY id ASC
             LIMIT 1;"
        ))?;
        let mut rows = stmt.query([normalized.as_str()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let user = parse_user_row(row)?;
        let digest = self
            .get_pin_digest(user.id)?
            .ok_or(RepoError::NotFound {
                entity: "user",
                id: user.id,
            })?;
        Ok(Some(UserCredentials { user, digest }))
    }

    fn get_pin_digest(&self, id: UserId) -> RepoResult<Option<PinDigest>> {
        let mut stmt = self
            .conn
            .prepare("SELECT pin_salt, pin_digest FROM users WHERE id = ?1;")?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(PinDigest::from_stored(row.get(0)?, row.get(1)?))),
            None => Ok(None),
        }
    }

    fn set_pin(&self, id: UserId, pin: &Pin) -> RepoResult<()> {
        let digest = PinDigest::new(pin);
        let changed = self.conn.execute(
            "UPDATE users SET pin_salt = ?1, pin_digest = ?2 WHERE id = ?3;",
            params![digest.salt(), digest.digest(), id],
        )?;
        Self::expect_changed(changed, id)
    }

    fn set_active(&self, id: UserId, active: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users SET active = ?1 WHERE id = ?2;",
            params![bool_to_int(active), id],
        )?;
        Self::expect_changed(changed, id)
    }

    fn set_position(&self, id: UserId, position: &str, ems_level: Option<&str>) -> RepoResult<()> {
        if position.trim().is_empty() {
            return Err(crate::model::user::UserValidationError::MissingPosition.into());
        }
        let changed = self.conn.execute(
            "UPDATE users SET position = ?1, ems_level = ?2 WHERE id = ?3;",
            params![position.trim(), normalize_optional(ems_level), id],
        )?;
        Self::expect_changed(changed, id)
    }

    fn set_admin(&self, id: UserId, is_admin: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users SET is_admin = ?1 WHERE id = ?2;",
            params![bool_to_int(is_admin), id],
        )?;
        Self::expect_changed(changed, id)
    }

    fn set_joined_date(&self, id: UserId, joined: Option<NaiveDate>) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users SET joined_date = ?1 WHERE id = ?2;",
            params![joined.map(format_date), id],
        )?;
        Self::expect_changed(changed, id)
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let created: String = row.get("created")?;
    Ok(User {
        id: row.get("id")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        position: row.get("position")?,
        ems_level: row.get("ems_level")?,
        is_admin: int_to_bool(row.get("is_admin")?, "users.is_admin")?,
        active: int_to_bool(row.get("active")?, "users.active")?,
        joined_date: parse_optional_date(row.get("joined_date")?, "users.joined_date")?,
        created: parse_timestamp(&created, "users.created")?,
    })
}

fn normalize_optional(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
