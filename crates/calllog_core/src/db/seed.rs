//! Default administrator seeding.
//!
//! A fresh install must be loggable-into, so when no active admin exists an
//! `Admin User` account with PIN `1234` is created. The PIN digest is
//! computed here because SQLite has no built-in SHA-256.

use super::{DbError, DbResult};
use crate::model::user::{Pin, PinDigest};
use log::warn;
use rusqlite::{params, Connection};

pub const DEFAULT_ADMIN_FIRST_NAME: &str = "Admin";
pub const DEFAULT_ADMIN_LAST_NAME: &str = "User";
pub const DEFAULT_ADMIN_PIN: &str = "1234";

pub(crate) fn ensure_default_admin(conn: &Connection) -> DbResult<()> {
    let admin_exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE is_admin = 1 AND active = 1);",
        [],
        |row| row.get(0),
    )?;
    if admin_exists == 1 {
        return Ok(());
    }

    let pin = Pin::parse(DEFAULT_ADMIN_PIN).map_err(|err| DbError::Seed(err.to_string()))?;
    let digest = PinDigest::new(&pin);
    conn.execute(
        "INSERT INTO users (first_name, last_name, position, is_admin, pin_salt, pin_digest, active)
         VALUES (?1, ?2, 'Administrator', 1, ?3, ?4, 1);",
        params![
            DEFAULT_ADMIN_FIRST_NAME,
            DEFAULT_ADMIN_LAST_NAME,
            digest.salt(),
            digest.digest(),
        ],
    )?;
    warn!("event=seed_admin module=db status=ok note=default_pin_in_use");
    Ok(())
}
