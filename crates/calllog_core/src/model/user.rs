//! Roster user model and PIN handling.
//!
//! # Responsibility
//! - Define the user record returned by reads (no PIN material).
//! - Own the 4-digit PIN format rule and the salted digest used at rest.
//!
//! # Invariants
//! - A [`Pin`] always holds exactly four ASCII digits.
//! - [`User`] never carries salt or digest; those stay in the repository.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use uuid::Uuid;

pub type UserId = i64;

static PIN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{4}$").expect("valid pin regex"));

/// Roster member as exposed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub position: String,
    pub ems_level: Option<String>,
    pub is_admin: bool,
    pub active: bool,
    pub joined_date: Option<NaiveDate>,
    /// UTC creation time.
    pub created: NaiveDateTime,
}

impl User {
    /// `First Last`, the form used at login.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Input for creating a roster member.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub position: String,
    pub ems_level: Option<String>,
    pub pin: Pin,
    pub is_admin: bool,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), UserValidationError> {
        validate_names(&self.first_name, &self.last_name)?;
        if self.position.trim().is_empty() {
            return Err(UserValidationError::MissingPosition);
        }
        Ok(())
    }
}

/// Editable profile fields of an existing user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub position: String,
    pub ems_level: Option<String>,
    pub is_admin: bool,
    pub active: bool,
}

impl UserUpdate {
    pub fn validate(&self) -> Result<(), UserValidationError> {
        validate_names(&self.first_name, &self.last_name)?;
        if self.position.trim().is_empty() {
            return Err(UserValidationError::MissingPosition);
        }
        Ok(())
    }
}

fn validate_names(first_name: &str, last_name: &str) -> Result<(), UserValidationError> {
    if first_name.trim().is_empty() || last_name.trim().is_empty() {
        return Err(UserValidationError::MissingName);
    }
    Ok(())
}

/// A validated 4-digit PIN. `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Pin(String);

impl Pin {
    pub fn parse(value: &str) -> Result<Self, UserValidationError> {
        if !PIN_PATTERN.is_match(value) {
            return Err(UserValidationError::InvalidPin);
        }
        Ok(Self(value.to_string()))
    }

    /// Parses `value` and requires `confirm` to match it exactly.
    pub fn parse_confirmed(value: &str, confirm: &str) -> Result<Self, UserValidationError> {
        let pin = Self::parse(value)?;
        if value != confirm {
            return Err(UserValidationError::PinMismatch);
        }
        Ok(pin)
    }

    fn as_str(&self) -> &str {
        &self.0
    }
}

impl Debug for Pin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Pin(****)")
    }
}

/// Salted SHA-256 digest of a PIN, both hex/simple encoded for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinDigest {
    salt: String,
    digest: String,
}

impl PinDigest {
    /// Digests `pin` under a fresh random salt.
    pub fn new(pin: &Pin) -> Self {
        let salt = Uuid::new_v4().simple().to_string();
        let digest = digest_hex(&salt, pin.as_str());
        Self { salt, digest }
    }

    /// Rebuilds a digest read back from storage.
    pub fn from_stored(salt: String, digest: String) -> Self {
        Self { salt, digest }
    }

    pub fn salt(&self) -> &str {
        &self.salt
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// True when `candidate` hashes to the stored digest. Malformed input never matches.
    pub fn verify(&self, candidate: &str) -> bool {
        if !PIN_PATTERN.is_match(candidate) {
            return false;
        }
        digest_hex(&self.salt, candidate) == self.digest
    }
}

fn digest_hex(salt: &str, pin: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(pin.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserValidationError {
    MissingName,
    MissingPosition,
    InvalidPin,
    PinMismatch,
}

impl Display for UserValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingName => write!(f, "first and last name are required"),
            Self::MissingPosition => write!(f, "position is required"),
            Self::InvalidPin => write!(f, "PIN must be exactly 4 digits"),
            Self::PinMismatch => write!(f, "PINs do not match"),
        }
    }
}

impl Error for UserValidationError {}
