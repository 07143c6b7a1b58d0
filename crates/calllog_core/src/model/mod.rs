//! Domain models.
//!
//! # Responsibility
//! - Define the call, user and picklist records shared by every layer.
//! - Own presence, format and ordering rules that need no storage access.

pub mod call;
pub mod picklist;
pub mod user;
