//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep FFI/CLI layers decoupled from storage details.
//! - Apply session-based permission checks.

pub mod call_service;
pub mod picklist_service;
pub mod user_service;
