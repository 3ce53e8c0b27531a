//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate guard and repository calls into atomic registry operations.
//! - Keep FFI/CLI layers decoupled from storage details.

pub mod provision;
pub mod registry_service;
