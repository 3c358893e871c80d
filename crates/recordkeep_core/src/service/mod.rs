//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate record store calls into lifecycle workflows.
//! - Keep CLI/host layers decoupled from storage details.

pub mod lifecycle_service;
