//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the record store contract consumed by services.
//! - Isolate SQLite query details from workflow orchestration.
//!
//! # Invariants
//! - Write paths validate names before any mutation.
//! - Lookups and deletes of unknown ids are absences, not errors.

pub mod memory_repo;
pub mod record_repo;
pub mod scan;
