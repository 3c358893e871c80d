//! Domain model for stored records.
//!
//! # Responsibility
//! - Define the single entity managed by core: a named, timestamped record.
//! - Own name validation so every store enforces the same rules.
//!
//! # Invariants
//! - Records are immutable after creation; deletion is the only lifecycle step.
//! - `created_at` is always UTC at millisecond precision.

pub mod record;
