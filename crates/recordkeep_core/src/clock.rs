//! Wall-clock capability.
//!
//! # Responsibility
//! - Provide the current UTC time to stores and services.
//! - Allow tests to pin time instead of depending on elapsed real time.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Mutex, PoisonError};

/// Source of the current UTC time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock.
///
/// Share one instance (via `Arc`) between a store and a service to control
/// both record timestamps and workflow cutoffs.
#[derive(Debug)]
pub struct FixedClock {
    current: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(at),
        }
    }

    /// Moves the clock to an absolute instant.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }

    /// Moves the clock by `delta`; negative values go back in time.
    pub fn advance(&self, delta: Duration) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current += delta;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
