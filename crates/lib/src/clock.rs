//! Time provider abstraction
//!
//! This module provides a [`Clock`] trait that abstracts over time sources,
//! allowing production code to use real system time while tests inject
//! controllable timestamps for deterministic ordering.

use std::fmt::Debug;

use chrono::{DateTime, Utc};

/// A time provider for assigning `created_at` timestamps.
///
/// Every backend takes a clock at construction time so that ordering
/// behavior (newest-first listing, summary grouping) can be exercised with
/// known timestamps in tests.
pub trait Clock: Send + Sync + Debug {
    /// Returns the current time as a UTC datetime.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock using real system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
