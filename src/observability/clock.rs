//! Wall-clock timestamps derived from a monotonic anchor.
//!
//! Spans and request contexts read time through a [`Clock`] so that an
//! interval measured inside a request can never run backwards, even when
//! the system clock is adjusted while the request is in flight.

use chrono::{DateTime, Utc};
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct Clock {
    wall: DateTime<Utc>,
    mono: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            wall: Utc::now(),
            mono: Instant::now(),
        }
    }

    /// Current time as (wall timestamp, monotonic instant).
    pub fn now(&self) -> (DateTime<Utc>, Instant) {
        let mono = Instant::now();
        (self.wall_at(mono), mono)
    }

    /// Wall timestamp corresponding to a monotonic instant.
    pub fn wall_at(&self, instant: Instant) -> DateTime<Utc> {
        let offset = instant.saturating_duration_since(self.mono);
        match chrono::Duration::from_std(offset) {
            Ok(offset) => self.wall + offset,
            Err(_) => self.wall,
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
