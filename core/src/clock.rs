//! Wall clock for record timestamps.
//!
//! Production uses the system clock. Tests use a stepped clock that
//! starts at a fixed instant and advances one step per reading, so
//! every record gets a distinct, reproducible timestamp.

use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug)]
pub enum LedgerClock {
    System,
    Stepped {
        start:     DateTime<Utc>,
        step_secs: i64,
        readings:  AtomicI64,
    },
}

impl LedgerClock {
    pub fn system() -> Self {
        Self::System
    }

    pub fn stepped(start: DateTime<Utc>, step_secs: i64) -> Self {
        Self::Stepped { start, step_secs, readings: AtomicI64::new(0) }
    }

    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Self::System => Utc::now(),
            Self::Stepped { start, step_secs, readings } => {
                let n = readings.fetch_add(1, Ordering::SeqCst);
                *start + Duration::seconds(n * step_secs)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn stepped_clock_advances_per_reading() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = LedgerClock::stepped(start, 5);
        assert_eq!(clock.now(), start);
        assert_eq!(clock.now(), start + Duration::seconds(5));
        assert_eq!(clock.now(), start + Duration::seconds(10));
    }
}
