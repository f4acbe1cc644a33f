//! Clock adapters.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::domain::foundation::Timestamp;
use crate::ports::Clock;

/// Wall clock that never repeats or goes backwards.
///
/// If the system time has not advanced past the last value handed out
/// (same microsecond, or an NTP step back), the previous value plus one
/// microsecond is returned instead.
#[derive(Debug, Default)]
pub struct SystemClock {
    last_micros: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let wall = Timestamp::now().as_micros();
        let mut last = self.last_micros.load(Ordering::SeqCst);
        loop {
            let next = wall.max(last + 1);
            match self.last_micros.compare_exchange(
                last,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Timestamp::from_micros(next).unwrap_or_else(Timestamp::now),
                Err(observed) => last = observed,
            }
        }
    }
}

/// Clock for tests: starts at a fixed instant and advances one
/// microsecond per call unless moved explicitly.
#[derive(Debug)]
pub struct ManualClock {
    micros: AtomicI64,
}

impl ManualClock {
    pub fn starting_at(start: Timestamp) -> Self {
        Self {
            micros: AtomicI64::new(start.as_micros()),
        }
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.micros
            .fetch_add(minutes * 60 * 1_000_000, Ordering::SeqCst);
    }

    pub fn set(&self, at: Timestamp) {
        self.micros.store(at.as_micros(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        let micros = self.micros.fetch_add(1, Ordering::SeqCst);
        Timestamp::from_micros(micros).unwrap_or_else(Timestamp::now)
    }
}
