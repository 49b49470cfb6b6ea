// crates/monitord-core/src/time.rs
// ============================================================================
// Module: Engine Time Source
// Description: Deterministic time access for probes, rules, and the pipeline.
// Purpose: Let the scheduling and alert-processing logic be tested without
//          real wall-clock sleeps, while production wiring uses the system
//          clock.
// Dependencies: std::time
// ============================================================================

//! The engine never reads `SystemTime::now()` directly from scheduling or
//! rule-evaluation code; it goes through a [`Clock`] handle instead, so
//! scheduling and rule logic stay deterministic and testable without real
//! wall-clock sleeps.

use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Milliseconds since the Unix epoch.
pub type MillisSinceEpoch = i64;

/// Supplies the current time to engine components.
///
/// # Invariants
/// - `now_millis` is non-decreasing under [`SystemClock`]; fakes used in
///   tests may violate this deliberately to exercise edge cases.
pub trait Clock: Send + Sync {
    /// Returns the current time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> MillisSinceEpoch;
}

/// Clock backed by [`SystemTime::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> MillisSinceEpoch {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(duration) => i64::try_from(duration.as_millis()).unwrap_or(i64::MAX),
            Err(_) => 0,
        }
    }
}

/// Returns a shared handle to the system clock.
#[must_use]
pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

/// A deterministic [`Clock`] for tests, shared across the workspace so
/// every crate's test suite can exercise time-dependent logic without real
/// sleeps or wall-clock reads.
pub mod testing {
    use std::sync::atomic::AtomicI64;
    use std::sync::atomic::Ordering;

    use super::Clock;
    use super::MillisSinceEpoch;

    /// A clock whose value is advanced explicitly by the test driving it.
    #[derive(Debug, Default)]
    pub struct FakeClock(AtomicI64);

    impl FakeClock {
        /// Creates a clock starting at `start_millis`.
        #[must_use]
        pub fn new(start_millis: MillisSinceEpoch) -> Self {
            Self(AtomicI64::new(start_millis))
        }

        /// Advances the clock by `delta_millis` (may be negative).
        pub fn advance(&self, delta_millis: i64) {
            self.0.fetch_add(delta_millis, Ordering::SeqCst);
        }

        /// Sets the clock to an absolute value.
        pub fn set(&self, millis: MillisSinceEpoch) {
            self.0.store(millis, Ordering::SeqCst);
        }
    }

    impl Clock for FakeClock {
        fn now_millis(&self) -> MillisSinceEpoch {
            self.0.load(Ordering::SeqCst)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeClock;
    use super::*;

    #[test]
    fn fake_clock_advances_monotonically_under_test_control() {
        let clock = FakeClock::new(1_000);
        assert_eq!(clock.now_millis(), 1_000);
        clock.advance(500);
        assert_eq!(clock.now_millis(), 1_500);
    }

    #[test]
    fn system_clock_returns_a_plausible_unix_timestamp() {
        let clock = SystemClock;
        // 2020-01-01T00:00:00Z in millis; any reasonable host clock clears this.
        assert!(clock.now_millis() > 1_577_836_800_000);
    }
}
