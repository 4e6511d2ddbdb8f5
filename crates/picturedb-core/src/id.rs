//! Record id generation
//!
//! Ids are creation timestamps in milliseconds. Two adds inside the same
//! millisecond would collide on the primary key, so the generator never hands
//! out an id that is not strictly greater than the previous one.

use std::cell::Cell;

use crate::record::ImageId;

/// Source of the current time in milliseconds since the Unix epoch.
pub trait Clock {
    fn now_millis(&self) -> i64;
}

/// Wall clock (`Date.now()` in the browser).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Monotonic, timestamp-derived id generator.
#[derive(Debug, Default)]
pub struct IdGenerator<C: Clock = SystemClock> {
    clock: C,
    last: Cell<Option<ImageId>>,
}

impl<C: Clock> IdGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            last: Cell::new(None),
        }
    }

    /// Next id: the current time, or one past the last id if the clock has not advanced.
    pub fn next_id(&self) -> ImageId {
        let now = self.clock.now_millis();
        let id = match self.last.get() {
            Some(last) if now <= last => last + 1,
            _ => now,
        };
        self.last.set(Some(id));
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct StepClock(Cell<i64>);

    impl Clock for StepClock {
        fn now_millis(&self) -> i64 {
            self.0.get()
        }
    }

    #[test]
    fn test_uses_clock_when_advancing() {
        let ids = IdGenerator::new(StepClock(Cell::new(1000)));
        assert_eq!(ids.next_id(), 1000);
        ids.clock.0.set(2000);
        assert_eq!(ids.next_id(), 2000);
    }

    #[test]
    fn test_same_millisecond_is_bumped() {
        let ids = IdGenerator::new(StepClock(Cell::new(1686733930721)));
        assert_eq!(ids.next_id(), 1686733930721);
        assert_eq!(ids.next_id(), 1686733930722);
        assert_eq!(ids.next_id(), 1686733930723);
    }

    #[test]
    fn test_clock_going_backwards() {
        let ids = IdGenerator::new(StepClock(Cell::new(500)));
        assert_eq!(ids.next_id(), 500);
        ids.clock.0.set(100);
        assert_eq!(ids.next_id(), 501);
    }

    #[test]
    fn test_system_clock_is_after_2020() {
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }
}
