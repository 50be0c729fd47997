//! # Monotonic Time
//!
//! All scheduling math happens in the `embassy-time` tick domain, which counts
//! microseconds since boot and is never adjusted by NTP or the user. The
//! [`Clock`] trait wraps the time source together with the idle wait so the
//! scheduler can be driven by a simulated clock on the host.

use embassy_time::{Duration, Instant};

/// A steady, non-decreasing time source that can also idle the CPU.
pub trait Clock {
    /// Returns the current reading of the clock.
    fn now(&self) -> Instant;

    /// Blocks the single thread of execution for `duration`.
    ///
    /// This is the one place where the device may enter a low-power idle
    /// state. Implementations must return after at most `duration` has
    /// elapsed according to [`Clock::now`].
    fn idle(&self, duration: Duration);
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn idle(&self, duration: Duration) {
        (**self).idle(duration)
    }
}

/// Clock backed by the `embassy-time` driver of the target.
///
/// Idling busy-waits via [`embassy_time::block_for`]; targets that want a
/// low-power wait provide their own [`Clock`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn idle(&self, duration: Duration) {
        embassy_time::block_for(duration);
    }
}

/// Timing information handed to a task on every poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// When this invocation was due. Never later than `loop_start_time`.
    pub scheduled_time: Instant,
    /// When the current scheduler round began.
    pub loop_start_time: Instant,
}

impl Timing {
    /// How late this invocation runs compared to when it was due.
    pub fn drift(&self) -> Duration {
        self.loop_start_time
            .saturating_duration_since(self.scheduled_time)
    }
}

/// Adds `delay` to `instant`, clamping to [`Instant::MAX`] instead of overflowing.
///
/// Tasks use pseudo-infinite delays to mean "only when something else wakes
/// the system", so overflow is an expected input here.
pub(crate) fn saturating_add(instant: Instant, delay: Duration) -> Instant {
    instant.checked_add(delay).unwrap_or(Instant::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drift_is_zero_for_on_time_invocations() {
        let now = Instant::from_millis(1500);
        let timing = Timing {
            scheduled_time: now,
            loop_start_time: now,
        };
        assert_eq!(timing.drift(), Duration::from_ticks(0));
    }

    #[test]
    fn drift_measures_lateness() {
        let timing = Timing {
            scheduled_time: Instant::from_millis(1000),
            loop_start_time: Instant::from_millis(1250),
        };
        assert_eq!(timing.drift(), Duration::from_millis(250));
    }

    #[test]
    fn saturating_add_clamps_pseudo_infinite_delays() {
        let start = Instant::from_secs(10);
        assert_eq!(saturating_add(start, Duration::MAX), Instant::MAX);
        assert_eq!(
            saturating_add(start, Duration::from_secs(5)),
            Instant::from_secs(15)
        );
    }
}
