//! Task trait and scheduling directives.

use alloc::string::String;
use embassy_time::Duration;

use crate::time::Timing;

/// How a task's requested delay is interpreted by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScheduleKind {
    /// Run again no earlier than `delay` after the time this poll was scheduled.
    After,
    /// Run again no later than `delay` after the time this poll was scheduled,
    /// and additionally on every round that happens before that.
    Before,
}

/// The result of a task poll: when the task wants to run next.
///
/// The delay is always measured from the task's own scheduled time, not from
/// the time the poll actually ran, so late rounds do not accumulate drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub kind: ScheduleKind,
    pub delay: Duration,
}

impl Schedule {
    /// Run again as soon as possible, but no earlier than `delay`.
    pub const fn after(delay: Duration) -> Self {
        Self {
            kind: ScheduleKind::After,
            delay,
        }
    }

    /// Run again on the very next round, and make sure that round happens
    /// within `delay`.
    pub const fn before(delay: Duration) -> Self {
        Self {
            kind: ScheduleKind::Before,
            delay,
        }
    }

    /// Run again on the next round without waiting.
    pub const fn immediately() -> Self {
        Self::after(Duration::from_ticks(0))
    }

    /// Only run again when some other task wakes the system.
    pub const fn on_any_wake() -> Self {
        Self::before(Duration::MAX)
    }
}

/// A named unit of recurring work polled by the [`Scheduler`](super::Scheduler).
///
/// `poll` runs to completion on the scheduler's single thread. It must not
/// block for long and must not panic; failures are absorbed by the task and
/// expressed as a (possibly short) retry delay in the returned [`Schedule`].
pub trait Task {
    /// Human readable name used in log lines.
    fn name(&self) -> &str;

    /// Performs one step of work and returns when the task wants to run next.
    fn poll(&mut self, timing: Timing) -> Schedule;
}

/// Lets a task be registered by mutable reference.
impl<T: Task + ?Sized> Task for &mut T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn poll(&mut self, timing: Timing) -> Schedule {
        (**self).poll(timing)
    }
}

impl<T: Task + ?Sized> Task for alloc::boxed::Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn poll(&mut self, timing: Timing) -> Schedule {
        (**self).poll(timing)
    }
}

/// A task that invokes a callback at a fixed interval.
pub struct IntervalTask<F> {
    name: String,
    interval: Duration,
    callback: F,
}

impl<F: FnMut()> IntervalTask<F> {
    pub fn new(name: impl Into<String>, interval: Duration, callback: F) -> Self {
        Self {
            name: name.into(),
            interval,
            callback,
        }
    }
}

impl<F: FnMut()> Task for IntervalTask<F> {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll(&mut self, _timing: Timing) -> Schedule {
        (self.callback)();
        Schedule::after(self.interval)
    }
}
