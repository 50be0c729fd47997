//! # Cooperative Task Scheduler
//!
//! Multiplexes any number of [`Task`]s onto the single thread of execution.
//! Each call to [`Scheduler::run_round`] polls every due task once, in
//! registration order, works out how long the whole system may stay idle and
//! then idles for exactly that long through the [`Clock`].
//!
//! ```ignore
//! let mut scheduler = Scheduler::new(SystemClock, DEFAULT_MAX_SLEEP_TIME);
//! scheduler.register(mqtt);
//! scheduler.register(IntervalTask::new("blink", Duration::from_secs(1), || led.toggle()));
//! scheduler.run();
//! ```

mod task;

use alloc::boxed::Box;
use alloc::vec::Vec;
use embassy_time::{Duration, Instant};

use crate::time::{Clock, Timing, saturating_add};

pub use task::{IntervalTask, Schedule, ScheduleKind, Task};

/// Upper bound on a single idle wait unless configured otherwise.
pub const DEFAULT_MAX_SLEEP_TIME: Duration = Duration::from_secs(60);

/// When a registered task becomes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Due {
    /// Due on the next round, whenever that happens.
    Now,
    /// Due once the clock reaches the given reading.
    At(Instant),
}

struct TaskEntry<'a> {
    task: Box<dyn Task + 'a>,
    due: Due,
}

/// What happened during one scheduler round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundReport {
    /// Number of tasks polled.
    pub polled: usize,
    /// The deadline the round computed for the next one.
    pub next_round: Instant,
    /// How long the scheduler idled at the end of the round.
    pub waited: Duration,
}

/// Owns the registered tasks and runs them in rounds.
pub struct Scheduler<'a, C: Clock> {
    clock: C,
    max_sleep_time: Duration,
    tasks: Vec<TaskEntry<'a>>,
    previous_round: Option<Instant>,
}

impl<'a, C: Clock> Scheduler<'a, C> {
    /// Creates an empty scheduler that never idles longer than `max_sleep_time`.
    pub fn new(clock: C, max_sleep_time: Duration) -> Self {
        Self {
            clock,
            max_sleep_time,
            tasks: Vec::new(),
            previous_round: None,
        }
    }

    /// Adds a task. It is first polled on the next round.
    ///
    /// Tasks must be registered before the scheduler starts running rounds;
    /// there is no way to remove a task afterwards.
    pub fn register(&mut self, task: impl Task + 'a) {
        debug!("Registering task '{}'", task.name());
        self.tasks.push(TaskEntry {
            task: Box::new(task),
            due: Due::Now,
        });
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Runs rounds forever. This is the application's main loop.
    pub fn run(&mut self) -> ! {
        loop {
            self.run_round();
        }
    }

    /// Executes one scheduling round followed by the idle wait.
    #[doc(alias = "loop")]
    pub fn run_round(&mut self) -> RoundReport {
        let loop_start_time = self.clock.now();
        trace!("Round starting @{}us", loop_start_time.as_micros());

        let previous_round = *self.previous_round.get_or_insert(loop_start_time);
        // An idle that returned early leaves us before `previous_round`; the
        // ceiling still applies from the actual start of this round.
        let mut next_round = saturating_add(previous_round, self.max_sleep_time)
            .min(saturating_add(loop_start_time, self.max_sleep_time));
        let mut polled = 0;

        for entry in self.tasks.iter_mut() {
            let scheduled_time = match entry.due {
                Due::At(next) if loop_start_time < next => {
                    trace!(
                        "Skipping '{}', due @{}us",
                        entry.task.name(),
                        next.as_micros()
                    );
                    next_round = next_round.min(next);
                    continue;
                }
                Due::At(next) => next,
                Due::Now => loop_start_time,
            };

            let schedule = entry.task.poll(Timing {
                scheduled_time,
                loop_start_time,
            });
            polled += 1;

            let next_scheduled_time = saturating_add(scheduled_time, schedule.delay);
            next_round = next_round.min(next_scheduled_time);
            entry.due = match schedule.kind {
                ScheduleKind::After => {
                    trace!(
                        "Ran '{}', next ASAP after {}us",
                        entry.task.name(),
                        schedule.delay.as_micros()
                    );
                    Due::At(next_scheduled_time)
                }
                ScheduleKind::Before => {
                    trace!(
                        "Ran '{}', next ALAP before {}us",
                        entry.task.name(),
                        schedule.delay.as_micros()
                    );
                    Due::Now
                }
            };
        }

        let waited = match next_round.checked_duration_since(self.clock.now()) {
            Some(wait) if wait.as_ticks() > 0 => {
                trace!("Sleeping for {}us", wait.as_micros());
                self.clock.idle(wait);
                wait
            }
            _ => {
                trace!("Running next round immediately");
                Duration::from_ticks(0)
            }
        };
        self.previous_round = Some(next_round);

        RoundReport {
            polled,
            next_round,
            waited,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::{Cell, RefCell};

    /// Simulated clock: time only moves when idling or when a task spends it.
    #[derive(Clone, Default)]
    struct FakeClock {
        now: Rc<Cell<u64>>,
    }

    impl FakeClock {
        fn advance(&self, duration: Duration) {
            self.now.set(self.now.get() + duration.as_ticks());
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            Instant::from_ticks(self.now.get())
        }

        fn idle(&self, duration: Duration) {
            self.advance(duration);
        }
    }

    /// Records every timing it sees and replies with a fixed directive.
    struct Recorder {
        name: &'static str,
        schedule: Schedule,
        seen: Rc<RefCell<Vec<Timing>>>,
        cost: Duration,
        clock: FakeClock,
    }

    impl Task for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn poll(&mut self, timing: Timing) -> Schedule {
            self.seen.borrow_mut().push(timing);
            self.clock.advance(self.cost);
            self.schedule
        }
    }

    fn recorder(
        clock: &FakeClock,
        schedule: Schedule,
        cost: Duration,
    ) -> (Recorder, Rc<RefCell<Vec<Timing>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let task = Recorder {
            name: "recorder",
            schedule,
            seen: seen.clone(),
            cost,
            clock: clock.clone(),
        };
        (task, seen)
    }

    #[test]
    fn empty_scheduler_sleeps_max_sleep_time() {
        let clock = FakeClock::default();
        let mut scheduler = Scheduler::new(clock.clone(), Duration::from_secs(60));
        let report = scheduler.run_round();
        assert_eq!(report.polled, 0);
        assert_eq!(report.waited, Duration::from_secs(60));
        assert_eq!(clock.now(), Instant::from_secs(60));
    }

    #[test]
    fn new_task_runs_on_first_round_with_loop_start_as_scheduled_time() {
        let clock = FakeClock::default();
        clock.advance(Duration::from_secs(3));
        let (task, seen) = recorder(&clock, Schedule::after(Duration::from_secs(1)), Duration::MIN);
        let mut scheduler = Scheduler::new(clock.clone(), Duration::from_secs(60));
        scheduler.register(task);

        scheduler.run_round();
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].scheduled_time, Instant::from_secs(3));
        assert_eq!(seen[0].loop_start_time, Instant::from_secs(3));
    }

    #[test]
    fn after_tasks_keep_their_cadence_even_when_late() {
        let clock = FakeClock::default();
        // Each poll takes 1.5s, so every round after the first starts late.
        let (task, seen) = recorder(
            &clock,
            Schedule::after(Duration::from_secs(1)),
            Duration::from_millis(1500),
        );
        let mut scheduler = Scheduler::new(clock.clone(), Duration::from_secs(60));
        scheduler.register(task);

        for _ in 0..4 {
            scheduler.run_round();
        }

        let scheduled: Vec<u64> = seen
            .borrow()
            .iter()
            .map(|t| t.scheduled_time.as_millis())
            .collect();
        assert_eq!(scheduled, vec![0, 1000, 2000, 3000]);
        assert!(seen.borrow()[3].drift() > Duration::from_secs(1));
        for window in seen.borrow().windows(2) {
            let gap = window[1].scheduled_time - window[0].scheduled_time;
            assert!(gap >= Duration::from_secs(1));
        }
    }

    #[test]
    fn after_task_is_skipped_until_due() {
        let clock = FakeClock::default();
        let (slow, slow_seen) = recorder(&clock, Schedule::after(Duration::from_secs(10)), Duration::MIN);
        let (fast, fast_seen) = recorder(&clock, Schedule::after(Duration::from_secs(1)), Duration::MIN);
        let mut scheduler = Scheduler::new(clock.clone(), Duration::from_secs(60));
        scheduler.register(slow);
        scheduler.register(fast);

        for _ in 0..5 {
            scheduler.run_round();
        }
        assert_eq!(slow_seen.borrow().len(), 1);
        assert_eq!(fast_seen.borrow().len(), 5);
        assert_eq!(clock.now(), Instant::from_secs(5));
    }

    #[test]
    fn before_task_runs_every_round_and_bounds_the_wait() {
        let clock = FakeClock::default();
        let (periodic, _) = recorder(&clock, Schedule::after(Duration::from_secs(2)), Duration::MIN);
        let (eager, eager_seen) = recorder(&clock, Schedule::before(Duration::from_secs(5)), Duration::MIN);
        let mut scheduler = Scheduler::new(clock.clone(), Duration::from_secs(60));
        scheduler.register(periodic);
        scheduler.register(eager);

        for _ in 0..3 {
            let report = scheduler.run_round();
            assert!(report.waited <= Duration::from_secs(5));
        }
        // Woken every 2s by the periodic task, polled every round.
        assert_eq!(eager_seen.borrow().len(), 3);
        let starts: Vec<u64> = eager_seen
            .borrow()
            .iter()
            .map(|t| t.scheduled_time.as_secs())
            .collect();
        assert_eq!(starts, vec![0, 2, 4]);
    }

    #[test]
    fn lone_before_task_wakes_the_system_within_its_delay() {
        let clock = FakeClock::default();
        let (eager, seen) = recorder(&clock, Schedule::before(Duration::from_secs(5)), Duration::MIN);
        let mut scheduler = Scheduler::new(clock.clone(), Duration::from_secs(60));
        scheduler.register(eager);

        let first = scheduler.run_round();
        assert_eq!(first.waited, Duration::from_secs(5));
        scheduler.run_round();
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(seen.borrow()[1].scheduled_time, Instant::from_secs(5));
    }

    #[test]
    fn on_any_wake_does_not_shorten_the_sleep() {
        let clock = FakeClock::default();
        let (idle, seen) = recorder(&clock, Schedule::on_any_wake(), Duration::MIN);
        let mut scheduler = Scheduler::new(clock.clone(), Duration::from_secs(30));
        scheduler.register(idle);

        let report = scheduler.run_round();
        assert_eq!(report.waited, Duration::from_secs(30));
        scheduler.run_round();
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn wait_never_exceeds_max_sleep_time() {
        let clock = FakeClock::default();
        let (lazy, _) = recorder(&clock, Schedule::after(Duration::from_secs(3600)), Duration::MIN);
        let mut scheduler = Scheduler::new(clock.clone(), Duration::from_secs(60));
        scheduler.register(lazy);

        for _ in 0..10 {
            let report = scheduler.run_round();
            assert!(report.waited <= Duration::from_secs(60));
        }
    }

    /// Wakes up after half of every requested idle.
    #[derive(Clone, Default)]
    struct EarlyClock {
        inner: FakeClock,
    }

    impl Clock for EarlyClock {
        fn now(&self) -> Instant {
            self.inner.now()
        }

        fn idle(&self, duration: Duration) {
            self.inner
                .advance(Duration::from_ticks(duration.as_ticks() / 2));
        }
    }

    #[test]
    fn early_wake_ups_do_not_stretch_later_waits() {
        let clock = EarlyClock::default();
        let mut scheduler = Scheduler::new(clock.clone(), Duration::from_secs(60));

        for _ in 0..5 {
            let report = scheduler.run_round();
            assert_eq!(report.waited, Duration::from_secs(60));
        }
        assert_eq!(clock.now(), Instant::from_secs(150));
    }

    #[test]
    fn overrunning_round_proceeds_without_waiting() {
        let clock = FakeClock::default();
        let (busy, _) = recorder(
            &clock,
            Schedule::after(Duration::from_millis(100)),
            Duration::from_millis(500),
        );
        let mut scheduler = Scheduler::new(clock.clone(), Duration::from_secs(60));
        scheduler.register(busy);

        let report = scheduler.run_round();
        assert_eq!(report.waited, Duration::from_ticks(0));
        assert_eq!(report.next_round, Instant::from_millis(100));
    }

    #[test]
    fn tasks_are_polled_in_registration_order() {
        let clock = FakeClock::default();
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut scheduler = Scheduler::new(clock.clone(), Duration::from_secs(60));
        for name in ["first", "second", "third"] {
            let order = order.clone();
            scheduler.register(IntervalTask::new(name, Duration::from_secs(1), move || {
                order.borrow_mut().push(name)
            }));
        }

        scheduler.run_round();
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }
}
