//! Cooperative cancellation for an exploration.
//!
//! The engine polls its watchdog between instructions. Stopping is coarse: the
//! whole exploration ends and the states still queued are handed back as
//! pending, since no state holds anything that needs releasing.

use std::{
    fmt::Debug,
    rc::Rc,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use crate::constant::DEFAULT_WATCHDOG_POLL_LOOP_ITERATIONS;

/// A dynamically dispatched [`Watchdog`] instance.
pub type DynWatchdog = Rc<dyn Watchdog>;

/// The interface to an object that can be polled to see if the engine needs to
/// abandon the exploration.
pub trait Watchdog
where
    Self: Debug,
{
    /// Checks if the engine should stop exploring.
    #[must_use]
    fn should_stop(&self) -> bool;

    /// Gets the number of instructions the engine executes between polls.
    #[must_use]
    fn poll_every(&self) -> usize;
}

/// A watchdog that never asks the engine to stop.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LazyWatchdog;

impl LazyWatchdog {
    /// Wraps `self` into an [`Rc`].
    #[must_use]
    pub fn in_rc(self) -> Rc<dyn Watchdog> {
        Rc::new(self)
    }
}

impl Watchdog for LazyWatchdog {
    fn should_stop(&self) -> bool {
        false
    }

    fn poll_every(&self) -> usize {
        usize::MAX
    }
}

/// A watchdog backed by an atomic flag that another thread can raise.
///
/// Polled every [`DEFAULT_WATCHDOG_POLL_LOOP_ITERATIONS`] instructions unless
/// changed with [`Self::polling_every`].
#[derive(Clone, Debug)]
pub struct FlagWatchdog {
    /// Raised externally to stop the engine.
    flag: Arc<AtomicBool>,

    /// Instructions between polls.
    poll_loop_iterations: usize,
}

impl FlagWatchdog {
    /// Constructs a new `FlagWatchdog` wrapping the provided `flag`.
    #[must_use]
    pub fn new(flag: Arc<AtomicBool>) -> Self {
        let poll_loop_iterations = DEFAULT_WATCHDOG_POLL_LOOP_ITERATIONS;
        Self {
            flag,
            poll_loop_iterations,
        }
    }

    /// Sets the number of instructions between polls.
    #[must_use]
    pub fn polling_every(mut self, iterations: usize) -> Self {
        self.poll_loop_iterations = iterations;
        self
    }

    /// Wraps the watchdog into an [`Rc`].
    #[must_use]
    pub fn in_rc(self) -> Rc<dyn Watchdog> {
        Rc::new(self)
    }
}

impl Watchdog for FlagWatchdog {
    fn should_stop(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    fn poll_every(&self) -> usize {
        self.poll_loop_iterations
    }
}

/// A watchdog that stops the exploration once a wall-clock deadline passes.
///
/// Reading the clock is cheap next to executing an instruction, but it is
/// still only polled every [`DEFAULT_WATCHDOG_POLL_LOOP_ITERATIONS`]
/// instructions by default.
#[derive(Clone, Debug)]
pub struct DeadlineWatchdog {
    deadline:             Instant,
    poll_loop_iterations: usize,
}

impl DeadlineWatchdog {
    /// Constructs a watchdog that stops the engine at `deadline`.
    #[must_use]
    pub fn new(deadline: Instant) -> Self {
        Self {
            deadline,
            poll_loop_iterations: DEFAULT_WATCHDOG_POLL_LOOP_ITERATIONS,
        }
    }

    /// Constructs a watchdog that stops the engine once `budget` has elapsed
    /// from now.
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        let now = Instant::now();
        Self::new(now.checked_add(budget).unwrap_or(now))
    }

    /// Sets the number of instructions between polls.
    #[must_use]
    pub fn polling_every(mut self, iterations: usize) -> Self {
        self.poll_loop_iterations = iterations;
        self
    }

    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Wraps the watchdog into an [`Rc`].
    #[must_use]
    pub fn in_rc(self) -> Rc<dyn Watchdog> {
        Rc::new(self)
    }
}

impl Watchdog for DeadlineWatchdog {
    fn should_stop(&self) -> bool {
        Instant::now() >= self.deadline
    }

    fn poll_every(&self) -> usize {
        self.poll_loop_iterations
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        time::{Duration, Instant},
    };

    use crate::watchdog::{DeadlineWatchdog, FlagWatchdog, LazyWatchdog, Watchdog};

    #[test]
    fn lazy_watchdog_never_stops() {
        assert!(!LazyWatchdog.should_stop());
    }

    #[test]
    fn flag_watchdog_follows_its_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let watchdog = FlagWatchdog::new(flag.clone()).polling_every(7);
        assert_eq!(watchdog.poll_every(), 7);
        assert!(!watchdog.should_stop());

        flag.store(true, Ordering::Relaxed);
        assert!(watchdog.should_stop());
    }

    #[test]
    fn deadline_watchdog_stops_once_the_deadline_passes() {
        let expired = DeadlineWatchdog::new(Instant::now()).polling_every(1);
        assert!(expired.should_stop());
        assert_eq!(expired.poll_every(), 1);

        let generous = DeadlineWatchdog::after(Duration::from_secs(3600));
        assert!(!generous.should_stop());
        assert!(generous.deadline() > Instant::now());
    }
}
