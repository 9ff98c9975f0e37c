//! Single-threaded cooperative event loop.
//!
//! The loop owns the timer queue and a set of pumps (endpoints that receive
//! data from other threads, such as broadcast hubs). Every timer fire and
//! every pump turn is a fresh synchronous re-entry into the notification
//! protocol; nothing inside a notification ever suspends.
//!
//! Two clocks are supported:
//! - real time, where waiting blocks on a wake channel with a timeout;
//! - virtual time, where waiting is an instantaneous clock jump. Tests use
//!   this to drive throttle/debounce deterministically.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};

use super::timers::{Task, TimerId, TimerQueue};
use super::{Pump, Scheduler};

/// Event loop configuration.
#[derive(Debug, Clone)]
pub struct EventLoopConfig {
    /// Use a virtual clock that only moves when the loop waits.
    pub virtual_time: bool,
    /// Upper bound on a single blocking wait while pumps are registered.
    pub max_idle_wait: Duration,
    /// Max items a pump may deliver per turn.
    pub pump_batch: usize,
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            virtual_time: false,
            max_idle_wait: Duration::from_millis(50),
            pump_batch: 256,
        }
    }
}

/// `Send` handle that wakes a loop blocked in `run`/`run_for`.
#[derive(Debug, Clone)]
pub struct LoopWaker {
    tx: Sender<()>,
}

impl LoopWaker {
    /// Wakes the loop. Never blocks; redundant wakeups coalesce.
    pub fn wake(&self) {
        let _ = self.tx.try_send(());
    }
}

enum Clock {
    Real { origin: Instant },
    Virtual { now: Cell<Duration> },
}

struct LoopInner {
    cfg: EventLoopConfig,
    clock: Clock,
    timers: RefCell<TimerQueue>,
    pumps: RefCell<Vec<Weak<dyn Pump>>>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

/// Cooperative event loop handle. Clones share the same loop.
#[derive(Clone)]
pub struct EventLoop {
    inner: Rc<LoopInner>,
}

impl EventLoop {
    /// Creates a real-time loop with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EventLoopConfig::default())
    }

    /// Creates a virtual-time loop starting at zero.
    #[must_use]
    pub fn virtual_time() -> Self {
        Self::with_config(EventLoopConfig {
            virtual_time: true,
            ..EventLoopConfig::default()
        })
    }

    /// Creates a loop from an explicit configuration.
    #[must_use]
    pub fn with_config(cfg: EventLoopConfig) -> Self {
        let clock = if cfg.virtual_time {
            Clock::Virtual {
                now: Cell::new(Duration::ZERO),
            }
        } else {
            Clock::Real {
                origin: Instant::now(),
            }
        };
        let (wake_tx, wake_rx) = bounded::<()>(1);

        Self {
            inner: Rc::new(LoopInner {
                cfg,
                clock,
                timers: RefCell::new(TimerQueue::default()),
                pumps: RefCell::new(Vec::new()),
                wake_tx,
                wake_rx,
            }),
        }
    }

    /// True if this loop runs on a virtual clock.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        matches!(self.inner.clock, Clock::Virtual { .. })
    }

    /// Number of timers that have not fired or been cancelled.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    /// A waker other threads can use to interrupt a blocking wait.
    #[must_use]
    pub fn waker(&self) -> LoopWaker {
        LoopWaker {
            tx: self.inner.wake_tx.clone(),
        }
    }

    /// Registers a pump polled on every loop turn until it is dropped or
    /// reports closed.
    pub fn register_pump(&self, pump: Weak<dyn Pump>) {
        self.inner.pumps.borrow_mut().push(pump);
    }

    /// True while at least one registered pump is alive and open.
    #[must_use]
    pub fn has_open_pumps(&self) -> bool {
        self.live_pumps().iter().any(|p| p.is_open())
    }

    /// Runs every due timer and one turn of every pump without waiting.
    ///
    /// Returns the number of timer tasks and pumped items processed.
    pub fn poll(&self) -> usize {
        self.fire_due(self.now()) + self.poll_pumps()
    }

    /// Runs until no timers remain.
    ///
    /// Pumps are serviced on every turn but do not keep the loop alive; use
    /// `run_for` to wait for cross-context traffic.
    pub fn run(&self) {
        loop {
            self.poll();
            let next = self.inner.timers.borrow_mut().next_deadline();
            match next {
                Some(deadline) => self.wait_until(deadline),
                None => break,
            }
        }
    }

    /// Runs for `duration` of loop time, servicing timers and pumps.
    pub fn run_for(&self, duration: Duration) {
        if self.is_virtual() {
            self.advance_by(duration);
            return;
        }

        let target = self.now() + duration;
        loop {
            self.poll();
            let now = self.now();
            if now >= target {
                break;
            }
            let next = self.inner.timers.borrow_mut().next_deadline();
            let wake_at = next.map_or(target, |deadline| deadline.min(target));
            self.wait_until(wake_at);
        }
    }

    /// Moves loop time forward by `duration`, firing due timers in deadline
    /// order. On a virtual clock this is instantaneous; on a real clock it is
    /// `run_for`.
    pub fn advance_by(&self, duration: Duration) {
        let Clock::Virtual { now } = &self.inner.clock else {
            self.run_for(duration);
            return;
        };

        let target = now.get() + duration;
        loop {
            let due = self.inner.timers.borrow_mut().pop_due(target);
            let Some((deadline, task)) = due else {
                break;
            };
            if deadline > now.get() {
                now.set(deadline);
            }
            self.run_task(task);
            self.poll_pumps();
        }
        now.set(target);
        self.poll_pumps();
    }

    fn fire_due(&self, now: Duration) -> usize {
        let mut fired = 0;
        loop {
            let due = self.inner.timers.borrow_mut().pop_due(now);
            let Some((_, task)) = due else {
                break;
            };
            self.run_task(task);
            fired += 1;
        }
        fired
    }

    fn run_task(&self, task: Task) {
        let now_ms = u64::try_from(self.now().as_millis()).unwrap_or(u64::MAX);
        tracing::trace!(now_ms, "timer fired");
        task();
    }

    fn live_pumps(&self) -> Vec<Rc<dyn Pump>> {
        let mut pumps = self.inner.pumps.borrow_mut();
        let mut live = Vec::with_capacity(pumps.len());
        pumps.retain(|weak| match weak.upgrade() {
            Some(pump) if pump.is_open() => {
                live.push(pump);
                true
            }
            _ => false,
        });
        live
    }

    fn poll_pumps(&self) -> usize {
        let budget = self.inner.cfg.pump_batch.max(1);
        self.live_pumps().iter().map(|p| p.pump(budget)).sum()
    }

    fn wait_until(&self, deadline: Duration) {
        match &self.inner.clock {
            Clock::Virtual { now } => {
                if deadline > now.get() {
                    now.set(deadline);
                }
            }
            Clock::Real { .. } => {
                let mut wait = deadline.saturating_sub(self.now());
                if self.has_open_pumps() {
                    wait = wait.min(self.inner.cfg.max_idle_wait);
                }
                let _ = self.inner.wake_rx.recv_timeout(wait);
            }
        }
    }
}

impl Scheduler for EventLoop {
    fn now(&self) -> Duration {
        match &self.inner.clock {
            Clock::Real { origin } => origin.elapsed(),
            Clock::Virtual { now } => now.get(),
        }
    }

    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TimerId {
        let mut timers = self.inner.timers.borrow_mut();
        match self.now().checked_add(delay) {
            Some(deadline) => timers.insert(deadline, task),
            None => {
                tracing::debug!(?delay, "timer deadline out of clock range; never fires");
                timers.unarmed()
            }
        }
    }

    fn cancel(&self, id: TimerId) -> bool {
        self.inner.timers.borrow_mut().cancel(id)
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("virtual", &self.is_virtual())
            .field("now", &self.now())
            .field("pending_timers", &self.pending_timers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_at(lp: &EventLoop, log: &Rc<RefCell<Vec<u64>>>, ms: u64) -> TimerId {
        let log = Rc::clone(log);
        let clock = lp.clone();
        lp.schedule(
            Duration::from_millis(ms),
            Box::new(move || {
                let ms = u64::try_from(clock.now().as_millis()).unwrap_or(u64::MAX);
                log.borrow_mut().push(ms);
            }),
        )
    }

    #[test]
    fn virtual_advance_fires_in_order_at_deadline_time() {
        let lp = EventLoop::virtual_time();
        let log = Rc::new(RefCell::new(Vec::new()));
        push_at(&lp, &log, 30);
        push_at(&lp, &log, 10);
        push_at(&lp, &log, 20);

        lp.advance_by(Duration::from_millis(25));
        assert_eq!(*log.borrow(), vec![10, 20]);
        assert_eq!(lp.now(), Duration::from_millis(25));

        lp.run();
        assert_eq!(*log.borrow(), vec![10, 20, 30]);
        assert_eq!(lp.pending_timers(), 0);
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let lp = EventLoop::virtual_time();
        let log = Rc::new(RefCell::new(Vec::new()));
        let id = push_at(&lp, &log, 5);
        assert!(lp.cancel(id));
        lp.run();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn task_scheduled_from_task_fires_within_same_advance() {
        let lp = EventLoop::virtual_time();
        let log = Rc::new(RefCell::new(Vec::new()));

        let inner_lp = lp.clone();
        let inner_log = Rc::clone(&log);
        lp.schedule(
            Duration::from_millis(10),
            Box::new(move || {
                push_at(&inner_lp, &inner_log, 5);
            }),
        );

        lp.advance_by(Duration::from_millis(15));
        assert_eq!(*log.borrow(), vec![15]);
    }

    #[test]
    fn out_of_range_deadline_never_fires() {
        let lp = EventLoop::virtual_time();
        lp.advance_by(Duration::from_millis(1));
        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        let id = lp.schedule(Duration::MAX, Box::new(move || flag.set(true)));

        assert_eq!(lp.pending_timers(), 0);
        assert!(!lp.cancel(id));
        lp.run();
        assert!(!fired.get());
        assert_eq!(lp.now(), Duration::from_millis(1));

        let real = EventLoop::new();
        real.schedule(Duration::MAX, Box::new(|| {}));
        assert_eq!(real.pending_timers(), 0);
    }

    #[test]
    fn real_clock_run_for_fires_short_timer() {
        let lp = EventLoop::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        push_at(&lp, &log, 1);
        lp.run_for(Duration::from_millis(20));
        assert_eq!(log.borrow().len(), 1);
    }

    struct CountingPump {
        turns: Cell<usize>,
        open: Cell<bool>,
    }

    impl Pump for CountingPump {
        fn pump(&self, _budget: usize) -> usize {
            self.turns.set(self.turns.get() + 1);
            0
        }

        fn is_open(&self) -> bool {
            self.open.get()
        }
    }

    #[test]
    fn closed_or_dropped_pumps_are_forgotten() {
        let lp = EventLoop::virtual_time();
        let pump = Rc::new(CountingPump {
            turns: Cell::new(0),
            open: Cell::new(true),
        });
        let weak: Weak<dyn Pump> = Rc::downgrade(&pump) as Weak<dyn Pump>;
        lp.register_pump(weak);

        lp.poll();
        assert_eq!(pump.turns.get(), 1);
        assert!(lp.has_open_pumps());

        pump.open.set(false);
        lp.poll();
        assert_eq!(pump.turns.get(), 1);
        assert!(!lp.has_open_pumps());
    }
}
