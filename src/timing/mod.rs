//! Timing-windowed sampling: `throttle` and `debounce`.
//!
//! Both operators take a `Window`. The degenerate windows need no timer at
//! all; a finite window is built from the flatten engine and the `timer`
//! source, so cancellation and completion follow the engine's rules.

use std::time::Duration;

use crate::core::Observable;
use crate::flatten::concat;
use crate::runtime::Scheduler;
use crate::sources::{empty, of, timer};

/// Length of a sampling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// No window at all: the result completes immediately.
    Empty,
    /// A zero-length window: values pass straight through.
    Immediate,
    /// A window of the given length.
    Finite(Duration),
    /// A window that never closes.
    Forever,
}

impl Window {
    /// Interprets a window length in milliseconds.
    ///
    /// Negative or NaN lengths are `Empty`, zero is `Immediate`, positive
    /// infinity (or anything too large for a `Duration`) is `Forever`.
    #[must_use]
    pub fn from_millis(ms: f64) -> Self {
        if ms.is_nan() || ms < 0.0 {
            Self::Empty
        } else if ms == 0.0 {
            Self::Immediate
        } else {
            Duration::try_from_secs_f64(ms / 1000.0).map_or(Self::Forever, Self::Finite)
        }
    }
}

impl From<Duration> for Window {
    fn from(duration: Duration) -> Self {
        if duration.is_zero() {
            Self::Immediate
        } else if duration == Duration::MAX {
            Self::Forever
        } else {
            Self::Finite(duration)
        }
    }
}

impl Window {
    /// A finite window whose end is past the scheduler's clock range can
    /// never elapse.
    fn resolve<S: Scheduler>(self, scheduler: &S) -> Self {
        match self {
            Self::Finite(length) if scheduler.now().checked_add(length).is_none() => Self::Forever,
            other => other,
        }
    }
}

impl<T: Clone + 'static> Observable<T> {
    /// Emits a value, then ignores further values until `window` has elapsed.
    ///
    /// Completion of the source waits for an active window to elapse. An
    /// `Empty` window completes without subscribing; a `Forever` window emits
    /// the first value and completes.
    pub fn throttle<S>(&self, scheduler: &S, window: impl Into<Window>) -> Observable<T>
    where
        S: Scheduler + Clone + 'static,
    {
        match window.into().resolve(scheduler) {
            Window::Empty => empty(),
            Window::Immediate => self.clone(),
            Window::Forever => self.take(1),
            Window::Finite(hold) => {
                let scheduler = scheduler.clone();
                self.exhaust_map(move |value: T| {
                    concat([of([value]), timer(&scheduler, hold).ignore_elements()])
                })
            }
        }
    }

    /// Emits a value only once `window` has elapsed without a newer value.
    ///
    /// Completion of the source waits for the pending value. An `Empty`
    /// window completes without subscribing; a `Forever` window suppresses
    /// every value and forwards only termination.
    pub fn debounce<S>(&self, scheduler: &S, window: impl Into<Window>) -> Observable<T>
    where
        S: Scheduler + Clone + 'static,
    {
        match window.into().resolve(scheduler) {
            Window::Empty => empty(),
            Window::Immediate => self.clone(),
            Window::Forever => self.ignore_elements(),
            Window::Finite(quiet) => {
                let scheduler = scheduler.clone();
                self.switch_map(move |value: T| {
                    timer(&scheduler, quiet).map(move |_| value.clone())
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Notification;
    use crate::hub::{Hub, Subject};
    use crate::runtime::EventLoop;
    use crate::testing::Recorder;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn window_from_millis() {
        assert_eq!(Window::from_millis(-1.0), Window::Empty);
        assert_eq!(Window::from_millis(f64::NAN), Window::Empty);
        assert_eq!(Window::from_millis(0.0), Window::Immediate);
        assert_eq!(Window::from_millis(f64::INFINITY), Window::Forever);
        assert_eq!(Window::from_millis(250.0), Window::Finite(250 * MS));
        assert_eq!(Window::from(Duration::ZERO), Window::Immediate);
        assert_eq!(Window::from(Duration::MAX), Window::Forever);
    }

    #[test]
    fn windows_past_the_clock_range_never_elapse() {
        let real = EventLoop::new();
        assert_eq!(of([1, 2]).throttle(&real, Duration::MAX).to_vec(), Ok(vec![1]));

        let lp = EventLoop::virtual_time();
        lp.advance_by(MS);
        let near_max = Window::Finite(Duration::MAX - Duration::from_nanos(1));
        let throttled = Recorder::new();
        of([1, 2])
            .throttle(&lp, near_max)
            .subscribe(throttled.clone());
        let debounced = Recorder::new();
        of([1, 2])
            .debounce(&lp, near_max)
            .subscribe(debounced.clone());
        lp.run();

        assert_eq!(
            throttled.notifications(),
            vec![Notification::Value(1), Notification::Completed]
        );
        assert_eq!(debounced.notifications(), vec![Notification::Completed]);
        assert_eq!(lp.pending_timers(), 0);
    }

    #[test]
    fn throttle_emits_leading_and_holds() {
        let lp = EventLoop::virtual_time();
        let source = Subject::new();
        let recorder = Recorder::new();
        source
            .to_observable()
            .throttle(&lp, 100 * MS)
            .subscribe(recorder.clone());

        source.push_value(1);
        lp.advance_by(50 * MS);
        source.push_value(2);
        lp.advance_by(60 * MS);
        source.push_value(3);
        source.push_completed();
        assert!(!recorder.is_completed());

        lp.advance_by(100 * MS);
        assert_eq!(
            recorder.notifications(),
            vec![
                Notification::Value(1),
                Notification::Value(3),
                Notification::Completed
            ]
        );
        assert_eq!(lp.pending_timers(), 0);
    }

    #[test]
    fn debounce_emits_after_quiet_period() {
        let lp = EventLoop::virtual_time();
        let source = Subject::new();
        let recorder = Recorder::new();
        source
            .to_observable()
            .debounce(&lp, 100 * MS)
            .subscribe(recorder.clone());

        source.push_value(1);
        lp.advance_by(50 * MS);
        source.push_value(2);
        lp.advance_by(99 * MS);
        assert!(recorder.is_empty());
        assert_eq!(lp.pending_timers(), 1);

        lp.advance_by(MS);
        assert_eq!(recorder.values(), vec![2]);

        source.push_value(3);
        source.push_completed();
        assert!(!recorder.is_completed());
        lp.advance_by(100 * MS);
        assert_eq!(
            recorder.notifications(),
            vec![
                Notification::Value(2),
                Notification::Value(3),
                Notification::Completed
            ]
        );
    }

    #[test]
    fn zero_window_passes_through_without_timers() {
        let lp = EventLoop::virtual_time();
        let expected = vec![
            Notification::Value(1),
            Notification::Value(2),
            Notification::Value(3),
            Notification::Completed,
        ];

        let throttled = Recorder::new();
        of([1, 2, 3])
            .throttle(&lp, Window::from_millis(0.0))
            .subscribe(throttled.clone());
        let debounced = Recorder::new();
        of([1, 2, 3])
            .debounce(&lp, Duration::ZERO)
            .subscribe(debounced.clone());

        assert_eq!(throttled.notifications(), expected);
        assert_eq!(debounced.notifications(), expected);
        assert_eq!(lp.pending_timers(), 0);
    }

    #[test]
    fn infinite_windows() {
        let lp = EventLoop::virtual_time();
        let throttled = Recorder::new();
        of([1, 2, 3])
            .throttle(&lp, Window::Forever)
            .subscribe(throttled.clone());
        assert_eq!(
            throttled.notifications(),
            vec![Notification::Value(1), Notification::Completed]
        );

        let debounced = Recorder::new();
        of([1, 2, 3])
            .debounce(&lp, Window::Forever)
            .subscribe(debounced.clone());
        assert_eq!(debounced.notifications(), vec![Notification::Completed]);
    }

    #[test]
    fn empty_window_never_subscribes() {
        let lp = EventLoop::virtual_time();
        let source = Subject::<i32>::new();
        let recorder = Recorder::new();
        source
            .to_observable()
            .debounce(&lp, Window::from_millis(-5.0))
            .subscribe(recorder.clone());
        assert_eq!(recorder.notifications(), vec![Notification::Completed]);
        assert_eq!(source.consumer_count(), 0);
    }

    #[test]
    fn cancelling_debounce_releases_timer() {
        let lp = EventLoop::virtual_time();
        let source = Subject::new();
        let recorder = Recorder::new();
        let sub = source
            .to_observable()
            .debounce(&lp, 10 * MS)
            .subscribe(recorder.clone());

        source.push_value(1);
        assert_eq!(lp.pending_timers(), 1);
        sub.cancel();
        assert_eq!(lp.pending_timers(), 0);
        lp.advance_by(20 * MS);
        assert!(recorder.is_empty());
    }
}
