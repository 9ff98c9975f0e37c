//! Operators that control a subscription's lifetime.

use std::rc::Rc;

use crate::core::{CancelToken, Emitter, Notification, Observable, Observer};
use crate::error::{RxError, RxResult, StreamError};
use crate::testing::Recorder;

struct UntilNotifier<T> {
    downstream: Emitter<T>,
}

impl<T, N> Observer<N> for UntilNotifier<T> {
    fn on_value(&self, _value: N) -> Result<(), StreamError> {
        self.downstream.emit_completed();
        Ok(())
    }

    fn on_failed(&self, error: StreamError) {
        self.downstream.emit_failed(error);
    }
}

struct Forward<T> {
    downstream: Emitter<T>,
}

impl<T> Observer<T> for Forward<T> {
    fn on_value(&self, value: T) -> Result<(), StreamError> {
        self.downstream.emit_value(value);
        Ok(())
    }

    fn on_completed(&self) {
        self.downstream.emit_completed();
    }

    fn on_failed(&self, error: StreamError) {
        self.downstream.emit_failed(error);
    }
}

impl<T: 'static> Observable<T> {
    /// Mirrors this source until `notifier` emits a value, then completes.
    ///
    /// The notifier is subscribed first; if it emits synchronously the source
    /// is never subscribed. Notifier completion without a value is ignored.
    pub fn take_until<N: 'static>(&self, notifier: &Observable<N>) -> Observable<T> {
        let source = self.clone();
        let notifier = notifier.clone();
        Observable::new(move |downstream: Emitter<T>| {
            notifier.subscribe_with(
                downstream.token().child(),
                UntilNotifier {
                    downstream: downstream.clone(),
                },
            );
            if downstream.is_closed() {
                return Ok(());
            }
            source.subscribe_with(downstream.token().child(), Forward { downstream });
            Ok(())
        })
    }

    /// Collects the values of a source that terminates synchronously.
    ///
    /// # Errors
    ///
    /// Returns `RxError::Stream` if the source failed, and
    /// `RxError::Internal` if it did not terminate during `subscribe` (the
    /// subscription is cancelled in that case).
    pub fn to_vec(&self) -> RxResult<Vec<T>> {
        let recorder = Recorder::new();
        let token = CancelToken::new();
        self.subscribe_with(token.clone(), recorder.clone());

        let mut values = Vec::with_capacity(recorder.len());
        for notification in recorder.drain() {
            match notification {
                Notification::Value(v) => values.push(v),
                Notification::Completed => return Ok(values),
                Notification::Failed(e) => return Err(RxError::Stream(e)),
            }
        }

        token.cancel();
        Err(RxError::internal("source did not terminate synchronously"))
    }

    /// Calls `f` for every notification, returning the subscription.
    pub fn for_each_notification(
        &self,
        f: impl Fn(Notification<T>) + 'static,
    ) -> crate::core::Subscription {
        let f = Rc::new(f);
        self.subscribe(NotificationFn { f })
    }
}

struct NotificationFn<F> {
    f: Rc<F>,
}

impl<T, F: Fn(Notification<T>)> Observer<T> for NotificationFn<F> {
    fn on_value(&self, value: T) -> Result<(), StreamError> {
        (self.f)(Notification::Value(value));
        Ok(())
    }

    fn on_completed(&self) {
        (self.f)(Notification::Completed);
    }

    fn on_failed(&self, error: StreamError) {
        (self.f)(Notification::Failed(error));
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::hub::{Hub, Subject};
    use crate::sources::{fail, never, of};

    type NotificationLog<T> = Rc<RefCell<Vec<Notification<T>>>>;

    #[test]
    fn take_until_completes_on_notifier_value() {
        let source = Subject::<i32>::new();
        let stop = Subject::<()>::new();
        let recorder = Recorder::new();
        source
            .to_observable()
            .take_until(&stop.to_observable())
            .subscribe(recorder.clone());

        source.push_value(1);
        stop.push_value(());
        source.push_value(2);

        assert_eq!(
            recorder.notifications(),
            vec![Notification::Value(1), Notification::Completed]
        );
        assert_eq!(source.consumer_count(), 0);
        assert_eq!(stop.consumer_count(), 0);
    }

    #[test]
    fn take_until_sync_notifier_skips_source() {
        let source = Subject::<i32>::new();
        let recorder = Recorder::new();
        source
            .to_observable()
            .take_until(&of([()]))
            .subscribe(recorder.clone());
        assert_eq!(recorder.notifications(), vec![Notification::Completed]);
        assert_eq!(source.consumer_count(), 0);
    }

    #[test]
    fn to_vec_outcomes() {
        assert_eq!(of([1, 2]).to_vec(), Ok(vec![1, 2]));
        assert_eq!(
            fail::<i32>(StreamError::upstream("x")).to_vec(),
            Err(RxError::Stream(StreamError::upstream("x")))
        );
        assert!(never::<i32>().to_vec().is_err_and(|e| e.is_internal()));
    }

    #[test]
    fn to_vec_collects_values_without_clone_or_equality() {
        struct Reading(u8);

        let readings = Observable::new(|emitter: Emitter<Reading>| {
            emitter.emit_value(Reading(1));
            emitter.emit_value(Reading(2));
            emitter.emit_completed();
            Ok(())
        });
        let collected = readings.to_vec().unwrap();
        assert_eq!(collected.iter().map(|r| r.0).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn for_each_notification_sees_terminal() {
        let log: NotificationLog<i32> = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        of([7]).for_each_notification(move |n| l.borrow_mut().push(n));
        assert_eq!(
            *log.borrow(),
            vec![Notification::Value(7), Notification::Completed]
        );
    }
}
