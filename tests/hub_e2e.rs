use std::cell::RefCell;
use std::rc::Rc;

use kyrorx::testing::Recorder;
use kyrorx::{
    of, ArgumentError, AsyncSubject, BehaviorSubject, Consumer, Hub, Notification, ReplaySubject,
    StreamError, Subject, Terminal,
};

#[test]
fn every_hub_variant_replays_only_terminal_after_failure() {
    let error = StreamError::upstream("upstream gone");
    let expected = vec![Notification::Failed(error.clone())];

    let plain = Subject::new();
    plain.push_value(1);
    plain.push_failed(error.clone());

    let replay = ReplaySubject::with_capacity(4).unwrap();
    replay.push_value(1);
    replay.push_failed(error.clone());

    let behavior = BehaviorSubject::new(0);
    behavior.push_value(1);
    behavior.push_failed(error.clone());

    let last = AsyncSubject::new();
    last.push_value(1);
    last.push_failed(error.clone());

    let hubs: Vec<Box<dyn Hub<i32>>> = vec![
        Box::new(plain),
        Box::new(replay),
        Box::new(behavior),
        Box::new(last),
    ];
    for hub in hubs {
        let recorder = Recorder::new();
        hub.to_observable().subscribe(recorder.clone());
        assert_eq!(recorder.notifications(), expected);
        assert_eq!(hub.terminal(), Some(Terminal::Failed(error.clone())));
        assert_eq!(hub.consumer_count(), 0);
    }
}

#[test]
fn replay_hub_fed_by_upstream_source() {
    let hub = ReplaySubject::with_capacity(2).unwrap();
    of([1, 2, 3]).subscribe(hub.clone());

    let recorder = Recorder::new();
    hub.attach(recorder.clone());
    // Terminal hubs do not replay retained values.
    assert_eq!(recorder.notifications(), vec![Notification::Completed]);
    assert_eq!(hub.buffered(), vec![2, 3]);
}

#[test]
fn replay_capacity_must_be_positive() {
    assert!(matches!(
        ReplaySubject::<u8>::with_capacity(0),
        Err(ArgumentError::InvalidArgument { .. })
    ));
}

#[test]
fn behavior_hub_drives_derived_stream() {
    let temperature = BehaviorSubject::new(20);
    let readings = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&readings);
    let sub = temperature
        .to_observable()
        .distinct_until_changed()
        .map(|c| c * 9 / 5 + 32)
        .subscribe(Consumer::new(move |f: i32| sink.borrow_mut().push(f)));

    temperature.push_value(20);
    temperature.push_value(25);
    sub.cancel();
    temperature.push_value(30);

    assert_eq!(*readings.borrow(), vec![68, 77]);
    assert_eq!(temperature.value(), 30);
    assert_eq!(temperature.consumer_count(), 0);
}

#[test]
fn async_hub_late_attach_after_completion() {
    let result = AsyncSubject::new();
    let early = Recorder::new();
    result.attach(early.clone());

    of(["draft", "final"]).subscribe(result.clone());

    let late = Recorder::new();
    result.attach(late.clone());
    let expected = vec![Notification::Value("final"), Notification::Completed];
    assert_eq!(early.notifications(), expected);
    assert_eq!(late.notifications(), expected);
}

#[test]
fn shared_hub_source_detaches_when_all_leave() {
    let upstream = Subject::new();
    let shared = upstream.to_observable().share();

    let first = Recorder::new();
    let second = Recorder::new();
    let s1 = shared.subscribe(first.clone());
    let s2 = shared.subscribe(second.clone());
    upstream.push_value('a');
    s1.cancel();
    s2.cancel();
    upstream.push_value('b');

    assert_eq!(first.values(), vec!['a']);
    assert_eq!(second.values(), vec!['a']);
    assert_eq!(upstream.consumer_count(), 0);
}

#[test]
fn failing_consumer_is_isolated_from_siblings() {
    let hub = Subject::new();
    let picky = Recorder::failing_on(2);
    let steady = Recorder::new();
    hub.attach(picky.clone());
    hub.attach(steady.clone());

    hub.push_value(1);
    hub.push_value(2);
    hub.push_value(3);

    assert_eq!(picky.values(), vec![1]);
    assert!(picky.failure().is_some_and(|e| e.is_handler()));
    assert_eq!(steady.values(), vec![1, 2, 3]);
    assert_eq!(hub.consumer_count(), 1);
}
