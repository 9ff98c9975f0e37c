#![cfg(feature = "broadcast")]

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use kyrorx::testing::Recorder;
use kyrorx::{BroadcastSubject, EventLoop, Hub, Notification};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Tick {
    seq: u32,
    source: String,
}

#[test]
fn values_cross_threads_and_arrive_on_poll() {
    let lp = EventLoop::virtual_time();
    let local = BroadcastSubject::<Tick>::open("e2e-cross-thread", &lp).unwrap();
    let recorder = Recorder::new();
    local.attach(recorder.clone());

    let worker = thread::spawn(|| {
        let lp = EventLoop::virtual_time();
        let remote = BroadcastSubject::<Tick>::open("e2e-cross-thread", &lp).unwrap();
        for seq in 0..3 {
            remote.push_value(Tick {
                seq,
                source: "worker".to_string(),
            });
        }
        remote.push_completed();
    });
    worker.join().unwrap();

    assert!(recorder.is_empty());
    lp.poll();

    let seqs: Vec<u32> = recorder.values().into_iter().map(|t| t.seq).collect();
    assert_eq!(seqs, vec![0, 1, 2]);
    // The remote's completion is local to the remote.
    assert!(!recorder.is_completed());
}

#[test]
fn real_time_loop_is_woken_by_peer() {
    let lp = EventLoop::new();
    let local = BroadcastSubject::<u64>::open("e2e-wake", &lp).unwrap();
    let recorder = Recorder::new();
    local.attach(recorder.clone());

    let worker = thread::spawn(|| {
        let lp = EventLoop::virtual_time();
        let remote = BroadcastSubject::<u64>::open("e2e-wake", &lp).unwrap();
        thread::sleep(Duration::from_millis(5));
        remote.push_value(42);
    });

    for _ in 0..200 {
        lp.run_for(Duration::from_millis(10));
        if !recorder.is_empty() {
            break;
        }
    }
    worker.join().unwrap();
    assert_eq!(recorder.values(), vec![42]);
}

#[test]
fn closed_hub_stops_receiving() {
    let lp = EventLoop::virtual_time();
    let a = BroadcastSubject::<i32>::open("e2e-close", &lp).unwrap();
    let b = BroadcastSubject::<i32>::open("e2e-close", &lp).unwrap();
    let recorder = Recorder::new();
    b.attach(recorder.clone());

    a.push_value(1);
    lp.poll();
    b.close();
    a.push_value(2);
    lp.poll();

    assert_eq!(recorder.notifications(), vec![Notification::Value(1)]);
    assert!(b.is_closed());
    assert_eq!(b.name(), "e2e-close");
}
