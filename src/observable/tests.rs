use std::sync::Arc;

use assert_call::{call, CallRecorder};
use futures::{executor::block_on, StreamExt};
use parking_lot::Mutex;

use super::*;

#[test]
fn from_values_then_completes() {
    let mut cr = CallRecorder::new();
    let _s = Observable::from_values([1, 2]).subscribe_all(
        |x| call!("{x}"),
        |e| call!("error {e}"),
        || call!("completed"),
    );
    cr.verify(["1", "2", "completed"]);
}

#[test]
fn map_forwards_error() {
    let mut cr = CallRecorder::new();
    let _s = Observable::<u8>::error(Error::Disposed)
        .map(|x| *x as u32 * 2)
        .subscribe_all(|x| call!("{x}"), |e| call!("{e}"), || call!("completed"));
    cr.verify("the list has been disposed");
}

#[test]
fn map_values() {
    let mut cr = CallRecorder::new();
    let _s = Observable::from_values([1, 2])
        .map(|x| x * 10)
        .subscribe(|x| call!("{x}"));
    cr.verify(["10", "20"]);
}

#[test]
fn subject_multicast() {
    let mut cr = CallRecorder::new();
    let s = Subject::new();
    let _a = s.as_observable().subscribe(|x| call!("a {x}"));
    let _b = s.as_observable().subscribe(|x| call!("b {x}"));
    s.on_next(1);
    cr.verify(["a 1", "b 1"]);
}

#[test]
fn subject_unsubscribe() {
    let mut cr = CallRecorder::new();
    let s = Subject::new();
    let a = s.as_observable().subscribe(|x| call!("a {x}"));
    assert!(s.has_observers());
    drop(a);
    assert!(!s.has_observers());
    s.on_next(1);
    cr.verify(());
}

#[test]
fn subject_late_subscriber_gets_completion() {
    let mut cr = CallRecorder::new();
    let s = Subject::<u8>::new();
    s.on_completed();
    s.on_next(1);
    let _a = s
        .as_observable()
        .subscribe_all(|x| call!("{x}"), |_| call!("error"), || call!("completed"));
    cr.verify("completed");
    assert!(s.is_stopped());
}

#[test]
fn subject_reentrant_push_keeps_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let s = Subject::new();
    let s2 = s.clone();
    let log_a = log.clone();
    let _a = s.as_observable().subscribe(move |x: &u32| {
        log_a.lock().push(format!("a {x}"));
        if *x == 1 {
            s2.on_next(2);
        }
    });
    let log_b = log.clone();
    let _b = s
        .as_observable()
        .subscribe(move |x: &u32| log_b.lock().push(format!("b {x}")));
    s.on_next(1);
    assert_eq!(*log.lock(), vec!["a 1", "b 1", "a 2", "b 2"]);
}

#[test]
fn subject_subscriber_added_during_drain_skips_earlier_values() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let s = Subject::new();
    let s2 = s.clone();
    let late = Arc::new(Mutex::new(None));
    let late2 = late.clone();
    let log_a = log.clone();
    let _a = s.as_observable().subscribe(move |x: &u32| {
        log_a.lock().push(format!("a {x}"));
        if *x == 1 {
            s2.on_next(2);
            let log_c = log_a.clone();
            *late2.lock() = Some(
                s2.as_observable()
                    .subscribe(move |x: &u32| log_c.lock().push(format!("c {x}"))),
            );
            s2.on_next(3);
        }
    });
    s.on_next(1);
    assert_eq!(*log.lock(), vec!["a 1", "a 2", "a 3", "c 3"]);
}

#[test]
fn downstream_stops_after_terminal() {
    let mut cr = CallRecorder::new();
    struct Rec;
    impl Observer<u8> for Rec {
        fn on_next(&self, value: &u8) {
            call!("{value}");
        }
        fn on_error(&self, _: &Error) {
            call!("error");
        }
        fn on_completed(&self) {
            call!("completed");
        }
    }
    let d = Downstream::new(Arc::new(Rec));
    d.next(1);
    d.completed();
    d.next(2);
    d.error(Error::Disposed);
    assert!(d.is_stopped());
    cr.verify(["1", "completed"]);
}

#[test]
fn to_stream_yields_values() {
    let s = Subject::new();
    let stream = s.as_observable().to_stream();
    s.on_next(1);
    s.on_next(2);
    s.on_completed();
    let values: Vec<_> = block_on(stream.map(|x| x.unwrap()).collect());
    assert_eq!(values, vec![1, 2]);
}

#[test]
fn to_stream_yields_error() {
    let stream = Observable::<u8>::error(Error::NoReasons).to_stream();
    let values: Vec<_> = block_on(stream.collect());
    assert_eq!(values.len(), 1);
    assert!(matches!(values[0], Err(Error::NoReasons)));
}

#[test]
fn observable_eq_is_identity() {
    let a = Observable::<u8>::never();
    let b = a.clone();
    assert_eq!(a, b);
    assert_ne!(a, Observable::never());
}
