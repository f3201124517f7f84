use super::*;
use assert_call::{call, CallRecorder};
use std::sync::atomic::{AtomicI32, Ordering};

fn on_unsubscribe(a: Arc<AtomicI32>) {
    call!("{}", a.load(Ordering::SeqCst));
}

#[test]
fn from_fn_calls_on_drop() {
    let mut cr = CallRecorder::new();
    {
        let _s = Subscription::from_fn(|| call!("drop"));
        cr.verify(());
    }
    cr.verify("drop");
}

#[test]
fn from_weak_fn_calls_when_alive() {
    let mut cr = CallRecorder::new();
    let a = Arc::new(AtomicI32::new(9));
    {
        let _s = Subscription::from_weak_fn(Arc::downgrade(&a), on_unsubscribe);
    }
    cr.verify("9");
}

#[test]
fn from_weak_fn_noop_when_dead() {
    let mut cr = CallRecorder::new();
    let a = Arc::new(AtomicI32::new(1));
    let weak = Arc::downgrade(&a);
    drop(a);
    {
        let _s = Subscription::from_weak_fn(weak, on_unsubscribe);
    }
    cr.verify(());
}

#[test]
fn merge_drops_all_in_order() {
    let mut cr = CallRecorder::new();
    let s = Subscription::merge([
        Subscription::from_fn(|| call!("a")),
        Subscription::from_fn(|| call!("b")),
    ]);
    cr.verify(());
    s.unsubscribe();
    cr.verify(["a", "b"]);
}

#[test]
fn with_keeps_both() {
    let mut cr = CallRecorder::new();
    let s = Subscription::from_fn(|| call!("a")).with(Subscription::from_fn(|| call!("b")));
    drop(s);
    cr.verify(["a", "b"]);
}

#[test]
fn empty_is_empty() {
    assert!(Subscription::empty().is_empty());
    assert!(!Subscription::from_fn(|| {}).is_empty());
}
