//! Delivery signal semantics.

use std::{
    thread,
    time::{Duration, Instant},
};

use framegrab::{DeliverySignal, FrameStamp, ReferenceTime, WaitOutcome};

#[test]
fn new_signal_is_clear() {
    let signal = DeliverySignal::new();
    assert!(!signal.is_set());
    assert!(!signal.wait_timeout(Duration::from_millis(10)));
}

#[test]
fn wait_consumes_the_set() {
    let signal = DeliverySignal::new();
    signal.set();
    assert!(signal.is_set());

    signal.wait();
    assert!(!signal.is_set());
}

#[test]
fn repeated_sets_collapse() {
    let signal = DeliverySignal::new();
    signal.set();
    signal.set();
    signal.set();

    assert!(signal.wait_timeout(Duration::from_millis(10)));
    assert!(!signal.wait_timeout(Duration::from_millis(10)));
}

#[test]
fn reset_discards_a_stale_set() {
    let signal = DeliverySignal::new();
    signal.set();
    signal.reset();

    assert!(!signal.is_set());
    assert!(!signal.wait_timeout(Duration::from_millis(10)));
}

#[test]
fn set_from_another_thread_wakes_waiter() {
    let signal = DeliverySignal::new();
    let remote = signal.clone();

    let setter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        remote.set();
    });

    let started = Instant::now();
    assert!(signal.wait_timeout(Duration::from_secs(5)));
    assert!(started.elapsed() < Duration::from_secs(5));
    setter.join().unwrap();
}

#[test]
fn timeout_elapses_without_set() {
    let signal = DeliverySignal::new();
    let started = Instant::now();

    assert!(!signal.wait_timeout(Duration::from_millis(50)));
    assert!(started.elapsed() >= Duration::from_millis(50));
}

#[test]
fn separate_signals_are_independent() {
    let first = DeliverySignal::new();
    let second = DeliverySignal::new();

    first.set();

    assert!(!second.is_set());
    assert!(first.is_set());
}

// ── Waiting for a position ─────────────────────────────────────────

fn stamp(start: i64, stop: i64) -> FrameStamp {
    FrameStamp {
        start: ReferenceTime::from_units(start),
        stop: ReferenceTime::from_units(stop),
    }
}

#[test]
fn frame_covering_target_reaches_it() {
    let target = ReferenceTime::from_units(1_000);

    assert!(stamp(900, 1_100).reaches(target));
    assert!(stamp(1_000, 1_400).reaches(target));
    assert!(stamp(5_000, 5_400).reaches(target));
    assert!(!stamp(600, 1_000).reaches(target));
}

#[test]
fn earlier_frame_does_not_satisfy_wait() {
    let signal = DeliverySignal::new();
    signal.set_stamped(stamp(0, 400));

    let target = ReferenceTime::from_units(10_000);
    let outcome = signal.wait_reaching(target, Duration::from_millis(30));

    assert_eq!(outcome, WaitOutcome::TimedOut);
    assert!(!signal.is_set());
}

#[test]
fn later_frame_replaces_an_ignored_one() {
    let signal = DeliverySignal::new();
    let remote = signal.clone();
    signal.set_stamped(stamp(0, 400));

    let setter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        remote.set_stamped(stamp(10_000, 10_400));
    });

    let target = ReferenceTime::from_units(10_000);
    let outcome = signal.wait_reaching(target, Duration::from_secs(5));
    setter.join().unwrap();

    assert_eq!(outcome, WaitOutcome::Signalled(Some(stamp(10_000, 10_400))));
}

#[test]
fn unstamped_set_always_satisfies_wait() {
    let signal = DeliverySignal::new();
    signal.set();

    let target = ReferenceTime::from_units(10_000);
    let outcome = signal.wait_reaching(target, Duration::from_millis(30));

    assert_eq!(outcome, WaitOutcome::Signalled(None));
}
