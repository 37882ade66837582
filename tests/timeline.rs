//! Reference time conversions and timeline spacing.

use std::time::Duration;

use ffmpeg_next::Rational;
use framegrab::{ReferenceTime, timeline_positions};

fn units(duration: i64, count: u64) -> Vec<i64> {
    timeline_positions(ReferenceTime::from_units(duration), count)
        .map(ReferenceTime::units)
        .collect()
}

// ── Positions ──────────────────────────────────────────────────────

#[test]
fn evenly_divisible_duration() {
    let positions = units(10_000, 100);
    assert_eq!(positions.len(), 100);
    assert_eq!(positions[0], 0);
    assert_eq!(positions[1], 100);
    assert_eq!(positions[99], 9_900);
}

#[test]
fn floor_division_on_remainders() {
    assert_eq!(units(10, 4), vec![0, 2, 5, 7]);
    assert_eq!(units(7, 3), vec![0, 2, 4]);
}

#[test]
fn first_is_zero_and_last_is_before_end() {
    for (duration, count) in [(1, 1), (999, 10), (36_000_000_000, 100), (5, 5)] {
        let positions = units(duration, count);
        assert_eq!(positions[0], 0);
        assert!(*positions.last().unwrap() < duration);
    }
}

#[test]
fn strictly_increasing_when_duration_covers_count() {
    let positions = units(100, 100);
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn non_decreasing_when_count_exceeds_duration() {
    let positions = units(3, 10);
    assert_eq!(positions.len(), 10);
    assert!(positions.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(positions, vec![0, 0, 0, 0, 1, 1, 1, 2, 2, 2]);
}

#[test]
fn zero_duration_yields_zeros() {
    assert_eq!(units(0, 4), vec![0, 0, 0, 0]);
}

#[test]
fn zero_count_yields_nothing() {
    assert!(units(10_000, 0).is_empty());
}

#[test]
fn large_values_do_not_overflow() {
    let duration = i64::MAX / 2;
    let positions = units(duration, 1_000);
    assert_eq!(positions[999], ((duration as i128 * 999) / 1_000) as i64);
}

#[test]
fn iterator_reports_exact_length() {
    let mut positions = timeline_positions(ReferenceTime::from_units(1_000), 5);
    assert_eq!(positions.len(), 5);
    positions.next();
    assert_eq!(positions.len(), 4);
    positions.by_ref().for_each(drop);
    assert_eq!(positions.next(), None);
}

// ── ReferenceTime ──────────────────────────────────────────────────

#[test]
fn duration_round_trip_at_unit_precision() {
    let time = ReferenceTime::from_duration(Duration::from_nanos(1_234_567_800));
    assert_eq!(time.units(), 12_345_678);
    assert_eq!(time.to_duration(), Duration::from_nanos(1_234_567_800));
}

#[test]
fn microsecond_conversion() {
    let time = ReferenceTime::from_micros(2_500_000);
    assert_eq!(time.units(), 25_000_000);
    assert_eq!(time.to_micros(), 2_500_000);
    assert_eq!(ReferenceTime::from_units(19).to_micros(), 1);
}

#[test]
fn stream_timestamp_conversion() {
    let time = ReferenceTime::from_stream_timestamp(90_000, Rational::new(1, 90_000));
    assert_eq!(time, ReferenceTime::from_units(ReferenceTime::UNITS_PER_SECOND));

    let frame = ReferenceTime::from_stream_timestamp(1, Rational::new(1, 25));
    assert_eq!(frame.units(), 400_000);
}

#[test]
fn negative_times_clamp_to_zero_duration() {
    let time = ReferenceTime::from_units(-10);
    assert!(time.is_negative());
    assert_eq!(time.to_duration(), Duration::ZERO);
}

#[test]
fn arithmetic_and_display() {
    let a = ReferenceTime::from_units(15_000_000);
    let b = ReferenceTime::from_units(5_000_000);
    assert_eq!((a + b).units(), 20_000_000);
    assert_eq!((a - b).units(), 10_000_000);
    assert_eq!(a.to_string(), "1.500s");
    assert!((a.as_secs_f64() - 1.5).abs() < f64::EPSILON);
}
