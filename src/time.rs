//! Reference time and timeline position arithmetic.
//!
//! Pipeline positions are expressed as [`ReferenceTime`], a signed count of
//! 100-nanosecond units. All conversions go through 128-bit intermediates so
//! that multiplying a long duration by a position index cannot overflow.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    iter::FusedIterator,
    ops::{Add, Sub},
    time::Duration,
};

use ffmpeg_next::Rational;

/// A pipeline timeline position or span in 100-nanosecond units.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use framegrab::ReferenceTime;
///
/// let position = ReferenceTime::from_duration(Duration::from_millis(1500));
/// assert_eq!(position.units(), 15_000_000);
/// assert_eq!(position.to_duration(), Duration::from_millis(1500));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReferenceTime(i64);

impl ReferenceTime {
    /// Number of units in one second.
    pub const UNITS_PER_SECOND: i64 = 10_000_000;

    /// The start of the timeline.
    pub const ZERO: ReferenceTime = ReferenceTime(0);

    /// Wrap a raw unit count.
    pub const fn from_units(units: i64) -> Self {
        Self(units)
    }

    /// The raw unit count.
    pub const fn units(self) -> i64 {
        self.0
    }

    /// Returns `true` if the value lies before the start of the timeline.
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Convert from a [`Duration`], saturating at `i64::MAX` units.
    pub fn from_duration(duration: Duration) -> Self {
        let units = duration.as_nanos() / 100;
        Self(i64::try_from(units).unwrap_or(i64::MAX))
    }

    /// Convert to a [`Duration`]. Negative values clamp to zero.
    pub fn to_duration(self) -> Duration {
        let units = self.0.max(0) as u64;
        Duration::from_nanos(units.saturating_mul(100))
    }

    /// Convert from microseconds (FFmpeg's `AV_TIME_BASE`).
    pub fn from_micros(micros: i64) -> Self {
        Self(micros.saturating_mul(10))
    }

    /// Convert to microseconds, truncating toward zero.
    pub fn to_micros(self) -> i64 {
        self.0 / 10
    }

    /// Rescale a timestamp expressed in a stream's time base.
    pub fn from_stream_timestamp(timestamp: i64, time_base: Rational) -> Self {
        let denominator = time_base.denominator() as i128;
        if denominator == 0 {
            return Self::ZERO;
        }
        let units = timestamp as i128 * time_base.numerator() as i128
            * Self::UNITS_PER_SECOND as i128
            / denominator;
        Self(units.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }

    /// Seconds as a float, for display and throughput math.
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / Self::UNITS_PER_SECOND as f64
    }
}

impl Add for ReferenceTime {
    type Output = ReferenceTime;

    fn add(self, rhs: ReferenceTime) -> ReferenceTime {
        ReferenceTime(self.0.saturating_add(rhs.0))
    }
}

impl Sub for ReferenceTime {
    type Output = ReferenceTime;

    fn sub(self, rhs: ReferenceTime) -> ReferenceTime {
        ReferenceTime(self.0.saturating_sub(rhs.0))
    }
}

impl Display for ReferenceTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{:.3}s", self.as_secs_f64())
    }
}

/// Evenly spaced positions across a timeline.
///
/// Yields `duration * i / count` for `i` in `0..count` using floor division.
/// Created by [`timeline_positions`].
#[derive(Debug, Clone)]
pub struct TimelinePositions {
    duration: i128,
    count: u64,
    index: u64,
}

impl Iterator for TimelinePositions {
    type Item = ReferenceTime;

    fn next(&mut self) -> Option<ReferenceTime> {
        if self.index >= self.count {
            return None;
        }
        let units = (self.duration * self.index as i128).div_euclid(self.count as i128);
        self.index += 1;
        Some(ReferenceTime(units as i64))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.count - self.index) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TimelinePositions {}

impl FusedIterator for TimelinePositions {}

/// Split `duration` into `count` equally spaced seek positions.
///
/// The first position is always zero and the last is strictly before
/// `duration` whenever `duration` is positive. Positions are strictly
/// increasing when `duration >= count`.
///
/// # Example
///
/// ```
/// use framegrab::{ReferenceTime, timeline_positions};
///
/// let positions: Vec<i64> = timeline_positions(ReferenceTime::from_units(10), 4)
///     .map(ReferenceTime::units)
///     .collect();
/// assert_eq!(positions, vec![0, 2, 5, 7]);
/// ```
pub fn timeline_positions(duration: ReferenceTime, count: u64) -> TimelinePositions {
    TimelinePositions {
        duration: duration.units() as i128,
        count,
        index: 0,
    }
}
