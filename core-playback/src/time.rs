//! # Time & Seek Model
//!
//! Value types for playback positions, signed offsets and seek requests.
//!
//! Positions are never negative: conversions from host engines (which report
//! `f64` seconds, sometimes negative or NaN around file boundaries) clamp to
//! zero. Offsets are signed millisecond counts so that repeated relative seeks
//! can be summed before they are applied.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg};
use std::time::Duration;

use crate::error::SeekError;

/// A non-negative playback position or duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u64", into = "u64")]
pub struct Time(Duration);

impl Time {
    pub const ZERO: Time = Time(Duration::ZERO);

    /// One frame at 30 fps. Tolerance for position hand-overs between backends.
    pub const FRAME_INTERVAL: Time = Time(Duration::from_micros(33_334));

    pub const fn from_duration(duration: Duration) -> Self {
        Self(duration)
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    /// Converts engine seconds. Negative, NaN and infinite values become zero;
    /// values too large for a `Duration` saturate.
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_finite() && secs > 0.0 {
            Self(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
        } else {
            Self::ZERO
        }
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0.as_secs_f64()
    }

    pub fn as_millis(&self) -> u64 {
        u64::try_from(self.0.as_millis()).unwrap_or(u64::MAX)
    }

    fn as_signed_millis(&self) -> i64 {
        i64::try_from(self.as_millis()).unwrap_or(i64::MAX)
    }

    /// Applies a signed offset, `None` when the result would be negative.
    pub fn checked_offset(&self, delta: TimeDelta) -> Option<Time> {
        let target = self.as_signed_millis().checked_add(delta.as_millis())?;
        u64::try_from(target).ok().map(Time::from_millis)
    }

    /// Applies a signed offset, stopping at zero.
    pub fn saturating_offset(&self, delta: TimeDelta) -> Time {
        self.checked_offset(delta).unwrap_or(Time::ZERO)
    }

    /// Clamps into `[0, duration]`. Unknown durations leave the upper side open.
    pub fn clamp_to(&self, duration: Option<Time>) -> Time {
        match duration {
            Some(limit) if *self > limit => limit,
            _ => *self,
        }
    }

    /// Absolute distance between two positions.
    pub fn abs_diff(&self, other: Time) -> Duration {
        if self.0 > other.0 {
            self.0 - other.0
        } else {
            other.0 - self.0
        }
    }
}

impl From<u64> for Time {
    fn from(millis: u64) -> Self {
        Time::from_millis(millis)
    }
}

impl From<Time> for u64 {
    fn from(time: Time) -> Self {
        time.as_millis()
    }
}

impl From<Duration> for Time {
    fn from(duration: Duration) -> Self {
        Time(duration)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.0.as_secs();
        let (hours, minutes, seconds) = (total / 3600, (total / 60) % 60, total % 60);
        if hours > 0 {
            write!(f, "{}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            write!(f, "{}:{:02}", minutes, seconds)
        }
    }
}

/// Signed offset between two positions, millisecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TimeDelta(i64);

impl TimeDelta {
    pub const ZERO: TimeDelta = TimeDelta(0);

    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub const fn from_secs(secs: i64) -> Self {
        Self(secs.saturating_mul(1000))
    }

    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

impl Add for TimeDelta {
    type Output = TimeDelta;

    fn add(self, rhs: TimeDelta) -> TimeDelta {
        TimeDelta(self.0.saturating_add(rhs.0))
    }
}

impl Neg for TimeDelta {
    type Output = TimeDelta;

    fn neg(self) -> TimeDelta {
        TimeDelta(self.0.saturating_neg())
    }
}

impl fmt::Display for TimeDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}ms", self.0)
    }
}

/// Where a seek request lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekTarget {
    Absolute(Time),
    Relative(TimeDelta),
}

/// Who asked for the seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeekOrigin {
    /// Taps, drags and hardware keys. Refreshes the controls and may be coalesced.
    UserInteracted,
    /// Issued by the core itself (restore, hand-over between backends).
    Programmatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekRequest {
    pub target: SeekTarget,
    pub origin: SeekOrigin,
}

impl SeekRequest {
    pub fn absolute(time: Time, origin: SeekOrigin) -> Self {
        Self {
            target: SeekTarget::Absolute(time),
            origin,
        }
    }

    pub fn relative(delta: TimeDelta, origin: SeekOrigin) -> Self {
        Self {
            target: SeekTarget::Relative(delta),
            origin,
        }
    }

    /// Relative user seeks are summed when they arrive in a burst.
    pub fn is_coalescable(&self) -> bool {
        matches!(self.target, SeekTarget::Relative(_)) && self.origin == SeekOrigin::UserInteracted
    }

    /// Signed target position in milliseconds, before any range check.
    pub fn target_millis(&self, current: Time) -> i64 {
        match self.target {
            SeekTarget::Absolute(time) => time.as_signed_millis(),
            SeekTarget::Relative(delta) => current.as_signed_millis().saturating_add(delta.as_millis()),
        }
    }

    /// Resolves against the current position.
    ///
    /// # Errors
    ///
    /// [`SeekError::OutOfRange`] when the target is negative or past a known
    /// duration. The error carries the nearest valid bound.
    pub fn resolve(&self, current: Time, duration: Option<Time>) -> Result<Time, SeekError> {
        let requested_ms = self.target_millis(current);
        if requested_ms < 0 {
            return Err(SeekError::OutOfRange {
                requested_ms,
                bound: Time::ZERO,
            });
        }
        let target = Time::from_millis(requested_ms.unsigned_abs());
        match duration {
            Some(limit) if target > limit => Err(SeekError::OutOfRange {
                requested_ms,
                bound: limit,
            }),
            _ => Ok(target),
        }
    }

    /// Resolves and clamps into the valid range instead of failing.
    pub fn clamped(&self, current: Time, duration: Option<Time>) -> Time {
        match self.resolve(current, duration) {
            Ok(target) => target,
            Err(SeekError::OutOfRange { bound, .. }) => bound,
            Err(_) => current,
        }
    }
}
