//! Utilities for telling and faking time
//!
//! Token expiry is expressed in whole seconds since the Unix epoch, so the
//! types here work at second granularity. A [`TestClock`] can be shared
//! between a component under test and the test itself so that time can be
//! advanced from the outside.

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_must_use
)]
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

use std::{
    ops,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime},
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Unix time
///
/// Unix time as represented by the number of seconds elapsed since the
/// beginning of the Unix epoch on 1970/01/01 at 00:00:00 UTC.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[repr(transparent)]
pub struct UnixTime(pub u64);

impl UnixTime {
    /// The beginning of the Unix epoch
    ///
    /// Any token whose expiry cannot be determined is treated as expiring
    /// at this instant.
    pub const EPOCH: Self = Self(0);
}

impl From<SystemTime> for UnixTime {
    /// Converts a system time, clamping times before the epoch to the epoch
    #[inline]
    fn from(t: SystemTime) -> Self {
        let time = t
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        UnixTime(time)
    }
}

/// A duration in whole seconds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[repr(transparent)]
pub struct DurationSecs(pub u64);

impl DurationSecs {
    /// Converts a duration, rounding any fractional second up
    ///
    /// A margin of 500 ms must still hold back a token by a full second,
    /// as expiry claims have no sub-second precision.
    #[inline]
    pub fn from_duration_ceil(d: Duration) -> Self {
        let secs = d.as_secs();
        if d.subsec_nanos() > 0 {
            Self(secs.saturating_add(1))
        } else {
            Self(secs)
        }
    }
}

impl From<Duration> for DurationSecs {
    /// Converts a duration, truncating any fractional second
    #[inline]
    fn from(d: Duration) -> Self {
        Self(d.as_secs())
    }
}

impl From<DurationSecs> for Duration {
    #[inline]
    fn from(d: DurationSecs) -> Self {
        Duration::from_secs(d.0)
    }
}

impl ops::Add<DurationSecs> for UnixTime {
    type Output = UnixTime;

    #[inline]
    fn add(self, rhs: DurationSecs) -> Self::Output {
        UnixTime(self.0.saturating_add(rhs.0))
    }
}

impl ops::Sub<DurationSecs> for UnixTime {
    type Output = UnixTime;

    /// Subtracts a duration, saturating at the epoch
    #[inline]
    fn sub(self, rhs: DurationSecs) -> Self::Output {
        UnixTime(self.0.saturating_sub(rhs.0))
    }
}

impl ops::Sub<UnixTime> for UnixTime {
    type Output = DurationSecs;

    /// The time elapsed between two instants, or zero if `rhs` is later
    #[inline]
    fn sub(self, rhs: UnixTime) -> Self::Output {
        DurationSecs(self.0.saturating_sub(rhs.0))
    }
}

#[cfg(any(feature = "serde", doc))]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl Serialize for UnixTime {
    #[inline]
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

#[cfg(any(feature = "serde", doc))]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl<'de> Deserialize<'de> for UnixTime {
    #[inline]
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = u64::deserialize(deserializer)?;
        Ok(Self(s))
    }
}

#[cfg(any(feature = "serde", doc))]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl Serialize for DurationSecs {
    #[inline]
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

#[cfg(any(feature = "serde", doc))]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl<'de> Deserialize<'de> for DurationSecs {
    #[inline]
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = u64::deserialize(deserializer)?;
        Ok(Self(s))
    }
}

/// Represents a clock, which can tell the current time
pub trait Clock {
    /// Gets the current time according to this clock
    fn now(&self) -> UnixTime;
}

impl<C: Clock + ?Sized> Clock for &C {
    #[inline]
    fn now(&self) -> UnixTime {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    #[inline]
    fn now(&self) -> UnixTime {
        (**self).now()
    }
}

/// The system clock as provided by `std::time::SystemTime`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct System;

impl Clock for System {
    #[inline]
    fn now(&self) -> UnixTime {
        UnixTime::from(SystemTime::now())
    }
}

/// A test clock which maintains the current time as shared internal state
///
/// Clones observe the same time, so a clone handed to the code under test
/// moves forward when the test advances its own copy.
#[derive(Clone, Debug, Default)]
pub struct TestClock(Arc<AtomicU64>);

impl Clock for TestClock {
    #[inline]
    fn now(&self) -> UnixTime {
        UnixTime(self.0.load(Ordering::Acquire))
    }
}

impl TestClock {
    /// Creates a new test clock with the specified time
    #[inline]
    pub fn new(time: UnixTime) -> Self {
        Self(Arc::new(AtomicU64::new(time.0)))
    }

    /// Updates the clock's current time to `val`
    pub fn set(&self, val: UnixTime) {
        self.0.store(val.0, Ordering::Release);
    }

    /// Advances the clock's current time by `inc`
    pub fn advance(&self, inc: DurationSecs) {
        self.0.fetch_add(inc.0, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtraction_saturates_at_epoch() {
        assert_eq!(UnixTime(3) - DurationSecs(5), UnixTime::EPOCH);
        assert_eq!(UnixTime(3) - UnixTime(5), DurationSecs(0));
        assert_eq!(UnixTime(10) - UnixTime(4), DurationSecs(6));
    }

    #[test]
    fn fractional_margin_rounds_up() {
        assert_eq!(
            DurationSecs::from_duration_ceil(Duration::from_millis(500)),
            DurationSecs(1)
        );
        assert_eq!(
            DurationSecs::from_duration_ceil(Duration::from_secs(5)),
            DurationSecs(5)
        );
        assert_eq!(
            DurationSecs::from(Duration::from_millis(5_900)),
            DurationSecs(5)
        );
    }

    #[test]
    fn test_clock_clones_share_time() {
        let clock = TestClock::new(UnixTime(100));
        let observer = clock.clone();

        clock.advance(DurationSecs(20));
        assert_eq!(observer.now(), UnixTime(120));

        observer.set(UnixTime(7));
        assert_eq!(clock.now(), UnixTime(7));
    }

    fn read<C: Clock>(clock: C) -> UnixTime {
        clock.now()
    }

    #[test]
    fn borrowed_and_shared_clocks_delegate() {
        let clock = TestClock::new(UnixTime(100));
        assert_eq!(read(&clock), UnixTime(100));

        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        clock.advance(DurationSecs(5));
        assert_eq!(read(shared.clone()), UnixTime(105));
        assert_eq!(read(&*shared), UnixTime(105));
    }

    #[test]
    fn system_clock_is_after_epoch() {
        assert!(System.now() > UnixTime::EPOCH);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn durations_serialize_as_seconds() {
        let margin: DurationSecs = serde_json::from_str("30").unwrap();
        assert_eq!(margin, DurationSecs(30));
        assert_eq!(serde_json::to_string(&UnixTime(42)).unwrap(), "42");
    }
}
