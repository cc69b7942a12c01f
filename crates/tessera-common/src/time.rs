//! Hybrid-time clock primitives
//!
//! A `HybridTime` combines physical time in microseconds with a small
//! logical counter so distributed events can be totally ordered even when
//! wall clocks collide. Restoration cut-offs compare against hybrid times
//! derived from physical timestamps, wall-clock timestamps, or relative
//! intervals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::{Error, Result};

/// Number of low bits reserved for the logical counter
const BITS_FOR_LOGICAL: u32 = 12;

/// Logical clock value: physical microseconds shifted left, logical
/// counter in the low bits. Totally ordered.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct HybridTime(u64);

impl HybridTime {
    /// The zero hybrid time, before any event
    pub const MIN: Self = Self(0);

    /// Build from physical microseconds with a zero logical component
    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros << BITS_FOR_LOGICAL)
    }

    /// Build from a raw packed value
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Build from a wall-clock timestamp
    pub fn from_datetime(ts: &DateTime<Utc>) -> Result<Self> {
        let micros = ts.timestamp_micros();
        if micros < 0 {
            return Err(Error::invalid_argument(format!(
                "timestamp {ts} is before the epoch"
            )));
        }
        Ok(Self::from_micros(micros as u64))
    }

    /// The physical component in microseconds
    #[must_use]
    pub const fn physical_micros(&self) -> u64 {
        self.0 >> BITS_FOR_LOGICAL
    }

    /// The logical counter component
    #[must_use]
    pub const fn logical(&self) -> u64 {
        self.0 & ((1 << BITS_FOR_LOGICAL) - 1)
    }

    /// The raw packed value
    #[must_use]
    pub const fn as_raw(&self) -> u64 {
        self.0
    }

    /// This time moved back by `interval`, or `None` on underflow
    #[must_use]
    pub fn checked_sub(&self, interval: Duration) -> Option<Self> {
        let micros = u64::try_from(interval.as_micros()).ok()?;
        self.physical_micros()
            .checked_sub(micros)
            .map(Self::from_micros)
    }
}

impl fmt::Debug for HybridTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HybridTime({}.{})",
            self.physical_micros(),
            self.logical()
        )
    }
}

impl fmt::Display for HybridTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic source of hybrid times
pub trait Clock: Send + Sync {
    /// Current hybrid time; successive calls never go backwards
    fn now(&self) -> HybridTime;
}

/// Wall-clock-backed hybrid clock.
///
/// If the wall clock stalls or steps backwards, the logical counter keeps
/// issued times strictly increasing.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicU64,
}

impl SystemClock {
    /// Create a new system clock
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> HybridTime {
        let physical = HybridTime::from_micros(Utc::now().timestamp_micros().max(0) as u64);
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let next = physical.as_raw().max(prev + 1);
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return HybridTime::from_raw(next),
                Err(actual) => prev = actual,
            }
        }
    }
}

/// Deterministic clock advanced by hand, for tests and simulation
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Create a clock frozen at the given time
    #[must_use]
    pub fn new(start: HybridTime) -> Self {
        Self {
            now: AtomicU64::new(start.as_raw()),
        }
    }

    /// Move the clock forward by `interval`
    pub fn advance(&self, interval: Duration) {
        let micros = u64::try_from(interval.as_micros()).unwrap_or(u64::MAX);
        self.now
            .fetch_add(HybridTime::from_micros(micros).as_raw(), Ordering::Relaxed);
    }

    /// Set the clock to an absolute time
    pub fn set(&self, time: HybridTime) {
        self.now.store(time.as_raw(), Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> HybridTime {
        HybridTime::from_raw(self.now.load(Ordering::Relaxed))
    }
}

/// Point in logical time a restoration should roll back to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestoreTarget {
    /// An absolute hybrid time
    Absolute(HybridTime),
    /// A wall-clock timestamp
    WallClock(DateTime<Utc>),
    /// An interval measured back from the time the restore request is
    /// processed by the leader
    Relative(Duration),
}

impl RestoreTarget {
    /// Resolve to a concrete hybrid time.
    ///
    /// `now` must be taken when the restore request is processed, not at
    /// snapshot creation.
    pub fn resolve(&self, now: HybridTime) -> Result<HybridTime> {
        match self {
            Self::Absolute(ht) => Ok(*ht),
            Self::WallClock(ts) => HybridTime::from_datetime(ts),
            Self::Relative(interval) => now.checked_sub(*interval).ok_or_else(|| {
                Error::invalid_argument(format!(
                    "restore interval {interval:?} reaches before the epoch"
                ))
            }),
        }
    }
}
