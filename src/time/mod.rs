//! Tick-based timeouts.
//!
//! All kernel deadlines are counted in scheduler ticks. A blocking call takes
//! a [`Timeout`], which is either an immediate non-blocking request, an
//! unbounded wait, or a tick count. Zero ticks is the same as not waiting.

pub mod timeout;

pub(crate) use timeout::{TimeoutKey, TimeoutQueue};

/// How long a blocking call may wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Return immediately if the operation cannot complete
    NoWait,
    /// Wait until the operation completes
    Forever,
    /// Wait at most this many ticks
    Ticks(u64),
}

impl Timeout {
    /// Tick timeout; zero ticks normalizes to [`Timeout::NoWait`].
    pub const fn ticks(ticks: u64) -> Self {
        if ticks == 0 {
            Timeout::NoWait
        } else {
            Timeout::Ticks(ticks)
        }
    }

    /// Convert a wall-clock duration, rounding up to whole ticks.
    pub fn from_duration(duration: Duration, ticks_per_sec: u32) -> Self {
        let nanos = duration.as_nanos_u128() * ticks_per_sec as u128;
        let ticks = (nanos + 999_999_999) / 1_000_000_000;
        Self::ticks(ticks.min(u64::MAX as u128) as u64)
    }

    pub fn is_no_wait(self) -> bool {
        matches!(self, Timeout::NoWait | Timeout::Ticks(0))
    }

    /// Ticks to arm, or `None` when no timer is needed.
    pub(crate) fn as_ticks(self) -> Option<u64> {
        match self {
            Timeout::Ticks(ticks) if ticks > 0 => Some(ticks),
            _ => None,
        }
    }
}

/// A duration of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Duration(u64);

impl Duration {
    /// Create a duration from nanoseconds.
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Create a duration from microseconds, saturating at `u64::MAX` nanoseconds.
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros.saturating_mul(1_000))
    }

    /// Create a duration from milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1_000_000))
    }

    /// Create a duration from seconds.
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1_000_000_000))
    }

    /// Get nanoseconds as u128 for calculations.
    pub const fn as_nanos_u128(self) -> u128 {
        self.0 as u128
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_ticks_is_no_wait() {
        assert_eq!(Timeout::ticks(0), Timeout::NoWait);
        assert!(Timeout::Ticks(0).is_no_wait());
        assert_eq!(Timeout::Ticks(0).as_ticks(), None);
        assert_eq!(Timeout::Forever.as_ticks(), None);
        assert_eq!(Timeout::ticks(5).as_ticks(), Some(5));
    }

    #[test]
    fn test_duration_rounds_up() {
        assert_eq!(
            Timeout::from_duration(Duration::from_secs(1), 100),
            Timeout::Ticks(100)
        );
        assert_eq!(
            Timeout::from_duration(Duration::from_millis(15), 100),
            Timeout::Ticks(2)
        );
        assert_eq!(
            Timeout::from_duration(Duration::from_nanos(0), 100),
            Timeout::NoWait
        );
    }

    #[test]
    fn test_huge_duration_saturates() {
        assert_eq!(Duration::from_secs(u64::MAX), Duration::from_nanos(u64::MAX));
        assert_eq!(Duration::from_millis(u64::MAX), Duration::from_nanos(u64::MAX));
        assert_eq!(Duration::from_micros(u64::MAX), Duration::from_nanos(u64::MAX));
        assert_eq!(
            Timeout::from_duration(Duration::from_secs(u64::MAX), 100),
            Timeout::Ticks(u64::MAX / 10_000_000 + 1)
        );
    }
}
