//! # Event Time
//!
//! Event-time progress tracking for the execution core.
//!
//! ## Concepts
//!
//! - **Event time**: the sequence value carried in the payload, distinct
//!   from wall-clock processing time.
//! - **Watermark**: a monotonic assertion that no item with an earlier
//!   event time will arrive on a stream. Watermarks decide when
//!   time-keyed downstream state may be finalized and purged.
//!
//! ## Watermark Generation
//!
//! The [`WatermarkPolicy`] trait maps the highest observed event time to
//! the ideal watermark for that instant. Throttling of actual emissions is
//! the job of [`PunctuationInserter`](crate::execution::PunctuationInserter);
//! the policy itself is a pure query.
//!
//! ```rust
//! use conflux_core::time::{FixedLagPolicy, Watermark, WatermarkPolicy};
//!
//! // Allow events to trail the observed maximum by up to 1000 units.
//! let policy = FixedLagPolicy::new(1000);
//! assert_eq!(policy.ideal_watermark(5000), 4000);
//!
//! let wm = Watermark::new(4000);
//! assert!(wm.is_late(3999));
//! assert!(!wm.is_late(4000));
//! ```

mod clock;
mod policy;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use policy::{FixedLagPolicy, WatermarkPolicy};

use std::fmt;

/// Sentinel event-time value meaning "nothing observed yet".
///
/// Used as the initial value of every event-time counter and as the
/// argument to [`WatermarkPolicy::ideal_watermark`] on idle ticks.
pub const NO_EVENT_SEQ: i64 = i64::MIN;

/// A watermark asserting event-time progress.
///
/// Wraps a 64-bit monotonic sequence number. A watermark with sequence
/// `n` asserts that no future item with event time `<= n` will arrive on
/// the stream that carried it. Equality and hashing consider the sequence
/// only.
///
/// # Example
///
/// ```rust
/// use conflux_core::time::Watermark;
///
/// let watermark = Watermark::new(1000);
/// assert!(watermark.is_late(999));   // strictly before the watermark
/// assert!(!watermark.is_late(1000)); // at the watermark: accepted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Watermark(pub i64);

impl Watermark {
    /// Creates a new watermark with the given sequence number.
    #[inline]
    #[must_use]
    pub fn new(seq: i64) -> Self {
        Self(seq)
    }

    /// Returns the sequence number.
    #[inline]
    #[must_use]
    pub fn seq(&self) -> i64 {
        self.0
    }

    /// Checks whether an event is late relative to this watermark.
    ///
    /// An event is late iff its event time is strictly less than the
    /// watermark sequence. An event equal to the watermark is on time.
    #[inline]
    #[must_use]
    pub fn is_late(&self, event_seq: i64) -> bool {
        event_seq < self.0
    }

    /// Returns the earlier of two watermarks.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }

    /// Returns the later of two watermarks.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        Self(self.0.max(other.0))
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self(NO_EVENT_SEQ)
    }
}

impl From<i64> for Watermark {
    fn from(seq: i64) -> Self {
        Self(seq)
    }
}

impl From<Watermark> for i64 {
    fn from(watermark: Watermark) -> Self {
        watermark.0
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watermark(seq={})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watermark_creation() {
        let wm = Watermark::new(1000);
        assert_eq!(wm.seq(), 1000);
    }

    #[test]
    fn test_late_boundary_is_strict() {
        let wm = Watermark::new(1000);
        assert!(wm.is_late(999));
        assert!(!wm.is_late(1000));
        assert!(!wm.is_late(1001));
    }

    #[test]
    fn test_min_max() {
        let a = Watermark::new(1000);
        let b = Watermark::new(2000);
        assert_eq!(a.min(b), Watermark::new(1000));
        assert_eq!(a.max(b), Watermark::new(2000));
    }

    #[test]
    fn test_ordering_and_equality() {
        assert!(Watermark::new(1) < Watermark::new(2));
        assert_eq!(Watermark::new(7), Watermark::new(7));
    }

    #[test]
    fn test_conversions() {
        let wm = Watermark::from(42i64);
        assert_eq!(wm.seq(), 42);
        let seq: i64 = wm.into();
        assert_eq!(seq, 42);
    }

    #[test]
    fn test_default_is_sentinel() {
        assert_eq!(Watermark::default().seq(), NO_EVENT_SEQ);
    }

    #[test]
    fn test_display_names_seq() {
        assert_eq!(Watermark::new(5).to_string(), "watermark(seq=5)");
    }
}
