//! Watermark policies.
//!
//! A policy maps the highest observed event time on a partition to the
//! ideal watermark for that instant. It is a pure query: all throttling
//! and dedup of actual emissions happens in
//! [`PunctuationInserter`](crate::execution::PunctuationInserter), and any
//! state the heuristic needs (such as a captured
//! [`Clock`](crate::time::Clock)) lives inside the policy value itself.

/// Maps observed event-time progress to an ideal watermark value.
///
/// `top_seq` is the highest event time observed so far on the partition,
/// or [`NO_EVENT_SEQ`](super::NO_EVENT_SEQ) when the attempt is driven by
/// an idle tick rather than a new maximum. The returned value is a
/// candidate only; the caller never lets the effective watermark regress.
pub trait WatermarkPolicy {
    /// Returns the ideal watermark given the top observed event time.
    fn ideal_watermark(&self, top_seq: i64) -> i64;
}

/// Policy that keeps the watermark a fixed distance behind the top
/// observed event time.
///
/// This is the bounded out-of-orderness heuristic: items may trail the
/// observed maximum by up to `lag` event-time units before they are
/// considered late.
///
/// # Example
///
/// ```rust
/// use conflux_core::time::{FixedLagPolicy, WatermarkPolicy};
///
/// let policy = FixedLagPolicy::new(100);
/// assert_eq!(policy.ideal_watermark(1000), 900);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FixedLagPolicy {
    lag: i64,
}

impl FixedLagPolicy {
    /// Creates a policy with the given event-time lag.
    ///
    /// # Panics
    ///
    /// Panics if `lag` is negative.
    #[must_use]
    pub fn new(lag: i64) -> Self {
        assert!(lag >= 0, "lag must be >= 0, got {lag}");
        Self { lag }
    }

    /// Returns the configured lag.
    #[must_use]
    pub fn lag(&self) -> i64 {
        self.lag
    }
}

impl WatermarkPolicy for FixedLagPolicy {
    #[inline]
    fn ideal_watermark(&self, top_seq: i64) -> i64 {
        top_seq.saturating_sub(self.lag)
    }
}

impl<F> WatermarkPolicy for F
where
    F: Fn(i64) -> i64,
{
    #[inline]
    fn ideal_watermark(&self, top_seq: i64) -> i64 {
        self(top_seq)
    }
}
