//! Throttled watermark insertion.
//!
//! [`PunctuationInserter`] sits at the head of a partition's stream: it
//! forwards items, drops the ones that arrive behind the watermark it has
//! already requested, and periodically broadcasts a new watermark into
//! the partition's [`Outbox`].
//!
//! Emitting a watermark on every new top event time would be pure
//! overhead, so emission is throttled on two axes:
//!
//! 1. **Event distance**: a new watermark goes out once the ideal value
//!    has advanced by at least `event_seq_throttle` since the last one.
//! 2. **Wall clock**: while an advance is pending, a new watermark goes
//!    out at most `time_throttle` nanoseconds after the last one. This
//!    half only fires if the scheduler keeps calling
//!    [`on_idle`](PunctuationInserter::on_idle) between items.
//!
//! Emitted watermark values are strictly increasing for the lifetime of
//! the inserter; the throttle gates may reset without an emission, but a
//! duplicate or regressing watermark is never produced.

use std::marker::PhantomData;

use crate::streaming::StreamElement;
use crate::time::{Clock, MonotonicClock, Watermark, WatermarkPolicy, NO_EVENT_SEQ};

use super::error::ExecutionError;
use super::outbox::{Destination, Outbox};

/// What became of an item handed to
/// [`process_item`](PunctuationInserter::process_item).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The item was broadcast into the outbox.
    Forwarded,
    /// The item arrived behind the requested watermark and was dropped.
    /// Silent data loss by design, governed by the configured policy lag
    /// and throttles.
    DroppedLate,
}

/// Counters kept by a [`PunctuationInserter`] over its lifetime.
#[derive(Debug, Clone, Copy, Default)]
pub struct PunctuationMetrics {
    /// Items broadcast into the outbox.
    pub items_forwarded: u64,
    /// Late items dropped.
    pub late_items_dropped: u64,
    /// Watermarks broadcast into the outbox.
    pub watermarks_emitted: u64,
}

/// Per-partition watermark inserter.
///
/// Created once per processor instance and exclusively owned by it; all
/// counters are monotonic non-decreasing for the instance's lifetime.
///
/// # Example
///
/// ```rust
/// use conflux_core::execution::{ItemOutcome, Outbox, PunctuationInserter};
/// use conflux_core::streaming::StreamElement;
/// use conflux_core::time::FixedLagPolicy;
///
/// let mut outbox: Outbox<StreamElement<i64>> = Outbox::uniform(1, 16);
/// let mut inserter =
///     PunctuationInserter::new(|item: &i64| *item, FixedLagPolicy::new(0), 0, 0).unwrap();
///
/// // An item at event time 10 advances the watermark to 10 ...
/// assert_eq!(inserter.process_item(10, &mut outbox), Ok(ItemOutcome::Forwarded));
/// // ... so a later item at event time 3 is late and dropped.
/// assert_eq!(inserter.process_item(3, &mut outbox), Ok(ItemOutcome::DroppedLate));
/// ```
pub struct PunctuationInserter<T, P, F, C = MonotonicClock> {
    /// Event-time extraction, supplied by the pipeline author.
    extract_seq: F,
    /// Maps the top observed event time to the ideal watermark.
    policy: P,
    /// Minimum event-time advance between emissions.
    event_seq_throttle: i64,
    /// Maximum wall-clock nanoseconds between emissions while an advance
    /// is pending.
    time_throttle: i64,
    clock: C,

    /// Highest event time observed on this partition.
    highest_input_seq: i64,
    /// Highest ideal watermark requested by the policy so far. The
    /// late-item boundary: items strictly below this are dropped.
    highest_requested_punc: i64,
    /// Last watermark actually emitted.
    last_emitted_punc: i64,
    /// Event-distance gate: next emission once the requested watermark
    /// reaches this.
    next_emission_at_seq: i64,
    /// Wall-clock gate: next emission once the clock reaches this.
    next_emission_at_time: i64,

    metrics: PunctuationMetrics,
    _item: PhantomData<fn(&T) -> i64>,
}

impl<T, P, F> PunctuationInserter<T, P, F, MonotonicClock>
where
    P: WatermarkPolicy,
    F: Fn(&T) -> i64,
{
    /// Creates an inserter driven by the system monotonic clock.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::InvalidThrottle`] if either throttle is
    /// negative.
    pub fn new(
        extract_seq: F,
        policy: P,
        event_seq_throttle: i64,
        time_throttle: i64,
    ) -> Result<Self, ExecutionError> {
        Self::with_clock(
            extract_seq,
            policy,
            event_seq_throttle,
            time_throttle,
            MonotonicClock::new(),
        )
    }
}

impl<T, P, F, C> PunctuationInserter<T, P, F, C>
where
    P: WatermarkPolicy,
    F: Fn(&T) -> i64,
    C: Clock,
{
    /// Creates an inserter with an injected clock.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::InvalidThrottle`] if either throttle is
    /// negative.
    pub fn with_clock(
        extract_seq: F,
        policy: P,
        event_seq_throttle: i64,
        time_throttle: i64,
        clock: C,
    ) -> Result<Self, ExecutionError> {
        if event_seq_throttle < 0 {
            return Err(ExecutionError::InvalidThrottle {
                name: "event_seq_throttle",
                value: event_seq_throttle,
            });
        }
        if time_throttle < 0 {
            return Err(ExecutionError::InvalidThrottle {
                name: "time_throttle",
                value: time_throttle,
            });
        }
        Ok(Self {
            extract_seq,
            policy,
            event_seq_throttle,
            time_throttle,
            clock,
            highest_input_seq: NO_EVENT_SEQ,
            highest_requested_punc: NO_EVENT_SEQ,
            last_emitted_punc: NO_EVENT_SEQ,
            next_emission_at_seq: NO_EVENT_SEQ,
            next_emission_at_time: NO_EVENT_SEQ,
            metrics: PunctuationMetrics::default(),
            _item: PhantomData,
        })
    }

    /// Processes one item: drop it if late, otherwise broadcast it,
    /// possibly preceded by a new watermark.
    ///
    /// The watermark (if any) is emitted before the item that advanced
    /// it, so a downstream consumer never sees an item ahead of the
    /// watermark it triggered.
    ///
    /// # Errors
    ///
    /// Returns the item back when the outbox is broadcast-saturated, with
    /// no state mutated; the caller suspends forward progress for this
    /// emission and retries on a later scheduling turn.
    pub fn process_item(
        &mut self,
        item: T,
        outbox: &mut Outbox<StreamElement<T>>,
    ) -> Result<ItemOutcome, T>
    where
        T: Clone,
    {
        let seq = (self.extract_seq)(&item);

        // Strictly below the requested watermark is late; equal is on
        // time.
        if seq < self.highest_requested_punc {
            self.metrics.late_items_dropped += 1;
            tracing::trace!(seq, watermark = self.highest_requested_punc, "dropping late item");
            return Ok(ItemOutcome::DroppedLate);
        }

        if outbox.has_reached_limit(Destination::Broadcast) {
            return Err(item);
        }

        if seq > self.highest_input_seq {
            self.highest_input_seq = seq;
            self.maybe_emit(self.policy.ideal_watermark(self.highest_input_seq), outbox);
        }

        outbox.add(Destination::Broadcast, StreamElement::Item(item));
        self.metrics.items_forwarded += 1;
        Ok(ItemOutcome::Forwarded)
    }

    /// Idle tick: attempt an emission with no new observation.
    ///
    /// The scheduler must call this periodically even when no items
    /// arrive, or the wall-clock half of the throttle cannot fire.
    /// Returns whether a watermark was emitted. A broadcast-saturated
    /// outbox makes this a no-op (state untouched, retried later).
    pub fn on_idle(&mut self, outbox: &mut Outbox<StreamElement<T>>) -> bool
    where
        T: Clone,
    {
        if outbox.has_reached_limit(Destination::Broadcast) {
            return false;
        }
        self.maybe_emit(self.policy.ideal_watermark(NO_EVENT_SEQ), outbox)
    }

    /// Returns the last emitted watermark, if any.
    #[must_use]
    pub fn last_emitted(&self) -> Option<Watermark> {
        if self.last_emitted_punc == NO_EVENT_SEQ {
            None
        } else {
            Some(Watermark::new(self.last_emitted_punc))
        }
    }

    /// Returns the highest event time observed so far, or
    /// [`NO_EVENT_SEQ`] if nothing was observed.
    #[must_use]
    pub fn top_observed_seq(&self) -> i64 {
        self.highest_input_seq
    }

    /// Returns the lifetime counters.
    #[must_use]
    pub fn metrics(&self) -> &PunctuationMetrics {
        &self.metrics
    }

    /// Runs one emission attempt for the candidate watermark value.
    ///
    /// The candidate first raises `highest_requested_punc` (never lowers
    /// it). The attempt proceeds once either throttle gate is open; a
    /// proceeding attempt always re-arms both gates, but only emits if
    /// the requested watermark actually advanced past the last emission.
    fn maybe_emit(&mut self, candidate: i64, outbox: &mut Outbox<StreamElement<T>>) -> bool
    where
        T: Clone,
    {
        self.highest_requested_punc = candidate.max(self.highest_requested_punc);

        let now = self.clock.now_nanos();
        if self.highest_requested_punc >= self.next_emission_at_seq
            || now >= self.next_emission_at_time
        {
            self.next_emission_at_seq = self
                .highest_requested_punc
                .saturating_add(self.event_seq_throttle);
            self.next_emission_at_time = now.saturating_add(self.time_throttle);

            if self.highest_requested_punc > self.last_emitted_punc {
                let watermark = Watermark::new(self.highest_requested_punc);
                outbox.add(Destination::Broadcast, StreamElement::Watermark(watermark));
                self.last_emitted_punc = self.highest_requested_punc;
                self.metrics.watermarks_emitted += 1;
                tracing::trace!(seq = watermark.seq(), "emitted watermark");
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{FixedLagPolicy, ManualClock};

    type Inserter<'a> =
        PunctuationInserter<i64, FixedLagPolicy, fn(&i64) -> i64, &'a ManualClock>;

    fn seq_of(item: &i64) -> i64 {
        *item
    }

    fn inserter(
        lag: i64,
        event_seq_throttle: i64,
        time_throttle: i64,
        clock: &ManualClock,
    ) -> Inserter<'_> {
        PunctuationInserter::with_clock(
            seq_of as fn(&i64) -> i64,
            FixedLagPolicy::new(lag),
            event_seq_throttle,
            time_throttle,
            clock,
        )
        .unwrap()
    }

    /// Drains every element of bucket 0 for assertions.
    fn drain(outbox: &mut Outbox<StreamElement<i64>>) -> Vec<StreamElement<i64>> {
        let mut out = Vec::new();
        while let Some(element) = outbox.pop(0) {
            out.push(element);
        }
        out
    }

    #[test]
    fn test_negative_throttles_rejected() {
        let err = PunctuationInserter::<i64, _, _>::new(seq_of, FixedLagPolicy::new(0), -1, 0)
            .err()
            .unwrap();
        assert_eq!(
            err,
            ExecutionError::InvalidThrottle {
                name: "event_seq_throttle",
                value: -1
            }
        );

        let err = PunctuationInserter::<i64, _, _>::new(seq_of, FixedLagPolicy::new(0), 0, -7)
            .err()
            .unwrap();
        assert_eq!(
            err,
            ExecutionError::InvalidThrottle {
                name: "time_throttle",
                value: -7
            }
        );
    }

    #[test]
    fn test_watermark_precedes_item_that_advanced_it() {
        let clock = ManualClock::new(0);
        let mut ins = inserter(0, 0, 0, &clock);
        let mut outbox = Outbox::uniform(1, 16);

        assert_eq!(ins.process_item(10, &mut outbox), Ok(ItemOutcome::Forwarded));
        assert_eq!(
            drain(&mut outbox),
            vec![
                StreamElement::Watermark(Watermark::new(10)),
                StreamElement::Item(10),
            ]
        );
    }

    #[test]
    fn test_late_item_dropped_not_forwarded() {
        let clock = ManualClock::new(0);
        let mut ins = inserter(0, 0, 0, &clock);
        let mut outbox = Outbox::uniform(1, 16);

        ins.process_item(10, &mut outbox).unwrap();
        let _ = drain(&mut outbox);

        assert_eq!(ins.process_item(3, &mut outbox), Ok(ItemOutcome::DroppedLate));
        assert!(drain(&mut outbox).is_empty());
        assert_eq!(ins.metrics().late_items_dropped, 1);
    }

    #[test]
    fn test_item_equal_to_watermark_is_on_time() {
        let clock = ManualClock::new(0);
        let mut ins = inserter(0, 0, 0, &clock);
        let mut outbox = Outbox::uniform(1, 16);

        ins.process_item(10, &mut outbox).unwrap();
        let _ = drain(&mut outbox);

        // Exactly at the requested watermark: accepted, no new watermark.
        assert_eq!(ins.process_item(10, &mut outbox), Ok(ItemOutcome::Forwarded));
        assert_eq!(drain(&mut outbox), vec![StreamElement::Item(10)]);
    }

    #[test]
    fn test_zero_throttles_emit_every_advance() {
        let clock = ManualClock::new(0);
        let mut ins = inserter(0, 0, 0, &clock);
        let mut outbox = Outbox::uniform(1, 64);

        for seq in [1i64, 2, 3, 4] {
            ins.process_item(seq, &mut outbox).unwrap();
        }
        let watermarks: Vec<i64> = drain(&mut outbox)
            .iter()
            .filter_map(StreamElement::as_watermark)
            .map(|wm| wm.seq())
            .collect();
        assert_eq!(watermarks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_emitted_watermarks_strictly_increase() {
        let clock = ManualClock::new(0);
        let mut ins = inserter(0, 0, 0, &clock);
        let mut outbox = Outbox::uniform(1, 64);

        // Repeats and regressions in the input must not produce
        // duplicate or decreasing watermarks.
        for seq in [5i64, 5, 7, 6, 7, 9] {
            let _ = ins.process_item(seq, &mut outbox);
        }
        let watermarks: Vec<i64> = drain(&mut outbox)
            .iter()
            .filter_map(StreamElement::as_watermark)
            .map(|wm| wm.seq())
            .collect();
        assert_eq!(watermarks, vec![5, 7, 9]);
        assert_eq!(ins.metrics().watermarks_emitted, 3);
    }

    #[test]
    fn test_event_seq_throttle_skips_intermediate_values() {
        let clock = ManualClock::new(0);
        // Large time throttle so only the event-distance gate can open.
        let mut ins = inserter(0, 5, i64::MAX, &clock);
        let mut outbox = Outbox::uniform(1, 64);

        ins.process_item(1, &mut outbox).unwrap(); // gate open (first attempt)
        ins.process_item(3, &mut outbox).unwrap(); // 3 < 1 + 5: gated
        ins.process_item(6, &mut outbox).unwrap(); // 6 >= 6: emit

        let watermarks: Vec<i64> = drain(&mut outbox)
            .iter()
            .filter_map(StreamElement::as_watermark)
            .map(|wm| wm.seq())
            .collect();
        assert_eq!(watermarks, vec![1, 6]);
    }

    #[test]
    fn test_time_throttle_fires_on_idle_tick() {
        let clock = ManualClock::new(0);
        // Event gate effectively closed after the first emission.
        let mut ins = inserter(0, i64::MAX, 100, &clock);
        let mut outbox = Outbox::uniform(1, 64);

        ins.process_item(1, &mut outbox).unwrap(); // emits wm(1), arms time gate at 100
        ins.process_item(2, &mut outbox).unwrap(); // pending advance, both gates closed
        assert!(!ins.on_idle(&mut outbox)); // clock still at 0

        clock.advance(99);
        assert!(!ins.on_idle(&mut outbox));

        clock.advance(1); // now == 100
        assert!(ins.on_idle(&mut outbox));

        let watermarks: Vec<i64> = drain(&mut outbox)
            .iter()
            .filter_map(StreamElement::as_watermark)
            .map(|wm| wm.seq())
            .collect();
        assert_eq!(watermarks, vec![1, 2]);
    }

    #[test]
    fn test_idle_tick_without_pending_advance_emits_nothing() {
        let clock = ManualClock::new(0);
        let mut ins = inserter(0, 0, 0, &clock);
        let mut outbox = Outbox::uniform(1, 16);

        assert!(!ins.on_idle(&mut outbox));
        assert!(drain(&mut outbox).is_empty());

        ins.process_item(4, &mut outbox).unwrap();
        let _ = drain(&mut outbox);
        // Watermark 4 already emitted; idle tick has nothing newer.
        assert!(!ins.on_idle(&mut outbox));
        assert!(drain(&mut outbox).is_empty());
    }

    #[test]
    fn test_saturated_outbox_returns_item_untouched() {
        let clock = ManualClock::new(0);
        let mut ins = inserter(0, 0, 0, &clock);
        // Limit 0: every broadcast is vetoed.
        let mut outbox = Outbox::uniform(1, 0);

        assert_eq!(ins.process_item(10, &mut outbox), Err(10));
        assert_eq!(ins.top_observed_seq(), NO_EVENT_SEQ);
        assert_eq!(ins.metrics().items_forwarded, 0);
        assert!(!ins.on_idle(&mut outbox));
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_retry_after_drain_succeeds() {
        let clock = ManualClock::new(0);
        let mut ins = inserter(0, 0, 0, &clock);
        let mut outbox = Outbox::uniform(1, 1);

        ins.process_item(1, &mut outbox).unwrap();
        // Bucket now holds wm(1) + item(1): at limit.
        let item = ins.process_item(2, &mut outbox).unwrap_err();

        let _ = drain(&mut outbox);
        assert_eq!(ins.process_item(item, &mut outbox), Ok(ItemOutcome::Forwarded));
        assert_eq!(
            drain(&mut outbox),
            vec![
                StreamElement::Watermark(Watermark::new(2)),
                StreamElement::Item(2),
            ]
        );
    }

    #[test]
    fn test_policy_lag_defers_lateness() {
        let clock = ManualClock::new(0);
        let mut ins = inserter(5, 0, 0, &clock);
        let mut outbox = Outbox::uniform(1, 64);

        ins.process_item(10, &mut outbox).unwrap(); // requested watermark = 5
        assert_eq!(ins.last_emitted(), Some(Watermark::new(5)));

        // 5 <= seq < 10 trails the top but is inside the lag: on time.
        assert_eq!(ins.process_item(7, &mut outbox), Ok(ItemOutcome::Forwarded));
        assert_eq!(ins.process_item(4, &mut outbox), Ok(ItemOutcome::DroppedLate));
    }

    #[test]
    fn test_counters_are_monotonic() {
        let clock = ManualClock::new(0);
        let mut ins = inserter(0, 0, 0, &clock);
        let mut outbox = Outbox::uniform(1, 64);

        ins.process_item(1, &mut outbox).unwrap();
        ins.process_item(2, &mut outbox).unwrap();
        let _ = ins.process_item(0, &mut outbox);

        let metrics = *ins.metrics();
        assert_eq!(metrics.items_forwarded, 2);
        assert_eq!(metrics.watermarks_emitted, 2);
        assert_eq!(metrics.late_items_dropped, 1);
    }
}
