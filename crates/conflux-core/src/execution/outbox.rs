//! Bounded multi-destination output buffering.
//!
//! Each processor instance owns one [`Outbox`] with one bucket per
//! outbound edge ordinal. The bucket limits are soft: a write past the
//! limit still succeeds, and the limit only matters through
//! [`has_reached_limit`](Outbox::has_reached_limit), which the producing
//! processor consults before emitting. A saturated bucket never blocks a
//! thread; it tells the processor to suspend this emission and retry on
//! a later scheduling turn. That advisory signal is the backpressure
//! mechanism of the whole engine.

use std::collections::VecDeque;

use smallvec::SmallVec;

/// Where an outbox write is headed.
///
/// Either one specific bucket or an identical write to every bucket.
/// Broadcast is how watermarks (and other elements every downstream edge
/// must see) fan out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// The bucket at the given edge ordinal.
    Single(usize),
    /// Every bucket.
    Broadcast,
}

/// Per-processor bounded multi-bucket output buffer.
///
/// Owns `N` independently soft-limited FIFO buckets, one per downstream
/// edge ordinal. Elements are never dropped by this component; capacity
/// saturation is a pure flow-control signal, never an error.
///
/// # Example
///
/// ```rust
/// use conflux_core::execution::{Destination, Outbox};
///
/// let mut outbox: Outbox<&str> = Outbox::uniform(2, 4);
/// outbox.add(Destination::Broadcast, "to-everyone");
/// outbox.add(Destination::Single(0), "to-edge-0");
///
/// assert_eq!(outbox.bucket_len(0), 2);
/// assert_eq!(outbox.bucket_len(1), 1);
/// ```
#[derive(Debug)]
pub struct Outbox<T> {
    /// FIFO bucket per outbound edge ordinal.
    buckets: SmallVec<[VecDeque<T>; 4]>,
    /// Soft capacity limit per bucket.
    limits: SmallVec<[usize; 4]>,
    /// Whether anything was added since the last reset.
    did_add: bool,
}

impl<T> Outbox<T> {
    /// Creates an outbox with one bucket per entry of `limits`.
    #[must_use]
    pub fn with_limits(limits: &[usize]) -> Self {
        Self {
            buckets: limits.iter().map(|_| VecDeque::new()).collect(),
            limits: limits.iter().copied().collect(),
            did_add: false,
        }
    }

    /// Creates an outbox with `bucket_count` buckets sharing one limit.
    #[must_use]
    pub fn uniform(bucket_count: usize, limit: usize) -> Self {
        Self {
            buckets: (0..bucket_count).map(|_| VecDeque::new()).collect(),
            limits: (0..bucket_count).map(|_| limit).collect(),
            did_add: false,
        }
    }

    /// Returns the number of buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Appends an element to the destination bucket(s).
    ///
    /// A broadcast write appends a clone to every bucket. The write
    /// always succeeds; callers are expected to have consulted
    /// [`has_reached_limit`](Self::has_reached_limit) first.
    ///
    /// # Panics
    ///
    /// Panics if a `Single` ordinal is out of range.
    pub fn add(&mut self, destination: Destination, element: T)
    where
        T: Clone,
    {
        self.did_add = true;
        match destination {
            Destination::Single(ordinal) => {
                assert!(
                    ordinal < self.buckets.len(),
                    "ordinal {ordinal} out of range for {} buckets",
                    self.buckets.len()
                );
                self.buckets[ordinal].push_back(element);
            }
            Destination::Broadcast => {
                let n = self.buckets.len();
                if n == 0 {
                    return;
                }
                // Clone into all buckets but the last, which takes the
                // moved value.
                for ordinal in 0..n - 1 {
                    self.buckets[ordinal].push_back(element.clone());
                }
                self.buckets[n - 1].push_back(element);
            }
        }
    }

    /// Reports whether the destination is at or past its limit.
    ///
    /// For a single bucket: true iff its size has reached its configured
    /// limit. For broadcast: true iff **any** bucket has; checking
    /// before a broadcast write avoids a partial fan-out.
    ///
    /// # Panics
    ///
    /// Panics if a `Single` ordinal is out of range.
    #[must_use]
    pub fn has_reached_limit(&self, destination: Destination) -> bool {
        match destination {
            Destination::Single(ordinal) => self.buckets[ordinal].len() >= self.limits[ordinal],
            Destination::Broadcast => self
                .buckets
                .iter()
                .zip(&self.limits)
                .any(|(bucket, &limit)| bucket.len() >= limit),
        }
    }

    /// Removes and returns the oldest element of a bucket.
    ///
    /// The drain side: the scheduler uses this to move buffered elements
    /// into the downstream queue for the edge.
    ///
    /// # Panics
    ///
    /// Panics if `ordinal` is out of range.
    pub fn pop(&mut self, ordinal: usize) -> Option<T> {
        self.buckets[ordinal].pop_front()
    }

    /// Returns the number of buffered elements in a bucket.
    ///
    /// # Panics
    ///
    /// Panics if `ordinal` is out of range.
    #[must_use]
    pub fn bucket_len(&self, ordinal: usize) -> usize {
        self.buckets[ordinal].len()
    }

    /// True if every bucket is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(VecDeque::is_empty)
    }

    /// Whether anything was added since the last
    /// [`reset_did_add`](Self::reset_did_add).
    ///
    /// The scheduler uses this to detect whether a processor emitted
    /// anything during its turn.
    #[must_use]
    pub fn did_add(&self) -> bool {
        self.did_add
    }

    /// Clears the [`did_add`](Self::did_add) flag.
    pub fn reset_did_add(&mut self) {
        self.did_add = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_add_targets_one_bucket() {
        let mut outbox: Outbox<i32> = Outbox::uniform(3, 8);
        outbox.add(Destination::Single(1), 42);

        assert_eq!(outbox.bucket_len(0), 0);
        assert_eq!(outbox.bucket_len(1), 1);
        assert_eq!(outbox.bucket_len(2), 0);
        assert_eq!(outbox.pop(1), Some(42));
        assert_eq!(outbox.pop(1), None);
    }

    #[test]
    fn test_broadcast_appends_to_every_bucket_once() {
        let mut outbox: Outbox<i32> = Outbox::uniform(3, 8);
        outbox.add(Destination::Broadcast, 7);

        for ordinal in 0..3 {
            assert_eq!(outbox.bucket_len(ordinal), 1);
            assert_eq!(outbox.pop(ordinal), Some(7));
        }
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_fifo_within_bucket() {
        let mut outbox: Outbox<i32> = Outbox::uniform(1, 8);
        outbox.add(Destination::Single(0), 1);
        outbox.add(Destination::Single(0), 2);
        outbox.add(Destination::Single(0), 3);

        assert_eq!(outbox.pop(0), Some(1));
        assert_eq!(outbox.pop(0), Some(2));
        assert_eq!(outbox.pop(0), Some(3));
    }

    #[test]
    fn test_per_bucket_limits_checked_independently() {
        let mut outbox: Outbox<i32> = Outbox::with_limits(&[1, 4]);
        assert_eq!(outbox.bucket_count(), 2);

        outbox.add(Destination::Single(0), 1);
        assert!(outbox.has_reached_limit(Destination::Single(0)));
        assert!(!outbox.has_reached_limit(Destination::Single(1)));
    }

    #[test]
    fn test_broadcast_limit_is_any_bucket() {
        let mut outbox: Outbox<i32> = Outbox::with_limits(&[1, 4]);
        assert!(!outbox.has_reached_limit(Destination::Broadcast));

        outbox.add(Destination::Single(0), 1);
        // Only bucket 0 is saturated, but that is enough to veto a
        // broadcast.
        assert!(outbox.has_reached_limit(Destination::Broadcast));
    }

    #[test]
    fn test_limit_is_advisory() {
        let mut outbox: Outbox<i32> = Outbox::uniform(1, 1);
        outbox.add(Destination::Single(0), 1);
        assert!(outbox.has_reached_limit(Destination::Single(0)));

        // A write past the limit still lands; nothing is dropped.
        outbox.add(Destination::Single(0), 2);
        assert_eq!(outbox.bucket_len(0), 2);
    }

    #[test]
    fn test_did_add_tracking() {
        let mut outbox: Outbox<i32> = Outbox::uniform(1, 8);
        assert!(!outbox.did_add());

        outbox.add(Destination::Single(0), 1);
        assert!(outbox.did_add());

        outbox.reset_did_add();
        assert!(!outbox.did_add());
        // Popping is not adding.
        let _ = outbox.pop(0);
        assert!(!outbox.did_add());
    }

    #[test]
    fn test_zero_buckets_broadcast_is_noop() {
        let mut outbox: Outbox<i32> = Outbox::uniform(0, 8);
        assert_eq!(outbox.bucket_count(), 0);
        assert!(!outbox.has_reached_limit(Destination::Broadcast));
        outbox.add(Destination::Broadcast, 1);
        assert!(outbox.is_empty());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_out_of_range_ordinal_panics() {
        let mut outbox: Outbox<i32> = Outbox::uniform(1, 8);
        outbox.add(Destination::Single(5), 1);
    }
}
