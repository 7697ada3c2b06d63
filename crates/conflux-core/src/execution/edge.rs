//! Watermark-synchronized merging of parallel upstream queues.
//!
//! One logical inbound edge is usually fanned out across several
//! partitioned [`SpscQueue`]s, one per upstream partition. [`EdgeMerger`]
//! drains them into a single stream for the consuming processor:
//!
//! - **Items** are forwarded eagerly, the moment they are available.
//!   Strict FIFO holds within each queue; no order is guaranteed across
//!   queues.
//! - **Watermarks** are held back. Every upstream partition emits the
//!   same watermark values in the same order, so the merger parks each
//!   queue's watermark until every still-active queue has produced the
//!   identical value, then forwards it exactly once. A parked queue
//!   contributes nothing further until agreement clears it.
//! - **End-of-stream** permanently retires a queue. Once every queue has
//!   retired, the merged stream is finished, permanently and
//!   idempotently.
//!
//! Disagreement between upstreams (two distinct parked watermarks, or a
//! completion that makes agreement impossible) is an engine invariant
//! violation and surfaces as a fatal [`ExecutionError`].

use std::sync::Arc;

use smallvec::SmallVec;

use crate::streaming::{SpscQueue, StreamElement};
use crate::time::Watermark;

use super::error::ExecutionError;
use super::progress::ProgressState;

/// Merge state for one upstream queue.
#[derive(Debug, Default)]
struct QueueState {
    /// Permanently exhausted. Once set, nothing further may be observed
    /// from this queue.
    done: bool,
    /// Watermark produced by this queue, awaiting agreement from the
    /// remaining active queues.
    pending: Option<Watermark>,
}

/// Counters kept by an [`EdgeMerger`] over its lifetime.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergerMetrics {
    /// Items forwarded to the sink.
    pub items_forwarded: u64,
    /// Agreed watermarks forwarded to the sink.
    pub watermarks_forwarded: u64,
    /// Upstream queues that reached end-of-stream.
    pub queues_completed: u64,
}

/// Merges N upstream partition queues into one logical inbound stream.
///
/// Created once per consumed edge and exclusively owning the merge-state
/// table for that edge. All draining happens on the consuming processor's
/// cooperative turn; only what is immediately available is taken, and
/// nothing ever blocks.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use conflux_core::execution::{EdgeMerger, ProgressState};
/// use conflux_core::streaming::{SpscQueue, StreamElement};
///
/// let queue = Arc::new(SpscQueue::new(16));
/// queue.push(StreamElement::Item(1i64)).unwrap();
/// queue.push(StreamElement::EndOfStream).unwrap();
///
/// let mut merger = EdgeMerger::new(vec![Arc::clone(&queue)]);
/// let mut received = Vec::new();
/// let state = merger.drain_to(&mut |element| received.push(element)).unwrap();
///
/// assert_eq!(state, ProgressState::Done);
/// assert_eq!(received, vec![StreamElement::Item(1)]);
/// ```
pub struct EdgeMerger<T> {
    /// Consumer ends of the upstream queues, one per partition.
    queues: Vec<Arc<SpscQueue<StreamElement<T>>>>,
    /// Merge state per queue, index-aligned with `queues`.
    states: SmallVec<[QueueState; 4]>,
    /// Number of queues that have reached end-of-stream.
    done_count: usize,
    metrics: MergerMetrics,
}

impl<T> EdgeMerger<T> {
    /// Creates a merger over the given upstream queues.
    ///
    /// # Panics
    ///
    /// Panics if `queues` is empty.
    #[must_use]
    pub fn new(queues: Vec<Arc<SpscQueue<StreamElement<T>>>>) -> Self {
        assert!(!queues.is_empty(), "an edge needs at least one upstream queue");
        let states = queues.iter().map(|_| QueueState::default()).collect();
        Self {
            queues,
            states,
            done_count: 0,
            metrics: MergerMetrics::default(),
        }
    }

    /// Drains everything currently available into `sink`.
    ///
    /// Forwards items eagerly and the next watermark once all active
    /// queues agree on it. Never waits: queues are only polled, and the
    /// call returns as soon as nothing more is immediately available.
    ///
    /// The returned [`ProgressState`] is part of the contract: the
    /// scheduler uses it to decide whether to keep polling, back off, or
    /// retire this edge. A finished edge keeps returning
    /// [`ProgressState::WasAlreadyDone`] forever.
    ///
    /// # Errors
    ///
    /// Returns a fatal, job-terminating [`ExecutionError`] when upstream
    /// watermarks diverge or an upstream completes in a way that makes
    /// agreement impossible. These indicate an engine invariant violation
    /// and must not be retried.
    pub fn drain_to<F>(&mut self, sink: &mut F) -> Result<ProgressState, ExecutionError>
    where
        F: FnMut(StreamElement<T>),
    {
        let queue_count = self.queues.len();
        if self.done_count == queue_count {
            return Ok(ProgressState::WasAlreadyDone);
        }

        let mut made_progress = false;

        for index in 0..queue_count {
            // A retired queue is never polled again; a queue parked on an
            // unagreed watermark contributes nothing until agreement.
            if self.states[index].done || self.states[index].pending.is_some() {
                continue;
            }

            while let Some(element) = self.queues[index].pop() {
                match element {
                    StreamElement::Item(item) => {
                        sink(StreamElement::Item(item));
                        self.metrics.items_forwarded += 1;
                        made_progress = true;
                    }
                    StreamElement::Watermark(watermark) => {
                        if self.done_count > 0 {
                            return Err(ExecutionError::WatermarkAfterCompletion {
                                queue: index,
                                watermark,
                            });
                        }
                        self.states[index].pending = Some(watermark);
                        break;
                    }
                    StreamElement::EndOfStream => {
                        self.states[index].done = true;
                        self.done_count += 1;
                        self.metrics.queues_completed += 1;
                        made_progress = true;
                        tracing::debug!(queue = index, "upstream queue completed");

                        // A sibling parked on a watermark this queue never
                        // matched can now never reach agreement.
                        if let Some(watermark) = self.any_pending_watermark() {
                            return Err(ExecutionError::CompletedBeforeWatermark {
                                queue: index,
                                watermark,
                            });
                        }
                        break;
                    }
                }
            }
        }

        if self.done_count < queue_count && self.forward_agreed_watermark(sink)? {
            made_progress = true;
        }

        Ok(ProgressState::from_flags(
            made_progress,
            self.done_count == queue_count,
        ))
    }

    /// Returns the number of upstream queues on this edge.
    #[must_use]
    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    /// True once every upstream queue has reached end-of-stream.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done_count == self.queues.len()
    }

    /// Returns the parked watermark of a queue, if any.
    #[must_use]
    pub fn pending_watermark(&self, index: usize) -> Option<Watermark> {
        self.states.get(index).and_then(|state| state.pending)
    }

    /// Returns the lifetime counters.
    #[must_use]
    pub fn metrics(&self) -> &MergerMetrics {
        &self.metrics
    }

    /// Returns any parked watermark across all queues.
    fn any_pending_watermark(&self) -> Option<Watermark> {
        self.states.iter().find_map(|state| state.pending)
    }

    /// Checks the parked watermarks of the active queues and forwards the
    /// agreed value once every active queue holds it.
    ///
    /// Returns whether a watermark was forwarded.
    fn forward_agreed_watermark<F>(&mut self, sink: &mut F) -> Result<bool, ExecutionError>
    where
        F: FnMut(StreamElement<T>),
    {
        let mut first: Option<(usize, Watermark)> = None;
        let mut all_parked = true;

        for (index, state) in self.states.iter().enumerate() {
            if state.done {
                continue;
            }
            match (state.pending, first) {
                (None, _) => all_parked = false,
                (Some(watermark), None) => first = Some((index, watermark)),
                (Some(watermark), Some((first_queue, first_watermark))) => {
                    if watermark != first_watermark {
                        return Err(ExecutionError::WatermarkMismatch {
                            first: first_watermark,
                            first_queue,
                            second: watermark,
                            second_queue: index,
                        });
                    }
                }
            }
        }

        if all_parked {
            if let Some((_, watermark)) = first {
                sink(StreamElement::Watermark(watermark));
                for state in &mut self.states {
                    state.pending = None;
                }
                self.metrics.watermarks_forwarded += 1;
                tracing::debug!(seq = watermark.seq(), "forwarded agreed watermark");
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl<T> std::fmt::Debug for EdgeMerger<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeMerger")
            .field("queue_count", &self.queues.len())
            .field("done_count", &self.done_count)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}
