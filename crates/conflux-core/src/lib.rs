//! # Conflux Core
//!
//! The execution core of a watermarked dataflow engine: cooperative
//! processors exchange items and event-time watermarks over bounded
//! queues, with advisory backpressure and cross-partition watermark
//! agreement.
//!
//! This crate provides:
//! - **Streaming channels**: the [`StreamElement`](streaming::StreamElement)
//!   payload variant and the lock-free [`SpscQueue`](streaming::SpscQueue)
//! - **Event time**: [`Watermark`](time::Watermark), watermark policies,
//!   and the injectable [`Clock`](time::Clock) capability
//! - **Execution**: [`Outbox`](execution::Outbox) backpressure buffering,
//!   [`PunctuationInserter`](execution::PunctuationInserter) throttled
//!   watermark emission, and [`EdgeMerger`](execution::EdgeMerger)
//!   watermark-synchronized edge merging
//!
//! ## Design Principles
//!
//! 1. **No locks, no blocking waits**: the SPSC queue is the only
//!    concurrency boundary; everything else runs on the owning
//!    processor's cooperative turn
//! 2. **Try semantics everywhere**: drain only what is immediately
//!    available, never wait
//! 3. **Backpressure is advisory**: a full bucket signals the scheduler,
//!    it never blocks a thread
//! 4. **Watermarks gate state finalization**: they are held until every
//!    active upstream agrees, which is the engine's central correctness
//!    property

#![deny(missing_docs)]
#![deny(unsafe_code)] // Selectively allowed in the SPSC queue with SAFETY comments
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod execution;
pub mod streaming;
pub mod time;

// Re-export key types
pub use execution::{
    Destination, EdgeMerger, ExecutionError, ItemOutcome, Outbox, ProgressState,
    PunctuationInserter,
};
pub use streaming::{SpscQueue, StreamElement};
pub use time::Watermark;

/// Result type for conflux-core operations.
pub type Result<T> = std::result::Result<T, ExecutionError>;
