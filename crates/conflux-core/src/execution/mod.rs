//! # Cooperative Execution Core
//!
//! The primitives that make correct, low-latency, backpressured dataflow
//! possible:
//!
//! - [`Outbox`]: bounded multi-bucket output buffering with advisory
//!   flow control; the backpressure primitive.
//! - [`PunctuationInserter`]: per-partition item pass-through,
//!   late-item filtering, and dual-throttled watermark emission.
//! - [`EdgeMerger`]: watermark-synchronized merging of parallel
//!   upstream queues into one logical inbound stream.
//!
//! Together they decide when time-keyed downstream state may safely be
//! finalized and purged.
//!
//! ## Data flow
//!
//! ```text
//!  items ──▶ PunctuationInserter ──▶ Outbox buckets ──▶ SpscQueue per edge
//!              │ drops late items         │                  │
//!              └ inserts watermarks       └ advisory limit   ▼
//!                                                       EdgeMerger ──▶ next processor
//!                                                         holds watermarks until
//!                                                         all upstreams agree
//! ```
//!
//! ## Scheduling model
//!
//! Every component runs on its owning processor's cooperative turn: short
//! non-blocking invocations, "try" semantics only, no locks, no waits.
//! Backpressure is advisory: a full outbox bucket never blocks, it makes
//! the scheduler stop invoking emission until the bucket drains. The
//! wall-clock half of the punctuation throttle relies on the scheduler
//! issuing periodic [`PunctuationInserter::on_idle`] ticks.

pub mod edge;
pub mod error;
pub mod outbox;
pub mod progress;
pub mod punctuate;


pub use edge::{EdgeMerger, MergerMetrics};
pub use error::ExecutionError;
pub use outbox::{Destination, Outbox};
pub use progress::ProgressState;
pub use punctuate::{ItemOutcome, PunctuationInserter, PunctuationMetrics};
