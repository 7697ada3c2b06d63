//! # Streaming Channels
//!
//! The channel layer of the execution core: the payload variant carried
//! between processors and the lock-free queue that carries it.
//!
//! ## Design
//!
//! - [`StreamElement`] is the explicit tagged payload: a data item, a
//!   watermark, or the end-of-stream marker. There are no sentinel object
//!   identity checks anywhere in the engine.
//! - [`SpscQueue`] is a bounded single-producer single-consumer ring with
//!   non-blocking try-enqueue/try-dequeue. It is the only genuine
//!   concurrency boundary in the core; everything else runs on the
//!   owning processor's cooperative turn.
//!
//! Strict FIFO order is guaranteed within a queue. No ordering is
//! guaranteed across distinct queues feeding the same consumer.

mod element;
mod queue;

pub use element::StreamElement;
pub use queue::{CachePadded, SpscQueue, MAX_QUEUE_CAPACITY, MIN_QUEUE_CAPACITY};
