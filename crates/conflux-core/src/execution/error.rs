//! Error types for the execution core.

use crate::time::Watermark;

/// Errors raised by the execution core.
///
/// Configuration errors are rejected eagerly at construction. The
/// watermark divergence variants are unrecoverable, job-terminating
/// errors: they indicate a partitioning or engine invariant violation
/// upstream and must not be locally retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    /// A throttle was configured with a negative value.
    #[error("{name} must be >= 0, got {value}")]
    InvalidThrottle {
        /// Name of the offending parameter.
        name: &'static str,
        /// The rejected value.
        value: i64,
    },

    /// Two upstream partitions emitted different watermarks for the same
    /// logical position.
    #[error(
        "watermark emitted by one upstream not equal to watermark emitted by another \
         ({first} from queue {first_queue}, {second} from queue {second_queue})"
    )]
    WatermarkMismatch {
        /// The first pending watermark observed.
        first: Watermark,
        /// Queue holding the first watermark.
        first_queue: usize,
        /// The conflicting watermark.
        second: Watermark,
        /// Queue holding the conflicting watermark.
        second_queue: usize,
    },

    /// An upstream completed without first emitting a watermark that a
    /// sibling upstream had already emitted.
    #[error(
        "upstream queue {queue} completed without first emitting {watermark}, \
         already emitted by another upstream"
    )]
    CompletedBeforeWatermark {
        /// The queue that completed early.
        queue: usize,
        /// The watermark the sibling had already emitted.
        watermark: Watermark,
    },

    /// A watermark arrived after some upstream had already completed,
    /// which makes cross-partition agreement on it impossible.
    #[error("received {watermark} from upstream queue {queue} after another upstream already completed")]
    WatermarkAfterCompletion {
        /// The queue that produced the late watermark.
        queue: usize,
        /// The watermark that can no longer be agreed on.
        watermark: Watermark,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_message_names_both_values() {
        let err = ExecutionError::WatermarkMismatch {
            first: Watermark::new(0),
            first_queue: 0,
            second: Watermark::new(1),
            second_queue: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("watermark(seq=0)"));
        assert!(msg.contains("watermark(seq=1)"));
    }

    #[test]
    fn test_invalid_throttle_message() {
        let err = ExecutionError::InvalidThrottle {
            name: "event_seq_throttle",
            value: -5,
        };
        assert_eq!(err.to_string(), "event_seq_throttle must be >= 0, got -5");
    }
}
