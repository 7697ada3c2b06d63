//! Progress reporting for cooperative drain calls.

/// Outcome of one cooperative invocation, as consumed by the scheduler.
///
/// The four values tell the scheduler whether to keep polling this edge
/// (`MadeProgress`), back off (`NoProgress`), retire it (`Done`), or
/// recognize a call against an already-retired edge (`WasAlreadyDone`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressState {
    /// Something was forwarded or a queue transitioned to done.
    MadeProgress,
    /// Nothing was available and nothing changed.
    NoProgress,
    /// All upstream queues are done as of this call.
    Done,
    /// All upstream queues were already done before this call began.
    /// Terminal and idempotent.
    WasAlreadyDone,
}

impl ProgressState {
    /// Combines the two underlying facts into a progress value.
    #[must_use]
    pub fn from_flags(made_progress: bool, is_done: bool) -> Self {
        match (is_done, made_progress) {
            (true, true) => Self::Done,
            (true, false) => Self::WasAlreadyDone,
            (false, true) => Self::MadeProgress,
            (false, false) => Self::NoProgress,
        }
    }

    /// True if this call forwarded anything or changed state.
    #[must_use]
    pub fn made_progress(&self) -> bool {
        matches!(self, Self::MadeProgress | Self::Done)
    }

    /// True if the merged stream is finished.
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done | Self::WasAlreadyDone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flags() {
        assert_eq!(
            ProgressState::from_flags(true, false),
            ProgressState::MadeProgress
        );
        assert_eq!(
            ProgressState::from_flags(false, false),
            ProgressState::NoProgress
        );
        assert_eq!(ProgressState::from_flags(true, true), ProgressState::Done);
        assert_eq!(
            ProgressState::from_flags(false, true),
            ProgressState::WasAlreadyDone
        );
    }

    #[test]
    fn test_flag_accessors() {
        assert!(ProgressState::MadeProgress.made_progress());
        assert!(!ProgressState::MadeProgress.is_done());
        assert!(ProgressState::Done.made_progress());
        assert!(ProgressState::Done.is_done());
        assert!(!ProgressState::NoProgress.made_progress());
        assert!(ProgressState::WasAlreadyDone.is_done());
        assert!(!ProgressState::WasAlreadyDone.made_progress());
    }
}
