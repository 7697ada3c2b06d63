//! Tagged payload carried through stream queues.

use crate::time::Watermark;

/// One entry in a stream queue: a data item, a watermark, or the
/// end-of-stream marker.
///
/// Every queue between two processors carries this variant, which keeps
/// the merge state machine explicit: the consumer matches on the tag
/// instead of comparing against reserved sentinel objects.
///
/// The end-of-stream marker is irreversible: once a producer enqueues
/// it, nothing further may be enqueued on that queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamElement<T> {
    /// A data item with an opaque payload.
    Item(T),
    /// An event-time progress marker.
    Watermark(Watermark),
    /// The producing upstream is permanently exhausted.
    EndOfStream,
}

impl<T> StreamElement<T> {
    /// Returns true for the end-of-stream marker.
    #[inline]
    #[must_use]
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }

    /// Returns true for a data item.
    #[inline]
    #[must_use]
    pub fn is_item(&self) -> bool {
        matches!(self, Self::Item(_))
    }

    /// Returns the watermark if this element carries one.
    #[inline]
    #[must_use]
    pub fn as_watermark(&self) -> Option<Watermark> {
        match self {
            Self::Watermark(wm) => Some(*wm),
            _ => None,
        }
    }

    /// Returns the item payload, if any, consuming the element.
    #[must_use]
    pub fn into_item(self) -> Option<T> {
        match self {
            Self::Item(item) => Some(item),
            _ => None,
        }
    }
}
