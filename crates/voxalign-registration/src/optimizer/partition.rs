//! Contiguous index-range partitioning of the parameter sequence.

/// A half-open interval `[start, end)` over the parameter sequence.
///
/// Partitions produced by [`IndexRange::partition`] never overlap and cover
/// the full sequence, so per-range gradient modification needs no
/// synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRange {
    /// First index in the range.
    pub start: usize,
    /// One past the last index in the range.
    pub end: usize,
}

impl IndexRange {
    /// Create a range. `start` must not exceed `end`.
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// Number of indices in the range.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// True when the range contains no indices.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Split `[0, len)` into at most `partitions` contiguous ranges of
    /// near-equal size. Empty trailing ranges are dropped, so fewer ranges
    /// than requested may be returned for short sequences.
    pub fn partition(len: usize, partitions: usize) -> Vec<IndexRange> {
        let partitions = partitions.max(1);
        let chunk = len.div_ceil(partitions).max(1);
        let mut ranges = Vec::with_capacity(partitions);
        let mut start = 0;
        while start < len {
            let end = (start + chunk).min(len);
            ranges.push(IndexRange::new(start, end));
            start = end;
        }
        ranges
    }

    /// Chunk length used by [`partition`](Self::partition) for a sequence of
    /// `len` indices; every returned range but the last has exactly this
    /// length.
    pub fn chunk_len(len: usize, partitions: usize) -> usize {
        len.div_ceil(partitions.max(1)).max(1)
    }
}
