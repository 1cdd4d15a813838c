//! Batch alignment
//!
//! A batch is a fixed-size, alignment-stable range of indices. Aligning every
//! request to the same boundaries keeps repeated loads around overlapping
//! positions from duplicating work, whatever index they start from.

use std::ops::Range;

/// First index of the batch containing `index`.
pub fn batch_start(index: usize, batch_size: usize) -> usize {
    let size = batch_size.max(1);
    (index / size) * size
}

/// The batch containing `index`, clipped to `total`.
pub fn batch_range(index: usize, batch_size: usize, total: usize) -> Range<usize> {
    let start = batch_start(index, batch_size);
    start.min(total)..(start + batch_size.max(1)).min(total)
}

/// Distance from `index` to the nearest member of the batch starting at
/// `start`. Zero when `index` lies inside the batch.
pub fn distance_to_batch(index: usize, start: usize, batch_size: usize) -> usize {
    let end = start + batch_size.max(1) - 1;
    if index < start {
        start - index
    } else if index > end {
        index - end
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_start_alignment() {
        assert_eq!(batch_start(0, 10), 0);
        assert_eq!(batch_start(9, 10), 0);
        assert_eq!(batch_start(10, 10), 10);
        assert_eq!(batch_start(505, 10), 500);
    }

    #[test]
    fn test_batch_start_tolerates_zero_size() {
        assert_eq!(batch_start(7, 0), 7);
    }

    #[test]
    fn test_batch_range_clips_to_total() {
        assert_eq!(batch_range(95, 10, 97), 90..97);
        assert_eq!(batch_range(3, 10, 100), 0..10);
        assert_eq!(batch_range(120, 10, 100), 100..100);
    }

    #[test]
    fn test_distance_to_batch() {
        assert_eq!(distance_to_batch(15, 10, 10), 0);
        assert_eq!(distance_to_batch(5, 10, 10), 5);
        assert_eq!(distance_to_batch(25, 10, 10), 6);
    }
}
