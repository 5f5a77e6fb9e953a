//! Fixed-size chunk planning.

use std::ops::Range;

/// Index ranges of consecutive chunks of `size` over `len` items.
///
/// Yields `ceil(len / size)` ranges; only the last may be shorter. `size`
/// must be non-zero.
pub fn chunk_ranges(len: usize, size: usize) -> impl Iterator<Item = Range<usize>> {
    assert!(size > 0, "chunk size must be non-zero");
    (0..len)
        .step_by(size)
        .map(move |start| start..(start + size).min(len))
}

pub fn chunk_count(len: usize, size: usize) -> usize {
    assert!(size > 0, "chunk size must be non-zero");
    len.div_ceil(size)
}
