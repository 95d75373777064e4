//! Contiguous chunking used by every fan-out loop

use cdp_common::{CdpError, Result};
use std::slice::Chunks;

/// Split `items` into consecutive slices of at most `size` elements
///
/// The iterator is lazy, preserves order, and covers every element exactly
/// once; only the final chunk may be shorter than `size`.
pub fn chunks<T>(items: &[T], size: usize) -> Result<Chunks<'_, T>> {
    if size == 0 {
        return Err(CdpError::config("chunk size must be greater than 0"));
    }
    Ok(items.chunks(size))
}

/// Number of chunks `chunks(items, size)` yields for `len` items
pub fn chunk_count(len: usize, size: usize) -> usize {
    if size == 0 {
        return 0;
    }
    len.div_ceil(size)
}
