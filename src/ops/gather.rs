//! Row gather and scatter-add primitives
//!
//! One kernel offset's pair list selects which feature rows participate;
//! gather packs them into a contiguous block for the GEMM, scatter-add
//! applies the block back onto the full feature buffer. Within one offset
//! every input row and every output row appears at most once, so the
//! scatter targets are disjoint and the result does not depend on
//! scheduling order.

use crate::dtype::Element;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Pair count below which parallel dispatch is not worth the overhead
#[cfg(feature = "rayon")]
const PARALLEL_THRESHOLD: usize = 256;

/// Pack `features[pair.0]` rows into `buffer`, one row per pair
pub(crate) fn gather_input_rows<T: Element>(
    features: &[T],
    channels: usize,
    pairs: &[(u32, u32)],
    buffer: &mut [T],
) {
    gather(features, channels, pairs, buffer, |p| p.0)
}

/// Pack `features[pair.1]` rows into `buffer`, one row per pair
pub(crate) fn gather_output_rows<T: Element>(
    features: &[T],
    channels: usize,
    pairs: &[(u32, u32)],
    buffer: &mut [T],
) {
    gather(features, channels, pairs, buffer, |p| p.1)
}

#[inline]
fn gather<T: Element>(
    features: &[T],
    channels: usize,
    pairs: &[(u32, u32)],
    buffer: &mut [T],
    side: impl Fn(&(u32, u32)) -> u32 + Sync,
) {
    debug_assert_eq!(buffer.len(), pairs.len() * channels);

    #[cfg(feature = "rayon")]
    if pairs.len() >= PARALLEL_THRESHOLD {
        buffer
            .par_chunks_mut(channels)
            .zip(pairs.par_iter())
            .for_each(|(row, pair)| {
                let src = side(pair) as usize * channels;
                row.copy_from_slice(&features[src..src + channels]);
            });
        return;
    }

    for (row, pair) in buffer.chunks_mut(channels).zip(pairs) {
        let src = side(pair) as usize * channels;
        row.copy_from_slice(&features[src..src + channels]);
    }
}

/// Add each `buffer` row onto `features[pair.1]`
pub(crate) fn scatter_add_output_rows<T: Element>(
    buffer: &[T],
    channels: usize,
    pairs: &[(u32, u32)],
    features: &mut [T],
) {
    scatter_add(buffer, channels, pairs, features, |p| p.1)
}

/// Add each `buffer` row onto `features[pair.0]`
pub(crate) fn scatter_add_input_rows<T: Element>(
    buffer: &[T],
    channels: usize,
    pairs: &[(u32, u32)],
    features: &mut [T],
) {
    scatter_add(buffer, channels, pairs, features, |p| p.0)
}

#[inline]
fn scatter_add<T: Element>(
    buffer: &[T],
    channels: usize,
    pairs: &[(u32, u32)],
    features: &mut [T],
    side: impl Fn(&(u32, u32)) -> u32,
) {
    debug_assert_eq!(buffer.len(), pairs.len() * channels);

    for (row, pair) in buffer.chunks_exact(channels).zip(pairs) {
        let dst = side(pair) as usize * channels;
        for (o, &v) in features[dst..dst + channels].iter_mut().zip(row) {
            *o += v;
        }
    }
}
