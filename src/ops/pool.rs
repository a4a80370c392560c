//! Sparse max-pooling kernels
//!
//! Forward selects the per-channel maximum over contributing input rows
//! and records the winning row, so backward is pure routing: each output
//! gradient lands on exactly one input row. Ties go to the
//! first-encountered contributor in rulebook iteration order, which makes
//! repeated runs bit-identical.

use crate::dtype::Element;
use crate::rulebook::Rulebook;

/// Recorded winners of one max-pool invocation, `out_rows x channels`
///
/// The sentinel [`PoolIndices::NONE`] marks an output channel that never
/// received a contribution; such rows still exist in the output (the
/// coordinate set defines validity) with zero features.
pub struct PoolIndices {
    winners: Vec<u32>,
    channels: usize,
}

impl PoolIndices {
    /// Sentinel for "no contributing input row"
    pub const NONE: u32 = u32::MAX;

    /// Channel count per output row
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of output rows
    #[inline]
    pub fn out_rows(&self) -> usize {
        self.winners.len() / self.channels
    }

    /// The winning input row for `(out_row, channel)`, if any contributor
    /// reached it
    #[inline]
    pub fn winner(&self, out_row: usize, channel: usize) -> Option<u32> {
        let w = self.winners[out_row * self.channels + channel];
        (w != Self::NONE).then_some(w)
    }

    /// The flat winner buffer, sentinel included
    pub fn as_slice(&self) -> &[u32] {
        &self.winners
    }
}

/// Forward pass: per-channel maxima and their winning rows
pub(crate) fn indice_maxpool_forward<T: Element>(
    in_features: &[T],
    channels: usize,
    rulebook: &Rulebook,
) -> (Vec<T>, PoolIndices) {
    let out_len = rulebook.out_len();
    let mut out_features = vec![T::zero(); out_len * channels];
    let mut winners = vec![PoolIndices::NONE; out_len * channels];

    for pairs in rulebook.pairs() {
        for &(i, o) in pairs {
            let in_row = &in_features[i as usize * channels..(i as usize + 1) * channels];
            let out_base = o as usize * channels;
            for (c, &v) in in_row.iter().enumerate() {
                let slot = out_base + c;
                // Strict comparison keeps the first-encountered row on ties
                if winners[slot] == PoolIndices::NONE || v > out_features[slot] {
                    out_features[slot] = v;
                    winners[slot] = i;
                }
            }
        }
    }

    (out_features, PoolIndices { winners, channels })
}

/// Backward pass: route each output gradient to its recorded winner
pub(crate) fn indice_maxpool_backward<T: Element>(
    in_rows: usize,
    pool: &PoolIndices,
    d_output: &[T],
) -> Vec<T> {
    let channels = pool.channels;
    let mut d_input = vec![T::zero(); in_rows * channels];

    for (slot, &winner) in pool.winners.iter().enumerate() {
        if winner != PoolIndices::NONE {
            let c = slot % channels;
            d_input[winner as usize * channels + c] += d_output[slot];
        }
    }

    d_input
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ConvGeometry;
    use crate::rulebook::{ConvMode, build_rulebook};
    use crate::tensor::{Coordinates, Shape};

    fn line_rulebook() -> Rulebook {
        // Four sites on a line, pooled 2->1 with k=2, s=2
        let coords = Coordinates::from_vec(vec![0, 0, 0, 1, 0, 2, 0, 3], 1).unwrap();
        let geometry = ConvGeometry::uniform(1, 2, 2, 0, 1).unwrap();
        build_rulebook(&coords, &Shape::from([4]), 1, &geometry, ConvMode::Standard).unwrap()
    }

    #[test]
    fn test_forward_selects_max_per_channel() {
        let rb = line_rulebook();
        // 2 channels; maxima sit on different rows per channel
        let input = [1.0f32, 8.0, 2.0, 7.0, 5.0, 5.0, 6.0, 4.0];
        let (out, pool) = indice_maxpool_forward(&input, 2, &rb);
        assert_eq!(out, vec![2.0, 8.0, 6.0, 5.0]);
        assert_eq!(pool.winner(0, 0), Some(1));
        assert_eq!(pool.winner(0, 1), Some(0));
        assert_eq!(pool.winner(1, 0), Some(3));
        assert_eq!(pool.winner(1, 1), Some(2));
    }

    #[test]
    fn test_ties_take_first_in_rulebook_order() {
        let rb = line_rulebook();
        let input = [3.0f32, 3.0, 3.0, 3.0];
        let (out, pool) = indice_maxpool_forward(&input, 1, &rb);
        assert_eq!(out, vec![3.0, 3.0]);
        // Offset 0 pairs come first, so rows 0 and 2 win their windows
        assert_eq!(pool.winner(0, 0), Some(0));
        assert_eq!(pool.winner(1, 0), Some(2));
    }

    #[test]
    fn test_backward_routes_to_winner() {
        let rb = line_rulebook();
        let input = [1.0f32, 8.0, 2.0, 7.0, 5.0, 5.0, 6.0, 4.0];
        let (_, pool) = indice_maxpool_forward(&input, 2, &rb);
        let d_out = [10.0f32, 20.0, 30.0, 40.0];
        let d_in = indice_maxpool_backward(4, &pool, &d_out);
        assert_eq!(d_in, vec![0.0, 20.0, 10.0, 0.0, 0.0, 40.0, 30.0, 0.0]);
    }

    #[test]
    fn test_negative_values_still_pool() {
        // All-negative inputs must not lose to an implicit zero
        let rb = line_rulebook();
        let input = [-5.0f32, -2.0, -9.0, -1.0];
        let (out, pool) = indice_maxpool_forward(&input, 1, &rb);
        assert_eq!(out, vec![-2.0, -1.0]);
        assert_eq!(pool.winner(0, 0), Some(1));
        assert_eq!(pool.winner(1, 0), Some(3));
    }
}
