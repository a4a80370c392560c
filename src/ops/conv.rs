//! Gather-scatter convolution kernels
//!
//! Per kernel offset: gather the participating input rows into a
//! contiguous block, multiply by that offset's weight matrix, scatter-add
//! the product rows onto the output features. Offsets run sequentially,
//! rows within an offset in parallel; the per-offset pair lists are 1-1
//! in both roles, so no two workers ever touch the same row and the
//! result is independent of scheduling.

use crate::dtype::Element;
use crate::rulebook::Rulebook;

use super::gather::{
    gather_input_rows, gather_output_rows, scatter_add_input_rows, scatter_add_output_rows,
};
use super::matmul::{matmul, matmul_at_acc, matmul_bt};
use super::weights::ConvWeights;

/// Forward pass: output features for every output row of the rulebook
///
/// Dimensions are validated by the caller ([`crate::ops::sparse_conv`]).
pub(crate) fn indice_conv_forward<T: Element>(
    in_features: &[T],
    weight: &ConvWeights<T>,
    rulebook: &Rulebook,
) -> Vec<T> {
    let c_in = weight.in_channels();
    let c_out = weight.out_channels();
    let mut out_features = vec![T::zero(); rulebook.out_len() * c_out];

    let mut in_block: Vec<T> = Vec::new();
    let mut out_block: Vec<T> = Vec::new();
    for (k, pairs) in rulebook.pairs().iter().enumerate() {
        if pairs.is_empty() {
            continue;
        }
        let nk = pairs.len();
        in_block.resize(nk * c_in, T::zero());
        out_block.resize(nk * c_out, T::zero());

        gather_input_rows(in_features, c_in, pairs, &mut in_block);
        matmul(&in_block, weight.offset(k), &mut out_block, nk, c_in, c_out);
        scatter_add_output_rows(&out_block, c_out, pairs, &mut out_features);
    }

    out_features
}

/// Backward pass: input-feature gradient and weight gradient
///
/// Reverses the forward connectivity: `d_in[i] += W[k] · d_out[o]` and
/// `d_w[k] += in[i] ⊗ d_out[o]` over the same pairs.
pub(crate) fn indice_conv_backward<T: Element>(
    in_features: &[T],
    weight: &ConvWeights<T>,
    rulebook: &Rulebook,
    d_output: &[T],
) -> (Vec<T>, ConvWeights<T>) {
    let c_in = weight.in_channels();
    let c_out = weight.out_channels();
    let mut d_input = vec![T::zero(); rulebook.in_len() * c_in];
    let mut d_weight = ConvWeights::zeros(weight.kernel_volume(), c_in, c_out);

    let mut in_block: Vec<T> = Vec::new();
    let mut dout_block: Vec<T> = Vec::new();
    let mut din_block: Vec<T> = Vec::new();
    for (k, pairs) in rulebook.pairs().iter().enumerate() {
        if pairs.is_empty() {
            continue;
        }
        let nk = pairs.len();
        in_block.resize(nk * c_in, T::zero());
        dout_block.resize(nk * c_out, T::zero());
        din_block.resize(nk * c_in, T::zero());

        gather_output_rows(d_output, c_out, pairs, &mut dout_block);

        // d_in block = d_out block @ W[k]^T
        matmul_bt(
            &dout_block,
            weight.offset(k),
            &mut din_block,
            nk,
            c_out,
            c_in,
        );
        scatter_add_input_rows(&din_block, c_in, pairs, &mut d_input);

        // d_W[k] += in block^T @ d_out block
        gather_input_rows(in_features, c_in, pairs, &mut in_block);
        matmul_at_acc(
            &in_block,
            &dout_block,
            d_weight.offset_mut(k),
            nk,
            c_in,
            c_out,
        );
    }

    (d_input, d_weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ConvGeometry;
    use crate::rulebook::{ConvMode, build_rulebook};
    use crate::tensor::{Coordinates, Shape};

    /// 1-D line of three sites at x = 0, 1, 2, kernel 3, stride 1,
    /// padding 1: a fully-active segment, so the result is a plain dense
    /// convolution `out[o] = w0*in[o-1] + w1*in[o] + w2*in[o+1]`, checked
    /// by hand. Output rows come out in first-occurrence order: o=1 is
    /// reached first (by x=0 through offset 0), then o=0, then o=2.
    #[test]
    fn test_forward_matches_hand_computation() {
        let coords = Coordinates::from_vec(vec![0, 0, 0, 1, 0, 2], 1).unwrap();
        let geometry = ConvGeometry::uniform(1, 3, 1, 1, 1).unwrap();
        let rb = build_rulebook(&coords, &Shape::from([3]), 1, &geometry, ConvMode::Standard)
            .unwrap();
        assert_eq!(rb.out_coords().row(0), &[0, 1]);
        assert_eq!(rb.out_coords().row(1), &[0, 0]);
        assert_eq!(rb.out_coords().row(2), &[0, 2]);

        let weight = ConvWeights::from_vec(vec![2.0f32, 3.0, 5.0], 3, 1, 1).unwrap();
        let input = [1.0f32, 10.0, 100.0];
        let out = indice_conv_forward(&input, &weight, &rb);

        // o=1: 2*1 + 3*10 + 5*100; o=0: 3*1 + 5*10; o=2: 2*10 + 3*100
        assert_eq!(out, vec![532.0, 53.0, 320.0]);
    }

    #[test]
    fn test_backward_matches_hand_computation() {
        let coords = Coordinates::from_vec(vec![0, 0, 0, 1, 0, 2], 1).unwrap();
        let geometry = ConvGeometry::uniform(1, 3, 1, 1, 1).unwrap();
        let rb = build_rulebook(&coords, &Shape::from([3]), 1, &geometry, ConvMode::Standard)
            .unwrap();
        let weight = ConvWeights::from_vec(vec![2.0f32, 3.0, 5.0], 3, 1, 1).unwrap();
        let input = [1.0f32, 10.0, 100.0];
        // Gradient 1 at output row 0, which is coordinate o=1
        let d_out = [1.0f32, 0.0, 0.0];

        let (d_in, d_w) = indice_conv_backward(&input, &weight, &rb, &d_out);

        // out[o=1] = w0*in[0] + w1*in[1] + w2*in[2]
        assert_eq!(d_in, vec![2.0, 3.0, 5.0]);
        assert_eq!(d_w.data(), &[1.0, 10.0, 100.0]);
    }
}
