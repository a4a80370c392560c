//! Sparse operations
//!
//! The public operation surface of the crate. Each forward entry point
//! returns the produced sparse tensor together with the `Arc` handle of
//! the rulebook it used; callers hold onto the handle for the matching
//! backward pass and may publish it in a [`RulebookCache`] for reuse by
//! paired layers.
//!
//! All validation is synchronous and up front: an invocation either fully
//! produces its outputs or returns an error having written nothing.

mod conv;
mod dense;
mod gather;
mod matmul;
mod pool;
mod weights;

pub use dense::{dense_shape, from_dense_grad, to_dense};
pub use pool::PoolIndices;
pub use weights::ConvWeights;

use std::sync::Arc;

use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::geometry::ConvGeometry;
use crate::rulebook::{ConvMode, Rulebook, RulebookCache, build_inverse_rulebook, build_rulebook};
use crate::tensor::SparseTensor;

/// Sparse convolution: standard, submanifold, or transposed
///
/// Builds (or reuses) the rulebook for `geometry` and `mode`, then runs
/// the gather-scatter engine. With `cache` given as `(cache, key)`, a
/// rulebook already stored under `key` is reused as-is after checking it
/// was built over this exact input set; otherwise the freshly built
/// rulebook is published under `key`.
///
/// # Errors
///
/// - [`Error::ShapeMismatch`] when `weight` channels or kernel volume do
///   not match the input and geometry
/// - [`Error::InvalidArgument`] for [`ConvMode::Inverse`] (use
///   [`sparse_inverse_conv`]) or geometry/input inconsistencies
/// - [`Error::RulebookReuseMismatch`] when the cached rulebook under
///   `key` does not fit this invocation
pub fn sparse_conv<T: Element>(
    input: &SparseTensor<T>,
    weight: &ConvWeights<T>,
    geometry: &ConvGeometry,
    mode: ConvMode,
    cache: Option<(&RulebookCache, &str)>,
) -> Result<(SparseTensor<T>, Arc<Rulebook>)> {
    if mode == ConvMode::Inverse {
        return Err(Error::invalid_argument(
            "mode",
            "inverse convolution needs a paired rulebook; use sparse_inverse_conv",
        ));
    }
    validate_weight(weight, input.channels(), geometry.kernel_volume())?;

    let rulebook = acquire_rulebook(input, geometry, mode, cache)?;
    let out_features = conv::indice_conv_forward(input.features(), weight, &rulebook);
    let output = SparseTensor::from_parts(
        out_features,
        weight.out_channels(),
        rulebook.out_coords().clone(),
        rulebook.out_spatial_shape().clone(),
        input.batch_size(),
    );
    Ok((output, rulebook))
}

/// Inverse convolution: mirrors the rulebook stored under `key`
///
/// The output coordinate set is exactly the paired rulebook's input set,
/// which lets a decoder upsample back to the resolution a prior strided
/// convolution consumed.
///
/// # Errors
///
/// [`Error::RulebookReuseMismatch`] when nothing is stored under `key` or
/// the input set does not match the paired rulebook's output set, plus
/// the weight validation errors of [`sparse_conv`].
pub fn sparse_inverse_conv<T: Element>(
    input: &SparseTensor<T>,
    weight: &ConvWeights<T>,
    cache: &RulebookCache,
    key: &str,
) -> Result<(SparseTensor<T>, Arc<Rulebook>)> {
    let paired = cache
        .get(key)
        .ok_or_else(|| Error::reuse_mismatch(key, "no rulebook stored under this key"))?;
    validate_weight(weight, input.channels(), paired.kernel_volume())?;

    let rulebook = Arc::new(build_inverse_rulebook(&paired, input.indices(), key)?);
    let out_features = conv::indice_conv_forward(input.features(), weight, &rulebook);
    let output = SparseTensor::from_parts(
        out_features,
        weight.out_channels(),
        rulebook.out_coords().clone(),
        rulebook.out_spatial_shape().clone(),
        input.batch_size(),
    );
    Ok((output, rulebook))
}

/// Backward pass of any sparse convolution
///
/// `rulebook` is the handle the forward invocation returned; `d_output`
/// is the gradient for its output rows (`out_len x out_channels`).
/// Returns the input-feature gradient (`in_len x in_channels`) and the
/// weight gradient (same shape as `weight`).
///
/// # Errors
///
/// [`Error::ShapeMismatch`] when `input`, `weight`, `rulebook`, and
/// `d_output` disagree on any dimension.
pub fn sparse_conv_backward<T: Element>(
    input: &SparseTensor<T>,
    weight: &ConvWeights<T>,
    rulebook: &Rulebook,
    d_output: &[T],
) -> Result<(Vec<T>, ConvWeights<T>)> {
    validate_weight(weight, input.channels(), rulebook.kernel_volume())?;
    if input.rows() != rulebook.in_len() {
        return Err(Error::shape_mismatch(
            &[rulebook.in_len(), input.channels()],
            &[input.rows(), input.channels()],
        ));
    }
    if d_output.len() != rulebook.out_len() * weight.out_channels() {
        return Err(Error::shape_mismatch(
            &[rulebook.out_len(), weight.out_channels()],
            &[d_output.len()],
        ));
    }
    Ok(conv::indice_conv_backward(
        input.features(),
        weight,
        rulebook,
        d_output,
    ))
}

/// Sparse max pooling over the kernel footprint of `geometry`
///
/// Returns the pooled tensor, the recorded per-channel argmax rows for
/// the backward pass, and the rulebook handle. Rulebook caching behaves
/// as in [`sparse_conv`]; pooling and convolution invocations with the
/// same geometry can share an entry.
pub fn sparse_max_pool<T: Element>(
    input: &SparseTensor<T>,
    geometry: &ConvGeometry,
    cache: Option<(&RulebookCache, &str)>,
) -> Result<(SparseTensor<T>, PoolIndices, Arc<Rulebook>)> {
    let rulebook = acquire_rulebook(input, geometry, ConvMode::Standard, cache)?;
    let (out_features, indices) =
        pool::indice_maxpool_forward(input.features(), input.channels(), &rulebook);
    let output = SparseTensor::from_parts(
        out_features,
        input.channels(),
        rulebook.out_coords().clone(),
        rulebook.out_spatial_shape().clone(),
        input.batch_size(),
    );
    Ok((output, indices, rulebook))
}

/// Backward pass of sparse max pooling
///
/// Routes each output-channel gradient to the input row recorded as its
/// maximum; rows that never received a contribution route nothing.
///
/// # Errors
///
/// [`Error::ShapeMismatch`] when `d_output` does not have one value per
/// recorded `(output row, channel)` slot.
pub fn sparse_max_pool_backward<T: Element>(
    input_rows: usize,
    indices: &PoolIndices,
    d_output: &[T],
) -> Result<Vec<T>> {
    if d_output.len() != indices.out_rows() * indices.channels() {
        return Err(Error::shape_mismatch(
            &[indices.out_rows(), indices.channels()],
            &[d_output.len()],
        ));
    }
    Ok(pool::indice_maxpool_backward(input_rows, indices, d_output))
}

fn validate_weight<T: Element>(
    weight: &ConvWeights<T>,
    in_channels: usize,
    kernel_volume: usize,
) -> Result<()> {
    if weight.in_channels() != in_channels || weight.kernel_volume() != kernel_volume {
        return Err(Error::shape_mismatch(
            &[kernel_volume, in_channels, weight.out_channels()],
            &[
                weight.kernel_volume(),
                weight.in_channels(),
                weight.out_channels(),
            ],
        ));
    }
    Ok(())
}

/// Fetch a cached rulebook or build and publish a new one
fn acquire_rulebook<T: Element>(
    input: &SparseTensor<T>,
    geometry: &ConvGeometry,
    mode: ConvMode,
    cache: Option<(&RulebookCache, &str)>,
) -> Result<Arc<Rulebook>> {
    match cache {
        Some((cache, key)) => {
            if let Some(rulebook) = cache.get(key) {
                if rulebook.mode() != mode
                    || !rulebook.matches_input(
                        input.indices(),
                        input.spatial_shape(),
                        input.batch_size(),
                        geometry,
                    )
                {
                    return Err(Error::reuse_mismatch(
                        key,
                        "stored rulebook was built for a different input set, geometry, or mode",
                    ));
                }
                Ok(rulebook)
            } else {
                let rulebook = build_rulebook(
                    input.indices(),
                    input.spatial_shape(),
                    input.batch_size(),
                    geometry,
                    mode,
                )?;
                Ok(cache.insert(key, rulebook))
            }
        }
        None => Ok(Arc::new(build_rulebook(
            input.indices(),
            input.spatial_shape(),
            input.batch_size(),
            geometry,
            mode,
        )?)),
    }
}
