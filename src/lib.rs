//! # voxr
//!
//! **Spatially-sparse N-dimensional convolution for Rust.**
//!
//! voxr implements the active-site formulation of sparse convolution used
//! for voxelized 3-D data (LiDAR scans, medical volumes): features live
//! only at occupied coordinates, and convolution runs over a precomputed
//! *rulebook* connecting input sites to output sites per kernel offset.
//!
//! ## What's inside
//!
//! - **Sparse tensors**: feature rows plus integer coordinates, validated
//!   on ingest
//! - **Rulebooks**: standard, submanifold, and transposed connectivity,
//!   built once and shared across forward and backward passes
//! - **Rulebook reuse**: a session-owned cache lets an inverse
//!   convolution mirror a prior downsampling convolution exactly
//! - **Gather-scatter engine**: convolution forward/backward as
//!   per-offset gather, GEMM, scatter-add
//! - **Max pooling**: per-channel argmax recorded forward, deterministic
//!   gradient routing backward
//! - **Densification**: scatter to a dense tensor (channel-first or
//!   channel-last) and gather dense gradients back
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use voxr::prelude::*;
//!
//! let input = SparseTensor::new(features, 64, coords, Shape::from([19, 18, 17]), 2)?;
//! let geometry = ConvGeometry::uniform(3, 3, 1, 1, 1)?;
//! let (output, rulebook) = sparse_conv(&input, &weight, &geometry, ConvMode::Standard, None)?;
//! let (d_input, d_weight) = sparse_conv_backward(&input, &weight, &rulebook, d_output)?;
//! ```
//!
//! ## Determinism
//!
//! Kernel offsets are processed sequentially and the per-offset pair
//! lists are one-to-one in both roles, so parallel workers never touch
//! the same row; outputs are bit-identical across runs and thread counts.
//!
//! ## Feature Flags
//!
//! - `rayon` (default): multi-threaded kernels
//! - `f16`: half-precision feature scalars (f16, bf16)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dtype;
pub mod error;
pub mod geometry;
pub mod index;
pub mod ops;
pub mod rulebook;
pub mod tensor;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::dtype::Element;
    pub use crate::error::{Error, Result};
    pub use crate::geometry::ConvGeometry;
    pub use crate::ops::{
        ConvWeights, PoolIndices, from_dense_grad, sparse_conv, sparse_conv_backward,
        sparse_inverse_conv, sparse_max_pool, sparse_max_pool_backward, to_dense,
    };
    pub use crate::rulebook::{ConvMode, Rulebook, RulebookCache};
    pub use crate::tensor::{Coordinates, DenseLayout, DenseTensor, Shape, SparseTensor};
}
