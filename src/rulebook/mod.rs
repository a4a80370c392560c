//! Rulebook: precomputed connectivity for one convolution or pooling
//! geometry
//!
//! A rulebook maps (kernel offset, input row) to output row for every
//! connection the geometry induces between active sites. It is built once,
//! shared as `Arc`, and reused by the forward pass, both backward passes,
//! and any paired inverse convolution; it is never mutated after
//! construction.

mod build;
mod cache;

pub use build::{build_inverse_rulebook, build_rulebook};
pub use cache::RulebookCache;

use crate::geometry::ConvGeometry;
use crate::tensor::{Coordinates, Shape};

/// How output coordinates are derived from input coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvMode {
    /// Output set is the union of all reachable downsampled coordinates
    Standard,
    /// Output coordinates equal input coordinates exactly (stride 1)
    Submanifold,
    /// Upsampling: the transposed coordinate transform
    Transposed,
    /// Mirror of a paired rulebook, with input/output roles swapped
    Inverse,
}

/// Connectivity of one convolution/pooling invocation
///
/// `pairs()[k]` holds the `(input row, output row)` pairs for kernel
/// offset `k`. For a fixed offset the coordinate transform is injective
/// both ways, so each input row and each output row appears at most once
/// per offset; the engines rely on this to keep accumulation
/// deterministic.
pub struct Rulebook {
    mode: ConvMode,
    geometry: ConvGeometry,
    pairs: Vec<Vec<(u32, u32)>>,
    in_coords: Coordinates,
    out_coords: Coordinates,
    in_spatial_shape: Shape,
    out_spatial_shape: Shape,
    batch_size: usize,
}

impl Rulebook {
    /// The mode this rulebook was built in
    pub fn mode(&self) -> ConvMode {
        self.mode
    }

    /// The geometry this rulebook was built for
    pub fn geometry(&self) -> &ConvGeometry {
        &self.geometry
    }

    /// Per-offset `(input row, output row)` pair lists
    pub fn pairs(&self) -> &[Vec<(u32, u32)>] {
        &self.pairs
    }

    /// Kernel volume (number of offsets)
    pub fn kernel_volume(&self) -> usize {
        self.pairs.len()
    }

    /// Total number of pairs across all offsets
    pub fn total_pairs(&self) -> usize {
        self.pairs.iter().map(Vec::len).sum()
    }

    /// The input active-site set the rulebook was built over
    pub fn in_coords(&self) -> &Coordinates {
        &self.in_coords
    }

    /// The output active-site set the rulebook produces
    pub fn out_coords(&self) -> &Coordinates {
        &self.out_coords
    }

    /// Number of input rows
    pub fn in_len(&self) -> usize {
        self.in_coords.len()
    }

    /// Number of output rows
    pub fn out_len(&self) -> usize {
        self.out_coords.len()
    }

    /// Spatial shape of the input volume
    pub fn in_spatial_shape(&self) -> &Shape {
        &self.in_spatial_shape
    }

    /// Spatial shape of the output volume
    pub fn out_spatial_shape(&self) -> &Shape {
        &self.out_spatial_shape
    }

    /// Batch size the rulebook was built for
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Whether this rulebook can serve an invocation over the given input
    /// set unchanged
    pub(crate) fn matches_input(
        &self,
        coords: &Coordinates,
        spatial_shape: &Shape,
        batch_size: usize,
        geometry: &ConvGeometry,
    ) -> bool {
        self.batch_size == batch_size
            && &self.in_spatial_shape == spatial_shape
            && &self.geometry == geometry
            && &self.in_coords == coords
    }
}

impl std::fmt::Debug for Rulebook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rulebook")
            .field("mode", &self.mode)
            .field("kernel_volume", &self.kernel_volume())
            .field("in_len", &self.in_len())
            .field("out_len", &self.out_len())
            .field("total_pairs", &self.total_pairs())
            .finish()
    }
}
