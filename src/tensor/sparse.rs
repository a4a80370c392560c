//! Sparse tensor: per-site feature vectors plus their coordinates

use crate::dtype::Element;
use crate::error::{Error, Result};

use super::coords::Coordinates;
use super::dense::{DenseLayout, DenseTensor};
use super::shape::Shape;

/// A spatially-sparse tensor: one feature vector per active site
///
/// Invariants, enforced at construction:
/// - the feature buffer holds exactly `rows * channels` values, where
///   `rows` is the number of coordinate rows;
/// - every coordinate lies in `[0, shape)` per spatial dimension and its
///   batch index in `[0, batch_size)`.
///
/// Per-batch coordinate uniqueness is the ingest contract; row order is
/// stable and preserved between forward and backward passes.
#[derive(Clone)]
pub struct SparseTensor<T: Element> {
    features: Vec<T>,
    channels: usize,
    indices: Coordinates,
    spatial_shape: Shape,
    batch_size: usize,
}

impl<T: Element> SparseTensor<T> {
    /// Create a sparse tensor from its parts, validating the invariants
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] for zero channels or batch size
    /// - [`Error::ShapeMismatch`] when the feature buffer does not hold
    ///   one `channels`-length vector per coordinate row
    /// - [`Error::CoordinateOutOfBounds`] for any out-of-range coordinate
    pub fn new(
        features: Vec<T>,
        channels: usize,
        indices: Coordinates,
        spatial_shape: Shape,
        batch_size: usize,
    ) -> Result<Self> {
        if channels == 0 {
            return Err(Error::invalid_argument("channels", "must be > 0"));
        }
        if batch_size == 0 {
            return Err(Error::invalid_argument("batch_size", "must be > 0"));
        }
        if features.len() != indices.len() * channels {
            return Err(Error::shape_mismatch(
                &[indices.len(), channels],
                &[features.len()],
            ));
        }
        indices.validate_bounds(&spatial_shape, batch_size)?;
        Ok(Self {
            features,
            channels,
            indices,
            spatial_shape,
            batch_size,
        })
    }

    /// Construct without re-validating; for engine outputs whose parts are
    /// valid by construction
    pub(crate) fn from_parts(
        features: Vec<T>,
        channels: usize,
        indices: Coordinates,
        spatial_shape: Shape,
        batch_size: usize,
    ) -> Self {
        debug_assert_eq!(features.len(), indices.len() * channels);
        Self {
            features,
            channels,
            indices,
            spatial_shape,
            batch_size,
        }
    }

    /// Number of active sites
    #[inline]
    pub fn rows(&self) -> usize {
        self.indices.len()
    }

    /// Feature vector length per site
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// The flat feature buffer, `rows x channels` row-major
    pub fn features(&self) -> &[T] {
        &self.features
    }

    /// Mutable access to the flat feature buffer
    pub fn features_mut(&mut self) -> &mut [T] {
        &mut self.features
    }

    /// One site's feature vector
    #[inline]
    pub fn feature_row(&self, i: usize) -> &[T] {
        &self.features[i * self.channels..(i + 1) * self.channels]
    }

    /// The coordinate buffer
    pub fn indices(&self) -> &Coordinates {
        &self.indices
    }

    /// Declared spatial shape
    pub fn spatial_shape(&self) -> &Shape {
        &self.spatial_shape
    }

    /// Number of batch samples
    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Scatter this tensor into a dense tensor
    ///
    /// Unvisited positions are zero. See [`crate::ops::to_dense`].
    pub fn to_dense(&self, layout: DenseLayout) -> DenseTensor<T> {
        crate::ops::to_dense(self, layout)
    }
}

impl<T: Element> std::fmt::Debug for SparseTensor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparseTensor")
            .field("rows", &self.rows())
            .field("channels", &self.channels)
            .field("spatial_shape", &self.spatial_shape)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}
