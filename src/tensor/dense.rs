//! Minimal dense tensor for the densification boundary

use crate::dtype::Element;
use crate::error::{Error, Result};

use super::shape::Shape;

/// Memory layout of a densified tensor
///
/// A pure layout switch at the boundary; the scattered values are the same
/// either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenseLayout {
    /// `(batch, channels, *spatial)`
    ChannelsFirst,
    /// `(batch, *spatial, channels)`
    ChannelsLast,
}

/// A dense, contiguous, row-major tensor
///
/// Only produced and consumed at the densification boundary; voxr does no
/// dense tensor algebra.
#[derive(Clone)]
pub struct DenseTensor<T> {
    data: Vec<T>,
    shape: Shape,
}

impl<T: Element> DenseTensor<T> {
    /// A zero-filled tensor of the given shape
    pub fn zeros(shape: Shape) -> Self {
        let numel = shape.numel();
        Self {
            data: vec![T::zero(); numel],
            shape,
        }
    }

    /// Wrap an existing flat row-major buffer
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] when `data.len()` differs from
    /// `shape.numel()`.
    pub fn from_vec(data: Vec<T>, shape: Shape) -> Result<Self> {
        if data.len() != shape.numel() {
            return Err(Error::shape_mismatch(&shape, &[data.len()]));
        }
        Ok(Self { data, shape })
    }

    /// The tensor shape
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// The flat row-major buffer
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Mutable access to the flat buffer
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Total element count
    #[inline]
    pub fn numel(&self) -> usize {
        self.data.len()
    }
}

impl<T: Element> std::fmt::Debug for DenseTensor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DenseTensor")
            .field("shape", &self.shape)
            .finish()
    }
}
