//! Convolution weight tensor

use crate::dtype::Element;
use crate::error::{Error, Result};

/// Weight tensor of one sparse convolution, shaped
/// `(kernel_volume, in_channels, out_channels)` row-major
///
/// The kernel-volume axis is indexed by the same offset order rulebooks
/// use ([`crate::geometry::ConvGeometry::offsets`]).
#[derive(Clone)]
pub struct ConvWeights<T: Element> {
    data: Vec<T>,
    kernel_volume: usize,
    in_channels: usize,
    out_channels: usize,
}

impl<T: Element> ConvWeights<T> {
    /// Wrap a flat weight buffer
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] if `data.len()` is not
    /// `kernel_volume * in_channels * out_channels`, and
    /// [`Error::InvalidArgument`] for zero dimensions.
    pub fn from_vec(
        data: Vec<T>,
        kernel_volume: usize,
        in_channels: usize,
        out_channels: usize,
    ) -> Result<Self> {
        if kernel_volume == 0 || in_channels == 0 || out_channels == 0 {
            return Err(Error::invalid_argument(
                "weight",
                "all weight dimensions must be > 0",
            ));
        }
        if data.len() != kernel_volume * in_channels * out_channels {
            return Err(Error::shape_mismatch(
                &[kernel_volume, in_channels, out_channels],
                &[data.len()],
            ));
        }
        Ok(Self {
            data,
            kernel_volume,
            in_channels,
            out_channels,
        })
    }

    /// Zero-initialized weights, for accumulating gradients
    pub fn zeros(kernel_volume: usize, in_channels: usize, out_channels: usize) -> Self {
        Self {
            data: vec![T::zero(); kernel_volume * in_channels * out_channels],
            kernel_volume,
            in_channels,
            out_channels,
        }
    }

    /// Number of kernel offsets
    #[inline]
    pub fn kernel_volume(&self) -> usize {
        self.kernel_volume
    }

    /// Input channel count
    #[inline]
    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    /// Output channel count
    #[inline]
    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// The flat buffer
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// One offset's `in_channels x out_channels` matrix
    #[inline]
    pub fn offset(&self, k: usize) -> &[T] {
        let size = self.in_channels * self.out_channels;
        &self.data[k * size..(k + 1) * size]
    }

    /// Mutable view of one offset's matrix
    #[inline]
    pub(crate) fn offset_mut(&mut self, k: usize) -> &mut [T] {
        let size = self.in_channels * self.out_channels;
        &mut self.data[k * size..(k + 1) * size]
    }
}

impl<T: Element> std::fmt::Debug for ConvWeights<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvWeights")
            .field("kernel_volume", &self.kernel_volume)
            .field("in_channels", &self.in_channels)
            .field("out_channels", &self.out_channels)
            .finish()
    }
}
