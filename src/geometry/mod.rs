//! Convolution geometry: kernel shape, stride, padding, dilation
//!
//! All quantities are per spatial dimension and may differ across
//! dimensions. Validation happens once, up front, before any rulebook or
//! feature work starts.

use crate::error::{Error, Result};
use crate::tensor::Shape;

/// Per-dimension convolution geometry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvGeometry {
    kernel_size: Shape,
    stride: Shape,
    padding: Shape,
    dilation: Shape,
}

impl ConvGeometry {
    /// Create a geometry from per-dimension vectors
    ///
    /// # Errors
    ///
    /// - [`Error::ShapeMismatch`] if the vectors differ in length
    /// - [`Error::InvalidArgument`] for zero kernel sizes, strides, or
    ///   dilations
    /// - [`Error::UnsupportedGeometry`] when any stride exceeds 1 while
    ///   any dilation also exceeds 1; the engine rejects this combination
    ///   outright rather than producing unvalidated output
    pub fn new(kernel_size: Shape, stride: Shape, padding: Shape, dilation: Shape) -> Result<Self> {
        let ndim = kernel_size.ndim();
        if ndim == 0 {
            return Err(Error::invalid_argument(
                "kernel_size",
                "needs at least one spatial dimension",
            ));
        }
        for other in [&stride, &padding, &dilation] {
            if other.ndim() != ndim {
                return Err(Error::shape_mismatch(&kernel_size, other));
            }
        }
        for (name, values) in [("kernel_size", &kernel_size), ("stride", &stride), ("dilation", &dilation)] {
            if values.iter().any(|&v| v == 0) {
                return Err(Error::invalid_argument(name, format!("must be > 0, got {values:?}")));
            }
        }
        if stride.iter().any(|&s| s > 1) && dilation.iter().any(|&d| d > 1) {
            return Err(Error::unsupported_geometry(format!(
                "stride {stride:?} > 1 combined with dilation {dilation:?} > 1 is not supported"
            )));
        }
        Ok(Self {
            kernel_size,
            stride,
            padding,
            dilation,
        })
    }

    /// Uniform geometry: the same kernel size, stride, padding, and
    /// dilation in every spatial dimension
    pub fn uniform(
        ndim: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
        dilation: usize,
    ) -> Result<Self> {
        Self::new(
            std::iter::repeat_n(kernel_size, ndim).collect(),
            std::iter::repeat_n(stride, ndim).collect(),
            std::iter::repeat_n(padding, ndim).collect(),
            std::iter::repeat_n(dilation, ndim).collect(),
        )
    }

    /// Geometry for a submanifold convolution: stride 1 and the padding
    /// that keeps the kernel centered, so the identity offset maps each
    /// site onto itself
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for even kernel sizes, which
    /// have no center.
    pub fn submanifold(ndim: usize, kernel_size: usize, dilation: usize) -> Result<Self> {
        if kernel_size.is_multiple_of(2) {
            return Err(Error::invalid_argument(
                "kernel_size",
                format!("submanifold convolution needs an odd kernel, got {kernel_size}"),
            ));
        }
        let padding = dilation * (kernel_size - 1) / 2;
        Self::uniform(ndim, kernel_size, 1, padding, dilation)
    }

    /// Number of spatial dimensions
    #[inline]
    pub fn ndim(&self) -> usize {
        self.kernel_size.ndim()
    }

    /// Per-dimension kernel sizes
    pub fn kernel_size(&self) -> &Shape {
        &self.kernel_size
    }

    /// Per-dimension strides
    pub fn stride(&self) -> &Shape {
        &self.stride
    }

    /// Per-dimension paddings
    pub fn padding(&self) -> &Shape {
        &self.padding
    }

    /// Per-dimension dilations
    pub fn dilation(&self) -> &Shape {
        &self.dilation
    }

    /// Whether every stride is 1
    pub fn is_unit_stride(&self) -> bool {
        self.stride.iter().all(|&s| s == 1)
    }

    /// Product of per-dimension kernel sizes
    #[inline]
    pub fn kernel_volume(&self) -> usize {
        self.kernel_size.numel()
    }

    /// Output spatial shape of a regular convolution over `in_shape`
    ///
    /// Per dimension: `floor((in + 2p - d*(k - 1) - 1) / s) + 1`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the dilated kernel does not
    /// fit the padded input in some dimension (the output would be empty)
    /// or if `in_shape` has the wrong dimensionality.
    pub fn out_shape(&self, in_shape: &Shape) -> Result<Shape> {
        self.check_ndim(in_shape)?;
        let mut out = Shape::new();
        for d in 0..self.ndim() {
            let size = conv_output_size(
                in_shape[d],
                self.kernel_size[d],
                self.stride[d],
                self.padding[d],
                self.dilation[d],
            );
            if size == 0 {
                return Err(Error::invalid_argument(
                    "padding",
                    format!(
                        "kernel {:?} with padding {:?} does not fit input shape {:?} in dimension {}",
                        self.kernel_size, self.padding, in_shape, d
                    ),
                ));
            }
            out.push(size);
        }
        Ok(out)
    }

    /// Output spatial shape of a transposed convolution over `in_shape`
    ///
    /// Per dimension: `(in - 1)*s - 2p + d*(k - 1) + 1`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when padding consumes the whole
    /// upsampled extent in some dimension.
    pub fn transposed_out_shape(&self, in_shape: &Shape) -> Result<Shape> {
        self.check_ndim(in_shape)?;
        let mut out = Shape::new();
        for d in 0..self.ndim() {
            let grown =
                (in_shape[d] - 1) * self.stride[d] + self.dilation[d] * (self.kernel_size[d] - 1) + 1;
            let size = grown.saturating_sub(2 * self.padding[d]);
            if size == 0 {
                return Err(Error::invalid_argument(
                    "padding",
                    format!(
                        "padding {:?} leaves no transposed output for input shape {:?} in dimension {}",
                        self.padding, in_shape, d
                    ),
                ));
            }
            out.push(size);
        }
        Ok(out)
    }

    /// Iterator over the kernel volume's per-dimension offsets, row-major
    /// (last dimension fastest); the iteration position is the kernel
    /// offset index used by rulebooks and weight tensors
    pub fn offsets(&self) -> KernelOffsets<'_> {
        KernelOffsets {
            kernel_size: &self.kernel_size,
            current: std::iter::repeat_n(0usize, self.ndim()).collect(),
            done: self.kernel_volume() == 0,
        }
    }

    fn check_ndim(&self, in_shape: &Shape) -> Result<()> {
        if in_shape.ndim() != self.ndim() {
            return Err(Error::shape_mismatch(&self.kernel_size, in_shape));
        }
        if in_shape.iter().any(|&s| s == 0) {
            return Err(Error::invalid_argument(
                "spatial_shape",
                format!("dimensions must be > 0, got {in_shape:?}"),
            ));
        }
        Ok(())
    }
}

/// Output size of one dimension of a regular convolution
#[inline]
pub fn conv_output_size(
    input_size: usize,
    kernel_size: usize,
    stride: usize,
    padding: usize,
    dilation: usize,
) -> usize {
    let effective_kernel = dilation * (kernel_size - 1) + 1;
    let padded = input_size + 2 * padding;
    if padded < effective_kernel {
        0
    } else {
        (padded - effective_kernel) / stride + 1
    }
}

/// Row-major iterator over kernel offset multi-indices
pub struct KernelOffsets<'a> {
    kernel_size: &'a Shape,
    current: Shape,
    done: bool,
}

impl Iterator for KernelOffsets<'_> {
    type Item = Shape;

    fn next(&mut self) -> Option<Shape> {
        if self.done {
            return None;
        }
        let item = self.current.clone();
        // Odometer increment, last dimension fastest
        let mut d = self.kernel_size.ndim();
        loop {
            if d == 0 {
                self.done = true;
                break;
            }
            d -= 1;
            self.current[d] += 1;
            if self.current[d] < self.kernel_size[d] {
                break;
            }
            self.current[d] = 0;
        }
        Some(item)
    }
}
