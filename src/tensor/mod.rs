//! Sparse and dense tensor containers
//!
//! The central type is [`SparseTensor`]: the tuple of a feature buffer
//! (`rows x channels`), a coordinate buffer (`rows x (1 + ndim)` with the
//! batch index first), the declared spatial shape, and the batch size.
//! [`DenseTensor`] exists only for the densification boundary.

mod coords;
mod dense;
mod shape;
mod sparse;

pub(crate) use coords::linear_key;

pub use coords::Coordinates;
pub use dense::{DenseLayout, DenseTensor};
pub use shape::Shape;
pub use sparse::SparseTensor;
