//! Active-site coordinate buffer
//!
//! Coordinates are stored exactly as they cross the ingest boundary: a flat
//! row-major `i32` buffer, one row per active site, `1 + ndim` columns with
//! the batch index in column 0. Ingest is therefore a move, not a copy.

use crate::error::{Error, Result};

use super::shape::Shape;

/// Flat buffer of active-site coordinates, one `(batch, spatial...)` row
/// per site
#[derive(Clone, PartialEq, Eq)]
pub struct Coordinates {
    data: Vec<i32>,
    ndim: usize,
}

impl Coordinates {
    /// Create a coordinate buffer from a flat row-major vector
    ///
    /// `data` holds `rows * (1 + ndim)` entries; the batch index occupies
    /// column 0 of each row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] if the buffer length is not a
    /// multiple of the row width.
    pub fn from_vec(data: Vec<i32>, ndim: usize) -> Result<Self> {
        let width = 1 + ndim;
        if ndim == 0 || !data.len().is_multiple_of(width) {
            return Err(Error::shape_mismatch(
                &[data.len() / width.max(1), width],
                &[data.len()],
            ));
        }
        Ok(Self { data, ndim })
    }

    /// Create an empty buffer for sites of the given spatial dimensionality
    pub fn empty(ndim: usize) -> Self {
        Self {
            data: Vec::new(),
            ndim,
        }
    }

    /// Create an empty buffer with capacity for `rows` sites
    pub fn with_capacity(ndim: usize, rows: usize) -> Self {
        Self {
            data: Vec::with_capacity(rows * (1 + ndim)),
            ndim,
        }
    }

    /// Number of spatial dimensions (row width minus the batch column)
    #[inline]
    pub fn ndim(&self) -> usize {
        self.ndim
    }

    /// Number of active-site rows
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() / (1 + self.ndim)
    }

    /// Whether the buffer holds no sites
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// One coordinate row: `[batch, x0, x1, ...]`
    #[inline]
    pub fn row(&self, i: usize) -> &[i32] {
        let w = 1 + self.ndim;
        &self.data[i * w..(i + 1) * w]
    }

    /// Iterator over coordinate rows
    pub fn rows(&self) -> impl Iterator<Item = &[i32]> {
        self.data.chunks_exact(1 + self.ndim)
    }

    /// The underlying flat buffer
    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    /// Append one coordinate row
    pub(crate) fn push_row(&mut self, row: &[i32]) {
        debug_assert_eq!(row.len(), 1 + self.ndim);
        self.data.extend_from_slice(row);
    }

    /// Validate every row against the spatial shape and batch size
    ///
    /// # Errors
    ///
    /// Returns [`Error::CoordinateOutOfBounds`] naming the first offending
    /// row, column, and value.
    pub fn validate_bounds(&self, spatial_shape: &Shape, batch_size: usize) -> Result<()> {
        if spatial_shape.ndim() != self.ndim {
            return Err(Error::shape_mismatch(spatial_shape, &[self.ndim]));
        }
        for (r, row) in self.rows().enumerate() {
            if row[0] < 0 || row[0] as usize >= batch_size {
                return Err(Error::CoordinateOutOfBounds {
                    row: r,
                    col: 0,
                    value: row[0],
                    bound: batch_size,
                });
            }
            for (d, (&x, &bound)) in row[1..].iter().zip(spatial_shape.iter()).enumerate() {
                if x < 0 || x as usize >= bound {
                    return Err(Error::CoordinateOutOfBounds {
                        row: r,
                        col: 1 + d,
                        value: x,
                        bound,
                    });
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinates")
            .field("rows", &self.len())
            .field("ndim", &self.ndim)
            .finish()
    }
}

/// Linearize one in-bounds coordinate row into a single hash key
///
/// Row-major over `(batch, x0, x1, ...)`; distinct in-bounds rows produce
/// distinct keys.
#[inline]
pub(crate) fn linear_key(row: &[i32], spatial_shape: &[usize]) -> u64 {
    let mut key = row[0] as u64;
    for (&x, &bound) in row[1..].iter().zip(spatial_shape) {
        key = key * bound as u64 + x as u64;
    }
    key
}
