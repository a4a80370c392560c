//! Coordinate index: hash lookup from (batch, spatial) coordinate to row
//!
//! Built once per rulebook construction and discarded afterwards. Rows are
//! assigned in first-occurrence order, which is the canonical active-site
//! order everywhere in the crate; gradient correspondence depends on it.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::tensor::{Coordinates, Shape, linear_key};

/// Deduplicating coordinate-to-row index
#[derive(Debug)]
pub struct CoordIndex {
    map: HashMap<u64, u32>,
    coords: Coordinates,
    spatial_shape: Shape,
}

impl CoordIndex {
    /// Build an index over a coordinate buffer in O(n)
    ///
    /// Duplicate rows collapse onto the first occurrence unless
    /// `require_unique` is set, in which case the first duplicate fails
    /// the build.
    ///
    /// # Errors
    ///
    /// - [`Error::CoordinateOutOfBounds`] for any out-of-range row
    /// - [`Error::DuplicateCoordinate`] under `require_unique`
    pub fn build(
        coords: &Coordinates,
        spatial_shape: &Shape,
        batch_size: usize,
        require_unique: bool,
    ) -> Result<Self> {
        coords.validate_bounds(spatial_shape, batch_size)?;
        let mut index = Self::empty(coords.ndim(), spatial_shape.clone(), coords.len());
        for (r, row) in coords.rows().enumerate() {
            let before = index.len();
            let assigned = index.insert(row);
            if require_unique && (assigned as usize) < before {
                return Err(Error::DuplicateCoordinate {
                    row: r,
                    first: assigned as usize,
                });
            }
        }
        Ok(index)
    }

    /// An empty index accepting rows of the given dimensionality
    pub(crate) fn empty(ndim: usize, spatial_shape: Shape, capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
            coords: Coordinates::with_capacity(ndim, capacity),
            spatial_shape,
        }
    }

    /// Get-or-insert an in-bounds coordinate row, returning its dense row
    pub(crate) fn insert(&mut self, row: &[i32]) -> u32 {
        let key = linear_key(row, &self.spatial_shape);
        match self.map.entry(key) {
            std::collections::hash_map::Entry::Occupied(e) => *e.get(),
            std::collections::hash_map::Entry::Vacant(e) => {
                let id = self.coords.len() as u32;
                e.insert(id);
                self.coords.push_row(row);
                id
            }
        }
    }

    /// Look up the dense row of an in-bounds coordinate
    #[inline]
    pub fn get(&self, row: &[i32]) -> Option<u32> {
        self.map.get(&linear_key(row, &self.spatial_shape)).copied()
    }

    /// Number of distinct sites indexed so far
    #[inline]
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// Whether the index holds no sites
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// The deduplicated site list, in first-occurrence order
    pub fn coords(&self) -> &Coordinates {
        &self.coords
    }

    /// Consume the index, keeping only the deduplicated site list
    pub fn into_coords(self) -> Coordinates {
        self.coords
    }
}
