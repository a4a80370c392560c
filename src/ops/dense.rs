//! Densification: scatter sparse features into a dense tensor, and the
//! inverse gather that routes dense gradients back onto sparse sites
//!
//! Pure data movement in both directions; round-tripping reproduces the
//! original features exactly.

use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::tensor::{DenseLayout, DenseTensor, Shape, SparseTensor};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Row count below which parallel dispatch is not worth the overhead
#[cfg(feature = "rayon")]
const PARALLEL_THRESHOLD: usize = 256;

/// Dense shape of a densified sparse tensor under the given layout
pub fn dense_shape<T: Element>(tensor: &SparseTensor<T>, layout: DenseLayout) -> Shape {
    let mut shape = Shape::new();
    shape.push(tensor.batch_size());
    match layout {
        DenseLayout::ChannelsFirst => {
            shape.push(tensor.channels());
            for &s in tensor.spatial_shape().iter() {
                shape.push(s);
            }
        }
        DenseLayout::ChannelsLast => {
            for &s in tensor.spatial_shape().iter() {
                shape.push(s);
            }
            shape.push(tensor.channels());
        }
    }
    shape
}

/// Maps a coordinate row to the dense offset of its channel-0 element;
/// consecutive channels sit `channel_stride` apart
struct SiteIndexer {
    spatial: Vec<usize>,
    volume: usize,
    channels: usize,
    channels_first: bool,
    channel_stride: usize,
}

impl SiteIndexer {
    fn new(spatial_shape: &Shape, channels: usize, layout: DenseLayout) -> Self {
        let spatial: Vec<usize> = spatial_shape.to_vec();
        let volume: usize = spatial.iter().product();
        let channels_first = layout == DenseLayout::ChannelsFirst;
        Self {
            spatial,
            volume,
            channels,
            channels_first,
            channel_stride: if channels_first { volume } else { 1 },
        }
    }

    #[inline]
    fn base(&self, row: &[i32]) -> usize {
        let mut site = 0usize;
        for (&x, &s) in row[1..].iter().zip(&self.spatial) {
            site = site * s + x as usize;
        }
        if self.channels_first {
            // (batch, channels, *spatial)
            row[0] as usize * self.channels * self.volume + site
        } else {
            // (batch, *spatial, channels)
            (row[0] as usize * self.volume + site) * self.channels
        }
    }
}

/// Scatter every active site's feature vector into a zero-filled dense
/// tensor at its batch and spatial coordinate
pub fn to_dense<T: Element>(tensor: &SparseTensor<T>, layout: DenseLayout) -> DenseTensor<T> {
    let shape = dense_shape(tensor, layout);
    let mut dense = DenseTensor::zeros(shape);
    let channels = tensor.channels();
    let indexer = SiteIndexer::new(tensor.spatial_shape(), channels, layout);

    let data = dense.data_mut();
    for (row, features) in tensor
        .indices()
        .rows()
        .zip(tensor.features().chunks_exact(channels))
    {
        let base = indexer.base(row);
        for (c, &v) in features.iter().enumerate() {
            data[base + c * indexer.channel_stride] = v;
        }
    }
    dense
}

/// Gather the dense gradient at each active site back into sparse
/// gradient rows, in the forward tensor's site order
///
/// # Errors
///
/// Returns [`Error::ShapeMismatch`] when `grad`'s shape is not the dense
/// shape of `reference` under `layout`.
pub fn from_dense_grad<T: Element>(
    grad: &DenseTensor<T>,
    reference: &SparseTensor<T>,
    layout: DenseLayout,
) -> Result<Vec<T>> {
    let expected = dense_shape(reference, layout);
    if grad.shape() != &expected {
        return Err(Error::shape_mismatch(&expected, grad.shape()));
    }

    let channels = reference.channels();
    let indexer = SiteIndexer::new(reference.spatial_shape(), channels, layout);
    let data = grad.data();
    let mut sparse_grad = vec![T::zero(); reference.rows() * channels];

    #[cfg(feature = "rayon")]
    if reference.rows() >= PARALLEL_THRESHOLD {
        let coords: Vec<&[i32]> = reference.indices().rows().collect();
        sparse_grad
            .par_chunks_mut(channels)
            .zip(coords.par_iter())
            .for_each(|(out_row, coord_row)| {
                let base = indexer.base(coord_row);
                for (c, o) in out_row.iter_mut().enumerate() {
                    *o = data[base + c * indexer.channel_stride];
                }
            });
        return Ok(sparse_grad);
    }

    for (out_row, coord_row) in sparse_grad
        .chunks_mut(channels)
        .zip(reference.indices().rows())
    {
        let base = indexer.base(coord_row);
        for (c, o) in out_row.iter_mut().enumerate() {
            *o = data[base + c * indexer.channel_stride];
        }
    }
    Ok(sparse_grad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Coordinates;

    fn small_tensor() -> SparseTensor<f32> {
        let coords = Coordinates::from_vec(vec![0, 0, 1, 1, 1, 0], 2).unwrap();
        SparseTensor::new(
            vec![1.0, 2.0, 3.0, 4.0],
            2,
            coords,
            Shape::from([2, 2]),
            2,
        )
        .unwrap()
    }

    #[test]
    fn test_to_dense_channels_first() {
        let dense = to_dense(&small_tensor(), DenseLayout::ChannelsFirst);
        assert_eq!(dense.shape().as_slice(), &[2, 2, 2, 2]);
        let d = dense.data();
        // Site (b=0, x=0, y=1), channels 0/1 sit one spatial volume apart
        assert_eq!(d[1], 1.0);
        assert_eq!(d[4 + 1], 2.0);
        // Site (b=1, x=1, y=0)
        assert_eq!(d[8 + 2], 3.0);
        assert_eq!(d[8 + 4 + 2], 4.0);
        // Everything else is zero
        assert_eq!(d.iter().filter(|&&v| v != 0.0).count(), 4);
    }

    #[test]
    fn test_to_dense_channels_last() {
        let dense = to_dense(&small_tensor(), DenseLayout::ChannelsLast);
        assert_eq!(dense.shape().as_slice(), &[2, 2, 2, 2]);
        let d = dense.data();
        // Site (b=0, x=0, y=1): base ((0*2+0)*2+1)*2 = 2
        assert_eq!(&d[2..4], &[1.0, 2.0]);
        // Site (b=1, x=1, y=0): base ((1*2+1)*2+0)*2 = 12
        assert_eq!(&d[12..14], &[3.0, 4.0]);
    }

    #[test]
    fn test_roundtrip_is_exact() {
        let tensor = small_tensor();
        for layout in [DenseLayout::ChannelsFirst, DenseLayout::ChannelsLast] {
            let dense = to_dense(&tensor, layout);
            let back = from_dense_grad(&dense, &tensor, layout).unwrap();
            assert_eq!(back, tensor.features());
        }
    }

    #[test]
    fn test_from_dense_grad_rejects_wrong_shape() {
        // 3 channels so the two layouts produce different dense shapes
        let coords = Coordinates::from_vec(vec![0, 0, 1], 2).unwrap();
        let tensor =
            SparseTensor::new(vec![1.0f32, 2.0, 3.0], 3, coords, Shape::from([2, 2]), 1).unwrap();
        let dense = to_dense(&tensor, DenseLayout::ChannelsFirst);
        let err = from_dense_grad(&dense, &tensor, DenseLayout::ChannelsLast).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }
}
