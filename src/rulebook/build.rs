//! Rulebook construction
//!
//! The coordinate transform per mode, for input site `x`, kernel offset
//! `k`, stride `s`, padding `p`, dilation `d` (all per dimension):
//!
//! - Standard / Submanifold: `o = (x + p - k*d) / s`, valid when the
//!   division is exact and `o` is inside the output shape. Submanifold
//!   additionally requires `o` to be an existing input site.
//! - Transposed: `o = x*s - p + k*d`, valid when inside the transposed
//!   output shape.

use crate::error::{Error, Result};
use crate::geometry::ConvGeometry;
use crate::index::CoordIndex;
use crate::tensor::{Coordinates, Shape};

use super::{ConvMode, Rulebook};

/// Build a rulebook over an active-site set
///
/// `mode` must be [`ConvMode::Standard`], [`ConvMode::Submanifold`], or
/// [`ConvMode::Transposed`]; inverse rulebooks are derived from a paired
/// rulebook via [`build_inverse_rulebook`].
///
/// # Errors
///
/// - [`Error::InvalidArgument`] for dimensionality mismatches, a
///   non-unit-stride submanifold request, a kernel that does not fit the
///   input shape, or [`ConvMode::Inverse`]
/// - [`Error::CoordinateOutOfBounds`] for out-of-range sites
pub fn build_rulebook(
    coords: &Coordinates,
    spatial_shape: &Shape,
    batch_size: usize,
    geometry: &ConvGeometry,
    mode: ConvMode,
) -> Result<Rulebook> {
    if coords.ndim() != geometry.ndim() {
        return Err(Error::shape_mismatch(
            geometry.kernel_size(),
            &[coords.ndim()],
        ));
    }
    coords.validate_bounds(spatial_shape, batch_size)?;

    match mode {
        ConvMode::Standard => build_projected(coords, spatial_shape, batch_size, geometry, mode),
        ConvMode::Transposed => build_projected(coords, spatial_shape, batch_size, geometry, mode),
        ConvMode::Submanifold => build_submanifold(coords, spatial_shape, batch_size, geometry),
        ConvMode::Inverse => Err(Error::invalid_argument(
            "mode",
            "inverse rulebooks are built from a paired rulebook",
        )),
    }
}

/// Standard and transposed modes: project every input site through every
/// kernel offset and collect the reachable output set in first-occurrence
/// order.
fn build_projected(
    coords: &Coordinates,
    spatial_shape: &Shape,
    batch_size: usize,
    geometry: &ConvGeometry,
    mode: ConvMode,
) -> Result<Rulebook> {
    let transposed = mode == ConvMode::Transposed;
    let out_shape = if transposed {
        geometry.transposed_out_shape(spatial_shape)?
    } else {
        geometry.out_shape(spatial_shape)?
    };

    let ndim = geometry.ndim();
    let offsets: Vec<Shape> = geometry.offsets().collect();
    let mut pairs: Vec<Vec<(u32, u32)>> = vec![Vec::new(); offsets.len()];
    let mut out_index = CoordIndex::empty(ndim, out_shape.clone(), coords.len());

    let mut target = vec![0i32; 1 + ndim];
    for (i, row) in coords.rows().enumerate() {
        target[0] = row[0];
        for (k, offset) in offsets.iter().enumerate() {
            let valid = if transposed {
                transform_transposed(row, offset, geometry, &out_shape, &mut target)
            } else {
                transform_standard(row, offset, geometry, &out_shape, &mut target)
            };
            if valid {
                let out_row = out_index.insert(&target);
                pairs[k].push((i as u32, out_row));
            }
        }
    }

    Ok(Rulebook {
        mode,
        geometry: geometry.clone(),
        pairs,
        in_coords: coords.clone(),
        out_coords: out_index.into_coords(),
        in_spatial_shape: spatial_shape.clone(),
        out_spatial_shape: out_shape,
        batch_size,
    })
}

/// Submanifold mode: the output set is the input set; only connections
/// that land on an existing site are kept.
fn build_submanifold(
    coords: &Coordinates,
    spatial_shape: &Shape,
    batch_size: usize,
    geometry: &ConvGeometry,
) -> Result<Rulebook> {
    if !geometry.is_unit_stride() {
        return Err(Error::invalid_argument(
            "stride",
            format!(
                "submanifold convolution requires stride 1, got {:?}",
                geometry.stride()
            ),
        ));
    }

    let ndim = geometry.ndim();
    let offsets: Vec<Shape> = geometry.offsets().collect();
    let mut pairs: Vec<Vec<(u32, u32)>> = vec![Vec::new(); offsets.len()];
    let in_index = CoordIndex::build(coords, spatial_shape, batch_size, false)?;

    let mut target = vec![0i32; 1 + ndim];
    for (i, row) in coords.rows().enumerate() {
        target[0] = row[0];
        for (k, offset) in offsets.iter().enumerate() {
            if transform_standard(row, offset, geometry, spatial_shape, &mut target) {
                if let Some(out_row) = in_index.get(&target) {
                    pairs[k].push((i as u32, out_row));
                }
            }
        }
    }

    Ok(Rulebook {
        mode: ConvMode::Submanifold,
        geometry: geometry.clone(),
        pairs,
        in_coords: coords.clone(),
        out_coords: coords.clone(),
        in_spatial_shape: spatial_shape.clone(),
        out_spatial_shape: spatial_shape.clone(),
        batch_size,
    })
}

/// Mirror a previously built rulebook: the new output set is the paired
/// rulebook's input set and every pair swaps roles, so the inverse
/// convolution reproduces the paired convolution's receptive structure
/// exactly
///
/// # Errors
///
/// Returns [`Error::RulebookReuseMismatch`] when `coords` is not exactly
/// the paired rulebook's output set; `key` names the cache entry in the
/// error.
pub fn build_inverse_rulebook(
    paired: &Rulebook,
    coords: &Coordinates,
    key: &str,
) -> Result<Rulebook> {
    if coords != paired.out_coords() {
        return Err(Error::reuse_mismatch(
            key,
            format!(
                "input set ({} sites) does not match the paired rulebook's output set ({} sites, or differs in content)",
                coords.len(),
                paired.out_len(),
            ),
        ));
    }

    let pairs = paired
        .pairs()
        .iter()
        .map(|offset_pairs| offset_pairs.iter().map(|&(i, o)| (o, i)).collect())
        .collect();

    Ok(Rulebook {
        mode: ConvMode::Inverse,
        geometry: paired.geometry.clone(),
        pairs,
        in_coords: paired.out_coords.clone(),
        out_coords: paired.in_coords.clone(),
        in_spatial_shape: paired.out_spatial_shape.clone(),
        out_spatial_shape: paired.in_spatial_shape.clone(),
        batch_size: paired.batch_size,
    })
}

/// `o = (x + p - k*d) / s` per dimension; false when not exactly
/// divisible or outside `out_shape`
#[inline]
fn transform_standard(
    row: &[i32],
    offset: &Shape,
    geometry: &ConvGeometry,
    out_shape: &Shape,
    target: &mut [i32],
) -> bool {
    let stride = geometry.stride();
    let padding = geometry.padding();
    let dilation = geometry.dilation();
    for d in 0..geometry.ndim() {
        let num = row[1 + d] as i64 + padding[d] as i64 - (offset[d] * dilation[d]) as i64;
        if num < 0 {
            return false;
        }
        let s = stride[d] as i64;
        if num % s != 0 {
            return false;
        }
        let o = num / s;
        if o >= out_shape[d] as i64 {
            return false;
        }
        target[1 + d] = o as i32;
    }
    true
}

/// `o = x*s - p + k*d` per dimension; false when outside `out_shape`
#[inline]
fn transform_transposed(
    row: &[i32],
    offset: &Shape,
    geometry: &ConvGeometry,
    out_shape: &Shape,
    target: &mut [i32],
) -> bool {
    let stride = geometry.stride();
    let padding = geometry.padding();
    let dilation = geometry.dilation();
    for d in 0..geometry.ndim() {
        let o = row[1 + d] as i64 * stride[d] as i64 - padding[d] as i64
            + (offset[d] * dilation[d]) as i64;
        if o < 0 || o >= out_shape[d] as i64 {
            return false;
        }
        target[1 + d] = o as i32;
    }
    true
}
