//! Common test utilities: random sparse data and dense reference operators
//!
//! The dense references compute plain convolution / transposed convolution /
//! max pooling over channel-first buffers `(batch, channels, *spatial)` with
//! straightforward loops; they are the correctness oracle the sparse engine
//! is compared against.
#![allow(dead_code)]

use std::collections::HashSet;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Uniform};

use voxr::geometry::ConvGeometry;
use voxr::ops::ConvWeights;
use voxr::tensor::{Coordinates, Shape, SparseTensor};

/// Assert two f32 slices are element-wise close within absolute tolerance
pub fn assert_allclose(a: &[f32], b: &[f32], atol: f32, msg: &str) {
    assert_eq!(a.len(), b.len(), "{msg}: length mismatch");
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        assert!(
            diff <= atol,
            "{msg}: element {i} differs: {x} vs {y} (diff={diff}, atol={atol})"
        );
    }
}

/// Random sparse tensor: `points` distinct active sites per batch sample,
/// features uniform in `[lo, hi)`
pub fn generate_sparse_data(
    shape: [usize; 3],
    points: usize,
    batch_size: usize,
    channels: usize,
    lo: f32,
    hi: f32,
    seed: u64,
) -> SparseTensor<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let value = Uniform::new(lo, hi).unwrap();

    let mut coords = Vec::with_capacity(batch_size * points * 4);
    for b in 0..batch_size {
        let mut seen = HashSet::with_capacity(points);
        let site = Uniform::new(0usize, shape.iter().product::<usize>()).unwrap();
        while seen.len() < points {
            let lin = site.sample(&mut rng);
            if seen.insert(lin) {
                let x = lin / (shape[1] * shape[2]);
                let y = lin / shape[2] % shape[1];
                let z = lin % shape[2];
                coords.extend_from_slice(&[b as i32, x as i32, y as i32, z as i32]);
            }
        }
    }

    let rows = batch_size * points;
    let features: Vec<f32> = (0..rows * channels).map(|_| value.sample(&mut rng)).collect();
    let coords = Coordinates::from_vec(coords, 3).unwrap();
    SparseTensor::new(features, channels, coords, Shape::from(shape), batch_size).unwrap()
}

/// Random weights uniform in `[0, 1)`, the distribution the original
/// reference comparisons use
pub fn random_weights(kernel_volume: usize, c_in: usize, c_out: usize, seed: u64) -> ConvWeights<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let value = Uniform::new(0.0f32, 1.0).unwrap();
    let data: Vec<f32> = (0..kernel_volume * c_in * c_out)
        .map(|_| value.sample(&mut rng))
        .collect();
    ConvWeights::from_vec(data, kernel_volume, c_in, c_out).unwrap()
}

/// Random gradient buffer uniform in `[-0.2, 0.2)`
pub fn random_grad(len: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let value = Uniform::new(-0.2f32, 0.2).unwrap();
    (0..len).map(|_| value.sample(&mut rng)).collect()
}

fn spatial3(shape: &[usize]) -> [usize; 3] {
    [shape[0], shape[1], shape[2]]
}

/// Dense 3-D convolution forward over `(batch, c_in, *ishape)`;
/// returns the output buffer and its spatial shape
pub fn dense_conv3d(
    input: &[f32],
    batch: usize,
    c_in: usize,
    ishape: &[usize],
    weight: &ConvWeights<f32>,
    geometry: &ConvGeometry,
) -> (Vec<f32>, Vec<usize>) {
    let oshape = geometry.out_shape(&Shape::from(ishape)).unwrap().to_vec();
    let c_out = weight.out_channels();
    let ivol: usize = ishape.iter().product();
    let ovol: usize = oshape.iter().product();
    let mut out = vec![0.0f32; batch * c_out * ovol];

    for_each_window(batch, &spatial3(ishape), &oshape, geometry, |b, o_lin, k, x_lin| {
        let w_k = weight.offset(k);
        for ic in 0..c_in {
            let a = input[(b * c_in + ic) * ivol + x_lin];
            let w_row = &w_k[ic * c_out..(ic + 1) * c_out];
            for (oc, &w) in w_row.iter().enumerate() {
                out[(b * c_out + oc) * ovol + o_lin] += a * w;
            }
        }
    });
    (out, oshape)
}

/// Dense 3-D convolution backward: input gradient and weight gradient
pub fn dense_conv3d_backward(
    input: &[f32],
    batch: usize,
    c_in: usize,
    ishape: &[usize],
    weight: &ConvWeights<f32>,
    geometry: &ConvGeometry,
    d_out: &[f32],
) -> (Vec<f32>, Vec<f32>) {
    let oshape = geometry.out_shape(&Shape::from(ishape)).unwrap().to_vec();
    let c_out = weight.out_channels();
    let ivol: usize = ishape.iter().product();
    let ovol: usize = oshape.iter().product();
    let mut d_in = vec![0.0f32; batch * c_in * ivol];
    let mut d_w = vec![0.0f32; weight.kernel_volume() * c_in * c_out];

    for_each_window(batch, &spatial3(ishape), &oshape, geometry, |b, o_lin, k, x_lin| {
        for ic in 0..c_in {
            let a = input[(b * c_in + ic) * ivol + x_lin];
            let mut grad = 0.0f32;
            for oc in 0..c_out {
                let g = d_out[(b * c_out + oc) * ovol + o_lin];
                grad += g * weight.offset(k)[ic * c_out + oc];
                d_w[(k * c_in + ic) * c_out + oc] += a * g;
            }
            d_in[(b * c_in + ic) * ivol + x_lin] += grad;
        }
    });
    (d_in, d_w)
}

/// Dense 3-D transposed convolution forward
///
/// `oshape` is passed explicitly because strided downsampling loses
/// length information: the formula shape and a remembered original shape
/// are both legitimate targets.
pub fn dense_deconv3d(
    input: &[f32],
    batch: usize,
    c_in: usize,
    ishape: &[usize],
    oshape: &[usize],
    weight: &ConvWeights<f32>,
    geometry: &ConvGeometry,
) -> Vec<f32> {
    let oshape = oshape.to_vec();
    let c_out = weight.out_channels();
    let ivol: usize = ishape.iter().product();
    let ovol: usize = oshape.iter().product();
    let mut out = vec![0.0f32; batch * c_out * ovol];

    for_each_spread(batch, &spatial3(ishape), &oshape, geometry, |b, x_lin, k, o_lin| {
        let w_k = weight.offset(k);
        for ic in 0..c_in {
            let a = input[(b * c_in + ic) * ivol + x_lin];
            let w_row = &w_k[ic * c_out..(ic + 1) * c_out];
            for (oc, &w) in w_row.iter().enumerate() {
                out[(b * c_out + oc) * ovol + o_lin] += a * w;
            }
        }
    });
    out
}

/// Dense 3-D transposed convolution backward
pub fn dense_deconv3d_backward(
    input: &[f32],
    batch: usize,
    c_in: usize,
    ishape: &[usize],
    oshape: &[usize],
    weight: &ConvWeights<f32>,
    geometry: &ConvGeometry,
    d_out: &[f32],
) -> (Vec<f32>, Vec<f32>) {
    let oshape = oshape.to_vec();
    let c_out = weight.out_channels();
    let ivol: usize = ishape.iter().product();
    let ovol: usize = oshape.iter().product();
    let mut d_in = vec![0.0f32; batch * c_in * ivol];
    let mut d_w = vec![0.0f32; weight.kernel_volume() * c_in * c_out];

    for_each_spread(batch, &spatial3(ishape), &oshape, geometry, |b, x_lin, k, o_lin| {
        for ic in 0..c_in {
            let a = input[(b * c_in + ic) * ivol + x_lin];
            let mut grad = 0.0f32;
            for oc in 0..c_out {
                let g = d_out[(b * c_out + oc) * ovol + o_lin];
                grad += g * weight.offset(k)[ic * c_out + oc];
                d_w[(k * c_in + ic) * c_out + oc] += a * g;
            }
            d_in[(b * c_in + ic) * ivol + x_lin] += grad;
        }
    });
    (d_in, d_w)
}

/// Dense 3-D max pooling forward; windows never see padded positions
/// (equivalent to -inf padding), and a window with no valid position
/// would yield zero
pub fn dense_maxpool3d(
    input: &[f32],
    batch: usize,
    channels: usize,
    ishape: &[usize],
    geometry: &ConvGeometry,
) -> (Vec<f32>, Vec<usize>) {
    let (out, _, oshape) = dense_maxpool3d_argmax(input, batch, channels, ishape, geometry);
    (out, oshape)
}

/// Dense 3-D max pooling backward: route each output gradient to the
/// first-scanned argmax position of its window
pub fn dense_maxpool3d_backward(
    input: &[f32],
    batch: usize,
    channels: usize,
    ishape: &[usize],
    geometry: &ConvGeometry,
    d_out: &[f32],
) -> Vec<f32> {
    let (_, argmax, _) = dense_maxpool3d_argmax(input, batch, channels, ishape, geometry);
    let ivol: usize = ishape.iter().product();
    let mut d_in = vec![0.0f32; batch * channels * ivol];
    for (slot, &winner) in argmax.iter().enumerate() {
        if winner != usize::MAX {
            d_in[winner] += d_out[slot];
        }
    }
    d_in
}

fn dense_maxpool3d_argmax(
    input: &[f32],
    batch: usize,
    channels: usize,
    ishape: &[usize],
    geometry: &ConvGeometry,
) -> (Vec<f32>, Vec<usize>, Vec<usize>) {
    let oshape = geometry.out_shape(&Shape::from(ishape)).unwrap().to_vec();
    let ivol: usize = ishape.iter().product();
    let ovol: usize = oshape.iter().product();
    let mut out = vec![0.0f32; batch * channels * ovol];
    let mut argmax = vec![usize::MAX; batch * channels * ovol];

    for_each_window(batch, &spatial3(ishape), &oshape, geometry, |b, o_lin, _k, x_lin| {
        for c in 0..channels {
            let v = input[(b * channels + c) * ivol + x_lin];
            let slot = (b * channels + c) * ovol + o_lin;
            if argmax[slot] == usize::MAX || v > out[slot] {
                out[slot] = v;
                argmax[slot] = (b * channels + c) * ivol + x_lin;
            }
        }
    });
    (out, argmax, oshape)
}

/// Visit every `(batch, output position, kernel offset, input position)`
/// connection of a regular convolution, offsets in row-major order
fn for_each_window(
    batch: usize,
    ishape: &[usize; 3],
    oshape: &[usize],
    geometry: &ConvGeometry,
    mut visit: impl FnMut(usize, usize, usize, usize),
) {
    let k = geometry.kernel_size();
    let s = geometry.stride();
    let p = geometry.padding();
    let d = geometry.dilation();
    for b in 0..batch {
        for o0 in 0..oshape[0] {
            for o1 in 0..oshape[1] {
                for o2 in 0..oshape[2] {
                    let o_lin = (o0 * oshape[1] + o1) * oshape[2] + o2;
                    let mut kk = 0usize;
                    for k0 in 0..k[0] {
                        let x0 = (o0 * s[0] + k0 * d[0]) as isize - p[0] as isize;
                        for k1 in 0..k[1] {
                            let x1 = (o1 * s[1] + k1 * d[1]) as isize - p[1] as isize;
                            for k2 in 0..k[2] {
                                let x2 = (o2 * s[2] + k2 * d[2]) as isize - p[2] as isize;
                                if x0 >= 0
                                    && (x0 as usize) < ishape[0]
                                    && x1 >= 0
                                    && (x1 as usize) < ishape[1]
                                    && x2 >= 0
                                    && (x2 as usize) < ishape[2]
                                {
                                    let x_lin = (x0 as usize * ishape[1] + x1 as usize)
                                        * ishape[2]
                                        + x2 as usize;
                                    visit(b, o_lin, kk, x_lin);
                                }
                                kk += 1;
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Visit every `(batch, input position, kernel offset, output position)`
/// connection of a transposed convolution
fn for_each_spread(
    batch: usize,
    ishape: &[usize; 3],
    oshape: &[usize],
    geometry: &ConvGeometry,
    mut visit: impl FnMut(usize, usize, usize, usize),
) {
    let k = geometry.kernel_size();
    let s = geometry.stride();
    let p = geometry.padding();
    let d = geometry.dilation();
    for b in 0..batch {
        for x0 in 0..ishape[0] {
            for x1 in 0..ishape[1] {
                for x2 in 0..ishape[2] {
                    let x_lin = (x0 * ishape[1] + x1) * ishape[2] + x2;
                    let mut kk = 0usize;
                    for k0 in 0..k[0] {
                        let o0 = (x0 * s[0] + k0 * d[0]) as isize - p[0] as isize;
                        for k1 in 0..k[1] {
                            let o1 = (x1 * s[1] + k1 * d[1]) as isize - p[1] as isize;
                            for k2 in 0..k[2] {
                                let o2 = (x2 * s[2] + k2 * d[2]) as isize - p[2] as isize;
                                if o0 >= 0
                                    && (o0 as usize) < oshape[0]
                                    && o1 >= 0
                                    && (o1 as usize) < oshape[1]
                                    && o2 >= 0
                                    && (o2 as usize) < oshape[2]
                                {
                                    let o_lin = (o0 as usize * oshape[1] + o1 as usize)
                                        * oshape[2]
                                        + o2 as usize;
                                    visit(b, x_lin, kk, o_lin);
                                }
                                kk += 1;
                            }
                        }
                    }
                }
            }
        }
    }
}
