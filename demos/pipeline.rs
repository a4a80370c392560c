//! Encoder/decoder pipeline over one sparse volume: strided downsampling,
//! submanifold refinement, exact inverse upsampling, densification.
//!
//! Run with `cargo run --example pipeline`.

use std::collections::HashSet;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Uniform};

use voxr::prelude::*;

const SHAPE: [usize; 3] = [32, 32, 32];
const POINTS: usize = 2000;

fn random_input(channels: usize, rng: &mut StdRng) -> Result<SparseTensor<f32>> {
    let value = Uniform::new(-1.0f32, 1.0).unwrap();
    let site = Uniform::new(0usize, SHAPE.iter().product::<usize>()).unwrap();

    let mut coords = Vec::with_capacity(POINTS * 4);
    let mut seen = HashSet::with_capacity(POINTS);
    while seen.len() < POINTS {
        let lin = site.sample(rng);
        if seen.insert(lin) {
            let x = lin / (SHAPE[1] * SHAPE[2]);
            let y = lin / SHAPE[2] % SHAPE[1];
            let z = lin % SHAPE[2];
            coords.extend_from_slice(&[0, x as i32, y as i32, z as i32]);
        }
    }
    let features = (0..POINTS * channels).map(|_| value.sample(rng)).collect();
    SparseTensor::new(
        features,
        channels,
        Coordinates::from_vec(coords, 3)?,
        Shape::from(SHAPE),
        1,
    )
}

fn random_weights(
    kernel_volume: usize,
    c_in: usize,
    c_out: usize,
    rng: &mut StdRng,
) -> Result<ConvWeights<f32>> {
    let value = Uniform::new(-0.1f32, 0.1).unwrap();
    ConvWeights::from_vec(
        (0..kernel_volume * c_in * c_out).map(|_| value.sample(rng)).collect(),
        kernel_volume,
        c_in,
        c_out,
    )
}

fn main() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(7);
    let cache = RulebookCache::new();

    let input = random_input(16, &mut rng)?;
    println!("input:   {input:?}");

    // Encoder: downsample by 2, refine at the coarse resolution
    let down_geom = ConvGeometry::uniform(3, 2, 2, 0, 1)?;
    let down_w = random_weights(down_geom.kernel_volume(), 16, 32, &mut rng)?;
    let (coarse, _) = sparse_conv(&input, &down_w, &down_geom, ConvMode::Standard, Some((&cache, "down0")))?;
    println!("coarse:  {coarse:?}");

    let subm_geom = ConvGeometry::submanifold(3, 3, 1)?;
    let subm_w = random_weights(subm_geom.kernel_volume(), 32, 32, &mut rng)?;
    let (refined, _) = sparse_conv(&coarse, &subm_w, &subm_geom, ConvMode::Submanifold, None)?;
    println!("refined: {refined:?}");

    // Decoder: the inverse convolution lands exactly on the input sites
    let up_w = random_weights(down_geom.kernel_volume(), 32, 16, &mut rng)?;
    let (restored, _) = sparse_inverse_conv(&refined, &up_w, &cache, "down0")?;
    println!("restored: {restored:?}");
    assert_eq!(restored.indices(), input.indices());

    let dense = to_dense(&restored, DenseLayout::ChannelsFirst);
    println!(
        "densified to {:?} ({} values, {} nonzero sites)",
        dense.shape(),
        dense.numel(),
        restored.rows()
    );
    Ok(())
}
