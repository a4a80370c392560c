//! Small dense GEMM helpers for per-offset feature blocks
//!
//! The gather-scatter engine multiplies gathered row blocks against one
//! kernel offset's weight matrix at a time; the blocks are tall and
//! narrow, so a simple row-parallel ikj kernel is enough.

use crate::dtype::Element;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Row count below which parallel dispatch is not worth the overhead
#[cfg(feature = "rayon")]
const PARALLEL_THRESHOLD: usize = 64;

/// `out = a @ b` where `a` is `m x k`, `b` is `k x n`, `out` is `m x n`
///
/// `out` is overwritten.
pub(crate) fn matmul<T: Element>(a: &[T], b: &[T], out: &mut [T], m: usize, k: usize, n: usize) {
    debug_assert_eq!(a.len(), m * k);
    debug_assert_eq!(b.len(), k * n);
    debug_assert_eq!(out.len(), m * n);

    #[cfg(feature = "rayon")]
    if m >= PARALLEL_THRESHOLD {
        out.par_chunks_mut(n)
            .zip(a.par_chunks(k))
            .for_each(|(out_row, a_row)| matmul_row(a_row, b, out_row, k, n));
        return;
    }

    for (out_row, a_row) in out.chunks_mut(n).zip(a.chunks(k)) {
        matmul_row(a_row, b, out_row, k, n);
    }
}

/// One output row of `a @ b`, ikj order for cache locality on `b`
#[inline]
fn matmul_row<T: Element>(a_row: &[T], b: &[T], out_row: &mut [T], k: usize, n: usize) {
    out_row.fill(T::zero());
    for (kk, &a_val) in a_row.iter().enumerate().take(k) {
        let b_row = &b[kk * n..kk * n + n];
        for (o, &b_val) in out_row.iter_mut().zip(b_row) {
            *o += a_val * b_val;
        }
    }
}

/// `out = a @ b^T` where `a` is `m x k`, `b` is `n x k`, `out` is `m x n`
///
/// `out` is overwritten.
pub(crate) fn matmul_bt<T: Element>(a: &[T], b: &[T], out: &mut [T], m: usize, k: usize, n: usize) {
    debug_assert_eq!(a.len(), m * k);
    debug_assert_eq!(b.len(), n * k);
    debug_assert_eq!(out.len(), m * n);

    #[cfg(feature = "rayon")]
    if m >= PARALLEL_THRESHOLD {
        out.par_chunks_mut(n)
            .zip(a.par_chunks(k))
            .for_each(|(out_row, a_row)| matmul_bt_row(a_row, b, out_row, k));
        return;
    }

    for (out_row, a_row) in out.chunks_mut(n).zip(a.chunks(k)) {
        matmul_bt_row(a_row, b, out_row, k);
    }
}

#[inline]
fn matmul_bt_row<T: Element>(a_row: &[T], b: &[T], out_row: &mut [T], k: usize) {
    for (o, b_row) in out_row.iter_mut().zip(b.chunks(k)) {
        let mut sum = T::zero();
        for (&a_val, &b_val) in a_row.iter().zip(b_row) {
            sum += a_val * b_val;
        }
        *o = sum;
    }
}

/// `out += a^T @ b` where `a` is `m x k`, `b` is `m x n`, `out` is `k x n`
///
/// Accumulates into `out`; used for weight gradients, where one offset's
/// contribution adds onto the gradient tensor.
pub(crate) fn matmul_at_acc<T: Element>(
    a: &[T],
    b: &[T],
    out: &mut [T],
    m: usize,
    k: usize,
    n: usize,
) {
    debug_assert_eq!(a.len(), m * k);
    debug_assert_eq!(b.len(), m * n);
    debug_assert_eq!(out.len(), k * n);

    #[cfg(feature = "rayon")]
    if k >= PARALLEL_THRESHOLD {
        out.par_chunks_mut(n).enumerate().for_each(|(i, out_row)| {
            matmul_at_acc_row(a, b, out_row, i, k, n, m);
        });
        return;
    }

    for (i, out_row) in out.chunks_mut(n).enumerate() {
        matmul_at_acc_row(a, b, out_row, i, k, n, m);
    }
}

#[inline]
fn matmul_at_acc_row<T: Element>(
    a: &[T],
    b: &[T],
    out_row: &mut [T],
    i: usize,
    k: usize,
    n: usize,
    m: usize,
) {
    for r in 0..m {
        let a_val = a[r * k + i];
        let b_row = &b[r * n..r * n + n];
        for (o, &b_val) in out_row.iter_mut().zip(b_row) {
            *o += a_val * b_val;
        }
    }
}
