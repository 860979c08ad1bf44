//! Packed, cache-blocked matrix multiply.
//!
//! Computes `C = beta*C + alpha*A*B` with an optional triangular mask on `C`,
//! following the classic three-loop scheme:
//!
//! ```text
//! for jc in 0..n step NC              column block of C and B
//!   for pc in 0..k step KC            depth slab, pack B[pc.., jc..] in NR strips
//!     for ic in 0..m step MC          row block, pack A[ic.., pc..] in MR strips
//!       macro kernel over MR x NR register tiles
//! ```
//!
//! Between depth slabs each tile hands its unscaled sums on through a carry
//! block (`C` itself when `beta == 0`, a scratch copy otherwise), and
//! `alpha`/`beta` are applied once on the last slab. Every element is thus
//! the same left-to-right sum over `k` under any blocking factors.
//! With the `parallel` feature large products split the column-block loop
//! across rayon workers, each with its own packing buffers from the
//! thread-local scratch pool.
//!
//! The engine is reached through [`crate::level3`]; this module exposes the
//! blocking record that controls it.

mod blocking;
mod macro_kernel;
mod micro_kernel;
mod pack;

pub use blocking::{BlockingFactors, MAX_REGISTER_BLOCK};

use tracing::debug;

use crate::layout::{Diag, Uplo};
use crate::matrix::{MatMut, MatRef};
use crate::scratch::ScratchBuffer;
use crate::simd;
use macro_kernel::{coverage, Coverage};
use micro_kernel::Update;

/// How the stored elements of an operand map to the logical matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Source {
    /// Every element is stored.
    General,
    /// Only the given triangle is stored; the other is its mirror image.
    Symmetric(Uplo),
    /// Only the given triangle is stored; the other is zero.
    Triangular(Uplo, Diag),
}

/// A multiply operand: a matrix descriptor and how to read it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Operand {
    pub(crate) mat: MatRef,
    pub(crate) source: Source,
}

// SAFETY: MatRef is Send + Sync; Source is plain data.
unsafe impl Send for Operand {}
unsafe impl Sync for Operand {}

impl Operand {
    #[inline]
    pub(crate) fn general(mat: MatRef) -> Self {
        Self {
            mat,
            source: Source::General,
        }
    }

    #[inline]
    pub(crate) fn structured(mat: MatRef, source: Source) -> Self {
        Self { mat, source }
    }

    #[inline]
    pub(crate) fn rows(&self) -> usize {
        self.mat.rows
    }

    #[inline]
    pub(crate) fn cols(&self) -> usize {
        self.mat.cols
    }

    /// The transposed operand. The stored triangle flips with it.
    #[inline]
    pub(crate) fn t(self) -> Self {
        let source = match self.source {
            Source::General => Source::General,
            Source::Symmetric(uplo) => Source::Symmetric(uplo.flip()),
            Source::Triangular(uplo, diag) => Source::Triangular(uplo.flip(), diag),
        };
        Self {
            mat: self.mat.t(),
            source,
        }
    }
}

/// `c = beta * c` over the masked part of `c`; `beta == 0` writes zeros
/// without reading and `beta == 1` leaves `c` alone.
///
/// # Safety
/// `c` must be a valid, exclusively borrowed matrix.
pub(crate) unsafe fn scale_masked(beta: f64, c: MatMut, mask: Option<Uplo>) {
    if beta == 1.0 {
        return;
    }
    for j in 0..c.cols {
        for i in 0..c.rows {
            if let Some(uplo) = mask {
                if !uplo.contains(i, j, c.diag_offset) {
                    continue;
                }
            }
            let p = c.ptr_at(i, j);
            *p = if beta == 0.0 { 0.0 } else { beta * *p };
        }
    }
}

#[inline]
fn round_up(x: usize, to: usize) -> usize {
    x.div_ceil(to) * to
}

/// Whether `c` is laid out with rows adjacent, i.e. column-major-like.
#[inline]
fn is_column_oriented(c: &MatMut) -> bool {
    c.rs.unsigned_abs() <= c.cs.unsigned_abs()
}

/// `c = beta*c + alpha * a * b`, writing only the `mask` triangle of `c`
/// when one is given.
///
/// Shapes must already be validated: `a` is `m x k`, `b` is `k x n`, `c` is
/// `m x n`. `bf` must pass [`BlockingFactors::validate`].
///
/// # Safety
/// `c` must be a valid, exclusively borrowed matrix that does not overlap
/// `a` or `b`; both operands must stay readable for the call.
pub(crate) unsafe fn blocked_multiply(
    alpha: f64,
    a: Operand,
    b: Operand,
    beta: f64,
    c: MatMut,
    mask: Option<Uplo>,
    bf: &BlockingFactors,
) {
    debug_assert_eq!(a.rows(), c.rows);
    debug_assert_eq!(b.cols(), c.cols);
    debug_assert_eq!(a.cols(), b.rows());

    let (m, n, k) = (c.rows, c.cols, a.cols());
    if m == 0 || n == 0 {
        return;
    }
    if alpha == 0.0 || k == 0 {
        scale_masked(beta, c, mask);
        return;
    }

    // Cᵀ = Bᵀ Aᵀ: swap roles so the kernels write in their preferred order.
    let transposed = is_column_oriented(&c) != bf.prefer_column_major;
    let (a, b, c, mask) = if transposed {
        (b.t(), a.t(), c.t(), mask.map(Uplo::flip))
    } else {
        (a, b, c, mask)
    };
    let (m, n) = (c.rows, c.cols);

    debug!(
        m,
        n,
        k,
        mc = bf.mc,
        nc = bf.nc,
        kc = bf.kc,
        mr = bf.mr,
        nr = bf.nr,
        transposed,
        mask = ?mask,
        "blocked multiply"
    );

    #[cfg(feature = "parallel")]
    {
        use crate::threading::{available_threads, should_thread};
        use rayon::prelude::*;

        let nthreads = available_threads();
        if should_thread(m * n, nthreads) && n > bf.nr {
            let width = round_up(n.div_ceil(nthreads), bf.nr).min(bf.nc);
            let blocks: Vec<(usize, usize)> =
                (0..n).step_by(width).map(|jc| (jc, width.min(n - jc))).collect();
            blocks.into_par_iter().for_each(|(jc, jb)| {
                column_block(alpha, &a, &b, beta, c, mask, bf, jc, jb);
            });
            return;
        }
    }

    for jc in (0..n).step_by(bf.nc) {
        let jb = bf.nc.min(n - jc);
        column_block(alpha, &a, &b, beta, c, mask, bf, jc, jb);
    }
}

/// Columns `jc..jc+jb` of `c`: all depth slabs and row blocks.
#[allow(clippy::too_many_arguments)]
unsafe fn column_block(
    alpha: f64,
    a: &Operand,
    b: &Operand,
    beta: f64,
    c: MatMut,
    mask: Option<Uplo>,
    bf: &BlockingFactors,
    jc: usize,
    jb: usize,
) {
    let (m, k) = (c.rows, a.cols());
    let kc = bf.kc.min(k);
    let mc = bf.mc.min(m);

    let c_cols = c.sub(0, jc, m, jb);
    if let Some(uplo) = mask {
        if coverage(uplo, m, jb, c_cols.diag_offset) == Coverage::Outside {
            return;
        }
    }

    let mut packed_b = ScratchBuffer::zeroed(round_up(jb, bf.nr) * kc);
    let mut packed_a = ScratchBuffer::zeroed(round_up(mc, bf.mr) * kc);

    let mut sums = (k > kc && beta != 0.0).then(|| ScratchBuffer::zeroed(m * jb));
    let carry = (k > kc).then(|| match sums.as_deref_mut() {
        Some(buf) => MatMut {
            ptr: buf.as_mut_ptr(),
            rows: m,
            cols: jb,
            rs: 1,
            cs: m as isize,
            diag_offset: c_cols.diag_offset,
        },
        None => c_cols,
    });

    for pc in (0..k).step_by(kc) {
        let pb = kc.min(k - pc);
        let up = Update {
            alpha,
            beta,
            first: pc == 0,
            last: pc + pb == k,
        };
        pack::pack_b(b, pc, jc, pb, jb, bf.nr, &mut packed_b);

        for ic in (0..m).step_by(mc) {
            let ib = mc.min(m - ic);
            let block = c_cols.sub(ic, 0, ib, jb);
            if let Some(uplo) = mask {
                if coverage(uplo, ib, jb, block.diag_offset) == Coverage::Outside {
                    continue;
                }
            }
            let carry = carry.map(|s| s.sub(ic, 0, ib, jb));
            pack::pack_a(a, ic, pc, ib, pb, bf.mr, &mut packed_a);
            let (pa, pbuf) = (&packed_a[..], &packed_b[..]);
            simd::dispatch(|| {
                macro_kernel::run(up, pa, pbuf, block, carry, mask, bf.mr, bf.nr, pb)
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{MatrixView, MatrixViewMut};

    fn naive(a: &MatrixView<'_>, b: &MatrixView<'_>) -> Vec<f64> {
        let (m, n, k) = (a.rows(), b.cols(), a.cols());
        let mut out = vec![0.0; m * n];
        for i in 0..m {
            for j in 0..n {
                out[i * n + j] = (0..k).map(|p| a.get(i, p) * b.get(p, j)).sum();
            }
        }
        out
    }

    fn int_matrix(rows: usize, cols: usize, seed: usize) -> Vec<f64> {
        (0..rows * cols)
            .map(|i| ((i * 31 + seed * 7) % 11) as f64 - 5.0)
            .collect()
    }

    fn multiply(m: usize, n: usize, k: usize, bf: &BlockingFactors, c_col_major: bool) -> Vec<f64> {
        let ad = int_matrix(m, k, 1);
        let bd = int_matrix(k, n, 2);
        let a = MatrixView::row_major(&ad, m, k).unwrap();
        let b = MatrixView::col_major(&bd, k, n).unwrap();
        let mut cd = vec![0.0; m * n];
        let mut c = if c_col_major {
            MatrixViewMut::col_major(&mut cd, m, n).unwrap()
        } else {
            MatrixViewMut::row_major(&mut cd, m, n).unwrap()
        };
        unsafe {
            blocked_multiply(
                1.0,
                Operand::general(a.raw()),
                Operand::general(b.raw()),
                0.0,
                c.raw_mut(),
                None,
                bf,
            )
        };
        c.to_row_major_vec()
    }

    #[test]
    fn test_matches_naive_for_ragged_shapes() {
        let (m, n, k) = (13, 9, 17);
        let ad = int_matrix(m, k, 1);
        let bd = int_matrix(k, n, 2);
        let expect = naive(
            &MatrixView::row_major(&ad, m, k).unwrap(),
            &MatrixView::col_major(&bd, k, n).unwrap(),
        );
        let small = BlockingFactors::new(4, 4, 5, 2, 2).unwrap();
        assert_eq!(multiply(m, n, k, &small, true), expect);
        assert_eq!(multiply(m, n, k, &small, false), expect);
        assert_eq!(multiply(m, n, k, &BlockingFactors::DEFAULT, true), expect);
    }

    fn real_matrix(rows: usize, cols: usize, seed: usize) -> Vec<f64> {
        (0..rows * cols)
            .map(|i| ((i * 7 + seed) as f64 * 0.61).sin() / (1 + i % 5) as f64)
            .collect()
    }

    #[test]
    fn test_depth_slabs_do_not_change_bits() {
        let (m, n, k) = (9, 7, 33);
        let ad = real_matrix(m, k, 1);
        let bd = real_matrix(k, n, 2);
        let a = MatrixView::col_major(&ad, m, k).unwrap();
        let b = MatrixView::row_major(&bd, k, n).unwrap();
        for (beta, mask) in [(0.0, None), (-0.7, None), (1.3, Some(Uplo::Lower))] {
            let run = |kc: usize| {
                let mut cd = real_matrix(m, n, 3);
                let mut c = MatrixViewMut::col_major(&mut cd, m, n).unwrap();
                let bf = BlockingFactors::new(8, 8, kc, 4, 4).unwrap();
                unsafe {
                    blocked_multiply(
                        0.9,
                        Operand::general(a.raw()),
                        Operand::general(b.raw()),
                        beta,
                        c.raw_mut(),
                        mask,
                        &bf,
                    )
                };
                cd
            };
            let reference = run(33);
            for kc in [32, 5, 1] {
                let got = run(kc);
                for (x, y) in reference.iter().zip(&got) {
                    assert_eq!(x.to_bits(), y.to_bits(), "kc {kc}, beta {beta}");
                }
            }
        }
    }

    #[test]
    fn test_zero_k_scales_by_beta() {
        let ad: [f64; 0] = [];
        let a = MatrixView::col_major(&ad, 2, 0).unwrap();
        let b = MatrixView::col_major(&ad, 0, 2).unwrap();
        let mut cd = vec![f64::NAN, 1.0, 2.0, 3.0];
        let mut c = MatrixViewMut::col_major(&mut cd, 2, 2).unwrap();
        unsafe {
            blocked_multiply(
                1.0,
                Operand::general(a.raw()),
                Operand::general(b.raw()),
                0.0,
                c.raw_mut(),
                None,
                &BlockingFactors::DEFAULT,
            )
        };
        assert_eq!(cd, vec![0.0; 4]);
    }

    #[test]
    fn test_masked_multiply_leaves_other_triangle() {
        let n = 7;
        let ad = int_matrix(n, 3, 4);
        let a = MatrixView::row_major(&ad, n, 3).unwrap();
        let full = naive(&a, &a.t());
        let mut cd = vec![f64::NAN; n * n];
        let mut c = MatrixViewMut::row_major(&mut cd, n, n).unwrap();
        let bf = BlockingFactors::new(4, 4, 2, 2, 2).unwrap();
        unsafe {
            blocked_multiply(
                1.0,
                Operand::general(a.raw()),
                Operand::general(a.t().raw()),
                0.0,
                c.raw_mut(),
                Some(Uplo::Upper),
                &bf,
            )
        };
        for i in 0..n {
            for j in 0..n {
                if i <= j {
                    assert_eq!(cd[i * n + j], full[i * n + j]);
                } else {
                    assert!(cd[i * n + j].is_nan());
                }
            }
        }
    }
}
