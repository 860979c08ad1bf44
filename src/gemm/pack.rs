//! Panel packing.
//!
//! `A` slabs are packed into strips of `mr` rows and `B` slabs into strips of
//! `nr` columns. Inside a strip the layout is depth-major: the `mr` (or `nr`)
//! values for depth `p` are adjacent, so the micro-kernel streams both panels
//! with unit stride. Strips are zero-padded up to the full register width.

use super::{Operand, Source};
use crate::layout::Diag;

/// Element `(i, j)` of the logical operand, in whole-matrix coordinates.
#[inline(always)]
unsafe fn read(op: &Operand, i: usize, j: usize) -> f64 {
    match op.source {
        Source::General => op.mat.get(i, j),
        Source::Symmetric(uplo) => {
            if uplo.contains(i, j, 0) {
                op.mat.get(i, j)
            } else {
                op.mat.get(j, i)
            }
        }
        Source::Triangular(uplo, diag) => {
            if i == j && diag == Diag::Unit {
                1.0
            } else if uplo.contains(i, j, 0) {
                op.mat.get(i, j)
            } else {
                0.0
            }
        }
    }
}

/// Pack the `rows x depth` block of `a` at `(i0, p0)` into `mr`-row strips.
///
/// # Safety
/// The block must lie inside `a`; `buf` must hold
/// `rows.div_ceil(mr) * mr * depth` values.
pub(crate) unsafe fn pack_a(
    a: &Operand,
    i0: usize,
    p0: usize,
    rows: usize,
    depth: usize,
    mr: usize,
    buf: &mut [f64],
) {
    debug_assert!(buf.len() >= rows.div_ceil(mr) * mr * depth);
    let mut idx = 0usize;
    for s in (0..rows).step_by(mr) {
        let live = mr.min(rows - s);
        if let Source::General = a.source {
            for p in 0..depth {
                let mut src = a.mat.ptr_at(i0 + s, p0 + p);
                for r in 0..mr {
                    buf[idx + r] = if r < live { *src } else { 0.0 };
                    src = src.wrapping_offset(a.mat.rs);
                }
                idx += mr;
            }
        } else {
            for p in 0..depth {
                for r in 0..mr {
                    buf[idx + r] = if r < live {
                        read(a, i0 + s + r, p0 + p)
                    } else {
                        0.0
                    };
                }
                idx += mr;
            }
        }
    }
}

/// Pack the `depth x cols` block of `b` at `(p0, j0)` into `nr`-column strips.
///
/// # Safety
/// The block must lie inside `b`; `buf` must hold
/// `cols.div_ceil(nr) * nr * depth` values.
pub(crate) unsafe fn pack_b(
    b: &Operand,
    p0: usize,
    j0: usize,
    depth: usize,
    cols: usize,
    nr: usize,
    buf: &mut [f64],
) {
    debug_assert!(buf.len() >= cols.div_ceil(nr) * nr * depth);
    let mut idx = 0usize;
    for s in (0..cols).step_by(nr) {
        let live = nr.min(cols - s);
        if let Source::General = b.source {
            for p in 0..depth {
                let mut src = b.mat.ptr_at(p0 + p, j0 + s);
                for c in 0..nr {
                    buf[idx + c] = if c < live { *src } else { 0.0 };
                    src = src.wrapping_offset(b.mat.cs);
                }
                idx += nr;
            }
        } else {
            for p in 0..depth {
                for c in 0..nr {
                    buf[idx + c] = if c < live {
                        read(b, p0 + p, j0 + s + c)
                    } else {
                        0.0
                    };
                }
                idx += nr;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Uplo;
    use crate::matrix::MatrixView;

    #[test]
    fn test_pack_a_pads_last_strip() {
        // 3x2 row-major [[1,2],[3,4],[5,6]], strips of 2 rows.
        let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let a = Operand::general(MatrixView::row_major(&data, 3, 2).unwrap().raw());
        let mut buf = vec![f64::NAN; 8];
        unsafe { pack_a(&a, 0, 0, 3, 2, 2, &mut buf) };
        assert_eq!(buf, vec![1.0, 3.0, 2.0, 4.0, 5.0, 0.0, 6.0, 0.0]);
    }

    #[test]
    fn test_pack_b_strips() {
        // 2x3 column-major [[1,3,5],[2,4,6]], strips of 2 columns.
        let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = Operand::general(MatrixView::col_major(&data, 2, 3).unwrap().raw());
        let mut buf = vec![f64::NAN; 8];
        unsafe { pack_b(&b, 0, 0, 2, 3, 2, &mut buf) };
        assert_eq!(buf, vec![1.0, 3.0, 2.0, 4.0, 5.0, 0.0, 6.0, 0.0]);
    }

    #[test]
    fn test_pack_structured_sources() {
        // Only the lower triangle is meaningful; the upper holds junk.
        let data = [1.0, 99.0, 2.0, 3.0];
        let mat = MatrixView::row_major(&data, 2, 2).unwrap().raw();
        let mut buf = vec![0.0; 4];

        let sym = Operand::structured(mat, Source::Symmetric(Uplo::Lower));
        unsafe { pack_a(&sym, 0, 0, 2, 2, 2, &mut buf) };
        assert_eq!(buf, vec![1.0, 2.0, 2.0, 3.0]);

        let tri = Operand::structured(mat, Source::Triangular(Uplo::Lower, Diag::Unit));
        unsafe { pack_a(&tri, 0, 0, 2, 2, 2, &mut buf) };
        assert_eq!(buf, vec![1.0, 2.0, 0.0, 1.0]);
    }
}
