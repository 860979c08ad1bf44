use super::micro_kernel::{self, TileTarget, Update};
use crate::layout::Uplo;
use crate::matrix::MatMut;

/// How a masked product relates to a block of `C`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Coverage {
    /// Every element is outside the mask.
    Outside,
    /// Every element is inside the mask.
    Inside,
    /// The block straddles the diagonal.
    Partial,
}

/// Classify the `rows x cols` block whose diagonal shift is `diag_offset`.
pub(crate) fn coverage(uplo: Uplo, rows: usize, cols: usize, diag_offset: isize) -> Coverage {
    let last_row = rows as isize - 1;
    let last_col = cols as isize - 1;
    match uplo {
        // Lower keeps (i, j) with i >= j + d.
        Uplo::Lower => {
            if last_row < diag_offset {
                Coverage::Outside
            } else if 0 >= last_col + diag_offset {
                Coverage::Inside
            } else {
                Coverage::Partial
            }
        }
        // Upper keeps (i, j) with i <= j + d.
        Uplo::Upper => {
            if 0 > last_col + diag_offset {
                Coverage::Outside
            } else if last_row <= diag_offset {
                Coverage::Inside
            } else {
                Coverage::Partial
            }
        }
    }
}

/// Multiply packed panels into the block `c`, one register tile at a time.
///
/// `packed_a` holds `c.rows.div_ceil(mr)` strips and `packed_b` holds
/// `c.cols.div_ceil(nr)` strips, each `depth` deep. Tiles entirely outside
/// `mask` are skipped; tiles straddling it are masked per element. `carry`
/// holds the block's unscaled sums between depth slabs.
///
/// # Safety
/// `c` and `carry` must be valid, exclusively borrowed blocks of one shape.
#[allow(clippy::too_many_arguments)]
pub(crate) unsafe fn run(
    up: Update,
    packed_a: &[f64],
    packed_b: &[f64],
    c: MatMut,
    carry: Option<MatMut>,
    mask: Option<Uplo>,
    mr: usize,
    nr: usize,
    depth: usize,
) {
    for (js, j0) in (0..c.cols).step_by(nr).enumerate() {
        let cols = nr.min(c.cols - j0);
        let b = &packed_b[js * nr * depth..(js + 1) * nr * depth];
        for (is, i0) in (0..c.rows).step_by(mr).enumerate() {
            let rows = mr.min(c.rows - i0);
            let block = c.sub(i0, j0, rows, cols);
            let tile_mask = match mask {
                Some(uplo) => match coverage(uplo, rows, cols, block.diag_offset) {
                    Coverage::Outside => continue,
                    Coverage::Inside => None,
                    Coverage::Partial => Some(uplo),
                },
                None => None,
            };
            let a = &packed_a[is * mr * depth..(is + 1) * mr * depth];
            micro_kernel::compute(
                mr,
                nr,
                depth,
                a,
                b,
                up,
                TileTarget {
                    c: block,
                    mask: tile_mask,
                    carry: carry.map(|s| s.sub(i0, j0, rows, cols)),
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coverage_lower() {
        assert_eq!(coverage(Uplo::Lower, 4, 4, 0), Coverage::Partial);
        assert_eq!(coverage(Uplo::Lower, 4, 4, 4), Coverage::Outside);
        assert_eq!(coverage(Uplo::Lower, 4, 4, -3), Coverage::Inside);
        assert_eq!(coverage(Uplo::Lower, 4, 4, -2), Coverage::Partial);
    }

    #[test]
    fn test_coverage_upper() {
        assert_eq!(coverage(Uplo::Upper, 4, 4, 0), Coverage::Partial);
        assert_eq!(coverage(Uplo::Upper, 4, 4, -4), Coverage::Outside);
        assert_eq!(coverage(Uplo::Upper, 4, 4, 3), Coverage::Inside);
    }

    #[test]
    fn test_run_skips_outside_tiles() {
        // 4x4 column-major C, 2x2 tiles, lower mask: the top-right tile is
        // never written.
        let mut c = vec![f64::NAN; 16];
        let target = MatMut {
            ptr: c.as_mut_ptr(),
            rows: 4,
            cols: 4,
            rs: 1,
            cs: 4,
            diag_offset: 0,
        };
        let a = vec![1.0; 4];
        let b = vec![1.0; 4];
        let up = Update {
            alpha: 1.0,
            beta: 0.0,
            first: true,
            last: true,
        };
        unsafe { run(up, &a, &b, target, None, Some(Uplo::Lower), 2, 2, 1) };
        for j in 0..4 {
            for i in 0..4 {
                let v = c[i + 4 * j];
                if i >= j {
                    assert_eq!(v, 1.0);
                } else {
                    assert!(v.is_nan());
                }
            }
        }
    }
}
