//! Matrix-matrix primitives on top of the packed multiply engine.
//!
//! `gemm`, `gemmt`, `symm`, `trmm`, `syrk` and `syr2k` are single calls into
//! the engine with different operand sources and output masks. `trsm` is a
//! blocked substitution: diagonal blocks are solved column by column and the
//! trailing rows are updated with the engine.

use crate::gemm::{blocked_multiply, scale_masked, BlockingFactors, Operand, Source};
use crate::layout::{Diag, Side, Trans, Uplo};
use crate::level2::{op_view, triangular_solve};
use crate::matrix::{MatMut, MatRef, MatrixView, MatrixViewMut};
use crate::scratch::ScratchBuffer;
use crate::{shape_mismatch, Result, StridedError};

/// Rows per diagonal block in `trsm`.
const TRSM_BLOCK: usize = 64;

fn check_square(m: &MatrixView<'_>) -> Result<()> {
    if !m.is_square() {
        return Err(StridedError::NonSquare {
            rows: m.rows(),
            cols: m.cols(),
        });
    }
    Ok(())
}

/// `a` (`m x k`) times `b` (`k x n`) must fit a `c` of `rows x cols`.
fn check_product(
    op: &'static str,
    a: &MatrixView<'_>,
    b: &MatrixView<'_>,
    rows: usize,
    cols: usize,
) -> Result<()> {
    if a.cols() != b.rows() {
        return Err(shape_mismatch(op, &[a.rows(), a.cols()], &[b.rows(), b.cols()]));
    }
    if a.rows() != rows || b.cols() != cols {
        return Err(shape_mismatch(op, &[a.rows(), b.cols()], &[rows, cols]));
    }
    Ok(())
}

/// `C = beta * C + alpha * op(A) op(B)`.
pub fn gemm(
    transa: Trans,
    transb: Trans,
    alpha: f64,
    a: &MatrixView<'_>,
    b: &MatrixView<'_>,
    beta: f64,
    c: &mut MatrixViewMut<'_>,
) -> Result<()> {
    gemm_with_blocking(transa, transb, alpha, a, b, beta, c, &BlockingFactors::DEFAULT)
}

/// [`gemm`] under an explicit blocking record.
#[allow(clippy::too_many_arguments)]
pub fn gemm_with_blocking(
    transa: Trans,
    transb: Trans,
    alpha: f64,
    a: &MatrixView<'_>,
    b: &MatrixView<'_>,
    beta: f64,
    c: &mut MatrixViewMut<'_>,
    blocking: &BlockingFactors,
) -> Result<()> {
    blocking.validate()?;
    let (a, b) = (op_view(a, transa), op_view(b, transb));
    check_product("gemm", &a, &b, c.rows(), c.cols())?;
    unsafe {
        blocked_multiply(
            alpha,
            Operand::general(a.raw()),
            Operand::general(b.raw()),
            beta,
            c.raw_mut(),
            None,
            blocking,
        )
    };
    Ok(())
}

/// [`gemm`] restricted to the `uplo` triangle of `C`; the other triangle is
/// neither read nor written.
///
/// The triangle is taken relative to the diagonal of the matrix `C` was cut
/// from (see [`MatrixView::diag_offset`]), so `C` may be any sub-block.
#[allow(clippy::too_many_arguments)]
pub fn gemmt(
    uplo: Uplo,
    transa: Trans,
    transb: Trans,
    alpha: f64,
    a: &MatrixView<'_>,
    b: &MatrixView<'_>,
    beta: f64,
    c: &mut MatrixViewMut<'_>,
) -> Result<()> {
    let (a, b) = (op_view(a, transa), op_view(b, transb));
    check_product("gemmt", &a, &b, c.rows(), c.cols())?;
    unsafe {
        blocked_multiply(
            alpha,
            Operand::general(a.raw()),
            Operand::general(b.raw()),
            beta,
            c.raw_mut(),
            Some(uplo),
            &BlockingFactors::DEFAULT,
        )
    };
    Ok(())
}

/// `C = beta * C + alpha * A B` (`Side::Left`) or `alpha * B A`
/// (`Side::Right`) for symmetric `A`, of which only the `uplo` triangle is
/// read.
#[allow(clippy::too_many_arguments)]
pub fn symm(
    side: Side,
    uplo: Uplo,
    alpha: f64,
    a: &MatrixView<'_>,
    b: &MatrixView<'_>,
    beta: f64,
    c: &mut MatrixViewMut<'_>,
) -> Result<()> {
    check_square(a)?;
    let sym = Operand::structured(a.raw(), Source::Symmetric(uplo));
    let dense = Operand::general(b.raw());
    let (lhs, rhs) = match side {
        Side::Left => {
            check_product("symm", a, b, c.rows(), c.cols())?;
            (sym, dense)
        }
        Side::Right => {
            check_product("symm", b, a, c.rows(), c.cols())?;
            (dense, sym)
        }
    };
    unsafe { blocked_multiply(alpha, lhs, rhs, beta, c.raw_mut(), None, &BlockingFactors::DEFAULT) };
    Ok(())
}

/// Copy `b` into column-major scratch.
unsafe fn stage(b: MatMut) -> ScratchBuffer {
    let mut buf = ScratchBuffer::zeroed(b.rows * b.cols);
    for j in 0..b.cols {
        for i in 0..b.rows {
            buf[i + j * b.rows] = *b.ptr_at(i, j);
        }
    }
    buf
}

fn col_major_ref(buf: &[f64], rows: usize, cols: usize) -> MatRef {
    MatRef {
        ptr: buf.as_ptr(),
        rows,
        cols,
        rs: 1,
        cs: rows.max(1) as isize,
    }
}

fn triangular_operand(a: &MatrixView<'_>, uplo: Uplo, trans: Trans, diag: Diag) -> Operand {
    let op = Operand::structured(a.raw(), Source::Triangular(uplo, diag));
    match trans {
        Trans::No => op,
        Trans::Yes => op.t(),
    }
}

/// `B = alpha * op(A) B` (`Side::Left`) or `alpha * B op(A)` (`Side::Right`)
/// for triangular `A`, in place.
#[allow(clippy::too_many_arguments)]
pub fn trmm(
    side: Side,
    uplo: Uplo,
    transa: Trans,
    diag: Diag,
    alpha: f64,
    a: &MatrixView<'_>,
    b: &mut MatrixViewMut<'_>,
) -> Result<()> {
    check_square(a)?;
    let order = match side {
        Side::Left => b.rows(),
        Side::Right => b.cols(),
    };
    if a.rows() != order {
        return Err(shape_mismatch("trmm", &[order, order], &[a.rows(), a.cols()]));
    }
    let target = b.raw_mut();
    if target.rows == 0 || target.cols == 0 {
        return Ok(());
    }
    if alpha == 0.0 {
        unsafe { scale_masked(0.0, target, None) };
        return Ok(());
    }
    unsafe {
        let copy = stage(target);
        let src = Operand::general(col_major_ref(&copy, target.rows, target.cols));
        let tri = triangular_operand(a, uplo, transa, diag);
        let (lhs, rhs) = match side {
            Side::Left => (tri, src),
            Side::Right => (src, tri),
        };
        blocked_multiply(alpha, lhs, rhs, 0.0, target, None, &BlockingFactors::DEFAULT);
    }
    Ok(())
}

/// Solve `T X = B` in place for the `uplo` triangle of the square `t`, with
/// `x` holding `B` on entry.
unsafe fn solve_left(t: MatRef, uplo: Uplo, diag: Diag, x: MatMut) {
    let (m, n) = (x.rows, x.cols);
    let solve_block = |k0: usize, kb: usize| {
        let diag_block = t.sub(k0, k0, kb, kb);
        let rhs = x.sub(k0, 0, kb, n);
        for j in 0..n {
            triangular_solve(diag_block, uplo, diag, rhs.ptr_at(0, j), rhs.rs);
        }
        rhs
    };
    match uplo {
        Uplo::Lower => {
            for k0 in (0..m).step_by(TRSM_BLOCK) {
                let kb = TRSM_BLOCK.min(m - k0);
                let solved = solve_block(k0, kb);
                let k1 = k0 + kb;
                if k1 < m {
                    blocked_multiply(
                        -1.0,
                        Operand::general(t.sub(k1, k0, m - k1, kb)),
                        Operand::general(solved.as_ref()),
                        1.0,
                        x.sub(k1, 0, m - k1, n),
                        None,
                        &BlockingFactors::DEFAULT,
                    );
                }
            }
        }
        Uplo::Upper => {
            let mut k1 = m;
            while k1 > 0 {
                let k0 = k1.saturating_sub(TRSM_BLOCK);
                let solved = solve_block(k0, k1 - k0);
                if k0 > 0 {
                    blocked_multiply(
                        -1.0,
                        Operand::general(t.sub(0, k0, k0, k1 - k0)),
                        Operand::general(solved.as_ref()),
                        1.0,
                        x.sub(0, 0, k0, n),
                        None,
                        &BlockingFactors::DEFAULT,
                    );
                }
                k1 = k0;
            }
        }
    }
}

/// Solve `op(A) X = alpha B` (`Side::Left`) or `X op(A) = alpha B`
/// (`Side::Right`) for triangular `A`; `B` is overwritten with `X`.
#[allow(clippy::too_many_arguments)]
pub fn trsm(
    side: Side,
    uplo: Uplo,
    transa: Trans,
    diag: Diag,
    alpha: f64,
    a: &MatrixView<'_>,
    b: &mut MatrixViewMut<'_>,
) -> Result<()> {
    check_square(a)?;
    let order = match side {
        Side::Left => b.rows(),
        Side::Right => b.cols(),
    };
    if a.rows() != order {
        return Err(shape_mismatch("trsm", &[order, order], &[a.rows(), a.cols()]));
    }
    let target = b.raw_mut();
    if target.rows == 0 || target.cols == 0 {
        return Ok(());
    }
    unsafe {
        scale_masked(alpha, target, None);
        if alpha == 0.0 {
            return Ok(());
        }
        // X op(A) = B  <=>  op(A)ᵀ Xᵀ = Bᵀ.
        let (trans, x) = match side {
            Side::Left => (transa, target),
            Side::Right => (transa.flip(), target.t()),
        };
        let (t, uplo) = match trans {
            Trans::No => (a.raw(), uplo),
            Trans::Yes => (a.raw().t(), uplo.flip()),
        };
        solve_left(t, uplo, diag, x);
    }
    Ok(())
}

fn rank_k_operand<'a>(a: &MatrixView<'a>, trans: Trans) -> MatrixView<'a> {
    // No: C += A Aᵀ with A n x k. Yes: C += Aᵀ A with A k x n.
    op_view(a, trans)
}

/// Symmetric rank-k update of the `uplo` triangle of `C`:
/// `C = beta * C + alpha * op(A) op(A)ᵀ`.
pub fn syrk(
    uplo: Uplo,
    trans: Trans,
    alpha: f64,
    a: &MatrixView<'_>,
    beta: f64,
    c: &mut MatrixViewMut<'_>,
) -> Result<()> {
    if !c.is_square() {
        return Err(StridedError::NonSquare {
            rows: c.rows(),
            cols: c.cols(),
        });
    }
    let a = rank_k_operand(a, trans);
    check_product("syrk", &a, &a.t(), c.rows(), c.cols())?;
    unsafe {
        blocked_multiply(
            alpha,
            Operand::general(a.raw()),
            Operand::general(a.t().raw()),
            beta,
            c.raw_mut(),
            Some(uplo),
            &BlockingFactors::DEFAULT,
        )
    };
    Ok(())
}

/// Symmetric rank-2k update of the `uplo` triangle of `C`:
/// `C = beta * C + alpha * (op(A) op(B)ᵀ + op(B) op(A)ᵀ)`.
#[allow(clippy::too_many_arguments)]
pub fn syr2k(
    uplo: Uplo,
    trans: Trans,
    alpha: f64,
    a: &MatrixView<'_>,
    b: &MatrixView<'_>,
    beta: f64,
    c: &mut MatrixViewMut<'_>,
) -> Result<()> {
    if !c.is_square() {
        return Err(StridedError::NonSquare {
            rows: c.rows(),
            cols: c.cols(),
        });
    }
    let (a, b) = (rank_k_operand(a, trans), rank_k_operand(b, trans));
    check_product("syr2k", &a, &b.t(), c.rows(), c.cols())?;
    let target = c.raw_mut();
    let bf = BlockingFactors::DEFAULT;
    unsafe {
        blocked_multiply(
            alpha,
            Operand::general(a.raw()),
            Operand::general(b.t().raw()),
            beta,
            target,
            Some(uplo),
            &bf,
        );
        blocked_multiply(
            alpha,
            Operand::general(b.raw()),
            Operand::general(a.t().raw()),
            1.0,
            target,
            Some(uplo),
            &bf,
        );
    }
    Ok(())
}
