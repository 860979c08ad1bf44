//! Matrix-vector primitives.
//!
//! Each routine checks every operand's shape up front, then picks the
//! traversal that suits the matrix layout: dot-product (row) form when rows
//! are contiguous, scaled-add (column) form otherwise. Both forms compute the
//! same values; only the rounding order differs.

use crate::fused;
use crate::indice::{Indice2, Indice3};
use crate::layout::{Diag, Trans, Uplo};
use crate::level1;
use crate::matrix::{MatRef, MatrixView, MatrixViewMut};
use crate::vector::{VectorView, VectorViewMut};
use crate::{shape_mismatch, Result, StridedError};

fn check_len(op: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(shape_mismatch(op, &[expected], &[found]));
    }
    Ok(())
}

fn check_square(rows: usize, cols: usize) -> Result<()> {
    if rows != cols {
        return Err(StridedError::NonSquare { rows, cols });
    }
    Ok(())
}

/// `op(A)` as a view.
#[inline]
pub(crate) fn op_view<'a>(a: &MatrixView<'a>, trans: Trans) -> MatrixView<'a> {
    match trans {
        Trans::No => *a,
        Trans::Yes => a.t(),
    }
}

/// Whether rows of `m` are the cheaper direction to stream.
#[inline]
fn rows_contiguous(m: &MatRef) -> bool {
    m.cs.unsigned_abs() < m.rs.unsigned_abs()
}

#[inline(always)]
unsafe fn diag_value(t: &MatRef, diag: Diag, i: usize) -> f64 {
    match diag {
        Diag::Unit => 1.0,
        Diag::NonUnit => t.get(i, i),
    }
}

/// `y = beta * y + alpha * op(A) x`.
///
/// With `beta == 0` the old contents of `y` are never read.
pub fn gemv(
    trans: Trans,
    alpha: f64,
    a: &MatrixView<'_>,
    x: &VectorView<'_>,
    beta: f64,
    y: &mut VectorViewMut<'_>,
) -> Result<()> {
    let b = op_view(a, trans);
    check_len("gemv", b.cols(), x.len())?;
    check_len("gemv", b.rows(), y.len())?;
    if b.rows() == 0 {
        return Ok(());
    }
    if b.cols() == 0 || alpha == 0.0 {
        return level1::scale(beta, y);
    }
    if b.col_stride() == 1 && b.row_stride() != 1 {
        // Each y[i] is a dot product with a contiguous row.
        unsafe { fused::dotxf(alpha, &b.t(), x.ptr(), x.stride(), beta, y.as_mut_ptr(), y.stride()) };
    } else {
        unsafe { fused::axpyf(alpha, &b, x.ptr(), x.stride(), beta, y.as_mut_ptr(), y.stride()) };
    }
    Ok(())
}

/// Rank-1 update `A = A + alpha * x yᵀ`.
pub fn ger(alpha: f64, x: &VectorView<'_>, y: &VectorView<'_>, a: &mut MatrixViewMut<'_>) -> Result<()> {
    check_len("ger", a.rows(), x.len())?;
    check_len("ger", a.cols(), y.len())?;
    if alpha == 0.0 {
        return Ok(());
    }
    let m = a.raw_mut();
    unsafe {
        if m.rs.unsigned_abs() <= m.cs.unsigned_abs() {
            for j in 0..m.cols {
                let coef = alpha * y.get(j);
                fused::axpy(coef, x.ptr(), m.ptr_at(0, j), Indice2::new(m.rows, x.stride(), m.rs));
            }
        } else {
            for i in 0..m.rows {
                let coef = alpha * x.get(i);
                fused::axpy(coef, y.ptr(), m.ptr_at(i, 0), Indice2::new(m.cols, y.stride(), m.cs));
            }
        }
    }
    Ok(())
}

/// Symmetric rank-1 update `A = A + alpha * x xᵀ`, touching only the `uplo`
/// triangle.
pub fn syr(uplo: Uplo, alpha: f64, x: &VectorView<'_>, a: &mut MatrixViewMut<'_>) -> Result<()> {
    check_square(a.rows(), a.cols())?;
    check_len("syr", a.rows(), x.len())?;
    if alpha == 0.0 {
        return Ok(());
    }
    let m = a.raw_mut();
    let n = m.rows;
    let incx = x.stride();
    let xp = |i: usize| x.ptr().wrapping_offset(i as isize * incx);
    unsafe {
        for j in 0..n {
            let coef = alpha * x.get(j);
            match uplo {
                Uplo::Lower => fused::axpy(coef, xp(j), m.ptr_at(j, j), Indice2::new(n - j, incx, m.rs)),
                Uplo::Upper => fused::axpy(coef, xp(0), m.ptr_at(0, j), Indice2::new(j + 1, incx, m.rs)),
            }
        }
    }
    Ok(())
}

/// Symmetric rank-2 update `A = A + alpha * (x yᵀ + y xᵀ)` on the `uplo`
/// triangle.
pub fn syr2(
    uplo: Uplo,
    alpha: f64,
    x: &VectorView<'_>,
    y: &VectorView<'_>,
    a: &mut MatrixViewMut<'_>,
) -> Result<()> {
    check_square(a.rows(), a.cols())?;
    check_len("syr2", a.rows(), x.len())?;
    check_len("syr2", a.rows(), y.len())?;
    if alpha == 0.0 {
        return Ok(());
    }
    let m = a.raw_mut();
    let n = m.rows;
    let (incx, incy) = (x.stride(), y.stride());
    let xp = |i: usize| x.ptr().wrapping_offset(i as isize * incx);
    let yp = |i: usize| y.ptr().wrapping_offset(i as isize * incy);
    unsafe {
        for j in 0..n {
            let (cx, cy) = (alpha * y.get(j), alpha * x.get(j));
            let (r0, len) = match uplo {
                Uplo::Lower => (j, n - j),
                Uplo::Upper => (0, j + 1),
            };
            let idx = Indice3::new(len, incx, incy, m.rs);
            fused::axpy2(cx, xp(r0), cy, yp(r0), m.ptr_at(r0, j), idx);
        }
    }
    Ok(())
}

/// `y = beta * y + alpha * A x` for symmetric `A`, of which only the `uplo`
/// triangle is read.
pub fn symv(
    uplo: Uplo,
    alpha: f64,
    a: &MatrixView<'_>,
    x: &VectorView<'_>,
    beta: f64,
    y: &mut VectorViewMut<'_>,
) -> Result<()> {
    check_square(a.rows(), a.cols())?;
    check_len("symv", a.rows(), x.len())?;
    check_len("symv", a.rows(), y.len())?;
    level1::scale(beta, y)?;
    if alpha == 0.0 {
        return Ok(());
    }
    let m = a.raw();
    let n = m.rows;
    let (incx, incy) = (x.stride(), y.stride());
    let xp = x.ptr();
    let yp = y.as_mut_ptr();
    unsafe {
        for j in 0..n {
            let xj = *xp.wrapping_offset(j as isize * incx);
            // Off-diagonal part of column j: below for Lower, above for Upper.
            let (r0, len) = match uplo {
                Uplo::Lower => (j + 1, n - j - 1),
                Uplo::Upper => (0, j),
            };
            let rho = fused::dotaxpy(
                m.ptr_at(r0, j),
                xp.wrapping_offset(r0 as isize * incx),
                alpha * xj,
                yp.wrapping_offset(r0 as isize * incy),
                Indice3::new(len, m.rs, incx, incy),
            );
            let yj = yp.wrapping_offset(j as isize * incy);
            *yj += alpha * (m.get(j, j) * xj + rho);
        }
    }
    Ok(())
}

/// Resolve `op(A)` of a triangular matrix to a plain matrix and the triangle
/// it occupies.
#[inline]
fn resolve(a: &MatrixView<'_>, uplo: Uplo, trans: Trans) -> (MatRef, Uplo) {
    match trans {
        Trans::No => (a.raw(), uplo),
        Trans::Yes => (a.raw().t(), uplo.flip()),
    }
}

/// `x = T x` for the `uplo` triangle of `t`, in place.
///
/// # Safety
/// `t` is square and readable; `x + i * incx` is writable for `i < t.rows`
/// and does not overlap `t`.
unsafe fn triangular_multiply(t: MatRef, uplo: Uplo, diag: Diag, x: *mut f64, incx: isize) {
    let n = t.rows;
    let xp = |i: usize| x.wrapping_offset(i as isize * incx);
    // Lower walks bottom-up and Upper top-down, so every entry of x that is
    // still needed has not been overwritten yet.
    let descending = matches!(uplo, Uplo::Lower);
    if rows_contiguous(&t) {
        for step in 0..n {
            let i = if descending { n - 1 - step } else { step };
            let (c0, len) = if descending { (0, i) } else { (i + 1, n - i - 1) };
            let rho = fused::dot(t.ptr_at(i, c0), xp(c0), Indice2::new(len, t.cs, incx));
            *xp(i) = diag_value(&t, diag, i) * *xp(i) + rho;
        }
    } else {
        for step in 0..n {
            let j = if descending { n - 1 - step } else { step };
            let xj = *xp(j);
            let (r0, len) = if descending { (j + 1, n - j - 1) } else { (0, j) };
            fused::axpy(xj, t.ptr_at(r0, j), xp(r0), Indice2::new(len, t.rs, incx));
            *xp(j) = diag_value(&t, diag, j) * xj;
        }
    }
}

/// Solve `T x = b` in place for the `uplo` triangle of `t`.
///
/// # Safety
/// As [`triangular_multiply`].
pub(crate) unsafe fn triangular_solve(t: MatRef, uplo: Uplo, diag: Diag, x: *mut f64, incx: isize) {
    let n = t.rows;
    let xp = |i: usize| x.wrapping_offset(i as isize * incx);
    let forward = matches!(uplo, Uplo::Lower);
    if rows_contiguous(&t) {
        for step in 0..n {
            let i = if forward { step } else { n - 1 - step };
            let (c0, len) = if forward { (0, i) } else { (i + 1, n - i - 1) };
            let rho = fused::dot(t.ptr_at(i, c0), xp(c0), Indice2::new(len, t.cs, incx));
            let v = *xp(i) - rho;
            *xp(i) = match diag {
                Diag::Unit => v,
                Diag::NonUnit => v / t.get(i, i),
            };
        }
    } else {
        for step in 0..n {
            let j = if forward { step } else { n - 1 - step };
            if diag == Diag::NonUnit {
                *xp(j) /= t.get(j, j);
            }
            let (r0, len) = if forward { (j + 1, n - j - 1) } else { (0, j) };
            fused::axpy(-*xp(j), t.ptr_at(r0, j), xp(r0), Indice2::new(len, t.rs, incx));
        }
    }
}

/// `x = op(A) x` for triangular `A`.
pub fn trmv(
    uplo: Uplo,
    trans: Trans,
    diag: Diag,
    a: &MatrixView<'_>,
    x: &mut VectorViewMut<'_>,
) -> Result<()> {
    check_square(a.rows(), a.cols())?;
    check_len("trmv", a.rows(), x.len())?;
    let (t, uplo) = resolve(a, uplo, trans);
    let incx = x.stride();
    unsafe { triangular_multiply(t, uplo, diag, x.as_mut_ptr(), incx) };
    Ok(())
}

/// Solve `op(A) x = b` for triangular `A`; `x` holds `b` on entry.
pub fn trsv(
    uplo: Uplo,
    trans: Trans,
    diag: Diag,
    a: &MatrixView<'_>,
    x: &mut VectorViewMut<'_>,
) -> Result<()> {
    check_square(a.rows(), a.cols())?;
    check_len("trsv", a.rows(), x.len())?;
    let (t, uplo) = resolve(a, uplo, trans);
    let incx = x.stride();
    unsafe { triangular_solve(t, uplo, diag, x.as_mut_ptr(), incx) };
    Ok(())
}
