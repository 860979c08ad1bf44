//! Vector-vector primitives.
//!
//! The element-wise routines (`set`, `copy`, `scale`, `inv_scale`, `add`,
//! `axpy`, `asum`, `nrm2`) accept any [`Operand`]/[`OperandMut`], so they work
//! on matrices and N-d views as well as vectors, and run through the
//! [`ufunc`](crate::ufunc) dispatcher. The remaining routines take vectors and
//! call the [`fused`](crate::fused) kernels directly.
//!
//! Every routine validates shapes before it writes anything. A zero
//! coefficient takes a fast path that never multiplies through, so NaN or Inf
//! in an operand that is scaled by zero does not reach the output.

use crate::fused;
use crate::indice::{Indice1, Indice2, Indice3};
use crate::operator::{Abs, Add, Axpy, Div, Identity, MaxNan, Mul, ScaledSquare, Sum};
use crate::ufunc::{self, Operand, OperandMut};
use crate::vector::{VectorView, VectorViewMut};
use crate::{shape_mismatch, Result, StridedError};

fn check_same(op: &'static str, expected: &[usize], found: &[usize]) -> Result<()> {
    if expected != found {
        return Err(shape_mismatch(op, expected, found));
    }
    Ok(())
}

/// `x[i] = alpha`.
pub fn set<D: OperandMut + ?Sized>(alpha: f64, x: &mut D) -> Result<()> {
    ufunc::apply(x, alpha, &Identity)
}

/// `y = x`.
pub fn copy<S, D>(x: &S, y: &mut D) -> Result<()>
where
    S: Operand + ?Sized,
    D: OperandMut + ?Sized,
{
    check_same("copy", y.dims(), x.dims())?;
    ufunc::map_into(x, y, &Identity)
}

/// `x = alpha * x`.
///
/// `alpha == 1` is a no-op and `alpha == 0` overwrites `x` with zeros.
pub fn scale<D: OperandMut + ?Sized>(alpha: f64, x: &mut D) -> Result<()> {
    if alpha == 1.0 {
        return Ok(());
    }
    if alpha == 0.0 {
        return ufunc::apply(x, 0.0, &Identity);
    }
    ufunc::map_scalar(x, alpha, &Mul)
}

/// `x = x / alpha`.
///
/// Fails with [`StridedError::InvalidDivisor`] if `alpha` is zero or not
/// finite; `x` is untouched in that case.
pub fn inv_scale<D: OperandMut + ?Sized>(alpha: f64, x: &mut D) -> Result<()> {
    if alpha == 0.0 || !alpha.is_finite() {
        return Err(StridedError::InvalidDivisor(alpha));
    }
    if alpha == 1.0 {
        return Ok(());
    }
    ufunc::map_scalar(x, alpha, &Div)
}

/// `y = y + x`.
pub fn add<S, D>(x: &S, y: &mut D) -> Result<()>
where
    S: Operand + ?Sized,
    D: OperandMut + ?Sized,
{
    check_same("add", y.dims(), x.dims())?;
    ufunc::combine(x, y, &Add)
}

/// `y = alpha * x + y`. `alpha == 0` leaves `y` unchanged.
pub fn axpy<S, D>(alpha: f64, x: &S, y: &mut D) -> Result<()>
where
    S: Operand + ?Sized,
    D: OperandMut + ?Sized,
{
    check_same("axpy", y.dims(), x.dims())?;
    if alpha == 0.0 {
        return Ok(());
    }
    if alpha == 1.0 {
        return ufunc::combine(x, y, &Add);
    }
    ufunc::combine_scalar(x, alpha, y, &Axpy)
}

/// `z = z + alpha * x + beta * y`.
pub fn axpy2(
    alpha: f64,
    x: &VectorView<'_>,
    beta: f64,
    y: &VectorView<'_>,
    z: &mut VectorViewMut<'_>,
) -> Result<()> {
    check_same("axpy2", &[z.len()], &[x.len()])?;
    check_same("axpy2", &[z.len()], &[y.len()])?;
    let idx = Indice3::new(z.len(), x.stride(), y.stride(), z.stride());
    unsafe { fused::axpy2(alpha, x.ptr(), beta, y.ptr(), z.as_mut_ptr(), idx) };
    Ok(())
}

/// Exchange the contents of `x` and `y`.
pub fn swap(x: &mut VectorViewMut<'_>, y: &mut VectorViewMut<'_>) -> Result<()> {
    check_same("swap", &[x.len()], &[y.len()])?;
    let idx = Indice2::new(x.len(), x.stride(), y.stride());
    unsafe { fused::swap(x.as_mut_ptr(), y.as_mut_ptr(), idx) };
    Ok(())
}

/// `x . y`.
pub fn dot(x: &VectorView<'_>, y: &VectorView<'_>) -> Result<f64> {
    check_same("dot", &[x.len()], &[y.len()])?;
    let idx = Indice2::new(x.len(), x.stride(), y.stride());
    Ok(unsafe { fused::dot(x.ptr(), y.ptr(), idx) })
}

/// Returns `x . y` and applies `z = z + alpha * x` in the same pass over `x`.
pub fn dot_and_update(
    x: &VectorView<'_>,
    y: &VectorView<'_>,
    alpha: f64,
    z: &mut VectorViewMut<'_>,
) -> Result<f64> {
    check_same("dot_and_update", &[x.len()], &[y.len()])?;
    check_same("dot_and_update", &[x.len()], &[z.len()])?;
    let idx = Indice3::new(x.len(), x.stride(), y.stride(), z.stride());
    Ok(unsafe { fused::dotaxpy(x.ptr(), y.ptr(), alpha, z.as_mut_ptr(), idx) })
}

/// Apply the plane rotation `[c s; -s c]` to the pairs `(x[i], y[i])`.
pub fn rot(x: &mut VectorViewMut<'_>, y: &mut VectorViewMut<'_>, c: f64, s: f64) -> Result<()> {
    check_same("rot", &[x.len()], &[y.len()])?;
    let idx = Indice2::new(x.len(), x.stride(), y.stride());
    unsafe { fused::rot(x.as_mut_ptr(), y.as_mut_ptr(), c, s, idx) };
    Ok(())
}

/// Index of the first element of largest magnitude.
///
/// NaN entries are skipped unless every entry is NaN, in which case the
/// result is `Some(0)`. `None` for an empty vector.
pub fn iamax(x: &VectorView<'_>) -> Option<usize> {
    unsafe { fused::iamax(x.ptr(), Indice1::new(x.len(), x.stride())) }
}

/// `sum |x[i]|`.
pub fn asum<S: Operand + ?Sized>(x: &S) -> f64 {
    ufunc::reduce(x, &Abs, &Sum)
}

/// Euclidean norm, scaled by the largest magnitude so that squaring neither
/// overflows nor underflows.
pub fn nrm2<S: Operand + ?Sized>(x: &S) -> f64 {
    let amax = ufunc::reduce(x, &Abs, &MaxNan);
    if amax.is_nan() || amax == f64::INFINITY {
        return amax;
    }
    // Also covers the empty operand, whose maximum is the -inf seed.
    if amax <= 0.0 {
        return 0.0;
    }
    let inv = 1.0 / amax;
    let ssq = if inv.is_finite() {
        ufunc::reduce(x, &ScaledSquare(inv), &Sum)
    } else {
        ufunc::reduce(
            x,
            &|v: f64| {
                let r = v / amax;
                r * r
            },
            &Sum,
        )
    };
    amax * ssq.sqrt()
}
