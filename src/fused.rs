//! Fused vector kernels.
//!
//! Every kernel works on raw base pointers and an [`Indice1`]/[`Indice2`]/
//! [`Indice3`] loop descriptor; validation is the caller's job. Unit-stride
//! calls are vectorised with four registers in flight when the `simd` feature
//! is enabled; anything else runs the 4-way unrolled scalar loop.
//!
//! Operand order in a descriptor follows the argument order of the kernel:
//! for `axpy(alpha, x, y, idx)` the stride of `x` is `idx.stride_a`, the
//! stride of `y` is `idx.stride_b`.

use crate::indice::{Indice1, Indice2, Indice3};
use crate::kernel::strided_loop;
use crate::matrix::{MatRef, MatrixView};
use crate::scratch::{BufferView, ScratchBuffer};
use crate::simd;

#[cfg(feature = "simd")]
mod vector {
    use pulp::{Simd, WithSimd};

    use crate::PREFERRED_UNROLL;

    pub(super) struct Axpy<'a> {
        pub(super) alpha: f64,
        pub(super) x: &'a [f64],
        pub(super) y: &'a mut [f64],
    }

    impl WithSimd for Axpy<'_> {
        type Output = ();

        #[inline(always)]
        fn with_simd<S: Simd>(self, simd: S) {
            let Axpy { alpha, x, y } = self;
            let a = simd.splat_f64s(alpha);
            let (xh, xt) = S::as_simd_f64s(x);
            let (yh, yt) = S::as_mut_simd_f64s(y);
            for (yv, &xv) in yh.iter_mut().zip(xh) {
                *yv = simd.add_f64s(simd.mul_f64s(a, xv), *yv);
            }
            for (yv, &xv) in yt.iter_mut().zip(xt) {
                *yv = alpha * xv + *yv;
            }
        }
    }

    pub(super) struct Axpy2<'a> {
        pub(super) alpha: f64,
        pub(super) x: &'a [f64],
        pub(super) beta: f64,
        pub(super) y: &'a [f64],
        pub(super) z: &'a mut [f64],
    }

    impl WithSimd for Axpy2<'_> {
        type Output = ();

        #[inline(always)]
        fn with_simd<S: Simd>(self, simd: S) {
            let Axpy2 { alpha, x, beta, y, z } = self;
            let a = simd.splat_f64s(alpha);
            let b = simd.splat_f64s(beta);
            let (xh, xt) = S::as_simd_f64s(x);
            let (yh, yt) = S::as_simd_f64s(y);
            let (zh, zt) = S::as_mut_simd_f64s(z);
            for ((zv, &xv), &yv) in zh.iter_mut().zip(xh).zip(yh) {
                let t = simd.add_f64s(simd.mul_f64s(a, xv), simd.mul_f64s(b, yv));
                *zv = simd.add_f64s(*zv, t);
            }
            for ((zv, &xv), &yv) in zt.iter_mut().zip(xt).zip(yt) {
                *zv += alpha * xv + beta * yv;
            }
        }
    }

    pub(super) struct Dot<'a> {
        pub(super) x: &'a [f64],
        pub(super) y: &'a [f64],
    }

    impl WithSimd for Dot<'_> {
        type Output = f64;

        #[inline(always)]
        fn with_simd<S: Simd>(self, simd: S) -> f64 {
            let (xh, xt) = S::as_simd_f64s(self.x);
            let (yh, yt) = S::as_simd_f64s(self.y);

            let mut acc0 = simd.splat_f64s(0.0);
            let mut acc1 = simd.splat_f64s(0.0);
            let mut acc2 = simd.splat_f64s(0.0);
            let mut acc3 = simd.splat_f64s(0.0);

            let mut i = 0usize;
            while i + PREFERRED_UNROLL <= xh.len() {
                acc0 = simd.mul_add_f64s(xh[i], yh[i], acc0);
                acc1 = simd.mul_add_f64s(xh[i + 1], yh[i + 1], acc1);
                acc2 = simd.mul_add_f64s(xh[i + 2], yh[i + 2], acc2);
                acc3 = simd.mul_add_f64s(xh[i + 3], yh[i + 3], acc3);
                i += PREFERRED_UNROLL;
            }
            while i < xh.len() {
                acc0 = simd.mul_add_f64s(xh[i], yh[i], acc0);
                i += 1;
            }

            acc0 = simd.add_f64s(acc0, acc1);
            acc2 = simd.add_f64s(acc2, acc3);
            acc0 = simd.add_f64s(acc0, acc2);
            let mut sum = simd.reduce_sum_f64s(acc0);
            for (&a, &b) in xt.iter().zip(yt) {
                sum += a * b;
            }
            sum
        }
    }

    pub(super) struct DotAxpy<'a> {
        pub(super) x: &'a [f64],
        pub(super) y: &'a [f64],
        pub(super) alpha: f64,
        pub(super) z: &'a mut [f64],
    }

    impl WithSimd for DotAxpy<'_> {
        type Output = f64;

        #[inline(always)]
        fn with_simd<S: Simd>(self, simd: S) -> f64 {
            let DotAxpy { x, y, alpha, z } = self;
            let a = simd.splat_f64s(alpha);
            let (xh, xt) = S::as_simd_f64s(x);
            let (yh, yt) = S::as_simd_f64s(y);
            let (zh, zt) = S::as_mut_simd_f64s(z);

            let mut acc0 = simd.splat_f64s(0.0);
            let mut acc1 = simd.splat_f64s(0.0);
            let mut i = 0usize;
            while i + 2 <= xh.len() {
                acc0 = simd.mul_add_f64s(xh[i], yh[i], acc0);
                acc1 = simd.mul_add_f64s(xh[i + 1], yh[i + 1], acc1);
                zh[i] = simd.add_f64s(simd.mul_f64s(a, xh[i]), zh[i]);
                zh[i + 1] = simd.add_f64s(simd.mul_f64s(a, xh[i + 1]), zh[i + 1]);
                i += 2;
            }
            if i < xh.len() {
                acc0 = simd.mul_add_f64s(xh[i], yh[i], acc0);
                zh[i] = simd.add_f64s(simd.mul_f64s(a, xh[i]), zh[i]);
            }
            let mut sum = simd.reduce_sum_f64s(simd.add_f64s(acc0, acc1));
            for ((zv, &xv), &yv) in zt.iter_mut().zip(xt).zip(yt) {
                sum += xv * yv;
                *zv = alpha * xv + *zv;
            }
            sum
        }
    }

    /// `y += sum_j coef[j] * cols[j]` over `B` contiguous columns.
    pub(super) struct AxpyPanel<'a, const B: usize> {
        pub(super) cols: [&'a [f64]; B],
        pub(super) coef: [f64; B],
        pub(super) y: &'a mut [f64],
    }

    impl<const B: usize> WithSimd for AxpyPanel<'_, B> {
        type Output = ();

        #[inline(always)]
        fn with_simd<S: Simd>(self, simd: S) {
            let AxpyPanel { cols, coef, y } = self;
            let heads: [(&[S::f64s], &[f64]); B] =
                std::array::from_fn(|j| S::as_simd_f64s(cols[j]));
            let cv: [S::f64s; B] = std::array::from_fn(|j| simd.splat_f64s(coef[j]));
            let (yh, yt) = S::as_mut_simd_f64s(y);
            for (i, yv) in yh.iter_mut().enumerate() {
                let mut acc = *yv;
                for j in 0..B {
                    acc = simd.add_f64s(simd.mul_f64s(heads[j].0[i], cv[j]), acc);
                }
                *yv = acc;
            }
            for (i, yv) in yt.iter_mut().enumerate() {
                let mut acc = *yv;
                for j in 0..B {
                    acc += heads[j].1[i] * coef[j];
                }
                *yv = acc;
            }
        }
    }

    /// `out[j] = cols[j] . x` over `B` contiguous columns, loading `x` once.
    pub(super) struct DotPanel<'a, const B: usize> {
        pub(super) cols: [&'a [f64]; B],
        pub(super) x: &'a [f64],
    }

    impl<const B: usize> WithSimd for DotPanel<'_, B> {
        type Output = [f64; B];

        #[inline(always)]
        fn with_simd<S: Simd>(self, simd: S) -> [f64; B] {
            let DotPanel { cols, x } = self;
            let heads: [(&[S::f64s], &[f64]); B] =
                std::array::from_fn(|j| S::as_simd_f64s(cols[j]));
            let (xh, xt) = S::as_simd_f64s(x);
            let mut acc = [simd.splat_f64s(0.0); B];
            for (i, &xv) in xh.iter().enumerate() {
                for j in 0..B {
                    acc[j] = simd.mul_add_f64s(heads[j].0[i], xv, acc[j]);
                }
            }
            std::array::from_fn(|j| {
                let mut sum = simd.reduce_sum_f64s(acc[j]);
                for (&c, &xv) in heads[j].1.iter().zip(xt) {
                    sum += c * xv;
                }
                sum
            })
        }
    }
}

#[cfg(feature = "simd")]
#[inline(always)]
unsafe fn slice<'a>(p: *const f64, len: usize) -> &'a [f64] {
    std::slice::from_raw_parts(p, len)
}

#[cfg(feature = "simd")]
#[inline(always)]
unsafe fn slice_mut<'a>(p: *mut f64, len: usize) -> &'a mut [f64] {
    std::slice::from_raw_parts_mut(p, len)
}

/// `y += alpha * x`. Does nothing when `alpha == 0`.
///
/// # Safety
/// `x + i * idx.stride_a` must be readable and `y + i * idx.stride_b`
/// writable for `i < idx.len`; the two ranges must not overlap.
pub unsafe fn axpy(alpha: f64, x: *const f64, y: *mut f64, idx: Indice2) {
    if alpha == 0.0 || idx.len == 0 {
        return;
    }
    #[cfg(feature = "simd")]
    if idx.is_unit() {
        return pulp::Arch::new().dispatch(vector::Axpy {
                alpha,
                x: slice(x, idx.len),
                y: slice_mut(y, idx.len),
            });
    }
    strided_loop(
        [x as *mut f64, y],
        [idx.stride_a, idx.stride_b],
        idx.len,
        |[xp, yp]| *yp = alpha * *xp + *yp,
    );
}

/// `z += alpha * x + beta * y`.
///
/// A zero coefficient drops its term entirely, so NaN in the corresponding
/// input does not reach `z`.
///
/// # Safety
/// As [`axpy`], for three operands with strides `a`, `b`, `c`; `z` must not
/// overlap `x` or `y`.
pub unsafe fn axpy2(alpha: f64, x: *const f64, beta: f64, y: *const f64, z: *mut f64, idx: Indice3) {
    match (alpha == 0.0, beta == 0.0) {
        (true, true) => return,
        (true, false) => return axpy(beta, y, z, idx.bc()),
        (false, true) => return axpy(alpha, x, z, idx.ac()),
        (false, false) => {}
    }
    if idx.len == 0 {
        return;
    }
    #[cfg(feature = "simd")]
    if idx.is_unit() {
        return pulp::Arch::new().dispatch(vector::Axpy2 {
                alpha,
                x: slice(x, idx.len),
                beta,
                y: slice(y, idx.len),
                z: slice_mut(z, idx.len),
            });
    }
    strided_loop(
        [x as *mut f64, y as *mut f64, z],
        [idx.stride_a, idx.stride_b, idx.stride_c],
        idx.len,
        |[xp, yp, zp]| *zp += alpha * *xp + beta * *yp,
    );
}

unsafe fn dot_strided(x: *const f64, y: *const f64, idx: Indice2) -> f64 {
    let mut acc = [0.0f64; 4];
    let mut xp = x;
    let mut yp = y;
    let mut i = 0usize;
    while i + 4 <= idx.len {
        for a in acc.iter_mut() {
            *a += *xp * *yp;
            xp = xp.wrapping_offset(idx.stride_a);
            yp = yp.wrapping_offset(idx.stride_b);
        }
        i += 4;
    }
    let mut sum = (acc[0] + acc[1]) + (acc[2] + acc[3]);
    while i < idx.len {
        sum += *xp * *yp;
        xp = xp.wrapping_offset(idx.stride_a);
        yp = yp.wrapping_offset(idx.stride_b);
        i += 1;
    }
    sum
}

/// `x . y`.
///
/// # Safety
/// `x + i * idx.stride_a` and `y + i * idx.stride_b` must be readable for
/// `i < idx.len`.
pub unsafe fn dot(x: *const f64, y: *const f64, idx: Indice2) -> f64 {
    if idx.len == 0 {
        return 0.0;
    }
    #[cfg(feature = "simd")]
    if idx.is_unit() {
        return pulp::Arch::new().dispatch(vector::Dot {
                x: slice(x, idx.len),
                y: slice(y, idx.len),
            });
    }
    dot_strided(x, y, idx)
}

/// One pass computing `rho = x . y` while applying `z += alpha * x`.
///
/// # Safety
/// `x` (stride `a`) and `y` (stride `b`) readable, `z` (stride `c`)
/// writable, for `i < idx.len`. `z` may not overlap `x` or `y`.
pub unsafe fn dotaxpy(x: *const f64, y: *const f64, alpha: f64, z: *mut f64, idx: Indice3) -> f64 {
    if alpha == 0.0 {
        return dot(x, y, idx.ab());
    }
    if idx.len == 0 {
        return 0.0;
    }
    #[cfg(feature = "simd")]
    if idx.is_unit() {
        return pulp::Arch::new().dispatch(vector::DotAxpy {
                x: slice(x, idx.len),
                y: slice(y, idx.len),
                alpha,
                z: slice_mut(z, idx.len),
            });
    }
    let mut rho = 0.0;
    strided_loop(
        [x as *mut f64, y as *mut f64, z],
        [idx.stride_a, idx.stride_b, idx.stride_c],
        idx.len,
        |[xp, yp, zp]| {
            let xv = *xp;
            rho += xv * *yp;
            *zp = alpha * xv + *zp;
        },
    );
    rho
}

/// Exchange the elements of `x` and `y`.
///
/// # Safety
/// Both operands writable for `i < idx.len`, non-overlapping.
pub unsafe fn swap(x: *mut f64, y: *mut f64, idx: Indice2) {
    strided_loop([x, y], [idx.stride_a, idx.stride_b], idx.len, |[xp, yp]| {
        std::ptr::swap(xp, yp)
    });
}

/// Plane rotation: `x' = c*x + s*y`, `y' = c*y - s*x`.
///
/// # Safety
/// Both operands writable for `i < idx.len`, non-overlapping.
pub unsafe fn rot(x: *mut f64, y: *mut f64, c: f64, s: f64, idx: Indice2) {
    strided_loop([x, y], [idx.stride_a, idx.stride_b], idx.len, |[xp, yp]| {
        let xv = *xp;
        let yv = *yp;
        *xp = c * xv + s * yv;
        *yp = c * yv - s * xv;
    });
}

/// Index of the first element with the largest magnitude.
///
/// NaN elements are skipped; if every element is NaN the result is `Some(0)`.
/// `None` for an empty vector.
///
/// # Safety
/// `x + i * idx.stride_a` readable for `i < idx.len`.
pub unsafe fn iamax(x: *const f64, idx: Indice1) -> Option<usize> {
    if idx.len == 0 {
        return None;
    }
    let mut best = 0usize;
    let mut best_abs = -1.0f64;
    let mut p = x;
    for i in 0..idx.len {
        let v = (*p).abs();
        if v > best_abs {
            best = i;
            best_abs = v;
        }
        p = p.wrapping_offset(idx.stride_a);
    }
    Some(best)
}

fn panel_width() -> usize {
    simd::preferred_panel_width()
}

/// `y = beta * y + alpha * A x` for an `m x n` matrix, `b` columns at a time.
///
/// Each panel loads `b` scalars `alpha * x[j]` once and streams the rows of
/// `y` against them. A strided `y` is staged in contiguous scratch for the
/// duration of the call, scaled by `beta` on the way in. `beta == 0` never
/// reads `y`.
///
/// # Safety
/// `x + j * incx` readable for `j < a.cols()`, `y + i * incy` writable for
/// `i < a.rows()`; `y` must not overlap `a` or `x`.
pub unsafe fn axpyf(
    alpha: f64,
    a: &MatrixView<'_>,
    x: *const f64,
    incx: isize,
    beta: f64,
    y: *mut f64,
    incy: isize,
) {
    let a = a.raw();
    if a.rows == 0 {
        return;
    }
    if incy != 1 {
        let mut staged = BufferView::from_raw(y, Indice1::new(a.rows, incy), beta);
        if alpha != 0.0 && a.cols != 0 {
            axpyf_unit(alpha, a, x, incx, staged.as_mut_ptr());
        }
        return;
    }
    if beta != 1.0 {
        let y = std::slice::from_raw_parts_mut(y, a.rows);
        simd::dispatch(|| {
            for v in y.iter_mut() {
                *v = if beta == 0.0 { 0.0 } else { beta * *v };
            }
        });
    }
    if alpha != 0.0 && a.cols != 0 {
        axpyf_unit(alpha, a, x, incx, y);
    }
}

unsafe fn axpyf_unit(alpha: f64, a: MatRef, x: *const f64, incx: isize, y: *mut f64) {
    let width = panel_width();
    let mut j0 = 0usize;
    while j0 < a.cols {
        let b = width.min(a.cols - j0);
        let panel = a.sub(0, j0, a.rows, b);
        let xp = x.wrapping_offset(j0 as isize * incx);
        match b {
            8 => axpy_panel::<8>(alpha, panel, xp, incx, y),
            4 => axpy_panel::<4>(alpha, panel, xp, incx, y),
            _ => {
                for j in 0..b {
                    let coef = alpha * *xp.wrapping_offset(j as isize * incx);
                    axpy(coef, panel.ptr_at(0, j), y, Indice2::new(a.rows, panel.rs, 1));
                }
            }
        }
        j0 += b;
    }
}

#[inline(always)]
unsafe fn axpy_panel<const B: usize>(alpha: f64, panel: MatRef, x: *const f64, incx: isize, y: *mut f64) {
    let coef: [f64; B] = std::array::from_fn(|j| alpha * *x.wrapping_offset(j as isize * incx));
    #[cfg(feature = "simd")]
    if panel.rs == 1 {
        let cols: [&[f64]; B] = std::array::from_fn(|j| slice(panel.ptr_at(0, j), panel.rows));
        let y = slice_mut(y, panel.rows);
        return pulp::Arch::new().dispatch(vector::AxpyPanel { cols, coef, y });
    }
    for i in 0..panel.rows {
        let mut acc = *y.add(i);
        for (j, &c) in coef.iter().enumerate() {
            acc += panel.get(i, j) * c;
        }
        *y.add(i) = acc;
    }
}

/// `y = beta * y + alpha * Aᵀ x` for an `m x n` matrix `A`, so `x` has `m`
/// elements and `y` has `n`.
///
/// Each panel computes `b` dot products against one pass over `x`. With
/// `beta == 0` the old `y` is never read.
///
/// # Safety
/// `x + i * incx` readable for `i < a.rows()`, `y + j * incy` writable for
/// `j < a.cols()`; `y` must not overlap `a` or `x`.
pub unsafe fn dotxf(
    alpha: f64,
    a: &MatrixView<'_>,
    x: *const f64,
    incx: isize,
    beta: f64,
    y: *mut f64,
    incy: isize,
) {
    let a = a.raw();
    if a.cols == 0 {
        return;
    }
    let update = |j: usize, rho: f64| {
        let yp = y.wrapping_offset(j as isize * incy);
        *yp = if beta == 0.0 {
            alpha * rho
        } else {
            beta * *yp + alpha * rho
        };
    };
    if alpha == 0.0 || a.rows == 0 {
        for j in 0..a.cols {
            let yp = y.wrapping_offset(j as isize * incy);
            *yp = if beta == 0.0 { 0.0 } else { beta * *yp };
        }
        return;
    }

    // Panels read x once per column block; gather it if it is strided.
    let gathered;
    let (x, incx) = if incx != 1 && a.rs == 1 {
        let mut buf = ScratchBuffer::zeroed(a.rows);
        for (i, v) in buf.iter_mut().enumerate() {
            *v = *x.wrapping_offset(i as isize * incx);
        }
        gathered = buf;
        (gathered.as_ptr(), 1)
    } else {
        (x, incx)
    };

    let width = panel_width();
    let mut j0 = 0usize;
    while j0 < a.cols {
        let b = width.min(a.cols - j0);
        let panel = a.sub(0, j0, a.rows, b);
        match b {
            8 => dot_panel::<8>(panel, x, incx)
                .into_iter()
                .enumerate()
                .for_each(|(j, rho)| update(j0 + j, rho)),
            4 => dot_panel::<4>(panel, x, incx)
                .into_iter()
                .enumerate()
                .for_each(|(j, rho)| update(j0 + j, rho)),
            _ => {
                for j in 0..b {
                    let rho = dot(panel.ptr_at(0, j), x, Indice2::new(a.rows, panel.rs, incx));
                    update(j0 + j, rho);
                }
            }
        }
        j0 += b;
    }
}

#[inline(always)]
unsafe fn dot_panel<const B: usize>(panel: MatRef, x: *const f64, incx: isize) -> [f64; B] {
    #[cfg(feature = "simd")]
    if panel.rs == 1 && incx == 1 {
        let cols: [&[f64]; B] = std::array::from_fn(|j| slice(panel.ptr_at(0, j), panel.rows));
        let x = slice(x, panel.rows);
        return pulp::Arch::new().dispatch(vector::DotPanel { cols, x });
    }
    let mut acc = [0.0f64; B];
    for i in 0..panel.rows {
        let xv = *x.wrapping_offset(i as isize * incx);
        for (j, a) in acc.iter_mut().enumerate() {
            *a += panel.get(i, j) * xv;
        }
    }
    acc
}
