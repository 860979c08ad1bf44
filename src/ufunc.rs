//! The generic element-wise dispatcher.
//!
//! | function            | effect                               |
//! |---------------------|--------------------------------------|
//! | [`apply`]           | `dst[i] = op(s)`                      |
//! | [`map`]             | `dst[i] = op(dst[i])`                 |
//! | [`map_scalar`]      | `dst[i] = op(dst[i], s)`              |
//! | [`map_into`]        | `dst[i] = op(src[i])`                 |
//! | [`map_into_scalar`] | `dst[i] = op(src[i], s)`              |
//! | [`combine`]         | `dst[i] = op(src[i], dst[i])`         |
//! | [`combine_scalar`]  | `dst[i] = op(src[i], s, dst[i])`      |
//! | [`reduce`]          | fold of `agg` over `f(src[i])`        |
//!
//! Every call orders and fuses the operands' axes (destination stride
//! descending, innermost last), then walks the innermost runs with one of two
//! loops: the contiguous SIMD loop when every operand has unit inner stride,
//! the operator is `VECTORIZED` and the CPU has vector registers; otherwise
//! the 4-way unrolled strided loop. With the `parallel` feature, regions over
//! [`MIN_THREAD_LENGTH`](crate::MIN_THREAD_LENGTH) elements are split along
//! their outermost axis across rayon workers.

use smallvec::{smallvec, SmallVec};
use tracing::trace;

use crate::kernel::{build_plan, for_each_inner, strided_loop, LoopPlan};
use crate::matrix::{MatrixView, MatrixViewMut};
use crate::maybe_sync::MaybeSync;
use crate::operator::{Aggregator, BinaryOp, TernaryOp, UnaryOp};
use crate::vector::{VectorView, VectorViewMut};
use crate::view::{StridedView, StridedViewMut};
use crate::{simd, threading, Result, PREFERRED_UNROLL};

/// A readable `f64` operand.
///
/// # Safety
/// For every index within `dims()`, `as_ptr() + sum(i_k * strides()[k])`
/// must point to an initialised `f64` that stays valid while `self` is borrowed.
pub unsafe trait Operand {
    fn dims(&self) -> &[usize];
    fn strides(&self) -> &[isize];
    fn as_ptr(&self) -> *const f64;
}

/// A writable `f64` operand.
///
/// # Safety
/// In addition to the [`Operand`] contract, distinct indices must address
/// distinct elements, and `as_mut_ptr` must allow writes to all of them.
pub unsafe trait OperandMut: Operand {
    fn as_mut_ptr(&mut self) -> *mut f64;
}

macro_rules! impl_operand {
    ($($ty:ident),* $(,)?) => {
        $(
            unsafe impl Operand for $ty<'_, f64> {
                #[inline]
                fn dims(&self) -> &[usize] {
                    $ty::dims(self)
                }

                #[inline]
                fn strides(&self) -> &[isize] {
                    $ty::strides(self)
                }

                #[inline]
                fn as_ptr(&self) -> *const f64 {
                    self.ptr()
                }
            }
        )*
    };
}

macro_rules! impl_operand_mut {
    ($($ty:ident),* $(,)?) => {
        $(
            unsafe impl OperandMut for $ty<'_, f64> {
                #[inline]
                fn as_mut_ptr(&mut self) -> *mut f64 {
                    $ty::as_mut_ptr(self)
                }
            }
        )*
    };
}

impl_operand!(VectorView, VectorViewMut, MatrixView, MatrixViewMut, StridedView, StridedViewMut);
impl_operand_mut!(VectorViewMut, MatrixViewMut, StridedViewMut);

fn check_same_shape(op: &'static str, dst: &[usize], src: &[usize]) -> Result<()> {
    if dst != src {
        return Err(crate::shape_mismatch(op, dst, src));
    }
    Ok(())
}

// ============================================================================
// Passes: one inner-run loop per operation
// ============================================================================

/// An inner-run loop over the destination (operand 0) and an optional source
/// (operand 1).
trait Pass: MaybeSync {
    const VECTORIZED: bool;

    /// # Safety
    /// `ptrs[k] + i * strides[k]` must be valid for `i < len`.
    unsafe fn strided(&self, ptrs: [*mut f64; 2], strides: [isize; 2], len: usize);

    /// # Safety
    /// `ptrs[k]..ptrs[k] + len` must be valid, and the source run must not
    /// overlap the destination run.
    #[cfg(feature = "simd")]
    unsafe fn contiguous(&self, ptrs: [*mut f64; 2], len: usize);
}

#[cfg(feature = "simd")]
#[inline(always)]
unsafe fn run_mut<'a>(p: *mut f64, len: usize) -> &'a mut [f64] {
    std::slice::from_raw_parts_mut(p, len)
}

#[cfg(feature = "simd")]
#[inline(always)]
unsafe fn run_ref<'a>(p: *mut f64, len: usize) -> &'a [f64] {
    std::slice::from_raw_parts(p as *const f64, len)
}

struct Fill(f64);

impl Pass for Fill {
    const VECTORIZED: bool = true;

    unsafe fn strided(&self, ptrs: [*mut f64; 2], strides: [isize; 2], len: usize) {
        let v = self.0;
        strided_loop([ptrs[0]], [strides[0]], len, |[d]| *d = v);
    }

    #[cfg(feature = "simd")]
    unsafe fn contiguous(&self, ptrs: [*mut f64; 2], len: usize) {
        simd::fill(run_mut(ptrs[0], len), self.0);
    }
}

struct Map<'a, Op>(&'a Op);

impl<Op: UnaryOp> Pass for Map<'_, Op> {
    const VECTORIZED: bool = Op::VECTORIZED;

    unsafe fn strided(&self, ptrs: [*mut f64; 2], strides: [isize; 2], len: usize) {
        let op = self.0;
        strided_loop([ptrs[0]], [strides[0]], len, |[d]| *d = op.call(*d));
    }

    #[cfg(feature = "simd")]
    unsafe fn contiguous(&self, ptrs: [*mut f64; 2], len: usize) {
        simd::map(run_mut(ptrs[0], len), self.0);
    }
}

struct MapScalar<'a, Op>(&'a Op, f64);

impl<Op: BinaryOp> Pass for MapScalar<'_, Op> {
    const VECTORIZED: bool = Op::VECTORIZED;

    unsafe fn strided(&self, ptrs: [*mut f64; 2], strides: [isize; 2], len: usize) {
        let (op, s) = (self.0, self.1);
        strided_loop([ptrs[0]], [strides[0]], len, |[d]| *d = op.call(*d, s));
    }

    #[cfg(feature = "simd")]
    unsafe fn contiguous(&self, ptrs: [*mut f64; 2], len: usize) {
        simd::map_scalar(run_mut(ptrs[0], len), self.1, self.0);
    }
}

struct MapInto<'a, Op>(&'a Op);

impl<Op: UnaryOp> Pass for MapInto<'_, Op> {
    const VECTORIZED: bool = Op::VECTORIZED;

    unsafe fn strided(&self, ptrs: [*mut f64; 2], strides: [isize; 2], len: usize) {
        let op = self.0;
        strided_loop(ptrs, strides, len, |[d, s]| *d = op.call(*s));
    }

    #[cfg(feature = "simd")]
    unsafe fn contiguous(&self, ptrs: [*mut f64; 2], len: usize) {
        simd::map_into(run_ref(ptrs[1], len), run_mut(ptrs[0], len), self.0);
    }
}

struct MapIntoScalar<'a, Op>(&'a Op, f64);

impl<Op: BinaryOp> Pass for MapIntoScalar<'_, Op> {
    const VECTORIZED: bool = Op::VECTORIZED;

    unsafe fn strided(&self, ptrs: [*mut f64; 2], strides: [isize; 2], len: usize) {
        let (op, sc) = (self.0, self.1);
        strided_loop(ptrs, strides, len, |[d, s]| *d = op.call(*s, sc));
    }

    #[cfg(feature = "simd")]
    unsafe fn contiguous(&self, ptrs: [*mut f64; 2], len: usize) {
        simd::map_into_scalar(run_ref(ptrs[1], len), self.1, run_mut(ptrs[0], len), self.0);
    }
}

struct Combine<'a, Op>(&'a Op);

impl<Op: BinaryOp> Pass for Combine<'_, Op> {
    const VECTORIZED: bool = Op::VECTORIZED;

    unsafe fn strided(&self, ptrs: [*mut f64; 2], strides: [isize; 2], len: usize) {
        let op = self.0;
        strided_loop(ptrs, strides, len, |[d, s]| *d = op.call(*s, *d));
    }

    #[cfg(feature = "simd")]
    unsafe fn contiguous(&self, ptrs: [*mut f64; 2], len: usize) {
        simd::combine(run_ref(ptrs[1], len), run_mut(ptrs[0], len), self.0);
    }
}

struct CombineScalar<'a, Op>(&'a Op, f64);

impl<Op: TernaryOp> Pass for CombineScalar<'_, Op> {
    const VECTORIZED: bool = Op::VECTORIZED;

    unsafe fn strided(&self, ptrs: [*mut f64; 2], strides: [isize; 2], len: usize) {
        let (op, sc) = (self.0, self.1);
        strided_loop(ptrs, strides, len, |[d, s]| *d = op.call(*s, sc, *d));
    }

    #[cfg(feature = "simd")]
    unsafe fn contiguous(&self, ptrs: [*mut f64; 2], len: usize) {
        simd::combine_scalar(run_ref(ptrs[1], len), self.1, run_mut(ptrs[0], len), self.0);
    }
}

// ============================================================================
// Executor
// ============================================================================

/// Run one inner run of `pass`.
///
/// # Safety
/// `base` and `offsets` must come from a plan built for the operands.
#[inline(always)]
unsafe fn run_leaf<P: Pass>(
    pass: &P,
    base: [*mut f64; 2],
    vectorized: bool,
    offsets: &[isize],
    len: usize,
    inner: &[isize],
) {
    let ptrs = [
        base[0].offset(offsets[0]),
        base[1].wrapping_offset(offsets.get(1).copied().unwrap_or(0)),
    ];
    let strides = [inner[0], inner.get(1).copied().unwrap_or(0)];
    #[cfg(feature = "simd")]
    if vectorized {
        pass.contiguous(ptrs, len);
        return;
    }
    let _ = vectorized;
    pass.strided(ptrs, strides, len);
}

fn describe(op: &'static str, plan: &LoopPlan, vectorized: bool, threaded: bool) {
    trace!(
        op,
        rank = plan.rank(),
        len = plan.total(),
        path = if vectorized { "simd" } else { "strided" },
        threaded,
        "ufunc dispatch"
    );
}

/// # Safety
/// `dst` must be a valid writable operand for `dims`/`dst_strides`, and `src`
/// (if any) a valid readable operand of the same dims that does not overlap it.
unsafe fn execute<P: Pass>(
    op: &'static str,
    dims: &[usize],
    dst: (*mut f64, &[isize]),
    src: Option<(*const f64, &[isize])>,
    pass: &P,
) {
    if dims.iter().any(|&d| d == 0) {
        return;
    }

    let plan = match src {
        Some((_, ss)) => build_plan(dims, &[dst.1, ss]),
        None => build_plan(dims, &[dst.1]),
    };
    let vectorized = P::VECTORIZED && simd::has_simd() && plan.inner_unit();
    let base = [dst.0, src.map_or(dst.0, |(p, _)| p as *mut f64)];
    let offsets = [0isize; 2];
    let offsets = &offsets[..plan.strides.len()];

    #[cfg(feature = "parallel")]
    {
        let nthreads = threading::available_threads();
        if threading::should_thread(plan.total(), nthreads) {
            describe(op, &plan, vectorized, true);
            let base = [threading::SendPtr(base[0]), threading::SendPtr(base[1])];
            let strides = &plan.strides;
            threading::split_outer(
                &plan.dims,
                strides,
                offsets,
                nthreads,
                &|dims: &[usize], offs: &[isize]| {
                    let base = [base[0].get(), base[1].get()];
                    for_each_inner(dims, strides, offs, |o, len, inner| {
                        run_leaf(pass, base, vectorized, o, len, inner)
                    });
                },
                &|_, _| (),
            );
            return;
        }
    }

    describe(op, &plan, vectorized, false);
    for_each_inner(&plan.dims, &plan.strides, offsets, |o, len, inner| {
        run_leaf(pass, base, vectorized, o, len, inner)
    });
}

// ============================================================================
// Public entry points
// ============================================================================

/// `dst[i] = op(s)` for every element. `op` is evaluated once.
pub fn apply<D, Op>(dst: &mut D, s: f64, op: &Op) -> Result<()>
where
    D: OperandMut + ?Sized,
    Op: UnaryOp,
{
    let value = op.call(s);
    let dims = dst.dims().to_vec();
    let strides = dst.strides().to_vec();
    unsafe { execute("apply", &dims, (dst.as_mut_ptr(), &strides), None, &Fill(value)) };
    Ok(())
}

/// `dst[i] = op(dst[i])`.
pub fn map<D, Op>(dst: &mut D, op: &Op) -> Result<()>
where
    D: OperandMut + ?Sized,
    Op: UnaryOp,
{
    let dims = dst.dims().to_vec();
    let strides = dst.strides().to_vec();
    unsafe { execute("map", &dims, (dst.as_mut_ptr(), &strides), None, &Map(op)) };
    Ok(())
}

/// `dst[i] = op(dst[i], s)`.
pub fn map_scalar<D, Op>(dst: &mut D, s: f64, op: &Op) -> Result<()>
where
    D: OperandMut + ?Sized,
    Op: BinaryOp,
{
    let dims = dst.dims().to_vec();
    let strides = dst.strides().to_vec();
    unsafe {
        execute("map_scalar", &dims, (dst.as_mut_ptr(), &strides), None, &MapScalar(op, s))
    };
    Ok(())
}

/// `dst[i] = op(src[i])`.
pub fn map_into<S, D, Op>(src: &S, dst: &mut D, op: &Op) -> Result<()>
where
    S: Operand + ?Sized,
    D: OperandMut + ?Sized,
    Op: UnaryOp,
{
    check_same_shape("map_into", dst.dims(), src.dims())?;
    let dims = dst.dims().to_vec();
    let strides = dst.strides().to_vec();
    let src_op = Some((src.as_ptr(), src.strides()));
    unsafe { execute("map_into", &dims, (dst.as_mut_ptr(), &strides), src_op, &MapInto(op)) };
    Ok(())
}

/// `dst[i] = op(src[i], s)`.
pub fn map_into_scalar<S, D, Op>(src: &S, s: f64, dst: &mut D, op: &Op) -> Result<()>
where
    S: Operand + ?Sized,
    D: OperandMut + ?Sized,
    Op: BinaryOp,
{
    check_same_shape("map_into_scalar", dst.dims(), src.dims())?;
    let dims = dst.dims().to_vec();
    let strides = dst.strides().to_vec();
    let src_op = Some((src.as_ptr(), src.strides()));
    let pass = MapIntoScalar(op, s);
    unsafe { execute("map_into_scalar", &dims, (dst.as_mut_ptr(), &strides), src_op, &pass) };
    Ok(())
}

/// `dst[i] = op(src[i], dst[i])`.
pub fn combine<S, D, Op>(src: &S, dst: &mut D, op: &Op) -> Result<()>
where
    S: Operand + ?Sized,
    D: OperandMut + ?Sized,
    Op: BinaryOp,
{
    check_same_shape("combine", dst.dims(), src.dims())?;
    let dims = dst.dims().to_vec();
    let strides = dst.strides().to_vec();
    let src_op = Some((src.as_ptr(), src.strides()));
    unsafe { execute("combine", &dims, (dst.as_mut_ptr(), &strides), src_op, &Combine(op)) };
    Ok(())
}

/// `dst[i] = op(src[i], s, dst[i])`.
pub fn combine_scalar<S, D, Op>(src: &S, s: f64, dst: &mut D, op: &Op) -> Result<()>
where
    S: Operand + ?Sized,
    D: OperandMut + ?Sized,
    Op: TernaryOp,
{
    check_same_shape("combine_scalar", dst.dims(), src.dims())?;
    let dims = dst.dims().to_vec();
    let strides = dst.strides().to_vec();
    let src_op = Some((src.as_ptr(), src.strides()));
    let pass = CombineScalar(op, s);
    unsafe { execute("combine_scalar", &dims, (dst.as_mut_ptr(), &strides), src_op, &pass) };
    Ok(())
}

// ============================================================================
// Reduction
// ============================================================================

/// Strided fold that groups elements exactly like [`simd::reduce`] does on
/// a unit-stride run: `lanes`-wide registers in four accumulators, leftover
/// full registers into the first, lanes folded in index order, then the tail.
///
/// # Safety
/// `p + i * stride` must be readable for `i < len`.
unsafe fn reduce_strided<Op: UnaryOp, Agg: Aggregator>(
    p: *const f64,
    stride: isize,
    len: usize,
    f: &Op,
    agg: &Agg,
) -> f64 {
    let lanes = simd::f64_lanes();
    let seed = agg.seed();
    let at = |i: usize| f.call(*p.offset(i as isize * stride));
    let registers = len / lanes;

    let mut acc: SmallVec<[f64; 64]> = smallvec![seed; PREFERRED_UNROLL * lanes];
    let mut r = 0usize;
    while r + PREFERRED_UNROLL <= registers {
        for u in 0..PREFERRED_UNROLL {
            for l in 0..lanes {
                let slot = &mut acc[u * lanes + l];
                *slot = agg.combine(*slot, at((r + u) * lanes + l));
            }
        }
        r += PREFERRED_UNROLL;
    }
    while r < registers {
        for l in 0..lanes {
            acc[l] = agg.combine(acc[l], at(r * lanes + l));
        }
        r += 1;
    }

    let mut out = seed;
    for l in 0..lanes {
        let low = agg.combine(acc[l], acc[lanes + l]);
        let high = agg.combine(acc[2 * lanes + l], acc[3 * lanes + l]);
        out = agg.combine(out, agg.combine(low, high));
    }
    for i in registers * lanes..len {
        out = agg.combine(out, at(i));
    }
    out
}

/// # Safety
/// As for [`reduce_strided`], plus `vectorized` implies unit stride.
unsafe fn reduce_region<Op: UnaryOp, Agg: Aggregator>(
    base: *const f64,
    dims: &[usize],
    plan: &LoopPlan,
    offsets: &[isize],
    vectorized: bool,
    f: &Op,
    agg: &Agg,
) -> f64 {
    let mut acc = agg.seed();
    for_each_inner(dims, &plan.strides, offsets, |o, len, inner| {
        let p = base.offset(o[0]);
        #[cfg(feature = "simd")]
        let part = if vectorized {
            simd::reduce(std::slice::from_raw_parts(p, len), f, agg)
        } else {
            reduce_strided(p, inner[0], len, f, agg)
        };
        #[cfg(not(feature = "simd"))]
        let part = {
            let _ = vectorized;
            reduce_strided(p, inner[0], len, f, agg)
        };
        acc = agg.combine(acc, part);
    });
    acc
}

/// Fold `agg` over `f(src[i])`, starting from `agg.seed()`.
///
/// Each innermost run is folded in a fixed grouping set by the vector width
/// (lanes, four accumulators, then the tail), whether it takes the SIMD or
/// the strided loop, so a run gives the same bits under either stride. Runs
/// and (with `parallel`) thread partials are merged with `agg.combine`. An
/// empty operand yields the seed.
pub fn reduce<S, Op, Agg>(src: &S, f: &Op, agg: &Agg) -> f64
where
    S: Operand + ?Sized,
    Op: UnaryOp,
    Agg: Aggregator,
{
    let dims = src.dims();
    if dims.iter().any(|&d| d == 0) {
        return agg.seed();
    }
    let plan = build_plan(dims, &[src.strides()]);
    let vectorized = Op::VECTORIZED && Agg::VECTORIZED && simd::has_simd() && plan.inner_unit();
    let base = src.as_ptr();

    #[cfg(feature = "parallel")]
    {
        let nthreads = threading::available_threads();
        if threading::should_thread(plan.total(), nthreads) {
            describe("reduce", &plan, vectorized, true);
            let base = threading::SendPtr(base as *mut f64);
            let plan_ref = &plan;
            return threading::split_outer(
                &plan.dims,
                &plan.strides,
                &[0],
                nthreads,
                &|dims: &[usize], offs: &[isize]| unsafe {
                    reduce_region(base.get(), dims, plan_ref, offs, vectorized, f, agg)
                },
                &|a, b| agg.combine(a, b),
            );
        }
    }

    describe("reduce", &plan, vectorized, false);
    unsafe { reduce_region(base, &plan.dims, &plan, &[0], vectorized, f, agg) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::{Abs, Add, Axpy, Identity, MaxNan, Mul, Neg, Scale, Sum};
    use crate::StridedError;

    #[test]
    fn test_apply_fills_strided_vector() {
        let mut data = vec![0.0; 7];
        let mut v = VectorViewMut::new(&mut data, 1, 3, 2).unwrap();
        apply(&mut v, 2.0, &Scale(1.5)).unwrap();
        assert_eq!(data, vec![0.0, 3.0, 0.0, 3.0, 0.0, 3.0, 0.0]);
    }

    #[test]
    fn test_map_in_place_matrix() {
        let mut data: Vec<f64> = (0..6).map(|x| x as f64).collect();
        let mut m = MatrixViewMut::row_major(&mut data, 2, 3).unwrap();
        map(&mut m, &Neg).unwrap();
        assert_eq!(data, vec![-0.0, -1.0, -2.0, -3.0, -4.0, -5.0]);
    }

    #[test]
    fn test_map_into_transposed_source() {
        let src: Vec<f64> = (0..6).map(|x| x as f64).collect();
        let a = MatrixView::row_major(&src, 2, 3).unwrap();
        let mut out = vec![0.0; 6];
        let mut b = MatrixViewMut::row_major(&mut out, 3, 2).unwrap();
        map_into(&a.t(), &mut b, &Identity).unwrap();
        assert_eq!(out, vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    }

    #[test]
    fn test_shape_mismatch_before_write() {
        let src = vec![1.0; 4];
        let mut dst = vec![0.0; 3];
        let err = combine(
            &VectorView::contiguous(&src),
            &mut VectorViewMut::contiguous(&mut dst),
            &Add,
        )
        .unwrap_err();
        assert!(matches!(err, StridedError::ShapeMismatch { op: "combine", .. }));
        assert_eq!(dst, vec![0.0; 3]);
    }

    #[test]
    fn test_zero_length_is_noop() {
        let mut data: Vec<f64> = vec![];
        let mut v = VectorViewMut::contiguous(&mut data);
        apply(&mut v, 1.0, &Identity).unwrap();
        let none: [f64; 0] = [];
        let empty = VectorView::contiguous(&none);
        assert_eq!(reduce(&empty, &Identity, &Sum), 0.0);
        assert_eq!(reduce(&empty, &Abs, &MaxNan), f64::NEG_INFINITY);
    }

    #[test]
    fn test_combine_scalar_and_map_scalar() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let mut y = vec![1.0; 5];
        let xv = VectorView::contiguous(&x);
        let mut yv = VectorViewMut::contiguous(&mut y);
        combine_scalar(&xv, 2.0, &mut yv, &Axpy).unwrap();
        map_scalar(&mut yv, 0.5, &Mul).unwrap();
        assert_eq!(y, vec![1.5, 2.5, 3.5, 4.5, 5.5]);
    }

    #[test]
    fn test_map_into_scalar_reversed() {
        let x = vec![1.0, 2.0, 3.0];
        let mut y = vec![0.0; 3];
        let xv = VectorView::contiguous(&x).rev();
        map_into_scalar(&xv, 10.0, &mut VectorViewMut::contiguous(&mut y), &Add).unwrap();
        assert_eq!(y, vec![13.0, 12.0, 11.0]);
    }

    #[test]
    fn test_reduce_strided_and_nd() {
        let data: Vec<f64> = (1..=24).map(|x| x as f64).collect();
        let nd = StridedView::new(&data, &[2, 3, 4], &[1, 2, 6], 0).unwrap();
        assert_eq!(reduce(&nd, &Identity, &Sum), 300.0);
        let every_other = VectorView::new(&data, 0, 12, 2).unwrap();
        assert_eq!(reduce(&every_other, &Identity, &Sum), 144.0);
        let neg = vec![-3.0, 1.0, 2.0];
        assert_eq!(reduce(&VectorView::contiguous(&neg), &Abs, &MaxNan), 3.0);
    }

    #[test]
    fn test_reduce_grouping_is_stride_independent() {
        for len in 0..70 {
            let data: Vec<f64> = (0..len)
                .map(|i| (i as f64 * 0.731).sin() * 1e3 / (i + 1) as f64)
                .collect();
            let mut padded = vec![f64::NAN; 2 * len];
            for (i, &v) in data.iter().enumerate() {
                padded[2 * i] = v;
            }
            let fast = reduce(&VectorView::contiguous(&data), &Identity, &Sum);
            let slow = reduce(&VectorView::new(&padded, 0, len, 2).unwrap(), &Identity, &Sum);
            assert_eq!(fast.to_bits(), slow.to_bits(), "len {len}");
        }
    }

    #[test]
    fn test_broadcast_source() {
        let row = vec![1.0, 2.0, 3.0];
        let src = StridedView::new(&row, &[1, 3], &[3, 1], 0)
            .unwrap()
            .broadcast(&[2, 3])
            .unwrap();
        let mut out = vec![0.0; 6];
        let mut dst = StridedViewMut::new(&mut out, &[2, 3], &[3, 1], 0).unwrap();
        combine(&src, &mut dst, &Add).unwrap();
        assert_eq!(out, vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
    }
}
