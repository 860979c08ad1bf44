//! Hardware capability query and the contiguous SIMD loops of the dispatcher.
//!
//! Every loop here runs on unit-stride slices, keeps four vector registers in
//! flight, drains the remaining full registers one at a time and finishes with
//! a scalar tail. With the `simd` feature disabled only the capability query
//! and `dispatch` remain; they report a one-lane machine.

use std::sync::OnceLock;

use crate::PREFERRED_PANEL_WIDTH;

/// Run `f` with the best instruction set the CPU supports enabled, so that
/// plain loops inside it can be auto-vectorised.
#[inline(always)]
pub(crate) fn dispatch<R>(f: impl FnOnce() -> R) -> R {
    #[cfg(feature = "simd")]
    {
        pulp::Arch::new().dispatch(f)
    }
    #[cfg(not(feature = "simd"))]
    {
        f()
    }
}

static F64_LANES: OnceLock<usize> = OnceLock::new();

/// Number of `f64` lanes in the widest vector register available at run time.
///
/// Detected once and cached. Reports 1 without the `simd` feature.
pub fn f64_lanes() -> usize {
    *F64_LANES.get_or_init(|| {
        let lanes = detect_lanes();
        tracing::debug!(lanes, "detected f64 vector width");
        lanes
    })
}

/// Whether the platform offers hardware vector support the dispatcher can use.
#[inline]
pub fn has_simd() -> bool {
    f64_lanes() > 1
}

/// Panel width for the fused row/column kernels (`axpyf`, `dotxf`).
pub fn preferred_panel_width() -> usize {
    if f64_lanes() >= 8 {
        8
    } else {
        PREFERRED_PANEL_WIDTH
    }
}

#[cfg(feature = "simd")]
fn detect_lanes() -> usize {
    struct Lanes;
    impl pulp::WithSimd for Lanes {
        type Output = usize;

        #[inline(always)]
        fn with_simd<S: pulp::Simd>(self, _simd: S) -> usize {
            std::mem::size_of::<S::f64s>() / std::mem::size_of::<f64>()
        }
    }
    pulp::Arch::new().dispatch(Lanes)
}

#[cfg(not(feature = "simd"))]
fn detect_lanes() -> usize {
    1
}

#[cfg(feature = "simd")]
pub(crate) use imp::*;

#[cfg(feature = "simd")]
mod imp {
    use pulp::{Simd, WithSimd};
    use smallvec::SmallVec;

    use crate::operator::{Aggregator, BinaryOp, TernaryOp, UnaryOp};
    use crate::PREFERRED_UNROLL;

    const MAX_LANES: usize = 16;

    /// Spill a register to its lanes.
    #[inline(always)]
    pub(crate) fn lanes<S: Simd>(x: S::f64s) -> SmallVec<[f64; MAX_LANES]> {
        let n = std::mem::size_of::<S::f64s>() / std::mem::size_of::<f64>();
        let mut buf = [0.0f64; MAX_LANES];
        {
            let (head, _) = S::as_mut_simd_f64s(&mut buf);
            head[0] = x;
        }
        SmallVec::from_slice(&buf[..n])
    }

    #[inline(always)]
    fn gather<S: Simd>(values: &[f64]) -> S::f64s {
        let mut buf = [0.0f64; MAX_LANES];
        buf[..values.len()].copy_from_slice(values);
        let (head, _) = S::as_simd_f64s(&buf);
        head[0]
    }

    /// Scalar fallback for operators without a vector form.
    #[inline(always)]
    pub(crate) fn lanewise<S: Simd>(x: S::f64s, f: impl Fn(f64) -> f64) -> S::f64s {
        let mut v = lanes::<S>(x);
        v.iter_mut().for_each(|a| *a = f(*a));
        gather::<S>(&v)
    }

    #[inline(always)]
    pub(crate) fn lanewise2<S: Simd>(
        x: S::f64s,
        y: S::f64s,
        f: impl Fn(f64, f64) -> f64,
    ) -> S::f64s {
        let mut v = lanes::<S>(x);
        let w = lanes::<S>(y);
        v.iter_mut().zip(w.iter()).for_each(|(a, &b)| *a = f(*a, b));
        gather::<S>(&v)
    }

    #[inline(always)]
    pub(crate) fn lanewise3<S: Simd>(
        x: S::f64s,
        s: S::f64s,
        y: S::f64s,
        f: impl Fn(f64, f64, f64) -> f64,
    ) -> S::f64s {
        let mut v = lanes::<S>(x);
        let w = lanes::<S>(s);
        let u = lanes::<S>(y);
        for ((a, &b), &c) in v.iter_mut().zip(w.iter()).zip(u.iter()) {
            *a = f(*a, b, c);
        }
        gather::<S>(&v)
    }

    /// Calls `f(i)` for `i in 0..len`, four at a time.
    #[inline(always)]
    fn unrolled(len: usize, mut f: impl FnMut(usize)) {
        let mut i = 0usize;
        while i + PREFERRED_UNROLL <= len {
            f(i);
            f(i + 1);
            f(i + 2);
            f(i + 3);
            i += PREFERRED_UNROLL;
        }
        while i < len {
            f(i);
            i += 1;
        }
    }

    /// `dst[i] = value`.
    pub(crate) fn fill(dst: &mut [f64], value: f64) {
        struct Fill<'a>(&'a mut [f64], f64);
        impl WithSimd for Fill<'_> {
            type Output = ();

            #[inline(always)]
            fn with_simd<S: Simd>(self, simd: S) {
                let (head, tail) = S::as_mut_simd_f64s(self.0);
                let v = simd.splat_f64s(self.1);
                unrolled(head.len(), |i| head[i] = v);
                tail.iter_mut().for_each(|x| *x = self.1);
            }
        }
        pulp::Arch::new().dispatch(Fill(dst, value))
    }

    /// `dst[i] = op(dst[i])`.
    pub(crate) fn map<Op: UnaryOp>(dst: &mut [f64], op: &Op) {
        struct Map<'a, Op>(&'a mut [f64], &'a Op);
        impl<Op: UnaryOp> WithSimd for Map<'_, Op> {
            type Output = ();

            #[inline(always)]
            fn with_simd<S: Simd>(self, simd: S) {
                let Map(dst, op) = self;
                let (head, tail) = S::as_mut_simd_f64s(dst);
                unrolled(head.len(), |i| head[i] = op.call_simd(simd, head[i]));
                tail.iter_mut().for_each(|x| *x = op.call(*x));
            }
        }
        pulp::Arch::new().dispatch(Map(dst, op))
    }

    /// `dst[i] = op(dst[i], s)`.
    pub(crate) fn map_scalar<Op: BinaryOp>(dst: &mut [f64], s: f64, op: &Op) {
        struct MapScalar<'a, Op>(&'a mut [f64], f64, &'a Op);
        impl<Op: BinaryOp> WithSimd for MapScalar<'_, Op> {
            type Output = ();

            #[inline(always)]
            fn with_simd<S: Simd>(self, simd: S) {
                let MapScalar(dst, s, op) = self;
                let sv = simd.splat_f64s(s);
                let (head, tail) = S::as_mut_simd_f64s(dst);
                unrolled(head.len(), |i| head[i] = op.call_simd(simd, head[i], sv));
                tail.iter_mut().for_each(|x| *x = op.call(*x, s));
            }
        }
        pulp::Arch::new().dispatch(MapScalar(dst, s, op))
    }

    /// `dst[i] = op(src[i])`.
    pub(crate) fn map_into<Op: UnaryOp>(src: &[f64], dst: &mut [f64], op: &Op) {
        struct MapInto<'a, Op>(&'a [f64], &'a mut [f64], &'a Op);
        impl<Op: UnaryOp> WithSimd for MapInto<'_, Op> {
            type Output = ();

            #[inline(always)]
            fn with_simd<S: Simd>(self, simd: S) {
                let MapInto(src, dst, op) = self;
                debug_assert_eq!(src.len(), dst.len());
                let (sh, st) = S::as_simd_f64s(src);
                let (dh, dt) = S::as_mut_simd_f64s(dst);
                unrolled(dh.len(), |i| dh[i] = op.call_simd(simd, sh[i]));
                for (d, &x) in dt.iter_mut().zip(st) {
                    *d = op.call(x);
                }
            }
        }
        pulp::Arch::new().dispatch(MapInto(src, dst, op))
    }

    /// `dst[i] = op(src[i], s)`.
    pub(crate) fn map_into_scalar<Op: BinaryOp>(src: &[f64], s: f64, dst: &mut [f64], op: &Op) {
        struct MapIntoScalar<'a, Op>(&'a [f64], f64, &'a mut [f64], &'a Op);
        impl<Op: BinaryOp> WithSimd for MapIntoScalar<'_, Op> {
            type Output = ();

            #[inline(always)]
            fn with_simd<S: Simd>(self, simd: S) {
                let MapIntoScalar(src, s, dst, op) = self;
                debug_assert_eq!(src.len(), dst.len());
                let sv = simd.splat_f64s(s);
                let (sh, st) = S::as_simd_f64s(src);
                let (dh, dt) = S::as_mut_simd_f64s(dst);
                unrolled(dh.len(), |i| dh[i] = op.call_simd(simd, sh[i], sv));
                for (d, &x) in dt.iter_mut().zip(st) {
                    *d = op.call(x, s);
                }
            }
        }
        pulp::Arch::new().dispatch(MapIntoScalar(src, s, dst, op))
    }

    /// `dst[i] = op(src[i], dst[i])`.
    pub(crate) fn combine<Op: BinaryOp>(src: &[f64], dst: &mut [f64], op: &Op) {
        struct Combine<'a, Op>(&'a [f64], &'a mut [f64], &'a Op);
        impl<Op: BinaryOp> WithSimd for Combine<'_, Op> {
            type Output = ();

            #[inline(always)]
            fn with_simd<S: Simd>(self, simd: S) {
                let Combine(src, dst, op) = self;
                debug_assert_eq!(src.len(), dst.len());
                let (sh, st) = S::as_simd_f64s(src);
                let (dh, dt) = S::as_mut_simd_f64s(dst);
                unrolled(dh.len(), |i| dh[i] = op.call_simd(simd, sh[i], dh[i]));
                for (d, &x) in dt.iter_mut().zip(st) {
                    *d = op.call(x, *d);
                }
            }
        }
        pulp::Arch::new().dispatch(Combine(src, dst, op))
    }

    /// `dst[i] = op(src[i], s, dst[i])`.
    pub(crate) fn combine_scalar<Op: TernaryOp>(src: &[f64], s: f64, dst: &mut [f64], op: &Op) {
        struct CombineScalar<'a, Op>(&'a [f64], f64, &'a mut [f64], &'a Op);
        impl<Op: TernaryOp> WithSimd for CombineScalar<'_, Op> {
            type Output = ();

            #[inline(always)]
            fn with_simd<S: Simd>(self, simd: S) {
                let CombineScalar(src, s, dst, op) = self;
                debug_assert_eq!(src.len(), dst.len());
                let sv = simd.splat_f64s(s);
                let (sh, st) = S::as_simd_f64s(src);
                let (dh, dt) = S::as_mut_simd_f64s(dst);
                unrolled(dh.len(), |i| dh[i] = op.call_simd(simd, sh[i], sv, dh[i]));
                for (d, &x) in dt.iter_mut().zip(st) {
                    *d = op.call(x, s, *d);
                }
            }
        }
        pulp::Arch::new().dispatch(CombineScalar(src, s, dst, op))
    }

    /// Fold `agg` over `top(src[i])`, starting from `agg.seed()`.
    pub(crate) fn reduce<Op: UnaryOp, Agg: Aggregator>(src: &[f64], top: &Op, agg: &Agg) -> f64 {
        struct Reduce<'a, Op, Agg>(&'a [f64], &'a Op, &'a Agg);
        impl<Op: UnaryOp, Agg: Aggregator> WithSimd for Reduce<'_, Op, Agg> {
            type Output = f64;

            #[inline(always)]
            fn with_simd<S: Simd>(self, simd: S) -> f64 {
                let Reduce(src, top, agg) = self;
                let (head, tail) = S::as_simd_f64s(src);

                let seed = simd.splat_f64s(agg.seed());
                let mut acc0 = seed;
                let mut acc1 = seed;
                let mut acc2 = seed;
                let mut acc3 = seed;

                let mut i = 0usize;
                while i + PREFERRED_UNROLL <= head.len() {
                    acc0 = agg.combine_simd(simd, acc0, top.call_simd(simd, head[i]));
                    acc1 = agg.combine_simd(simd, acc1, top.call_simd(simd, head[i + 1]));
                    acc2 = agg.combine_simd(simd, acc2, top.call_simd(simd, head[i + 2]));
                    acc3 = agg.combine_simd(simd, acc3, top.call_simd(simd, head[i + 3]));
                    i += PREFERRED_UNROLL;
                }
                for &v in &head[i..] {
                    acc0 = agg.combine_simd(simd, acc0, top.call_simd(simd, v));
                }

                let acc = agg.combine_simd(
                    simd,
                    agg.combine_simd(simd, acc0, acc1),
                    agg.combine_simd(simd, acc2, acc3),
                );
                // Lanes fold in index order so the strided loop can follow.
                let mut out = lanes::<S>(acc)
                    .iter()
                    .fold(agg.seed(), |a, &b| agg.combine(a, b));
                for &x in tail {
                    out = agg.combine(out, top.call(x));
                }
                out
            }
        }
        pulp::Arch::new().dispatch(Reduce(src, top, agg))
    }
}
