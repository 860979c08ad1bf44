//! Capability-tagged element operators.
//!
//! Every operator has a scalar form (`call`). Operators that set `VECTORIZED`
//! also provide a SIMD form (`call_simd`) that must agree with the scalar form
//! lane for lane; the dispatcher only takes the vector path when the flag is
//! set and every operand is unit-stride. Operators are pure: the dispatcher is
//! free to reorder, split and parallelise calls.
//!
//! Plain closures implement the unary, binary and ternary traits with
//! `VECTORIZED = false`.

#[cfg(feature = "simd")]
use pulp::Simd;

use crate::maybe_sync::MaybeSync;
#[cfg(feature = "simd")]
use crate::simd::{lanewise, lanewise2, lanewise3};

/// `x -> f(x)`.
pub trait UnaryOp: MaybeSync {
    const VECTORIZED: bool = false;

    fn call(&self, x: f64) -> f64;

    #[cfg(feature = "simd")]
    #[inline(always)]
    fn call_simd<S: Simd>(&self, simd: S, x: S::f64s) -> S::f64s {
        let _ = simd;
        lanewise::<S>(x, |v| self.call(v))
    }
}

/// `(x, y) -> f(x, y)`.
///
/// In `combine` the first argument is the source element and the second the
/// destination element; in `map_scalar` / `map_into_scalar` the second
/// argument is the scalar.
pub trait BinaryOp: MaybeSync {
    const VECTORIZED: bool = false;

    fn call(&self, x: f64, y: f64) -> f64;

    #[cfg(feature = "simd")]
    #[inline(always)]
    fn call_simd<S: Simd>(&self, simd: S, x: S::f64s, y: S::f64s) -> S::f64s {
        let _ = simd;
        lanewise2::<S>(x, y, |a, b| self.call(a, b))
    }
}

/// `(x, s, y) -> f(x, s, y)`: source element, scalar, destination element.
pub trait TernaryOp: MaybeSync {
    const VECTORIZED: bool = false;

    fn call(&self, x: f64, s: f64, y: f64) -> f64;

    #[cfg(feature = "simd")]
    #[inline(always)]
    fn call_simd<S: Simd>(&self, simd: S, x: S::f64s, s: S::f64s, y: S::f64s) -> S::f64s {
        let _ = simd;
        lanewise3::<S>(x, s, y, |a, b, c| self.call(a, b, c))
    }
}

/// Fold rule for `reduce`.
///
/// `combine` must be associative with `seed` as its identity: partial results
/// from different lanes, accumulators and threads are merged with it.
pub trait Aggregator: MaybeSync {
    const VECTORIZED: bool = false;

    fn seed(&self) -> f64;

    fn combine(&self, acc: f64, x: f64) -> f64;

    #[cfg(feature = "simd")]
    #[inline(always)]
    fn combine_simd<S: Simd>(&self, simd: S, acc: S::f64s, x: S::f64s) -> S::f64s {
        let _ = simd;
        lanewise2::<S>(acc, x, |a, b| self.combine(a, b))
    }
}

impl<F: Fn(f64) -> f64 + MaybeSync> UnaryOp for F {
    #[inline(always)]
    fn call(&self, x: f64) -> f64 {
        self(x)
    }
}

impl<F: Fn(f64, f64) -> f64 + MaybeSync> BinaryOp for F {
    #[inline(always)]
    fn call(&self, x: f64, y: f64) -> f64 {
        self(x, y)
    }
}

impl<F: Fn(f64, f64, f64) -> f64 + MaybeSync> TernaryOp for F {
    #[inline(always)]
    fn call(&self, x: f64, s: f64, y: f64) -> f64 {
        self(x, s, y)
    }
}

// ============================================================================
// Unary
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl UnaryOp for Identity {
    const VECTORIZED: bool = true;

    #[inline(always)]
    fn call(&self, x: f64) -> f64 {
        x
    }

    #[cfg(feature = "simd")]
    #[inline(always)]
    fn call_simd<S: Simd>(&self, _simd: S, x: S::f64s) -> S::f64s {
        x
    }
}

/// `-x`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Neg;

impl UnaryOp for Neg {
    const VECTORIZED: bool = true;

    #[inline(always)]
    fn call(&self, x: f64) -> f64 {
        -x
    }

    #[cfg(feature = "simd")]
    #[inline(always)]
    fn call_simd<S: Simd>(&self, simd: S, x: S::f64s) -> S::f64s {
        simd.mul_f64s(x, simd.splat_f64s(-1.0))
    }
}

/// `|x|`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Abs;

impl UnaryOp for Abs {
    #[inline(always)]
    fn call(&self, x: f64) -> f64 {
        x.abs()
    }
}

/// `x * alpha`.
#[derive(Debug, Clone, Copy)]
pub struct Scale(pub f64);

impl UnaryOp for Scale {
    const VECTORIZED: bool = true;

    #[inline(always)]
    fn call(&self, x: f64) -> f64 {
        x * self.0
    }

    #[cfg(feature = "simd")]
    #[inline(always)]
    fn call_simd<S: Simd>(&self, simd: S, x: S::f64s) -> S::f64s {
        simd.mul_f64s(x, simd.splat_f64s(self.0))
    }
}

/// `(x * s)^2`, the summand of a scaled sum of squares.
#[derive(Debug, Clone, Copy)]
pub struct ScaledSquare(pub f64);

impl UnaryOp for ScaledSquare {
    const VECTORIZED: bool = true;

    #[inline(always)]
    fn call(&self, x: f64) -> f64 {
        let v = x * self.0;
        v * v
    }

    #[cfg(feature = "simd")]
    #[inline(always)]
    fn call_simd<S: Simd>(&self, simd: S, x: S::f64s) -> S::f64s {
        let v = simd.mul_f64s(x, simd.splat_f64s(self.0));
        simd.mul_f64s(v, v)
    }
}

// ============================================================================
// Binary
// ============================================================================

macro_rules! binary_arith {
    ($(#[$meta:meta])* $name:ident, $op:tt, $simd:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl BinaryOp for $name {
            const VECTORIZED: bool = true;

            #[inline(always)]
            fn call(&self, x: f64, y: f64) -> f64 {
                x $op y
            }

            #[cfg(feature = "simd")]
            #[inline(always)]
            fn call_simd<S: Simd>(&self, simd: S, x: S::f64s, y: S::f64s) -> S::f64s {
                simd.$simd(x, y)
            }
        }
    };
}

binary_arith!(
    /// `x + y`.
    Add, +, add_f64s
);
binary_arith!(
    /// `x - y`.
    Sub, -, sub_f64s
);
binary_arith!(
    /// `x * y`.
    Mul, *, mul_f64s
);
binary_arith!(
    /// `x / y`.
    Div, /, div_f64s
);

/// `y - x`: subtract the source from the destination.
#[derive(Debug, Clone, Copy, Default)]
pub struct RevSub;

impl BinaryOp for RevSub {
    const VECTORIZED: bool = true;

    #[inline(always)]
    fn call(&self, x: f64, y: f64) -> f64 {
        y - x
    }

    #[cfg(feature = "simd")]
    #[inline(always)]
    fn call_simd<S: Simd>(&self, simd: S, x: S::f64s, y: S::f64s) -> S::f64s {
        simd.sub_f64s(y, x)
    }
}

// ============================================================================
// Ternary
// ============================================================================

/// `s * x + y`, evaluated as a separate multiply and add (no fused rounding).
#[derive(Debug, Clone, Copy, Default)]
pub struct Axpy;

impl TernaryOp for Axpy {
    const VECTORIZED: bool = true;

    #[inline(always)]
    fn call(&self, x: f64, s: f64, y: f64) -> f64 {
        s * x + y
    }

    #[cfg(feature = "simd")]
    #[inline(always)]
    fn call_simd<S: Simd>(&self, simd: S, x: S::f64s, s: S::f64s, y: S::f64s) -> S::f64s {
        simd.add_f64s(simd.mul_f64s(s, x), y)
    }
}

// ============================================================================
// Aggregators
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl Aggregator for Sum {
    const VECTORIZED: bool = true;

    #[inline(always)]
    fn seed(&self) -> f64 {
        0.0
    }

    #[inline(always)]
    fn combine(&self, acc: f64, x: f64) -> f64 {
        acc + x
    }

    #[cfg(feature = "simd")]
    #[inline(always)]
    fn combine_simd<S: Simd>(&self, simd: S, acc: S::f64s, x: S::f64s) -> S::f64s {
        simd.add_f64s(acc, x)
    }
}

/// Maximum that propagates NaN: any NaN input makes the result NaN.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxNan;

impl Aggregator for MaxNan {
    #[inline(always)]
    fn seed(&self) -> f64 {
        f64::NEG_INFINITY
    }

    #[inline(always)]
    fn combine(&self, acc: f64, x: f64) -> f64 {
        if acc.is_nan() || x.is_nan() {
            f64::NAN
        } else if x > acc {
            x
        } else {
            acc
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_forms() {
        assert_eq!(Identity.call(3.0), 3.0);
        assert_eq!(Neg.call(0.0).to_bits(), (-0.0f64).to_bits());
        assert_eq!(Abs.call(-2.5), 2.5);
        assert_eq!(Scale(2.0).call(-1.5), -3.0);
        assert_eq!(ScaledSquare(0.5).call(4.0), 4.0);
        assert_eq!(Sub.call(1.0, 3.0), -2.0);
        assert_eq!(RevSub.call(1.0, 3.0), 2.0);
        assert_eq!(Axpy.call(2.0, 3.0, 1.0), 7.0);
    }

    #[test]
    fn test_aggregators() {
        let xs = [1.0, -4.0, 2.5];
        assert_eq!(xs.iter().fold(Sum.seed(), |a, &x| Sum.combine(a, x)), -0.5);
        assert_eq!(xs.iter().fold(MaxNan.seed(), |a, &x| MaxNan.combine(a, x)), 2.5);
        assert!(MaxNan.combine(1.0, f64::NAN).is_nan());
        assert!(MaxNan.combine(f64::NAN, 1.0).is_nan());
    }

    #[test]
    fn test_closures_are_operators() {
        fn unary<F: UnaryOp>(f: F) -> bool {
            F::VECTORIZED || f.call(1.0) == 2.0
        }
        fn ternary<F: TernaryOp>(f: F) -> f64 {
            f.call(1.0, 2.0, 3.0)
        }
        assert!(unary(|x: f64| x * 2.0));
        assert_eq!(ternary(|x: f64, s: f64, y: f64| x * s - y), -1.0);
    }

    #[test]
    fn test_capability_flags() {
        assert!(<Identity as UnaryOp>::VECTORIZED);
        assert!(!<Abs as UnaryOp>::VECTORIZED);
        assert!(<Add as BinaryOp>::VECTORIZED);
        assert!(<Sum as Aggregator>::VECTORIZED);
        assert!(!<MaxNan as Aggregator>::VECTORIZED);
    }
}
