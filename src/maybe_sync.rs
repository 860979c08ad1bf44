//! Feature-gated `Send`/`Sync` marker traits for operators.
//!
//! With the `parallel` feature, [`MaybeSync`] is [`Sync`] and operators are
//! shared across rayon workers by reference. Without it the bound is
//! blanket-implemented, so closures capturing `Rc` or `Cell` state still work.

#[cfg(feature = "parallel")]
pub trait MaybeSync: Sync {}
#[cfg(feature = "parallel")]
impl<T: Sync + ?Sized> MaybeSync for T {}

#[cfg(not(feature = "parallel"))]
pub trait MaybeSync {}
#[cfg(not(feature = "parallel"))]
impl<T: ?Sized> MaybeSync for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_types_satisfy_maybe_sync() {
        fn check<T: MaybeSync>(_: &T) {}
        check(&crate::operator::Scale(2.0));
        check(&|x: f64| x + 1.0);
    }

    #[cfg(not(feature = "parallel"))]
    #[test]
    fn test_rc_satisfies_maybe_sync_without_parallel() {
        use std::rc::Rc;
        fn check<T: MaybeSync>() {}
        check::<Rc<f64>>();
    }
}
