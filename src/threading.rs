//! Rayon fan-out over the outermost loop axis.
//!
//! The region is halved along its outermost axis with `rayon::join` until it
//! is below [`MIN_THREAD_LENGTH`] elements or the thread budget is spent.
//! Each half owns a disjoint slab of the destination, so no synchronisation
//! is needed beyond the join.

#[cfg(feature = "parallel")]
use smallvec::SmallVec;

#[cfg(feature = "parallel")]
use crate::fuse::SVec;
use crate::MIN_THREAD_LENGTH;

/// A raw pointer wrapper that is `Send` + `Sync`.
///
/// # Safety
/// The caller must guarantee that the pointed-to data outlives the parallel
/// operation and that different workers write to disjoint elements.
#[cfg(feature = "parallel")]
pub(crate) struct SendPtr<T>(pub(crate) *mut T);

#[cfg(feature = "parallel")]
impl<T> Clone for SendPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

#[cfg(feature = "parallel")]
impl<T> Copy for SendPtr<T> {}

#[cfg(feature = "parallel")]
unsafe impl<T> Send for SendPtr<T> {}
#[cfg(feature = "parallel")]
unsafe impl<T> Sync for SendPtr<T> {}

#[cfg(feature = "parallel")]
impl<T> SendPtr<T> {
    #[inline(always)]
    pub(crate) fn get(self) -> *mut T {
        self.0
    }
}

/// Number of workers available to the fan-out.
#[cfg(feature = "parallel")]
pub(crate) fn available_threads() -> usize {
    rayon::current_num_threads()
}

/// Whether a region of `total` elements is worth splitting.
#[inline]
pub(crate) fn should_thread(total: usize, nthreads: usize) -> bool {
    cfg!(feature = "parallel") && nthreads > 1 && total > MIN_THREAD_LENGTH
}

/// Recursively split the outermost axis and run `leaf` on each piece.
///
/// `leaf` receives the sub-region's dims and starting offsets; partial results
/// are folded with `merge`, left before right.
#[cfg(feature = "parallel")]
pub(crate) fn split_outer<R, L, M>(
    dims: &[usize],
    strides: &[SVec<isize>],
    offsets: &[isize],
    nthreads: usize,
    leaf: &L,
    merge: &M,
) -> R
where
    R: Send,
    L: Fn(&[usize], &[isize]) -> R + Sync,
    M: Fn(R, R) -> R + Sync,
{
    let total: usize = dims.iter().product();
    if !should_thread(total, nthreads) || dims[0] < 2 {
        return leaf(dims, offsets);
    }

    let d0 = dims[0];
    let half = d0 / 2;
    let nt_left = nthreads / 2;
    let nt_right = nthreads - nt_left;

    let mut left_dims: SVec<usize> = SmallVec::from_slice(dims);
    left_dims[0] = half;
    let mut right_dims: SVec<usize> = SmallVec::from_slice(dims);
    right_dims[0] = d0 - half;

    let left_offsets: SmallVec<[isize; 3]> = SmallVec::from_slice(offsets);
    let mut right_offsets: SmallVec<[isize; 3]> = SmallVec::from_slice(offsets);
    for (o, s) in right_offsets.iter_mut().zip(strides.iter()) {
        *o += half as isize * s[0];
    }

    let (r1, r2) = rayon::join(
        || split_outer(&left_dims, strides, &left_offsets, nt_left, leaf, merge),
        || split_outer(&right_dims, strides, &right_offsets, nt_right, leaf, merge),
    );
    merge(r1, r2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_thread_threshold() {
        assert!(!should_thread(MIN_THREAD_LENGTH, 8));
        assert!(!should_thread(MIN_THREAD_LENGTH * 2, 1));
        assert_eq!(should_thread(MIN_THREAD_LENGTH + 1, 8), cfg!(feature = "parallel"));
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_small_region_runs_as_one_leaf() {
        use smallvec::smallvec;
        use std::sync::Mutex;

        let strides: [SVec<isize>; 1] = [smallvec![4, 1]];
        let calls = Mutex::new(Vec::new());
        split_outer(
            &[3, 4],
            &strides,
            &[0],
            8,
            &|dims: &[usize], offs: &[isize]| calls.lock().unwrap().push((dims.to_vec(), offs.to_vec())),
            &|_, _| (),
        );
        assert_eq!(calls.into_inner().unwrap(), vec![(vec![3, 4], vec![0])]);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_large_region_is_split_into_disjoint_slabs() {
        use smallvec::smallvec;

        let rows = 2 * MIN_THREAD_LENGTH / 64 + 1;
        let strides: [SVec<isize>; 1] = [smallvec![64, 1]];
        let total = split_outer(
            &[rows, 64],
            &strides,
            &[0],
            4,
            &|dims: &[usize], offs: &[isize]| {
                assert_eq!(offs[0] % 64, 0);
                dims[0]
            },
            &|a, b| a + b,
        );
        assert_eq!(total, rows);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_single_thread_never_splits() {
        use smallvec::smallvec;

        let strides: [SVec<isize>; 1] = [smallvec![1]];
        let leaves = split_outer(
            &[MIN_THREAD_LENGTH * 4],
            &strides,
            &[0],
            1,
            &|_: &[usize], _: &[isize]| 1usize,
            &|a, b| a + b,
        );
        assert_eq!(leaves, 1);
    }
}
