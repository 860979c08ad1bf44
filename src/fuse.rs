//! Dimension fusion.
//!
//! After ordering, two neighbouring axes can be walked as one whenever every
//! operand steps from the last element of the inner axis straight onto the
//! first element of the next outer index. Fusing them shortens the loop nest
//! and lengthens the innermost run, which is what the contiguous SIMD path
//! needs.

use smallvec::SmallVec;

pub(crate) type SVec<T> = SmallVec<[T; 8]>;

/// Fuse adjacent axes of an ordered (outermost first) loop nest.
///
/// Axis `i` merges into axis `i + 1` when, for every operand,
/// `strides[i] == dims[i + 1] * strides[i + 1]`. The merged axis keeps the
/// inner stride.
pub(crate) fn fuse_dims(dims: &[usize], strides: &[SVec<isize>]) -> (SVec<usize>, SmallVec<[SVec<isize>; 3]>) {
    let mut out_dims: SVec<usize> = SmallVec::new();
    let mut out_strides: SmallVec<[SVec<isize>; 3]> = strides.iter().map(|_| SmallVec::new()).collect();

    // Walk inner to outer so that each outer axis compares against the
    // already-fused run below it.
    for i in (0..dims.len()).rev() {
        let can_merge = !out_dims.is_empty()
            && strides.iter().zip(out_strides.iter()).all(|(s, fused)| {
                let inner_len = out_dims[out_dims.len() - 1] as isize;
                let inner_stride = fused[fused.len() - 1];
                s[i] == inner_len * inner_stride
            });
        if can_merge {
            let last = out_dims.len() - 1;
            out_dims[last] *= dims[i];
        } else {
            out_dims.push(dims[i]);
            for (fused, s) in out_strides.iter_mut().zip(strides.iter()) {
                fused.push(s[i]);
            }
        }
    }

    out_dims.reverse();
    for fused in &mut out_strides {
        fused.reverse();
    }
    (out_dims, out_strides)
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn test_fuse_dims_contiguous() {
        let strides: [SVec<isize>; 2] = [smallvec![4, 1], smallvec![4, 1]];
        let (dims, fused) = fuse_dims(&[3, 4], &strides);
        assert_eq!(dims.as_slice(), &[12]);
        assert_eq!(fused[0].as_slice(), &[1]);
        assert_eq!(fused[1].as_slice(), &[1]);
    }

    #[test]
    fn test_fuse_dims_non_contiguous() {
        let strides: [SVec<isize>; 1] = [smallvec![10, 1]];
        let (dims, fused) = fuse_dims(&[3, 4], &strides);
        assert_eq!(dims.as_slice(), &[3, 4]);
        assert_eq!(fused[0].as_slice(), &[10, 1]);
    }

    #[test]
    fn test_fuse_dims_partial() {
        let strides: [SVec<isize>; 1] = [smallvec![100, 3, 1]];
        let (dims, fused) = fuse_dims(&[4, 2, 3], &strides);
        assert_eq!(dims.as_slice(), &[4, 6]);
        assert_eq!(fused[0].as_slice(), &[100, 1]);
    }

    #[test]
    fn test_fuse_dims_requires_all_operands() {
        let strides: [SVec<isize>; 2] = [smallvec![4, 1], smallvec![10, 1]];
        let (dims, _) = fuse_dims(&[3, 4], &strides);
        assert_eq!(dims.as_slice(), &[3, 4]);
    }

    #[test]
    fn test_fuse_negative_strides() {
        // A fully reversed dense block is still one run.
        let strides: [SVec<isize>; 1] = [smallvec![-4, -1]];
        let (dims, fused) = fuse_dims(&[3, 4], &strides);
        assert_eq!(dims.as_slice(), &[12]);
        assert_eq!(fused[0].as_slice(), &[-1]);
    }
}
