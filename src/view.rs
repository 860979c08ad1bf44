//! Dynamic-rank strided views and the owned [`StridedArray`].
//!
//! All three types share one `Layout` record (`dims`, `strides`, `offset`);
//! they differ only in how they hold the buffer. [`VectorView`] and
//! [`MatrixView`] are the fixed-rank forms of the same idea, and the
//! dispatcher treats every one of them alike.

use std::fmt;
use std::sync::Arc;

use num_traits::Zero;
use smallvec::SmallVec;

use crate::matrix::{MatrixView, MatrixViewMut};
use crate::vector::{VectorView, VectorViewMut};
use crate::{Result, StridedError};

// ============================================================================
// Validation helpers
// ============================================================================

/// Lowest and highest buffer offsets a layout reaches.
pub(crate) fn extent(dims: &[usize], strides: &[isize], offset: isize) -> Result<(isize, isize)> {
    dims.iter()
        .zip(strides)
        .filter(|(&d, _)| d > 1)
        .try_fold((offset, offset), |(lo, hi), (&d, &s)| {
            let span = s.checked_mul(d as isize - 1).ok_or(StridedError::OffsetOverflow)?;
            let moved = |x: isize| x.checked_add(span).ok_or(StridedError::OffsetOverflow);
            Ok(if span < 0 { (moved(lo)?, hi) } else { (lo, moved(hi)?) })
        })
}

/// Every reachable offset must lie in `[0, len)`. Empty layouts always pass.
pub(crate) fn validate_bounds(
    len: usize,
    dims: &[usize],
    strides: &[isize],
    offset: isize,
) -> Result<()> {
    if dims.len() != strides.len() {
        return Err(StridedError::StrideLengthMismatch);
    }
    if dims.contains(&0) {
        return Ok(());
    }
    let (lo, hi) = extent(dims, strides, offset)?;
    if lo < 0 {
        return Err(StridedError::OutOfBounds { last: lo, len });
    }
    if hi as usize >= len {
        return Err(StridedError::OutOfBounds { last: hi, len });
    }
    Ok(())
}

/// Reject layouts in which two distinct indices reach the same element.
///
/// Sorted by stride magnitude, every axis must step past everything the
/// smaller axes can reach. Axes of length <= 1 never move.
pub(crate) fn validate_unique(dims: &[usize], strides: &[isize]) -> Result<()> {
    if dims.contains(&0) {
        return Ok(());
    }
    let mut axes: SmallVec<[(usize, usize, usize); 8]> = dims
        .iter()
        .zip(strides)
        .enumerate()
        .filter(|(_, (&d, _))| d > 1)
        .map(|(axis, (&d, &s))| (axis, d, s.unsigned_abs()))
        .collect();
    axes.sort_by_key(|&(_, _, s)| s);

    let mut reach = 0usize;
    for (axis, dim, stride) in axes {
        if stride == 0 {
            return Err(StridedError::ZeroStride { dim: axis });
        }
        if stride <= reach {
            return Err(StridedError::OverlappingView);
        }
        reach = stride
            .checked_mul(dim - 1)
            .and_then(|r| r.checked_add(reach))
            .ok_or(StridedError::OffsetOverflow)?;
    }
    Ok(())
}

fn dense_strides(dims: &[usize], axes: impl Iterator<Item = usize>) -> Vec<isize> {
    let mut strides = vec![1isize; dims.len()];
    let mut step = 1isize;
    for axis in axes {
        strides[axis] = step;
        step *= dims[axis].max(1) as isize;
    }
    strides
}

/// Column-major strides: the first index varies fastest.
pub fn col_major_strides(dims: &[usize]) -> Vec<isize> {
    dense_strides(dims, 0..dims.len())
}

/// Row-major strides: the last index varies fastest.
pub fn row_major_strides(dims: &[usize]) -> Vec<isize> {
    dense_strides(dims, (0..dims.len()).rev())
}

// ============================================================================
// Continuity
// ============================================================================

/// How a layout sits in memory, as far as the dispatcher's fast paths care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuity {
    /// Dense, last axis varies fastest.
    RowMajor,
    /// Dense, first axis varies fastest.
    ColMajor,
    /// Anything else: gaps, negative strides or a permuted order.
    Segmented,
}

/// Whether the axes, visited in the given order, tile memory with no gaps.
fn packed<'a>(axes: impl Iterator<Item = (&'a usize, &'a isize)>) -> bool {
    let mut expected = 1isize;
    for (&dim, &stride) in axes.filter(|(&d, _)| d > 1) {
        if stride != expected {
            return false;
        }
        expected = expected.saturating_mul(dim as isize);
    }
    true
}

impl Continuity {
    /// Classify a layout. Axes of length <= 1 are ignored, so a layout that is
    /// both row- and column-major reports `RowMajor`.
    pub fn of(dims: &[usize], strides: &[isize]) -> Self {
        if dims.len() != strides.len() {
            Continuity::Segmented
        } else if packed(dims.iter().rev().zip(strides.iter().rev())) {
            Continuity::RowMajor
        } else if packed(dims.iter().zip(strides)) {
            Continuity::ColMajor
        } else {
            Continuity::Segmented
        }
    }

    #[inline]
    pub fn is_dense(self) -> bool {
        self != Continuity::Segmented
    }
}

// ============================================================================
// Layout
// ============================================================================

/// Shape, strides and starting offset of an N-d window.
#[derive(Clone)]
struct Layout {
    dims: Arc<[usize]>,
    strides: Arc<[isize]>,
    offset: isize,
}

impl fmt::Debug for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dims={:?} strides={:?} offset={}", self.dims, self.strides, self.offset)
    }
}

impl Layout {
    fn new(dims: &[usize], strides: &[isize], offset: isize) -> Self {
        Self {
            dims: Arc::from(dims),
            strides: Arc::from(strides),
            offset,
        }
    }

    /// A layout over a buffer of `len` elements; `unique` additionally
    /// rejects self-overlap, as writable views require.
    fn checked(len: usize, dims: &[usize], strides: &[isize], offset: isize, unique: bool) -> Result<Self> {
        validate_bounds(len, dims, strides, offset)?;
        if unique {
            validate_unique(dims, strides)?;
        }
        Ok(Self::new(dims, strides, offset))
    }

    fn permuted(&self, perm: &[usize]) -> Result<Self> {
        let rank = self.dims.len();
        if perm.len() != rank {
            return Err(StridedError::RankMismatch(perm.len(), rank));
        }
        let mut seen: SmallVec<[bool; 8]> = SmallVec::from_elem(false, rank);
        for &p in perm {
            if p >= rank || seen[p] {
                return Err(StridedError::InvalidAxis { axis: p, rank });
            }
            seen[p] = true;
        }
        let dims: Vec<usize> = perm.iter().map(|&p| self.dims[p]).collect();
        let strides: Vec<isize> = perm.iter().map(|&p| self.strides[p]).collect();
        Ok(Self::new(&dims, &strides, self.offset))
    }

    /// Buffer position of `indices`. Panics on a wrong count or an index out
    /// of range, like slice indexing.
    fn position(&self, indices: &[usize]) -> usize {
        assert_eq!(indices.len(), self.dims.len(), "wrong number of indices");
        let mut at = self.offset;
        for ((&i, &d), &s) in indices.iter().zip(self.dims.iter()).zip(self.strides.iter()) {
            assert!(i < d, "index {i} out of bounds for dim {d}");
            at += i as isize * s;
        }
        at as usize
    }
}

/// Read-only accessors every layout-carrying type exposes.
macro_rules! layout_accessors {
    () => {
        #[inline]
        pub fn dims(&self) -> &[usize] {
            &self.layout.dims
        }

        #[inline]
        pub fn strides(&self) -> &[isize] {
            &self.layout.strides
        }

        #[inline]
        pub fn offset(&self) -> isize {
            self.layout.offset
        }

        #[inline]
        pub fn ndim(&self) -> usize {
            self.layout.dims.len()
        }

        /// Number of addressed elements.
        #[inline]
        pub fn len(&self) -> usize {
            self.layout.dims.iter().product()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.layout.dims.contains(&0)
        }

        #[inline]
        pub fn continuity(&self) -> Continuity {
            Continuity::of(&self.layout.dims, &self.layout.strides)
        }
    };
}

// ============================================================================
// StridedView
// ============================================================================

/// Dynamic-rank immutable strided view.
///
/// Element `[i0, i1, ...]` lives at `data[offset + sum(ik * strides[k])]`.
/// Strides may be negative (reversed traversal) or zero (broadcast).
pub struct StridedView<'a, T = f64> {
    data: &'a [T],
    layout: Layout,
}

impl<T> Clone for StridedView<'_, T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data,
            layout: self.layout.clone(),
        }
    }
}

impl<T> fmt::Debug for StridedView<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StridedView").field(&self.layout).finish()
    }
}

impl<'a, T> StridedView<'a, T> {
    pub fn new(data: &'a [T], dims: &[usize], strides: &[isize], offset: isize) -> Result<Self> {
        let layout = Layout::checked(data.len(), dims, strides, offset, false)?;
        Ok(Self { data, layout })
    }

    layout_accessors!();

    #[inline]
    pub fn data(&self) -> &'a [T] {
        self.data
    }

    /// Pointer to element `[0, 0, ...]`.
    #[inline]
    pub fn ptr(&self) -> *const T {
        self.data.as_ptr().wrapping_offset(self.layout.offset)
    }

    fn with_layout(&self, layout: Layout) -> StridedView<'a, T> {
        StridedView {
            data: self.data,
            layout,
        }
    }

    /// Reorder the axes: axis `k` of the result is axis `perm[k]` of `self`.
    pub fn permute(&self, perm: &[usize]) -> Result<StridedView<'a, T>> {
        Ok(self.with_layout(self.layout.permuted(perm)?))
    }

    /// Swap the two axes of a rank-2 view.
    pub fn t(&self) -> Result<StridedView<'a, T>> {
        if self.ndim() != 2 {
            return Err(StridedError::RankMismatch(self.ndim(), 2));
        }
        self.permute(&[1, 0])
    }

    /// Restrict `axis` to `start..start + len`.
    pub fn slice_axis(&self, axis: usize, start: usize, len: usize) -> Result<StridedView<'a, T>> {
        let rank = self.ndim();
        if axis >= rank {
            return Err(StridedError::InvalidAxis { axis, rank });
        }
        let end = start.checked_add(len).ok_or(StridedError::OffsetOverflow)?;
        let dim = self.layout.dims[axis];
        if end > dim {
            return Err(StridedError::IndexOutOfRange { index: end, len: dim });
        }
        let mut dims = self.layout.dims.to_vec();
        dims[axis] = len;
        let shift = if len == 0 { 0 } else { start as isize * self.layout.strides[axis] };
        Ok(self.with_layout(Layout::new(&dims, &self.layout.strides, self.layout.offset + shift)))
    }

    /// Walk the diagonal of each axis pair as a single axis.
    ///
    /// For a pair `(a, b)` the lower-numbered axis takes stride
    /// `strides[a] + strides[b]` and length `min(dims[a], dims[b])`, and the
    /// other axis disappears. Pairs refer to the original axis numbering.
    pub fn diagonal_view(&self, axis_pairs: &[(usize, usize)]) -> Result<StridedView<'a, T>> {
        let rank = self.ndim();
        let mut dims = self.layout.dims.to_vec();
        let mut strides = self.layout.strides.to_vec();
        let mut dropped: SmallVec<[usize; 4]> = SmallVec::new();
        for &(a, b) in axis_pairs {
            let (lo, hi) = (a.min(b), a.max(b));
            if hi >= rank || lo == hi {
                return Err(StridedError::InvalidAxis { axis: hi, rank });
            }
            strides[lo] += strides[hi];
            dims[lo] = dims[lo].min(dims[hi]);
            dropped.push(hi);
        }
        dropped.sort_unstable();
        dropped.dedup();
        for &axis in dropped.iter().rev() {
            dims.remove(axis);
            strides.remove(axis);
        }
        StridedView::new(self.data, &dims, &strides, self.layout.offset)
    }

    /// Stretch length-1 axes to `target_dims` with stride 0.
    pub fn broadcast(&self, target_dims: &[usize]) -> Result<StridedView<'a, T>> {
        let dims = &self.layout.dims;
        if dims.len() != target_dims.len() {
            return Err(StridedError::RankMismatch(dims.len(), target_dims.len()));
        }
        let strides = dims
            .iter()
            .zip(target_dims)
            .zip(self.layout.strides.iter())
            .map(|((&have, &want), &s)| match (have == want, have == 1) {
                (true, _) => Ok(s),
                (false, true) => Ok(0),
                (false, false) => Err(crate::shape_mismatch("broadcast", target_dims, dims)),
            })
            .collect::<Result<Vec<isize>>>()?;
        Ok(self.with_layout(Layout::new(target_dims, &strides, self.layout.offset)))
    }
}

impl<T: Copy> StridedView<'_, T> {
    /// Panics if an index is out of range.
    pub fn get(&self, indices: &[usize]) -> T {
        self.data[self.layout.position(indices)]
    }
}

// ============================================================================
// StridedViewMut
// ============================================================================

/// Dynamic-rank mutable strided view.
///
/// Construction rejects layouts that reach an element twice, so every write
/// through the view lands on a distinct location.
pub struct StridedViewMut<'a, T = f64> {
    data: &'a mut [T],
    layout: Layout,
}

impl<T> fmt::Debug for StridedViewMut<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StridedViewMut").field(&self.layout).finish()
    }
}

impl<'a, T> StridedViewMut<'a, T> {
    pub fn new(data: &'a mut [T], dims: &[usize], strides: &[isize], offset: isize) -> Result<Self> {
        let layout = Layout::checked(data.len(), dims, strides, offset, true)?;
        Ok(Self { data, layout })
    }

    layout_accessors!();

    #[inline]
    pub fn ptr(&self) -> *const T {
        self.data.as_ptr().wrapping_offset(self.layout.offset)
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.data.as_mut_ptr().wrapping_offset(self.layout.offset)
    }

    /// [`StridedView::permute`], consuming the mutable view.
    pub fn permute(self, perm: &[usize]) -> Result<StridedViewMut<'a, T>> {
        let layout = self.layout.permuted(perm)?;
        Ok(StridedViewMut {
            data: self.data,
            layout,
        })
    }

    pub fn as_view(&self) -> StridedView<'_, T> {
        StridedView {
            data: self.data,
            layout: self.layout.clone(),
        }
    }

    pub fn reborrow(&mut self) -> StridedViewMut<'_, T> {
        StridedViewMut {
            data: self.data,
            layout: self.layout.clone(),
        }
    }
}

impl<T: Copy> StridedViewMut<'_, T> {
    /// Panics if an index is out of range.
    pub fn get(&self, indices: &[usize]) -> T {
        self.data[self.layout.position(indices)]
    }

    /// Panics if an index is out of range.
    pub fn set(&mut self, indices: &[usize], value: T) {
        let at = self.layout.position(indices);
        self.data[at] = value;
    }
}

// ============================================================================
// StridedArray
// ============================================================================

/// Owned N-d array in row- or column-major order.
pub struct StridedArray<T = f64> {
    data: Vec<T>,
    layout: Layout,
}

impl<T> fmt::Debug for StridedArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StridedArray").field(&self.layout).finish()
    }
}

impl<T: Clone> Clone for StridedArray<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            layout: self.layout.clone(),
        }
    }
}

impl<T: Clone + Zero> StridedArray<T> {
    /// Zero-filled, first index fastest.
    pub fn col_major(dims: &[usize]) -> Self {
        Self::from_fn_col_major(dims, |_| T::zero())
    }

    /// Zero-filled, last index fastest.
    pub fn row_major(dims: &[usize]) -> Self {
        Self::from_fn_row_major(dims, |_| T::zero())
    }
}

/// Call `f` on every index of `dims` in memory order, advancing the axes in
/// the order `axes` lists them.
fn fill<T>(dims: &[usize], axes: &[usize], mut f: impl FnMut(&[usize]) -> T) -> Vec<T> {
    let total: usize = dims.iter().product();
    let mut data = Vec::with_capacity(total);
    let mut idx = vec![0usize; dims.len()];
    for _ in 0..total {
        data.push(f(&idx));
        for &d in axes {
            idx[d] += 1;
            if idx[d] < dims[d] {
                break;
            }
            idx[d] = 0;
        }
    }
    data
}

impl<T> StridedArray<T> {
    /// Column-major array with `f(index)` at every index; `f` is called in
    /// memory order.
    pub fn from_fn_col_major(dims: &[usize], f: impl FnMut(&[usize]) -> T) -> Self {
        let axes: Vec<usize> = (0..dims.len()).collect();
        Self {
            data: fill(dims, &axes, f),
            layout: Layout::new(dims, &col_major_strides(dims), 0),
        }
    }

    /// Row-major array with `f(index)` at every index; `f` is called in
    /// memory order.
    pub fn from_fn_row_major(dims: &[usize], f: impl FnMut(&[usize]) -> T) -> Self {
        let axes: Vec<usize> = (0..dims.len()).rev().collect();
        Self {
            data: fill(dims, &axes, f),
            layout: Layout::new(dims, &row_major_strides(dims), 0),
        }
    }

    /// Adopt `data` under an explicit layout, which must be in bounds and
    /// free of overlap.
    pub fn from_parts(data: Vec<T>, dims: &[usize], strides: &[isize], offset: isize) -> Result<Self> {
        let layout = Layout::checked(data.len(), dims, strides, offset, true)?;
        Ok(Self { data, layout })
    }

    layout_accessors!();

    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    pub fn view(&self) -> StridedView<'_, T> {
        StridedView {
            data: &self.data,
            layout: self.layout.clone(),
        }
    }

    pub fn view_mut(&mut self) -> StridedViewMut<'_, T> {
        StridedViewMut {
            data: &mut self.data,
            layout: self.layout.clone(),
        }
    }

    fn expect_rank(&self, rank: usize) -> Result<()> {
        if self.ndim() != rank {
            return Err(StridedError::RankMismatch(self.ndim(), rank));
        }
        Ok(())
    }

    /// The array as a [`VectorView`]; rank must be 1.
    pub fn vector(&self) -> Result<VectorView<'_, T>> {
        self.expect_rank(1)?;
        let l = &self.layout;
        VectorView::new(&self.data, l.offset as usize, l.dims[0], l.strides[0])
    }

    pub fn vector_mut(&mut self) -> Result<VectorViewMut<'_, T>> {
        self.expect_rank(1)?;
        let l = &self.layout;
        VectorViewMut::new(&mut self.data, l.offset as usize, l.dims[0], l.strides[0])
    }

    /// The array as a [`MatrixView`]; rank must be 2.
    pub fn matrix(&self) -> Result<MatrixView<'_, T>> {
        self.expect_rank(2)?;
        let l = &self.layout;
        MatrixView::new(&self.data, l.offset as usize, l.dims[0], l.dims[1], l.strides[0], l.strides[1])
    }

    pub fn matrix_mut(&mut self) -> Result<MatrixViewMut<'_, T>> {
        self.expect_rank(2)?;
        let l = &self.layout;
        MatrixViewMut::new(&mut self.data, l.offset as usize, l.dims[0], l.dims[1], l.strides[0], l.strides[1])
    }

    /// Elements in memory order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }
}

impl<T: Copy> StridedArray<T> {
    pub fn get(&self, indices: &[usize]) -> T {
        self.data[self.layout.position(indices)]
    }

    pub fn set(&mut self, indices: &[usize], value: T) {
        let at = self.layout.position(indices);
        self.data[at] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_strides() {
        assert_eq!(col_major_strides(&[2, 3, 4]), vec![1, 2, 6]);
        assert_eq!(row_major_strides(&[2, 3, 4]), vec![12, 4, 1]);
        assert_eq!(row_major_strides(&[]), Vec::<isize>::new());
        assert_eq!(col_major_strides(&[0, 5]), vec![1, 1]);
    }

    #[test]
    fn test_validate_bounds() {
        assert!(validate_bounds(6, &[2, 3], &[3, 1], 0).is_ok());
        assert!(matches!(
            validate_bounds(5, &[2, 3], &[3, 1], 0),
            Err(StridedError::OutOfBounds { last: 5, len: 5 })
        ));
        assert!(validate_bounds(4, &[4], &[-1], 3).is_ok());
        assert!(matches!(
            validate_bounds(4, &[4], &[-1], 2),
            Err(StridedError::OutOfBounds { last: -1, .. })
        ));
        assert!(validate_bounds(0, &[0, 3], &[3, 1], 100).is_ok());
        assert!(matches!(
            validate_bounds(10, &[2], &[1, 1], 0),
            Err(StridedError::StrideLengthMismatch)
        ));
    }

    #[test]
    fn test_validate_unique() {
        assert!(validate_unique(&[3, 4], &[4, 1]).is_ok());
        assert!(validate_unique(&[3, 4], &[1, 3]).is_ok());
        assert!(validate_unique(&[3, 4], &[-8, 2]).is_ok());
        assert!(matches!(
            validate_unique(&[3, 4], &[2, 1]),
            Err(StridedError::OverlappingView)
        ));
        assert!(matches!(
            validate_unique(&[3, 4], &[0, 1]),
            Err(StridedError::ZeroStride { dim: 0 })
        ));
        assert!(validate_unique(&[1, 4], &[0, 1]).is_ok());
    }

    #[test]
    fn test_continuity() {
        assert_eq!(Continuity::of(&[3, 4], &[4, 1]), Continuity::RowMajor);
        assert_eq!(Continuity::of(&[3, 4], &[1, 3]), Continuity::ColMajor);
        assert_eq!(Continuity::of(&[3, 4], &[8, 2]), Continuity::Segmented);
        assert_eq!(Continuity::of(&[2, 1, 3], &[3, 999, 1]), Continuity::RowMajor);
        assert_eq!(Continuity::of(&[4], &[-1]), Continuity::Segmented);
        assert!(!Continuity::Segmented.is_dense());
    }

    #[test]
    fn test_permute_and_get() {
        let data: Vec<f64> = (0..6).map(|x| x as f64).collect();
        let view = StridedView::new(&data, &[2, 3], &[3, 1], 0).unwrap();
        assert_eq!(view.get(&[1, 2]), 5.0);
        let t = view.t().unwrap();
        assert_eq!(t.dims(), &[3, 2]);
        assert_eq!(t.get(&[2, 1]), 5.0);
        assert_eq!(t.continuity(), Continuity::ColMajor);
        assert!(matches!(view.permute(&[0, 0]), Err(StridedError::InvalidAxis { axis: 0, rank: 2 })));
        assert!(matches!(view.permute(&[0]), Err(StridedError::RankMismatch(1, 2))));
    }

    #[test]
    fn test_slice_axis() {
        let data: Vec<f64> = (0..12).map(|x| x as f64).collect();
        let view = StridedView::new(&data, &[3, 4], &[4, 1], 0).unwrap();
        let s = view.slice_axis(1, 1, 2).unwrap();
        assert_eq!(s.dims(), &[3, 2]);
        assert_eq!(s.get(&[2, 0]), 9.0);
        assert!(view.slice_axis(1, 3, 2).is_err());
        assert!(view.slice_axis(2, 0, 1).is_err());
    }

    #[test]
    fn test_diagonal_view() {
        let data: Vec<f64> = (0..9).map(|x| x as f64).collect();
        let view = StridedView::new(&data, &[3, 3], &[3, 1], 0).unwrap();
        let diag = view.diagonal_view(&[(0, 1)]).unwrap();
        assert_eq!(diag.dims(), &[3]);
        assert_eq!(diag.strides(), &[4]);
        assert_eq!(diag.get(&[2]), 8.0);
        assert!(view.diagonal_view(&[(1, 1)]).is_err());
    }

    #[test]
    fn test_broadcast() {
        let data = vec![1.0, 2.0, 3.0];
        let view = StridedView::new(&data, &[1, 3], &[3, 1], 0).unwrap();
        let b = view.broadcast(&[4, 3]).unwrap();
        assert_eq!(b.strides(), &[0, 1]);
        assert_eq!(b.get(&[3, 2]), 3.0);
        assert!(matches!(
            view.broadcast(&[4, 2]),
            Err(StridedError::ShapeMismatch { op: "broadcast", .. })
        ));
    }

    #[test]
    fn test_mut_view_rejects_overlap() {
        let mut data = vec![0.0; 8];
        let err = StridedViewMut::new(&mut data, &[2, 4], &[1, 1], 0).unwrap_err();
        assert!(matches!(err, StridedError::OverlappingView));
    }

    #[test]
    fn test_array_views_share_storage() {
        let mut a = StridedArray::<f64>::from_fn_row_major(&[2, 3], |idx| (idx[0] * 3 + idx[1]) as f64);
        assert_eq!(a.data(), &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        a.set(&[1, 0], 10.0);
        assert_eq!(a.view().get(&[1, 0]), 10.0);
        let mut m = a.view_mut();
        m.set(&[0, 2], -1.0);
        assert_eq!(a.get(&[0, 2]), -1.0);
        assert_eq!(a.matrix().unwrap().get(1, 0), 10.0);
        assert!(a.vector().is_err());
    }

    #[test]
    fn test_from_fn_col_major_order() {
        let a = StridedArray::<f64>::from_fn_col_major(&[2, 2], |idx| (idx[0] + 10 * idx[1]) as f64);
        assert_eq!(a.data(), &[0.0, 1.0, 10.0, 11.0]);
        assert_eq!(a.strides(), &[1, 2]);
        let z = StridedArray::<f64>::col_major(&[2, 3]);
        assert_eq!(z.len(), 6);
        assert!(z.iter().all(|&v| v == 0.0));
    }
}
