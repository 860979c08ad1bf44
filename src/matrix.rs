//! Rank-2 strided views.
//!
//! Row-major storage is `row_stride = cols, col_stride = 1`, column-major the
//! reverse; any other pair describes a sub-block, a transpose or a
//! regularly-spaced selection. All derived views share the parent's storage.
//!
//! A matrix view also carries a `diag_offset`: the column shift of the parent
//! matrix's main diagonal as seen from this view. It is zero for freshly
//! constructed views, is updated by [`MatrixView::sub`] and [`MatrixView::t`],
//! and tells the masked multiply which elements of a sub-block belong to the
//! parent's upper or lower triangle.

use crate::vector::{VectorView, VectorViewMut};
use crate::view::{validate_bounds, validate_unique};
use crate::{Result, StridedError};

fn check_layout(
    data_len: usize,
    offset: usize,
    dims: [usize; 2],
    strides: [isize; 2],
    unique: bool,
) -> Result<()> {
    let offset = isize::try_from(offset).map_err(|_| StridedError::OffsetOverflow)?;
    validate_bounds(data_len, &dims, &strides, offset)?;
    if unique {
        return validate_unique(&dims, &strides);
    }
    if dims.iter().all(|&d| d > 0) {
        for axis in 0..2 {
            if dims[axis] > 1 && strides[axis] == 0 {
                return Err(StridedError::ZeroStride { dim: axis });
            }
        }
    }
    Ok(())
}

fn check_block(r0: usize, c0: usize, nr: usize, nc: usize, dims: [usize; 2]) -> Result<()> {
    let re = r0.checked_add(nr).ok_or(StridedError::OffsetOverflow)?;
    let ce = c0.checked_add(nc).ok_or(StridedError::OffsetOverflow)?;
    if re > dims[0] {
        return Err(StridedError::IndexOutOfRange { index: re, len: dims[0] });
    }
    if ce > dims[1] {
        return Err(StridedError::IndexOutOfRange { index: ce, len: dims[1] });
    }
    Ok(())
}

#[inline]
fn element_offset(offset: usize, strides: [isize; 2], i: usize, j: usize) -> usize {
    (offset as isize + i as isize * strides[0] + j as isize * strides[1]) as usize
}

#[inline]
fn block_offset(offset: usize, strides: [isize; 2], r0: usize, c0: usize, nr: usize, nc: usize) -> usize {
    if nr == 0 || nc == 0 {
        offset
    } else {
        element_offset(offset, strides, r0, c0)
    }
}

/// Immutable matrix view.
#[derive(Debug)]
pub struct MatrixView<'a, T = f64> {
    data: &'a [T],
    offset: usize,
    dims: [usize; 2],
    strides: [isize; 2],
    diag_offset: isize,
}

impl<T> Clone for MatrixView<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for MatrixView<'_, T> {}

impl<'a, T> MatrixView<'a, T> {
    /// Create a view with explicit strides.
    ///
    /// Fails with [`StridedError::OutOfBounds`] if the last addressable element
    /// `offset + (rows-1)*row_stride + (cols-1)*col_stride` (or the first, for
    /// negative strides) is outside `data`.
    pub fn new(
        data: &'a [T],
        offset: usize,
        rows: usize,
        cols: usize,
        row_stride: isize,
        col_stride: isize,
    ) -> Result<Self> {
        let dims = [rows, cols];
        let strides = [row_stride, col_stride];
        check_layout(data.len(), offset, dims, strides, false)?;
        Ok(Self {
            data,
            offset,
            dims,
            strides,
            diag_offset: 0,
        })
    }

    /// Dense row-major view of the leading `rows * cols` elements.
    pub fn row_major(data: &'a [T], rows: usize, cols: usize) -> Result<Self> {
        Self::new(data, 0, rows, cols, cols.max(1) as isize, 1)
    }

    /// Dense column-major view of the leading `rows * cols` elements.
    pub fn col_major(data: &'a [T], rows: usize, cols: usize) -> Result<Self> {
        Self::new(data, 0, rows, cols, 1, rows.max(1) as isize)
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.dims[0]
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.dims[1]
    }

    #[inline]
    pub fn row_stride(&self) -> isize {
        self.strides[0]
    }

    #[inline]
    pub fn col_stride(&self) -> isize {
        self.strides[1]
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn diag_offset(&self) -> isize {
        self.diag_offset
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims[0] == 0 || self.dims[1] == 0
    }

    #[inline]
    pub fn is_square(&self) -> bool {
        self.dims[0] == self.dims[1]
    }

    #[inline]
    pub(crate) fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub(crate) fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn ptr(&self) -> *const T {
        self.data.as_ptr().wrapping_add(self.offset)
    }

    /// Replace the diagonal shift used by triangle-masked routines.
    pub fn with_diag_offset(mut self, diag_offset: isize) -> Self {
        self.diag_offset = diag_offset;
        self
    }

    /// Transpose (zero-copy).
    pub fn t(&self) -> MatrixView<'a, T> {
        MatrixView {
            data: self.data,
            offset: self.offset,
            dims: [self.dims[1], self.dims[0]],
            strides: [self.strides[1], self.strides[0]],
            diag_offset: -self.diag_offset,
        }
    }

    /// The `nr x nc` block whose top-left element is `(r0, c0)`.
    pub fn sub(&self, r0: usize, c0: usize, nr: usize, nc: usize) -> Result<MatrixView<'a, T>> {
        check_block(r0, c0, nr, nc, self.dims)?;
        Ok(MatrixView {
            data: self.data,
            offset: block_offset(self.offset, self.strides, r0, c0, nr, nc),
            dims: [nr, nc],
            strides: self.strides,
            diag_offset: self.diag_offset + c0 as isize - r0 as isize,
        })
    }

    pub fn row(&self, i: usize) -> Result<VectorView<'a, T>> {
        if i >= self.rows() {
            return Err(StridedError::IndexOutOfRange { index: i, len: self.rows() });
        }
        let offset = block_offset(self.offset, self.strides, i, 0, 1, self.cols());
        VectorView::new(self.data, offset, self.cols(), self.col_stride())
    }

    pub fn col(&self, j: usize) -> Result<VectorView<'a, T>> {
        if j >= self.cols() {
            return Err(StridedError::IndexOutOfRange { index: j, len: self.cols() });
        }
        let offset = block_offset(self.offset, self.strides, 0, j, self.rows(), 1);
        VectorView::new(self.data, offset, self.rows(), self.row_stride())
    }

    /// Main diagonal as a vector with stride `row_stride + col_stride`.
    pub fn diag(&self) -> Result<VectorView<'a, T>> {
        let len = self.rows().min(self.cols());
        VectorView::new(self.data, self.offset, len, self.row_stride() + self.col_stride())
    }
}

impl<T: Copy> MatrixView<'_, T> {
    /// Element `(i, j)`. Panics if out of range.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        assert!(
            i < self.dims[0] && j < self.dims[1],
            "index ({}, {}) out of bounds for {}x{}",
            i,
            j,
            self.dims[0],
            self.dims[1]
        );
        self.data[element_offset(self.offset, self.strides, i, j)]
    }

    /// Copy out in row-major order.
    pub fn to_row_major_vec(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.dims[0] * self.dims[1]);
        for i in 0..self.dims[0] {
            for j in 0..self.dims[1] {
                out.push(self.get(i, j));
            }
        }
        out
    }
}

/// Mutable matrix view. Construction rejects layouts that alias an element.
#[derive(Debug)]
pub struct MatrixViewMut<'a, T = f64> {
    data: &'a mut [T],
    offset: usize,
    dims: [usize; 2],
    strides: [isize; 2],
    diag_offset: isize,
}

impl<'a, T> MatrixViewMut<'a, T> {
    pub fn new(
        data: &'a mut [T],
        offset: usize,
        rows: usize,
        cols: usize,
        row_stride: isize,
        col_stride: isize,
    ) -> Result<Self> {
        let dims = [rows, cols];
        let strides = [row_stride, col_stride];
        check_layout(data.len(), offset, dims, strides, true)?;
        Ok(Self {
            data,
            offset,
            dims,
            strides,
            diag_offset: 0,
        })
    }

    pub fn row_major(data: &'a mut [T], rows: usize, cols: usize) -> Result<Self> {
        Self::new(data, 0, rows, cols, cols.max(1) as isize, 1)
    }

    pub fn col_major(data: &'a mut [T], rows: usize, cols: usize) -> Result<Self> {
        Self::new(data, 0, rows, cols, 1, rows.max(1) as isize)
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.dims[0]
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.dims[1]
    }

    #[inline]
    pub fn row_stride(&self) -> isize {
        self.strides[0]
    }

    #[inline]
    pub fn col_stride(&self) -> isize {
        self.strides[1]
    }

    #[inline]
    pub fn diag_offset(&self) -> isize {
        self.diag_offset
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims[0] == 0 || self.dims[1] == 0
    }

    #[inline]
    pub fn is_square(&self) -> bool {
        self.dims[0] == self.dims[1]
    }

    #[inline]
    pub(crate) fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub(crate) fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn ptr(&self) -> *const T {
        self.data.as_ptr().wrapping_add(self.offset)
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.data.as_mut_ptr().wrapping_add(self.offset)
    }

    pub fn with_diag_offset(mut self, diag_offset: isize) -> Self {
        self.diag_offset = diag_offset;
        self
    }

    pub fn as_view(&self) -> MatrixView<'_, T> {
        MatrixView {
            data: self.data,
            offset: self.offset,
            dims: self.dims,
            strides: self.strides,
            diag_offset: self.diag_offset,
        }
    }

    pub fn reborrow(&mut self) -> MatrixViewMut<'_, T> {
        MatrixViewMut {
            data: self.data,
            offset: self.offset,
            dims: self.dims,
            strides: self.strides,
            diag_offset: self.diag_offset,
        }
    }

    /// Transpose, consuming the view.
    pub fn t(self) -> MatrixViewMut<'a, T> {
        MatrixViewMut {
            data: self.data,
            offset: self.offset,
            dims: [self.dims[1], self.dims[0]],
            strides: [self.strides[1], self.strides[0]],
            diag_offset: -self.diag_offset,
        }
    }

    pub fn sub_mut(&mut self, r0: usize, c0: usize, nr: usize, nc: usize) -> Result<MatrixViewMut<'_, T>> {
        check_block(r0, c0, nr, nc, self.dims)?;
        Ok(MatrixViewMut {
            offset: block_offset(self.offset, self.strides, r0, c0, nr, nc),
            data: self.data,
            dims: [nr, nc],
            strides: self.strides,
            diag_offset: self.diag_offset + c0 as isize - r0 as isize,
        })
    }

    pub fn row_mut(&mut self, i: usize) -> Result<VectorViewMut<'_, T>> {
        if i >= self.rows() {
            return Err(StridedError::IndexOutOfRange { index: i, len: self.rows() });
        }
        let offset = block_offset(self.offset, self.strides, i, 0, 1, self.cols());
        let (len, stride) = (self.cols(), self.col_stride());
        VectorViewMut::new(self.data, offset, len, stride)
    }

    pub fn col_mut(&mut self, j: usize) -> Result<VectorViewMut<'_, T>> {
        if j >= self.cols() {
            return Err(StridedError::IndexOutOfRange { index: j, len: self.cols() });
        }
        let offset = block_offset(self.offset, self.strides, 0, j, self.rows(), 1);
        let (len, stride) = (self.rows(), self.row_stride());
        VectorViewMut::new(self.data, offset, len, stride)
    }

    pub fn diag_mut(&mut self) -> Result<VectorViewMut<'_, T>> {
        let len = self.rows().min(self.cols());
        let (offset, stride) = (self.offset, self.row_stride() + self.col_stride());
        VectorViewMut::new(self.data, offset, len, stride)
    }
}

impl<T: Copy> MatrixViewMut<'_, T> {
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.as_view().get(i, j)
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: T) {
        assert!(
            i < self.dims[0] && j < self.dims[1],
            "index ({}, {}) out of bounds for {}x{}",
            i,
            j,
            self.dims[0],
            self.dims[1]
        );
        self.data[element_offset(self.offset, self.strides, i, j)] = value;
    }

    pub fn to_row_major_vec(&self) -> Vec<T> {
        self.as_view().to_row_major_vec()
    }
}

// ============================================================================
// Unchecked descriptors for kernels
// ============================================================================

/// Read-only matrix descriptor without a lifetime, for kernel code.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MatRef {
    pub(crate) ptr: *const f64,
    pub(crate) rows: usize,
    pub(crate) cols: usize,
    pub(crate) rs: isize,
    pub(crate) cs: isize,
}

// SAFETY: a MatRef is only built from a validated view whose borrow outlives
// every kernel it is passed to; kernels only read through it.
unsafe impl Send for MatRef {}
unsafe impl Sync for MatRef {}

impl MatRef {
    #[inline(always)]
    pub(crate) fn t(self) -> Self {
        Self {
            ptr: self.ptr,
            rows: self.cols,
            cols: self.rows,
            rs: self.cs,
            cs: self.rs,
        }
    }

    #[inline(always)]
    pub(crate) fn ptr_at(self, i: usize, j: usize) -> *const f64 {
        self.ptr
            .wrapping_offset(i as isize * self.rs + j as isize * self.cs)
    }

    /// # Safety
    /// `(i, j)` must be inside the matrix.
    #[inline(always)]
    pub(crate) unsafe fn get(self, i: usize, j: usize) -> f64 {
        *self.ptr_at(i, j)
    }

    #[inline(always)]
    pub(crate) fn sub(self, r0: usize, c0: usize, nr: usize, nc: usize) -> Self {
        debug_assert!(r0 + nr <= self.rows && c0 + nc <= self.cols);
        Self {
            ptr: self.ptr_at(r0, c0),
            rows: nr,
            cols: nc,
            rs: self.rs,
            cs: self.cs,
        }
    }
}

/// Writable matrix descriptor without a lifetime, for kernel code.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MatMut {
    pub(crate) ptr: *mut f64,
    pub(crate) rows: usize,
    pub(crate) cols: usize,
    pub(crate) rs: isize,
    pub(crate) cs: isize,
    pub(crate) diag_offset: isize,
}

// SAFETY: parallel kernels write disjoint column blocks through copies of
// one MatMut built from a validated, non-aliasing mutable view.
unsafe impl Send for MatMut {}
unsafe impl Sync for MatMut {}

impl MatMut {
    #[inline(always)]
    pub(crate) fn t(self) -> Self {
        Self {
            ptr: self.ptr,
            rows: self.cols,
            cols: self.rows,
            rs: self.cs,
            cs: self.rs,
            diag_offset: -self.diag_offset,
        }
    }

    #[inline(always)]
    pub(crate) fn ptr_at(self, i: usize, j: usize) -> *mut f64 {
        self.ptr
            .wrapping_offset(i as isize * self.rs + j as isize * self.cs)
    }

    #[inline(always)]
    pub(crate) fn sub(self, r0: usize, c0: usize, nr: usize, nc: usize) -> Self {
        debug_assert!(r0 + nr <= self.rows && c0 + nc <= self.cols);
        Self {
            ptr: self.ptr_at(r0, c0),
            rows: nr,
            cols: nc,
            rs: self.rs,
            cs: self.cs,
            diag_offset: self.diag_offset + c0 as isize - r0 as isize,
        }
    }

    #[inline(always)]
    pub(crate) fn as_ref(self) -> MatRef {
        MatRef {
            ptr: self.ptr,
            rows: self.rows,
            cols: self.cols,
            rs: self.rs,
            cs: self.cs,
        }
    }
}

impl MatrixView<'_, f64> {
    #[inline]
    pub(crate) fn raw(&self) -> MatRef {
        MatRef {
            ptr: self.ptr(),
            rows: self.dims[0],
            cols: self.dims[1],
            rs: self.strides[0],
            cs: self.strides[1],
        }
    }
}

impl MatrixViewMut<'_, f64> {
    #[inline]
    pub(crate) fn raw_mut(&mut self) -> MatMut {
        MatMut {
            ptr: self.as_mut_ptr(),
            rows: self.dims[0],
            cols: self.dims[1],
            rs: self.strides[0],
            cs: self.strides[1],
            diag_offset: self.diag_offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(n: usize) -> Vec<f64> {
        (0..n).map(|x| x as f64).collect()
    }

    #[test]
    fn test_row_and_col_major_agree_after_transpose() {
        let d = data(6);
        let r = MatrixView::row_major(&d, 2, 3).unwrap();
        let c = MatrixView::col_major(&d, 3, 2).unwrap();
        assert_eq!(r.t().to_row_major_vec(), c.to_row_major_vec());
        assert_eq!(r.get(1, 2), 5.0);
        assert_eq!(c.get(2, 1), 5.0);
    }

    #[test]
    fn test_last_element_checked_at_construction() {
        let d = data(5);
        let err = MatrixView::row_major(&d, 2, 3).unwrap_err();
        assert!(matches!(err, StridedError::OutOfBounds { last: 5, len: 5 }));
        assert!(MatrixView::new(&d, 1, 2, 2, 2, 1).is_ok());
        assert!(MatrixView::new(&d, 2, 2, 2, 2, 1).is_err());
    }

    #[test]
    fn test_empty_views_are_legal() {
        let d: Vec<f64> = vec![];
        let m = MatrixView::row_major(&d, 0, 4).unwrap();
        assert!(m.is_empty());
        let m = MatrixView::col_major(&d, 3, 0).unwrap();
        assert!(m.is_empty());
        assert_eq!(m.diag().unwrap().len(), 0);
    }

    #[test]
    fn test_sub_row_col_diag() {
        let d = data(16);
        let m = MatrixView::row_major(&d, 4, 4).unwrap();
        let s = m.sub(1, 2, 3, 2).unwrap();
        assert_eq!(s.to_row_major_vec(), vec![6.0, 7.0, 10.0, 11.0, 14.0, 15.0]);
        assert_eq!(s.diag_offset(), 1);
        assert_eq!(s.t().diag_offset(), -1);
        assert_eq!(m.row(2).unwrap().to_vec(), vec![8.0, 9.0, 10.0, 11.0]);
        assert_eq!(m.col(1).unwrap().to_vec(), vec![1.0, 5.0, 9.0, 13.0]);
        let diag = m.diag().unwrap();
        assert_eq!(diag.stride(), 5);
        assert_eq!(diag.to_vec(), vec![0.0, 5.0, 10.0, 15.0]);
        assert!(m.sub(3, 0, 2, 1).is_err());
        assert!(m.row(4).is_err());
    }

    #[test]
    fn test_mut_rejects_aliasing_layout() {
        let mut d = data(8);
        assert!(matches!(
            MatrixViewMut::new(&mut d, 0, 3, 3, 1, 1),
            Err(StridedError::OverlappingView)
        ));
        assert!(matches!(
            MatrixViewMut::new(&mut d, 0, 2, 2, 0, 1),
            Err(StridedError::ZeroStride { dim: 0 })
        ));
    }

    #[test]
    fn test_mut_sub_and_transpose_write_through() {
        let mut d = vec![0.0; 6];
        {
            let mut m = MatrixViewMut::row_major(&mut d, 2, 3).unwrap();
            let mut s = m.sub_mut(0, 1, 2, 2).unwrap();
            s.set(1, 1, 7.0);
            m.col_mut(0).unwrap().set(1, 3.0);
            let mut t = m.t();
            t.set(1, 0, 9.0);
        }
        assert_eq!(d, vec![0.0, 9.0, 0.0, 3.0, 0.0, 7.0]);
    }
}
