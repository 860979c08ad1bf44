//! Rank-1 strided views.

use crate::indice::Indice1;
use crate::view::validate_bounds;
use crate::{Result, StridedError};

fn check_layout(data_len: usize, offset: usize, len: usize, stride: isize) -> Result<()> {
    if stride == 0 && len > 1 {
        return Err(StridedError::ZeroStride { dim: 0 });
    }
    let offset = isize::try_from(offset).map_err(|_| StridedError::OffsetOverflow)?;
    validate_bounds(data_len, &[len], &[stride], offset)
}

fn check_slice(start: usize, len: usize, total: usize) -> Result<()> {
    let end = start.checked_add(len).ok_or(StridedError::OffsetOverflow)?;
    if end > total {
        return Err(StridedError::IndexOutOfRange { index: end, len: total });
    }
    Ok(())
}

#[inline]
fn element_offset(offset: usize, stride: isize, i: usize) -> usize {
    (offset as isize + i as isize * stride) as usize
}

/// Immutable vector view: element `i` is `data[offset + i * stride]`.
///
/// Views are cheap to copy and deliberately implement neither `PartialEq`
/// nor `Hash`; two views over the same storage are distinct windows.
#[derive(Debug)]
pub struct VectorView<'a, T = f64> {
    data: &'a [T],
    offset: usize,
    dims: [usize; 1],
    strides: [isize; 1],
}

impl<T> Clone for VectorView<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for VectorView<'_, T> {}

impl<'a, T> VectorView<'a, T> {
    /// Create a view of `len` elements starting at `offset`.
    ///
    /// Fails if any addressed element lies outside `data`, or if `stride` is
    /// zero for a vector of more than one element.
    pub fn new(data: &'a [T], offset: usize, len: usize, stride: isize) -> Result<Self> {
        check_layout(data.len(), offset, len, stride)?;
        Ok(Self {
            data,
            offset,
            dims: [len],
            strides: [stride],
        })
    }

    /// View the whole slice with unit stride.
    pub fn contiguous(data: &'a [T]) -> Self {
        Self {
            data,
            offset: 0,
            dims: [data.len()],
            strides: [1],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dims[0]
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims[0] == 0
    }

    #[inline]
    pub fn stride(&self) -> isize {
        self.strides[0]
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn data(&self) -> &'a [T] {
        self.data
    }

    #[inline]
    pub(crate) fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub(crate) fn strides(&self) -> &[isize] {
        &self.strides
    }

    /// Raw pointer to element 0.
    #[inline]
    pub fn ptr(&self) -> *const T {
        self.data.as_ptr().wrapping_add(self.offset)
    }

    /// Loop descriptor for this view.
    #[inline]
    pub fn indice(&self) -> Indice1 {
        Indice1::new(self.len(), self.stride())
    }

    /// Elements `start..start + len`, zero-copy.
    pub fn slice(&self, start: usize, len: usize) -> Result<VectorView<'a, T>> {
        check_slice(start, len, self.len())?;
        let offset = if len == 0 {
            self.offset
        } else {
            element_offset(self.offset, self.stride(), start)
        };
        Ok(VectorView {
            data: self.data,
            offset,
            dims: [len],
            strides: self.strides,
        })
    }

    /// The same elements in reverse order, via a negated stride.
    pub fn rev(&self) -> VectorView<'a, T> {
        let offset = if self.is_empty() {
            self.offset
        } else {
            element_offset(self.offset, self.stride(), self.len() - 1)
        };
        VectorView {
            data: self.data,
            offset,
            dims: self.dims,
            strides: [-self.stride()],
        }
    }
}

impl<T: Copy> VectorView<'_, T> {
    /// Element `i`. Panics if `i >= len`.
    #[inline]
    pub fn get(&self, i: usize) -> T {
        assert!(i < self.len(), "index {} out of bounds for length {}", i, self.len());
        self.data[element_offset(self.offset, self.stride(), i)]
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }
}

/// Mutable vector view.
///
/// A mutable view never addresses one element twice: a zero stride is only
/// accepted for vectors of length at most one.
#[derive(Debug)]
pub struct VectorViewMut<'a, T = f64> {
    data: &'a mut [T],
    offset: usize,
    dims: [usize; 1],
    strides: [isize; 1],
}

impl<'a, T> VectorViewMut<'a, T> {
    pub fn new(data: &'a mut [T], offset: usize, len: usize, stride: isize) -> Result<Self> {
        check_layout(data.len(), offset, len, stride)?;
        Ok(Self {
            data,
            offset,
            dims: [len],
            strides: [stride],
        })
    }

    pub fn contiguous(data: &'a mut [T]) -> Self {
        let len = data.len();
        Self {
            data,
            offset: 0,
            dims: [len],
            strides: [1],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dims[0]
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims[0] == 0
    }

    #[inline]
    pub fn stride(&self) -> isize {
        self.strides[0]
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
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
    pub fn indice(&self) -> Indice1 {
        Indice1::new(self.len(), self.stride())
    }

    #[inline]
    pub fn ptr(&self) -> *const T {
        self.data.as_ptr().wrapping_add(self.offset)
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.data.as_mut_ptr().wrapping_add(self.offset)
    }

    pub fn as_view(&self) -> VectorView<'_, T> {
        VectorView {
            data: self.data,
            offset: self.offset,
            dims: self.dims,
            strides: self.strides,
        }
    }

    pub fn reborrow(&mut self) -> VectorViewMut<'_, T> {
        VectorViewMut {
            data: self.data,
            offset: self.offset,
            dims: self.dims,
            strides: self.strides,
        }
    }

    /// Mutable window over elements `start..start + len`.
    pub fn slice_mut(&mut self, start: usize, len: usize) -> Result<VectorViewMut<'_, T>> {
        check_slice(start, len, self.len())?;
        let offset = if len == 0 {
            self.offset
        } else {
            element_offset(self.offset, self.stride(), start)
        };
        Ok(VectorViewMut {
            data: self.data,
            offset,
            dims: [len],
            strides: self.strides,
        })
    }

    /// Consume the view and return it reversed.
    pub fn rev(self) -> VectorViewMut<'a, T> {
        let offset = if self.is_empty() {
            self.offset
        } else {
            element_offset(self.offset, self.stride(), self.len() - 1)
        };
        VectorViewMut {
            data: self.data,
            offset,
            dims: self.dims,
            strides: [-self.strides[0]],
        }
    }
}

impl<T: Copy> VectorViewMut<'_, T> {
    #[inline]
    pub fn get(&self, i: usize) -> T {
        assert!(i < self.len(), "index {} out of bounds for length {}", i, self.len());
        self.data[element_offset(self.offset, self.stride(), i)]
    }

    #[inline]
    pub fn set(&mut self, i: usize, value: T) {
        assert!(i < self.len(), "index {} out of bounds for length {}", i, self.len());
        self.data[element_offset(self.offset, self.strides[0], i)] = value;
    }

    pub fn to_vec(&self) -> Vec<T> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }
}
