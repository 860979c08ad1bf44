//! Thread-local scratch pool and scoped staging buffers.
//!
//! [`ScratchBuffer`] borrows an `f64` buffer from a per-thread free list keyed
//! by power-of-two size class and gives it back when dropped, so every exit
//! path releases it. [`BufferView`] builds on it: it stages a strided vector
//! in contiguous scratch, lets a kernel work on unit-stride data, and writes
//! the result back to the vector on drop.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use tracing::debug;

use crate::indice::Indice1;
use crate::vector::VectorViewMut;

thread_local! {
    static SCRATCH_POOL: RefCell<Vec<Vec<Vec<f64>>>> = const { RefCell::new(Vec::new()) };
}

const MAX_POOL_PER_CLASS: usize = 4;
const MAX_POOLED_BYTES: usize = 64 * 1024 * 1024;

#[inline]
fn size_class(len: usize) -> usize {
    len.max(1).next_power_of_two().trailing_zeros() as usize
}

fn take_pooled(len: usize) -> Vec<f64> {
    let class = size_class(len);
    let reused = SCRATCH_POOL
        .try_with(|pool| {
            let mut pool = pool.borrow_mut();
            pool.get_mut(class).and_then(|free| free.pop())
        })
        .ok()
        .flatten();
    match reused {
        Some(mut buf) => {
            buf.clear();
            buf.resize(len, 0.0);
            buf
        }
        None => {
            let capacity = 1usize << class;
            debug!(class, capacity, "scratch pool: allocating new buffer");
            let mut buf = Vec::with_capacity(capacity);
            buf.resize(len, 0.0);
            buf
        }
    }
}

fn return_pooled(buf: Vec<f64>) {
    let capacity = buf.capacity();
    let bytes = capacity.saturating_mul(std::mem::size_of::<f64>());
    if capacity == 0 || bytes > MAX_POOLED_BYTES || !capacity.is_power_of_two() {
        return;
    }
    let class = capacity.trailing_zeros() as usize;
    // Thread teardown may have destroyed the pool already; the buffer is then
    // simply freed.
    let _ = SCRATCH_POOL.try_with(|pool| {
        let mut pool = pool.borrow_mut();
        if pool.len() <= class {
            pool.resize_with(class + 1, Vec::new);
        }
        if pool[class].len() < MAX_POOL_PER_CLASS {
            pool[class].push(buf);
        }
    });
}

/// A zero-initialised `f64` buffer borrowed from the calling thread's pool.
#[derive(Debug)]
pub struct ScratchBuffer {
    buf: Vec<f64>,
}

impl ScratchBuffer {
    /// Borrow a buffer of `len` zeros.
    pub fn zeroed(len: usize) -> Self {
        Self {
            buf: take_pooled(len),
        }
    }
}

impl Deref for ScratchBuffer {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.buf
    }
}

impl DerefMut for ScratchBuffer {
    fn deref_mut(&mut self) -> &mut [f64] {
        &mut self.buf
    }
}

impl Drop for ScratchBuffer {
    fn drop(&mut self) {
        return_pooled(std::mem::take(&mut self.buf));
    }
}

/// A contiguous stand-in for a strided vector, flushed back on drop.
///
/// The buffer starts as the target scaled by `beta`: `beta == 1` copies it,
/// `beta == 0` stages zeros without reading, so NaN or Inf there does not
/// survive.
pub struct BufferView<'a> {
    target: *mut f64,
    stride: isize,
    buf: ScratchBuffer,
    _marker: PhantomData<&'a mut f64>,
}

impl<'a> BufferView<'a> {
    /// Stage `beta * target` for the lifetime of the returned guard.
    pub fn new(target: &'a mut VectorViewMut<'_, f64>, beta: f64) -> Self {
        let idx = target.indice();
        unsafe { Self::from_raw(target.as_mut_ptr(), idx, beta) }
    }

    /// # Safety
    /// `target + i * idx.stride_a` must be valid for reads and writes for
    /// `i < idx.len` during `'a`, and not accessed elsewhere meanwhile.
    pub(crate) unsafe fn from_raw(target: *mut f64, idx: Indice1, beta: f64) -> Self {
        let mut buf = ScratchBuffer::zeroed(idx.len);
        if beta != 0.0 {
            for (i, b) in buf.iter_mut().enumerate() {
                let v = *target.offset(i as isize * idx.stride_a);
                *b = if beta == 1.0 { v } else { beta * v };
            }
        }
        Self {
            target,
            stride: idx.stride_a,
            buf,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.buf
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.buf
    }

    #[inline]
    pub(crate) fn as_mut_ptr(&mut self) -> *mut f64 {
        self.buf.as_mut_ptr()
    }
}

impl Drop for BufferView<'_> {
    fn drop(&mut self) {
        for (i, &b) in self.buf.iter().enumerate() {
            // SAFETY: guaranteed by the constructor's contract.
            unsafe { *self.target.offset(i as isize * self.stride) = b };
        }
    }
}

#[cfg(test)]
fn pooled_count(class: usize) -> usize {
    SCRATCH_POOL.with(|pool| pool.borrow().get(class).map_or(0, |v| v.len()))
}
