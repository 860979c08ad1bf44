//! Dense linear-algebra engine over strided views.
//!
//! The crate is organised bottom-up:
//!
//! - [`Indice1`], [`Indice2`], [`Indice3`]: loop descriptors (length + per-operand stride)
//!   that every inner kernel consumes.
//! - [`VectorView`], [`MatrixView`], [`StridedView`] and their `Mut` twins: zero-copy
//!   windows over flat buffers. Slicing, transposition and diagonal extraction are O(1).
//! - [`operator`]: capability-tagged element operators. Each exposes a scalar form and,
//!   when `VECTORIZED` is set, a SIMD form the dispatcher may use on unit-stride data.
//! - [`ufunc`]: the generic dispatcher (`apply`, `map`, `map_into`, `combine`, `reduce`).
//!   It orders and fuses dimensions, picks a SIMD or strided inner loop, and fans the
//!   outermost dimension out over rayon workers for large operands.
//! - [`fused`]: hand-blocked Level-1/Level-2 micro-kernels (`axpy2`, `dot`, `dotaxpy`,
//!   `axpyf`, `dotxf`, ...), working on raw indices.
//! - [`gemm`]: the packed, cache-blocked multiply engine with optional triangular
//!   output masking.
//! - [`level1`], [`level2`], [`level3`]: the validated BLAS-style surface.
//!
//! # Example
//!
//! ```rust
//! use strided_blas::{level2, MatrixView, Trans, VectorView, VectorViewMut};
//!
//! let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
//! let a = MatrixView::row_major(&a, 3, 2).unwrap();
//! let x = [1.0, -1.0];
//! let mut y = [0.0; 3];
//!
//! level2::gemv(
//!     Trans::No,
//!     1.0,
//!     &a,
//!     &VectorView::contiguous(&x),
//!     0.0,
//!     &mut VectorViewMut::contiguous(&mut y),
//! )
//! .unwrap();
//! assert_eq!(y, [-1.0, -1.0, -1.0]);
//! ```
//!
//! # Features
//!
//! - `parallel` (default): outer-dimension fan-out in the dispatcher and column-block
//!   parallelism in the blocked multiply, via rayon.
//! - `simd` (default): runtime-dispatched vector paths via pulp. Without it every
//!   operator runs through its scalar form.

mod fuse;
mod indice;
mod kernel;
mod matrix;
mod maybe_sync;
mod order;
mod threading;
mod vector;
mod view;

pub mod fused;
pub mod gemm;
pub mod layout;
pub mod level1;
pub mod level2;
pub mod level3;
pub mod operator;
pub mod scratch;
pub mod simd;
pub mod ufunc;

pub use gemm::BlockingFactors;
pub use indice::{Indice1, Indice2, Indice3};
pub use layout::{Diag, Side, Trans, Uplo};
pub use matrix::{MatrixView, MatrixViewMut};
pub use maybe_sync::MaybeSync;
pub use operator::{Aggregator, BinaryOp, TernaryOp, UnaryOp};
pub use ufunc::{Operand, OperandMut};
pub use vector::{VectorView, VectorViewMut};
pub use view::{col_major_strides, row_major_strides, Continuity, StridedArray, StridedView, StridedViewMut};

/// Cache line size in bytes.
pub const CACHE_LINE_SIZE: usize = 64;

/// Unrolling factor of every inner loop, scalar and SIMD alike.
pub const PREFERRED_UNROLL: usize = 4;

/// Panel width of the fused row/column kernels on machines with fewer than
/// eight `f64` lanes; see [`simd::preferred_panel_width`].
pub const PREFERRED_PANEL_WIDTH: usize = 4;

/// Minimum number of elements before the dispatcher fans work out to threads.
pub const MIN_THREAD_LENGTH: usize = 1 << 15;

/// Errors raised by view construction and by the numeric entry points.
///
/// Every entry point validates its operands before the first write, so an
/// `Err` always means the outputs are untouched.
#[derive(Debug, thiserror::Error)]
pub enum StridedError {
    /// Operand shapes are incompatible for the operation.
    #[error("{op}: shape mismatch, expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        op: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// Array ranks do not match.
    #[error("rank mismatch: {0} vs {1}")]
    RankMismatch(usize, usize),

    /// Invalid axis index for the given array rank.
    #[error("invalid axis {axis} for rank {rank}")]
    InvalidAxis { axis: usize, rank: usize },

    /// Matrix is not square when a square matrix was required.
    #[error("non-square matrix: rows={rows}, cols={cols}")]
    NonSquare { rows: usize, cols: usize },

    /// Zero stride is not allowed for the specified dimension.
    #[error("invalid stride 0 for dim {dim}")]
    ZeroStride { dim: usize },

    /// Stride array length doesn't match dimensions.
    #[error("stride and dims length mismatch")]
    StrideLengthMismatch,

    /// Integer overflow while computing an element offset.
    #[error("offset overflow while computing pointer")]
    OffsetOverflow,

    /// The view's addressable extent leaves the backing buffer.
    #[error("view addresses element {last} but the buffer holds {len}")]
    OutOfBounds { last: isize, len: usize },

    /// Slicing or row/column selection past the end of a view.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A mutable view would reach the same element through two indices.
    #[error("mutable view addresses the same element more than once")]
    OverlappingView,

    /// Division by zero or by a non-finite value.
    #[error("invalid divisor {0}: must be finite and non-zero")]
    InvalidDivisor(f64),

    /// Blocking factors violate the multiply engine's constraints.
    #[error("invalid blocking factors: {0}")]
    InvalidBlocking(String),
}

/// Result type for strided operations.
pub type Result<T> = std::result::Result<T, StridedError>;

#[inline]
pub(crate) fn shape_mismatch(op: &'static str, expected: &[usize], found: &[usize]) -> StridedError {
    StridedError::ShapeMismatch {
        op,
        expected: expected.to_vec(),
        found: found.to_vec(),
    }
}
