//! BLAS argument flags.

/// Whether an operand enters a product as-is or transposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trans {
    #[default]
    No,
    Yes,
}

/// Triangle of a square matrix that is referenced (or written).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Uplo {
    #[default]
    Upper,
    Lower,
}

/// Whether a triangular matrix has an implicit unit diagonal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Diag {
    #[default]
    NonUnit,
    Unit,
}

/// Side on which a structured matrix multiplies the general operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Side {
    #[default]
    Left,
    Right,
}

impl Trans {
    #[inline]
    pub fn flip(self) -> Self {
        match self {
            Trans::No => Trans::Yes,
            Trans::Yes => Trans::No,
        }
    }
}

impl Uplo {
    /// The triangle seen through a transposed view of the same storage.
    #[inline]
    pub fn flip(self) -> Self {
        match self {
            Uplo::Upper => Uplo::Lower,
            Uplo::Lower => Uplo::Upper,
        }
    }

    /// Whether element `(i, j)` lies in this triangle of a matrix whose
    /// diagonal is shifted right by `diag_offset` columns.
    #[inline(always)]
    pub(crate) fn contains(self, i: usize, j: usize, diag_offset: isize) -> bool {
        let i = i as isize;
        let j = j as isize + diag_offset;
        match self {
            Uplo::Lower => i >= j,
            Uplo::Upper => i <= j,
        }
    }
}

impl Side {
    #[inline]
    pub fn flip(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}
