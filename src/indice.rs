//! Loop descriptors consumed by every inner kernel.
//!
//! An indice bundles a trip count with one stride per operand. Kernels
//! receive an indice plus raw base pointers, so the per-call cost of driving
//! a loop is a handful of integers on the stack; views are validated once,
//! higher up, and never re-checked inside a kernel.

/// One-operand loop: `len` elements, operand `a` advancing by `stride_a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indice1 {
    pub len: usize,
    pub stride_a: isize,
}

/// Two-operand loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indice2 {
    pub len: usize,
    pub stride_a: isize,
    pub stride_b: isize,
}

/// Three-operand loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indice3 {
    pub len: usize,
    pub stride_a: isize,
    pub stride_b: isize,
    pub stride_c: isize,
}

impl Indice1 {
    #[inline(always)]
    pub const fn new(len: usize, stride_a: isize) -> Self {
        Self { len, stride_a }
    }

    /// True when the operand is traversed with unit stride.
    #[inline(always)]
    pub const fn is_unit(&self) -> bool {
        self.stride_a == 1
    }

    /// Same strides, different trip count.
    #[inline(always)]
    pub const fn with_len(self, len: usize) -> Self {
        Self { len, ..self }
    }
}

impl Indice2 {
    #[inline(always)]
    pub const fn new(len: usize, stride_a: isize, stride_b: isize) -> Self {
        Self {
            len,
            stride_a,
            stride_b,
        }
    }

    #[inline(always)]
    pub const fn is_unit(&self) -> bool {
        self.stride_a == 1 && self.stride_b == 1
    }

    #[inline(always)]
    pub const fn with_len(self, len: usize) -> Self {
        Self { len, ..self }
    }

    /// Exchange the roles of the two operands.
    #[inline(always)]
    pub const fn swapped(self) -> Self {
        Self {
            len: self.len,
            stride_a: self.stride_b,
            stride_b: self.stride_a,
        }
    }

    #[inline(always)]
    pub const fn a(&self) -> Indice1 {
        Indice1::new(self.len, self.stride_a)
    }

    #[inline(always)]
    pub const fn b(&self) -> Indice1 {
        Indice1::new(self.len, self.stride_b)
    }
}

impl Indice3 {
    #[inline(always)]
    pub const fn new(len: usize, stride_a: isize, stride_b: isize, stride_c: isize) -> Self {
        Self {
            len,
            stride_a,
            stride_b,
            stride_c,
        }
    }

    #[inline(always)]
    pub const fn is_unit(&self) -> bool {
        self.stride_a == 1 && self.stride_b == 1 && self.stride_c == 1
    }

    #[inline(always)]
    pub const fn with_len(self, len: usize) -> Self {
        Self { len, ..self }
    }

    /// Drop operand `b`, keeping `a` and `c`.
    #[inline(always)]
    pub const fn ac(&self) -> Indice2 {
        Indice2::new(self.len, self.stride_a, self.stride_c)
    }

    /// Drop operand `a`, keeping `b` and `c`.
    #[inline(always)]
    pub const fn bc(&self) -> Indice2 {
        Indice2::new(self.len, self.stride_b, self.stride_c)
    }

    #[inline(always)]
    pub const fn ab(&self) -> Indice2 {
        Indice2::new(self.len, self.stride_a, self.stride_b)
    }
}
