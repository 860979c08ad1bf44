//! Register-tile kernels.
//!
//! A tile is the `mr x nr` outer-product sum of one packed `A` strip and one
//! packed `B` strip over the current depth. Common shapes are compiled with
//! constant trip counts so the accumulator block stays in registers; every
//! other shape goes through a bounded dynamic kernel.

use super::blocking::MAX_REGISTER_BLOCK;
use crate::layout::Uplo;
use crate::matrix::MatMut;

/// The part of `C` one tile updates.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TileTarget {
    /// `rows <= mr`, `cols <= nr` sub-block of `C`.
    pub(crate) c: MatMut,
    /// Set only when the tile straddles the diagonal of a masked product.
    pub(crate) mask: Option<Uplo>,
    /// Unscaled sums of the earlier depth slabs, shaped like `c`. Required
    /// unless the slab is both first and last.
    pub(crate) carry: Option<MatMut>,
}

/// How one depth slab contributes to `C`.
///
/// A tile starts from zero on the first slab and from its carried sums
/// otherwise. On the last slab it writes `beta * c + alpha * acc`, on any
/// other it hands the raw sums on. Every element of `C` is therefore the
/// same left-to-right sum over the full depth, whatever the slab size.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Update {
    pub(crate) alpha: f64,
    pub(crate) beta: f64,
    pub(crate) first: bool,
    pub(crate) last: bool,
}

/// Visit `(i, j)` for every element of the tile inside its mask.
#[inline(always)]
fn for_each_masked(t: &TileTarget, mut f: impl FnMut(usize, usize)) {
    let c = t.c;
    for j in 0..c.cols {
        for i in 0..c.rows {
            if let Some(uplo) = t.mask {
                if !uplo.contains(i, j, c.diag_offset) {
                    continue;
                }
            }
            f(i, j);
        }
    }
}

#[inline(always)]
unsafe fn load<const R: usize, const C: usize>(up: Update, t: &TileTarget) -> [[f64; C]; R] {
    let mut acc = [[0.0f64; C]; R];
    if !up.first {
        if let Some(s) = t.carry {
            for_each_masked(t, |i, j| acc[i][j] = *s.ptr_at(i, j));
        }
    }
    acc
}

#[inline(always)]
unsafe fn finish(up: Update, t: TileTarget, acc: impl Fn(usize, usize) -> f64) {
    debug_assert!(up.last || t.carry.is_some());
    match t.carry {
        Some(s) if !up.last => for_each_masked(&t, |i, j| *s.ptr_at(i, j) = acc(i, j)),
        _ => for_each_masked(&t, |i, j| {
            let p = t.c.ptr_at(i, j);
            let v = up.alpha * acc(i, j);
            *p = if up.beta == 0.0 { v } else { up.beta * *p + v };
        }),
    }
}

#[inline(always)]
fn tile<const MR: usize, const NR: usize>(
    depth: usize,
    a: &[f64],
    b: &[f64],
    mut acc: [[f64; NR]; MR],
) -> [[f64; NR]; MR] {
    for (ap, bp) in a.chunks_exact(MR).zip(b.chunks_exact(NR)).take(depth) {
        for r in 0..MR {
            let av = ap[r];
            for c in 0..NR {
                acc[r][c] += av * bp[c];
            }
        }
    }
    acc
}

type DynTile = [[f64; MAX_REGISTER_BLOCK]; MAX_REGISTER_BLOCK];

#[inline(always)]
fn tile_dyn(mr: usize, nr: usize, depth: usize, a: &[f64], b: &[f64], mut acc: DynTile) -> DynTile {
    for (ap, bp) in a.chunks_exact(mr).zip(b.chunks_exact(nr)).take(depth) {
        for r in 0..mr {
            let av = ap[r];
            for c in 0..nr {
                acc[r][c] += av * bp[c];
            }
        }
    }
    acc
}

/// Run one depth slab of a tile from packed strips.
///
/// # Safety
/// `a` holds `depth * mr` and `b` holds `depth * nr` packed values; `t.c`
/// (and `t.carry`, when set) is a valid, exclusively borrowed block of at
/// most `mr x nr` elements.
#[inline(always)]
pub(crate) unsafe fn compute(
    mr: usize,
    nr: usize,
    depth: usize,
    a: &[f64],
    b: &[f64],
    up: Update,
    t: TileTarget,
) {
    debug_assert!(t.c.rows <= mr && t.c.cols <= nr);
    macro_rules! fixed {
        ($mr:literal, $nr:literal) => {{
            let acc = tile::<$mr, $nr>(depth, a, b, load(up, &t));
            finish(up, t, |i, j| acc[i][j]);
        }};
    }
    match (mr, nr) {
        (4, 4) => fixed!(4, 4),
        (4, 8) => fixed!(4, 8),
        (8, 4) => fixed!(8, 4),
        (6, 8) => fixed!(6, 8),
        (8, 8) => fixed!(8, 8),
        _ => {
            let acc = tile_dyn(mr, nr, depth, a, b, load(up, &t));
            finish(up, t, |i, j| acc[i][j]);
        }
    }
}
