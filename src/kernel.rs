//! Loop drivers.
//!
//! [`build_plan`] turns operand layouts into an ordered, fused loop nest;
//! [`for_each_inner`] walks that nest and hands every innermost run to a
//! callback as `(offsets, len, inner_strides)`, with explicit 1-D and 2-D
//! specialisations before falling back to recursion. [`strided_loop`] is the
//! 4-way unrolled element loop used inside such runs.

use smallvec::{smallvec, SmallVec};

use crate::fuse::{fuse_dims, SVec};
use crate::order::compute_order;
use crate::view::Continuity;
use crate::PREFERRED_UNROLL;

/// Ordered and fused loop nest, outermost axis first.
///
/// `strides[k]` belongs to operand `k`; operand 0 is the destination.
/// A plan always has at least one axis.
#[derive(Debug, Clone)]
pub(crate) struct LoopPlan {
    pub(crate) dims: SVec<usize>,
    pub(crate) strides: SmallVec<[SVec<isize>; 3]>,
}

impl LoopPlan {
    #[inline]
    pub(crate) fn rank(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub(crate) fn total(&self) -> usize {
        self.dims.iter().product()
    }

    /// Whether every operand walks the innermost axis with unit stride.
    pub(crate) fn inner_unit(&self) -> bool {
        self.strides.iter().all(|s| s[s.len() - 1] == 1)
    }
}

/// Order then fuse the axes of `dims` for the given operands.
///
/// Operands that are all dense in the same order collapse straight to one
/// unit-stride run.
pub(crate) fn build_plan(dims: &[usize], strides_list: &[&[isize]]) -> LoopPlan {
    let class = Continuity::of(dims, strides_list[0]);
    if class.is_dense() && strides_list[1..].iter().all(|s| Continuity::of(dims, s) == class) {
        return LoopPlan {
            dims: smallvec![dims.iter().product::<usize>()],
            strides: strides_list.iter().map(|_| smallvec![1]).collect(),
        };
    }
    let order = compute_order(dims, strides_list);
    if order.is_empty() {
        // Every axis has length one: a single element.
        return LoopPlan {
            dims: smallvec![1],
            strides: strides_list.iter().map(|_| smallvec![1]).collect(),
        };
    }
    let ordered_dims: SVec<usize> = order.iter().map(|&d| dims[d]).collect();
    let ordered_strides: SmallVec<[SVec<isize>; 3]> = strides_list
        .iter()
        .map(|s| order.iter().map(|&d| s[d]).collect())
        .collect();
    let (dims, strides) = fuse_dims(&ordered_dims, &ordered_strides);
    LoopPlan { dims, strides }
}

/// Visit every innermost run of a loop nest starting at `offsets`.
#[inline]
pub(crate) fn for_each_inner<F>(dims: &[usize], strides: &[SVec<isize>], offsets: &[isize], mut f: F)
where
    F: FnMut(&[isize], usize, &[isize]),
{
    let rank = dims.len();
    debug_assert!(rank >= 1);
    let inner: SmallVec<[isize; 3]> = strides.iter().map(|s| s[rank - 1]).collect();
    let mut offs: SmallVec<[isize; 3]> = SmallVec::from_slice(offsets);

    match rank {
        1 => f(&offs, dims[0], &inner),
        2 => {
            for _ in 0..dims[0] {
                f(&offs, dims[1], &inner);
                for (o, s) in offs.iter_mut().zip(strides.iter()) {
                    *o += s[0];
                }
            }
        }
        _ => recurse(dims, strides, 0, &mut offs, &inner, &mut f),
    }
}

fn recurse<F>(
    dims: &[usize],
    strides: &[SVec<isize>],
    level: usize,
    offsets: &mut SmallVec<[isize; 3]>,
    inner: &[isize],
    f: &mut F,
) where
    F: FnMut(&[isize], usize, &[isize]),
{
    let last = dims.len() - 1;
    if level == last {
        f(offsets, dims[last], inner);
        return;
    }
    for _ in 0..dims[level] {
        recurse(dims, strides, level + 1, offsets, inner, f);
        for (o, s) in offsets.iter_mut().zip(strides.iter()) {
            *o += s[level];
        }
    }
    for (o, s) in offsets.iter_mut().zip(strides.iter()) {
        *o -= dims[level] as isize * s[level];
    }
}

#[inline(always)]
fn step<const N: usize>(ptrs: [*mut f64; N], strides: [isize; N], k: isize) -> [*mut f64; N] {
    std::array::from_fn(|j| ptrs[j].wrapping_offset(strides[j] * k))
}

/// Call `f` with the element pointers of `len` consecutive positions, four at
/// a time.
///
/// # Safety
/// Each `ptrs[j] + i * strides[j]` for `i < len` must be valid for the access
/// `f` performs.
#[inline(always)]
pub(crate) unsafe fn strided_loop<const N: usize>(
    mut ptrs: [*mut f64; N],
    strides: [isize; N],
    len: usize,
    mut f: impl FnMut([*mut f64; N]),
) {
    let mut i = 0usize;
    while i + PREFERRED_UNROLL <= len {
        f(ptrs);
        f(step(ptrs, strides, 1));
        f(step(ptrs, strides, 2));
        f(step(ptrs, strides, 3));
        ptrs = step(ptrs, strides, PREFERRED_UNROLL as isize);
        i += PREFERRED_UNROLL;
    }
    while i < len {
        f(ptrs);
        ptrs = step(ptrs, strides, 1);
        i += 1;
    }
}
