//! Loop ordering.

use smallvec::SmallVec;

/// Axis order for a multi-operand loop nest, outermost first.
///
/// Axes of length <= 1 are dropped. The remaining axes are sorted by
/// descending destination stride magnitude (operand 0), so the innermost loop
/// walks the destination with its smallest stride. Ties fall back to the sum
/// of the source stride magnitudes, then to axis position.
pub(crate) fn compute_order(dims: &[usize], strides_list: &[&[isize]]) -> SmallVec<[usize; 8]> {
    let mut order: SmallVec<[usize; 8]> = (0..dims.len()).filter(|&d| dims[d] > 1).collect();
    order.sort_by(|&a, &b| {
        dest_score(b, strides_list)
            .cmp(&dest_score(a, strides_list))
            .then_with(|| source_score(b, strides_list).cmp(&source_score(a, strides_list)))
            .then_with(|| a.cmp(&b))
    });
    order
}

fn dest_score(dim: usize, strides_list: &[&[isize]]) -> usize {
    strides_list.first().map_or(0, |s| s[dim].unsigned_abs())
}

fn source_score(dim: usize, strides_list: &[&[isize]]) -> usize {
    strides_list
        .iter()
        .skip(1)
        .fold(0usize, |acc, s| acc.saturating_add(s[dim].unsigned_abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_destination_keeps_natural_order() {
        let dst = [4isize, 1];
        let order = compute_order(&[3, 4], &[&dst]);
        assert_eq!(order.as_slice(), &[0, 1]);
    }

    #[test]
    fn test_col_major_destination_reverses() {
        let dst = [1isize, 3];
        let src = [4isize, 1];
        let order = compute_order(&[3, 4], &[&dst, &src]);
        assert_eq!(order.as_slice(), &[1, 0]);
    }

    #[test]
    fn test_size_one_axes_dropped() {
        let dst = [12isize, 4, 1];
        let order = compute_order(&[2, 1, 4], &[&dst]);
        assert_eq!(order.as_slice(), &[0, 2]);
    }

    #[test]
    fn test_negative_strides_use_magnitude() {
        let dst = [-1isize, 8];
        let order = compute_order(&[8, 3], &[&dst]);
        assert_eq!(order.as_slice(), &[1, 0]);
    }

    #[test]
    fn test_source_breaks_ties() {
        // Broadcast destination axis: equal dest strides, source decides.
        let dst = [0isize, 0];
        let src = [1isize, 5];
        let order = compute_order(&[5, 3], &[&dst, &src]);
        assert_eq!(order.as_slice(), &[1, 0]);
    }
}
