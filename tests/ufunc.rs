use approx::assert_relative_eq;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;
use strided_blas::operator::{Abs, Add, Axpy, Div, Identity, MaxNan, Mul, Neg, Scale, Sum};
use strided_blas::ufunc::{apply, combine, combine_scalar, map, map_into, reduce};
use strided_blas::{MatrixView, MatrixViewMut, StridedError, StridedView, VectorView, VectorViewMut};

const SPECIALS: [f64; 10] = [
    0.0,
    -0.0,
    f64::NAN,
    f64::INFINITY,
    f64::NEG_INFINITY,
    5e-324,
    -2.2e-308,
    1.5,
    -3.25,
    1e300,
];

fn same_bits(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
}

fn assert_same_bits(a: &[f64], b: &[f64]) {
    assert_eq!(a.len(), b.len());
    for (i, (&x, &y)) in a.iter().zip(b).enumerate() {
        assert!(same_bits(x, y), "element {i}: {x:e} vs {y:e}");
    }
}

/// Specials interleaved with normal samples.
fn mixed(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            if i % 3 == 0 {
                SPECIALS[(i / 3) % SPECIALS.len()]
            } else {
                rng.sample(StandardNormal)
            }
        })
        .collect()
}

/// `data` laid out with stride 3 after one element of padding.
fn spread(data: &[f64]) -> Vec<f64> {
    let mut buf = vec![f64::NAN; 1 + 3 * data.len()];
    for (i, &v) in data.iter().enumerate() {
        buf[1 + 3 * i] = v;
    }
    buf
}

fn gather(buf: &[f64], n: usize) -> Vec<f64> {
    (0..n).map(|i| buf[1 + 3 * i]).collect()
}

// Sizes below and above the threading threshold.
const SIZES: [usize; 4] = [0, 7, 1031, 70_001];

#[test]
fn test_map_into_contiguous_matches_strided() {
    for n in SIZES {
        let src = mixed(n, 1);
        let src_spread = spread(&src);
        let contiguous = VectorView::contiguous(&src);
        let strided = VectorView::new(&src_spread, 1, n, 3).unwrap();

        macro_rules! check {
            ($op:expr) => {{
                let mut fast = vec![0.0; n];
                map_into(&contiguous, &mut VectorViewMut::contiguous(&mut fast), &$op).unwrap();
                let mut slow = vec![0.0; 1 + 3 * n];
                let mut dst = VectorViewMut::new(&mut slow, 1, n, 3).unwrap();
                map_into(&strided, &mut dst, &$op).unwrap();
                assert_same_bits(&fast, &gather(&slow, n));
            }};
        }
        check!(Neg);
        check!(Abs);
        check!(Scale(0.5));
        check!(|x: f64| x * x - 1.0);
    }
}

#[test]
fn test_combine_contiguous_matches_strided() {
    for n in SIZES {
        let x = mixed(n, 2);
        let y = mixed(n, 3);
        let x_spread = spread(&x);
        let xc = VectorView::contiguous(&x);
        let xs = VectorView::new(&x_spread, 1, n, 3).unwrap();

        macro_rules! check {
            ($run:expr) => {{
                let mut fast = y.clone();
                $run(&xc, &mut VectorViewMut::contiguous(&mut fast));
                let mut slow = spread(&y);
                $run(&xs, &mut VectorViewMut::new(&mut slow, 1, n, 3).unwrap());
                assert_same_bits(&fast, &gather(&slow, n));
            }};
        }
        check!(|s: &VectorView<'_>, d: &mut VectorViewMut<'_>| combine(s, d, &Add).unwrap());
        check!(|s: &VectorView<'_>, d: &mut VectorViewMut<'_>| combine(s, d, &Mul).unwrap());
        check!(|s: &VectorView<'_>, d: &mut VectorViewMut<'_>| combine(s, d, &Div).unwrap());
        check!(|s: &VectorView<'_>, d: &mut VectorViewMut<'_>| {
            combine_scalar(s, -1.75, d, &Axpy).unwrap()
        });
    }
}

fn normal(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.sample(StandardNormal)).collect()
}

#[test]
fn test_reduce_contiguous_matches_strided() {
    for n in SIZES {
        // Finite data with signed zeros and subnormals, so the sums are real numbers.
        let mut data = normal(n, 4);
        for (i, v) in data.iter_mut().enumerate().step_by(5) {
            *v = [0.0, -0.0, 5e-324, -2.2e-308][(i / 5) % 4];
        }
        let spread_data = spread(&data);
        let contiguous = VectorView::contiguous(&data);
        let strided = VectorView::new(&spread_data, 1, n, 3).unwrap();

        let fast = reduce(&contiguous, &Identity, &Sum);
        let slow = reduce(&strided, &Identity, &Sum);
        assert_eq!(fast.to_bits(), slow.to_bits(), "n = {n}: {fast:e} vs {slow:e}");
        let expect: f64 = data.iter().sum();
        assert_relative_eq!(fast, expect, epsilon = 1e-12 * n.max(1) as f64);

        let fast = reduce(&contiguous, &Abs, &Sum);
        let slow = reduce(&strided, &Abs, &Sum);
        assert_eq!(fast.to_bits(), slow.to_bits());

        let fast = reduce(&contiguous, &|x: f64| x * x, &Sum);
        let slow = reduce(&strided, &|x: f64| x * x, &Sum);
        assert_eq!(fast.to_bits(), slow.to_bits());

        let data = mixed(n, 5);
        let spread_data = spread(&data);
        let fast = reduce(&VectorView::contiguous(&data), &Abs, &MaxNan);
        let slow = reduce(&VectorView::new(&spread_data, 1, n, 3).unwrap(), &Abs, &MaxNan);
        assert!(same_bits(fast, slow));
        if n > 2 {
            assert!(fast.is_nan());
        }
    }
}

#[test]
fn test_matrix_layouts_agree() {
    let (rows, cols) = (37, 29);
    let data = mixed(rows * cols, 5);
    let rm = MatrixView::row_major(&data, rows, cols).unwrap();

    let mut out_rm = vec![0.0; rows * cols];
    map_into(&rm, &mut MatrixViewMut::row_major(&mut out_rm, rows, cols).unwrap(), &Neg).unwrap();

    let mut out_cm = vec![0.0; rows * cols];
    let mut dst = MatrixViewMut::col_major(&mut out_cm, rows, cols).unwrap();
    map_into(&rm, &mut dst, &Neg).unwrap();

    assert_same_bits(&out_rm, &dst.to_row_major_vec());
}

#[test]
fn test_permuted_nd_view() {
    let dims = [4, 5, 6];
    let data: Vec<f64> = (0..120).map(|i| i as f64).collect();
    let v = StridedView::new(&data, &dims, &[30, 6, 1], 0).unwrap();
    let p = v.permute(&[2, 0, 1]).unwrap();
    let sum = reduce(&p, &|x: f64| x, &Sum);
    assert_relative_eq!(sum, (0..120).sum::<usize>() as f64);

    let mut out = vec![0.0; 120];
    let mut dst = strided_blas::StridedViewMut::new(&mut out, p.dims(), &[20, 5, 1], 0).unwrap();
    map_into(&p, &mut dst, &Scale(2.0)).unwrap();
    for k in 0..6 {
        for i in 0..4 {
            for j in 0..5 {
                assert_eq!(out[k * 20 + i * 5 + j], 2.0 * data[i * 30 + j * 6 + k]);
            }
        }
    }
}

#[test]
fn test_apply_and_map_in_place() {
    let mut buf = vec![1.0; 10];
    let mut v = VectorViewMut::new(&mut buf, 0, 5, 2).unwrap();
    apply(&mut v, 4.0, &|x: f64| x.sqrt()).unwrap();
    map(&mut v, &Neg).unwrap();
    assert_eq!(buf, [-2.0, 1.0, -2.0, 1.0, -2.0, 1.0, -2.0, 1.0, -2.0, 1.0]);
}

#[test]
fn test_shape_mismatch_is_reported_before_writing() {
    let src = [1.0; 3];
    let mut dst = [7.0; 4];
    let err = combine(&VectorView::contiguous(&src), &mut VectorViewMut::contiguous(&mut dst), &Add)
        .unwrap_err();
    assert!(matches!(err, StridedError::ShapeMismatch { op: "combine", .. }));
    assert_eq!(dst, [7.0; 4]);
}
