use approx::assert_relative_eq;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;
use strided_blas::level3::{gemm, gemm_with_blocking, gemmt};
use strided_blas::{
    level1, level2, BlockingFactors, Diag, MatrixView, MatrixViewMut, StridedError, Trans, Uplo,
    VectorView, VectorViewMut,
};

fn random(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.sample(StandardNormal)).collect()
}

fn integers(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(-8i32..=8) as f64).collect()
}

fn naive(a: &MatrixView<'_>, b: &MatrixView<'_>) -> Vec<f64> {
    let (m, n, k) = (a.rows(), b.cols(), a.cols());
    let mut out = vec![0.0; m * n];
    for i in 0..m {
        for j in 0..n {
            out[i * n + j] = (0..k).map(|p| a.get(i, p) * b.get(p, j)).sum();
        }
    }
    out
}

// ----------------------------------------------------------------------------
// Worked examples
// ----------------------------------------------------------------------------

#[test]
fn test_gemv_worked_example() {
    let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    let a = MatrixView::row_major(&a, 3, 2).unwrap();
    let x = [1.0, -1.0];
    let mut y = [f64::NAN; 3];
    level2::gemv(
        Trans::No,
        1.0,
        &a,
        &VectorView::contiguous(&x),
        0.0,
        &mut VectorViewMut::contiguous(&mut y),
    )
    .unwrap();
    assert_eq!(y, [-1.0, -1.0, -1.0]);
}

#[test]
fn test_dot_worked_example() {
    let x = [1.0, 2.0, 3.0];
    let y = [4.0, 5.0, 6.0];
    let d = level1::dot(&VectorView::contiguous(&x), &VectorView::contiguous(&y)).unwrap();
    assert_eq!(d, 32.0);
}

#[test]
fn test_trsv_worked_example() {
    let a = [2.0, 0.0, 3.0, 4.0];
    let a = MatrixView::row_major(&a, 2, 2).unwrap();
    let mut b = [4.0, 11.0];
    level2::trsv(
        Uplo::Lower,
        Trans::No,
        Diag::NonUnit,
        &a,
        &mut VectorViewMut::contiguous(&mut b),
    )
    .unwrap();
    assert_eq!(b, [2.0, 1.25]);
}

// ----------------------------------------------------------------------------
// Level 1 identities
// ----------------------------------------------------------------------------

#[test]
fn test_scale_one_is_noop_and_zero_clears_nan() {
    let mut x = [f64::NAN, 1.0, -0.0, f64::INFINITY];
    level1::scale(1.0, &mut VectorViewMut::contiguous(&mut x)).unwrap();
    assert!(x[0].is_nan());
    assert_eq!(x[3], f64::INFINITY);
    level1::scale(0.0, &mut VectorViewMut::contiguous(&mut x)).unwrap();
    assert_eq!(x, [0.0; 4]);
}

#[test]
fn test_axpy_zero_leaves_y() {
    let x = [f64::NAN, f64::INFINITY];
    let mut y = [1.0, 2.0];
    level1::axpy(0.0, &VectorView::contiguous(&x), &mut VectorViewMut::contiguous(&mut y)).unwrap();
    assert_eq!(y, [1.0, 2.0]);
}

#[test]
fn test_copy_is_idempotent() {
    let x = random(257, 1);
    let mut buf = vec![0.0; 2 * 257];
    let mut y = VectorViewMut::new(&mut buf, 1, 257, 2).unwrap();
    level1::copy(&VectorView::contiguous(&x), &mut y).unwrap();
    let once = y.to_vec();
    level1::copy(&VectorView::contiguous(&x), &mut y).unwrap();
    assert_eq!(y.to_vec(), once);
    assert_eq!(once, x);
}

#[test]
fn test_inv_scale_rejects_before_writing() {
    let mut x = [1.0, 2.0];
    for bad in [0.0, f64::NAN, f64::INFINITY] {
        let err = level1::inv_scale(bad, &mut VectorViewMut::contiguous(&mut x)).unwrap_err();
        assert!(matches!(err, StridedError::InvalidDivisor(_)));
    }
    assert_eq!(x, [1.0, 2.0]);
}

#[test]
fn test_dot_is_symmetric() {
    for n in [0, 1, 5, 64, 1001] {
        let x = random(n, 2);
        let yb = random(3 * n, 3);
        let xv = VectorView::contiguous(&x);
        let yv = VectorView::new(&yb, 0, n, 3).unwrap();
        let xy = level1::dot(&xv, &yv).unwrap();
        let yx = level1::dot(&yv, &xv).unwrap();
        assert_relative_eq!(xy, yx, epsilon = 1e-12 * n.max(1) as f64);
    }
}

#[test]
fn test_nrm2_survives_extreme_magnitudes() {
    let x = [3e300, 4e300];
    assert_relative_eq!(level1::nrm2(&VectorView::contiguous(&x)), 5e300, max_relative = 1e-15);
    let x = [3e-300, 4e-300];
    assert_relative_eq!(level1::nrm2(&VectorView::contiguous(&x)), 5e-300, max_relative = 1e-15);
}

// ----------------------------------------------------------------------------
// Level 3 properties
// ----------------------------------------------------------------------------

#[test]
fn test_gemm_matches_product_on_views() {
    let (m, n, k) = (67, 45, 130);
    let ad = random(m * k, 4);
    // B stored transposed and padded: a k x n window of an n x (k + 3) buffer.
    let bd = random(n * (k + 3), 5);
    let a = MatrixView::row_major(&ad, m, k).unwrap();
    let b = MatrixView::row_major(&bd, n, k + 3).unwrap().sub(0, 2, n, k).unwrap().t();
    let expect = naive(&a, &b);
    let mut cd = random(m * n, 6);
    let c0 = cd.clone();
    let mut c = MatrixViewMut::col_major(&mut cd, m, n).unwrap();
    gemm(Trans::No, Trans::No, 0.5, &a, &b, -2.0, &mut c).unwrap();
    let got = c.to_row_major_vec();
    let c0 = MatrixView::col_major(&c0, m, n).unwrap().to_row_major_vec();
    let tol = k as f64 * f64::EPSILON;
    for ((g, e), c) in got.iter().zip(&expect).zip(&c0) {
        assert_relative_eq!(*g, 0.5 * e - 2.0 * c, epsilon = 100.0 * tol, max_relative = 10.0 * tol);
    }
}

#[test]
fn test_gemm_is_blocking_invariant() {
    let (m, n, k) = (53, 61, 97);
    let ad = integers(m * k, 7);
    let bd = integers(k * n, 8);
    let a = MatrixView::col_major(&ad, m, k).unwrap();
    let b = MatrixView::row_major(&bd, k, n).unwrap();
    let configs = [
        BlockingFactors::DEFAULT,
        BlockingFactors::new(16, 12, 7, 4, 4).unwrap(),
        BlockingFactors::new(18, 16, 32, 6, 8).unwrap().with_column_major(false),
        BlockingFactors::new(5, 3, 1, 5, 3).unwrap(),
    ];
    let mut results = Vec::new();
    for bf in &configs {
        let mut cd = vec![1.0; m * n];
        let mut c = MatrixViewMut::row_major(&mut cd, m, n).unwrap();
        gemm_with_blocking(Trans::No, Trans::No, 2.0, &a, &b, 3.0, &mut c, bf).unwrap();
        results.push(cd);
    }
    for r in &results[1..] {
        assert_eq!(r, &results[0]);
    }
    let expect: Vec<f64> = naive(&a, &b).into_iter().map(|v| 2.0 * v + 3.0).collect();
    assert_eq!(results[0], expect);
}

#[test]
fn test_gemm_blocking_invariant_on_real_data() {
    let (m, n, k) = (37, 29, 101);
    let ad = random(m * k, 11);
    let bd = random(k * n, 12);
    let c0 = random(m * n, 13);
    let a = MatrixView::row_major(&ad, m, k).unwrap();
    let b = MatrixView::col_major(&bd, k, n).unwrap();
    let configs = [
        BlockingFactors::new(64, 64, 128, 4, 4).unwrap(),
        BlockingFactors::new(16, 12, 7, 4, 4).unwrap(),
        BlockingFactors::new(18, 16, 32, 6, 8).unwrap().with_column_major(false),
        BlockingFactors::new(5, 3, 1, 5, 3).unwrap(),
    ];
    for beta in [0.0, 0.75] {
        let results: Vec<Vec<f64>> = configs
            .iter()
            .map(|bf| {
                let mut cd = c0.clone();
                let mut c = MatrixViewMut::col_major(&mut cd, m, n).unwrap();
                gemm_with_blocking(Trans::No, Trans::No, -1.25, &a, &b, beta, &mut c, bf).unwrap();
                cd
            })
            .collect();
        for r in &results[1..] {
            let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
            assert_eq!(bits(r), bits(&results[0]), "beta {beta}");
        }
    }
}

#[test]
fn test_gemmt_lower_matches_gemm() {
    let (n, k) = (41, 23);
    let ad = random(n * k, 9);
    let bd = random(k * n, 10);
    let a = MatrixView::row_major(&ad, n, k).unwrap();
    let b = MatrixView::row_major(&bd, k, n).unwrap();

    let mut full = vec![0.0; n * n];
    gemm(Trans::No, Trans::No, 1.0, &a, &b, 0.0, &mut MatrixViewMut::row_major(&mut full, n, n).unwrap())
        .unwrap();

    let sentinel = -12345.0;
    let mut tri = vec![sentinel; n * n];
    gemmt(
        Uplo::Lower,
        Trans::No,
        Trans::No,
        1.0,
        &a,
        &b,
        0.0,
        &mut MatrixViewMut::row_major(&mut tri, n, n).unwrap(),
    )
    .unwrap();

    for i in 0..n {
        for j in 0..n {
            if i >= j {
                assert_eq!(tri[i * n + j], full[i * n + j]);
            } else {
                assert_eq!(tri[i * n + j], sentinel);
            }
        }
    }
}

#[test]
fn test_gemm_empty_and_zero_alpha() {
    let ad = [f64::NAN; 6];
    let a = MatrixView::row_major(&ad, 2, 3).unwrap();
    let b = MatrixView::row_major(&ad, 3, 2).unwrap();
    let mut cd = [1.0, 2.0, 3.0, 4.0];
    let mut c = MatrixViewMut::row_major(&mut cd, 2, 2).unwrap();
    gemm(Trans::No, Trans::No, 0.0, &a, &b, 2.0, &mut c).unwrap();
    assert_eq!(cd, [2.0, 4.0, 6.0, 8.0]);

    let empty: [f64; 0] = [];
    let a = MatrixView::row_major(&empty, 0, 3).unwrap();
    let mut cd: [f64; 0] = [];
    let mut c = MatrixViewMut::row_major(&mut cd, 0, 2).unwrap();
    gemm(Trans::No, Trans::No, 1.0, &a, &b, 0.0, &mut c).unwrap();
}
