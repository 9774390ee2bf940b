//! Property-based tests using proptest.
//!
//! Each case draws a seed and a shape, builds its matrices from a seeded
//! ChaCha generator and checks an algebraic identity that must hold for
//! every input of that kind.

use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use hmma_la::{EigenSort, MatExpr, Matrix, SMatrix};

fn random_matrix(rng: &mut ChaCha8Rng, rows: usize, cols: usize) -> Matrix<f64> {
    let data: Vec<f64> = (0..rows * cols).map(|_| rng.gen_range(-1.0..1.0)).collect();
    Matrix::from_column_major(rows, cols, data).unwrap()
}

/// Strictly diagonally dominant, hence invertible.
fn well_conditioned(rng: &mut ChaCha8Rng, n: usize) -> Matrix<f64> {
    let mut a = random_matrix(rng, n, n);
    for i in 0..n {
        a[(i, i)] += n as f64 + 1.0;
    }
    a
}

fn random_symmetric(rng: &mut ChaCha8Rng, n: usize) -> SMatrix<f64> {
    let mut s = SMatrix::symmetric(n, 0.0);
    for c in 0..n {
        for r in 0..=c {
            s[(r, c)] = rng.gen_range(-1.0..1.0);
        }
    }
    s
}

// ---------------------------------------------------------------------------
// Structure
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_double_transpose_is_identity(rows in 1usize..8, cols in 1usize..8, seed in 0u64..1000) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let a = random_matrix(&mut rng, rows, cols);
        let mut b = a.clone();
        b.transpose();
        prop_assert_eq!(b.shape(), (cols, rows));
        b.transpose();
        prop_assert!(a == b);
        prop_assert!((!!&a).equals(&a));
    }

    #[test]
    fn prop_symmetric_storage_aliases(n in 1usize..8, seed in 0u64..1000) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut s = random_symmetric(&mut rng, n);
        let i = rng.gen_range(0..n);
        let j = rng.gen_range(0..n);
        let x: f64 = rng.gen_range(-10.0..10.0);
        s[(i, j)] = x;
        prop_assert_eq!(s.at(j, i), x);
        prop_assert!(s.is_symmetric());
    }

    #[test]
    fn prop_lazy_expression_matches_loops(rows in 1usize..7, cols in 1usize..7, seed in 0u64..1000) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let a = random_matrix(&mut rng, rows, cols);
        let b = random_matrix(&mut rng, rows, cols);

        let mut lazy = Matrix::<f64>::empty();
        lazy.assign((&a + &b) - &b + (&a + &b)).unwrap();

        let direct = Matrix::from_fn(rows, cols, |r, c| {
            let s = a.at(r, c) + b.at(r, c);
            s - b.at(r, c) + s
        });
        prop_assert!(lazy == direct);
    }
}

// ---------------------------------------------------------------------------
// Elimination
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_inverse_is_two_sided(n in 1usize..8, seed in 0u64..1000) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let a = well_conditioned(&mut rng, n);
        let inv = a.inverse().unwrap();
        let id = Matrix::<f64>::identity(n);
        prop_assert!((&a * &inv).approx_eq(&id, 1e-9));
        prop_assert!((&inv * &a).approx_eq(&id, 1e-9));
    }

    #[test]
    fn prop_determinant_matches_cofactor_expansion(n in 1usize..=5, seed in 0u64..1000) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let a = random_matrix(&mut rng, n, n);
        let elimination = a.determinant().unwrap();
        let laplace = a.determinant_laplace().unwrap();
        prop_assert!((elimination - laplace).abs() < 1e-9, "{} vs {}", elimination, laplace);
    }

    #[test]
    fn prop_solve_se_satisfies_system(n in 1usize..7, seed in 0u64..1000) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let a = well_conditioned(&mut rng, n);
        let b = random_matrix(&mut rng, n, 1);
        let x = a.solve_se(&b).unwrap();
        prop_assert!((&a * &x).approx_eq(&b, 1e-9));
    }
}

// ---------------------------------------------------------------------------
// Decomposition reconstruction
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_lu_reconstructs(n in 1usize..8, seed in 0u64..1000) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let a = random_matrix(&mut rng, n, n);
        let (l, u) = a.lud().unwrap();
        prop_assert!(u.is_upper_triangular());
        prop_assert!((&l * &u).approx_eq(&a, 1e-10));
    }

    #[test]
    fn prop_qr_reconstructs(rows in 1usize..8, cols in 1usize..8, seed in 0u64..1000) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let a = random_matrix(&mut rng, rows, cols);
        let (q, r) = a.qrd().unwrap();
        prop_assert!((&q * &r).approx_eq(&a, 1e-10));
        let k = rows.min(cols);
        prop_assert!((!&q * &q).approx_eq(&Matrix::<f64>::identity(k), 1e-10));
    }

    #[test]
    fn prop_svd_reconstructs(rows in 1usize..8, cols in 1usize..8, seed in 0u64..1000) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let a = random_matrix(&mut rng, rows, cols);
        let (u, s, v) = a.svd(false).unwrap();
        prop_assert!((&u * &s * !&v).approx_eq(&a, 1e-10));
        let d = s.diagonal();
        for k in 1..d.len() {
            prop_assert!(d[k - 1] >= d[k]);
        }
    }

    #[test]
    fn prop_cholesky_reconstructs(n in 1usize..8, seed in 0u64..1000) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let b = random_matrix(&mut rng, n, n);
        let mut spd = (!&b * &b).materialize();
        for i in 0..n {
            spd[(i, i)] += 0.5;
        }
        let r = spd.chod(true).unwrap();
        prop_assert!((!&r * &r).approx_eq(&spd, 1e-10));
    }
}

// ---------------------------------------------------------------------------
// Eigen, statistics, background evaluation
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_symmetric_eigen_reconstructs(n in 1usize..9, seed in 0u64..1000) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let a = random_symmetric(&mut rng, n);
        let space = a.eigen_space(EigenSort::Ascending).unwrap();
        prop_assert!(space.is_real());
        let v_inv = space.vectors.inverse().unwrap();
        let lambda = Matrix::from_diagonal(space.values.as_slice());
        prop_assert!((&space.vectors * &lambda * &v_inv).approx_eq(&a, 1e-9));
    }

    #[test]
    fn prop_general_eigen_satisfies_av_eq_vd(n in 1usize..8, seed in 0u64..1000) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let a = random_matrix(&mut rng, n, n);
        let space = a.eigen_space(EigenSort::None).unwrap();
        let d = space.block_diagonal();
        prop_assert!((&a * &space.vectors).approx_eq(&(&space.vectors * &d), 1e-8));
    }

    #[test]
    fn prop_covariance_diagonal_is_non_negative(rows in 2usize..10, cols in 1usize..6, seed in 0u64..1000) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let a = random_matrix(&mut rng, rows, cols);
        let cov = a.covariance(true).unwrap();
        prop_assert!(cov.is_symmetric());
        prop_assert!(cov.diagonal().iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn prop_async_matches_sync(n in 1usize..6, seed in 0u64..1000) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let a = random_matrix(&mut rng, n, n);
        let det = a.determinant_async().unwrap();
        let eig = a.eigen_space_async(EigenSort::Descending).unwrap();
        prop_assert_eq!(det.get().unwrap(), a.determinant().unwrap());
        let sync = a.eigen_space(EigenSort::Descending).unwrap();
        let background = eig.get().unwrap();
        prop_assert_eq!(background.values, sync.values);
        prop_assert_eq!(background.imaginary, sync.imaginary);
        prop_assert!(background.vectors == sync.vectors);
    }
}
