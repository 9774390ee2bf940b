//! Shared helpers for hmma benchmarks: seeded RNG, input generators.

use hmma_la::{DVec, Matrix, Symmetric};

/// Simple xoshiro256** PRNG for reproducible benchmarks (no rand dependency in lib).
pub struct Rng {
    s: [u64; 4],
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        // SplitMix64 to expand seed into state
        let mut z = seed;
        let mut s = [0u64; 4];
        for slot in &mut s {
            z = z.wrapping_add(0x9e3779b97f4a7c15);
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
            *slot = z ^ (z >> 31);
        }
        Self { s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.s[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.s[1] << 17;
        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];
        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);
        result
    }

    /// Uniform f64 in [-1, 1]
    pub fn f64(&mut self) -> f64 {
        (self.next_u64() as f64) / (u64::MAX as f64) * 2.0 - 1.0
    }
}

pub fn make_rng() -> Rng {
    Rng::new(0xDEAD_BEEF_CAFE_BABE)
}

/// Flat column-major data, the layout both hmma and nalgebra accept.
pub fn random_f64_flat(size: usize) -> Vec<f64> {
    let mut rng = make_rng();
    (0..size).map(|_| rng.f64()).collect()
}

/// SPD matrix as flat column-major data (size x size): AᵀA + 0.1 I
pub fn random_spd_flat(size: usize) -> Vec<f64> {
    let a = random_f64_flat(size * size);
    let mut result = vec![0.0f64; size * size];
    for i in 0..size {
        for j in 0..size {
            let mut sum = 0.0;
            for k in 0..size {
                // a is column-major: a[k + i*size] = A[k][i]
                sum += a[i * size + k] * a[j * size + k];
            }
            if i == j {
                sum += 0.1;
            }
            result[j * size + i] = sum;
        }
    }
    result
}

pub fn random_dmat(n: usize) -> Matrix<f64> {
    Matrix::from_column_major(n, n, random_f64_flat(n * n)).unwrap()
}

pub fn random_dvec(n: usize) -> DVec<f64> {
    DVec::from_vec(random_f64_flat(n))
}

pub fn random_spd_dmat(n: usize) -> Matrix<f64> {
    Matrix::from_column_major(n, n, random_spd_flat(n)).unwrap()
}

/// The same SPD matrix in packed storage.
pub fn random_spd_smat(n: usize) -> Matrix<f64, Symmetric> {
    let flat = random_spd_flat(n);
    Matrix::symmetric_from_fn(n, |r, c| flat[c * n + r])
}
