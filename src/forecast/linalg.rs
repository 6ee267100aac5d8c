// =============================================================================
// Dense least-squares helpers
// =============================================================================
//
// Each block of the forecast fit is a ridge-penalised least-squares problem
// small enough (tens of columns) to solve through its normal equations:
//
//   (AᵀA + diag(λ)) x = Aᵀy
//
// The system matrix is symmetric positive definite whenever every λ is
// positive, so a plain Cholesky factorisation is enough.

/// Accumulates `AᵀA` and `Aᵀy` one design row at a time.
#[derive(Debug, Clone)]
pub struct NormalEquations {
    dim: usize,
    gram: Vec<f64>,
    rhs: Vec<f64>,
}

impl NormalEquations {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            gram: vec![0.0; dim * dim],
            rhs: vec![0.0; dim],
        }
    }

    /// Add one observation `target ≈ row · x`.
    pub fn add_row(&mut self, row: &[f64], target: f64) {
        debug_assert_eq!(row.len(), self.dim);
        for i in 0..self.dim {
            let ri = row[i];
            if ri == 0.0 {
                continue;
            }
            self.rhs[i] += ri * target;
            // Lower triangle only; mirrored in `solve`.
            let base = i * self.dim;
            for j in 0..=i {
                self.gram[base + j] += ri * row[j];
            }
        }
    }

    /// Add `lambda` to diagonal entry `i` (a Gaussian prior on `x[i]`).
    pub fn add_ridge(&mut self, i: usize, lambda: f64) {
        self.gram[i * self.dim + i] += lambda;
    }

    /// Solve the accumulated system. `None` when the matrix is not numerically
    /// positive definite.
    pub fn solve(mut self) -> Option<Vec<f64>> {
        let n = self.dim;
        if n == 0 {
            return Some(Vec::new());
        }

        // Relative jitter keeps near-collinear hinge columns factorable.
        let max_diag = (0..n)
            .map(|i| self.gram[i * n + i])
            .fold(0.0_f64, f64::max);
        let jitter = max_diag * 1e-12;
        for i in 0..n {
            self.gram[i * n + i] += jitter;
        }

        for i in 0..n {
            for j in (i + 1)..n {
                self.gram[i * n + j] = self.gram[j * n + i];
            }
        }

        let lower = cholesky(&self.gram, n)?;
        Some(cholesky_solve(&lower, n, &self.rhs))
    }
}

/// Lower-triangular `L` with `L Lᵀ = a` (row-major `n × n`).
pub fn cholesky(a: &[f64], n: usize) -> Option<Vec<f64>> {
    let mut l = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i * n + j];
            for k in 0..j {
                sum -= l[i * n + k] * l[j * n + k];
            }
            if i == j {
                if !(sum > 0.0) || !sum.is_finite() {
                    return None;
                }
                l[i * n + i] = sum.sqrt();
            } else {
                l[i * n + j] = sum / l[j * n + j];
            }
        }
    }
    Some(l)
}

/// Solve `L Lᵀ x = b` by forward then backward substitution.
pub fn cholesky_solve(l: &[f64], n: usize, b: &[f64]) -> Vec<f64> {
    let mut z = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[i * n + k] * z[k];
        }
        z[i] = sum / l[i * n + i];
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = z[i];
        for k in (i + 1)..n {
            sum -= l[k * n + i] * x[k];
        }
        x[i] = sum / l[i * n + i];
    }
    x
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
