//! Numerical kernels: successive over-relaxation and bisection.
//!
//! The relaxation iterates `x ← ω·GS(x) + (1 − ω)·x`, where `GS` is one
//! forward Gauss-Seidel sweep, until the L2 residual drops below the
//! tolerance or the iteration cap is reached.

/// Relaxation factor
pub const OMEGA: f64 = 1.4;

/// Residual norm at which relaxation stops
pub const TOLERANCE: f64 = 1e-8;

/// Iteration cap for relaxation and bisection
pub const MAX_ITERS: usize = 10000;

/// Half-width at which bisection stops
pub const BISECTION_DELTA: f64 = 1e-5;

/// Systems at least this large use the sparse path
pub const MATRIX_THRESHOLD: usize = 100;

/// Square matrix stored as per-row lists of nonzero entries
#[derive(Debug, Clone, Default)]
pub struct SparseMatrix {
    rows: Vec<Vec<(usize, f64)>>,
}

impl SparseMatrix {
    pub fn new(n: usize) -> Self {
        Self { rows: vec![Vec::new(); n] }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Adds `value` to entry (i, j)
    pub fn add(&mut self, i: usize, j: usize, value: f64) {
        let row = &mut self.rows[i];
        match row.iter_mut().find(|(col, _)| *col == j) {
            Some(entry) => entry.1 += value,
            None => row.push((j, value)),
        }
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.rows[i]
            .iter()
            .find(|(col, _)| *col == j)
            .map_or(0.0, |&(_, v)| v)
    }

    /// Multiplies every entry by `factor`
    pub fn scale(&mut self, factor: f64) {
        for row in &mut self.rows {
            for entry in row.iter_mut() {
                entry.1 *= factor;
            }
        }
    }

    pub fn row(&self, i: usize) -> &[(usize, f64)] {
        &self.rows[i]
    }

    pub fn to_dense(&self) -> Vec<Vec<f64>> {
        let n = self.len();
        let mut dense = vec![vec![0.0; n]; n];
        for (i, row) in self.rows.iter().enumerate() {
            for &(j, v) in row {
                dense[i][j] += v;
            }
        }
        dense
    }

    pub fn from_dense(dense: &[Vec<f64>]) -> Self {
        let mut matrix = Self::new(dense.len());
        for (i, row) in dense.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                if v != 0.0 {
                    matrix.rows[i].push((j, v));
                }
            }
        }
        matrix
    }

    fn multiply(&self, x: &[f64]) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|&(j, v)| v * x[j]).sum())
            .collect()
    }
}

fn residual_norm(matrix: &SparseMatrix, b: &[f64], x: &[f64]) -> f64 {
    matrix
        .multiply(x)
        .iter()
        .zip(b)
        .map(|(ax, bi)| (bi - ax).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Solves `A·x = b` by successive over-relaxation on a sparse matrix
pub fn sor_sparse(matrix: &SparseMatrix, b: &[f64], x0: &[f64]) -> Vec<f64> {
    let n = matrix.len();
    let mut x = x0.to_vec();
    let mut sweep = vec![0.0; n];
    let mut iterations = 0;
    let mut error = f64::INFINITY;

    while iterations < MAX_ITERS && error > TOLERANCE {
        for i in 0..n {
            let mut diagonal = 0.0;
            let mut sum = 0.0;
            for &(j, v) in matrix.row(i) {
                if j < i {
                    sum += v * sweep[j];
                } else if j > i {
                    sum += v * x[j];
                } else {
                    diagonal += v;
                }
            }
            sweep[i] = if diagonal == 0.0 { x[i] } else { (b[i] - sum) / diagonal };
        }

        for i in 0..n {
            x[i] = OMEGA * sweep[i] + (1.0 - OMEGA) * x[i];
        }

        iterations += 1;
        error = residual_norm(matrix, b, &x);
    }

    log::debug!("SOR finished after {} iterations (residual {:.3e})", iterations, error);
    x
}

/// Solves `A·x = b` by successive over-relaxation on a dense matrix
pub fn sor_dense(matrix: &[Vec<f64>], b: &[f64], x0: &[f64]) -> Vec<f64> {
    let n = matrix.len();
    let mut x = x0.to_vec();
    let mut sweep = vec![0.0; n];
    let mut iterations = 0;
    let mut error = f64::INFINITY;

    while iterations < MAX_ITERS && error > TOLERANCE {
        for i in 0..n {
            let row = &matrix[i];
            let lower: f64 = (0..i).map(|j| row[j] * sweep[j]).sum();
            let upper: f64 = (i + 1..n).map(|j| row[j] * x[j]).sum();
            sweep[i] = if row[i] == 0.0 { x[i] } else { (b[i] - lower - upper) / row[i] };
        }

        for i in 0..n {
            x[i] = OMEGA * sweep[i] + (1.0 - OMEGA) * x[i];
        }

        iterations += 1;
        error = matrix
            .iter()
            .zip(b)
            .map(|(row, bi)| {
                let ax: f64 = row.iter().zip(&x).map(|(v, xj)| v * xj).sum();
                (bi - ax).powi(2)
            })
            .sum::<f64>()
            .sqrt();
    }

    x
}

/// Solves `A·x = b`, picking the dense path for small systems
pub fn sor(matrix: &SparseMatrix, b: &[f64], x0: &[f64]) -> Vec<f64> {
    if matrix.len() < MATRIX_THRESHOLD {
        sor_dense(&matrix.to_dense(), b, x0)
    } else {
        sor_sparse(matrix, b, x0)
    }
}

/// Finds a root of `f` in `[a, b]` by bisection.
///
/// Returns `None` when `f` has the same sign at both ends of the interval
/// or the iteration cap is exhausted.
pub fn bisection<F>(mut f: F, a: f64, b: f64) -> Option<f64>
where
    F: FnMut(f64) -> f64,
{
    let (mut a, mut b) = if a > b { (b, a) } else { (a, b) };

    let mut fa = f(a);
    if fa.signum() == f(b).signum() {
        return None;
    }

    for _ in 0..MAX_ITERS {
        let c = (a + b) / 2.0;
        let fc = f(c);

        if fc == 0.0 || (b - a) / 2.0 < BISECTION_DELTA {
            return Some(c);
        }

        if fc.signum() == fa.signum() {
            a = c;
            fa = fc;
        } else {
            b = c;
        }
    }

    None
}
