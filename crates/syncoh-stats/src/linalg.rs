// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Small dense linear algebra over row-major `d x d` buffers.

use syncoh_core::SyncohError;

const PIVOT_RELATIVE_TOLERANCE: f64 = 1.0e-10;
const REGULARIZATION_RELATIVE: f64 = 1.0e-6;
const REGULARIZATION_FLOOR: f64 = 1.0e-10;
const REGULARIZATION_ATTEMPTS: usize = 6;
const JACOBI_MAX_SWEEPS: usize = 100;
const JACOBI_TOLERANCE: f64 = 1.0e-22;

/// Column means and Bessel-corrected covariance of row vectors.
pub fn covariance_matrix(rows: &[Vec<f64>], d: usize) -> Result<(Vec<f64>, Vec<f64>), SyncohError> {
    if rows.len() < 2 {
        return Err(SyncohError::insufficient_data(format!(
            "covariance requires at least 2 rows; got {}",
            rows.len()
        )));
    }
    if let Some((idx, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != d) {
        return Err(SyncohError::invalid_config(format!(
            "row {idx} has {} columns, expected {d}",
            row.len()
        )));
    }

    let n = rows.len() as f64;
    let mut means = vec![0.0; d];
    for row in rows {
        for (acc, value) in means.iter_mut().zip(row) {
            *acc += value;
        }
    }
    for value in &mut means {
        *value /= n;
    }

    let mut cov = vec![0.0; d * d];
    for row in rows {
        for i in 0..d {
            let di = row[i] - means[i];
            for j in 0..=i {
                cov[i * d + j] += di * (row[j] - means[j]);
            }
        }
    }
    for i in 0..d {
        for j in 0..=i {
            let value = cov[i * d + j] / (n - 1.0);
            cov[i * d + j] = value;
            cov[j * d + i] = value;
        }
    }
    Ok((means, cov))
}

/// Lower-triangular Cholesky factor of a symmetric positive-definite matrix.
pub fn cholesky(matrix: &[f64], d: usize) -> Result<Vec<f64>, SyncohError> {
    let mut factor = matrix.to_vec();
    cholesky_in_place(&mut factor, d)?;
    Ok(factor)
}

fn cholesky_in_place(matrix: &mut [f64], n: usize) -> Result<(), SyncohError> {
    for i in 0..n {
        let diagonal = matrix[i * n + i];
        for j in 0..=i {
            let mut sum = matrix[i * n + j];
            for k in 0..j {
                sum -= matrix[i * n + k] * matrix[j * n + k];
            }

            if i == j {
                // Pivots that cancel to rounding noise are rank deficiency.
                if !sum.is_finite() || sum <= PIVOT_RELATIVE_TOLERANCE * diagonal.abs() {
                    return Err(SyncohError::numerical_issue(
                        "covariance is not positive definite",
                    ));
                }
                matrix[i * n + i] = sum.sqrt();
            } else {
                matrix[i * n + j] = sum / matrix[j * n + j];
            }
        }

        for j in i + 1..n {
            matrix[i * n + j] = 0.0;
        }
    }
    Ok(())
}

/// Covariance made positive definite by diagonal loading, plus its factor.
#[derive(Clone, Debug, PartialEq)]
pub struct Regularized {
    pub covariance: Vec<f64>,
    pub factor: Vec<f64>,
    /// Total diagonal load added; zero when the input was already positive definite.
    pub jitter: f64,
}

/// Factorizes `cov`, adding `eps * I` (`eps = 1e-6 * trace / d`, growing tenfold per retry)
/// when the matrix is not positive definite.
pub fn regularize_covariance(cov: &[f64], d: usize) -> Result<Regularized, SyncohError> {
    if let Ok(factor) = cholesky(cov, d) {
        return Ok(Regularized {
            covariance: cov.to_vec(),
            factor,
            jitter: 0.0,
        });
    }

    let trace = (0..d).map(|i| cov[i * d + i]).sum::<f64>();
    let mut jitter = (REGULARIZATION_RELATIVE * trace / d.max(1) as f64).max(REGULARIZATION_FLOOR);
    for _attempt in 0..REGULARIZATION_ATTEMPTS {
        let mut loaded = cov.to_vec();
        for i in 0..d {
            loaded[i * d + i] += jitter;
        }
        if let Ok(factor) = cholesky(&loaded, d) {
            return Ok(Regularized {
                covariance: loaded,
                factor,
                jitter,
            });
        }
        jitter *= 10.0;
    }

    Err(SyncohError::numerical_issue(format!(
        "covariance of dimension {d} is not positive definite even after diagonal loading"
    )))
}

/// Computes `L z` for a lower-triangular row-major `L`.
pub fn lower_mat_vec(factor: &[f64], d: usize, z: &[f64]) -> Vec<f64> {
    (0..d)
        .map(|i| (0..=i).map(|k| factor[i * d + k] * z[k]).sum::<f64>())
        .collect()
}

/// Eigen-decomposition of a symmetric matrix, eigenvalues in descending order.
#[derive(Clone, Debug, PartialEq)]
pub struct SymmetricEigen {
    pub values: Vec<f64>,
    /// `vectors[i]` is the unit eigenvector for `values[i]`.
    pub vectors: Vec<Vec<f64>>,
}

/// Cyclic Jacobi eigen-decomposition.
pub fn symmetric_eigen(matrix: &[f64], d: usize) -> Result<SymmetricEigen, SyncohError> {
    if matrix.len() != d * d {
        return Err(SyncohError::invalid_config(format!(
            "eigen-decomposition expects {} entries for d={d}; got {}",
            d * d,
            matrix.len()
        )));
    }
    if matrix.iter().any(|value| !value.is_finite()) {
        return Err(SyncohError::numerical_issue(
            "eigen-decomposition input contains non-finite entries",
        ));
    }

    let mut a = matrix.to_vec();
    let mut v = vec![0.0; d * d];
    for i in 0..d {
        v[i * d + i] = 1.0;
    }

    let scale = a.iter().map(|x| x * x).sum::<f64>().max(f64::MIN_POSITIVE);
    for _sweep in 0..JACOBI_MAX_SWEEPS {
        let off = off_diagonal_norm(&a, d);
        if off <= JACOBI_TOLERANCE * scale {
            break;
        }
        for p in 0..d {
            for q in p + 1..d {
                let apq = a[p * d + q];
                if apq.abs() <= f64::MIN_POSITIVE {
                    continue;
                }
                let app = a[p * d + p];
                let aqq = a[q * d + q];
                let theta = (aqq - app) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..d {
                    let akp = a[k * d + p];
                    let akq = a[k * d + q];
                    a[k * d + p] = c * akp - s * akq;
                    a[k * d + q] = s * akp + c * akq;
                }
                for k in 0..d {
                    let apk = a[p * d + k];
                    let aqk = a[q * d + k];
                    a[p * d + k] = c * apk - s * aqk;
                    a[q * d + k] = s * apk + c * aqk;
                }
                for k in 0..d {
                    let vkp = v[k * d + p];
                    let vkq = v[k * d + q];
                    v[k * d + p] = c * vkp - s * vkq;
                    v[k * d + q] = s * vkp + c * vkq;
                }
            }
        }
    }

    let mut order = (0..d).collect::<Vec<_>>();
    order.sort_by(|&i, &j| a[j * d + j].total_cmp(&a[i * d + i]).then_with(|| i.cmp(&j)));

    let values = order.iter().map(|&i| a[i * d + i]).collect::<Vec<_>>();
    let vectors = order
        .iter()
        .map(|&col| (0..d).map(|row| v[row * d + col]).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    Ok(SymmetricEigen { values, vectors })
}

fn off_diagonal_norm(a: &[f64], d: usize) -> f64 {
    let mut total = 0.0;
    for p in 0..d {
        for q in p + 1..d {
            total += a[p * d + q] * a[p * d + q];
        }
    }
    total
}

/// Gauss-Jordan elimination with partial pivoting; `None` when singular.
pub fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for pivot in 0..n {
        let mut best_row = pivot;
        let mut best_abs = a[pivot][pivot].abs();
        for row in (pivot + 1)..n {
            let cand = a[row][pivot].abs();
            if cand > best_abs {
                best_abs = cand;
                best_row = row;
            }
        }
        if !best_abs.is_finite() || best_abs <= f64::EPSILON {
            return None;
        }
        if best_row != pivot {
            a.swap(pivot, best_row);
            b.swap(pivot, best_row);
        }

        let pivot_val = a[pivot][pivot];
        for col in pivot..n {
            a[pivot][col] /= pivot_val;
        }
        b[pivot] /= pivot_val;

        for row in 0..n {
            if row == pivot {
                continue;
            }
            let factor = a[row][pivot];
            if factor == 0.0 {
                continue;
            }
            for col in pivot..n {
                a[row][col] -= factor * a[pivot][col];
            }
            b[row] -= factor * b[pivot];
        }
    }
    Some(b)
}

#[cfg(test)]
mod tests {
    use super::{
        cholesky, covariance_matrix, lower_mat_vec, regularize_covariance, solve_linear_system,
        symmetric_eigen,
    };

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn covariance_matches_hand_computed_values() {
        let rows = vec![vec![1.0, 2.0], vec![2.0, 4.0], vec![3.0, 6.5]];
        let (means, cov) = covariance_matrix(&rows, 2).expect("covariance should compute");
        assert_close(means[0], 2.0, 1e-12);
        assert_close(means[1], 12.5 / 3.0, 1e-12);
        assert_close(cov[0], 1.0, 1e-12);
        assert_close(cov[1], 2.25, 1e-12);
        assert_eq!(cov[1], cov[2]);
    }

    #[test]
    fn covariance_requires_two_rows() {
        let err = covariance_matrix(&[vec![1.0]], 1).expect_err("one row is not enough");
        assert_eq!(err.code(), "insufficient_data");
    }

    #[test]
    fn cholesky_reconstructs_matrix() {
        let matrix = [4.0, 2.0, 2.0, 3.0];
        let l = cholesky(&matrix, 2).expect("matrix is positive definite");
        assert_close(l[0], 2.0, 1e-12);
        assert_close(l[1], 0.0, 1e-12);
        assert_close(l[2], 1.0, 1e-12);
        assert_close(l[3], 2.0f64.sqrt(), 1e-12);
        let y = lower_mat_vec(&l, 2, &[1.0, 1.0]);
        assert_close(y[0], 2.0, 1e-12);
        assert_close(y[1], 1.0 + 2.0f64.sqrt(), 1e-12);
    }

    #[test]
    fn singular_covariance_is_regularized() {
        // Perfectly collinear fields.
        let rows = vec![vec![1.0, 2.0], vec![2.0, 4.0], vec![3.0, 6.0]];
        let (_, cov) = covariance_matrix(&rows, 2).expect("covariance should compute");
        assert!(cholesky(&cov, 2).is_err());
        let regularized = regularize_covariance(&cov, 2).expect("loading should succeed");
        assert!(regularized.jitter > 0.0);
        assert!(regularized.covariance[0] > cov[0]);
        assert!(cholesky(&regularized.covariance, 2).is_ok());
    }

    #[test]
    fn eigen_decomposition_sorts_descending_and_is_orthonormal() {
        let matrix = [2.0, 1.0, 0.0, 1.0, 2.0, 0.0, 0.0, 0.0, 1.0];
        let eigen = symmetric_eigen(&matrix, 3).expect("eigen should compute");
        assert_close(eigen.values[0], 3.0, 1e-10);
        assert_close(eigen.values[1], 1.0, 1e-10);
        assert_close(eigen.values[2], 1.0, 1e-10);
        for i in 0..3 {
            for j in 0..3 {
                let dot = eigen.vectors[i]
                    .iter()
                    .zip(&eigen.vectors[j])
                    .map(|(a, b)| a * b)
                    .sum::<f64>();
                assert_close(dot, if i == j { 1.0 } else { 0.0 }, 1e-10);
            }
        }
        let top = &eigen.vectors[0];
        assert_close(top[0].abs(), 0.5f64.sqrt(), 1e-10);
        assert_close(top[1].abs(), 0.5f64.sqrt(), 1e-10);
    }

    #[test]
    fn solve_linear_system_handles_pivoting() {
        let a = vec![vec![0.0, 2.0], vec![1.0, 1.0]];
        let x = solve_linear_system(a, vec![4.0, 3.0]).expect("system is solvable");
        assert_close(x[0], 1.0, 1e-12);
        assert_close(x[1], 2.0, 1e-12);
        assert!(solve_linear_system(vec![vec![1.0, 2.0], vec![2.0, 4.0]], vec![1.0, 2.0]).is_none());
    }
}
