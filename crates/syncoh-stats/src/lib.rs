// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Numerical primitives shared by the syncoh generators and scorers.

pub mod descriptive;
pub mod distance;
pub mod linalg;
pub mod neighbors;
pub mod sampling;

pub use descriptive::{
    Scale, ScaleSource, iqr, mean, median, quantile, quantile_sorted, robust_scale,
    sample_variance, sorted, std_dev,
};
pub use distance::{pearson, pearson_correlation_matrix, wasserstein_1d};
pub use linalg::{
    Regularized, SymmetricEigen, cholesky, covariance_matrix, lower_mat_vec,
    regularize_covariance, solve_linear_system, symmetric_eigen,
};
pub use neighbors::{euclidean, idw_knn_predict};
pub use sampling::{normal, standard_normal, standard_normal_vec, uniform};

pub fn crate_name() -> &'static str {
    "syncoh-stats"
}
