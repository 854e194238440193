//! 2-D projection of profiles for plotting.

use super::tsne::{TsneConfig, embed};
use crate::domain::clustering::{Projection, ProjectionMethod};
use crate::domain::errors::AnalyticsError;
use crate::domain::market::volatility_profile::ProfileMatrix;
use smartcore::decomposition::pca::{PCA, PCAParameters};
use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;
use tracing::debug;

/// Projects every row to `(x, y)`; labels pass through unchanged.
pub fn project(
    matrix: &ProfileMatrix,
    labels: &[usize],
    method: ProjectionMethod,
    seed: u64,
) -> Result<Projection, AnalyticsError> {
    let n = matrix.n_items();
    if labels.len() != n {
        return Err(AnalyticsError::DimensionMismatch {
            reason: format!("{} labels for {} items", labels.len(), n),
        });
    }

    let points = match method {
        ProjectionMethod::Pca => pca_2d(matrix)?,
        ProjectionMethod::Tsne => embed(matrix.rows(), &TsneConfig::for_items(n, seed))?,
    };
    debug!("Projected {} items with {:?}", n, method);

    Ok(Projection {
        x: points.iter().map(|p| p[0]).collect(),
        y: points.iter().map(|p| p[1]).collect(),
        labels: labels.to_vec(),
    })
}

/// Principal components via smartcore; a single-column matrix projects onto
/// its one component with `y = 0`.
fn pca_2d(matrix: &ProfileMatrix) -> Result<Vec<[f64; 2]>, AnalyticsError> {
    let n_components = matrix.width().min(2);
    let x = DenseMatrix::from_2d_vec(&matrix.rows().to_vec()).map_err(|e| {
        AnalyticsError::ProjectionFailed {
            reason: format!("Matrix creation failed: {}", e),
        }
    })?;

    let pca = PCA::<f64, DenseMatrix<f64>>::fit(
        &x,
        PCAParameters::default().with_n_components(n_components),
    )
    .map_err(|e| AnalyticsError::ProjectionFailed {
        reason: format!("PCA fit failed: {}", e),
    })?;
    let reduced = pca.transform(&x).map_err(|e| AnalyticsError::ProjectionFailed {
        reason: format!("PCA transform failed: {}", e),
    })?;

    let points: Vec<[f64; 2]> = (0..matrix.n_items())
        .map(|i| {
            let first = *reduced.get((i, 0));
            let second = if n_components > 1 { *reduced.get((i, 1)) } else { 0.0 };
            [first, second]
        })
        .collect();

    if points.iter().flatten().any(|v| !v.is_finite()) {
        return Err(AnalyticsError::ProjectionFailed {
            reason: "PCA produced non-finite coordinates".to_string(),
        });
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix() -> ProfileMatrix {
        ProfileMatrix::new(vec![
            vec![0.0, 0.0, 1.0],
            vec![1.0, 0.5, 0.0],
            vec![2.0, 1.0, -1.0],
            vec![3.0, 1.4, -2.0],
            vec![4.0, 2.1, -3.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_pca_lengths_and_labels() {
        let labels = vec![0, 0, 1, 1, 1];
        let projection = project(&matrix(), &labels, ProjectionMethod::Pca, 42).unwrap();
        assert_eq!(projection.x.len(), 5);
        assert_eq!(projection.y.len(), 5);
        assert_eq!(projection.labels, labels);
    }

    #[test]
    fn test_pca_preserves_ordering_along_main_axis() {
        let projection = project(&matrix(), &[0; 5], ProjectionMethod::Pca, 42).unwrap();
        // Points lie near a line, so the first component is monotone (up to sign)
        let increasing = projection.x.windows(2).all(|w| w[1] > w[0]);
        let decreasing = projection.x.windows(2).all(|w| w[1] < w[0]);
        assert!(increasing || decreasing);
    }

    #[test]
    fn test_tsne_lengths() {
        let labels = vec![1, 0, 1, 0, 1];
        let projection = project(&matrix(), &labels, ProjectionMethod::Tsne, 42).unwrap();
        assert_eq!(projection.x.len(), 5);
        assert_eq!(projection.labels, labels);
    }

    #[test]
    fn test_label_length_mismatch() {
        assert!(project(&matrix(), &[0, 1], ProjectionMethod::Pca, 42).is_err());
    }
}
