//! Distance measures between volatility profiles.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Distance model used by a clustering run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceModel {
    Euclidean,
    /// Dynamic Time Warping: elastic alignment tolerant of phase shifts.
    Dtw,
}

impl DistanceModel {
    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            DistanceModel::Euclidean => euclidean(a, b),
            DistanceModel::Dtw => dtw_distance(a, b),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceModel::Euclidean => "euclidean",
            DistanceModel::Dtw => "dtw",
        }
    }
}

impl FromStr for DistanceModel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "euclidean" => Ok(DistanceModel::Euclidean),
            "dtw" => Ok(DistanceModel::Dtw),
            _ => anyhow::bail!("Invalid distance model: {}. Must be 'euclidean' or 'dtw'", s),
        }
    }
}

impl std::fmt::Display for DistanceModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    squared_euclidean(a, b).sqrt()
}

/// Accumulated-cost matrix with squared pointwise cost, `(n+1) x (m+1)`.
fn dtw_cost_matrix(a: &[f64], b: &[f64]) -> Vec<Vec<f64>> {
    let (n, m) = (a.len(), b.len());
    let mut cost = vec![vec![f64::INFINITY; m + 1]; n + 1];
    cost[0][0] = 0.0;

    for i in 1..=n {
        for j in 1..=m {
            let d = (a[i - 1] - b[j - 1]).powi(2);
            let best = cost[i - 1][j - 1].min(cost[i - 1][j]).min(cost[i][j - 1]);
            cost[i][j] = d + best;
        }
    }
    cost
}

/// DTW distance: square root of the minimal accumulated squared cost.
pub fn dtw_distance(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return if a.len() == b.len() { 0.0 } else { f64::INFINITY };
    }
    dtw_cost_matrix(a, b)[a.len()][b.len()].sqrt()
}

/// Optimal warping path as `(i, j)` index pairs, in forward order.
pub fn dtw_path(a: &[f64], b: &[f64]) -> Vec<(usize, usize)> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let cost = dtw_cost_matrix(a, b);

    let (mut i, mut j) = (a.len(), b.len());
    let mut path = vec![(i - 1, j - 1)];
    while i > 1 || j > 1 {
        if i == 1 {
            j -= 1;
        } else if j == 1 {
            i -= 1;
        } else {
            let diag = cost[i - 1][j - 1];
            let up = cost[i - 1][j];
            let left = cost[i][j - 1];
            if diag <= up && diag <= left {
                i -= 1;
                j -= 1;
            } else if up <= left {
                i -= 1;
            } else {
                j -= 1;
            }
        }
        path.push((i - 1, j - 1));
    }
    path.reverse();
    path
}

/// Symmetric pairwise distance matrix under `model`.
pub fn pairwise_distances(rows: &[Vec<f64>], model: DistanceModel) -> Vec<Vec<f64>> {
    let n = rows.len();
    let mut dist = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = model.distance(&rows[i], &rows[j]);
            dist[i][j] = d;
            dist[j][i] = d;
        }
    }
    dist
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtw_identical_is_zero() {
        let a = [0.0, 1.0, 2.0, 1.0, 0.0];
        assert_eq!(dtw_distance(&a, &a), 0.0);
    }

    #[test]
    fn test_dtw_tolerates_phase_shift() {
        let a = [0.0, 0.0, 5.0, 0.0, 0.0, 0.0];
        let b = [0.0, 0.0, 0.0, 5.0, 0.0, 0.0];
        assert!(dtw_distance(&a, &b) < 1e-12);
        assert!(euclidean(&a, &b) > 7.0);
    }

    #[test]
    fn test_dtw_never_exceeds_euclidean_for_equal_length() {
        let a = [1.0, 3.0, -2.0, 0.5];
        let b = [0.0, 2.0, 1.0, -1.0];
        assert!(dtw_distance(&a, &b) <= euclidean(&a, &b) + 1e-12);
    }

    #[test]
    fn test_dtw_path_endpoints() {
        let a = [1.0, 2.0, 3.0];
        let b = [1.0, 3.0];
        let path = dtw_path(&a, &b);
        assert_eq!(path.first(), Some(&(0, 0)));
        assert_eq!(path.last(), Some(&(2, 1)));
    }

    #[test]
    fn test_distance_model_from_str() {
        assert_eq!("DTW".parse::<DistanceModel>().unwrap(), DistanceModel::Dtw);
        assert!("manhattan".parse::<DistanceModel>().is_err());
    }

    #[test]
    fn test_pairwise_symmetric() {
        let rows = vec![vec![0.0, 1.0], vec![1.0, 1.0], vec![3.0, 0.0]];
        let d = pairwise_distances(&rows, DistanceModel::Euclidean);
        assert_eq!(d[0][1], d[1][0]);
        assert_eq!(d[2][2], 0.0);
        assert!((d[0][1] - 1.0).abs() < 1e-12);
    }
}
