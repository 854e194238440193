//! Internal cluster-validation metrics and per-cluster summaries.

use crate::domain::clustering::distance::{euclidean, pairwise_distances};
use crate::domain::clustering::{ClusterMetrics, ClusterStatistics, ClusterSummary, DistanceModel};
use crate::domain::errors::{AnalyticsError, MetricError};
use crate::domain::market::volatility_profile::ProfileMatrix;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Valid labellings have between 2 and n-1 distinct labels.
fn check_labelling(labels: &[usize], n_samples: usize) -> Result<BTreeMap<usize, Vec<usize>>, MetricError> {
    if labels.len() != n_samples {
        return Err(MetricError::LengthMismatch {
            labels: labels.len(),
            samples: n_samples,
        });
    }
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        groups.entry(label).or_default().push(i);
    }
    let n_labels = groups.len();
    if n_labels < 2 || n_labels + 1 > n_samples {
        return Err(MetricError::DegenerateLabelling {
            labels: n_labels,
            samples: n_samples,
        });
    }
    Ok(groups)
}

/// Mean silhouette coefficient over a precomputed distance matrix.
///
/// Members of single-item clusters score 0.
pub fn silhouette_score(distances: &[Vec<f64>], labels: &[usize]) -> Result<f64, MetricError> {
    let n = distances.len();
    let groups = check_labelling(labels, n)?;

    let mut total = 0.0;
    for i in 0..n {
        let own = &groups[&labels[i]];
        if own.len() == 1 {
            continue;
        }
        let a = own.iter().filter(|&&j| j != i).map(|&j| distances[i][j]).sum::<f64>()
            / (own.len() - 1) as f64;
        let b = groups
            .iter()
            .filter(|(label, _)| **label != labels[i])
            .map(|(_, members)| {
                members.iter().map(|&j| distances[i][j]).sum::<f64>() / members.len() as f64
            })
            .fold(f64::INFINITY, f64::min);

        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    let score = total / n as f64;
    if score.is_finite() {
        Ok(score)
    } else {
        Err(MetricError::NonFinite)
    }
}

/// Davies-Bouldin index on Euclidean centroids; lower is better.
pub fn davies_bouldin_index(rows: &[Vec<f64>], labels: &[usize]) -> Result<f64, MetricError> {
    let groups = check_labelling(labels, rows.len())?;
    let width = rows.first().map(|r| r.len()).unwrap_or(0);

    let centroids: Vec<Vec<f64>> = groups
        .values()
        .map(|members| {
            let mut c = vec![0.0f64; width];
            for &i in members {
                for (acc, v) in c.iter_mut().zip(&rows[i]) {
                    *acc += v;
                }
            }
            c.iter().map(|v| v / members.len() as f64).collect()
        })
        .collect();

    let intra: Vec<f64> = groups
        .values()
        .zip(&centroids)
        .map(|(members, c)| {
            members.iter().map(|&i| euclidean(&rows[i], c)).sum::<f64>() / members.len() as f64
        })
        .collect();

    let k = centroids.len();
    let centroid_dist: Vec<Vec<f64>> = (0..k)
        .map(|i| (0..k).map(|j| euclidean(&centroids[i], &centroids[j])).collect())
        .collect();

    let near_zero = |v: &f64| v.abs() < 1e-12;
    if intra.iter().all(near_zero) || centroid_dist.iter().flatten().all(near_zero) {
        return Ok(0.0);
    }

    let score = (0..k)
        .map(|i| {
            (0..k)
                .filter(|&j| j != i)
                .map(|j| {
                    // Coincident centroids contribute nothing
                    if centroid_dist[i][j] == 0.0 {
                        0.0
                    } else {
                        (intra[i] + intra[j]) / centroid_dist[i][j]
                    }
                })
                .fold(0.0, f64::max)
        })
        .sum::<f64>()
        / k as f64;

    if score.is_finite() {
        Ok(score)
    } else {
        Err(MetricError::NonFinite)
    }
}

/// Best-effort validation metrics. Silhouette uses the DTW distance matrix
/// under DTW and Euclidean distance otherwise; Davies-Bouldin is always
/// Euclidean. Failures never propagate.
pub fn metrics(matrix: &ProfileMatrix, labels: &[usize], model: DistanceModel) -> ClusterMetrics {
    let rows = matrix.rows();
    let distances = pairwise_distances(rows, model);
    let computed = silhouette_score(&distances, labels)
        .and_then(|silhouette| davies_bouldin_index(rows, labels).map(|db| (silhouette, db)));

    match computed {
        Ok((silhouette, db)) => {
            debug!(
                "Cluster metrics ({}): silhouette={:.4}, davies_bouldin={:.4}",
                model, silhouette, db
            );
            ClusterMetrics {
                silhouette_score: Some(silhouette),
                davies_bouldin_index: Some(db),
                error: None,
            }
        }
        Err(e) => {
            warn!("Cluster metrics unavailable: {}", e);
            ClusterMetrics {
                silhouette_score: None,
                davies_bouldin_index: None,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Member ids per cluster, ordered by label ascending.
pub fn statistics(ids: &[String], labels: &[usize]) -> Result<ClusterStatistics, AnalyticsError> {
    if ids.len() != labels.len() {
        return Err(AnalyticsError::DimensionMismatch {
            reason: format!("{} ids for {} labels", ids.len(), labels.len()),
        });
    }
    let mut stats = ClusterStatistics::new();
    for (id, &label) in ids.iter().zip(labels) {
        let entry = stats.entry(label).or_insert_with(|| ClusterSummary {
            count: 0,
            members: Vec::new(),
        });
        entry.count += 1;
        entry.members.push(id.clone());
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("A{}", i)).collect()
    }

    #[test]
    fn test_statistics_round_trip() {
        let labels = vec![1, 0, 1, 2, 0];
        let stats = statistics(&ids(5), &labels).unwrap();

        assert_eq!(stats.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(stats.values().map(|s| s.count).sum::<usize>(), 5);
        assert_eq!(stats[&1].members, vec!["A0".to_string(), "A2".to_string()]);

        let mut rebuilt = vec![usize::MAX; 5];
        for (label, summary) in &stats {
            for member in &summary.members {
                let idx: usize = member[1..].parse().unwrap();
                rebuilt[idx] = *label;
            }
        }
        assert_eq!(rebuilt, labels);
    }

    #[test]
    fn test_statistics_length_mismatch() {
        assert!(statistics(&ids(2), &[0]).is_err());
    }

    #[test]
    fn test_separated_clusters_score_well() {
        let matrix = ProfileMatrix::new(vec![
            vec![0.0, 0.0],
            vec![0.1, 0.0],
            vec![10.0, 10.0],
            vec![10.1, 10.0],
        ])
        .unwrap();
        let m = metrics(&matrix, &[0, 0, 1, 1], DistanceModel::Euclidean);
        assert!(m.silhouette_score.unwrap() > 0.9);
        assert!(m.davies_bouldin_index.unwrap() < 0.1);
        assert!(m.error.is_none());
    }

    #[test]
    fn test_dtw_silhouette_ignores_phase_shift() {
        // One group of single spikes, one of flat plateaus, each at shifting offsets
        let mut rows = Vec::new();
        for pos in [2, 6, 10, 14] {
            let mut row = vec![0.0; 20];
            row[pos] = 5.0;
            rows.push(row);
        }
        for start in [1, 5, 9, 13] {
            let mut row = vec![0.0; 20];
            row[start..start + 6].iter_mut().for_each(|v| *v = 2.0);
            rows.push(row);
        }
        let matrix = ProfileMatrix::new(rows).unwrap();
        let labels = [0, 0, 0, 0, 1, 1, 1, 1];

        let dtw = metrics(&matrix, &labels, DistanceModel::Dtw).silhouette_score.unwrap();
        let flat = metrics(&matrix, &labels, DistanceModel::Euclidean).silhouette_score.unwrap();
        assert!((dtw - 1.0).abs() < 1e-12);
        assert!(dtw > flat + 0.5);
    }

    #[test]
    fn test_single_label_is_degenerate_not_fatal() {
        let matrix = ProfileMatrix::new(vec![vec![0.0], vec![1.0], vec![2.0]]).unwrap();
        let m = metrics(&matrix, &[0, 0, 0], DistanceModel::Euclidean);
        assert_eq!(m.silhouette_score, None);
        assert_eq!(m.davies_bouldin_index, None);
        assert!(m.error.unwrap().contains("Number of labels is 1"));
    }

    #[test]
    fn test_all_singletons_is_degenerate() {
        let matrix = ProfileMatrix::new(vec![vec![0.0], vec![1.0], vec![2.0]]).unwrap();
        let m = metrics(&matrix, &[0, 1, 2], DistanceModel::Dtw);
        assert!(m.silhouette_score.is_none());
        assert!(m.error.is_some());
    }

    #[test]
    fn test_singleton_cluster_scores_zero() {
        // Three items, one pair plus one singleton
        let distances = vec![
            vec![0.0, 1.0, 10.0],
            vec![1.0, 0.0, 10.0],
            vec![10.0, 10.0, 0.0],
        ];
        let score = silhouette_score(&distances, &[0, 0, 1]).unwrap();
        // Pair members: a = 1, b = 10 → 0.9 each; singleton 0
        assert!((score - 1.8 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_davies_bouldin_known_value() {
        let rows = vec![vec![0.0], vec![2.0], vec![10.0], vec![12.0]];
        // Intra = 1 for both, centroid distance = 10
        let db = davies_bouldin_index(&rows, &[0, 0, 1, 1]).unwrap();
        assert!((db - 0.2).abs() < 1e-12);
    }
}
