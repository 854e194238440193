//! Inertia sweep over k and Kneedle-style elbow detection.

use super::{ClusterEngine, MIN_CLUSTER_ITEMS};
use crate::domain::clustering::{ElbowCurve, ElbowMethod, ElbowPoint};
use crate::domain::errors::AnalyticsError;
use crate::domain::market::volatility_profile::ProfileMatrix;
use std::ops::Range;
use tracing::{debug, info};

/// Upper bound on any swept k (exclusive).
pub const MAX_SWEEP_K: usize = 10;

/// Clamps `k_range` above by `min(MAX_SWEEP_K, n)`.
pub fn clamp_k_range(k_range: Range<usize>, n_items: usize) -> Range<usize> {
    let end = k_range.end.min(MAX_SWEEP_K.min(n_items));
    k_range.start.max(1)..end
}

/// Fits `engine` once per k and records the inertia curve.
pub fn sweep(
    matrix: &ProfileMatrix,
    k_range: Range<usize>,
    engine: &mut dyn ClusterEngine,
) -> Result<ElbowCurve, AnalyticsError> {
    let n = matrix.n_items();
    if n < MIN_CLUSTER_ITEMS {
        return Err(AnalyticsError::NotEnoughItems {
            count: n,
            min: MIN_CLUSTER_ITEMS,
        });
    }

    let requested = k_range.clone();
    let range = clamp_k_range(k_range, n);
    if range.is_empty() {
        return Err(AnalyticsError::InvalidKRange {
            start: requested.start,
            end: range.end,
            items: n,
        });
    }

    let mut k_values = Vec::with_capacity(range.len());
    let mut inertia_values = Vec::with_capacity(range.len());
    for k in range {
        engine.fit_predict(matrix, k)?;
        let inertia = engine.inertia().ok_or(AnalyticsError::NotFitted)?;
        debug!("{} sweep k={} inertia={:.4}", engine.distance_model(), k, inertia);
        k_values.push(k);
        inertia_values.push(inertia);
    }

    let elbow = detect_elbow(&inertia_values, &k_values)?;
    info!(
        "Elbow sweep over k={:?}: selected K={} ({:?})",
        k_values, elbow.elbow_k, elbow.method
    );

    Ok(ElbowCurve {
        k_values,
        inertia_values,
        elbow,
    })
}

/// Chooses the k whose normalized point lies farthest from the chord joining
/// the first and last points. Ties go to the earliest k.
pub fn detect_elbow(inertias: &[f64], ks: &[usize]) -> Result<ElbowPoint, AnalyticsError> {
    if inertias.len() != ks.len() || ks.is_empty() {
        return Err(AnalyticsError::DimensionMismatch {
            reason: format!(
                "elbow needs matching non-empty inputs, got {} inertias and {} ks",
                inertias.len(),
                ks.len()
            ),
        });
    }

    if ks.len() < 3 {
        return Ok(ElbowPoint {
            elbow_k: ks[0],
            elbow_index: 0,
            elbow_inertia: None,
            method: ElbowMethod::Fallback,
            reasoning: "Not enough data points for elbow detection".to_string(),
        });
    }

    let k_norm = normalize(&ks.iter().map(|&k| k as f64).collect::<Vec<_>>());
    let inertia_norm = normalize(inertias);

    let last = ks.len() - 1;
    let (x1, y1) = (k_norm[0], inertia_norm[0]);
    let (x2, y2) = (k_norm[last], inertia_norm[last]);
    let denominator = ((y2 - y1).powi(2) + (x2 - x1).powi(2)).sqrt();

    let mut elbow_index = 0;
    let mut max_distance = f64::NEG_INFINITY;
    for (i, (&x0, &y0)) in k_norm.iter().zip(&inertia_norm).enumerate() {
        let distance = if denominator > 0.0 {
            ((y2 - y1) * x0 - (x2 - x1) * y0 + x2 * y1 - y2 * x1).abs() / denominator
        } else {
            0.0
        };
        if distance > max_distance {
            max_distance = distance;
            elbow_index = i;
        }
    }

    let elbow_k = ks[elbow_index];
    let reasoning = if elbow_index > 0 && elbow_index < last {
        let before = inertias[elbow_index - 1] - inertias[elbow_index];
        let after = inertias[elbow_index] - inertias[elbow_index + 1];
        format!(
            "K={} selected as elbow point with maximum distance from baseline. Inertia improvement: before={:.2}, after={:.2}",
            elbow_k, before, after
        )
    } else {
        format!(
            "K={} selected as elbow point with maximum distance from baseline",
            elbow_k
        )
    };

    Ok(ElbowPoint {
        elbow_k,
        elbow_index,
        elbow_inertia: Some(inertias[elbow_index]),
        method: ElbowMethod::Kneedle,
        reasoning,
    })
}

/// Min-max scaling to [0, 1]; a constant series maps to all zeros.
fn normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    if span > 0.0 && span.is_finite() {
        values.iter().map(|v| (v - min) / span).collect()
    } else {
        vec![0.0; values.len()]
    }
}
