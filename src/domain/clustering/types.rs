use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Asset id → cluster label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub asset_id: String,
    pub cluster: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElbowMethod {
    Kneedle,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElbowPoint {
    pub elbow_k: usize,
    pub elbow_index: usize,
    /// Inertia at the elbow; absent on the fallback path.
    pub elbow_inertia: Option<f64>,
    pub method: ElbowMethod,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElbowCurve {
    pub k_values: Vec<usize>,
    pub inertia_values: Vec<f64>,
    pub elbow: ElbowPoint,
}

impl ElbowCurve {
    pub fn points(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.k_values
            .iter()
            .copied()
            .zip(self.inertia_values.iter().copied())
    }
}

/// Internal validation metrics. Best-effort: `None` values plus `error`
/// when the labelling is degenerate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterMetrics {
    pub silhouette_score: Option<f64>,
    pub davies_bouldin_index: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub count: usize,
    pub members: Vec<String>,
}

/// Per-cluster summaries keyed (and therefore ordered) by label.
pub type ClusterStatistics = BTreeMap<usize, ClusterSummary>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionMethod {
    Pca,
    Tsne,
}

impl FromStr for ProjectionMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pca" => Ok(ProjectionMethod::Pca),
            "tsne" | "t-sne" => Ok(ProjectionMethod::Tsne),
            _ => anyhow::bail!("Invalid projection method: {}. Must be 'pca' or 'tsne'", s),
        }
    }
}

/// 2-D coordinates for plotting, parallel to the input items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub labels: Vec<usize>,
}
