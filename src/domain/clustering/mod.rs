pub mod distance;
pub mod types;

pub use distance::DistanceModel;
pub use types::{
    ClusterAssignment, ClusterMetrics, ClusterStatistics, ClusterSummary, ElbowCurve, ElbowMethod,
    ElbowPoint, Projection, ProjectionMethod,
};
