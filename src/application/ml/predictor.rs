use crate::domain::ml::feature_registry::FeatureVector;

/// Interface for a fitted next-day direction model
pub trait DirectionClassifier {
    /// Probability (0.0 to 1.0) that the next day closes up
    fn predict_proba(&self, features: &FeatureVector) -> f64;

    /// Normalized importance per feature, in feature-registry order
    fn feature_importances(&self) -> &[f64];

    /// Get model name/type
    fn name(&self) -> &str;
}
