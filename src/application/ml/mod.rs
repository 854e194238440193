pub mod decision_tree;
pub mod direction_forecaster;
pub mod feature_builder;
pub mod predictor;
pub mod random_forest;
