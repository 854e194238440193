use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Predicted next-day direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// UP iff the up-probability is at least one half.
    pub fn from_probability(probability: f64) -> Self {
        if probability >= 0.5 {
            Direction::Up
        } else {
            Direction::Down
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "UP"),
            Direction::Down => write!(f, "DOWN"),
        }
    }
}

/// One day of a synthesized forecast path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastStep {
    pub date: NaiveDate,
    pub direction: Direction,
    /// Up-probability in [0, 1].
    pub probability: f64,
    pub predicted_price: f64,
}
