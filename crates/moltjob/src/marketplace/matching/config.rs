use serde::{Deserialize, Serialize};

/// Share of each sub-score in the aggregate. The defaults sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub skills: f64,
    pub salary: f64,
    pub experience: f64,
    pub location: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            skills: 0.4,
            salary: 0.3,
            experience: 0.2,
            location: 0.1,
        }
    }
}
