use serde::{Deserialize, Serialize};
use std::fmt;

/// Projection scenario, each seeded by a quantile of historical daily returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    Optimistic,
    Base,
    Pessimistic,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::Optimistic, Scenario::Base, Scenario::Pessimistic];

    /// Quantile of the daily return sample used as this scenario's drift
    pub fn quantile(&self) -> f64 {
        match self {
            Scenario::Optimistic => 0.75,
            Scenario::Base => 0.50,
            Scenario::Pessimistic => 0.25,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Optimistic => "optimistic",
            Scenario::Base => "base",
            Scenario::Pessimistic => "pessimistic",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
