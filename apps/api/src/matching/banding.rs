//! Score Banding: final score → qualitative label. Thresholds come from config.

use serde::{Deserialize, Serialize};

use crate::matching::scoring_config::BandThresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    NeedsWork,
    Solid,
    Strong,
}

impl ScoreBand {
    pub fn label(self) -> &'static str {
        match self {
            ScoreBand::Strong => "strong",
            ScoreBand::Solid => "solid",
            ScoreBand::NeedsWork => "needs work",
        }
    }
}

/// Label for a final score.
pub fn score_band(thresholds: &BandThresholds, score: f64) -> ScoreBand {
    if score >= thresholds.strong {
        ScoreBand::Strong
    } else if score >= thresholds.solid {
        ScoreBand::Solid
    } else {
        ScoreBand::NeedsWork
    }
}
