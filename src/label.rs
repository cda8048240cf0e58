// src/label.rs
//! Three-band importance label derived purely from the numeric score.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lower edge (inclusive) of the `high` band.
pub const HIGH_THRESHOLD: f64 = 70.0;
/// Lower edge (inclusive) of the `medium` band.
pub const MEDIUM_THRESHOLD: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportanceLabel {
    Low,
    Medium,
    High,
}

impl ImportanceLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            ImportanceLabel::Low => "low",
            ImportanceLabel::Medium => "medium",
            ImportanceLabel::High => "high",
        }
    }
}

impl fmt::Display for ImportanceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `>= 70` high, `>= 40` medium, anything else (NaN included) low.
pub fn get_importance_label(score: f64) -> ImportanceLabel {
    if score >= HIGH_THRESHOLD {
        ImportanceLabel::High
    } else if score >= MEDIUM_THRESHOLD {
        ImportanceLabel::Medium
    } else {
        ImportanceLabel::Low
    }
}
