//! # Score Model
//! Pure mapping `(nudge, config) -> importance score in [0, 100]`.
//!
//! ```text
//! score = clamp(base + recency + status + lead_quality + staleness, 0, 100)
//! ```
//!
//! - `base`         : per-type weight (see [`crate::weights`])
//! - `recency`      : `20 * 0.5^(age_days / 3)`, never floored
//! - `status`       : `+10` for `new`, otherwise 0
//! - `lead_quality` : `clamp(q, 0, 100) / 100 * 15`, 0 when unknown
//! - `staleness`    : `stale_lead` only, `min(stale_days, 14) / 14 * 10`
//!
//! Every term is exposed through [`ScoreBreakdown`] so the explainer renders
//! exactly the numbers the ranker used.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::nudge::{Nudge, NudgeStatus, NudgeType};
use crate::weights::TypeWeights;

pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 100.0;

pub const RECENCY_MAX_BONUS: f64 = 20.0;
pub const RECENCY_HALF_LIFE_DAYS: f64 = 3.0;
pub const NEW_STATUS_BONUS: f64 = 10.0;
pub const LEAD_QUALITY_MAX_BONUS: f64 = 15.0;
pub const STALENESS_MAX_BONUS: f64 = 10.0;
pub const STALENESS_CAP_DAYS: f64 = 14.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Per-call scoring configuration. Holds no shared state; cheap to clone.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScoringConfig {
    /// Reference instant. `None` → wall clock at call time.
    pub now: Option<DateTime<Utc>>,
    /// Built-in table with any overrides already merged in.
    pub weights: TypeWeights,
}

impl ScoringConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the reference instant (deterministic scoring/tests).
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Merge type weight overrides over the current table.
    pub fn with_type_weights<I, K>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        self.weights = self.weights.merged(overrides);
        self
    }

    pub fn with_weights(mut self, weights: TypeWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Convenience for callers holding a plain override map.
    pub fn from_overrides(overrides: &HashMap<String, f64>) -> Self {
        Self::new().with_type_weights(overrides.iter().map(|(k, v)| (k.as_str(), *v)))
    }

    /// The instant all terms are computed against.
    pub fn reference_time(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }
}

/// All intermediate terms of one score computation.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreBreakdown {
    pub kind: NudgeType,
    pub base: f64,
    /// Age in fractional days (future creation times count as 0).
    pub age_days: f64,
    pub recency: f64,
    pub status: f64,
    /// Input lead quality after clamping to [0, 100], if known.
    pub lead_quality: Option<f64>,
    pub lead_quality_bonus: f64,
    /// Days stale after clamping to [0, 14]; `Some` only for `stale_lead`
    /// nudges that carry a `staleAt`.
    pub stale_days: Option<f64>,
    pub staleness: f64,
    /// Sum before the final clamp.
    pub raw_total: f64,
    pub total: f64,
}

impl ScoreBreakdown {
    pub fn was_clamped(&self) -> bool {
        self.raw_total != self.total
    }
}

/// Compute every term of the score for one nudge.
pub fn score_breakdown(nudge: &Nudge, config: &ScoringConfig) -> ScoreBreakdown {
    breakdown_at(nudge, &config.weights, config.reference_time())
}

/// Importance score in [0, 100].
pub fn compute_nudge_score(nudge: &Nudge, config: &ScoringConfig) -> f64 {
    score_breakdown(nudge, config).total
}

/// Same as [`score_breakdown`] with `now` already resolved (lets the ranker
/// score a whole batch against one instant).
pub(crate) fn breakdown_at(nudge: &Nudge, weights: &TypeWeights, now: DateTime<Utc>) -> ScoreBreakdown {
    let base = weights.base_for(&nudge.kind);

    let age_days = days_between(nudge.created_at, now).max(0.0);
    let recency = recency_bonus(age_days);

    let status = status_bonus(nudge.status);

    let lead_quality = nudge
        .lead_quality_score
        .filter(|q| q.is_finite())
        .map(|q| q.clamp(0.0, 100.0));
    let lead_quality_bonus = lead_quality.map(lead_quality_bonus).unwrap_or(0.0);

    let stale_days = match (&nudge.kind, nudge.stale_at) {
        (NudgeType::StaleLead, Some(stale_at)) => {
            Some(days_between(stale_at, now).clamp(0.0, STALENESS_CAP_DAYS))
        }
        _ => None,
    };
    let staleness = stale_days.map(staleness_bonus).unwrap_or(0.0);

    let raw_total = base + recency + status + lead_quality_bonus + staleness;
    let total = raw_total.clamp(SCORE_MIN, SCORE_MAX);

    ScoreBreakdown {
        kind: nudge.kind.clone(),
        base,
        age_days,
        recency,
        status,
        lead_quality,
        lead_quality_bonus,
        stale_days,
        staleness,
        raw_total,
        total,
    }
}

/// Exponential decay, 3-day half-life, in (0, 20].
pub fn recency_bonus(age_days: f64) -> f64 {
    RECENCY_MAX_BONUS * 0.5_f64.powf(age_days.max(0.0) / RECENCY_HALF_LIFE_DAYS)
}

pub fn status_bonus(status: NudgeStatus) -> f64 {
    match status {
        NudgeStatus::New => NEW_STATUS_BONUS,
        NudgeStatus::Seen | NudgeStatus::Handled => 0.0,
    }
}

/// Linear in quality; input clamped to [0, 100].
pub fn lead_quality_bonus(quality: f64) -> f64 {
    quality.clamp(0.0, 100.0) / 100.0 * LEAD_QUALITY_MAX_BONUS
}

/// Linear in stale days, saturating at 14.
pub fn staleness_bonus(stale_days: f64) -> f64 {
    stale_days.clamp(0.0, STALENESS_CAP_DAYS) / STALENESS_CAP_DAYS * STALENESS_MAX_BONUS
}

fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / MILLIS_PER_DAY
}
