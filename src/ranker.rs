//! # Ranker
//! Scores and labels a batch of nudges and returns them in priority order.
//!
//! Order: `importanceScore` desc, then `createdAt` desc (newer first), then
//! input order (the sort is stable). The whole batch is scored against a single
//! reference instant.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use metrics::counter;

use crate::label::get_importance_label;
use crate::nudge::{ingest_nudges, Nudge, RankedNudge, RawNudge, RejectedNudge};
use crate::scoring::{breakdown_at, ScoringConfig};
use crate::telemetry::ensure_metrics_described;
use crate::weights::TypeWeights;

/// Rank already-normalized nudges. Output is a permutation of the input.
pub fn rank_nudges(nudges: &[Nudge], config: &ScoringConfig) -> Vec<RankedNudge> {
    ensure_metrics_described();
    let now = config.reference_time();

    let mut ranked: Vec<RankedNudge> = nudges
        .iter()
        .map(|n| annotate(n, &config.weights, now))
        .collect();
    ranked.sort_by(priority_order);

    counter!("nudge_rank_calls_total").increment(1);
    counter!("nudges_ranked_total").increment(ranked.len() as u64);
    tracing::debug!(target: "nudge_ranker", count = ranked.len(), now = %now, "ranked nudges");

    ranked
}

/// Ranking result for raw (wire-shaped) input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankingOutcome {
    pub ranked: Vec<RankedNudge>,
    /// Nudges that failed normalization and were left out.
    pub rejected: Vec<RejectedNudge>,
}

/// Ingest then rank. Records that fail to normalize are rejected individually
/// and reported next to the ranked list.
pub fn rank_raw_nudges(raw: Vec<RawNudge>, config: &ScoringConfig) -> RankingOutcome {
    let report = ingest_nudges(raw);
    RankingOutcome {
        ranked: rank_nudges(&report.accepted, config),
        rejected: report.rejected,
    }
}

fn annotate(nudge: &Nudge, weights: &TypeWeights, now: DateTime<Utc>) -> RankedNudge {
    let score = breakdown_at(nudge, weights, now).total;
    RankedNudge {
        nudge: nudge.clone(),
        importance_score: score,
        importance_label: get_importance_label(score),
    }
}

/// Descending score, then descending creation time.
pub fn priority_order(a: &RankedNudge, b: &RankedNudge) -> Ordering {
    b.importance_score
        .total_cmp(&a.importance_score)
        .then_with(|| b.nudge.created_at.cmp(&a.nudge.created_at))
}
