// src/enrich/mod.rs
//! Lead-quality enrichment ahead of ranking.
//!
//! Nudges without a `leadQualityScore` but with a `leadId` are looked up in
//! one batched call to an injected [`LeadQualitySource`]. Results are merged
//! into copies of the nudges, which then go to the ranker.
//!
//! The lookup is optional and best-effort: no source, an error, or a timeout
//! all mean "no data" and ranking proceeds on the unmodified nudges. There
//! are no retries. Dropping the future cancels the pending lookup.

pub mod http;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};

use crate::nudge::{Nudge, RankedNudge};
use crate::ranker::rank_nudges;
use crate::scoring::ScoringConfig;
use crate::telemetry::ensure_metrics_described;

pub use http::{build_lead_quality_source, HttpLeadQualitySource};

/// Partial mapping `leadId -> quality`; absent entries mean "unknown".
pub type LeadQualityMap = HashMap<String, f64>;

/// Default upper bound for the batched lookup.
pub const DEFAULT_ENRICHMENT_TIMEOUT: Duration = Duration::from_millis(1500);

/// Batched lead-quality lookup.
#[async_trait::async_trait]
pub trait LeadQualitySource: Send + Sync {
    async fn fetch_lead_quality(&self, lead_ids: &BTreeSet<String>) -> anyhow::Result<LeadQualityMap>;
    /// Source name for logs.
    fn name(&self) -> &'static str;
}

pub type DynLeadQualitySource = Arc<dyn LeadQualitySource>;

/// In-memory source; useful for demos, fixtures and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticLeadQuality {
    scores: LeadQualityMap,
}

impl StaticLeadQuality {
    pub fn new(scores: LeadQualityMap) -> Self {
        Self { scores }
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for StaticLeadQuality {
    fn from_iter<T: IntoIterator<Item = (K, f64)>>(iter: T) -> Self {
        Self::new(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[async_trait::async_trait]
impl LeadQualitySource for StaticLeadQuality {
    async fn fetch_lead_quality(&self, lead_ids: &BTreeSet<String>) -> anyhow::Result<LeadQualityMap> {
        Ok(lead_ids
            .iter()
            .filter_map(|id| self.scores.get(id).map(|q| (id.clone(), *q)))
            .collect())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Options for [`rank_subconscious_nudges`].
#[derive(Clone)]
pub struct EnrichmentOptions {
    /// `None` disables enrichment.
    pub fetch_lead_quality: Option<DynLeadQualitySource>,
    pub timeout: Duration,
    pub scoring: ScoringConfig,
}

impl Default for EnrichmentOptions {
    fn default() -> Self {
        Self {
            fetch_lead_quality: None,
            timeout: DEFAULT_ENRICHMENT_TIMEOUT,
            scoring: ScoringConfig::default(),
        }
    }
}

impl EnrichmentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: DynLeadQualitySource) -> Self {
        self.fetch_lead_quality = Some(source);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }
}

impl std::fmt::Debug for EnrichmentOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrichmentOptions")
            .field(
                "fetch_lead_quality",
                &self.fetch_lead_quality.as_ref().map(|s| s.name()),
            )
            .field("timeout", &self.timeout)
            .field("scoring", &self.scoring)
            .finish()
    }
}

/// What happened during enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentOutcome {
    /// No source configured.
    NoSource,
    /// Every nudge already had a score or no lead id; no call made.
    NothingMissing,
    Enriched {
        /// Distinct lead ids sent in the batch.
        requested: usize,
        /// Entries the source returned.
        returned: usize,
        /// Nudges that received a score.
        applied: usize,
    },
    /// The source returned an error.
    Failed(String),
    TimedOut,
}

impl EnrichmentOutcome {
    fn metric_label(&self) -> &'static str {
        match self {
            EnrichmentOutcome::NoSource => "no_source",
            EnrichmentOutcome::NothingMissing => "nothing_missing",
            EnrichmentOutcome::Enriched { .. } => "enriched",
            EnrichmentOutcome::Failed(_) => "failed",
            EnrichmentOutcome::TimedOut => "timed_out",
        }
    }
}

/// Enriched copies plus the outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    pub nudges: Vec<Nudge>,
    pub outcome: EnrichmentOutcome,
}

/// Distinct, non-blank lead ids of nudges that lack a quality score.
pub fn missing_lead_ids(nudges: &[Nudge]) -> BTreeSet<String> {
    nudges
        .iter()
        .filter(|n| n.lead_quality_score.is_none())
        .filter_map(|n| n.lead_id.as_deref())
        .filter(|id| !id.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Copies of `nudges` with scores from `scores` filled in where missing.
/// Returns the copies and how many received a score.
pub fn merge_lead_quality(nudges: &[Nudge], scores: &LeadQualityMap) -> (Vec<Nudge>, usize) {
    let mut applied = 0usize;
    let merged = nudges
        .iter()
        .map(|n| {
            let mut copy = n.clone();
            if copy.lead_quality_score.is_none() {
                if let Some(q) = copy
                    .lead_id
                    .as_ref()
                    .and_then(|id| scores.get(id))
                    .copied()
                    .filter(|q| q.is_finite())
                {
                    copy.lead_quality_score = Some(q);
                    applied += 1;
                }
            }
            copy
        })
        .collect();
    (merged, applied)
}

/// Run the enrichment step alone. Never fails: every problem degrades to the
/// unmodified nudges with the matching [`EnrichmentOutcome`].
pub async fn enrich_nudges(
    nudges: &[Nudge],
    source: Option<&dyn LeadQualitySource>,
    timeout: Duration,
) -> Enrichment {
    ensure_metrics_described();

    let Some(source) = source else {
        return finish(nudges.to_vec(), EnrichmentOutcome::NoSource);
    };

    let lead_ids = missing_lead_ids(nudges);
    if lead_ids.is_empty() {
        return finish(nudges.to_vec(), EnrichmentOutcome::NothingMissing);
    }

    let started = Instant::now();
    let result = tokio::time::timeout(timeout, source.fetch_lead_quality(&lead_ids)).await;
    histogram!("nudge_enrichment_lookup_ms").record(started.elapsed().as_secs_f64() * 1000.0);

    match result {
        Ok(Ok(scores)) => {
            let (merged, applied) = merge_lead_quality(nudges, &scores);
            tracing::debug!(
                target: "nudge_ranker",
                source = source.name(),
                requested = lead_ids.len(),
                returned = scores.len(),
                applied,
                "lead quality enrichment applied"
            );
            finish(
                merged,
                EnrichmentOutcome::Enriched {
                    requested: lead_ids.len(),
                    returned: scores.len(),
                    applied,
                },
            )
        }
        Ok(Err(e)) => {
            tracing::warn!(target: "nudge_ranker", source = source.name(), error = ?e, "lead quality lookup failed; ranking without enrichment");
            finish(nudges.to_vec(), EnrichmentOutcome::Failed(e.to_string()))
        }
        Err(_) => {
            tracing::warn!(target: "nudge_ranker", source = source.name(), timeout_ms = timeout.as_millis() as u64, "lead quality lookup timed out; ranking without enrichment");
            finish(nudges.to_vec(), EnrichmentOutcome::TimedOut)
        }
    }
}

/// Enrich (optionally) and rank. The enrichment failure never reaches the
/// caller; the worst case is an un-enriched ranking.
pub async fn rank_subconscious_nudges(nudges: &[Nudge], options: &EnrichmentOptions) -> Vec<RankedNudge> {
    let enrichment = enrich_nudges(nudges, options.fetch_lead_quality.as_deref(), options.timeout).await;
    rank_nudges(&enrichment.nudges, &options.scoring)
}

fn finish(nudges: Vec<Nudge>, outcome: EnrichmentOutcome) -> Enrichment {
    counter!("nudge_enrichment_total", "outcome" => outcome.metric_label()).increment(1);
    Enrichment { nudges, outcome }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nudge::{NudgeStatus, NudgeType};
    use chrono::{TimeZone, Utc};

    fn n(id: &str, lead: Option<&str>, q: Option<f64>) -> Nudge {
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let mut nudge = Nudge::new(id, NudgeType::FollowUp, NudgeStatus::Seen, ts);
        nudge.lead_id = lead.map(str::to_string);
        nudge.lead_quality_score = q;
        nudge
    }

    #[test]
    fn missing_ids_are_distinct_and_skip_known_scores() {
        let nudges = vec![
            n("1", Some("L1"), None),
            n("2", Some("L1"), None),
            n("3", Some("L2"), Some(40.0)),
            n("4", None, None),
            n("5", Some("L3"), None),
        ];
        let ids: Vec<_> = missing_lead_ids(&nudges).into_iter().collect();
        assert_eq!(ids, vec!["L1".to_string(), "L3".to_string()]);
    }

    #[test]
    fn blank_lead_ids_are_never_looked_up() {
        let nudges = vec![n("1", Some(""), None), n("2", Some("   "), None)];
        assert!(missing_lead_ids(&nudges).is_empty());

        let mixed = vec![n("1", Some(" "), None), n("2", Some("L7"), None)];
        let ids: Vec<_> = missing_lead_ids(&mixed).into_iter().collect();
        assert_eq!(ids, vec!["L7".to_string()]);
    }

    #[test]
    fn merge_fills_only_missing_scores() {
        let nudges = vec![
            n("1", Some("L1"), None),
            n("2", Some("L2"), Some(10.0)),
            n("3", Some("L9"), None),
            n("4", Some("L4"), None),
        ];
        let scores: LeadQualityMap = [
            ("L1".to_string(), 80.0),
            ("L2".to_string(), 99.0),
            ("L4".to_string(), f64::NAN),
        ]
        .into_iter()
        .collect();
        let (merged, applied) = merge_lead_quality(&nudges, &scores);
        assert_eq!(applied, 1);
        assert_eq!(merged[0].lead_quality_score, Some(80.0));
        assert_eq!(merged[1].lead_quality_score, Some(10.0));
        assert_eq!(merged[2].lead_quality_score, None);
        assert_eq!(merged[3].lead_quality_score, None);
        // Originals untouched.
        assert_eq!(nudges[0].lead_quality_score, None);
    }

    #[tokio::test]
    async fn static_source_returns_partial_map() {
        let src: StaticLeadQuality = [("L1", 50.0), ("L2", 75.0)].into_iter().collect();
        let ids: BTreeSet<String> = ["L1".to_string(), "L3".to_string()].into_iter().collect();
        let out = src.fetch_lead_quality(&ids).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.get("L1"), Some(&50.0));
    }

    #[tokio::test]
    async fn no_source_passes_through() {
        let nudges = vec![n("1", Some("L1"), None)];
        let e = enrich_nudges(&nudges, None, DEFAULT_ENRICHMENT_TIMEOUT).await;
        assert_eq!(e.outcome, EnrichmentOutcome::NoSource);
        assert_eq!(e.nudges, nudges);
    }
}
