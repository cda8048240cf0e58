// tests/enrichment.rs
//
// Enrichment orchestrator: one batched lookup, merge rules, and graceful
// degradation on errors, timeouts and cancellation.

use std::collections::BTreeSet;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use nudge_ranker::{
    enrich_nudges, rank_nudges, rank_subconscious_nudges, EnrichmentOptions, EnrichmentOutcome,
    LeadQualityMap, LeadQualitySource, Nudge, NudgeStatus, NudgeType, ScoringConfig,
    StaticLeadQuality,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 16, 10, 0, 0).unwrap()
}

fn scoring() -> ScoringConfig {
    ScoringConfig::new().at(now())
}

/// Records every batch it is asked for.
#[derive(Default)]
struct CountingSource {
    calls: AtomicUsize,
    batches: Mutex<Vec<BTreeSet<String>>>,
    scores: LeadQualityMap,
}

#[async_trait::async_trait]
impl LeadQualitySource for CountingSource {
    async fn fetch_lead_quality(&self, lead_ids: &BTreeSet<String>) -> anyhow::Result<LeadQualityMap> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(lead_ids.clone());
        Ok(lead_ids
            .iter()
            .filter_map(|id| self.scores.get(id).map(|q| (id.clone(), *q)))
            .collect())
    }
    fn name(&self) -> &'static str {
        "counting"
    }
}

struct FailingSource;

#[async_trait::async_trait]
impl LeadQualitySource for FailingSource {
    async fn fetch_lead_quality(&self, _lead_ids: &BTreeSet<String>) -> anyhow::Result<LeadQualityMap> {
        anyhow::bail!("crm unavailable")
    }
    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Sleeps far past any sane timeout; flags completion.
#[derive(Default)]
struct SlowSource {
    completed: AtomicBool,
}

#[async_trait::async_trait]
impl LeadQualitySource for SlowSource {
    async fn fetch_lead_quality(&self, lead_ids: &BTreeSet<String>) -> anyhow::Result<LeadQualityMap> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        self.completed.store(true, Ordering::SeqCst);
        Ok(lead_ids.iter().map(|id| (id.clone(), 100.0)).collect())
    }
    fn name(&self) -> &'static str {
        "slow"
    }
}

fn worklist() -> Vec<Nudge> {
    vec![
        Nudge::new("a", NudgeType::Insight, NudgeStatus::Seen, now()).with_lead("L1"),
        Nudge::new("b", NudgeType::Reminder, NudgeStatus::Seen, now()).with_lead("L1"),
        Nudge::new("c", NudgeType::Engagement, NudgeStatus::Seen, now())
            .with_lead("L2")
            .with_lead_quality(10.0),
        Nudge::new("d", NudgeType::FollowUp, NudgeStatus::Seen, now()),
        Nudge::new("e", NudgeType::Engagement, NudgeStatus::Seen, now()).with_lead("L3"),
    ]
}

#[tokio::test]
async fn one_batched_call_with_distinct_missing_ids() {
    let source = Arc::new(CountingSource {
        scores: [("L1".to_string(), 100.0), ("L2".to_string(), 100.0)]
            .into_iter()
            .collect(),
        ..Default::default()
    });
    let options = EnrichmentOptions::new()
        .with_source(source.clone())
        .with_scoring(scoring());

    let ranked = rank_subconscious_nudges(&worklist(), &options).await;

    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    let batches = source.batches.lock().unwrap();
    let sent: Vec<_> = batches[0].iter().cloned().collect();
    assert_eq!(sent, vec!["L1".to_string(), "L3".to_string()]);

    let by_id = |id: &str| ranked.iter().find(|r| r.nudge.id == id).unwrap();
    assert_eq!(by_id("a").nudge.lead_quality_score, Some(100.0));
    assert_eq!(by_id("b").nudge.lead_quality_score, Some(100.0));
    // Existing score is never overwritten.
    assert_eq!(by_id("c").nudge.lead_quality_score, Some(10.0));
    // No lead id, and lead id without a returned entry, pass through.
    assert_eq!(by_id("d").nudge.lead_quality_score, None);
    assert_eq!(by_id("e").nudge.lead_quality_score, None);
}

#[tokio::test]
async fn enrichment_changes_the_order() {
    // Without enrichment the reminder (30) sits below the engagement (40);
    // a max lead quality (+15) on the reminder flips them.
    let nudges = vec![
        Nudge::new("eng", NudgeType::Engagement, NudgeStatus::Seen, now()),
        Nudge::new("rem", NudgeType::Reminder, NudgeStatus::Seen, now()).with_lead("HOT"),
    ];
    let plain = rank_nudges(&nudges, &scoring());
    assert_eq!(plain[0].nudge.id, "eng");

    let source: StaticLeadQuality = [("HOT", 100.0)].into_iter().collect();
    let options = EnrichmentOptions::new()
        .with_source(Arc::new(source))
        .with_scoring(scoring());
    let enriched = rank_subconscious_nudges(&nudges, &options).await;
    assert_eq!(enriched[0].nudge.id, "rem");
    // Caller's nudges are untouched.
    assert_eq!(nudges[1].lead_quality_score, None);
}

#[tokio::test]
async fn no_call_when_nothing_is_missing() {
    let source = Arc::new(CountingSource::default());
    let nudges = vec![
        Nudge::new("a", NudgeType::Insight, NudgeStatus::Seen, now()).with_lead_quality(50.0),
        Nudge::new("b", NudgeType::Insight, NudgeStatus::Seen, now()),
    ];
    let e = enrich_nudges(&nudges, Some(&*source), Duration::from_secs(1)).await;
    assert_eq!(e.outcome, EnrichmentOutcome::NothingMissing);
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failure_degrades_to_unenriched_ranking() {
    let nudges = worklist();
    let e = enrich_nudges(&nudges, Some(&FailingSource), Duration::from_secs(1)).await;
    assert!(matches!(e.outcome, EnrichmentOutcome::Failed(ref msg) if msg.contains("crm unavailable")));
    assert_eq!(e.nudges, nudges);

    let options = EnrichmentOptions::new()
        .with_source(Arc::new(FailingSource))
        .with_scoring(scoring());
    let ranked = rank_subconscious_nudges(&nudges, &options).await;
    assert_eq!(ranked, rank_nudges(&nudges, &scoring()));
}

#[tokio::test(start_paused = true)]
async fn timeout_degrades_to_unenriched_ranking() {
    let source = Arc::new(SlowSource::default());
    let nudges = worklist();

    let e = enrich_nudges(&nudges, Some(&*source), Duration::from_millis(200)).await;
    assert_eq!(e.outcome, EnrichmentOutcome::TimedOut);
    assert_eq!(e.nudges, nudges);
    assert!(!source.completed.load(Ordering::SeqCst));

    let options = EnrichmentOptions::new()
        .with_source(source.clone())
        .with_timeout(Duration::from_millis(200))
        .with_scoring(scoring());
    let ranked = rank_subconscious_nudges(&nudges, &options).await;
    assert_eq!(ranked, rank_nudges(&nudges, &scoring()));
}

#[tokio::test(start_paused = true)]
async fn dropping_the_request_cancels_the_lookup() {
    let source = Arc::new(SlowSource::default());
    let options = EnrichmentOptions::new()
        .with_source(source.clone())
        .with_timeout(Duration::from_secs(60))
        .with_scoring(scoring());
    let nudges = worklist();

    // Caller abandons the request after 1s.
    let abandoned =
        tokio::time::timeout(Duration::from_secs(1), rank_subconscious_nudges(&nudges, &options)).await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(!source.completed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn without_source_ranking_matches_plain_ranker() {
    let nudges = worklist();
    let options = EnrichmentOptions::new().with_scoring(scoring());
    let ranked = rank_subconscious_nudges(&nudges, &options).await;
    assert_eq!(ranked, rank_nudges(&nudges, &scoring()));
}

#[tokio::test]
async fn empty_input() {
    let options = EnrichmentOptions::new()
        .with_source(Arc::new(FailingSource))
        .with_scoring(scoring());
    assert!(rank_subconscious_nudges(&[], &options).await.is_empty());
}
