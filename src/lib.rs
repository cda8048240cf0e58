// src/lib.rs
//! Nudge importance ranking engine.
//!
//! Scores pending nudges (follow-ups, stale leads, engagement prompts,
//! reminders, insights), labels them and returns a priority-ordered worklist.
//! Optionally fills in missing lead-quality signals with one batched lookup
//! before ranking.
//!
//! ```ignore
//! use nudge_ranker::{rank_nudges, ScoringConfig};
//!
//! let ranked = rank_nudges(&nudges, &ScoringConfig::new());
//! for r in &ranked {
//!     println!("{} {:.1} {}", r.nudge.id, r.importance_score, r.importance_label);
//! }
//! ```

pub mod config;
pub mod enrich;
pub mod explain;
pub mod label;
pub mod nudge;
pub mod ranker;
pub mod scoring;
pub mod telemetry;
pub mod weights;

// ---- Re-exports for stable public API ----
pub use crate::config::{EnrichmentConfig, RankingSettings};
pub use crate::enrich::{
    build_lead_quality_source, enrich_nudges, rank_subconscious_nudges, DynLeadQualitySource,
    Enrichment, EnrichmentOptions, EnrichmentOutcome, LeadQualityMap, LeadQualitySource,
    StaticLeadQuality,
};
pub use crate::explain::{explain_components, explain_nudge_score, ScoreExplanation};
pub use crate::label::{get_importance_label, ImportanceLabel};
pub use crate::nudge::{
    ingest_nudges, parse_nudges_json, IngestReport, Nudge, NudgeParseError, NudgeStatus,
    NudgeType, RankedNudge, RawNudge, RawTimestamp, RejectedNudge,
};
pub use crate::ranker::{rank_nudges, rank_raw_nudges, RankingOutcome};
pub use crate::scoring::{compute_nudge_score, score_breakdown, ScoreBreakdown, ScoringConfig};
pub use crate::weights::{HotReloadTypeWeights, TypeWeights};
