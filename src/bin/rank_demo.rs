//! Demo: rank a nudge file (or a built-in sample) and print explanations.
//!
//! ```text
//! cargo run --bin rank_demo -- path/to/nudges.json
//! ```
//!
//! Settings come from `config/nudge_ranking.toml` (or `$NUDGE_RANKING_CONFIG_PATH`).

use anyhow::Context;
use chrono::{Duration, Utc};
use nudge_ranker::{
    build_lead_quality_source, explain_nudge_score, parse_nudges_json, rank_subconscious_nudges,
    telemetry, Nudge, NudgeStatus, NudgeType, RankingSettings, StaticLeadQuality,
};
use std::sync::Arc;

fn sample_nudges() -> Vec<Nudge> {
    let now = Utc::now();
    vec![
        Nudge::new("n-1", NudgeType::Insight, NudgeStatus::Seen, now - Duration::days(14))
            .with_message("Pipeline velocity dropped"),
        Nudge::new("n-2", NudgeType::FollowUp, NudgeStatus::New, now - Duration::hours(3))
            .with_lead("L-100")
            .with_message("Reply to pricing question"),
        Nudge::new("n-3", NudgeType::StaleLead, NudgeStatus::New, now - Duration::days(1))
            .with_lead("L-200")
            .with_stale_at(now - Duration::days(9))
            .with_message("No contact in 9 days"),
        Nudge::new("n-4", NudgeType::Reminder, NudgeStatus::Handled, now)
            .with_message("Send contract"),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let settings = RankingSettings::load_default().context("loading ranking settings")?;

    let nudges = match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            let report = parse_nudges_json(&json)?;
            for r in &report.rejected {
                println!("skipped {:?}: {}", r.id, r.error);
            }
            report.accepted
        }
        None => sample_nudges(),
    };

    // Without a configured endpoint, demo with a fixed in-memory lookup.
    let source = build_lead_quality_source(&settings.enrichment).or_else(|| {
        let fixed: StaticLeadQuality = [("L-100", 85.0), ("L-200", 40.0)].into_iter().collect();
        Some(Arc::new(fixed) as nudge_ranker::DynLeadQualitySource)
    });
    let mut options = settings.enrichment_options(source);
    // Pin `now` so the explanations match the ranked scores exactly.
    options.scoring = options.scoring.at(Utc::now());

    let ranked = rank_subconscious_nudges(&nudges, &options).await;
    for (i, r) in ranked.iter().enumerate() {
        println!(
            "#{} {} [{}] {:.1} {}",
            i + 1,
            r.nudge.id,
            r.importance_label,
            r.importance_score,
            r.nudge.message.as_deref().unwrap_or("")
        );
        for line in explain_nudge_score(&r.nudge, &options.scoring).lines() {
            println!("    {line}");
        }
    }

    Ok(())
}
