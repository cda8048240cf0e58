//! explain.rs: human-readable trace of a nudge's score.
//!
//! Built from the same [`ScoreBreakdown`] the ranker uses, so the text can
//! never drift from the actual computation. Purely presentational.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::label::{get_importance_label, ImportanceLabel};
use crate::nudge::{Nudge, NudgeStatus, NudgeType};
use crate::scoring::{score_breakdown, ScoreBreakdown, ScoringConfig};

/// Which term of the score a line describes. Keeps UI grouping consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Base,
    Recency,
    Status,
    LeadQuality,
    Staleness,
    Total,
}

/// One line of the explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationLine {
    pub kind: ComponentKind,
    /// Points this term contributed (for `Total`, the final score).
    pub points: f64,
    pub message: String,
}

impl ExplanationLine {
    fn new(kind: ComponentKind, points: f64, message: impl Into<String>) -> Self {
        Self {
            kind,
            points,
            message: message.into(),
        }
    }
}

/// Structured explanation; `Display` renders one line per term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreExplanation {
    pub nudge_id: String,
    pub score: f64,
    pub label: ImportanceLabel,
    pub lines: Vec<ExplanationLine>,
}

impl fmt::Display for ScoreExplanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            f.write_str(&line.message)?;
        }
        Ok(())
    }
}

/// Structured breakdown of a nudge's score.
pub fn explain_components(nudge: &Nudge, config: &ScoringConfig) -> ScoreExplanation {
    let b = score_breakdown(nudge, config);
    ScoreExplanation {
        nudge_id: nudge.id.clone(),
        score: b.total,
        label: get_importance_label(b.total),
        lines: lines_for(nudge, &b),
    }
}

/// Multi-line text trace, e.g.
///
/// ```text
/// Type: stale_lead (base 50)
/// Recency: +20.0 (age 0.0 days)
/// Status: new (+10)
/// Lead quality: 70 (+10.5)
/// Staleness: 14.0 days stale (+10.0)
/// Score: 100.0 (high; raw 100.5, clamped)
/// ```
pub fn explain_nudge_score(nudge: &Nudge, config: &ScoringConfig) -> String {
    explain_components(nudge, config).to_string()
}

fn lines_for(nudge: &Nudge, b: &ScoreBreakdown) -> Vec<ExplanationLine> {
    let mut lines = Vec::with_capacity(6);

    lines.push(ExplanationLine::new(
        ComponentKind::Base,
        b.base,
        format!("Type: {} (base {})", b.kind, fmt_num(b.base)),
    ));

    lines.push(ExplanationLine::new(
        ComponentKind::Recency,
        b.recency,
        format!("Recency: +{:.1} (age {:.1} days)", b.recency, b.age_days),
    ));

    if nudge.status == NudgeStatus::New {
        lines.push(ExplanationLine::new(
            ComponentKind::Status,
            b.status,
            format!("Status: new (+{})", fmt_num(b.status)),
        ));
    }

    if let Some(q) = b.lead_quality {
        lines.push(ExplanationLine::new(
            ComponentKind::LeadQuality,
            b.lead_quality_bonus,
            format!("Lead quality: {} (+{:.1})", fmt_num(q), b.lead_quality_bonus),
        ));
    }

    if b.kind == NudgeType::StaleLead {
        let message = match b.stale_days {
            Some(days) => format!("Staleness: {:.1} days stale (+{:.1})", days, b.staleness),
            None => "Staleness: no staleAt recorded (+0.0)".to_string(),
        };
        lines.push(ExplanationLine::new(ComponentKind::Staleness, b.staleness, message));
    }

    let label = get_importance_label(b.total);
    let total = if b.was_clamped() {
        format!("Score: {:.1} ({label}; raw {:.1}, clamped)", b.total, b.raw_total)
    } else {
        format!("Score: {:.1} ({label})", b.total)
    };
    lines.push(ExplanationLine::new(ComponentKind::Total, b.total, total));

    lines
}

/// Whole numbers without a trailing `.0`, otherwise one decimal.
fn fmt_num(x: f64) -> String {
    if x.fract() == 0.0 {
        format!("{x:.0}")
    } else {
        format!("{x:.1}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn seen_insight_has_only_base_recency_total() {
        let n = Nudge::new("i", NudgeType::Insight, NudgeStatus::Seen, now() - Duration::days(3));
        let text = explain_nudge_score(&n, &ScoringConfig::new().at(now()));
        assert_eq!(
            text,
            "Type: insight (base 20)\nRecency: +10.0 (age 3.0 days)\nScore: 30.0 (low)"
        );
    }

    #[test]
    fn full_stale_lead_lists_every_term() {
        let n = Nudge::new("s", NudgeType::StaleLead, NudgeStatus::New, now())
            .with_lead_quality(70.0)
            .with_stale_at(now() - Duration::days(14));
        let e = explain_components(&n, &ScoringConfig::new().at(now()));
        let kinds: Vec<_> = e.lines.iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ComponentKind::Base,
                ComponentKind::Recency,
                ComponentKind::Status,
                ComponentKind::LeadQuality,
                ComponentKind::Staleness,
                ComponentKind::Total,
            ]
        );
        let text = e.to_string();
        assert!(text.contains("Lead quality: 70 (+10.5)"), "{text}");
        assert!(text.contains("Staleness: 14.0 days stale (+10.0)"), "{text}");
        assert!(text.ends_with("Score: 100.0 (high; raw 100.5, clamped)"), "{text}");
        assert_eq!(e.label, ImportanceLabel::High);
    }

    #[test]
    fn stale_lead_without_stale_at_says_so() {
        let n = Nudge::new("s", NudgeType::StaleLead, NudgeStatus::Seen, now());
        let text = explain_nudge_score(&n, &ScoringConfig::new().at(now()));
        assert!(text.contains("Staleness: no staleAt recorded (+0.0)"));
    }

    #[test]
    fn stale_at_on_other_types_is_not_mentioned() {
        let n = Nudge::new("r", NudgeType::Reminder, NudgeStatus::Seen, now())
            .with_stale_at(now() - Duration::days(5));
        let text = explain_nudge_score(&n, &ScoringConfig::new().at(now()));
        assert!(!text.contains("Staleness"));
    }

    #[test]
    fn total_line_matches_computed_score() {
        let cfg = ScoringConfig::new().at(now());
        let n = Nudge::new("e", NudgeType::Engagement, NudgeStatus::New, now() - Duration::hours(30))
            .with_lead_quality(33.0);
        let e = explain_components(&n, &cfg);
        let total = e.lines.last().unwrap();
        assert_eq!(total.kind, ComponentKind::Total);
        assert_eq!(total.points, crate::scoring::compute_nudge_score(&n, &cfg));
    }
}
