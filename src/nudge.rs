//! # Nudges
//! Data model for the ranking engine plus the ingestion boundary.
//!
//! Nudges arrive from the host application in a loose wire shape ([`RawNudge`]):
//! string type/status and timestamps that are either epoch milliseconds or
//! ISO-8601 strings. They are normalized exactly once into [`Nudge`], so the
//! scoring code never re-parses anything.
//!
//! Policy for bad records: a nudge that fails to normalize (blank id, unknown
//! status, unparseable `createdAt`/`staleAt`) is rejected on its own and
//! reported back; the rest of the batch is unaffected.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::label::ImportanceLabel;

/// Category of a nudge. Unknown categories are kept verbatim so new kinds
/// created upstream degrade to the default base weight instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NudgeType {
    FollowUp,
    StaleLead,
    Engagement,
    Reminder,
    Insight,
    Other(String),
}

impl NudgeType {
    pub fn as_str(&self) -> &str {
        match self {
            NudgeType::FollowUp => "follow_up",
            NudgeType::StaleLead => "stale_lead",
            NudgeType::Engagement => "engagement",
            NudgeType::Reminder => "reminder",
            NudgeType::Insight => "insight",
            NudgeType::Other(s) => s.as_str(),
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "follow_up" => NudgeType::FollowUp,
            "stale_lead" => NudgeType::StaleLead,
            "engagement" => NudgeType::Engagement,
            "reminder" => NudgeType::Reminder,
            "insight" => NudgeType::Insight,
            other => NudgeType::Other(other.to_string()),
        }
    }
}

impl From<String> for NudgeType {
    fn from(s: String) -> Self {
        match NudgeType::parse(&s) {
            NudgeType::Other(_) => NudgeType::Other(s),
            known => known,
        }
    }
}

impl From<&str> for NudgeType {
    fn from(s: &str) -> Self {
        NudgeType::parse(s)
    }
}

impl From<NudgeType> for String {
    fn from(t: NudgeType) -> Self {
        match t {
            NudgeType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for NudgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NudgeStatus {
    New,
    Seen,
    Handled,
}

impl NudgeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            NudgeStatus::New => "new",
            NudgeStatus::Seen => "seen",
            NudgeStatus::Handled => "handled",
        }
    }

    /// Case-insensitive, whitespace-tolerant parse.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Some(NudgeStatus::New),
            "seen" => Some(NudgeStatus::Seen),
            "handled" => Some(NudgeStatus::Handled),
            _ => None,
        }
    }
}

/// Normalized nudge. Built by the host application (or via [`ingest_nudges`])
/// and only ever borrowed by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nudge {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NudgeType,
    pub status: NudgeStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_quality_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Nudge {
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<NudgeType>,
        status: NudgeStatus,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            status,
            created_at,
            lead_id: None,
            lead_quality_score: None,
            stale_at: None,
            message: None,
        }
    }

    pub fn with_lead(mut self, lead_id: impl Into<String>) -> Self {
        self.lead_id = Some(lead_id.into());
        self
    }

    pub fn with_lead_quality(mut self, score: f64) -> Self {
        self.lead_quality_score = Some(score).filter(|s| s.is_finite());
        self
    }

    pub fn with_stale_at(mut self, stale_at: DateTime<Utc>) -> Self {
        self.stale_at = Some(stale_at);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Ranker output: the nudge copy plus its importance annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedNudge {
    #[serde(flatten)]
    pub nudge: Nudge,
    pub importance_score: f64,
    pub importance_label: ImportanceLabel,
}

// ------------------------------------------------------------
// Ingestion boundary
// ------------------------------------------------------------

/// Timestamp as it arrives on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Epoch milliseconds.
    Millis(i64),
    /// Epoch milliseconds with a fractional part (JS `Date.now()` math).
    FractionalMillis(f64),
    /// ISO-8601 string.
    Iso(String),
}

impl From<DateTime<Utc>> for RawTimestamp {
    fn from(ts: DateTime<Utc>) -> Self {
        RawTimestamp::Iso(ts.to_rfc3339())
    }
}

impl fmt::Display for RawTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawTimestamp::Millis(ms) => write!(f, "{ms}"),
            RawTimestamp::FractionalMillis(ms) => write!(f, "{ms}"),
            RawTimestamp::Iso(s) => f.write_str(s),
        }
    }
}

impl RawTimestamp {
    /// Normalize into UTC. `None` means the value is not a usable timestamp.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            RawTimestamp::Millis(ms) => DateTime::from_timestamp_millis(*ms),
            RawTimestamp::FractionalMillis(ms) => {
                // Beyond ~±8.64e15 ms chrono has no representation anyway.
                if !ms.is_finite() || ms.abs() > 8.64e15 {
                    return None;
                }
                DateTime::from_timestamp_millis(ms.round() as i64)
            }
            RawTimestamp::Iso(s) => parse_iso8601(s),
        }
    }
}

/// Accepts RFC 3339 (with offset or `Z`), naive date-times (read as UTC) and
/// bare dates (UTC midnight).
pub fn parse_iso8601(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Loose wire shape of a nudge, as produced by the storage/API layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNudge {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub created_at: RawTimestamp,
    #[serde(default)]
    pub lead_id: Option<String>,
    #[serde(default)]
    pub lead_quality_score: Option<f64>,
    #[serde(default)]
    pub stale_at: Option<RawTimestamp>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Why a single nudge could not be normalized.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NudgeParseError {
    #[error("nudge is missing an id")]
    MissingId,

    #[error("nudge `{id}`: unknown status `{value}`")]
    UnknownStatus { id: String, value: String },

    #[error("nudge `{id}`: `{field}` is not a valid timestamp: `{value}`")]
    InvalidTimestamp {
        id: String,
        field: &'static str,
        value: String,
    },

    #[error("malformed nudge record: {0}")]
    Malformed(String),
}

impl TryFrom<RawNudge> for Nudge {
    type Error = NudgeParseError;

    fn try_from(raw: RawNudge) -> Result<Self, Self::Error> {
        let id = raw.id.trim().to_string();
        if id.is_empty() {
            return Err(NudgeParseError::MissingId);
        }

        let status = NudgeStatus::parse(&raw.status).ok_or_else(|| NudgeParseError::UnknownStatus {
            id: id.clone(),
            value: raw.status.clone(),
        })?;

        let created_at = raw
            .created_at
            .to_utc()
            .ok_or_else(|| NudgeParseError::InvalidTimestamp {
                id: id.clone(),
                field: "createdAt",
                value: raw.created_at.to_string(),
            })?;

        let stale_at = match &raw.stale_at {
            Some(ts) => Some(ts.to_utc().ok_or_else(|| NudgeParseError::InvalidTimestamp {
                id: id.clone(),
                field: "staleAt",
                value: ts.to_string(),
            })?),
            None => None,
        };

        Ok(Nudge {
            id,
            kind: NudgeType::from(raw.kind),
            status,
            created_at,
            lead_id: raw.lead_id.filter(|l| !l.trim().is_empty()),
            lead_quality_score: raw.lead_quality_score.filter(|q| q.is_finite()),
            stale_at,
            message: raw.message,
        })
    }
}

/// A record that did not survive ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedNudge {
    /// Present whenever the record carried a non-blank id.
    pub id: Option<String>,
    pub error: NudgeParseError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Normalized nudges, in input order.
    pub accepted: Vec<Nudge>,
    /// Rejected records, in input order.
    pub rejected: Vec<RejectedNudge>,
}

/// Normalize a batch, rejecting bad records individually.
pub fn ingest_nudges(raw: Vec<RawNudge>) -> IngestReport {
    let mut report = IngestReport {
        accepted: Vec::with_capacity(raw.len()),
        rejected: Vec::new(),
    };
    for r in raw {
        let id = Some(r.id.trim().to_string()).filter(|s| !s.is_empty());
        match Nudge::try_from(r) {
            Ok(n) => report.accepted.push(n),
            Err(error) => report.reject(id, error),
        }
    }
    report
}

/// Parse a JSON array of nudges. Each element is decoded on its own so a
/// single malformed element only rejects itself; a document that is not an
/// array is an error.
pub fn parse_nudges_json(json: &str) -> anyhow::Result<IngestReport> {
    let values: Vec<serde_json::Value> = serde_json::from_str(json)
        .map_err(|e| anyhow::anyhow!("nudge document must be a JSON array: {e}"))?;

    let mut report = IngestReport {
        accepted: Vec::with_capacity(values.len()),
        rejected: Vec::new(),
    };
    for v in values {
        let id = v
            .get("id")
            .and_then(|i| i.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let parsed = serde_json::from_value::<RawNudge>(v)
            .map_err(|e| NudgeParseError::Malformed(e.to_string()))
            .and_then(Nudge::try_from);
        match parsed {
            Ok(n) => report.accepted.push(n),
            Err(error) => report.reject(id, error),
        }
    }
    Ok(report)
}

impl IngestReport {
    fn reject(&mut self, id: Option<String>, error: NudgeParseError) {
        tracing::warn!(target: "nudge_ranker", nudge_id = ?id, %error, "nudge rejected at ingestion");
        counter!("nudge_ingest_rejected_total").increment(1);
        self.rejected.push(RejectedNudge { id, error });
    }
}
