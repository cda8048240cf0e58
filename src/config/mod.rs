// src/config/mod.rs
//! Optional ranking settings file (TOML or JSON).
//!
//! ```toml
//! [type_weights]
//! reminder = 80
//!
//! [enrichment]
//! enabled = true
//! endpoint = "https://crm.internal/lead-quality"
//! api_key = "ENV"
//! timeout_ms = 1500
//! ```
//!
//! The core scoring functions never read files; callers build a
//! [`ScoringConfig`] / [`EnrichmentOptions`] from these settings.

pub mod enrichment;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::enrich::{DynLeadQualitySource, EnrichmentOptions};
use crate::scoring::ScoringConfig;

pub use enrichment::EnrichmentConfig;

pub const ENV_SETTINGS_PATH: &str = "NUDGE_RANKING_CONFIG_PATH";
pub const DEFAULT_SETTINGS_PATH: &str = "config/nudge_ranking.toml";
pub const FALLBACK_JSON_SETTINGS_PATH: &str = "config/nudge_ranking.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankingSettings {
    /// Overrides merged over the built-in type weights.
    #[serde(default)]
    pub type_weights: HashMap<String, f64>,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

impl RankingSettings {
    /// Load from an explicit path and normalize (env indirection resolved).
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut settings = read_settings_file(path)?;
        settings.enrichment = settings
            .enrichment
            .normalize()
            .with_context(|| format!("enrichment settings in {}", path.display()))?;
        Ok(settings)
    }

    /// Load using env var + fallbacks:
    /// 1) $NUDGE_RANKING_CONFIG_PATH
    /// 2) config/nudge_ranking.toml
    /// 3) config/nudge_ranking.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_SETTINGS_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_SETTINGS_PATH} points to non-existent path"));
        }
        for candidate in [DEFAULT_SETTINGS_PATH, FALLBACK_JSON_SETTINGS_PATH] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        Ok(Self::default())
    }

    pub fn scoring_config(&self) -> ScoringConfig {
        ScoringConfig::from_overrides(&self.type_weights)
    }

    /// Enrichment options with the given source (usually from
    /// [`crate::enrich::build_lead_quality_source`]).
    pub fn enrichment_options(&self, source: Option<DynLeadQualitySource>) -> EnrichmentOptions {
        EnrichmentOptions {
            fetch_lead_quality: source,
            timeout: self.enrichment.timeout(),
            scoring: self.scoring_config(),
        }
    }
}

/// Read and parse without normalization. Format is chosen by extension,
/// falling back to trying both.
pub fn read_settings_file(path: &Path) -> Result<RankingSettings> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading ranking settings from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_settings(&content, &ext).with_context(|| format!("parsing {}", path.display()))
}

fn parse_settings(s: &str, hint_ext: &str) -> Result<RankingSettings> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        _ => {
            if let Ok(v) = serde_json::from_str(s) {
                return Ok(v);
            }
            toml::from_str(s).map_err(|e| anyhow!("unsupported settings format: {e}"))
        }
    }
}
