// src/config/enrichment.rs
use serde::{Deserialize, Serialize};
use std::{env, time::Duration};

use crate::enrich::DEFAULT_ENRICHMENT_TIMEOUT;

/// Env var consulted when `api_key = "ENV"`.
pub const ENV_LEAD_QUALITY_API_KEY: &str = "LEAD_QUALITY_API_KEY";

fn default_timeout_ms() -> u64 {
    DEFAULT_ENRICHMENT_TIMEOUT.as_millis() as u64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Lead-quality lookup URL.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Bearer token. "ENV" means: read from LEAD_QUALITY_API_KEY.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Upper bound for the batched lookup. 0 falls back to the default.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            api_key: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl EnrichmentConfig {
    /// Resolve env indirection and sanitize values after deserialization.
    pub fn normalize(mut self) -> anyhow::Result<Self> {
        self.endpoint = self
            .endpoint
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());

        if let Some(key) = &self.api_key {
            if key.trim().eq_ignore_ascii_case("env") {
                let resolved = env::var(ENV_LEAD_QUALITY_API_KEY)
                    .map_err(|_| anyhow::anyhow!("Missing {ENV_LEAD_QUALITY_API_KEY} env var"))?;
                self.api_key = Some(resolved);
            }
        }
        self.api_key = self.api_key.filter(|k| !k.trim().is_empty());

        if self.timeout_ms == 0 {
            self.timeout_ms = default_timeout_ms();
        }
        Ok(self)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
