//! HTTP lead-quality source (CRM/scoring service behind a JSON endpoint).
//!
//! Request:  `POST {endpoint}` with `{"leadIds": ["L1", "L2"]}`
//! Response: `{"scores": {"L1": 72.5, "L2": null}}` (unknown leads absent or null)

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use super::{DynLeadQualitySource, LeadQualityMap, LeadQualitySource};
use crate::config::enrichment::EnrichmentConfig;

pub struct HttpLeadQualitySource {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    lead_ids: Vec<&'a str>,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    scores: HashMap<String, Option<f64>>,
}

impl LookupResponse {
    /// Null entries mean "unknown" and are dropped.
    fn into_scores(self) -> LeadQualityMap {
        self.scores
            .into_iter()
            .filter_map(|(id, q)| q.map(|q| (id, q)))
            .collect()
    }
}

impl HttpLeadQualitySource {
    /// `request_timeout` bounds the HTTP exchange itself; the orchestrator
    /// applies its own deadline on top.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("nudge-ranker/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(2))
            .timeout(request_timeout)
            .build()
            .context("building lead quality HTTP client")?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl LeadQualitySource for HttpLeadQualitySource {
    async fn fetch_lead_quality(&self, lead_ids: &BTreeSet<String>) -> anyhow::Result<LeadQualityMap> {
        let body = LookupRequest {
            lead_ids: lead_ids.iter().map(String::as_str).collect(),
        };
        let mut req = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("POST {}", self.endpoint))?;
        let status = resp.status();
        if !status.is_success() {
            bail!("lead quality endpoint returned {status}");
        }
        let parsed: LookupResponse = resp
            .json()
            .await
            .context("decoding lead quality response")?;
        Ok(parsed.into_scores())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Factory: `None` when enrichment is disabled or no endpoint is configured.
pub fn build_lead_quality_source(config: &EnrichmentConfig) -> Option<DynLeadQualitySource> {
    if !config.enabled {
        return None;
    }
    let endpoint = config.endpoint.as_deref()?;
    match HttpLeadQualitySource::new(endpoint, config.api_key.clone(), config.timeout()) {
        Ok(src) => Some(Arc::new(src)),
        Err(e) => {
            tracing::warn!(target: "nudge_ranker", error = ?e, "lead quality source disabled");
            None
        }
    }
}
