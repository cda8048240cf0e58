//! Logging setup and metric descriptions.
//!
//! The library only emits through the `tracing` and `metrics` facades; the host
//! application decides on subscribers and exporters. `init_tracing` is a
//! convenience for binaries and local runs.

use metrics::{describe_counter, describe_histogram, Unit};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "nudge_ranker=info,warn";

/// One-time metrics registration (so series show up with help text).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("nudge_rank_calls_total", "Ranking calls.");
        describe_counter!("nudges_ranked_total", "Nudges scored and ordered.");
        describe_counter!(
            "nudge_ingest_rejected_total",
            "Nudges rejected at ingestion (bad id, status or timestamp)."
        );
        describe_counter!(
            "nudge_enrichment_total",
            "Lead-quality enrichment attempts by outcome."
        );
        describe_histogram!(
            "nudge_enrichment_lookup_ms",
            Unit::Milliseconds,
            "Batched lead-quality lookup latency."
        );
    });
}

/// Install a compact fmt subscriber filtered by `RUST_LOG`. Safe to call more
/// than once; later calls are no-ops. Set `NUDGE_RANKER_LOG_JSON=1` for JSON
/// lines.
pub fn init_tracing() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
        let json = std::env::var("NUDGE_RANKER_LOG_JSON")
            .ok()
            .is_some_and(|v| v == "1");

        let registry = tracing_subscriber::registry().with(filter);
        // try_init: a subscriber installed by the host wins.
        let _ = if json {
            registry.with(fmt::layer().json()).try_init()
        } else {
            registry.with(fmt::layer().compact()).try_init()
        };
    });
}
