use anyhow::Result;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;

pub const LOOKUP_HIT: &str = "hit";
pub const LOOKUP_REFRESH: &str = "refresh";
pub const LOOKUP_UNREGISTERED: &str = "unregistered";

/// Prometheus metrics of one agent instance.
///
/// Each instance owns its registry, so independent caches (and tests) never share counters.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Exchange metrics
    pub exchange_requests: IntCounterVec,
    pub exchange_failures: IntCounterVec,
    pub exchange_duration: HistogramVec,

    // Cache metrics
    pub token_lookups: IntCounterVec,
    pub registered_identities: IntGauge,
    pub cache_flushes: IntCounter,

    // Runtime
    pub up: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>> {
        let registry = Registry::new_custom(Some("oauthtokenagent".into()), None)?;

        let metrics = Arc::new(Self {
            // Exchange
            exchange_requests: IntCounterVec::new(Opts::new("exchange_requests_total", "Token exchange attempts by identity"), &["identity"])?,
            exchange_failures: IntCounterVec::new(Opts::new("exchange_failures_total", "Failed token exchanges by identity"), &["identity"])?,
            exchange_duration: HistogramVec::new(HistogramOpts::new("exchange_duration_seconds", "Token exchange duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]), &["identity"])?,

            // Cache
            token_lookups: IntCounterVec::new(Opts::new("token_lookups_total", "Token lookups by result"), &["result"])?,
            registered_identities: IntGauge::new("registered_identities", "Identities currently registered")?,
            cache_flushes: IntCounter::new("cache_flushes_total", "Global cache flushes")?,

            up: IntGauge::new("up", "1 if service is healthy")?,

            registry,
        });

        let reg = &metrics.registry;
        reg.register(Box::new(metrics.exchange_requests.clone()))?;
        reg.register(Box::new(metrics.exchange_failures.clone()))?;
        reg.register(Box::new(metrics.exchange_duration.clone()))?;
        reg.register(Box::new(metrics.token_lookups.clone()))?;
        reg.register(Box::new(metrics.registered_identities.clone()))?;
        reg.register(Box::new(metrics.cache_flushes.clone()))?;
        reg.register(Box::new(metrics.up.clone()))?;

        Ok(metrics)
    }
}
