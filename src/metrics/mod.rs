//! Prometheus metrics for the manager loop
//!
//! Each manager owns its own [`BatchMetrics`] with a private registry, so
//! several managers (one per target) can coexist in one process.
//!
//! Tracked:
//! - batches launched, batch failures by reason
//! - resynchronizations by trigger
//! - prep rounds, threads dispatched by operation kind
//! - current manager state and extraction percentage

use prometheus::{
    Encoder, Gauge, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use crate::models::OperationKind;

/// Metrics of one manager loop
#[derive(Clone)]
pub struct BatchMetrics {
    registry: Registry,
    batches_launched: IntCounter,
    batch_failures: IntCounterVec,
    resyncs: IntCounterVec,
    prep_rounds: IntCounter,
    threads_dispatched: IntCounterVec,
    state: IntGauge,
    extract_percent: Gauge,
}

impl BatchMetrics {
    /// Register all metrics, labelled with the target name
    pub fn new(target: &str) -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(
            Some("hwgw".to_string()),
            Some([("target".to_string(), target.to_string())].into_iter().collect()),
        )?;

        let batches_launched =
            IntCounter::new("batches_launched_total", "Batches dispatched successfully")?;
        let batch_failures = IntCounterVec::new(
            Opts::new("batch_failures_total", "Failed batch launches by reason"),
            &["reason"],
        )?;
        let resyncs = IntCounterVec::new(
            Opts::new("resyncs_total", "Forced prep passes by trigger"),
            &["trigger"],
        )?;
        let prep_rounds = IntCounter::new("prep_rounds_total", "Prep rounds dispatched")?;
        let threads_dispatched = IntCounterVec::new(
            Opts::new("threads_dispatched_total", "Threads started by operation kind"),
            &["kind"],
        )?;
        let state = IntGauge::new("manager_state", "Current manager state (0-3)")?;
        let extract_percent =
            Gauge::new("extract_percent", "Extraction percentage of the last batch")?;

        registry.register(Box::new(batches_launched.clone()))?;
        registry.register(Box::new(batch_failures.clone()))?;
        registry.register(Box::new(resyncs.clone()))?;
        registry.register(Box::new(prep_rounds.clone()))?;
        registry.register(Box::new(threads_dispatched.clone()))?;
        registry.register(Box::new(state.clone()))?;
        registry.register(Box::new(extract_percent.clone()))?;

        Ok(Self {
            registry,
            batches_launched,
            batch_failures,
            resyncs,
            prep_rounds,
            threads_dispatched,
            state,
            extract_percent,
        })
    }

    pub fn record_batch(&self, extract_percent: u32) {
        self.batches_launched.inc();
        self.extract_percent.set(f64::from(extract_percent));
    }

    pub fn record_failure(&self, reason: &str) {
        self.batch_failures.with_label_values(&[reason]).inc();
    }

    pub fn record_resync(&self, trigger: &str) {
        self.resyncs.with_label_values(&[trigger]).inc();
    }

    pub fn record_prep_round(&self) {
        self.prep_rounds.inc();
    }

    pub fn record_threads(&self, kind: OperationKind, threads: u32) {
        self.threads_dispatched
            .with_label_values(&[kind.as_str()])
            .inc_by(u64::from(threads));
    }

    pub fn set_state(&self, code: i64) {
        self.state.set(code);
    }

    pub fn batches_launched(&self) -> u64 {
        self.batches_launched.get()
    }

    pub fn failures(&self, reason: &str) -> u64 {
        self.batch_failures.with_label_values(&[reason]).get()
    }

    pub fn resyncs(&self, trigger: &str) -> u64 {
        self.resyncs.with_label_values(&[trigger]).get()
    }

    /// Text exposition format of every metric
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl std::fmt::Debug for BatchMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchMetrics")
            .field("batches_launched", &self.batches_launched.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_render() {
        let metrics = BatchMetrics::new("n00dles").unwrap();
        metrics.record_batch(42);
        metrics.record_batch(40);
        metrics.record_failure("planning");
        metrics.record_resync("batch_limit");
        metrics.record_threads(OperationKind::Grow, 12);

        assert_eq!(metrics.batches_launched(), 2);
        assert_eq!(metrics.failures("planning"), 1);
        assert_eq!(metrics.failures("dispatch"), 0);
        assert_eq!(metrics.resyncs("batch_limit"), 1);

        let text = metrics.render();
        assert!(text.contains("hwgw_batches_launched_total"));
        assert!(text.contains("target=\"n00dles\""));
        assert!(text.contains("kind=\"grow\""));
    }

    #[test]
    fn test_independent_registries() {
        let a = BatchMetrics::new("a").unwrap();
        let b = BatchMetrics::new("b").unwrap();
        a.record_batch(1);
        assert_eq!(b.batches_launched(), 0);
    }
}
