//! Metrics collection for noticer
//!
//! Prometheus counters and a latency histogram for dispatch attempts, labelled
//! by channel. Cooldown skips and provider rate limits are counted separately
//! from failures that deserve attention.

use crate::config::MetricsConfig;
use crate::error::{FailureKind, NoticeError, Result};
use noticer_shared::ChannelKind;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Duration;
use tracing::info;

/// Metrics collector for dispatches
#[derive(Clone)]
pub struct DispatchMetrics {
    registry: Registry,
    attempts: IntCounterVec,
    deliveries: IntCounterVec,
    failures: IntCounterVec,
    cooldown_skips: IntCounterVec,
    counter_repairs: IntCounterVec,
    attempt_duration: HistogramVec,
}

impl DispatchMetrics {
    /// Create a new metrics collector with its own registry
    pub fn new(config: &MetricsConfig) -> Result<Self> {
        info!("Initializing dispatch metrics");

        let registry = Registry::new();

        let attempts = counter(
            &registry,
            config,
            "attempts_total",
            "Transport attempts made against endpoints",
            &["channel"],
        )?;
        let deliveries = counter(
            &registry,
            config,
            "deliveries_total",
            "Notifications accepted by an endpoint",
            &["channel"],
        )?;
        let failures = counter(
            &registry,
            config,
            "failures_total",
            "Failed endpoint attempts by failure kind",
            &["channel", "kind"],
        )?;
        let cooldown_skips = counter(
            &registry,
            config,
            "cooldown_skips_total",
            "Endpoints skipped because their rate-limit window is exhausted",
            &["channel"],
        )?;
        let counter_repairs = counter(
            &registry,
            config,
            "cooldown_counter_repairs_total",
            "Cooldown counters found without expiry and deleted",
            &["channel"],
        )?;

        let attempt_duration = HistogramVec::new(
            HistogramOpts::new(
                "attempt_duration_seconds",
                "Duration of a single endpoint attempt",
            )
            .namespace(&config.namespace)
            .buckets(vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["channel"],
        )
        .map_err(|e| {
            NoticeError::config(format!("Failed to create attempt_duration histogram: {}", e))
        })?;
        registry
            .register(Box::new(attempt_duration.clone()))
            .map_err(|e| NoticeError::config(format!("Failed to register metric: {}", e)))?;

        Ok(Self {
            registry,
            attempts,
            deliveries,
            failures,
            cooldown_skips,
            counter_repairs,
            attempt_duration,
        })
    }

    pub fn record_attempt(&self, channel: ChannelKind, elapsed: Duration) {
        self.attempts.with_label_values(&[channel.name()]).inc();
        self.attempt_duration
            .with_label_values(&[channel.name()])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_delivery(&self, channel: ChannelKind) {
        self.deliveries.with_label_values(&[channel.name()]).inc();
    }

    pub fn record_failure(&self, channel: ChannelKind, kind: FailureKind) {
        if kind == FailureKind::CoolingDown {
            self.cooldown_skips.with_label_values(&[channel.name()]).inc();
        } else {
            self.failures
                .with_label_values(&[channel.name(), kind.as_str()])
                .inc();
        }
    }

    pub fn record_counter_repair(&self, channel: ChannelKind) {
        self.counter_repairs.with_label_values(&[channel.name()]).inc();
    }

    pub fn deliveries(&self, channel: ChannelKind) -> u64 {
        self.deliveries.with_label_values(&[channel.name()]).get()
    }

    pub fn failures(&self, channel: ChannelKind, kind: FailureKind) -> u64 {
        if kind == FailureKind::CoolingDown {
            self.cooldown_skips.with_label_values(&[channel.name()]).get()
        } else {
            self.failures
                .with_label_values(&[channel.name(), kind.as_str()])
                .get()
        }
    }

    pub fn counter_repairs(&self, channel: ChannelKind) -> u64 {
        self.counter_repairs.with_label_values(&[channel.name()]).get()
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn export(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| NoticeError::config(format!("Failed to encode metrics: {}", e)))?;
        String::from_utf8(buffer)
            .map_err(|e| NoticeError::config(format!("Metrics are not valid UTF-8: {}", e)))
    }
}

fn counter(
    registry: &Registry,
    config: &MetricsConfig,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<IntCounterVec> {
    let counter = IntCounterVec::new(Opts::new(name, help).namespace(&config.namespace), labels)
        .map_err(|e| NoticeError::config(format!("Failed to create {} counter: {}", name, e)))?;
    registry
        .register(Box::new(counter.clone()))
        .map_err(|e| NoticeError::config(format!("Failed to register {}: {}", name, e)))?;
    Ok(counter)
}
