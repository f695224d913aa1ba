//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Record request latency into a fixed-bucket histogram
//! - Count completed requests by method and endpoint
//! - Render accumulated metrics in Prometheus text format
//!
//! # Metrics
//! - `http_request_duration_milliseconds` (histogram): latency by `url`
//! - `http_requests_total` (counter): requests by `method`, `endpoint`
//!
//! # Design Decisions
//! - Backends are interchangeable behind [`MetricsRecorder`]
//! - Lock-free hot path: atomic increments per label set
//! - Buckets are inclusive upper bounds, the last bucket is `+Inf`

use dashmap::DashMap;
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Latency histogram bucket upper bounds, in milliseconds.
pub const LATENCY_BUCKETS_MS: [f64; 6] = [10.0, 50.0, 100.0, 200.0, 500.0, 1000.0];

pub const REQUEST_DURATION_METRIC: &str = "http_request_duration_milliseconds";
pub const REQUEST_COUNT_METRIC: &str = "http_requests_total";

/// A set of metric labels, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn to_metrics_labels(&self) -> Vec<::metrics::Label> {
        self.0
            .iter()
            .map(|(k, v)| ::metrics::Label::new(k.clone(), v.clone()))
            .collect()
    }

    fn render(&self, extra: Option<(&str, &str)>) -> String {
        let mut parts: Vec<String> = self
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
            .collect();
        if let Some((k, v)) = extra {
            parts.push(format!("{}=\"{}\"", k, v));
        }
        if parts.is_empty() {
            String::new()
        } else {
            format!("{{{}}}", parts.join(","))
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Accepts metric samples.
pub trait MetricsRecorder: Send + Sync {
    /// Record one latency observation in milliseconds.
    fn observe_latency(&self, milliseconds: f64, labels: &LabelSet);

    /// Increment the request counter for `labels`.
    fn increment_count(&self, labels: &LabelSet);

    /// Render everything recorded so far in Prometheus text format.
    fn render(&self) -> String;
}

/// Index of the bucket `value` falls into; `LATENCY_BUCKETS_MS.len()` is `+Inf`.
pub fn bucket_index(value: f64) -> usize {
    LATENCY_BUCKETS_MS
        .iter()
        .position(|bound| value <= *bound)
        .unwrap_or(LATENCY_BUCKETS_MS.len())
}

/// Fixed-bucket histogram with atomic accumulation.
#[derive(Debug, Default)]
pub struct Histogram {
    buckets: [AtomicU64; LATENCY_BUCKETS_MS.len() + 1],
    count: AtomicU64,
    sum_bits: AtomicU64,
}

/// Point-in-time copy of a [`Histogram`].
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    /// Per-bucket (non-cumulative) counts; the last entry is `+Inf`.
    pub buckets: Vec<u64>,
    pub count: u64,
    pub sum: f64,
}

impl Histogram {
    pub fn observe(&self, value: f64) {
        self.buckets[bucket_index(value)].fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let mut current = self.sum_bits.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + value).to_bits();
            match self.sum_bits.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            buckets: self.buckets.iter().map(|b| b.load(Ordering::Relaxed)).collect(),
            count: self.count.load(Ordering::Relaxed),
            sum: f64::from_bits(self.sum_bits.load(Ordering::Relaxed)),
        }
    }
}

/// Process-wide in-memory accumulator keyed by label set.
#[derive(Debug, Default)]
pub struct MetricsAccumulator {
    histograms: DashMap<LabelSet, Arc<Histogram>>,
    counters: DashMap<LabelSet, Arc<AtomicU64>>,
}

impl MetricsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of the counter for `labels` (0 if never incremented).
    pub fn counter(&self, labels: &LabelSet) -> u64 {
        self.counters
            .get(labels)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn histogram(&self, labels: &LabelSet) -> Option<HistogramSnapshot> {
        self.histograms.get(labels).map(|h| h.snapshot())
    }

    /// Total number of latency observations across every label set.
    pub fn observation_count(&self) -> u64 {
        self.histograms
            .iter()
            .map(|h| h.count.load(Ordering::Relaxed))
            .sum()
    }

    // Clone the Arc out so the shard lock is released before the atomic update.
    fn histogram_for(&self, labels: &LabelSet) -> Arc<Histogram> {
        if let Some(h) = self.histograms.get(labels) {
            return h.clone();
        }
        self.histograms.entry(labels.clone()).or_default().clone()
    }

    fn counter_for(&self, labels: &LabelSet) -> Arc<AtomicU64> {
        if let Some(c) = self.counters.get(labels) {
            return c.clone();
        }
        self.counters.entry(labels.clone()).or_default().clone()
    }
}

impl MetricsRecorder for MetricsAccumulator {
    fn observe_latency(&self, milliseconds: f64, labels: &LabelSet) {
        self.histogram_for(labels).observe(milliseconds);
    }

    fn increment_count(&self, labels: &LabelSet) {
        self.counter_for(labels).fetch_add(1, Ordering::Relaxed);
    }

    fn render(&self) -> String {
        let mut out = String::new();

        let mut counters: Vec<(LabelSet, u64)> = self
            .counters
            .iter()
            .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
            .collect();
        counters.sort();
        if !counters.is_empty() {
            let _ = writeln!(out, "# TYPE {} counter", REQUEST_COUNT_METRIC);
            for (labels, value) in &counters {
                let _ = writeln!(out, "{}{} {}", REQUEST_COUNT_METRIC, labels.render(None), value);
            }
        }

        let mut histograms: Vec<(LabelSet, HistogramSnapshot)> = self
            .histograms
            .iter()
            .map(|e| (e.key().clone(), e.value().snapshot()))
            .collect();
        histograms.sort_by(|a, b| a.0.cmp(&b.0));
        if !histograms.is_empty() {
            let _ = writeln!(out, "# HELP {} service latency", REQUEST_DURATION_METRIC);
            let _ = writeln!(out, "# TYPE {} histogram", REQUEST_DURATION_METRIC);
            for (labels, snap) in &histograms {
                let mut cumulative = 0;
                for (i, count) in snap.buckets.iter().enumerate() {
                    cumulative += count;
                    let le = LATENCY_BUCKETS_MS
                        .get(i)
                        .map(|b| b.to_string())
                        .unwrap_or_else(|| "+Inf".to_string());
                    let _ = writeln!(
                        out,
                        "{}_bucket{} {}",
                        REQUEST_DURATION_METRIC,
                        labels.render(Some(("le", &le))),
                        cumulative
                    );
                }
                let _ = writeln!(out, "{}_sum{} {}", REQUEST_DURATION_METRIC, labels.render(None), snap.sum);
                let _ = writeln!(out, "{}_count{} {}", REQUEST_DURATION_METRIC, labels.render(None), snap.count);
            }
        }

        out
    }
}

/// Records through the `metrics` facade into a Prometheus recorder.
pub struct PrometheusRecorder {
    handle: PrometheusHandle,
}

impl PrometheusRecorder {
    /// Install the process-global Prometheus recorder. Only one install per process succeeds.
    pub fn install() -> Result<Self, BuildError> {
        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full(REQUEST_DURATION_METRIC.to_string()),
                &LATENCY_BUCKETS_MS,
            )?
            .install_recorder()?;

        ::metrics::describe_histogram!(
            REQUEST_DURATION_METRIC,
            ::metrics::Unit::Milliseconds,
            "service latency"
        );
        ::metrics::describe_counter!(REQUEST_COUNT_METRIC, "completed requests");

        tracing::info!(buckets = ?LATENCY_BUCKETS_MS, "Prometheus metrics recorder installed");
        Ok(Self { handle })
    }
}

impl MetricsRecorder for PrometheusRecorder {
    fn observe_latency(&self, milliseconds: f64, labels: &LabelSet) {
        ::metrics::histogram!(REQUEST_DURATION_METRIC, labels.to_metrics_labels()).record(milliseconds);
    }

    fn increment_count(&self, labels: &LabelSet) {
        ::metrics::counter!(REQUEST_COUNT_METRIC, labels.to_metrics_labels()).increment(1);
    }

    fn render(&self) -> String {
        self.handle.render()
    }
}

/// Drops every sample.
#[derive(Debug, Default)]
pub struct DisabledMetrics;

impl MetricsRecorder for DisabledMetrics {
    fn observe_latency(&self, _milliseconds: f64, _labels: &LabelSet) {}

    fn increment_count(&self, _labels: &LabelSet) {}

    fn render(&self) -> String {
        String::new()
    }
}
