//! ReaperMetrics - pass の結果を数えるカウンタ
//!
//! グローバルな registry は使わず、インスタンスを coordinator に渡します。
//! テストでは `reset()` で毎回まっさらな状態に戻せます。

use std::time::Duration;

use prometheus::{Gauge, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use serde::Serialize;

use crate::domain::ResourceKind;

const PREFIX: &str = "job_pod_reaper";

/// Counters and gauges exported by the reaper.
#[derive(Clone)]
pub struct ReaperMetrics {
    registry: Registry,
    reaped: IntCounterVec,
    errors_total: IntCounter,
    error: IntGauge,
    duration_seconds: Gauge,
}

/// Point-in-time copy of the metrics, for logs and tests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub reaped_pod: u64,
    pub reaped_service: u64,
    pub reaped_configmap: u64,
    pub reaped_secret: u64,
    pub errors_total: u64,
    pub error: bool,
    pub duration_seconds: f64,
}

impl ReaperMetrics {
    /// 新しい registry に全メトリクスを登録する
    pub fn new() -> Result<Self, prometheus::Error> {
        let reaped = IntCounterVec::new(
            Opts::new("reaped_total", "Total number of object types reaped").namespace(PREFIX),
            &["type"],
        )?;
        let errors_total = IntCounter::with_opts(
            Opts::new("errors_total", "Total number of errors").namespace(PREFIX),
        )?;
        let error = IntGauge::with_opts(
            Opts::new("error", "Indicates an error was encountered").namespace(PREFIX),
        )?;
        let duration_seconds = Gauge::with_opts(
            Opts::new("duration_seconds", "Duration of the last reaper pass").namespace(PREFIX),
        )?;

        let registry = Registry::new();
        registry.register(Box::new(reaped.clone()))?;
        registry.register(Box::new(errors_total.clone()))?;
        registry.register(Box::new(error.clone()))?;
        registry.register(Box::new(duration_seconds.clone()))?;

        let metrics = Self {
            registry,
            reaped,
            errors_total,
            error,
            duration_seconds,
        };
        metrics.precreate_series();
        Ok(metrics)
    }

    /// `/metrics` で gather する registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// pass の開始。error gauge は「直近の pass」を表すので 0 に戻す。
    pub fn begin_pass(&self) {
        self.error.set(0);
    }

    pub fn record_reaped(&self, kind: ResourceKind) {
        self.reaped.with_label_values(&[kind.as_str()]).inc();
    }

    /// errors_total を増やし、error gauge を 1 にする
    pub fn record_error(&self) {
        self.errors_total.inc();
        self.error.set(1);
    }

    pub fn record_duration(&self, elapsed: Duration) {
        self.duration_seconds.set(elapsed.as_secs_f64());
    }

    pub fn reaped(&self, kind: ResourceKind) -> u64 {
        self.reaped.with_label_values(&[kind.as_str()]).get()
    }

    pub fn errors_total(&self) -> u64 {
        self.errors_total.get()
    }

    pub fn error(&self) -> bool {
        self.error.get() != 0
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds.get()
    }

    /// 全てのカウンタを 0 に戻す。`type` ごとの series は作り直す。
    pub fn reset(&self) {
        self.reaped.reset();
        self.precreate_series();
        self.errors_total.reset();
        self.error.set(0);
        self.duration_seconds.set(0.0);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            reaped_pod: self.reaped(ResourceKind::Pod),
            reaped_service: self.reaped(ResourceKind::Service),
            reaped_configmap: self.reaped(ResourceKind::ConfigMap),
            reaped_secret: self.reaped(ResourceKind::Secret),
            errors_total: self.errors_total(),
            error: self.error(),
            duration_seconds: self.duration_seconds(),
        }
    }

    /// 一度も reap していない kind も 0 として出力されるように
    fn precreate_series(&self) {
        for kind in ResourceKind::ALL {
            self.reaped.with_label_values(&[kind.as_str()]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reaped_series(metrics: &ReaperMetrics) -> Vec<(String, u64)> {
        let families = metrics.registry().gather();
        let family = families
            .iter()
            .find(|f| f.get_name() == "job_pod_reaper_reaped_total")
            .unwrap();
        family
            .get_metric()
            .iter()
            .map(|m| {
                let label = m.get_label()[0].get_value().to_string();
                (label, m.get_counter().get_value() as u64)
            })
            .collect()
    }

    #[test]
    fn counts_per_kind() {
        let metrics = ReaperMetrics::new().unwrap();
        metrics.record_reaped(ResourceKind::Pod);
        metrics.record_reaped(ResourceKind::Pod);
        metrics.record_reaped(ResourceKind::Secret);

        assert_eq!(metrics.reaped(ResourceKind::Pod), 2);
        assert_eq!(metrics.reaped(ResourceKind::Secret), 1);
        assert_eq!(metrics.reaped(ResourceKind::Service), 0);
    }

    #[test]
    fn error_gauge_tracks_the_latest_pass() {
        let metrics = ReaperMetrics::new().unwrap();
        metrics.begin_pass();
        metrics.record_error();
        assert!(metrics.error());
        assert_eq!(metrics.errors_total(), 1);

        metrics.begin_pass();
        assert!(!metrics.error());
        assert_eq!(metrics.errors_total(), 1);
    }

    #[test]
    fn reset_zeroes_everything() {
        let metrics = ReaperMetrics::new().unwrap();
        metrics.record_reaped(ResourceKind::ConfigMap);
        metrics.record_error();
        metrics.record_duration(Duration::from_millis(250));

        metrics.reset();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.reaped_configmap, 0);
        assert_eq!(snapshot.errors_total, 0);
        assert!(!snapshot.error);
        assert_eq!(snapshot.duration_seconds, 0.0);
    }

    #[test]
    fn every_type_series_exists_before_and_after_reset() {
        let metrics = ReaperMetrics::new().unwrap();
        assert_eq!(reaped_series(&metrics).len(), 4);

        metrics.record_reaped(ResourceKind::Pod);
        metrics.reset();

        let mut series = reaped_series(&metrics);
        series.sort();
        assert_eq!(
            series,
            vec![
                ("configmap".to_string(), 0),
                ("pod".to_string(), 0),
                ("secret".to_string(), 0),
                ("service".to_string(), 0),
            ]
        );
    }

    #[test]
    fn registers_all_families() {
        let metrics = ReaperMetrics::new().unwrap();
        metrics.record_duration(Duration::from_millis(500));

        let mut names: Vec<String> = metrics
            .registry()
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        names.sort();

        assert_eq!(
            names,
            vec![
                "job_pod_reaper_duration_seconds",
                "job_pod_reaper_error",
                "job_pod_reaper_errors_total",
                "job_pod_reaper_reaped_total",
            ]
        );
        assert_eq!(metrics.duration_seconds(), 0.5);
    }
}
