//! ReaperBuilder - coordinator の構築とワイヤリング
//!
//! 起動時に設定を検証し、足りない部品があれば pass を始める前に失敗させる。

use std::sync::Arc;

use crate::domain::{ReaperError, ReaperSettings};
use crate::ports::{Clock, ClusterApi, SystemClock};

use super::coordinator::ReaperCoordinator;
use super::metrics::ReaperMetrics;

/// ReaperBuilder は ReaperCoordinator を構築
///
/// # 使用例
/// ```ignore
/// let coordinator = ReaperBuilder::new()
///     .settings(settings)
///     .cluster(Arc::new(KubeCluster::try_default().await?))
///     .build()?;
/// ```
///
/// clock と metrics は省略可能（`SystemClock` と新しい `ReaperMetrics`）。
/// cluster が無い、設定が不正、metrics の登録に失敗した場合は `BuildError`。
#[derive(Default)]
pub struct ReaperBuilder {
    settings: ReaperSettings,
    cluster: Option<Arc<dyn ClusterApi>>,
    clock: Option<Arc<dyn Clock>>,
    metrics: Option<Arc<ReaperMetrics>>,
}

/// BuildError は構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no cluster configured")]
    MissingCluster,

    #[error(transparent)]
    Config(#[from] ReaperError),

    #[error("failed to register metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl ReaperBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settings(mut self, settings: ReaperSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn cluster(mut self, cluster: Arc<dyn ClusterApi>) -> Self {
        self.cluster = Some(cluster);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn metrics(mut self, metrics: Arc<ReaperMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> Result<ReaperCoordinator, BuildError> {
        let config = self.settings.validate()?;
        let cluster = self.cluster.ok_or(BuildError::MissingCluster)?;
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => Arc::new(ReaperMetrics::new()?),
        };

        tracing::debug!(
            namespace_labels = %config.namespace_labels,
            object_labels = %config.object_labels,
            job_label = %config.job_label,
            lifetime_annotation = %config.lifetime_annotation,
            "reaper configured"
        );
        Ok(ReaperCoordinator::new(cluster, clock, metrics, config))
    }
}
