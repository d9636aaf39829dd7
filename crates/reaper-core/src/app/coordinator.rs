//! ReaperCoordinator - 1 回の pass の実行
//!
//! # フロー
//! 1. error gauge を 0 に戻し、`now` を 1 回だけ読む
//! 2. namespace を解決（失敗したら pass を中断）
//! 3. 期限切れ Pod の評価 → orphan の検出
//! 4. 期限切れ Pod の削除
//! 5. orphan の削除と、reap した job の依存リソースの削除
//! 6. 所要時間を記録して `PassReport` を返す
//!
//! 3〜5 の途中で起きた問題はログとカウンタに残し、pass は最後まで続ける。

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::domain::{
    ClusterError, DependentKind, DependentResource, JobId, LabelSelector, ManagedUnit,
    NamespaceScope, ReaperConfig, ReaperError, ResourceKind, ScanIssue,
};
use crate::ports::{Clock, ClusterApi};

use super::job_evaluator::JobEvaluator;
use super::metrics::ReaperMetrics;
use super::namespace_resolver::NamespaceResolver;
use super::orphan_detector::OrphanDetector;

/// 1 回の pass の集計
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub units_reaped: usize,
    pub dependents_reaped: usize,
    pub errors: usize,
}

pub struct ReaperCoordinator {
    cluster: Arc<dyn ClusterApi>,
    clock: Arc<dyn Clock>,
    metrics: Arc<ReaperMetrics>,
    config: ReaperConfig,
}

impl ReaperCoordinator {
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        clock: Arc<dyn Clock>,
        metrics: Arc<ReaperMetrics>,
        config: ReaperConfig,
    ) -> Self {
        Self {
            cluster,
            clock,
            metrics,
            config,
        }
    }

    pub fn config(&self) -> &ReaperConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<ReaperMetrics> {
        &self.metrics
    }

    /// `Err` になるのは namespace の解決に失敗したときだけ
    pub async fn run_pass(&self) -> Result<PassReport, ReaperError> {
        let started = Instant::now();
        self.metrics.begin_pass();
        let now = self.clock.now();
        let cluster = self.cluster.as_ref();

        let scopes = match NamespaceResolver::new(&self.config.namespace_labels)
            .resolve(cluster)
            .await
        {
            Ok(scopes) => scopes,
            Err(source) => {
                tracing::error!(error = %source, "failed to resolve namespaces");
                self.metrics.record_error();
                self.metrics.record_duration(started.elapsed());
                return Err(ReaperError::NamespaceListing(source));
            }
        };

        let mut pass = Pass {
            cluster,
            metrics: &self.metrics,
            report: PassReport::default(),
            deleted: HashSet::new(),
        };

        let evaluation = JobEvaluator::new(
            &self.config.object_labels,
            &self.config.job_label,
            &self.config.lifetime_annotation,
        )
        .evaluate(cluster, &scopes, now)
        .await;
        pass.record_issues(&evaluation.issues);

        let reaping = evaluation.expired_job_ids();
        let orphan_scopes = evaluation.scanned_scopes(&scopes);
        if orphan_scopes.len() < scopes.len() {
            tracing::warn!(
                skipped = scopes.len() - orphan_scopes.len(),
                "skipping orphan detection where pods could not be listed"
            );
        }
        let orphans = OrphanDetector::new(&self.config.object_labels, &self.config.job_label)
            .detect(cluster, &orphan_scopes, &evaluation.known_job_ids, &reaping, now)
            .await;
        pass.record_issues(&orphans.issues);

        for unit in &evaluation.expired {
            pass.reap_unit(unit).await;
        }

        for orphan in &orphans.orphans {
            tracing::info!(
                kind = %orphan.kind,
                namespace = %orphan.namespace,
                name = %orphan.name,
                job_id = %orphan.job_id,
                "reaping orphaned resource"
            );
            pass.reap_dependent(orphan.kind, &orphan.namespace, &orphan.name)
                .await;
        }

        for (namespace, job_id) in cleanup_targets(&evaluation.expired) {
            self.clean_up_job(&mut pass, namespace, job_id).await;
        }

        let elapsed = started.elapsed();
        self.metrics.record_duration(elapsed);
        tracing::info!(
            units_reaped = pass.report.units_reaped,
            dependents_reaped = pass.report.dependents_reaped,
            errors = pass.report.errors,
            elapsed = ?elapsed,
            "reaper pass finished"
        );
        Ok(pass.report)
    }

    /// object selector は使わず、job label だけで依存リソースを探す
    async fn clean_up_job(&self, pass: &mut Pass<'_>, namespace: &str, job_id: &JobId) {
        let scope = NamespaceScope::Only(namespace.to_string());
        let selector = LabelSelector::equals(&self.config.job_label, job_id.as_str());

        for kind in DependentKind::ALL {
            let mut objects = match self.cluster.list_dependents(kind, &scope, &selector).await {
                Ok(objects) => objects,
                Err(source) => {
                    pass.record_issue(&ScanIssue::DependentListing {
                        kind,
                        scope: scope.clone(),
                        source,
                    });
                    continue;
                }
            };
            objects.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

            for meta in &objects {
                let resource = DependentResource::from_meta(kind, meta, &self.config.job_label);
                tracing::info!(
                    kind = %kind,
                    namespace = %resource.namespace,
                    name = %resource.name,
                    job_id = %resource.job_id,
                    "reaping resource of expired job"
                );
                pass.reap_dependent(kind, &resource.namespace, &resource.name)
                    .await;
            }
        }
    }
}

/// reap した Pod の (namespace, job_id)。sentinel は対象外。
fn cleanup_targets(expired: &[ManagedUnit]) -> BTreeSet<(&str, &JobId)> {
    expired
        .iter()
        .filter(|unit| !unit.job_id.is_sentinel())
        .map(|unit| (unit.namespace.as_str(), &unit.job_id))
        .collect()
}

/// pass 中の削除状態
struct Pass<'a> {
    cluster: &'a dyn ClusterApi,
    metrics: &'a ReaperMetrics,
    report: PassReport,
    /// 同じ pass で 2 回消さない
    deleted: HashSet<(ResourceKind, String, String)>,
}

impl Pass<'_> {
    fn record_issues(&mut self, issues: &[ScanIssue]) {
        for issue in issues {
            self.record_issue(issue);
        }
    }

    fn record_issue(&mut self, issue: &ScanIssue) {
        tracing::warn!(error = %issue, "scan issue");
        self.record_error();
    }

    fn record_error(&mut self) {
        self.metrics.record_error();
        self.report.errors += 1;
    }

    async fn reap_unit(&mut self, unit: &ManagedUnit) {
        tracing::info!(
            namespace = %unit.namespace,
            name = %unit.name,
            job_id = %unit.job_id,
            expiry = %unit.expiry_time,
            "reaping expired pod"
        );
        let result = self.cluster.delete_unit(&unit.namespace, &unit.name).await;
        if self.finish_delete(ResourceKind::Pod, &unit.namespace, &unit.name, result) {
            self.report.units_reaped += 1;
        }
    }

    async fn reap_dependent(&mut self, kind: DependentKind, namespace: &str, name: &str) {
        let key = (ResourceKind::from(kind), namespace.to_string(), name.to_string());
        if self.deleted.contains(&key) {
            return;
        }
        let result = self.cluster.delete_dependent(kind, namespace, name).await;
        if self.finish_delete(kind.into(), namespace, name, result) {
            self.deleted.insert(key);
            self.report.dependents_reaped += 1;
        }
    }

    /// 削除できた（もしくは既に無かった）なら true
    fn finish_delete(
        &mut self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        result: Result<(), ClusterError>,
    ) -> bool {
        match result {
            Ok(()) => {}
            Err(error) if error.is_not_found() => {
                tracing::debug!(kind = %kind, namespace, name, "already deleted");
            }
            Err(error) => {
                tracing::error!(kind = %kind, namespace, name, error = %error, "failed to delete");
                self.record_error();
                return false;
            }
        }
        self.metrics.record_reaped(kind);
        true
    }
}
