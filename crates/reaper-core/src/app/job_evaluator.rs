//! JobEvaluator - job pod の期限判定
//!
//! # フロー
//! 1. scope ごとに object selector で Pod を list
//! 2. (namespace, name) でソート（list の返却順には依存しない）
//! 3. job label から JobId、lifetime annotation から期限を求める
//! 4. JobId は期限に関係なく KnownJobSet に入れる
//! 5. `now >= expiry_time` の Pod を expired に積む（JobId での重複排除はしない）

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::domain::{JobId, LabelSelector, ManagedUnit, NamespaceScope, ObjectMeta, ScanIssue};
use crate::ports::ClusterApi;

/// 評価結果
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    /// 期限切れの Pod（走査順）
    pub expired: Vec<ManagedUnit>,

    /// 一致した全 Pod の JobId（期限切れかどうかに関係なく）
    pub known_job_ids: BTreeSet<JobId>,

    /// pass を止めずに記録された問題
    pub issues: Vec<ScanIssue>,

    /// Pod の list に失敗した scope。ここの KnownJobSet は不完全。
    pub failed_scopes: Vec<NamespaceScope>,
}

impl Evaluation {
    /// 期限切れ Pod の JobId（重複なし）
    pub fn expired_job_ids(&self) -> BTreeSet<JobId> {
        self.expired.iter().map(|u| u.job_id.clone()).collect()
    }

    /// Pod を最後まで list できた scope だけを返す
    ///
    /// orphan の判定はこの scope に限る。Pod が見えていない scope では
    /// 生きている job の依存リソースも orphan に見えてしまう。
    pub fn scanned_scopes(&self, scopes: &[NamespaceScope]) -> Vec<NamespaceScope> {
        scopes
            .iter()
            .filter(|scope| !self.failed_scopes.contains(scope))
            .cloned()
            .collect()
    }
}

pub struct JobEvaluator<'a> {
    object_labels: &'a LabelSelector,
    job_label: &'a str,
    lifetime_annotation: &'a str,
}

impl<'a> JobEvaluator<'a> {
    pub fn new(object_labels: &'a LabelSelector, job_label: &'a str, lifetime_annotation: &'a str) -> Self {
        Self {
            object_labels,
            job_label,
            lifetime_annotation,
        }
    }

    /// `now` は呼び出し側が pass の開始時に 1 回だけ読んだ時刻
    pub async fn evaluate(
        &self,
        cluster: &dyn ClusterApi,
        scopes: &[NamespaceScope],
        now: DateTime<Utc>,
    ) -> Evaluation {
        let mut evaluation = Evaluation::default();

        for scope in scopes {
            let mut pods = match cluster.list_units(scope, self.object_labels).await {
                Ok(pods) => pods,
                Err(source) => {
                    evaluation.failed_scopes.push(scope.clone());
                    evaluation.issues.push(ScanIssue::UnitListing {
                        scope: scope.clone(),
                        source,
                    });
                    continue;
                }
            };
            pods.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

            for pod in &pods {
                self.evaluate_pod(pod, now, &mut evaluation);
            }
        }

        evaluation
    }

    fn evaluate_pod(&self, pod: &ObjectMeta, now: DateTime<Utc>, evaluation: &mut Evaluation) {
        let unit = match ManagedUnit::from_meta(pod, self.job_label, self.lifetime_annotation) {
            Ok(unit) => unit,
            Err(source) => {
                evaluation.issues.push(ScanIssue::Lifetime {
                    namespace: pod.namespace.clone(),
                    name: pod.name.clone(),
                    source,
                });
                return;
            }
        };

        evaluation.known_job_ids.insert(unit.job_id.clone());

        if unit.is_expired(now) {
            tracing::debug!(
                namespace = %unit.namespace,
                name = %unit.name,
                job_id = %unit.job_id,
                expiry = %unit.expiry_time,
                "pod expired"
            );
            evaluation.expired.push(unit);
        }
    }
}
