//! OrphanDetector - 持ち主のいない依存リソースの検出
//!
//! # 判定
//! resource が orphan になるのは次の両方を満たすときだけ:
//! - `job_id ∉ known ∪ reaping`
//! - `creation_time <= now`
//!
//! 2 つ目は race guard。Pod の走査は `now` 以前に終わっているので、
//! `now` より後に作られたリソースの Pod はまだ見えていないだけかもしれない。

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::domain::{
    DependentKind, DependentResource, JobId, LabelSelector, NamespaceScope, Requirement,
    ScanIssue,
};
use crate::ports::ClusterApi;

/// 検出結果
#[derive(Debug, Clone, Default)]
pub struct Orphans {
    /// kind の順（Service, ConfigMap, Secret）、その中は (namespace, name) 順
    pub orphans: Vec<DependentResource>,
    pub issues: Vec<ScanIssue>,
}

pub struct OrphanDetector<'a> {
    selector: LabelSelector,
    job_label: &'a str,
}

impl<'a> OrphanDetector<'a> {
    /// job label を持たないリソースは job のものではないので候補にしない
    pub fn new(object_labels: &LabelSelector, job_label: &'a str) -> Self {
        Self {
            selector: object_labels
                .clone()
                .and(Requirement::Exists(job_label.to_string())),
            job_label,
        }
    }

    pub async fn detect(
        &self,
        cluster: &dyn ClusterApi,
        scopes: &[NamespaceScope],
        known: &BTreeSet<JobId>,
        reaping: &BTreeSet<JobId>,
        now: DateTime<Utc>,
    ) -> Orphans {
        let mut result = Orphans::default();

        for kind in DependentKind::ALL {
            for scope in scopes {
                let mut objects = match cluster.list_dependents(kind, scope, &self.selector).await {
                    Ok(objects) => objects,
                    Err(source) => {
                        result.issues.push(ScanIssue::DependentListing {
                            kind,
                            scope: scope.clone(),
                            source,
                        });
                        continue;
                    }
                };
                objects.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

                for meta in &objects {
                    let resource = DependentResource::from_meta(kind, meta, self.job_label);
                    if known.contains(&resource.job_id) || reaping.contains(&resource.job_id) {
                        continue;
                    }
                    if resource.created_after(now) {
                        tracing::debug!(
                            kind = %kind,
                            namespace = %resource.namespace,
                            name = %resource.name,
                            created = %resource.creation_time,
                            "skipping resource created after evaluation time"
                        );
                        continue;
                    }
                    result.orphans.push(resource);
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Namespace, ObjectMeta};
    use crate::impls::InMemoryCluster;
    use crate::impls::fixture::{MANAGED_BY, ONDEMAND, at, sample_cluster};
    use chrono::TimeZone;

    fn ids(values: &[&str]) -> BTreeSet<JobId> {
        values.iter().copied().map(JobId::from).collect()
    }

    fn names(orphans: &Orphans) -> Vec<String> {
        orphans
            .orphans
            .iter()
            .map(|o| format!("{}/{}", o.kind, o.name))
            .collect()
    }

    async fn detect(
        cluster: &InMemoryCluster,
        object_labels: &str,
        known: &[&str],
        reaping: &[&str],
        now: DateTime<Utc>,
    ) -> Orphans {
        let selector = LabelSelector::parse(object_labels).unwrap();
        OrphanDetector::new(&selector, "job")
            .detect(cluster, &[NamespaceScope::All], &ids(known), &ids(reaping), now)
            .await
    }

    #[tokio::test]
    async fn unknown_jobs_are_orphaned() {
        let cluster = sample_cluster().await;
        let orphans = detect(&cluster, "", &["1", "2", "5"], &[], at(15, 0)).await;

        assert_eq!(
            names(&orphans),
            vec!["service/service-job4", "configmap/configmap-job4", "secret/secret-job4"]
        );
        assert!(orphans.orphans.iter().all(|o| o.job_id.as_str() == "4"));
    }

    #[tokio::test]
    async fn jobs_being_reaped_count_as_known() {
        let cluster = sample_cluster().await;
        let orphans = detect(&cluster, "", &["5"], &["1", "2"], at(15, 0)).await;
        assert_eq!(orphans.orphans.len(), 3);
    }

    #[tokio::test]
    async fn object_selector_applies_to_dependents() {
        let cluster = sample_cluster().await;
        // job1 / job2 の依存リソースには managed-by が無い
        let orphans = detect(
            &cluster,
            "app.kubernetes.io/managed-by=open-ondemand",
            &[],
            &[],
            at(15, 0),
        )
        .await;

        assert_eq!(
            names(&orphans),
            vec![
                "service/service-user1-job5",
                "service/service-job4",
                "configmap/configmap-job4",
                "secret/secret-job4",
            ]
        );
    }

    #[tokio::test]
    async fn resources_without_job_label_are_ignored() {
        let cluster = InMemoryCluster::new();
        cluster
            .add_dependent(DependentKind::Secret, ObjectMeta::new("ns", "default-token"))
            .await;

        let orphans = detect(&cluster, "", &[], &[], at(15, 0)).await;
        assert!(orphans.orphans.is_empty());
    }

    #[tokio::test]
    async fn resources_from_the_future_are_never_orphaned() {
        let future = Utc.with_ymd_and_hms(2999, 1, 1, 23, 59, 59).unwrap();
        let cluster = InMemoryCluster::new();
        cluster
            .add_namespace(Namespace::new("future").with_label(MANAGED_BY, ONDEMAND))
            .await;
        for (kind, name) in [
            (DependentKind::Service, "service"),
            (DependentKind::ConfigMap, "configmap"),
            (DependentKind::Secret, "secret"),
        ] {
            cluster
                .add_dependent(
                    kind,
                    ObjectMeta::new("future", name)
                        .with_label("job", "1")
                        .with_label(MANAGED_BY, ONDEMAND)
                        .created_at(future),
                )
                .await;
        }

        let selector = LabelSelector::everything();
        let orphans = OrphanDetector::new(&selector, "job")
            .detect(
                &cluster,
                &[NamespaceScope::Only("future".to_string())],
                &BTreeSet::new(),
                &BTreeSet::new(),
                Utc::now(),
            )
            .await;

        assert!(orphans.orphans.is_empty());
        assert!(orphans.issues.is_empty());
    }

    #[tokio::test]
    async fn created_exactly_at_evaluation_time_is_eligible() {
        let now = at(15, 0);
        let cluster = InMemoryCluster::new();
        cluster
            .add_dependent(
                DependentKind::ConfigMap,
                ObjectMeta::new("ns", "cm").with_label("job", "9").created_at(now),
            )
            .await;

        let orphans = detect(&cluster, "", &[], &[], now).await;
        assert_eq!(names(&orphans), vec!["configmap/cm"]);
    }

    #[tokio::test]
    async fn listing_failure_skips_only_that_kind() {
        let cluster = sample_cluster().await;
        cluster
            .fail_dependent_listing(DependentKind::ConfigMap, NamespaceScope::All)
            .await;

        let orphans = detect(&cluster, "", &["1", "2", "5"], &[], at(15, 0)).await;

        assert_eq!(
            names(&orphans),
            vec!["service/service-job4", "secret/secret-job4"]
        );
        assert!(matches!(
            orphans.issues.as_slice(),
            [ScanIssue::DependentListing { kind: DependentKind::ConfigMap, .. }]
        ));
    }
}
