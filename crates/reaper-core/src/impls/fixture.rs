//! テスト用のクラスタ
//!
//! 3 つの namespace、5 つの Pod、job 1 / 2 / 4 / 5 の Service・ConfigMap・Secret。
//! Pod はわざと (namespace, name) 順ではない順番で登録している。

use chrono::{DateTime, TimeZone, Utc};

use super::InMemoryCluster;
use crate::domain::{DependentKind, Namespace, ObjectMeta};

pub(crate) const LIFETIME: &str = "pod.kubernetes.io/lifetime";
pub(crate) const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub(crate) const ONDEMAND: &str = "open-ondemand";

/// 2020-01-01 hh:mm UTC
pub(crate) fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, hour, minute, 0).unwrap()
}

/// 全 Pod の作成時刻（13:00）
pub(crate) fn pod_start() -> DateTime<Utc> {
    at(13, 0)
}

fn job_pod(namespace: &str, name: &str, job: &str, lifetime: &str, managed_by: &str) -> ObjectMeta {
    ObjectMeta::new(namespace, name)
        .with_label("job", job)
        .with_label(MANAGED_BY, managed_by)
        .with_annotation(LIFETIME, lifetime)
        .created_at(pod_start())
}

fn dependent(namespace: &str, name: &str, job: &str, managed: bool) -> ObjectMeta {
    let meta = ObjectMeta::new(namespace, name).with_label("job", job);
    if managed {
        meta.with_label(MANAGED_BY, ONDEMAND)
    } else {
        meta
    }
}

pub(crate) async fn sample_cluster() -> InMemoryCluster {
    let cluster = InMemoryCluster::new();

    cluster.add_namespace(Namespace::new("non-job")).await;
    cluster
        .add_namespace(Namespace::new("user-user1").with_label("app.kubernetes.io/name", ONDEMAND))
        .await;
    cluster
        .add_namespace(Namespace::new("user-user2").with_label("app.kubernetes.io/name", "foo"))
        .await;

    cluster
        .add_unit(job_pod("user-user2", "ondemand-job2", "2", "30m", ONDEMAND))
        .await;
    // job label も作成時刻も無い Pod
    cluster
        .add_unit(ObjectMeta::new("non-job", "non-job-pod").with_annotation(LIFETIME, "1h"))
        .await;
    cluster
        .add_unit(job_pod("user-user1", "ondemand-user1-job5", "5", "3h", ONDEMAND))
        .await;
    cluster
        .add_unit(job_pod("user-user3", "ondemand-job3", "3", "30m", "test"))
        .await;
    cluster
        .add_unit(job_pod("user-user1", "ondemand-job1", "1", "1h", ONDEMAND))
        .await;

    for (prefix, kind) in [
        ("service", DependentKind::Service),
        ("configmap", DependentKind::ConfigMap),
        ("secret", DependentKind::Secret),
    ] {
        cluster
            .add_dependent(kind, dependent("user-user1", &format!("{prefix}-job1"), "1", false))
            .await;
        cluster
            .add_dependent(kind, dependent("user-user2", &format!("{prefix}-job2"), "2", false))
            .await;
        cluster
            .add_dependent(kind, dependent("user-user2", &format!("{prefix}-job4"), "4", true))
            .await;
    }
    cluster
        .add_dependent(
            DependentKind::Service,
            dependent("user-user1", "service-user1-job5", "5", true),
        )
        .await;

    cluster
}
