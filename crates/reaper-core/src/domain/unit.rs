//! Managed units (job pods) and their dependent resources.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ids::JobId;
use super::lifetime::{Lifetime, LifetimeError};
use super::resource::{DependentKind, ObjectMeta};

/// A job pod whose age is checked against its lifetime annotation.
///
/// Built fresh each pass; `expiry_time` is fixed at discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagedUnit {
    pub job_id: JobId,
    pub namespace: String,
    pub name: String,
    pub creation_time: DateTime<Utc>,
    #[serde(skip)]
    pub lifetime: Lifetime,
    pub expiry_time: DateTime<Utc>,
}

impl ManagedUnit {
    /// Pod のメタデータから構築する。lifetime が読めない Pod はエラー。
    pub fn from_meta(
        meta: &ObjectMeta,
        job_label: &str,
        lifetime_annotation: &str,
    ) -> Result<Self, LifetimeError> {
        let lifetime = Lifetime::from_annotations(&meta.annotations, lifetime_annotation)?;
        let creation_time = meta.creation_time();
        Ok(Self {
            job_id: JobId::from_labels(&meta.labels, job_label),
            namespace: meta.namespace.clone(),
            name: meta.name.clone(),
            creation_time,
            lifetime,
            expiry_time: lifetime.expiry_from(creation_time),
        })
    }

    /// `now >= expiry_time` で期限切れ（境界は期限切れ側）
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry_time
    }
}

/// A service, config map or secret tagged with a job label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependentResource {
    pub kind: DependentKind,
    pub job_id: JobId,
    pub namespace: String,
    pub name: String,
    pub creation_time: DateTime<Utc>,
}

impl DependentResource {
    pub fn from_meta(kind: DependentKind, meta: &ObjectMeta, job_label: &str) -> Self {
        Self {
            kind,
            job_id: JobId::from_labels(&meta.labels, job_label),
            namespace: meta.namespace.clone(),
            name: meta.name.clone(),
            creation_time: meta.creation_time(),
        }
    }

    /// 評価時刻より後に作られたか（race guard）
    pub fn created_after(&self, now: DateTime<Utc>) -> bool {
        self.creation_time > now
    }
}
