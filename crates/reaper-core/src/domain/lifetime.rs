//! Lifetime - Pod の寿命アノテーション
//!
//! `pod.kubernetes.io/lifetime: "1h30m"` のような duration 文字列を
//! humantime でパースし、作成時刻と足して期限を求めます。

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::resource::Labels;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifetimeError {
    #[error("missing lifetime annotation '{0}'")]
    Missing(String),

    #[error("invalid lifetime '{value}': {reason}")]
    Invalid { value: String, reason: String },

    #[error("lifetime '{0}' is out of range")]
    OutOfRange(String),
}

/// Pod の寿命
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Lifetime(chrono::Duration);

impl Lifetime {
    /// duration 文字列をパース（`30m`, `1h`, `1h30m`, `90s`, `2days` など）
    pub fn parse(value: &str) -> Result<Self, LifetimeError> {
        let duration =
            humantime::parse_duration(value.trim()).map_err(|e| LifetimeError::Invalid {
                value: value.to_string(),
                reason: e.to_string(),
            })?;
        Self::try_from_std(duration).ok_or_else(|| LifetimeError::OutOfRange(value.to_string()))
    }

    /// アノテーションから読み出してパース
    pub fn from_annotations(annotations: &Labels, key: &str) -> Result<Self, LifetimeError> {
        let value = annotations
            .get(key)
            .ok_or_else(|| LifetimeError::Missing(key.to_string()))?;
        Self::parse(value)
    }

    pub fn try_from_std(duration: Duration) -> Option<Self> {
        chrono::Duration::from_std(duration).ok().map(Self)
    }

    pub fn as_duration(&self) -> chrono::Duration {
        self.0
    }

    /// `created + lifetime`
    ///
    /// 表現可能な範囲を超える場合は最大時刻で飽和させる。
    pub fn expiry_from(&self, created: DateTime<Utc>) -> DateTime<Utc> {
        created
            .checked_add_signed(self.0)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
