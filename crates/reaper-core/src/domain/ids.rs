//! Domain identifiers.
//!
//! # JobId
//! job label の値から導出される識別子です。Pod と、その Pod と一緒に作られた
//! Service / ConfigMap / Secret は同じ JobId を共有します。
//!
//! ## 不変条件
//! - JobId は空文字列にならない
//! - label が無い（または空の）場合は sentinel `"none"` になる

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::resource::Labels;

/// Identifier of a job, shared by a pod and its dependent resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// grouping label が無いオブジェクトに割り当てる値
    pub const SENTINEL: &'static str = "none";

    /// sentinel の JobId
    pub fn none() -> Self {
        Self(Self::SENTINEL.to_string())
    }

    /// 任意の文字列から作成（空なら sentinel）
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Self::none()
        } else {
            Self(value)
        }
    }

    /// grouping label の値から JobId を導出
    pub fn from_labels(labels: &Labels, job_label: &str) -> Self {
        match labels.get(job_label) {
            Some(value) => Self::new(value.as_str()),
            None => Self::none(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.0 == Self::SENTINEL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for JobId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
