//! Reaper configuration.
//!
//! `ReaperSettings` is the raw, serializable form (flags, env, files).
//! `ReaperConfig` is the validated form the engine runs with: selectors are
//! parsed once, so a malformed selector fails before any scan starts.

use serde::{Deserialize, Serialize};

use super::errors::ReaperError;
use super::selector::LabelSelector;

pub const DEFAULT_JOB_LABEL: &str = "job";
pub const DEFAULT_LIFETIME_ANNOTATION: &str = "pod.kubernetes.io/lifetime";

/// Raw settings as supplied by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperSettings {
    /// Restricts which namespaces are scanned; empty scans all namespaces.
    pub namespace_labels: String,

    /// Restricts both pod and dependent-resource scans.
    pub object_labels: String,

    /// Label used to derive the job id.
    pub job_label: String,

    /// Annotation holding the pod lifetime.
    pub lifetime_annotation: String,
}

impl Default for ReaperSettings {
    fn default() -> Self {
        Self {
            namespace_labels: String::new(),
            object_labels: String::new(),
            job_label: DEFAULT_JOB_LABEL.to_string(),
            lifetime_annotation: DEFAULT_LIFETIME_ANNOTATION.to_string(),
        }
    }
}

impl ReaperSettings {
    /// Parse and check every field.
    pub fn validate(&self) -> Result<ReaperConfig, ReaperError> {
        let namespace_labels = LabelSelector::parse(&self.namespace_labels).map_err(|source| {
            ReaperError::InvalidSelector {
                field: "namespace",
                source,
            }
        })?;
        let object_labels =
            LabelSelector::parse(&self.object_labels).map_err(|source| {
                ReaperError::InvalidSelector {
                    field: "object",
                    source,
                }
            })?;

        let job_label = self.job_label.trim();
        if job_label.is_empty() {
            return Err(ReaperError::InvalidConfig(
                "job label must not be empty".to_string(),
            ));
        }
        let lifetime_annotation = self.lifetime_annotation.trim();
        if lifetime_annotation.is_empty() {
            return Err(ReaperError::InvalidConfig(
                "lifetime annotation must not be empty".to_string(),
            ));
        }

        Ok(ReaperConfig {
            namespace_labels,
            object_labels,
            job_label: job_label.to_string(),
            lifetime_annotation: lifetime_annotation.to_string(),
        })
    }
}

/// Validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaperConfig {
    pub namespace_labels: LabelSelector,
    pub object_labels: LabelSelector,
    pub job_label: String,
    pub lifetime_annotation: String,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            namespace_labels: LabelSelector::everything(),
            object_labels: LabelSelector::everything(),
            job_label: DEFAULT_JOB_LABEL.to_string(),
            lifetime_annotation: DEFAULT_LIFETIME_ANNOTATION.to_string(),
        }
    }
}
