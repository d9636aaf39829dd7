//! Errors - エラー型と分類
//!
//! # 伝播ポリシー
//! - pass を中断するのは設定エラーとスコープ解決（namespace list）の失敗だけ
//! - それ以外（list の部分失敗、lifetime のパース失敗、delete の失敗）は
//!   `ScanIssue` やログ・カウンタに吸収して pass を続行する

use super::lifetime::LifetimeError;
use super::resource::{DependentKind, NamespaceScope, ResourceKind};
use super::selector::SelectorError;

/// クラスタ API 呼び出しのエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClusterError {
    /// 対象が既に存在しない（delete では成功扱い）
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: ResourceKind,
        namespace: String,
        name: String,
    },

    #[error("cluster API request failed: {0}")]
    Api(String),
}

impl ClusterError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound { .. })
    }
}

/// pass 全体を中断するエラー
#[derive(Debug, thiserror::Error)]
pub enum ReaperError {
    #[error("invalid {field} selector: {source}")]
    InvalidSelector {
        field: &'static str,
        #[source]
        source: SelectorError,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to list namespaces: {0}")]
    NamespaceListing(#[source] ClusterError),
}

/// pass を止めずに記録される問題
///
/// 1 件につき `errors_total` が 1 増える。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanIssue {
    #[error("failed to list pods in {scope}: {source}")]
    UnitListing {
        scope: NamespaceScope,
        #[source]
        source: ClusterError,
    },

    #[error("failed to list {kind}s in {scope}: {source}")]
    DependentListing {
        kind: DependentKind,
        scope: NamespaceScope,
        #[source]
        source: ClusterError,
    },

    #[error("pod {namespace}/{name} has unusable lifetime: {source}")]
    Lifetime {
        namespace: String,
        name: String,
        #[source]
        source: LifetimeError,
    },
}
