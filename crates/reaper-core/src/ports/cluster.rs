//! ClusterApi port - クラスタ API の抽象化
//!
//! エンジンが使うのは list と delete だけです。
//!
//! # 実装
//! - **InMemoryCluster**（impls）: テスト・開発用
//! - **KubeCluster**（`reaper-kube` クレート）: 本番用

use async_trait::async_trait;

use crate::domain::{ClusterError, DependentKind, LabelSelector, Namespace, NamespaceScope, ObjectMeta};

/// ClusterApi はクラスタ上のオブジェクトの list / delete を提供
///
/// # 設計原則
/// - list は selector に一致するものだけを返す（順序は保証しない）
/// - delete で対象が既に無い場合は `ClusterError::NotFound` を返す
/// - 呼び出し側が 1 件ずつ await するので、実装側で並行性を意識する必要はない
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn list_namespaces(&self, selector: &LabelSelector) -> Result<Vec<Namespace>, ClusterError>;

    /// job pod の候補を list
    async fn list_units(
        &self,
        scope: &NamespaceScope,
        selector: &LabelSelector,
    ) -> Result<Vec<ObjectMeta>, ClusterError>;

    async fn list_dependents(
        &self,
        kind: DependentKind,
        scope: &NamespaceScope,
        selector: &LabelSelector,
    ) -> Result<Vec<ObjectMeta>, ClusterError>;

    async fn delete_unit(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    async fn delete_dependent(
        &self,
        kind: DependentKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClusterError>;
}
