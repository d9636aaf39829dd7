//! InMemoryCluster - 開発用・テスト用のクラスタ
//!
//! # 学習ポイント
//! - tokio::sync::Mutex で状態を共有（テストから中身を覗くため）
//! - 失敗の注入（list / delete を任意に失敗させる）
//! - list の返却順は登録順。並び替えは呼び出し側の責務

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    ClusterError, DependentKind, LabelSelector, Namespace, NamespaceScope, ObjectMeta,
    ResourceKind,
};
use crate::ports::ClusterApi;

#[derive(Default)]
struct ClusterState {
    namespaces: Vec<Namespace>,
    units: Vec<ObjectMeta>,
    dependents: Vec<(DependentKind, ObjectMeta)>,

    /// 失敗の注入
    fail_namespace_listing: bool,
    failing_unit_scopes: HashSet<NamespaceScope>,
    failing_dependent_lists: HashSet<(DependentKind, NamespaceScope)>,
    failing_deletes: HashMap<(ResourceKind, String, String), ClusterError>,

    namespace_list_calls: usize,
}

/// InMemoryCluster はメモリ上のクラスタ
///
/// # 使用例
/// ```ignore
/// let cluster = InMemoryCluster::new();
/// cluster.add_namespace(Namespace::new("user-user1")).await;
/// cluster.add_unit(ObjectMeta::new("user-user1", "ondemand-job1")).await;
/// ```
#[derive(Clone, Default)]
pub struct InMemoryCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_namespace(&self, namespace: Namespace) {
        self.state.lock().await.namespaces.push(namespace);
    }

    pub async fn add_unit(&self, meta: ObjectMeta) {
        self.state.lock().await.units.push(meta);
    }

    pub async fn add_dependent(&self, kind: DependentKind, meta: ObjectMeta) {
        self.state.lock().await.dependents.push((kind, meta));
    }

    /// 現在の Pod 一覧（登録順）
    pub async fn units(&self) -> Vec<ObjectMeta> {
        self.state.lock().await.units.clone()
    }

    /// 現在の依存リソース一覧（登録順）
    pub async fn dependents(&self, kind: DependentKind) -> Vec<ObjectMeta> {
        let state = self.state.lock().await;
        state
            .dependents
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, meta)| meta.clone())
            .collect()
    }

    pub async fn namespace_list_calls(&self) -> usize {
        self.state.lock().await.namespace_list_calls
    }

    pub async fn fail_namespace_listing(&self) {
        self.state.lock().await.fail_namespace_listing = true;
    }

    pub async fn fail_unit_listing(&self, scope: NamespaceScope) {
        self.state.lock().await.failing_unit_scopes.insert(scope);
    }

    pub async fn fail_dependent_listing(&self, kind: DependentKind, scope: NamespaceScope) {
        self.state
            .lock()
            .await
            .failing_dependent_lists
            .insert((kind, scope));
    }

    /// delete を失敗させる。`ClusterError::NotFound` を渡せば「既に消えていた」を再現できる。
    pub async fn fail_delete(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        error: ClusterError,
    ) {
        self.state
            .lock()
            .await
            .failing_deletes
            .insert((kind, namespace.to_string(), name.to_string()), error);
    }
}

impl ClusterState {
    fn check_delete(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<(), ClusterError> {
        match self
            .failing_deletes
            .get(&(kind, namespace.to_string(), name.to_string()))
        {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

fn not_found(kind: ResourceKind, namespace: &str, name: &str) -> ClusterError {
    ClusterError::NotFound {
        kind,
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

#[async_trait]
impl ClusterApi for InMemoryCluster {
    async fn list_namespaces(&self, selector: &LabelSelector) -> Result<Vec<Namespace>, ClusterError> {
        let mut state = self.state.lock().await;
        state.namespace_list_calls += 1;
        if state.fail_namespace_listing {
            return Err(ClusterError::Api("injected namespace list failure".to_string()));
        }
        Ok(state
            .namespaces
            .iter()
            .filter(|ns| selector.matches(&ns.labels))
            .cloned()
            .collect())
    }

    async fn list_units(
        &self,
        scope: &NamespaceScope,
        selector: &LabelSelector,
    ) -> Result<Vec<ObjectMeta>, ClusterError> {
        let state = self.state.lock().await;
        if state.failing_unit_scopes.contains(scope) {
            return Err(ClusterError::Api(format!("injected pod list failure in {scope}")));
        }
        Ok(state
            .units
            .iter()
            .filter(|m| scope.contains(&m.namespace) && selector.matches(&m.labels))
            .cloned()
            .collect())
    }

    async fn list_dependents(
        &self,
        kind: DependentKind,
        scope: &NamespaceScope,
        selector: &LabelSelector,
    ) -> Result<Vec<ObjectMeta>, ClusterError> {
        let state = self.state.lock().await;
        if state.failing_dependent_lists.contains(&(kind, scope.clone())) {
            return Err(ClusterError::Api(format!(
                "injected {kind} list failure in {scope}"
            )));
        }
        Ok(state
            .dependents
            .iter()
            .filter(|(k, m)| {
                *k == kind && scope.contains(&m.namespace) && selector.matches(&m.labels)
            })
            .map(|(_, m)| m.clone())
            .collect())
    }

    async fn delete_unit(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let mut state = self.state.lock().await;
        state.check_delete(ResourceKind::Pod, namespace, name)?;
        let position = state
            .units
            .iter()
            .position(|m| m.namespace == namespace && m.name == name)
            .ok_or_else(|| not_found(ResourceKind::Pod, namespace, name))?;
        state.units.remove(position);
        Ok(())
    }

    async fn delete_dependent(
        &self,
        kind: DependentKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClusterError> {
        let mut state = self.state.lock().await;
        state.check_delete(kind.into(), namespace, name)?;
        let position = state
            .dependents
            .iter()
            .position(|(k, m)| *k == kind && m.namespace == namespace && m.name == name)
            .ok_or_else(|| not_found(kind.into(), namespace, name))?;
        state.dependents.remove(position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_units_respects_scope_and_selector() {
        let cluster = InMemoryCluster::new();
        cluster
            .add_unit(ObjectMeta::new("a", "p1").with_label("job", "1"))
            .await;
        cluster.add_unit(ObjectMeta::new("b", "p2")).await;

        let all = cluster
            .list_units(&NamespaceScope::All, &LabelSelector::everything())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let only_a = cluster
            .list_units(&NamespaceScope::Only("a".to_string()), &LabelSelector::everything())
            .await
            .unwrap();
        assert_eq!(only_a.len(), 1);

        let labelled = cluster
            .list_units(&NamespaceScope::All, &LabelSelector::parse("job").unwrap())
            .await
            .unwrap();
        assert_eq!(labelled[0].name, "p1");
    }

    #[tokio::test]
    async fn delete_missing_object_is_not_found() {
        let cluster = InMemoryCluster::new();
        let err = cluster
            .delete_dependent(DependentKind::Secret, "ns", "gone")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn injected_delete_failure() {
        let cluster = InMemoryCluster::new();
        cluster.add_unit(ObjectMeta::new("ns", "stuck")).await;
        cluster
            .fail_delete(
                ResourceKind::Pod,
                "ns",
                "stuck",
                ClusterError::Api("boom".to_string()),
            )
            .await;

        let err = cluster.delete_unit("ns", "stuck").await.unwrap_err();
        assert!(matches!(err, ClusterError::Api(_)));
        assert_eq!(cluster.units().await.len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_only_matching_kind() {
        let cluster = InMemoryCluster::new();
        cluster
            .add_dependent(DependentKind::Service, ObjectMeta::new("ns", "job1"))
            .await;
        cluster
            .add_dependent(DependentKind::Secret, ObjectMeta::new("ns", "job1"))
            .await;

        cluster
            .delete_dependent(DependentKind::Service, "ns", "job1")
            .await
            .unwrap();

        assert!(cluster.dependents(DependentKind::Service).await.is_empty());
        assert_eq!(cluster.dependents(DependentKind::Secret).await.len(), 1);
    }
}
