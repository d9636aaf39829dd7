//! reaper-kube
//!
//! `ClusterApi` の本番用実装。Kubernetes API server と `kube` クライアントで話す。
//!
//! - list は `ListParams` の label selector でサーバ側に絞り込ませる
//! - delete の 404 は `ClusterError::NotFound`（reaper 側では成功扱い）
//! - `creationTimestamp` が無いオブジェクトは `None` のまま渡す

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace as KubeNamespace, Pod, Secret, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta as KubeObjectMeta;
use kube::api::{Api, DeleteParams, ListParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;

use reaper_core::domain::{
    ClusterError, DependentKind, LabelSelector, Namespace, NamespaceScope, ObjectMeta,
    ResourceKind,
};
use reaper_core::ports::ClusterApi;

/// KubeCluster は Kubernetes API server 上のクラスタ
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// in-cluster config か kubeconfig から接続する
    pub async fn try_default() -> Result<Self, kube::Error> {
        Ok(Self::new(Client::try_default().await?))
    }

    fn api<K>(&self, scope: &NamespaceScope) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        match scope {
            NamespaceScope::All => Api::all(self.client.clone()),
            NamespaceScope::Only(namespace) => Api::namespaced(self.client.clone(), namespace),
        }
    }

    async fn list<K>(
        &self,
        kind: ResourceKind,
        scope: &NamespaceScope,
        selector: &LabelSelector,
    ) -> Result<Vec<ObjectMeta>, ClusterError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        K::DynamicType: Default,
    {
        let objects = self
            .api::<K>(scope)
            .list(&list_params(selector))
            .await
            .map_err(|e| ClusterError::Api(e.to_string()))?;

        tracing::debug!(
            kind = %kind,
            scope = %scope,
            selector = %selector,
            count = objects.items.len(),
            "listed objects"
        );
        Ok(objects
            .items
            .iter()
            .map(|object| object_meta(object.meta()))
            .collect())
    }

    async fn delete<K>(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClusterError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        K::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| delete_error(kind, namespace, name, e))
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn list_namespaces(
        &self,
        selector: &LabelSelector,
    ) -> Result<Vec<Namespace>, ClusterError> {
        let api: Api<KubeNamespace> = Api::all(self.client.clone());
        let namespaces = api
            .list(&list_params(selector))
            .await
            .map_err(|e| ClusterError::Api(e.to_string()))?;

        Ok(namespaces
            .items
            .iter()
            .map(|ns| namespace(&ns.metadata))
            .collect())
    }

    async fn list_units(
        &self,
        scope: &NamespaceScope,
        selector: &LabelSelector,
    ) -> Result<Vec<ObjectMeta>, ClusterError> {
        self.list::<Pod>(ResourceKind::Pod, scope, selector).await
    }

    async fn list_dependents(
        &self,
        kind: DependentKind,
        scope: &NamespaceScope,
        selector: &LabelSelector,
    ) -> Result<Vec<ObjectMeta>, ClusterError> {
        match kind {
            DependentKind::Service => self.list::<Service>(kind.into(), scope, selector).await,
            DependentKind::ConfigMap => self.list::<ConfigMap>(kind.into(), scope, selector).await,
            DependentKind::Secret => self.list::<Secret>(kind.into(), scope, selector).await,
        }
    }

    async fn delete_unit(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.delete::<Pod>(ResourceKind::Pod, namespace, name).await
    }

    async fn delete_dependent(
        &self,
        kind: DependentKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClusterError> {
        match kind {
            DependentKind::Service => self.delete::<Service>(kind.into(), namespace, name).await,
            DependentKind::ConfigMap => {
                self.delete::<ConfigMap>(kind.into(), namespace, name).await
            }
            DependentKind::Secret => self.delete::<Secret>(kind.into(), namespace, name).await,
        }
    }
}

/// 空の selector は「全件」
fn list_params(selector: &LabelSelector) -> ListParams {
    if selector.is_empty() {
        ListParams::default()
    } else {
        ListParams::default().labels(&selector.to_string())
    }
}

fn object_meta(meta: &KubeObjectMeta) -> ObjectMeta {
    ObjectMeta {
        namespace: meta.namespace.clone().unwrap_or_default(),
        name: meta.name.clone().unwrap_or_default(),
        labels: meta.labels.clone().unwrap_or_default(),
        annotations: meta.annotations.clone().unwrap_or_default(),
        creation_timestamp: meta.creation_timestamp.as_ref().map(|t| t.0),
    }
}

fn namespace(meta: &KubeObjectMeta) -> Namespace {
    Namespace {
        name: meta.name.clone().unwrap_or_default(),
        labels: meta.labels.clone().unwrap_or_default(),
    }
}

fn delete_error(kind: ResourceKind, namespace: &str, name: &str, error: kube::Error) -> ClusterError {
    match error {
        kube::Error::Api(response) if response.code == 404 => ClusterError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        other => ClusterError::Api(other.to_string()),
    }
}
