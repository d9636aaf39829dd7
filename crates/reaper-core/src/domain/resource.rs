//! Resource - クラスタ上のオブジェクトのビュー
//!
//! ports::ClusterApi が返す読み取り専用のスナップショットです。
//! 毎回の pass で新しく作り直され、pass をまたいで保持されることはありません。

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ラベル / アノテーションのマップ
///
/// BTreeMap なので Debug 出力やテストの比較が決定的になる。
pub type Labels = BTreeMap<String, String>;

/// 回収対象になりうるオブジェクトの種類
///
/// `as_str()` は metrics の `type` ラベルにそのまま使う。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Pod,
    Service,
    ConfigMap,
    Secret,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Pod,
        ResourceKind::Service,
        ResourceKind::ConfigMap,
        ResourceKind::Secret,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Pod => "pod",
            ResourceKind::Service => "service",
            ResourceKind::ConfigMap => "configmap",
            ResourceKind::Secret => "secret",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pod と同じ job label を持つ補助オブジェクトの種類
///
/// owner reference は張られていないので、job label だけが Pod との関連になる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependentKind {
    /// network endpoint
    Service,
    /// configuration bundle
    ConfigMap,
    /// credential bundle
    Secret,
}

impl DependentKind {
    /// 走査順。結果の並びもこの順になる。
    pub const ALL: [DependentKind; 3] = [
        DependentKind::Service,
        DependentKind::ConfigMap,
        DependentKind::Secret,
    ];

    pub fn as_str(&self) -> &'static str {
        ResourceKind::from(*self).as_str()
    }
}

impl From<DependentKind> for ResourceKind {
    fn from(kind: DependentKind) -> Self {
        match kind {
            DependentKind::Service => ResourceKind::Service,
            DependentKind::ConfigMap => ResourceKind::ConfigMap,
            DependentKind::Secret => ResourceKind::Secret,
        }
    }
}

impl fmt::Display for DependentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Namespace: 走査範囲の単位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub name: String,
    #[serde(default)]
    pub labels: Labels,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: Labels::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// list 呼び出しのスコープ
///
/// `All` は「全 namespace」を表すワイルドカード。namespace 名を列挙せずに
/// list 呼び出し側に範囲の解決を任せる。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NamespaceScope {
    All,
    Only(String),
}

impl NamespaceScope {
    /// この scope に namespace が含まれるか
    pub fn contains(&self, namespace: &str) -> bool {
        match self {
            NamespaceScope::All => true,
            NamespaceScope::Only(name) => name == namespace,
        }
    }
}

impl fmt::Display for NamespaceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamespaceScope::All => f.write_str("*"),
            NamespaceScope::Only(name) => f.write_str(name),
        }
    }
}

/// list 呼び出しが返すオブジェクトのメタデータ
///
/// Pod も Service / ConfigMap / Secret もここまで落としてから評価する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub annotations: Labels,

    /// 未設定の場合は「最も古い時刻」として扱う（`creation_time()` 参照）
    pub creation_timestamp: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            labels: Labels::new(),
            annotations: Labels::new(),
            creation_timestamp: None,
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.creation_timestamp = Some(at);
        self
    }

    /// 作成時刻
    ///
    /// creation timestamp が無いオブジェクトは表現可能な最古の時刻に作られたものとみなす。
    /// つまり Pod は必ず期限切れ、依存リソースは race guard で保護されない。
    pub fn creation_time(&self) -> DateTime<Utc> {
        self.creation_timestamp.unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// (namespace, name) での並び替えキー
    pub fn sort_key(&self) -> (&str, &str) {
        (&self.namespace, &self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn kind_labels_match_metric_series() {
        let labels: Vec<&str> = ResourceKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(labels, vec!["pod", "service", "configmap", "secret"]);
        assert_eq!(DependentKind::ConfigMap.as_str(), "configmap");
    }

    #[test]
    fn missing_creation_timestamp_is_earliest_instant() {
        let meta = ObjectMeta::new("ns", "pod");
        assert_eq!(meta.creation_time(), DateTime::<Utc>::MIN_UTC);

        let at = Utc.with_ymd_and_hms(2020, 1, 1, 13, 0, 0).unwrap();
        let meta = meta.created_at(at);
        assert_eq!(meta.creation_time(), at);
    }

    #[test]
    fn wildcard_scope_contains_every_namespace() {
        assert!(NamespaceScope::All.contains("anything"));
        assert!(NamespaceScope::Only("a".to_string()).contains("a"));
        assert!(!NamespaceScope::Only("a".to_string()).contains("b"));
    }
}
