//! NamespaceResolver - 走査する namespace の決定

use std::collections::BTreeSet;

use crate::domain::{ClusterError, LabelSelector, NamespaceScope};
use crate::ports::ClusterApi;

/// NamespaceResolver は namespace selector から走査範囲を決める
///
/// # フロー
/// 1. selector が空なら `[NamespaceScope::All]`（namespace の list はしない）
/// 2. そうでなければ selector に一致する namespace を list
/// 3. 名前で重複排除・ソートして `NamespaceScope::Only` にする
pub struct NamespaceResolver<'a> {
    selector: &'a LabelSelector,
}

impl<'a> NamespaceResolver<'a> {
    pub fn new(selector: &'a LabelSelector) -> Self {
        Self { selector }
    }

    /// list の失敗はそのまま返す（pass 全体が中断される）
    pub async fn resolve(&self, cluster: &dyn ClusterApi) -> Result<Vec<NamespaceScope>, ClusterError> {
        if self.selector.is_empty() {
            return Ok(vec![NamespaceScope::All]);
        }

        let names: BTreeSet<String> = cluster
            .list_namespaces(self.selector)
            .await?
            .into_iter()
            .filter(|ns| self.selector.matches(&ns.labels))
            .map(|ns| ns.name)
            .collect();

        tracing::debug!(
            selector = %self.selector,
            count = names.len(),
            "resolved namespaces"
        );
        Ok(names.into_iter().map(NamespaceScope::Only).collect())
    }
}
