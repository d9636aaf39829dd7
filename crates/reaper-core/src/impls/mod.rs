//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryCluster**: 開発用・テスト用のクラスタ
//!
//! # 本番用実装
//! 本番用の実装は別クレートに配置します：
//! - `reaper-kube`: KubeCluster

pub mod inmem_cluster;

#[cfg(test)]
pub(crate) mod fixture;

// 主要な型を再エクスポート
pub use self::inmem_cluster::InMemoryCluster;
