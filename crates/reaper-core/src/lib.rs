//! reaper-core
//!
//! Core building blocks for the job pod reaper.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（selector, ids, lifetime, resource, unit, errors, config）
//! - **ports**: 抽象化レイヤー（ClusterApi, Clock）
//! - **app**: アプリケーションロジック（builder, coordinator, evaluator, detector, metrics）
//! - **impls**: 実装（InMemoryCluster など開発用）

pub mod domain;
pub mod ports;
pub mod app;
pub mod impls;
