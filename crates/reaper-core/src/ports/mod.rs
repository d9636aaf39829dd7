//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（Kubernetes API server, システム時刻）への
//! インターフェースを提供し、実装の詳細を隠蔽します。

pub mod clock;
pub mod cluster;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::cluster::ClusterApi;
