//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせて reap の 1 pass を実装します。
//!
//! # 主要コンポーネント
//! - **ReaperBuilder**: 設定の検証とワイヤリング
//! - **ReaperCoordinator**: 1 pass の実行（resolve → evaluate → detect → delete）
//! - **NamespaceResolver**: 走査する namespace の決定
//! - **JobEvaluator**: 期限切れ Pod と既知 JobId の収集
//! - **OrphanDetector**: 持ち主のいない依存リソースの検出
//! - **ReaperMetrics**: カウンタと Prometheus 形式の出力

pub mod builder;
pub mod coordinator;
pub mod job_evaluator;
pub mod metrics;
pub mod namespace_resolver;
pub mod orphan_detector;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, ReaperBuilder};
pub use self::coordinator::{PassReport, ReaperCoordinator};
pub use self::job_evaluator::{Evaluation, JobEvaluator};
pub use self::metrics::{MetricsSnapshot, ReaperMetrics};
pub use self::namespace_resolver::NamespaceResolver;
pub use self::orphan_detector::{OrphanDetector, Orphans};
