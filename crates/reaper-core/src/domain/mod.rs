//! Domain model (selectors, ids, pods, dependents, errors, config).
//!
//! クラスタから読み出した状態の「形」だけを定義します。
//! API 呼び出しや時刻の取得はここには置かず、ports 側に任せます。

pub mod config;
pub mod errors;
pub mod ids;
pub mod lifetime;
pub mod resource;
pub mod selector;
pub mod unit;

pub use self::config::{ReaperConfig, ReaperSettings};
pub use self::errors::{ClusterError, ReaperError, ScanIssue};
pub use self::ids::JobId;
pub use self::lifetime::{Lifetime, LifetimeError};
pub use self::resource::{DependentKind, Labels, Namespace, NamespaceScope, ObjectMeta, ResourceKind};
pub use self::selector::{LabelSelector, Requirement, SelectorError};
pub use self::unit::{DependentResource, ManagedUnit};
