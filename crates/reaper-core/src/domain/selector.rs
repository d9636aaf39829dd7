//! LabelSelector - ラベルセレクタの値型
//!
//! `app.kubernetes.io/managed-by=open-ondemand,tier!=db,job` のような
//! equality-based selector を構築時に検証します。不正な文字列は
//! `parse()` の時点で `SelectorError` になり、走査は一度も始まりません。
//!
//! # サポートする書式
//! - `key=value` / `key==value`: 一致
//! - `key!=value`: 不一致（ラベルが無い場合も一致扱い）
//! - `key`: ラベルが存在する
//! - `!key`: ラベルが存在しない
//!
//! すべての requirement は AND で評価され、空のセレクタは全てに一致します。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::resource::Labels;

/// key の最大長（prefix を除いた name 部分）
const MAX_NAME_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("empty label key in selector term '{0}'")]
    EmptyKey(String),

    #[error("invalid label key '{0}'")]
    InvalidKey(String),

    #[error("invalid label value '{value}' for key '{key}'")]
    InvalidValue { key: String, value: String },
}

/// 1 つの条件
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Requirement {
    Equals { key: String, value: String },
    NotEquals { key: String, value: String },
    Exists(String),
    DoesNotExist(String),
}

impl Requirement {
    pub fn key(&self) -> &str {
        match self {
            Requirement::Equals { key, .. }
            | Requirement::NotEquals { key, .. }
            | Requirement::Exists(key)
            | Requirement::DoesNotExist(key) => key,
        }
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        match self {
            Requirement::Equals { key, value } => labels.get(key) == Some(value),
            Requirement::NotEquals { key, value } => labels.get(key) != Some(value),
            Requirement::Exists(key) => labels.contains_key(key),
            Requirement::DoesNotExist(key) => !labels.contains_key(key),
        }
    }

    fn parse(term: &str) -> Result<Self, SelectorError> {
        let requirement = if let Some((key, value)) = term.split_once("!=") {
            Requirement::NotEquals {
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            }
        } else if let Some((key, value)) = term.split_once("==").or_else(|| term.split_once('=')) {
            Requirement::Equals {
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            }
        } else if let Some(key) = term.strip_prefix('!') {
            Requirement::DoesNotExist(key.trim().to_string())
        } else {
            Requirement::Exists(term.to_string())
        };

        let key = requirement.key();
        if key.is_empty() {
            return Err(SelectorError::EmptyKey(term.to_string()));
        }
        if !is_valid_key(key) {
            return Err(SelectorError::InvalidKey(key.to_string()));
        }
        if let Requirement::Equals { key, value } | Requirement::NotEquals { key, value } =
            &requirement
            && !is_valid_value(value)
        {
            return Err(SelectorError::InvalidValue {
                key: key.clone(),
                value: value.clone(),
            });
        }
        Ok(requirement)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Equals { key, value } => write!(f, "{key}={value}"),
            Requirement::NotEquals { key, value } => write!(f, "{key}!={value}"),
            Requirement::Exists(key) => write!(f, "{key}"),
            Requirement::DoesNotExist(key) => write!(f, "!{key}"),
        }
    }
}

/// 検証済みのラベルセレクタ
///
/// # 使用例
/// ```ignore
/// let selector = LabelSelector::parse("app.kubernetes.io/managed-by=open-ondemand")?;
/// assert!(selector.matches(&pod.labels));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    /// 全てに一致する空のセレクタ
    pub fn everything() -> Self {
        Self::default()
    }

    /// カンマ区切りの selector 文字列をパース
    ///
    /// 空文字列（空白のみを含む）は空のセレクタになる。
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(Self::default());
        }
        let requirements = input
            .split(',')
            .map(|term| Requirement::parse(term.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { requirements })
    }

    /// `key=value` の 1 条件だけのセレクタ
    pub fn equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            requirements: vec![Requirement::Equals {
                key: key.into(),
                value: value.into(),
            }],
        }
    }

    /// 条件を 1 つ追加したセレクタを返す
    pub fn and(mut self, requirement: Requirement) -> Self {
        if !self.requirements.contains(&requirement) {
            self.requirements.push(requirement);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// 全ての requirement を満たすか（AND）
    pub fn matches(&self, labels: &Labels) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, requirement) in self.requirements.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{requirement}")?;
        }
        Ok(())
    }
}

impl FromStr for LabelSelector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for LabelSelector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LabelSelector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// `[prefix/]name` 形式。prefix は DNS subdomain、name は 63 文字以内。
fn is_valid_key(key: &str) -> bool {
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };
    if let Some(prefix) = prefix {
        let prefix_ok = !prefix.is_empty()
            && prefix.len() <= 253
            && prefix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
        if !prefix_ok {
            return false;
        }
    }
    !name.is_empty() && name.len() <= MAX_NAME_LEN && is_name_segment(name)
}

/// 値は空でもよい
fn is_valid_value(value: &str) -> bool {
    value.is_empty() || (value.len() <= MAX_NAME_LEN && is_name_segment(value))
}

fn is_name_segment(s: &str) -> bool {
    let bytes = s.as_bytes();
    let alnum = |b: &u8| b.is_ascii_alphanumeric();
    bytes.first().is_some_and(alnum)
        && bytes.last().is_some_and(alnum)
        && bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}
