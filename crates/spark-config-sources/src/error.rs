//! 数据源自身的错误域。
//!
//! 构造阶段（解析文档、登记键）的错误直接返回给调用方；解析阶段的错误由各 Provider 通过
//! [`ResolveError::provider`](spark_config::ResolveError::provider) 包装后交给引擎传播。

use thiserror::Error;

/// 数据源错误。
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SourceError {
    #[error("failed to parse JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "toml")]
    #[error("failed to parse TOML document: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("document root must be an object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("invalid key `{key}`: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("value `{raw}` of `{key}` cannot be read as `{expected}`")]
    Coercion {
        key: String,
        raw: String,
        expected: String,
    },
}

const _: fn() = || {
    fn assert_error_traits<T: std::error::Error + Send + Sync + 'static>() {}

    assert_error_traits::<SourceError>();
};
