//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为解析引擎对外暴露的错误语义提供集中定义：无值、请求畸形、Provider 自身失败、门面方法无法解析；
//! - 区分“可视为空值”的缺失与“必须立即暴露”的编程错误，调用方据此决定是否降级。
//!
//! ## 设计要求（What）
//! - 所有错误类型派生 `thiserror::Error`，满足 `Send + Sync + 'static`；
//! - 引擎从不重试 Provider；`Provider` 变体原样向 `load` 调用方传播。

use std::borrow::Cow;
use std::fmt;

use thiserror::Error;

use crate::address::Path;

/// Provider 自身错误的装箱形式。
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 解析引擎的统一错误域。
///
/// # 教案式说明
/// - **契约 (What)**：
///   - `NoSuchElement`：地址没有任何 Provider 给出答案（`permanent = true`），或值当前缺失（`permanent = false`）；
///     调用方可视为空值而非致命错误；
///   - `Malformed`：相对路径未能归一化、对根节点调用 `load`、打分时传入非绝对参考路径等编程错误，快速失败；
///   - `Provider`：Provider 在 `get` 或值求值过程中失败，引擎不捕获、不重试；
///   - `Unsupported`：门面方法既无 Provider 应答也没有默认实现；
///   - `TypeMismatch`：类型化读取时载荷的实际类型与期望不符；
///   - `IneligibleContract`：能力契约不满足门面合成的结构约束。
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResolveError {
    #[error("no such element at `{path}`")]
    NoSuchElement { path: Path, permanent: bool },

    #[error("malformed resolution request: {detail}")]
    Malformed { detail: Cow<'static, str> },

    #[error("provider `{provider}` failed while resolving `{path}`: {source}")]
    Provider {
        provider: Cow<'static, str>,
        path: Path,
        #[source]
        source: BoxError,
    },

    #[error("method `{method}` of contract `{contract}` cannot be resolved and has no default")]
    Unsupported { contract: String, method: String },

    #[error("value at `{path}` is not a `{expected}`")]
    TypeMismatch { path: Path, expected: &'static str },

    #[error("contract `{contract}` is not eligible for facade synthesis: {reason}")]
    IneligibleContract {
        contract: String,
        reason: Cow<'static, str>,
    },
}

impl ResolveError {
    /// 构造永久缺失错误：任何 Provider 都不会为该地址给出答案。
    pub fn not_found(path: &Path) -> Self {
        Self::NoSuchElement {
            path: path.clone(),
            permanent: true,
        }
    }

    /// 构造暂时缺失错误：值当前不可用，后续求值可能成功。
    pub fn unavailable(path: &Path) -> Self {
        Self::NoSuchElement {
            path: path.clone(),
            permanent: false,
        }
    }

    /// 构造编程错误。
    pub fn malformed<D>(detail: D) -> Self
    where
        D: Into<Cow<'static, str>>,
    {
        Self::Malformed {
            detail: detail.into(),
        }
    }

    /// 将 Provider 内部错误包装为带地址上下文的解析错误。
    pub fn provider<N, E>(provider: N, path: &Path, source: E) -> Self
    where
        N: Into<Cow<'static, str>>,
        E: Into<BoxError>,
    {
        Self::Provider {
            provider: provider.into(),
            path: path.clone(),
            source: source.into(),
        }
    }

    /// 是否属于“缺失”语义（永久或暂时），此类错误可被视为空值。
    #[inline]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::NoSuchElement { .. })
    }

    /// 是否为永久缺失。
    #[inline]
    pub fn is_permanent_absence(&self) -> bool {
        matches!(
            self,
            Self::NoSuchElement {
                permanent: true,
                ..
            }
        )
    }

    /// 返回错误类别。
    pub fn kind(&self) -> ResolveErrorKind {
        match self {
            Self::NoSuchElement { .. } => ResolveErrorKind::NoSuchElement,
            Self::Malformed { .. } => ResolveErrorKind::Malformed,
            Self::Provider { .. } => ResolveErrorKind::Provider,
            Self::Unsupported { .. } => ResolveErrorKind::Unsupported,
            Self::TypeMismatch { .. } => ResolveErrorKind::TypeMismatch,
            Self::IneligibleContract { .. } => ResolveErrorKind::IneligibleContract,
        }
    }
}

/// 辅助枚举，用于按类别匹配错误而不解构上下文。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ResolveErrorKind {
    NoSuchElement,
    Malformed,
    Provider,
    Unsupported,
    TypeMismatch,
    IneligibleContract,
}

impl fmt::Display for ResolveErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoSuchElement => "no_such_element",
            Self::Malformed => "malformed",
            Self::Provider => "provider",
            Self::Unsupported => "unsupported",
            Self::TypeMismatch => "type_mismatch",
            Self::IneligibleContract => "ineligible_contract",
        };
        f.write_str(name)
    }
}

/// 注册 Provider 时可能出现的错误。
///
/// ### 契约说明（What）
/// - `Duplicate`：同一实例被重复注册（按指针判断）。
/// - `Capacity`：超出 [`EngineBuilder::with_capacity`](crate::EngineBuilder::with_capacity) 声明的上限。
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProviderRegistrationError {
    #[error("provider instance is already registered")]
    Duplicate,
    #[error("provider capacity exceeded")]
    Capacity,
}

const _: fn() = || {
    fn assert_error_traits<T: std::error::Error + Send + Sync + 'static>() {}

    assert_error_traits::<ResolveError>();
    assert_error_traits::<ProviderRegistrationError>();
};
