//! Provider 契约：可插拔的后端，为部分地址给出候选值。
//!
//! # 契约说明（What）
//! - `get(requestor, path)` 的前置条件：`path` 为绝对路径，`path.starts_with(requestor.path())`
//!   且 `path != requestor.path()`；
//! - 返回 `Ok(Some(value))` 表示“足够好”的候选，`Ok(None)` 表示永久或暂时拒绝回答；
//!   两类拒绝在本层不作区分，需要区分时依赖值自身的确定性标记；
//! - 返回 `Err` 表示 Provider 自身故障，引擎原样传播、不重试；
//! - 必须可被多个解析链并发调用，不要求跨调用确定。

use std::any::type_name;
use std::borrow::Cow;
use std::sync::Arc;

use crate::address::{Path, QualifiedType};
use crate::engine::Requestor;
use crate::error::ResolveError;
use crate::value::Value;

/// 可插拔后端契约。
pub trait Provider: Send + Sync {
    /// 诊断用名称，默认取实现类型名。
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(type_name::<Self>())
    }

    /// 能回答的类型上界：请求类型必须是它的子类型，否则引擎不会调用本 Provider。
    fn upper_bound(&self) -> QualifiedType {
        QualifiedType::any()
    }

    /// 能回答的类型下界：若声明，请求类型必须是它的父类型。
    fn lower_bound(&self) -> Option<QualifiedType> {
        None
    }

    /// 为 `path` 给出候选值或拒绝。
    fn get(&self, requestor: &Requestor<'_>, path: &Path) -> Result<Option<Value>, ResolveError>;

    /// 丢弃 Provider 内部缓存；引擎整体清空缓存时调用。
    fn clear(&self) {}
}

/// 类型预过滤：请求类型是否落在 Provider 声明的 `[lower, upper]` 区间内。
pub(crate) fn admits(provider: &dyn Provider, requested: &QualifiedType) -> bool {
    if !requested.is_subtype_of(&provider.upper_bound()) {
        return false;
    }
    provider
        .lower_bound()
        .is_none_or(|lower| lower.is_subtype_of(requested))
}

/// 将闭包直接适配为 [`Provider`]，便于测试与快速原型。
///
/// - **契约 (What)**：闭包签名与 [`Provider::get`] 一致；名称由调用方给出，上界默认为 `any`；
/// - **注意 (Trade-offs)**：闭包需满足 `Send + Sync + 'static`，否则无法注册进引擎。
pub struct ProviderFn<F> {
    name: Cow<'static, str>,
    upper: QualifiedType,
    logic: F,
}

impl<F> ProviderFn<F>
where
    F: Fn(&Requestor<'_>, &Path) -> Result<Option<Value>, ResolveError> + Send + Sync,
{
    /// 收窄类型上界。
    pub fn with_upper_bound(mut self, upper: QualifiedType) -> Self {
        self.upper = upper;
        self
    }
}

/// 构造 [`ProviderFn`]。
pub fn provider_fn<N, F>(name: N, logic: F) -> ProviderFn<F>
where
    N: Into<Cow<'static, str>>,
    F: Fn(&Requestor<'_>, &Path) -> Result<Option<Value>, ResolveError> + Send + Sync,
{
    ProviderFn {
        name: name.into(),
        upper: QualifiedType::any(),
        logic,
    }
}

impl<F> Provider for ProviderFn<F>
where
    F: Fn(&Requestor<'_>, &Path) -> Result<Option<Value>, ResolveError> + Send + Sync,
{
    fn name(&self) -> Cow<'static, str> {
        self.name.clone()
    }

    fn upper_bound(&self) -> QualifiedType {
        self.upper.clone()
    }

    fn get(&self, requestor: &Requestor<'_>, path: &Path) -> Result<Option<Value>, ResolveError> {
        (self.logic)(requestor, path)
    }
}

/// `'static` 单例 Provider 的借用包装，避免为全局实例重复分配。
pub(crate) struct BorrowedProvider {
    pub(crate) inner: &'static dyn Provider,
}

impl Provider for BorrowedProvider {
    fn name(&self) -> Cow<'static, str> {
        self.inner.name()
    }

    fn upper_bound(&self) -> QualifiedType {
        self.inner.upper_bound()
    }

    fn lower_bound(&self) -> Option<QualifiedType> {
        self.inner.lower_bound()
    }

    fn get(&self, requestor: &Requestor<'_>, path: &Path) -> Result<Option<Value>, ResolveError> {
        self.inner.get(requestor, path)
    }

    fn clear(&self) {
        self.inner.clear()
    }
}

impl<P> Provider for Arc<P>
where
    P: Provider + ?Sized,
{
    fn name(&self) -> Cow<'static, str> {
        (**self).name()
    }

    fn upper_bound(&self) -> QualifiedType {
        (**self).upper_bound()
    }

    fn lower_bound(&self) -> Option<QualifiedType> {
        (**self).lower_bound()
    }

    fn get(&self, requestor: &Requestor<'_>, path: &Path) -> Result<Option<Value>, ResolveError> {
        (**self).get(requestor, path)
    }

    fn clear(&self) {
        (**self).clear()
    }
}
