//! 歧义策略：多个 Provider 回答同一地址时的打分与裁决规则。
//!
//! # 使用路线图
//! 1. 引擎先用 [`AmbiguityPolicy::score_qualifiers`] 比较候选；高者直接胜出；
//! 2. 标签得分相同则用 [`AmbiguityPolicy::score_path`] 比较路径具体程度；
//! 3. 仍然相同则交给 [`AmbiguityPolicy::disambiguate`]；默认策略拒绝裁决，两者一并丢弃。
//!
//! `provider_rejected` / `value_rejected` 是纯通知点，不得 panic，也不影响结果。

use std::borrow::Cow;

use crate::address::{Path, Qualifiers};
use crate::engine::Node;
use crate::error::ResolveError;
use crate::provider::Provider;
use crate::value::Value;

/// 得分哨兵：候选不可用，直接丢弃。
pub const UNUSABLE: i64 = i64::MIN;

/// 平局裁决结果。
#[derive(Debug)]
pub enum Disambiguation {
    /// 保留当前候选，丢弃挑战者。
    KeepCurrent,
    /// 挑战者取代当前候选。
    TakeChallenger,
    /// 两者都丢弃，本轮无胜者。
    DropBoth,
    /// 合成第三个值，它将作为新的挑战者与当前候选重新比较。
    Synthesized(Value),
}

/// 歧义策略契约。
///
/// ### 契约说明（What）
/// - 全局唯一实例，由 [`EngineBuilder::with_policy`](crate::EngineBuilder::with_policy) 注入；
/// - 打分函数必须是纯函数；返回 [`UNUSABLE`] 表示候选应被丢弃；
/// - 必须满足 `Send + Sync`，引擎会从多个线程并发调用。
pub trait AmbiguityPolicy: Send + Sync {
    /// 标签得分，默认实现见 [`qualifiers_score`]。
    fn score_qualifiers(&self, reference: &Qualifiers, candidate: &Qualifiers) -> i64 {
        qualifiers_score(reference, candidate)
    }

    /// 路径得分，默认实现见 [`path_score`]。
    fn score_path(&self, reference: &Path, candidate: &Path) -> Result<i64, ResolveError> {
        path_score(reference, candidate)
    }

    /// 两个候选在两项得分上完全持平时调用。
    fn disambiguate(
        &self,
        _requestor: &Node,
        _path: &Path,
        _current: &Value,
        _challenger: &Value,
    ) -> Disambiguation {
        Disambiguation::DropBoth
    }

    /// Provider 拒绝回答（返回 `None`）时的通知。
    fn provider_rejected(&self, _provider: &dyn Provider, _path: &Path) {}

    /// Provider 的答案未通过可选性检查或被判为不可用时的通知。
    fn value_rejected(&self, _provider: &dyn Provider, _path: &Path, _value: &Value) {}
}

/// 默认策略：两项得分按默认规则计算，平局时丢弃双方。
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultAmbiguityPolicy;

impl AmbiguityPolicy for DefaultAmbiguityPolicy {}

/// 平局时保留先注册 Provider 的答案。
///
/// 这是对默认行为的刻意改变：默认策略在平局时不做选择。
#[derive(Clone, Copy, Debug, Default)]
pub struct FirstWinsPolicy;

impl AmbiguityPolicy for FirstWinsPolicy {
    fn disambiguate(&self, _: &Node, _: &Path, _: &Value, _: &Value) -> Disambiguation {
        Disambiguation::KeepCurrent
    }
}

/// 把两个通知钩子转成 `tracing` 事件的包装策略，其余行为委托给内部策略。
#[derive(Clone, Debug, Default)]
pub struct LoggingPolicy<P> {
    inner: P,
}

impl<P> LoggingPolicy<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

impl<P> AmbiguityPolicy for LoggingPolicy<P>
where
    P: AmbiguityPolicy,
{
    fn score_qualifiers(&self, reference: &Qualifiers, candidate: &Qualifiers) -> i64 {
        self.inner.score_qualifiers(reference, candidate)
    }

    fn score_path(&self, reference: &Path, candidate: &Path) -> Result<i64, ResolveError> {
        self.inner.score_path(reference, candidate)
    }

    fn disambiguate(
        &self,
        requestor: &Node,
        path: &Path,
        current: &Value,
        challenger: &Value,
    ) -> Disambiguation {
        let outcome = self.inner.disambiguate(requestor, path, current, challenger);
        tracing::debug!(
            target: "spark_config::policy",
            path = %path,
            current = %current.path(),
            challenger = %challenger.path(),
            outcome = ?outcome,
            "tie between candidates"
        );
        outcome
    }

    fn provider_rejected(&self, provider: &dyn Provider, path: &Path) {
        tracing::debug!(
            target: "spark_config::policy",
            provider = %provider.name(),
            path = %path,
            "provider declined"
        );
        self.inner.provider_rejected(provider, path);
    }

    fn value_rejected(&self, provider: &dyn Provider, path: &Path, value: &Value) {
        tracing::debug!(
            target: "spark_config::policy",
            provider = %provider.name(),
            path = %path,
            candidate = %value.path(),
            "candidate rejected"
        );
        self.inner.value_rejected(provider, path, value);
    }
}

/// 默认标签得分。
///
/// ### 逻辑解析（How）
/// - 存在共享标签：得分为共享数；若候选不是参考集合的子集，再减去对称差大小；
/// - 无共享标签：得分为 `-(两侧大小之和)`，排在任何正交集候选之后；两侧都为空时为 0。
pub fn qualifiers_score(reference: &Qualifiers, candidate: &Qualifiers) -> i64 {
    let shared = reference.intersection_size(candidate) as i64;
    if shared > 0 {
        if candidate.is_subset_of(reference) {
            shared
        } else {
            shared - candidate.symmetric_difference_size(reference) as i64
        }
    } else {
        -((reference.len() + candidate.len()) as i64)
    }
}

/// 默认路径得分：候选路径必须兼容地匹配参考路径的末尾，得分为候选路径长度。
///
/// ### 契约说明（What）
/// - `reference` 必须是绝对路径，否则返回 [`ResolveError::Malformed`]；
/// - 不匹配时返回 [`UNUSABLE`]。
pub fn path_score(reference: &Path, candidate: &Path) -> Result<i64, ResolveError> {
    if !reference.is_absolute() {
        return Err(ResolveError::malformed(Cow::Owned(format!(
            "reference path `{reference}` must be absolute for scoring"
        ))));
    }
    if reference.ends_with_compatible(candidate) {
        Ok(candidate.len() as i64)
    } else {
        Ok(UNUSABLE)
    }
}
