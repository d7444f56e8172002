//! 解析算法：地址归一化、请求方定位、缓存发布与 Provider 竞争。

use std::any::type_name;
use std::cmp::Ordering;
use std::sync::Arc;

use crate::address::{Element, Path};
use crate::error::ResolveError;
use crate::policy::{AmbiguityPolicy, Disambiguation, UNUSABLE};
use crate::provider::{Provider, admits};
use crate::value::Value;

use super::chain::{InFlight, Requestor};
use super::Node;

/// 归一化探测地址保留的末段名称。
pub const TRANSLITERATION_MARKER: &str = "transliterate";

/// 探测地址上记录原路径文本形式的标签键。
pub const TRANSLITERATION_QUALIFIER: &str = "path";

/// 通过可选性检查并完成打分的候选。
struct Candidate {
    value: Value,
    qualifiers_score: i64,
    path_score: i64,
}

impl Candidate {
    fn cmp_scores(&self, other: &Candidate) -> Ordering {
        self.qualifiers_score
            .cmp(&other.qualifiers_score)
            .then(self.path_score.cmp(&other.path_score))
    }
}

impl Node {
    /// 加载地址对应的节点；相对路径相对于本节点解析。
    ///
    /// ### 执行流程（How）
    /// 1. 归一化为绝对路径，拒绝根路径；
    /// 2. 命中缓存直接返回；
    /// 3. 定位请求方：已解析的最长前缀节点；
    /// 4. 由请求方依次询问 Provider 并裁决，得到新节点；
    /// 5. 以“先查、后插、以已发布者为准”的方式写入缓存。计算期间不持有任何缓存锁，
    ///    因为 Provider 可能回调 `load`；竞争下可能重复计算，但所有调用方拿到同一个已发布节点。
    ///
    /// 计算期间若有 Provider 因递归守卫被跳过，结果只对当前调用链成立：节点直接返回给调用方而不发布，
    /// 外层完整计算的结果才会进入缓存。
    pub fn load(self: &Arc<Self>, path: &Path) -> Result<Arc<Node>, ResolveError> {
        self.load_in(path, None)
    }

    pub(crate) fn load_in(
        self: &Arc<Self>,
        path: &Path,
        chain: Option<&InFlight<'_>>,
    ) -> Result<Arc<Node>, ResolveError> {
        if self.shared.is_closed() {
            return Err(ResolveError::malformed(format!(
                "cannot load `{path}`: the engine has been dropped"
            )));
        }
        let absolute = self.normalize_in(path, chain)?;
        if !absolute.is_absolute() {
            return Err(ResolveError::malformed(format!(
                "path `{absolute}` is not absolute after normalization"
            )));
        }
        if absolute.len() < 2 {
            return Err(ResolveError::malformed("the root node cannot be loaded"));
        }

        if let Some(hit) = self.cached(&absolute) {
            tracing::trace!(target: "spark_config::engine", path = %absolute, "cache hit");
            return Ok(hit);
        }

        let requestor = self.requestor_for(&absolute);
        tracing::trace!(
            target: "spark_config::engine",
            path = %absolute,
            requestor = %requestor.path(),
            "cache miss"
        );
        let (computed, guarded) = requestor.compute(&absolute, chain)?;
        if guarded {
            tracing::trace!(
                target: "spark_config::engine",
                path = %absolute,
                "result depends on the in-flight chain, not published"
            );
            return Ok(computed);
        }
        if self.shared.is_closed() {
            return Ok(computed);
        }
        let published = Arc::clone(self.shared.cache.entry(absolute).or_insert(computed).value());
        Ok(published)
    }

    fn cached(&self, path: &Path) -> Option<Arc<Node>> {
        self.shared
            .cache
            .get(path)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// 地址归一化。
    ///
    /// - 绝对且（已归一化或仅含根段）：原样返回；
    /// - 绝对但未归一化：进入转写；
    /// - 相对：先拼接到本节点路径之后，再转写。
    pub fn normalize(self: &Arc<Self>, path: &Path) -> Result<Path, ResolveError> {
        self.normalize_in(path, None)
    }

    fn normalize_in(
        self: &Arc<Self>,
        path: &Path,
        chain: Option<&InFlight<'_>>,
    ) -> Result<Path, ResolveError> {
        if path.is_absolute() {
            if path.is_transliterated() || path.len() == 1 {
                return Ok(path.clone());
            }
            return self.transliterate(path.clone(), chain);
        }
        self.transliterate(self.path().plus(path), chain)
    }

    /// 转写钩子：把路径以探测地址的形式交给 Provider 链，若有人回答则以其答案替换原路径。
    fn transliterate(
        self: &Arc<Self>,
        path: Path,
        chain: Option<&InFlight<'_>>,
    ) -> Result<Path, ResolveError> {
        if !self.shared.transliteration
            || path.last_element().name() == TRANSLITERATION_MARKER
        {
            return Ok(path.into_transliterated());
        }

        let marker = path
            .join(
                Element::new(TRANSLITERATION_MARKER)
                    .typed::<Path>()
                    .with_qualifier(TRANSLITERATION_QUALIFIER, path.to_string()),
            )
            .into_transliterated();
        let Some(payload) = self.load_in(&marker, chain)?.get_optional()? else {
            return Ok(path.into_transliterated());
        };
        match payload.downcast::<Path>() {
            Ok(rewritten) if rewritten.is_absolute() => {
                tracing::debug!(
                    target: "spark_config::engine",
                    from = %path,
                    to = %rewritten,
                    "path transliterated"
                );
                Ok(rewritten.as_ref().clone().into_transliterated())
            }
            Ok(rewritten) => Err(ResolveError::malformed(format!(
                "transliteration of `{path}` produced relative path `{rewritten}`"
            ))),
            Err(_) => Err(ResolveError::TypeMismatch {
                path: marker,
                expected: type_name::<Path>(),
            }),
        }
    }

    /// 已解析的最长绝对前缀节点：先沿父链上行到某个前缀，再沿缓存下行。
    fn requestor_for(self: &Arc<Self>, absolute: &Path) -> Arc<Node> {
        let mut current = Arc::clone(self);
        while !current.is_root()
            && (current.path().len() >= absolute.len() || !absolute.starts_with(current.path()))
        {
            current = current.parent();
        }
        for len in (current.path().len() + 1..absolute.len()).rev() {
            let found = absolute.prefix(len).and_then(|prefix| self.cached(&prefix));
            if let Some(node) = found {
                return node;
            }
        }
        current
    }

    /// 以本节点为请求方，询问所有 Provider 并裁决出胜者。
    ///
    /// 返回的布尔值表示是否有 Provider 因递归守卫被跳过。
    fn compute(
        self: &Arc<Self>,
        path: &Path,
        chain: Option<&InFlight<'_>>,
    ) -> Result<(Arc<Node>, bool), ResolveError> {
        let shared = Arc::clone(&self.shared);
        let policy = shared.policy.as_ref();
        let mut best: Option<Candidate> = None;
        let mut guarded = false;

        for registered in &shared.providers {
            let provider = registered.provider.as_ref();
            if chain.is_some_and(|frame| frame.contains(path, registered.id)) {
                tracing::trace!(
                    target: "spark_config::engine",
                    provider = %provider.name(),
                    path = %path,
                    "provider already in flight for this path, skipped"
                );
                guarded = true;
                continue;
            }
            if !admits(provider, path.qualified()) {
                continue;
            }

            let frame = InFlight {
                path,
                provider: registered.id,
                parent: chain,
            };
            let requestor = Requestor {
                node: self,
                chain: Some(&frame),
            };
            let answer = provider.get(&requestor, path).inspect_err(|error| {
                tracing::debug!(
                    target: "spark_config::engine",
                    provider = %provider.name(),
                    path = %path,
                    error = %error,
                    "provider failed"
                );
            })?;

            let Some(value) = answer else {
                policy.provider_rejected(provider, path);
                continue;
            };
            if !is_selectable(path, &value) {
                policy.value_rejected(provider, path, &value);
                continue;
            }
            best = self.contest(policy, provider, path, best, value)?;
        }

        let node = match best {
            Some(winner) => Node::resolved(self, path.clone(), winner.value),
            None => Node::absent(self, path.clone()),
        };
        Ok((node, guarded))
    }

    /// 新候选与当前候选比较：先比标签得分，再比路径得分，最后交给策略裁决。
    fn contest(
        &self,
        policy: &dyn AmbiguityPolicy,
        provider: &dyn Provider,
        path: &Path,
        current: Option<Candidate>,
        value: Value,
    ) -> Result<Option<Candidate>, ResolveError> {
        let Some(mut challenger) = rank(policy, provider, path, value)? else {
            return Ok(current);
        };
        let Some(incumbent) = current else {
            return Ok(Some(challenger));
        };

        loop {
            match challenger.cmp_scores(&incumbent) {
                Ordering::Less => return Ok(Some(incumbent)),
                Ordering::Greater => return Ok(Some(challenger)),
                Ordering::Equal => {}
            }
            match policy.disambiguate(self, path, &incumbent.value, &challenger.value) {
                Disambiguation::KeepCurrent => return Ok(Some(incumbent)),
                Disambiguation::TakeChallenger => return Ok(Some(challenger)),
                Disambiguation::DropBoth => {
                    tracing::debug!(
                        target: "spark_config::engine",
                        path = %path,
                        "unresolved tie, both candidates dropped"
                    );
                    return Ok(None);
                }
                Disambiguation::Synthesized(value) => {
                    if !is_selectable(path, &value) {
                        policy.value_rejected(provider, path, &value);
                        return Ok(Some(incumbent));
                    }
                    match rank(policy, provider, path, value)? {
                        Some(next) => challenger = next,
                        None => return Ok(Some(incumbent)),
                    }
                }
            }
        }
    }
}

/// 打分；任一得分为 [`UNUSABLE`] 时通知策略并返回 `None`。
fn rank(
    policy: &dyn AmbiguityPolicy,
    provider: &dyn Provider,
    path: &Path,
    value: Value,
) -> Result<Option<Candidate>, ResolveError> {
    let qualifiers_score = policy.score_qualifiers(path.qualifiers(), value.qualifiers());
    let path_score = if qualifiers_score == UNUSABLE {
        UNUSABLE
    } else {
        policy.score_path(path, value.path())?
    };
    if path_score == UNUSABLE {
        policy.value_rejected(provider, path, &value);
        return Ok(None);
    }
    Ok(Some(Candidate {
        value,
        qualifiers_score,
        path_score,
    }))
}

/// 可选性：值的标签与请求标签兼容，且值路径能兼容地匹配请求路径的末尾（更长的值路径视为拒绝）。
fn is_selectable(path: &Path, value: &Value) -> bool {
    value.qualifiers().is_compatible_with(path.qualifiers())
        && path.ends_with_compatible(value.path())
}
