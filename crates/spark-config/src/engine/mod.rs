//! 解析引擎：节点缓存、请求方定位、递归守卫与 Provider 竞争。
//!
//! # 模块结构
//! - `builder`：注册 Provider、注入策略与设置，产出 [`Engine`]；
//! - `node`：缓存的解析结果与节点求值；
//! - `chain`：调用链帧与 [`Requestor`]；
//! - `resolve`：`load` 算法本体。

mod builder;
mod chain;
mod node;
mod resolve;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;

use crate::address::Path;
use crate::error::ResolveError;
use crate::policy::AmbiguityPolicy;
use crate::provider::Provider;
use crate::value::Payload;

pub use builder::{EngineBuilder, EngineSettings};
pub(crate) use chain::InFlight;
pub use chain::Requestor;
pub use node::Node;
pub use resolve::{TRANSLITERATION_MARKER, TRANSLITERATION_QUALIFIER};

/// 注册顺序分配的 Provider 标识，递归守卫按它区分“同一 Provider”。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProviderId(usize);

impl ProviderId {
    /// 注册序号（从 0 开始）。
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

pub(crate) struct Registered {
    pub(crate) id: ProviderId,
    pub(crate) provider: Arc<dyn Provider>,
}

/// 引擎实例内所有节点共享的状态。
pub(crate) struct Shared {
    pub(crate) providers: Vec<Registered>,
    pub(crate) policy: Box<dyn AmbiguityPolicy>,
    pub(crate) cache: DashMap<Path, Arc<Node>>,
    pub(crate) transliteration: bool,
    /// 引擎句柄析构后置位；此后任何加载都被拒绝，缓存不再增长。
    pub(crate) closed: AtomicBool,
}

impl Shared {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 清空节点缓存并通知所有 Provider 丢弃内部缓存。
    fn clear(&self) {
        self.cache.clear();
        for registered in &self.providers {
            registered.provider.clear();
        }
    }
}

/// 解析引擎句柄。
///
/// ## 契约定义（What）
/// - 所有方法均可跨线程并发调用；
/// - 节点一经发布，在 [`clear_cache`](Self::clear_cache) 之前对同一绝对路径始终返回同一实例；
/// - 句柄析构时清空缓存，并让 Provider 丢弃其内部缓存，以断开“节点 → 共享状态 → 缓存 → 节点”的引用环；
/// - 析构后，调用方仍持有的 [`Node`] 或门面可以继续对已解析的值求值，但任何 `load` 都返回
///   [`ResolveError::Malformed`]，缓存不会被重新填充。
pub struct Engine {
    root: Arc<Node>,
}

impl Engine {
    /// 创建 [`EngineBuilder`]。
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub(crate) fn from_shared(shared: Shared) -> Self {
        Self {
            root: Node::root(Arc::new(shared)),
        }
    }

    /// 根节点：路径为 `/`，父节点是其自身。
    #[inline]
    pub fn root(&self) -> &Arc<Node> {
        &self.root
    }

    /// 从根节点加载地址。
    pub fn load(&self, path: &Path) -> Result<Arc<Node>, ResolveError> {
        self.root.load(path)
    }

    /// 加载并求值。
    pub fn get(&self, path: &Path) -> Result<Payload, ResolveError> {
        self.load(path)?.get()
    }

    /// 加载、求值并向下转型。
    pub fn get_as<T>(&self, path: &Path) -> Result<Arc<T>, ResolveError>
    where
        T: std::any::Any + Send + Sync,
    {
        self.load(path)?.get_as::<T>()
    }

    /// 丢弃全部已缓存节点，并调用每个 Provider 的 [`Provider::clear`]。
    pub fn clear_cache(&self) {
        tracing::debug!(
            target: "spark_config::engine",
            cached = self.root.shared.cache.len(),
            "clearing node cache"
        );
        self.root.shared.clear();
    }

    /// 当前缓存的节点数量。
    pub fn cached_nodes(&self) -> usize {
        self.root.shared.cache.len()
    }

    pub fn provider_count(&self) -> usize {
        self.root.shared.providers.len()
    }

    pub fn transliteration_enabled(&self) -> bool {
        self.root.shared.transliteration
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.root.shared.closed.store(true, Ordering::Release);
        self.root.shared.clear();
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("providers", &self.provider_count())
            .field("cached_nodes", &self.cached_nodes())
            .field("transliteration", &self.transliteration_enabled())
            .finish()
    }
}
