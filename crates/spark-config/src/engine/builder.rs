use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use dashmap::DashMap;
use serde::Deserialize;

use crate::error::ProviderRegistrationError;
use crate::policy::{AmbiguityPolicy, DefaultAmbiguityPolicy};
use crate::provider::{BorrowedProvider, Provider};

use super::{Engine, ProviderId, Registered, Shared};

/// 引擎的可序列化设置，通常嵌在宿主应用自己的配置文件中。
///
/// ### 契约说明（What）
/// - `capacity`：可注册 Provider 数量上限，缺省不限制；
/// - `transliteration`：是否启用地址转写钩子，缺省启用；
/// - 未知字段直接拒绝，避免拼写错误被静默忽略。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    pub capacity: Option<usize>,
    pub transliteration: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            capacity: None,
            transliteration: true,
        }
    }
}

/// 组织 Provider、歧义策略与设置，生成 [`Engine`]。
///
/// ### 设计意图（Why）
/// - Provider 列表在构建后冻结，解析期间只读，避免在热路径上加锁；
/// - 注册顺序即询问顺序，也决定 [`ProviderId`]，平局策略可据此实现“先注册者优先”。
pub struct EngineBuilder {
    providers: Vec<Registration>,
    policy: Box<dyn AmbiguityPolicy>,
    capacity: Option<usize>,
    transliteration: bool,
}

struct Registration {
    provider: Arc<dyn Provider>,
    identity: usize,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            policy: Box::new(DefaultAmbiguityPolicy),
            capacity: None,
            transliteration: true,
        }
    }
}

impl EngineBuilder {
    /// 空 Builder：默认策略、不限容量、启用转写。
    pub fn new() -> Self {
        Self::default()
    }

    /// 限制最多可注册的 Provider 数量。
    ///
    /// - **后置条件**：超出上限的注册返回 [`ProviderRegistrationError::Capacity`]。
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// 替换歧义策略。
    pub fn with_policy<P>(mut self, policy: P) -> Self
    where
        P: AmbiguityPolicy + 'static,
    {
        self.policy = Box::new(policy);
        self
    }

    /// 启用或关闭地址转写。
    pub fn with_transliteration(mut self, enabled: bool) -> Self {
        self.transliteration = enabled;
        self
    }

    /// 批量应用反序列化得到的设置。
    pub fn with_settings(mut self, settings: &EngineSettings) -> Self {
        self.capacity = settings.capacity;
        self.transliteration = settings.transliteration;
        self
    }

    /// 注册拥有型 Provider。
    ///
    /// ### 契约说明（What）
    /// - 容量检查先于去重检查；
    /// - 去重按实例地址判断：同一对象注册两次返回 [`ProviderRegistrationError::Duplicate`]。
    pub fn register_provider(
        &mut self,
        provider: Box<dyn Provider>,
    ) -> Result<ProviderId, ProviderRegistrationError> {
        self.register_shared(Arc::from(provider))
    }

    /// 注册共享 Provider；调用方可保留 `Arc` 以便在引擎外观察其状态。
    pub fn register_shared(
        &mut self,
        provider: Arc<dyn Provider>,
    ) -> Result<ProviderId, ProviderRegistrationError> {
        let identity = Arc::as_ptr(&provider) as *const () as usize;
        self.push(provider, identity)
    }

    /// 注册 `'static` 单例 Provider，内部以借用包装复用容量与去重检查。
    pub fn register_static(
        &mut self,
        provider: &'static dyn Provider,
    ) -> Result<ProviderId, ProviderRegistrationError> {
        let identity = provider as *const dyn Provider as *const () as usize;
        self.push(Arc::new(BorrowedProvider { inner: provider }), identity)
    }

    fn push(
        &mut self,
        provider: Arc<dyn Provider>,
        identity: usize,
    ) -> Result<ProviderId, ProviderRegistrationError> {
        if self
            .capacity
            .is_some_and(|limit| self.providers.len() >= limit)
        {
            return Err(ProviderRegistrationError::Capacity);
        }
        if self
            .providers
            .iter()
            .any(|existing| existing.identity == identity)
        {
            return Err(ProviderRegistrationError::Duplicate);
        }

        let id = ProviderId(self.providers.len());
        tracing::debug!(
            target: "spark_config::engine",
            provider = %provider.name(),
            index = id.index(),
            "provider registered"
        );
        self.providers.push(Registration { provider, identity });
        Ok(id)
    }

    /// 冻结注册表并构建引擎。没有 Provider 的引擎是合法的，所有地址都解析为缺失。
    pub fn build(self) -> Engine {
        let providers = self
            .providers
            .into_iter()
            .enumerate()
            .map(|(index, registration)| Registered {
                id: ProviderId(index),
                provider: registration.provider,
            })
            .collect();
        Engine::from_shared(Shared {
            providers,
            policy: self.policy,
            cache: DashMap::new(),
            transliteration: self.transliteration,
            closed: AtomicBool::new(false),
        })
    }
}

impl fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("providers", &self.providers.len())
            .field("capacity", &self.capacity)
            .field("transliteration", &self.transliteration)
            .finish()
    }
}
