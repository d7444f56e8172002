use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::address::{Path, QualifiedType};
use crate::engine::Requestor;
use crate::error::ResolveError;
use crate::provider::Provider;
use crate::value::{Payload, Value};

use super::{Capability, ContractDescriptor, DispatchTable, Facade};

type Build = Arc<dyn Fn(Facade) -> Payload + Send + Sync>;

struct Registration {
    table: Arc<DispatchTable>,
    build: Build,
}

/// 为已登记的能力契约合成门面的 Provider。
///
/// ## 契约定义（What）
/// - 仅回答最后一段类型恰为某个已登记契约类型的地址，其余地址一律拒绝；
/// - 同一绝对地址只合成一次，之后返回同一对象引用，直到 [`Provider::clear`]；
/// - 门面持有请求方节点，节点又间接持有本 Provider；引擎清空缓存或析构时会调用 `clear` 断开该引用环。
#[derive(Default)]
pub struct FacadeProvider {
    contracts: HashMap<QualifiedType, Registration>,
    facades: DashMap<Path, Payload>,
}

impl FacadeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记手写适配类型 `C`；请求 `QualifiedType::of::<C>()` 时产出 `C` 实例。
    pub fn with_contract<C>(self) -> Result<Self, ResolveError>
    where
        C: Capability,
    {
        let contract = C::contract();
        let expected = QualifiedType::of::<C>();
        if contract.qualified() != &expected {
            return Err(ResolveError::IneligibleContract {
                contract: contract.qualified().to_string(),
                reason: Cow::Owned(format!("descriptor type does not match adapter `{expected}`")),
            });
        }
        let build: Build = Arc::new(|facade: Facade| Arc::new(C::from_facade(facade)) as Payload);
        self.register(contract, build)
    }

    /// 登记仅有描述符的契约；产出的载荷就是 [`Facade`] 本身。
    pub fn with_descriptor(self, contract: ContractDescriptor) -> Result<Self, ResolveError> {
        let build: Build = Arc::new(|facade: Facade| Arc::new(facade) as Payload);
        self.register(contract, build)
    }

    fn register(mut self, contract: ContractDescriptor, build: Build) -> Result<Self, ResolveError> {
        let qualified = contract.qualified().clone();
        if self.contracts.contains_key(&qualified) {
            return Err(ResolveError::IneligibleContract {
                contract: qualified.to_string(),
                reason: Cow::Borrowed("contract is already registered"),
            });
        }
        let table = DispatchTable::build(contract)?;
        self.contracts.insert(qualified, Registration { table, build });
        Ok(self)
    }

    /// 已登记契约的数量。
    pub fn contract_count(&self) -> usize {
        self.contracts.len()
    }

    /// 当前缓存的门面数量。
    pub fn cached_facades(&self) -> usize {
        self.facades.len()
    }

    /// 为 `path` 合成（或取回已缓存的）`contract` 门面；未登记的契约返回 `None`。
    pub fn new_facade(
        &self,
        requestor: &Requestor<'_>,
        path: &Path,
        contract: &QualifiedType,
    ) -> Option<Payload> {
        let registration = self.contracts.get(contract)?;
        if let Some(hit) = self.facades.get(path) {
            return Some(Arc::clone(hit.value()));
        }

        tracing::debug!(
            target: "spark_config::facade",
            contract = %contract,
            path = %path,
            "facade synthesized"
        );
        let facade = Facade::new(
            Arc::clone(&registration.table),
            path.clone(),
            Arc::clone(requestor.node()),
        );
        let payload = (registration.build)(facade);
        Some(Arc::clone(
            self.facades.entry(path.clone()).or_insert(payload).value(),
        ))
    }
}

impl Provider for FacadeProvider {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("facade")
    }

    fn get(&self, requestor: &Requestor<'_>, path: &Path) -> Result<Option<Value>, ResolveError> {
        Ok(self
            .new_facade(requestor, path, path.qualified())
            .map(|payload| Value::shared(path.clone(), payload)))
    }

    fn clear(&self) {
        self.facades.clear();
    }
}

impl fmt::Debug for FacadeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FacadeProvider")
            .field("contracts", &self.contracts.len())
            .field("cached_facades", &self.facades.len())
            .finish()
    }
}
