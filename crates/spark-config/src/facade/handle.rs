use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use crate::address::Path;
use crate::engine::{InFlight, Node, Requestor};
use crate::error::ResolveError;
use crate::value::Payload;

use super::{Argument, ContractDescriptor, DispatchTable};

/// 合成的“虚拟对象”：调度表 + 绑定地址 + 请求方节点。
///
/// ## 契约定义（What）
/// - 每次方法调用都重新进入引擎：`绑定地址 / 属性名[实参标签]:返回类型`；
/// - 解析得到值则返回；否则执行默认方法体；两者皆无时报告 [`ResolveError::Unsupported`];
/// - [`invoke`](Self::invoke) 从调用方开启新的调用链；Provider 在自身 `get` 中读取门面时必须改用
///   [`invoke_in`](Self::invoke_in) 系列方法，沿用请求方的调用链，使递归守卫覆盖经由门面的自我读取。
#[derive(Clone)]
pub struct Facade {
    table: Arc<DispatchTable>,
    path: Path,
    requestor: Arc<Node>,
}

impl Facade {
    pub(crate) fn new(table: Arc<DispatchTable>, path: Path, requestor: Arc<Node>) -> Self {
        Self {
            table,
            path,
            requestor,
        }
    }

    /// 门面绑定的绝对路径。
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn contract(&self) -> &ContractDescriptor {
        self.table.contract()
    }

    /// 调用契约方法。
    ///
    /// ### 执行流程（How）
    /// 1. 查调度表；未声明的方法视为不支持；
    /// 2. 无返回值的方法直接执行默认方法体；
    /// 3. 其余方法拼出地址段并通过请求方节点加载，缺失时回退到默认方法体。
    pub fn invoke(&self, method: &str, arguments: &[Argument]) -> Result<Payload, ResolveError> {
        self.invoke_within(None, method, arguments)
    }

    /// 在 `requestor` 所在的调用链中调用契约方法。
    ///
    /// 链上已在为同一地址求值的 Provider 会被跳过，与 [`Requestor::load`] 的语义一致。
    pub fn invoke_in(
        &self,
        requestor: &Requestor<'_>,
        method: &str,
        arguments: &[Argument],
    ) -> Result<Payload, ResolveError> {
        self.invoke_within(requestor.chain, method, arguments)
    }

    fn invoke_within(
        &self,
        chain: Option<&InFlight<'_>>,
        method: &str,
        arguments: &[Argument],
    ) -> Result<Payload, ResolveError> {
        let dispatch = self
            .table
            .dispatch(method)
            .ok_or_else(|| self.table.unsupported(method))?;
        let Some(element) = dispatch.element(arguments)? else {
            return self.fall_back(method, arguments);
        };

        let address = self.path.join(element);
        tracing::trace!(
            target: "spark_config::facade",
            contract = %self.contract().qualified(),
            method,
            address = %address,
            chained = chain.is_some(),
            "facade call"
        );
        match self.requestor.load_in(&address, chain)?.get_optional()? {
            Some(payload) => Ok(payload),
            None => self.fall_back(method, arguments),
        }
    }

    fn fall_back(&self, method: &str, arguments: &[Argument]) -> Result<Payload, ResolveError> {
        let body = self
            .table
            .method(method)
            .and_then(|descriptor| descriptor.default_body())
            .ok_or_else(|| self.table.unsupported(method))?;
        tracing::debug!(
            target: "spark_config::facade",
            contract = %self.contract().qualified(),
            method,
            path = %self.path,
            "no provider answered, running default body"
        );
        body(self, arguments)
    }

    /// 调用并向下转型为 `T`。
    pub fn call<T>(&self, method: &str, arguments: &[Argument]) -> Result<Arc<T>, ResolveError>
    where
        T: Any + Send + Sync,
    {
        self.downcast(self.invoke(method, arguments)?)
    }

    /// 无参取值方法的便捷入口。
    pub fn get<T>(&self, method: &str) -> Result<Arc<T>, ResolveError>
    where
        T: Any + Send + Sync,
    {
        self.call(method, &[])
    }

    /// [`invoke_in`](Self::invoke_in) 并向下转型为 `T`。
    pub fn call_in<T>(
        &self,
        requestor: &Requestor<'_>,
        method: &str,
        arguments: &[Argument],
    ) -> Result<Arc<T>, ResolveError>
    where
        T: Any + Send + Sync,
    {
        self.downcast(self.invoke_in(requestor, method, arguments)?)
    }

    pub fn get_in<T>(&self, requestor: &Requestor<'_>, method: &str) -> Result<Arc<T>, ResolveError>
    where
        T: Any + Send + Sync,
    {
        self.call_in(requestor, method, &[])
    }

    fn downcast<T>(&self, payload: Payload) -> Result<Arc<T>, ResolveError>
    where
        T: Any + Send + Sync,
    {
        payload
            .downcast::<T>()
            .map_err(|_| ResolveError::TypeMismatch {
                path: self.path.clone(),
                expected: type_name::<T>(),
            })
    }
}

impl fmt::Debug for Facade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Facade")
            .field("contract", self.contract().qualified())
            .field("path", &self.path)
            .finish()
    }
}
