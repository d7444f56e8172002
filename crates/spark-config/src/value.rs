//! Provider 产出的候选值。
//!
//! # 设计目标概述
//! - `Value` 绑定一个地址，延迟求值，并携带确定性标记：
//!   `true` 表示重复求值得到同一对象引用，`false` 表示每次求值都可能变化（例如环境变量）；
//! - 主求值报告“缺失”（永久或暂时）时，可选的后备生产者会被调用；
//! - 构造后不可变，由引擎立即消费。

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::address::{Path, Qualifiers};
use crate::error::ResolveError;

/// 解析结果的类型擦除载荷。
pub type Payload = Arc<dyn Any + Send + Sync>;

/// 产出载荷的闭包。
pub type Supplier = Arc<dyn Fn() -> Result<Payload, ResolveError> + Send + Sync>;

/// 绑定地址的延迟求值结果。
#[derive(Clone)]
pub struct Value {
    path: Path,
    deterministic: bool,
    supplier: Supplier,
    fallback: Option<Supplier>,
}

impl Value {
    /// 通用构造函数。
    pub fn new<F>(path: Path, deterministic: bool, supplier: F) -> Self
    where
        F: Fn() -> Result<Payload, ResolveError> + Send + Sync + 'static,
    {
        Self {
            path,
            deterministic,
            supplier: Arc::new(supplier),
            fallback: None,
        }
    }

    /// 已经存在的载荷；每次求值返回同一引用。
    pub fn shared(path: Path, payload: Payload) -> Self {
        Self::new(path, true, move || Ok(Arc::clone(&payload)))
    }

    /// 常量值；内部仅分配一次 `Arc`。
    pub fn of<T>(path: Path, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self::shared(path, Arc::new(value))
    }

    /// 确定性的延迟值：引擎最多求值一次并缓存结果。
    pub fn lazy<T, F>(path: Path, producer: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> Result<T, ResolveError> + Send + Sync + 'static,
    {
        Self::new(path, true, move || producer().map(|value| Arc::new(value) as Payload))
    }

    /// 非确定性值：每次 `get` 都会重新调用 `producer`。
    pub fn volatile<T, F>(path: Path, producer: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> Result<T, ResolveError> + Send + Sync + 'static,
    {
        Self::new(path, false, move || producer().map(|value| Arc::new(value) as Payload))
    }

    /// 附加后备生产者，主求值返回缺失错误时使用。
    pub fn with_fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn() -> Result<Payload, ResolveError> + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 值自身的上下文标签，即其路径最后一段的标签。
    #[inline]
    pub fn qualifiers(&self) -> &Qualifiers {
        self.path.qualifiers()
    }

    #[inline]
    pub fn is_deterministic(&self) -> bool {
        self.deterministic
    }

    /// 求值。
    ///
    /// ### 逻辑解析（How）
    /// - 先调用主生产者；
    /// - 若返回缺失错误且存在后备生产者，则改用后备结果；其它错误原样返回。
    pub fn evaluate(&self) -> Result<Payload, ResolveError> {
        match (self.supplier)() {
            Err(error) if error.is_absent() => match &self.fallback {
                Some(fallback) => fallback(),
                None => Err(error),
            },
            other => other,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("path", &self.path)
            .field("deterministic", &self.deterministic)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}
