//! 门面合成：让调用方通过取值型能力契约而不是显式地址读取配置。
//!
//! # 设计目标概述
//! - 不做运行时代码生成：每个契约一次性构建 [`DispatchTable`]，把方法签名映射为地址段模板；
//! - “虚拟对象”就是 [`Facade`] 句柄（调度表 + 绑定地址 + 请求方节点），方法调用即查表后重新进入引擎；
//! - 需要强类型访问时，为契约写一个薄适配类型并实现 [`Capability`]，由 [`FacadeProvider::with_contract`] 登记。
//!
//! # 属性名规则
//! 见 [`property_name`]：去掉 `get` / `is` 访问前缀后首字母小写。

mod contract;
mod handle;
mod provider;

pub use contract::{
    Argument, ContractDescriptor, DefaultBody, DispatchTable, MethodDescriptor, Parameter,
    property_name,
};
pub use handle::Facade;
pub use provider::FacadeProvider;

use std::any::Any;

/// 手写门面适配类型的契约。
///
/// - `contract()` 描述方法集合，其类型必须是 `QualifiedType::of::<Self>()`；
/// - `from_facade` 把合成的句柄包装为适配类型，通常只是一个新类型构造。
pub trait Capability: Any + Send + Sync + Sized {
    fn contract() -> ContractDescriptor;

    fn from_facade(facade: Facade) -> Self;
}
