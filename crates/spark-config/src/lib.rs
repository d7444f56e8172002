//! # spark-config
//!
//! ## 定位与职责（Why）
//! - 按需解析“分层地址 + 语义类型 + 上下文标签”描述的配置值；值来自一组可插拔的 Provider，
//!   多个 Provider 同时应答时由歧义策略裁决，结果按地址缓存；
//! - 本 crate 只负责读侧解析与缓存：不解析任何文档格式，不做类型转换，也不定义配置如何修改或持久化。
//!   具体数据源见 `spark-config-sources`。
//!
//! ## 架构嵌入（Where）
//! - `address`：不可变的地址模型；
//! - `value`：延迟求值、带确定性标记的候选值；
//! - `provider`：Provider 契约与闭包适配器；
//! - `policy`：打分与平局裁决；
//! - `engine`：缓存、请求方定位、递归守卫与竞争算法；
//! - `facade`：把取值型能力契约翻译为进一步的地址解析。
//!
//! ## 使用路线图
//! 1. 实现或选用若干 [`Provider`]，通过 [`EngineBuilder`] 按优先询问顺序注册；
//! 2. 可选：注入自定义 [`AmbiguityPolicy`]，默认策略在平局时丢弃双方；
//! 3. 用 [`Engine::load`] 得到 [`Node`]，再 [`Node::get`] 求值；节点上的相对路径相对于该节点解析。
//!
//! ## 日志
//! - 所有诊断经 `tracing` 输出（目标 `spark_config::engine` / `spark_config::policy` /
//!   `spark_config::facade`）；本 crate 从不安装订阅者。

pub mod address;
pub mod engine;
pub mod error;
pub mod facade;
pub mod policy;
pub mod provider;
pub mod value;

pub use address::{Element, Path, QualifiedType, Qualifiers};
pub use engine::{Engine, EngineBuilder, EngineSettings, Node, ProviderId, Requestor};
pub use error::{BoxError, ProviderRegistrationError, ResolveError, ResolveErrorKind};
pub use facade::{
    Argument, Capability, ContractDescriptor, DispatchTable, Facade, FacadeProvider,
    MethodDescriptor, Parameter, property_name,
};
pub use policy::{
    AmbiguityPolicy, DefaultAmbiguityPolicy, Disambiguation, FirstWinsPolicy, LoggingPolicy,
    UNUSABLE, path_score, qualifiers_score,
};
pub use provider::{Provider, ProviderFn, provider_fn};
pub use value::{Payload, Supplier, Value};
