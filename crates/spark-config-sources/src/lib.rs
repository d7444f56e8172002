//! # spark-config-sources
//!
//! ## 设计目标（Why）
//! - 为 `spark-config` 解析引擎提供开箱可用的数据来源，业务只需按优先顺序注册即可组合；
//! - 三类来源覆盖常见部署形态：代码内默认值、环境变量覆盖、随包分发的配置文档。
//!
//! ## 组成
//! - [`MapProvider`]：内存映射，键为点分名称，可为同一键登记多组上下文标签；
//! - [`EnvProvider`]：环境变量，按前缀与地址拼出变量名，每次求值都重新读取；
//! - [`DocumentProvider`]：JSON 文档，启用 `toml` 特性（默认开启）后亦可读取 TOML。
//!
//! ## 错误
//! - 构造阶段的错误以 [`SourceError`] 返回；解析阶段的错误包装为
//!   [`ResolveError::provider`](spark_config::ResolveError::provider)，并保留 [`SourceError`] 或
//!   `serde_json::Error` 作为根因。

mod coerce;
pub mod document;
pub mod env;
pub mod error;
pub mod memory;

pub use document::{DocumentProvider, INDEX_QUALIFIER};
pub use env::EnvProvider;
pub use error::SourceError;
pub use memory::MapProvider;
