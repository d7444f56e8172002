//! 地址模型：`QualifiedType` / `Qualifiers` / `Element` / `Path`。
//!
//! 地址是分层的、带类型与上下文标签的不可变键，无其它模块依赖。

mod element;
mod path;
mod qualifiers;
mod types;

pub use element::Element;
pub use path::Path;
pub use qualifiers::Qualifiers;
pub use types::QualifiedType;
