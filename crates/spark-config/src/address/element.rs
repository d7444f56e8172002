use std::fmt;
use std::sync::Arc;

use super::{QualifiedType, Qualifiers};

/// 地址中的一段：名称 + 语义类型 + 上下文标签。
///
/// ## 契约定义（What）
/// - 空名称是通配符，表示“当前节点，不论其名称”；
/// - 根地址段即空名称 + [`QualifiedType::any`] + 空标签；
/// - 不可变值对象，结构相等。
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Element {
    name: Arc<str>,
    qualified: QualifiedType,
    qualifiers: Qualifiers,
}

impl Element {
    /// 以 `any` 类型、空标签构造。
    pub fn new<N>(name: N) -> Self
    where
        N: Into<Arc<str>>,
    {
        Self {
            name: name.into(),
            qualified: QualifiedType::any(),
            qualifiers: Qualifiers::new(),
        }
    }

    /// 根地址段。
    pub fn root() -> Self {
        Self::new("")
    }

    pub fn of_type(mut self, qualified: QualifiedType) -> Self {
        self.qualified = qualified;
        self
    }

    /// 以 Rust 类型 `T` 作为该段的语义类型。
    pub fn typed<T: ?Sized + 'static>(self) -> Self {
        self.of_type(QualifiedType::of::<T>())
    }

    pub fn with_qualifier<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<Arc<str>>,
        V: Into<Arc<str>>,
    {
        self.qualifiers = self.qualifiers.with(key, value);
        self
    }

    pub fn with_qualifiers(mut self, qualifiers: Qualifiers) -> Self {
        self.qualifiers = qualifiers;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn qualified(&self) -> &QualifiedType {
        &self.qualified
    }

    #[inline]
    pub fn qualifiers(&self) -> &Qualifiers {
        &self.qualifiers
    }

    #[inline]
    pub fn is_wildcard(&self) -> bool {
        self.name.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.is_wildcard() && self.qualified.is_any() && self.qualifiers.is_empty()
    }

    /// 候选段 `self` 能否回答请求段 `requested`。
    ///
    /// ### 逻辑解析（How）
    /// - 名称：相等，或任一侧为通配符；
    /// - 类型：任一侧为 `any`，或候选类型是请求类型的子类型（协变）；
    /// - 标签：兼容（任一为空或存在交集）。
    pub fn is_compatible_with(&self, requested: &Element) -> bool {
        let names = self.is_wildcard() || requested.is_wildcard() || self.name == requested.name;
        let types = self.qualified.is_any()
            || requested.qualified.is_any()
            || self.qualified.is_subtype_of(&requested.qualified);
        names && types && self.qualifiers.is_compatible_with(&requested.qualifiers)
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_wildcard() {
            f.write_str("*")?;
        } else {
            f.write_str(&self.name)?;
        }
        if !self.qualifiers.is_empty() {
            write!(f, "{}", self.qualifiers)?;
        }
        if !self.qualified.is_any() {
            write!(f, ":{}", self.qualified)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Element({self})")
    }
}
