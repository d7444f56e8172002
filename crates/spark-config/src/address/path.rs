use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::{Element, QualifiedType, Qualifiers};

/// 有序、非空的地址段序列。
///
/// ## 契约定义（What）
/// - 以根段开头的路径为“绝对路径”；其余为相对路径，解析前必须拼接到某个绝对路径之后；
/// - `transliterated` 标记归一化流程已经处理过该路径，避免重复进入；该标记不参与相等性与哈希；
/// - 相等性逐段比较（名称 + 类型 + 标签）。
///
/// ## 实现细节（How）
/// - 段序列存放在 `Arc<[Element]>` 中，克隆只增加引用计数；拼接、截取总是产生新路径。
#[derive(Clone)]
pub struct Path {
    elements: Arc<[Element]>,
    transliterated: bool,
}

impl Path {
    /// 仅包含根段的绝对路径。
    pub fn root() -> Self {
        Self::from_vec(vec![Element::root()])
    }

    /// 单段相对路径。
    pub fn relative(element: Element) -> Self {
        Self::from_vec(vec![element])
    }

    /// 由段序列构造；空序列返回 `None`。
    pub fn from_elements<I>(elements: I) -> Option<Self>
    where
        I: IntoIterator<Item = Element>,
    {
        let elements: Vec<Element> = elements.into_iter().collect();
        (!elements.is_empty()).then(|| Self::from_vec(elements))
    }

    fn from_vec(elements: Vec<Element>) -> Self {
        Self {
            elements: elements.into(),
            transliterated: false,
        }
    }

    /// 追加一段，返回新路径（不继承 `transliterated` 标记）。
    pub fn join(&self, element: Element) -> Self {
        let mut elements = self.elements.to_vec();
        elements.push(element);
        Self::from_vec(elements)
    }

    /// 拼接另一路径；若 `other` 为绝对路径，跳过其根段。
    pub fn plus(&self, other: &Path) -> Self {
        let tail = if other.is_absolute() {
            &other.elements[1..]
        } else {
            &other.elements[..]
        };
        let mut elements = self.elements.to_vec();
        elements.extend_from_slice(tail);
        Self::from_vec(elements)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// 路径恒非空，保留该方法以满足集合类 API 约定。
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Element> {
        self.elements.get(index)
    }

    #[inline]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn last_element(&self) -> &Element {
        // 构造函数保证非空。
        &self.elements[self.elements.len() - 1]
    }

    /// 最后一段的语义类型。
    #[inline]
    pub fn qualified(&self) -> &QualifiedType {
        self.last_element().qualified()
    }

    /// 最后一段的上下文标签。
    #[inline]
    pub fn qualifiers(&self) -> &Qualifiers {
        self.last_element().qualifiers()
    }

    #[inline]
    pub fn is_absolute(&self) -> bool {
        self.elements[0].is_root()
    }

    #[inline]
    pub fn is_transliterated(&self) -> bool {
        self.transliterated
    }

    /// 返回标记为“已归一化”的副本。
    pub fn into_transliterated(mut self) -> Self {
        self.transliterated = true;
        self
    }

    /// 前 `len` 段组成的路径；`len` 为 0 或超出长度时返回 `None`。
    pub fn prefix(&self, len: usize) -> Option<Self> {
        if len == 0 || len > self.len() {
            return None;
        }
        Some(Self::from_vec(self.elements[..len].to_vec()))
    }

    /// 去掉最后一段；单段路径没有父路径。
    pub fn parent(&self) -> Option<Self> {
        self.prefix(self.len() - 1)
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.elements.starts_with(&prefix.elements)
    }

    pub fn ends_with(&self, suffix: &Path) -> bool {
        self.elements.ends_with(&suffix.elements)
    }

    /// `candidate` 能否逐段兼容地匹配 `self` 的末尾。
    ///
    /// 比较规则见 [`Element::is_compatible_with`]；`candidate` 比 `self` 长时恒为 `false`。
    pub fn ends_with_compatible(&self, candidate: &Path) -> bool {
        if candidate.len() > self.len() {
            return false;
        }
        candidate
            .elements
            .iter()
            .rev()
            .zip(self.elements.iter().rev())
            .all(|(mine, requested)| mine.is_compatible_with(requested))
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
    }
}

impl Eq for Path {}

impl Hash for Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.elements.hash(state);
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut segments = self.elements.iter();
        if self.is_absolute() {
            segments.next();
            if self.len() == 1 {
                return f.write_str("/");
            }
        }
        for (index, element) in segments.enumerate() {
            if index > 0 || self.is_absolute() {
                f.write_str("/")?;
            }
            write!(f, "{element}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({self})")
    }
}
