use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// 地址段上的上下文标签集合，例如 `env=prod`、`region=eu`。
///
/// ### 契约说明（What）
/// - 逻辑上是无序集合；内部采用 [`BTreeMap`] 以获得稳定的遍历、哈希与显示顺序；
/// - 每个键至多对应一个值；
/// - 两个集合“兼容”当且仅当任一为空，或至少共享一个完全相等的键值对。
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Qualifiers(BTreeMap<Arc<str>, Arc<str>>);

impl Qualifiers {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加（或覆盖）一个标签，返回新集合。
    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<Arc<str>>,
        V: Into<Arc<str>>,
    {
        self.0.insert(key.into(), value.into());
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|value| value.as_ref())
    }

    /// 是否包含完全相等的键值对。
    pub fn contains(&self, key: &str, value: &str) -> bool {
        self.get(key) == Some(value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_ref(), value.as_ref()))
    }

    /// 与 `other` 共享的相等键值对数量。
    pub fn intersection_size(&self, other: &Qualifiers) -> usize {
        self.iter()
            .filter(|(key, value)| other.contains(key, value))
            .count()
    }

    /// 仅存在于一侧的键值对数量。
    pub fn symmetric_difference_size(&self, other: &Qualifiers) -> usize {
        let shared = self.intersection_size(other);
        (self.len() - shared) + (other.len() - shared)
    }

    /// `self` 的每个键值对都出现在 `other` 中。
    pub fn is_subset_of(&self, other: &Qualifiers) -> bool {
        self.intersection_size(other) == self.len()
    }

    pub fn is_compatible_with(&self, other: &Qualifiers) -> bool {
        self.is_empty() || other.is_empty() || self.intersection_size(other) > 0
    }
}

impl<K, V> FromIterator<(K, V)> for Qualifiers
where
    K: Into<Arc<str>>,
    V: Into<Arc<str>>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl fmt::Display for Qualifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (index, (key, value)) in self.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{key}={value}")?;
        }
        f.write_str("]")
    }
}

impl fmt::Debug for Qualifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Qualifiers {
        pairs.iter().copied().collect()
    }

    #[test]
    fn set_arithmetic() {
        let prod = tags(&[("env", "prod"), ("region", "eu")]);
        let mixed = tags(&[("env", "prod"), ("region", "us"), ("tier", "gold")]);
        assert_eq!(prod.intersection_size(&mixed), 1);
        assert_eq!(prod.symmetric_difference_size(&mixed), 3);
        assert!(tags(&[("env", "prod")]).is_subset_of(&prod));
        assert!(!mixed.is_subset_of(&prod));
    }

    #[test]
    fn compatibility_requires_overlap_unless_empty() {
        let prod = tags(&[("env", "prod")]);
        let test = tags(&[("env", "test")]);
        assert!(prod.is_compatible_with(&Qualifiers::new()));
        assert!(Qualifiers::new().is_compatible_with(&test));
        assert!(!prod.is_compatible_with(&test));
        assert_eq!(prod.to_string(), "[env=prod]");
    }
}
