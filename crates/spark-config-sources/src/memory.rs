use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use spark_config::{
    Element, Path, Payload, Provider, QualifiedType, Qualifiers, Requestor, ResolveError, Value,
    qualifiers_score,
};

use crate::error::SourceError;

struct Entry {
    qualifiers: Qualifiers,
    qualified: QualifiedType,
    payload: Payload,
}

/// 内存中的配置映射，键为点分名称（如 `server.port`）。
///
/// ## 契约定义（What）
/// - 同一键可登记多条带不同标签的条目，解析时取与请求标签得分最高者，得分相同取先登记者；
/// - 条目类型必须是请求类型的子类型，否则不参与竞争；
/// - 产出的值是确定性的，值路径的最后一段携带条目自身的类型与标签，交给引擎继续打分。
pub struct MapProvider {
    name: Cow<'static, str>,
    entries: HashMap<Vec<Arc<str>>, Vec<Entry>>,
}

impl MapProvider {
    pub fn new<N>(name: N) -> Self
    where
        N: Into<Cow<'static, str>>,
    {
        Self {
            name: name.into(),
            entries: HashMap::new(),
        }
    }

    /// 登记无标签条目。
    pub fn insert<T>(&mut self, key: &str, value: T) -> Result<&mut Self, SourceError>
    where
        T: Any + Send + Sync,
    {
        self.insert_qualified(key, Qualifiers::new(), value)
    }

    /// 登记带标签条目。
    pub fn insert_qualified<T>(
        &mut self,
        key: &str,
        qualifiers: Qualifiers,
        value: T,
    ) -> Result<&mut Self, SourceError>
    where
        T: Any + Send + Sync,
    {
        let segments = split_key(key)?;
        self.entries.entry(segments).or_default().push(Entry {
            qualifiers,
            qualified: QualifiedType::of::<T>(),
            payload: Arc::new(value),
        });
        Ok(self)
    }

    /// 已登记的条目总数。
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn split_key(key: &str) -> Result<Vec<Arc<str>>, SourceError> {
    let invalid = |reason| SourceError::InvalidKey {
        key: key.to_owned(),
        reason,
    };
    if key.is_empty() {
        return Err(invalid("key is empty"));
    }
    key.split('.')
        .map(|segment| {
            if segment.is_empty() {
                Err(invalid("key contains an empty segment"))
            } else {
                Ok(Arc::from(segment))
            }
        })
        .collect()
}

impl Provider for MapProvider {
    fn name(&self) -> Cow<'static, str> {
        self.name.clone()
    }

    fn get(&self, _: &Requestor<'_>, path: &Path) -> Result<Option<Value>, ResolveError> {
        let elements = &path.elements()[1..];
        if elements.iter().any(Element::is_wildcard) {
            return Ok(None);
        }
        let key: Vec<Arc<str>> = elements
            .iter()
            .map(|element| Arc::from(element.name()))
            .collect();
        let Some(candidates) = self.entries.get(&key) else {
            return Ok(None);
        };

        let requested = path.qualified();
        let reference = path.qualifiers();
        let best = candidates
            .iter()
            .filter(|entry| entry.qualified.is_subtype_of(requested))
            .filter(|entry| entry.qualifiers.is_compatible_with(reference))
            .fold(None::<(&Entry, i64)>, |best, entry| {
                let score = qualifiers_score(reference, &entry.qualifiers);
                match best {
                    Some((_, top)) if top >= score => best,
                    _ => Some((entry, score)),
                }
            });
        let Some((entry, _)) = best else {
            tracing::trace!(
                target: "spark_config_sources::memory",
                provider = %self.name,
                path = %path,
                "no entry matches the requested type and qualifiers"
            );
            return Ok(None);
        };

        let last = Element::new(path.last_element().name())
            .of_type(entry.qualified.clone())
            .with_qualifiers(entry.qualifiers.clone());
        let answer = match path.parent() {
            Some(parent) => parent.join(last),
            None => Path::relative(last),
        };
        Ok(Some(Value::shared(answer, Arc::clone(&entry.payload))))
    }
}

impl fmt::Debug for MapProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapProvider")
            .field("name", &self.name)
            .field("entries", &self.len())
            .finish()
    }
}
