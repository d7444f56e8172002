use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use spark_config::{Element, Path, Provider, Requestor, ResolveError, Value};

use crate::coerce;
use crate::error::SourceError;

/// 数组下标使用的标签键。
pub const INDEX_QUALIFIER: &str = "index";

/// 结构化文档（JSON / TOML）Provider。
///
/// ## 契约定义（What）
/// - 地址各段名称依次作为对象键下钻；段上带 `index` 标签时，先取键再按下标进入数组；
/// - 找不到节点或请求类型不在转换表内时拒绝回答；节点存在但无法转换为请求类型时报告错误；
/// - 文档在构造后不可变，产出的值都是确定性的。
///
/// ## 逻辑解析（How）
/// - TOML 文档先反序列化为 `serde_json::Value`，此后两种格式共用同一套查找与转换逻辑。
pub struct DocumentProvider {
    name: Cow<'static, str>,
    root: Arc<serde_json::Value>,
}

impl DocumentProvider {
    /// 以已解析的 JSON 值构造；根节点必须是对象。
    pub fn from_value<N>(name: N, root: serde_json::Value) -> Result<Self, SourceError>
    where
        N: Into<Cow<'static, str>>,
    {
        if !root.is_object() {
            return Err(SourceError::NotAnObject {
                found: kind_of(&root),
            });
        }
        Ok(Self {
            name: name.into(),
            root: Arc::new(root),
        })
    }

    pub fn from_json_str<N>(name: N, document: &str) -> Result<Self, SourceError>
    where
        N: Into<Cow<'static, str>>,
    {
        let root = serde_json::from_str(document)?;
        Self::from_value(name, root)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml_str<N>(name: N, document: &str) -> Result<Self, SourceError>
    where
        N: Into<Cow<'static, str>>,
    {
        let root: serde_json::Value = toml::from_str(document)?;
        Self::from_value(name, root)
    }

    fn lookup(&self, elements: &[Element]) -> Option<&serde_json::Value> {
        elements.iter().try_fold(self.root.as_ref(), |node, element| {
            let child = node.as_object()?.get(element.name())?;
            match element.qualifiers().get(INDEX_QUALIFIER) {
                Some(index) => child.as_array()?.get(index.parse::<usize>().ok()?),
                None => Some(child),
            }
        })
    }
}

fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl Provider for DocumentProvider {
    fn name(&self) -> Cow<'static, str> {
        self.name.clone()
    }

    fn get(&self, _: &Requestor<'_>, path: &Path) -> Result<Option<Value>, ResolveError> {
        let elements = &path.elements()[1..];
        if elements.iter().any(Element::is_wildcard) {
            return Ok(None);
        }
        let Some(node) = self.lookup(elements) else {
            tracing::trace!(
                target: "spark_config_sources::document",
                provider = %self.name,
                path = %path,
                "document has no such node"
            );
            return Ok(None);
        };

        let requested = path.qualified();
        let payload = match coerce::from_json(node, requested) {
            None => return Ok(None),
            Some(Ok(payload)) => payload,
            Some(Err(error)) => {
                tracing::debug!(
                    target: "spark_config_sources::document",
                    provider = %self.name,
                    path = %path,
                    error = %error,
                    "document node does not fit the requested type"
                );
                return Err(ResolveError::provider(self.name.clone(), path, error));
            }
        };

        let requested_last = path.last_element();
        let mut last = Element::new(requested_last.name()).of_type(requested.clone());
        if let Some(index) = requested_last.qualifiers().get(INDEX_QUALIFIER) {
            last = last.with_qualifier(INDEX_QUALIFIER, index);
        }
        let answer = match path.parent() {
            Some(parent) => parent.join(last),
            None => Path::relative(last),
        };
        Ok(Some(Value::shared(answer, payload)))
    }
}

impl fmt::Debug for DocumentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentProvider")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_must_be_an_object() {
        let error = DocumentProvider::from_json_str("doc", "[1, 2]").expect_err("array root");
        assert!(matches!(error, SourceError::NotAnObject { found: "array" }));
        assert!(matches!(
            DocumentProvider::from_json_str("doc", "{"),
            Err(SourceError::Json(_))
        ));
    }

    #[test]
    fn indexed_elements_step_into_arrays() {
        let provider = DocumentProvider::from_value(
            "doc",
            serde_json::json!({ "backends": [{ "host": "a" }, { "host": "b" }] }),
        )
        .expect("object root");
        let elements = [
            Element::new("backends").with_qualifier(INDEX_QUALIFIER, "1"),
            Element::new("host"),
        ];
        assert_eq!(provider.lookup(&elements), Some(&serde_json::json!("b")));

        let missing = [Element::new("backends").with_qualifier(INDEX_QUALIFIER, "7")];
        assert!(provider.lookup(&missing).is_none());
    }
}
