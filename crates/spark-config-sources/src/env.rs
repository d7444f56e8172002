use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use spark_config::{Element, Path, Provider, Requestor, ResolveError, Value};

use crate::coerce;
use crate::error::SourceError;

type Lookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// 环境变量 Provider。
///
/// ## 契约定义（What）
/// - 地址 `/server/port` 对应变量 `{PREFIX}_SERVER_PORT`：各段名称转大写，非字母数字字符替换为 `_`；
/// - 变量未设置或请求类型不在转换表内时拒绝回答；
/// - 值是非确定性的：每次求值都重新读取变量，读取时变量已被删除则报告暂时缺失；
/// - 变量没有上下文标签，值路径最后一段不携带标签，带标签的请求会让其得分低于带匹配标签的候选。
pub struct EnvProvider {
    prefix: String,
    lookup: Lookup,
}

impl EnvProvider {
    /// 读取进程环境变量。
    pub fn new<P>(prefix: P) -> Self
    where
        P: Into<String>,
    {
        Self::with_lookup(prefix, |key| std::env::var(key).ok())
    }

    /// 使用自定义的变量查找函数，便于嵌入或测试。
    pub fn with_lookup<P, F>(prefix: P, lookup: F) -> Self
    where
        P: Into<String>,
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            prefix: prefix.into(),
            lookup: Arc::new(lookup),
        }
    }

    /// 地址对应的变量名；含通配段的地址没有变量名。
    pub fn variable_name(&self, path: &Path) -> Option<String> {
        let mut name = normalize(&self.prefix);
        for element in path.elements().iter().filter(|element| !element.is_root()) {
            if element.is_wildcard() {
                return None;
            }
            if !name.is_empty() {
                name.push('_');
            }
            name.push_str(&normalize(element.name()));
        }
        Some(name)
    }
}

fn normalize(segment: &str) -> String {
    segment
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

impl Provider for EnvProvider {
    fn name(&self) -> Cow<'static, str> {
        Cow::Owned(format!("env:{}", self.prefix))
    }

    fn get(&self, _: &Requestor<'_>, path: &Path) -> Result<Option<Value>, ResolveError> {
        let Some(variable) = self.variable_name(path) else {
            return Ok(None);
        };
        let requested = path.qualified().clone();
        let Some(current) = (self.lookup)(&variable) else {
            return Ok(None);
        };
        if coerce::from_text(&current, &requested).is_none() {
            return Ok(None);
        }
        tracing::trace!(
            target: "spark_config_sources::env",
            variable = %variable,
            path = %path,
            "environment variable matched"
        );

        let last = Element::new(path.last_element().name()).of_type(requested.clone());
        let answer = match path.parent() {
            Some(parent) => parent.join(last),
            None => Path::relative(last),
        };
        let lookup = Arc::clone(&self.lookup);
        let provider = self.name();
        let target = path.clone();
        Ok(Some(Value::new(answer, false, move || {
            let raw = lookup(&variable).ok_or_else(|| ResolveError::unavailable(&target))?;
            match coerce::from_text(&raw, &requested) {
                Some(Ok(payload)) => Ok(payload),
                _ => Err(ResolveError::provider(
                    provider.clone(),
                    &target,
                    SourceError::Coercion {
                        key: variable.clone(),
                        raw,
                        expected: requested.to_string(),
                    },
                )),
            }
        })))
    }
}

impl fmt::Debug for EnvProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvProvider")
            .field("prefix", &self.prefix)
            .finish()
    }
}
