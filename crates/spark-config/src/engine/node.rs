use std::any::{Any, type_name};
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::address::Path;
use crate::error::ResolveError;
use crate::value::{Payload, Value};

use super::Shared;

/// 引擎按地址缓存的解析结果，同时也是地址树上的节点。
///
/// ## 契约定义（What）
/// - 每个不同的绝对路径在一个引擎实例的生命周期内只创建一次节点，被所有调用方共享，
///   仅在整体清空缓存时移除；
/// - 根节点的父节点是其自身；其余节点的父节点是创建它时的请求方节点；
/// - 胜出值是确定性的：首次 `get` 求值并记住结果，之后返回同一引用；
///   否则每次 `get` 都重新调用 Provider 提供的生产者，本层不加锁；
/// - 没有胜出值的节点确定性地报告 [`ResolveError::NoSuchElement`]。
pub struct Node {
    pub(crate) shared: Arc<Shared>,
    parent: Option<Arc<Node>>,
    path: Path,
    content: Content,
}

enum Content {
    Root,
    Resolved {
        value: Value,
        memo: OnceLock<Payload>,
    },
    Absent,
}

impl Node {
    pub(crate) fn root(shared: Arc<Shared>) -> Arc<Self> {
        Arc::new(Self {
            shared,
            parent: None,
            path: Path::root().into_transliterated(),
            content: Content::Root,
        })
    }

    pub(crate) fn resolved(parent: &Arc<Node>, path: Path, value: Value) -> Arc<Self> {
        Arc::new(Self {
            shared: Arc::clone(&parent.shared),
            parent: Some(Arc::clone(parent)),
            path,
            content: Content::Resolved {
                value,
                memo: OnceLock::new(),
            },
        })
    }

    pub(crate) fn absent(parent: &Arc<Node>, path: Path) -> Arc<Self> {
        Arc::new(Self {
            shared: Arc::clone(&parent.shared),
            parent: Some(Arc::clone(parent)),
            path,
            content: Content::Absent,
        })
    }

    /// 节点的绝对路径。
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 父节点；根节点返回自身。
    pub fn parent(self: &Arc<Self>) -> Arc<Node> {
        match &self.parent {
            Some(parent) => Arc::clone(parent),
            None => Arc::clone(self),
        }
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        matches!(self.content, Content::Root)
    }

    /// 节点值是否确定；缺失与根节点恒为确定。
    pub fn is_deterministic(&self) -> bool {
        match &self.content {
            Content::Resolved { value, .. } => value.is_deterministic(),
            Content::Root | Content::Absent => true,
        }
    }

    /// 节点是否有胜出值（不代表求值一定成功）。
    pub fn is_resolved(&self) -> bool {
        matches!(self.content, Content::Resolved { .. })
    }

    /// 对节点求值。
    ///
    /// ### 逻辑解析（How）
    /// - 确定性值：命中记忆直接返回；否则求值并通过 `OnceLock` 发布，竞争线程都返回最终发布的那份载荷；
    /// - 非确定性值：每次重新求值；
    /// - 根节点与缺失节点：返回永久缺失错误。
    pub fn get(&self) -> Result<Payload, ResolveError> {
        match &self.content {
            Content::Resolved { value, memo } => {
                if !value.is_deterministic() {
                    return value.evaluate();
                }
                if let Some(payload) = memo.get() {
                    return Ok(Arc::clone(payload));
                }
                let payload = value.evaluate()?;
                let _ = memo.set(Arc::clone(&payload));
                Ok(memo.get().map_or(payload, |stored| Arc::clone(stored)))
            }
            Content::Root | Content::Absent => Err(ResolveError::not_found(&self.path)),
        }
    }

    /// 求值并向下转型为 `T`。
    pub fn get_as<T>(&self) -> Result<Arc<T>, ResolveError>
    where
        T: Any + Send + Sync,
    {
        self.get()?
            .downcast::<T>()
            .map_err(|_| ResolveError::TypeMismatch {
                path: self.path.clone(),
                expected: type_name::<T>(),
            })
    }

    /// 求值，并把“缺失”折叠为 `None`。
    pub fn get_optional(&self) -> Result<Option<Payload>, ResolveError> {
        match self.get() {
            Ok(payload) => Ok(Some(payload)),
            Err(error) if error.is_absent() => Ok(None),
            Err(error) => Err(error),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.content {
            Content::Root => "root",
            Content::Resolved { .. } => "resolved",
            Content::Absent => "absent",
        };
        f.debug_struct("Node")
            .field("path", &self.path)
            .field("state", &state)
            .field("deterministic", &self.is_deterministic())
            .finish()
    }
}
