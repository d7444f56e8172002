use std::sync::Arc;

use crate::address::Path;
use crate::error::ResolveError;
use crate::value::Payload;

use super::{Node, ProviderId};

/// 当前调用链上“正在为某地址求值”的 Provider 帧。
///
/// ### 设计目的（Why）
/// - 递归守卫不依赖线程局部状态：每次调用 Provider 前在栈上压入一帧，帧随调用返回（包括错误返回）自动弹出；
/// - 帧通过借用串成链表，嵌套 `load` 沿链查找即可判断“同一 Provider 是否已在为同一地址求值”。
#[derive(Clone, Copy)]
pub(crate) struct InFlight<'a> {
    pub(crate) path: &'a Path,
    pub(crate) provider: ProviderId,
    pub(crate) parent: Option<&'a InFlight<'a>>,
}

impl InFlight<'_> {
    /// 链上是否存在 `(path, provider)` 帧。
    pub(crate) fn contains(&self, path: &Path, provider: ProviderId) -> bool {
        let mut frame = Some(self);
        while let Some(current) = frame {
            if current.provider == provider && current.path == path {
                return true;
            }
            frame = current.parent;
        }
        false
    }

    pub(crate) fn depth(&self) -> usize {
        let mut depth = 0;
        let mut frame = Some(self);
        while let Some(current) = frame {
            depth += 1;
            frame = current.parent;
        }
        depth
    }
}

/// 发起请求的节点，连同其所在的调用链。
///
/// Provider 在 `get` 中通过它回调引擎；回调沿用同一调用链，使递归守卫生效。
pub struct Requestor<'a> {
    pub(crate) node: &'a Arc<Node>,
    pub(crate) chain: Option<&'a InFlight<'a>>,
}

impl<'a> Requestor<'a> {
    /// 请求方节点。
    #[inline]
    pub fn node(&self) -> &'a Arc<Node> {
        self.node
    }

    /// 请求方节点的绝对路径。
    #[inline]
    pub fn path(&self) -> &'a Path {
        self.node.path()
    }

    /// 在当前调用链中加载地址（相对路径相对于请求方节点）。
    pub fn load(&self, path: &Path) -> Result<Arc<Node>, ResolveError> {
        self.node.load_in(path, self.chain)
    }

    /// 加载并立即求值。
    pub fn get(&self, path: &Path) -> Result<Payload, ResolveError> {
        self.load(path)?.get()
    }

    /// 当前调用链的深度，供诊断使用。
    pub fn depth(&self) -> usize {
        self.chain.map_or(0, |frame| frame.depth())
    }
}
