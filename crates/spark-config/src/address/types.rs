use std::any::{TypeId, type_name};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

/// 地址段所指向的语义类型描述符。
///
/// ## 设计目的（Why）
/// - 地址不仅按名称区分，还按“期望得到的类型”区分：同名 `port` 请求 `u16` 与请求 `String` 是两个不同地址；
/// - Provider 通过上界声明做廉价的预过滤，引擎与门面在比较候选值时需要一个协变的“子类型”关系。
///
/// ## 逻辑说明（How）
/// - `any()`：顶类型，所有类型都是它的子类型；根地址段即携带该类型；
/// - `of::<T>()`：绑定 Rust 具体类型，名称取自 [`type_name`]，额外记录 [`TypeId`]；
/// - `named(..)`：纯名义类型，供跨语言或动态场景使用；
/// - `with_supertype` 声明名义继承关系，`with_arguments` 声明泛型参数（按协变比较）。
///
/// ## 契约定义（What）
/// - 相等性按“名称 + 泛型参数 + 是否顶类型 + `TypeId`”比较，父类型声明不参与相等性；
///   因此同名的名义类型与 Rust 类型（`named("u32")` 与 `of::<u32>()`）是两个不同的类型；
/// - [`is_subtype_of`](Self::is_subtype_of) 是偏序：自反、传递，`any()` 为最大元。
#[derive(Clone)]
pub struct QualifiedType(Arc<TypeInfo>);

struct TypeInfo {
    name: Cow<'static, str>,
    top: bool,
    rust: Option<TypeId>,
    arguments: Vec<QualifiedType>,
    supertypes: Vec<QualifiedType>,
}

static ANY: OnceLock<QualifiedType> = OnceLock::new();

impl QualifiedType {
    /// 顶类型；所有请求都可以接受声明为 `any` 的 Provider。
    pub fn any() -> Self {
        ANY.get_or_init(|| {
            Self(Arc::new(TypeInfo {
                name: Cow::Borrowed("any"),
                top: true,
                rust: None,
                arguments: Vec::new(),
                supertypes: Vec::new(),
            }))
        })
        .clone()
    }

    /// 绑定 Rust 类型 `T` 的描述符。
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(Arc::new(TypeInfo {
            name: Cow::Borrowed(type_name::<T>()),
            top: false,
            rust: Some(TypeId::of::<T>()),
            arguments: Vec::new(),
            supertypes: Vec::new(),
        }))
    }

    /// 纯名义类型。
    pub fn named<N>(name: N) -> Self
    where
        N: Into<Cow<'static, str>>,
    {
        Self(Arc::new(TypeInfo {
            name: name.into(),
            top: false,
            rust: None,
            arguments: Vec::new(),
            supertypes: Vec::new(),
        }))
    }

    /// 追加一个直接父类型，返回新的描述符。
    pub fn with_supertype(self, supertype: QualifiedType) -> Self {
        let mut info = self.rebuild();
        info.supertypes.push(supertype);
        Self(Arc::new(info))
    }

    /// 设置泛型参数，返回新的描述符。
    pub fn with_arguments<I>(self, arguments: I) -> Self
    where
        I: IntoIterator<Item = QualifiedType>,
    {
        let mut info = self.rebuild();
        info.arguments = arguments.into_iter().collect();
        Self(Arc::new(info))
    }

    fn rebuild(&self) -> TypeInfo {
        TypeInfo {
            name: self.0.name.clone(),
            top: self.0.top,
            rust: self.0.rust,
            arguments: self.0.arguments.clone(),
            supertypes: self.0.supertypes.clone(),
        }
    }

    /// 类型名称。
    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// 泛型参数。
    #[inline]
    pub fn arguments(&self) -> &[QualifiedType] {
        &self.0.arguments
    }

    /// 若由 [`of`](Self::of) 构造，返回对应的 [`TypeId`]。
    #[inline]
    pub fn type_id(&self) -> Option<TypeId> {
        self.0.rust
    }

    #[inline]
    pub fn is_any(&self) -> bool {
        self.0.top
    }

    /// 协变子类型关系：`self ⊑ other`。
    ///
    /// ### 逻辑解析（How）
    /// 1. `other` 为顶类型，或两者相等，直接成立；
    /// 2. 任一声明的父类型是 `other` 的子类型，则成立；
    /// 3. 同名、同一 `TypeId`（或都没有）且泛型参数个数一致时，逐个参数按协变规则比较。
    pub fn is_subtype_of(&self, other: &QualifiedType) -> bool {
        if other.is_any() || self == other {
            return true;
        }
        if self.is_any() {
            return false;
        }
        if self
            .0
            .supertypes
            .iter()
            .any(|supertype| supertype.is_subtype_of(other))
        {
            return true;
        }
        self.name() == other.name()
            && self.0.rust == other.0.rust
            && !self.arguments().is_empty()
            && self.arguments().len() == other.arguments().len()
            && self
                .arguments()
                .iter()
                .zip(other.arguments())
                .all(|(mine, theirs)| mine.is_subtype_of(theirs))
    }

    /// `other ⊑ self`：请求 `self` 时能否接受 `other` 类型的答案。
    #[inline]
    pub fn is_assignable_from(&self, other: &QualifiedType) -> bool {
        other.is_subtype_of(self)
    }

    /// 是否为“索引型”类型（整数或文本），门面的单参数取值方法只接受此类参数。
    pub fn is_index_like(&self) -> bool {
        let Some(id) = self.0.rust else {
            return false;
        };
        [
            TypeId::of::<i8>(),
            TypeId::of::<i16>(),
            TypeId::of::<i32>(),
            TypeId::of::<i64>(),
            TypeId::of::<i128>(),
            TypeId::of::<isize>(),
            TypeId::of::<u8>(),
            TypeId::of::<u16>(),
            TypeId::of::<u32>(),
            TypeId::of::<u64>(),
            TypeId::of::<u128>(),
            TypeId::of::<usize>(),
            TypeId::of::<String>(),
            TypeId::of::<str>(),
            TypeId::of::<Arc<str>>(),
            TypeId::of::<char>(),
        ]
        .contains(&id)
    }

    /// 是否为布尔类型。
    #[inline]
    pub fn is_boolean(&self) -> bool {
        self.0.rust == Some(TypeId::of::<bool>())
    }
}

impl PartialEq for QualifiedType {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        self.0.top == other.0.top
            && self.0.rust == other.0.rust
            && self.0.name == other.0.name
            && self.0.arguments == other.0.arguments
    }
}

impl Eq for QualifiedType {}

impl Hash for QualifiedType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.top.hash(state);
        self.0.rust.hash(state);
        self.0.name.hash(state);
        self.0.arguments.hash(state);
    }
}

impl fmt::Display for QualifiedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        if let Some((first, rest)) = self.arguments().split_first() {
            write!(f, "<{first}")?;
            for argument in rest {
                write!(f, ", {argument}")?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

impl fmt::Debug for QualifiedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QualifiedType({self})")
    }
}
