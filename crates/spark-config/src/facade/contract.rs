use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::address::{Element, QualifiedType, Qualifiers};
use crate::error::ResolveError;
use crate::value::Payload;

use super::Facade;

/// 默认方法体：无 Provider 应答时执行，可通过 `facade` 读取同一契约的其它属性。
pub type DefaultBody =
    Arc<dyn Fn(&Facade, &[Argument]) -> Result<Payload, ResolveError> + Send + Sync>;

/// 门面方法的调用实参；只允许索引型取值（整数或文本）。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Argument {
    Index(i64),
    Text(Arc<str>),
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<i64> for Argument {
    fn from(value: i64) -> Self {
        Self::Index(value)
    }
}

impl From<i32> for Argument {
    fn from(value: i32) -> Self {
        Self::Index(i64::from(value))
    }
}

impl From<u32> for Argument {
    fn from(value: u32) -> Self {
        Self::Index(i64::from(value))
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Self::Text(Arc::from(value))
    }
}

impl From<String> for Argument {
    fn from(value: String) -> Self {
        Self::Text(Arc::from(value))
    }
}

/// 方法形参：名称会成为地址段上的标签键。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameter {
    name: Arc<str>,
    qualified: QualifiedType,
}

impl Parameter {
    pub fn new<N>(name: N, qualified: QualifiedType) -> Self
    where
        N: Into<Arc<str>>,
    {
        Self {
            name: name.into(),
            qualified,
        }
    }

    /// 以 Rust 类型 `T` 声明形参类型。
    pub fn of<T: ?Sized + 'static>(name: &str) -> Self {
        Self::new(name, QualifiedType::of::<T>())
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn qualified(&self) -> &QualifiedType {
        &self.qualified
    }
}

/// 契约中的单个方法签名。
#[derive(Clone)]
pub struct MethodDescriptor {
    name: Arc<str>,
    returns: Option<QualifiedType>,
    parameters: Vec<Parameter>,
    default: Option<DefaultBody>,
}

impl MethodDescriptor {
    /// 无参取值方法。
    pub fn getter<N>(name: N, returns: QualifiedType) -> Self
    where
        N: Into<Arc<str>>,
    {
        Self {
            name: name.into(),
            returns: Some(returns),
            parameters: Vec::new(),
            default: None,
        }
    }

    /// 返回 Rust 类型 `T` 的无参取值方法。
    pub fn getter_of<T: ?Sized + 'static>(name: &str) -> Self {
        Self::getter(name, QualifiedType::of::<T>())
    }

    /// 单参数的索引型取值方法。
    pub fn indexed<N>(name: N, returns: QualifiedType, parameter: Parameter) -> Self
    where
        N: Into<Arc<str>>,
    {
        Self::getter(name, returns).with_parameter(parameter)
    }

    /// 无返回值的方法；只有附带默认方法体时契约才仍然合格。
    pub fn action<N>(name: N) -> Self
    where
        N: Into<Arc<str>>,
    {
        Self {
            name: name.into(),
            returns: None,
            parameters: Vec::new(),
            default: None,
        }
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// 附加默认方法体。
    pub fn with_default<F>(mut self, body: F) -> Self
    where
        F: Fn(&Facade, &[Argument]) -> Result<Payload, ResolveError> + Send + Sync + 'static,
    {
        self.default = Some(Arc::new(body));
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn returns(&self) -> Option<&QualifiedType> {
        self.returns.as_ref()
    }

    #[inline]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    #[inline]
    pub fn default_body(&self) -> Option<&DefaultBody> {
        self.default.as_ref()
    }

    /// 没有默认方法体的方法视为抽象方法，必须满足取值方法的形状约束。
    #[inline]
    pub fn is_abstract(&self) -> bool {
        self.default.is_none()
    }

    /// 方法对应的属性名，见 [`property_name`]。
    pub fn property_name(&self) -> String {
        property_name(&self.name, self.returns.as_ref())
    }

    fn shape_violation(&self) -> Option<String> {
        if self.returns.is_none() {
            return Some(format!("method `{}` returns nothing", self.name));
        }
        match self.parameters.as_slice() {
            [] => None,
            [parameter] if parameter.qualified.is_index_like() => None,
            [parameter] => Some(format!(
                "argument `{}` of method `{}` is not index-like",
                parameter.name, self.name
            )),
            _ => Some(format!(
                "method `{}` takes more than one argument",
                self.name
            )),
        }
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("returns", &self.returns)
            .field("parameters", &self.parameters)
            .field("default", &self.default.is_some())
            .finish()
    }
}

/// 能力契约：一组取值方法及其类型，门面合成的输入。
///
/// ## 契约定义（What）
/// - `qualified`：契约自身的类型，请求该类型的地址会由门面 Provider 应答；
/// - `hidden` / `sealed`：不可合成的契约标记；
/// - `methods`：声明顺序即调度表顺序，方法名不可重复。
#[derive(Clone, Debug)]
pub struct ContractDescriptor {
    qualified: QualifiedType,
    hidden: bool,
    sealed: bool,
    methods: Vec<MethodDescriptor>,
}

impl ContractDescriptor {
    pub fn new(qualified: QualifiedType) -> Self {
        Self {
            qualified,
            hidden: false,
            sealed: false,
            methods: Vec::new(),
        }
    }

    /// 以 Rust 类型 `T` 作为契约类型。
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(QualifiedType::of::<T>())
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn sealed(mut self) -> Self {
        self.sealed = true;
        self
    }

    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    #[inline]
    pub fn qualified(&self) -> &QualifiedType {
        &self.qualified
    }

    #[inline]
    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    /// 合格性检查。
    ///
    /// ### 契约说明（What）
    /// - 契约必须既非隐藏也非密封，且至少声明一个方法；
    /// - 每个抽象方法必须有返回值，且为无参或单个索引型参数；
    /// - 带默认方法体的方法不受形状约束。
    pub fn check_eligible(&self) -> Result<(), ResolveError> {
        let reject = |reason: String| ResolveError::IneligibleContract {
            contract: self.qualified.to_string(),
            reason: reason.into(),
        };
        if self.hidden {
            return Err(reject("contract is hidden".to_owned()));
        }
        if self.sealed {
            return Err(reject("contract is sealed".to_owned()));
        }
        if self.methods.is_empty() {
            return Err(reject("contract declares no methods".to_owned()));
        }
        for method in self.methods.iter().filter(|method| method.is_abstract()) {
            if let Some(reason) = method.shape_violation() {
                return Err(reject(reason));
            }
        }
        Ok(())
    }

    pub fn is_eligible(&self) -> bool {
        self.check_eligible().is_ok()
    }
}

/// 由方法签名推导属性名。
///
/// ### 逻辑解析（How）
/// 1. `get` 前缀后紧跟大写字母时去掉前缀；`is` 前缀仅在返回布尔值时去掉；
/// 2. 余下部分首字母小写，除非第二个字母也是大写（如 `URL` 保持不变）。
pub fn property_name(method: &str, returns: Option<&QualifiedType>) -> String {
    let boolean = returns.is_some_and(QualifiedType::is_boolean);
    let stripped = strip_accessor(method, "get").or_else(|| {
        if boolean {
            strip_accessor(method, "is")
        } else {
            None
        }
    });
    decapitalize(stripped.unwrap_or(method))
}

fn strip_accessor<'a>(method: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = method.strip_prefix(prefix)?;
    rest.chars()
        .next()
        .is_some_and(char::is_uppercase)
        .then_some(rest)
}

fn decapitalize(name: &str) -> String {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    if chars.next().is_some_and(char::is_uppercase) && first.is_uppercase() {
        return name.to_owned();
    }
    first.to_lowercase().chain(name[first.len_utf8()..].chars()).collect()
}

/// 按契约一次性构建的调度表：方法名 → 地址段模板。
///
/// ### 设计目的（Why）
/// - 门面方法调用不做运行时代码生成，而是查表得到“属性名 + 返回类型”模板，
///   再把实参填为标签，拼接到门面自身路径之后交给引擎解析。
pub struct DispatchTable {
    contract: ContractDescriptor,
    entries: HashMap<Arc<str>, Dispatch>,
}

pub(crate) struct Dispatch {
    pub(crate) method: MethodDescriptor,
    template: Option<Element>,
}

impl DispatchTable {
    /// 校验合格性并构建调度表；方法名重复视为不合格。
    pub fn build(contract: ContractDescriptor) -> Result<Arc<Self>, ResolveError> {
        contract.check_eligible()?;
        let mut entries = HashMap::with_capacity(contract.methods.len());
        for method in &contract.methods {
            let template = method
                .returns
                .as_ref()
                .map(|returns| Element::new(method.property_name()).of_type(returns.clone()));
            let dispatch = Dispatch {
                method: method.clone(),
                template,
            };
            if entries.insert(Arc::clone(&method.name), dispatch).is_some() {
                return Err(ResolveError::IneligibleContract {
                    contract: contract.qualified.to_string(),
                    reason: format!("method `{}` is declared twice", method.name).into(),
                });
            }
        }
        Ok(Arc::new(Self { contract, entries }))
    }

    #[inline]
    pub fn contract(&self) -> &ContractDescriptor {
        &self.contract
    }

    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.entries.get(name).map(|dispatch| &dispatch.method)
    }

    pub(crate) fn dispatch(&self, name: &str) -> Option<&Dispatch> {
        self.entries.get(name)
    }

    /// 方法调用对应的相对地址段；无返回值的方法没有地址。
    ///
    /// - 未声明的方法返回 [`ResolveError::Unsupported`]；
    /// - 实参个数与形参不符返回 [`ResolveError::Malformed`]。
    pub fn element(
        &self,
        method: &str,
        arguments: &[Argument],
    ) -> Result<Option<Element>, ResolveError> {
        let dispatch = self
            .dispatch(method)
            .ok_or_else(|| self.unsupported(method))?;
        dispatch.element(arguments)
    }

    pub(crate) fn unsupported(&self, method: &str) -> ResolveError {
        ResolveError::Unsupported {
            contract: self.contract.qualified.to_string(),
            method: method.to_owned(),
        }
    }
}

impl Dispatch {
    pub(crate) fn element(&self, arguments: &[Argument]) -> Result<Option<Element>, ResolveError> {
        let parameters = self.method.parameters();
        if parameters.len() != arguments.len() {
            return Err(ResolveError::malformed(format!(
                "method `{}` expects {} argument(s), got {}",
                self.method.name(),
                parameters.len(),
                arguments.len()
            )));
        }
        let Some(template) = &self.template else {
            return Ok(None);
        };
        if arguments.is_empty() {
            return Ok(Some(template.clone()));
        }
        let qualifiers: Qualifiers = parameters
            .iter()
            .zip(arguments)
            .map(|(parameter, argument)| (parameter.name(), argument.to_string()))
            .collect();
        Ok(Some(template.clone().with_qualifiers(qualifiers)))
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("contract", &self.contract.qualified)
            .field("methods", &self.entries.len())
            .finish()
    }
}
