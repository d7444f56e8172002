//! 按请求类型把原始文本或 JSON 值转换为载荷。
//!
//! 只支持固定的一张类型表；表外类型返回 `None`，由调用方视为“拒绝回答”。

use std::any::TypeId;
use std::sync::Arc;

use spark_config::{Payload, QualifiedType};

/// 文本转换：环境变量等纯文本来源使用。
///
/// - `any` 请求得到 `String`；
/// - 布尔值接受 `true/false/1/0/yes/no/on/off`（不区分大小写）。
pub(crate) fn from_text(raw: &str, requested: &QualifiedType) -> Option<Result<Payload, ()>> {
    if requested.is_any() {
        return Some(Ok(Arc::new(raw.to_owned()) as Payload));
    }
    let id = requested.type_id()?;

    macro_rules! parse_as {
        ($($ty:ty),+ $(,)?) => {
            $(
                if id == TypeId::of::<$ty>() {
                    return Some(raw.trim().parse::<$ty>().map(|value| Arc::new(value) as Payload).map_err(|_| ()));
                }
            )+
        };
    }

    if id == TypeId::of::<String>() {
        return Some(Ok(Arc::new(raw.to_owned()) as Payload));
    }
    if id == TypeId::of::<Arc<str>>() {
        return Some(Ok(Arc::new(Arc::<str>::from(raw)) as Payload));
    }
    if id == TypeId::of::<bool>() {
        return Some(parse_bool(raw).map(|value| Arc::new(value) as Payload).ok_or(()));
    }
    parse_as!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, char);
    None
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// JSON 转换：文档来源使用，转换本身委托给 `serde_json::from_value`。
///
/// - `any` 与 `serde_json::Value` 请求得到子树本身；
/// - 其余类型按固定表反序列化。
pub(crate) fn from_json(
    value: &serde_json::Value,
    requested: &QualifiedType,
) -> Option<Result<Payload, serde_json::Error>> {
    if requested.is_any() {
        return Some(Ok(Arc::new(value.clone()) as Payload));
    }
    let id = requested.type_id()?;
    if id == TypeId::of::<serde_json::Value>() {
        return Some(Ok(Arc::new(value.clone()) as Payload));
    }

    macro_rules! deserialize_as {
        ($($ty:ty),+ $(,)?) => {
            $(
                if id == TypeId::of::<$ty>() {
                    return Some(serde_json::from_value::<$ty>(value.clone()).map(|value| Arc::new(value) as Payload));
                }
            )+
        };
    }

    deserialize_as!(
        String,
        bool,
        i8,
        i16,
        i32,
        i64,
        isize,
        u8,
        u16,
        u32,
        u64,
        usize,
        f32,
        f64,
        char,
        Vec<String>,
        Vec<i64>,
        Vec<f64>,
        std::collections::BTreeMap<String, String>,
    );
    None
}
