//! 装配结果值
//!
//! 规格节点本身是 `serde_json::Value`，解析结果则可能包含活对象和构造器，
//! 因此需要单独的值树类型。

use crate::component::{Component, Constructor, Instance};
use serde_json::Number;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// 作用域中名称到对象的绑定
pub type Bindings = BTreeMap<String, Value>;

/// 解析后的值
#[derive(Clone, Default)]
pub enum Value {
    /// 空值
    #[default]
    Null,
    /// 布尔值
    Bool(bool),
    /// 数值
    Number(Number),
    /// 字符串
    String(String),
    /// 有序序列
    Array(Vec<Value>),
    /// 映射
    Map(BTreeMap<String, Value>),
    /// 活对象
    Object(Instance),
    /// 尚未调用的构造器（模块本身即构造器、且未要求创建时）
    Constructor(Arc<dyn Constructor>),
}

impl Value {
    /// 将组件包装为对象值
    pub fn object<T: Component>(component: T) -> Self {
        Self::Object(Arc::new(component))
    }

    /// 将构造器包装为值
    pub fn constructor<C: Constructor + 'static>(constructor: C) -> Self {
        Self::Constructor(Arc::new(constructor))
    }

    /// 是否为空值
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// 是否为构造器
    pub fn is_constructor(&self) -> bool {
        matches!(self, Self::Constructor(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Instance> {
        match self {
            Self::Object(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn as_constructor(&self) -> Option<&Arc<dyn Constructor>> {
        match self {
            Self::Constructor(ctor) => Some(ctor),
            _ => None,
        }
    }

    /// 按映射键取值
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// 向下转型为具体组件类型
    pub fn downcast<T: Component>(&self) -> Option<Arc<T>> {
        let instance = self.as_object()?.clone();
        instance.into_any_arc().downcast::<T>().ok()
    }

    /// 对象身份标识，用于按目标缓存属性设置器
    pub fn identity(&self) -> Option<usize> {
        self.as_object()
            .map(|instance| Arc::as_ptr(instance).cast::<()>() as usize)
    }

    /// 转换回 JSON，包含活对象或构造器时返回 `None`
    pub fn to_json(&self) -> Option<serde_json::Value> {
        Some(match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Value::Number(n.clone()),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Array(items) => serde_json::Value::Array(
                items.iter().map(Value::to_json).collect::<Option<Vec<_>>>()?,
            ),
            Self::Map(map) => {
                let mut object = serde_json::Map::new();
                for (key, value) in map {
                    object.insert(key.clone(), value.to_json()?);
                }
                serde_json::Value::Object(object)
            }
            Self::Object(_) | Self::Constructor(_) => return None,
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Constructor(a), Self::Constructor(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Number(n) => write!(f, "Number({n})"),
            Self::String(s) => write!(f, "String({s:?})"),
            Self::Array(items) => f.debug_list().entries(items).finish(),
            Self::Map(map) => f.debug_map().entries(map).finish(),
            Self::Object(instance) => write!(f, "Object({})", instance.name()),
            Self::Constructor(_) => f.write_str("Constructor(<function>)"),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&serde_json::Value> for Value {
    fn from(value: &serde_json::Value) -> Self {
        Self::from(value.clone())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(Number::from(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(Number::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

impl From<Bindings> for Value {
    fn from(map: Bindings) -> Self {
        Self::Map(map)
    }
}

impl From<Instance> for Value {
    fn from(instance: Instance) -> Self {
        Self::Object(instance)
    }
}
